use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::config::TelegramSettings;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Pause after a failed `getUpdates` call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel adapter using the Bot API (`sendMessage`, long-polled
/// `getUpdates`).
pub struct TelegramAdapter {
    bot_token: String,
    base_url: String,
    allowed_chat_ids: Vec<i64>,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

/// One text message pulled from `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub chat_id: i64,
    pub sender: String,
    pub text: String,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramSettings) -> anyhow::Result<Self> {
        // Long polls must not be cut off by the client timeout.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            bot_token: config.bot_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            allowed_chat_ids: config.recipient_ids.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.bot_token)
    }

    fn is_chat_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chat_ids.contains(&chat_id)
    }

    async fn get_updates(&self, offset: Option<i64>) -> anyhow::Result<Value> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("telegram getUpdates failed ({status}): {body}");
        }
        Ok(response.json().await?)
    }
}

/// Extract text messages from a `getUpdates` response.
///
/// Returns the messages and the offset that acknowledges every update in
/// the batch, including the ones without text.
pub fn parse_updates(body: &Value) -> anyhow::Result<(Vec<TelegramUpdate>, Option<i64>)> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let description = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        anyhow::bail!("telegram returned an error: {description}");
    }
    let results = body
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("telegram response has no result array"))?;

    let mut updates = Vec::new();
    let mut next_offset = None;
    for item in results {
        let Some(update_id) = item.get("update_id").and_then(Value::as_i64) else {
            continue;
        };
        next_offset = next_offset.max(Some(update_id + 1));
        let Some(message) = item.get("message") else {
            continue;
        };
        let chat_id = message.pointer("/chat/id").and_then(Value::as_i64);
        let text = message.get("text").and_then(Value::as_str);
        let (Some(chat_id), Some(text)) = (chat_id, text) else {
            continue;
        };
        let sender = message
            .pointer("/from/username")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| {
                message
                    .pointer("/from/id")
                    .and_then(Value::as_i64)
                    .map(|id| id.to_string())
            })
            .unwrap_or_else(|| chat_id.to_string());
        updates.push(TelegramUpdate {
            update_id,
            chat_id,
            sender,
            text: text.to_owned(),
        });
    }
    Ok((updates, next_offset))
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("telegram bot token is empty");
        }
        let body = json!({
            "chat_id": message.reply_target,
            "text": message.text,
        });
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("telegram send failed ({status}): {body}");
        }
        Ok(())
    }

    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("telegram bot token is empty");
        }

        let mut offset = None;
        loop {
            let batch = match self.get_updates(offset).await {
                Ok(body) => parse_updates(&body),
                Err(err) => Err(err),
            };
            let (updates, next_offset) = match batch {
                Ok(batch) => batch,
                Err(err) => {
                    warn!("telegram poll failed: {err:#}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };
            if next_offset.is_some() {
                offset = next_offset;
            }

            for update in updates {
                if !self.is_chat_allowed(update.chat_id) {
                    debug!(chat_id = update.chat_id, "ignoring message from unlisted chat");
                    continue;
                }
                let inbound = ChannelInboundMessage {
                    channel: self.id().to_owned(),
                    sender: update.sender,
                    reply_target: update.chat_id.to_string(),
                    text: update.text,
                };
                if inbound_tx.send(inbound).await.is_err() {
                    debug!("inbound receiver closed, stopping telegram poll");
                    return Ok(());
                }
            }
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        if self.bot_token.trim().is_empty() {
            return Ok(false);
        }
        let response = self.client.get(self.method_url("getMe")).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: Value = response.json().await?;
        Ok(body.get("ok").and_then(Value::as_bool) == Some(true))
    }
}
