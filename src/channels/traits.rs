use async_trait::async_trait;
use tokio::sync::mpsc;

/// Text message received from a chat.
#[derive(Debug, Clone)]
pub struct ChannelInboundMessage {
    pub channel: String,
    /// Display name or id of the author.
    pub sender: String,
    /// Chat the reply goes to.
    pub reply_target: String,
    pub text: String,
}

/// Text message addressed to one chat.
#[derive(Debug, Clone)]
pub struct ChannelOutboundMessage {
    pub reply_target: String,
    pub text: String,
}

/// Delivery channel for reminders and command replies.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable channel identifier (e.g. `telegram`).
    fn id(&self) -> &'static str;

    /// Deliver one message.
    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()>;

    /// Receive inbound messages and forward them until the receiver closes.
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
