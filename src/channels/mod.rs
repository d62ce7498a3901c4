//! Chat channels: reminder delivery and command replies.
//!
//! Adapters are pluggable through [`ChannelAdapter`]; [`run_bot`] owns
//! routing of inbound messages to command replies.

pub mod commands;
pub mod telegram;
pub mod traits;

use crate::channels::commands::{FAILURE_TEXT, reply_for};
use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::notes::NotesService;
use crate::scheduler::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use telegram::TelegramAdapter;

const INBOUND_QUEUE_SIZE: usize = 32;
const MAX_RESTART_BACKOFF_SECS: u64 = 60;

/// Answer inbound commands on `adapter` until `cancel` fires.
///
/// The adapter's receive loop is restarted with exponential back-off when it
/// stops. A failing command gets a generic reply; the loop keeps going.
pub async fn run_bot(
    adapter: Arc<dyn ChannelAdapter>,
    service: NotesService,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let (inbound_tx, mut inbound_rx) =
        tokio::sync::mpsc::channel::<ChannelInboundMessage>(INBOUND_QUEUE_SIZE);

    let receiver = {
        let adapter = Arc::clone(&adapter);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut backoff_secs = 2u64;
            loop {
                let outcome = tokio::select! {
                    () = cancel.cancelled() => return,
                    outcome = adapter.run(inbound_tx.clone()) => outcome,
                };
                match outcome {
                    Ok(()) => tracing::warn!("channel {} stopped; restarting", adapter.id()),
                    Err(err) => tracing::warn!(
                        "channel {} failed: {err:#}; retrying in {backoff_secs}s",
                        adapter.id()
                    ),
                }
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
                }
                backoff_secs = backoff_secs.saturating_mul(2).min(MAX_RESTART_BACKOFF_SECS);
            }
        })
    };
    tracing::info!("notes bot started on {}", adapter.id());

    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            message = inbound_rx.recv() => message,
        };
        let Some(message) = message else {
            break;
        };
        tracing::debug!(channel = %message.channel, sender = %message.sender, "inbound message");

        let now = clock.now();
        let text = match reply_for(&service, &message.text, &now).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("failed to answer `{}`: {err}", message.text);
                FAILURE_TEXT.to_owned()
            }
        };
        let reply = ChannelOutboundMessage {
            reply_target: message.reply_target.clone(),
            text,
        };
        if let Err(err) = adapter.send(reply).await {
            tracing::warn!(reply_target = %message.reply_target, "reply failed: {err:#}");
        }
    }

    receiver.abort();
    tracing::info!("notes bot stopped");
    Ok(())
}
