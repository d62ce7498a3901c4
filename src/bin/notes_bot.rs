//! Chat bot binary answering `/today` and `/week`.
//!
//! Loads the config (`$NOTES_CONFIG` or the default path) and long-polls
//! Telegram until Ctrl-C. Only chats listed in `telegram.recipient_ids` get
//! answers.

use notion_reminder::channels::{TelegramAdapter, run_bot};
use notion_reminder::scheduler::SystemClock;
use notion_reminder::{NotesConfig, NotesService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = NotesConfig::resolve_path();
    tracing::info!(path = %path.display(), "notes bot starting");
    let config = NotesConfig::load(&path)
        .map_err(|e| anyhow::anyhow!("cannot load config {}: {e}", path.display()))?;
    config.require_notion()?;
    config.require_telegram()?;

    let service = NotesService::from_config(&config)?;
    let adapter = Arc::new(TelegramAdapter::new(&config.telegram)?);
    let clock = Arc::new(SystemClock::new(config.utc_offset()?));

    let cancel = CancellationToken::new();
    let bot = tokio::spawn(run_bot(adapter, service, clock, cancel.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    cancel.cancel();
    bot.await
        .map_err(|e| anyhow::anyhow!("bot task failed: {e}"))??;

    tracing::info!("notes bot shut down cleanly");
    Ok(())
}
