//! Reminder scheduler binary.
//!
//! Loads the config (`$NOTES_CONFIG` or the default path), checks the notes
//! database layout and runs the once-per-minute reminder loop until Ctrl-C.
//! Logs go to stderr; set `RUST_LOG` to change the level.

use notion_reminder::channels::TelegramAdapter;
use notion_reminder::notes::FIELDS;
use notion_reminder::scheduler::SystemClock;
use notion_reminder::{NotesConfig, NotesService, ReminderScheduler};
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
    tracing::info!(path = %path.display(), "reminder scheduler starting");
    let config = NotesConfig::load(&path)
        .map_err(|e| anyhow::anyhow!("cannot load config {}: {e}", path.display()))?;
    config.require_notion()?;
    config.require_telegram()?;
    if config.telegram.recipient_ids.is_empty() {
        tracing::warn!("telegram.recipient_ids is empty; reminders will not be delivered");
    }

    let service = NotesService::from_config(&config)?;
    match service.client().get_database().await {
        Ok(schema) => {
            for problem in schema.mismatches(&FIELDS) {
                tracing::warn!(database = %schema.title, "{problem}");
            }
        }
        Err(e) => tracing::warn!("cannot read database layout: {e}"),
    }

    let adapter = Arc::new(TelegramAdapter::new(&config.telegram)?);
    let clock = Arc::new(SystemClock::new(config.utc_offset()?));
    let scheduler =
        ReminderScheduler::new(Arc::new(service), adapter, clock).with_config(&config)?;

    let cancel = CancellationToken::new();
    let handle = scheduler.spawn(cancel.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    cancel.cancel();
    handle
        .await
        .map_err(|e| anyhow::anyhow!("scheduler task failed: {e}"))?;

    tracing::info!("reminder scheduler shut down cleanly");
    Ok(())
}
