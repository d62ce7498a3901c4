//! Configuration for the notes bot and reminder scheduler.
//!
//! Loaded once from TOML at startup, validated, and handed to the
//! components that need it.

use crate::error::{NotesError, Result};
use crate::notion::date::parse_offset;
use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "NOTES_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Database service access.
    pub notion: NotionSettings,
    /// Chat / notification channel.
    pub telegram: TelegramSettings,
    /// Allowed select labels.
    pub labels: LabelSettings,
    /// Scheduler timing and default reminder flags.
    pub reminders: ReminderSettings,
    /// Notes created every day at the daily trigger time.
    pub recurring: Vec<RecurringTemplate>,
}

/// Notion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionSettings {
    /// Integration token (`secret_...`).
    pub token: String,
    /// Target database id.
    pub database_id: String,
    /// Value of the `Notion-Version` header.
    pub api_version: String,
    pub base_url: String,
    /// IANA label written with timed dates, e.g. `Europe/Moscow`.
    pub time_zone: Option<String>,
    /// Offset used for "today" and for dates without one, e.g. `+03:00`.
    pub utc_offset: String,
    /// Rows per query page (1..=100).
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            database_id: String::new(),
            api_version: "2022-06-28".to_owned(),
            base_url: "https://api.notion.com".to_owned(),
            time_zone: None,
            utc_offset: "+00:00".to_owned(),
            page_size: 100,
            request_timeout_secs: 30,
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: String,
    /// Chats that receive reminders and may talk to the bot.
    pub recipient_ids: Vec<i64>,
    pub base_url: String,
    /// Long-poll timeout for `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            recipient_ids: Vec::new(),
            base_url: "https://api.telegram.org".to_owned(),
            poll_timeout_secs: 30,
        }
    }
}

/// Enumerated select labels of the notes database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    pub importance: Vec<String>,
    pub progress: Vec<String>,
    pub categories: Vec<String>,
    /// Progress given to newly created notes.
    pub initial_progress: String,
    /// Terminal progress; such notes are no longer reminded about.
    pub finished_progress: String,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            importance: vec!["Important".into(), "Unimportant".into(), "Urgent".into()],
            progress: vec!["Not started".into(), "In progress".into(), "Done".into()],
            categories: vec![
                "Work".into(),
                "Home".into(),
                "Study".into(),
                "Teaching".into(),
            ],
            initial_progress: "Not started".into(),
            finished_progress: "Done".into(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Remind flags (`tHH:MM`) given to notes created from templates.
    pub default_flags: Vec<String>,
    /// Local `HH:MM` at which recurring notes are created.
    pub daily_trigger: String,
    /// Re-check interval while still inside an already processed minute.
    pub recheck_interval_secs: u64,
    /// Pause after a failed tick.
    pub failure_backoff_secs: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            default_flags: vec!["t07:00".into()],
            daily_trigger: "07:00".into(),
            recheck_interval_secs: 5,
            failure_backoff_secs: 15,
        }
    }
}

/// A note created every day unless one with the same title already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub title: String,
    pub importance: String,
    #[serde(default)]
    pub category: Vec<String>,
}

/// Returns `true` for `tHH:MM` flags with a valid clock time.
pub fn is_reminder_flag(flag: &str) -> bool {
    flag.strip_prefix('t')
        .is_some_and(|clock| parse_clock(clock).is_ok())
}

/// Parse a strict `HH:MM` clock time.
pub fn parse_clock(text: &str) -> Result<NaiveTime> {
    if text.len() != 5 {
        return Err(NotesError::Config(format!("expected HH:MM, got `{text}`")));
    }
    NaiveTime::parse_from_str(text, "%H:%M")
        .map_err(|e| NotesError::Config(format!("invalid time `{text}`: {e}")))
}

impl NotesConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NotesError::Config(e.to_string()))
    }

    /// Load and validate in one step.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NotesError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/notion-reminder/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config)
                .join("notion-reminder")
                .join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("notion-reminder")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/notion-reminder/config.toml")
        }
    }

    /// `$NOTES_CONFIG` when set, the default path otherwise.
    pub fn resolve_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path)
    }

    /// The configured UTC offset.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.notion.utc_offset)
    }

    /// Check labels, flags and timings. Secrets are checked separately by
    /// [`require_notion`](Self::require_notion) and
    /// [`require_telegram`](Self::require_telegram).
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.utc_offset()?;
        parse_clock(&self.reminders.daily_trigger)?;

        if self.notion.page_size == 0 || self.notion.page_size > crate::notion::MAX_PAGE_SIZE {
            return Err(NotesError::Config(format!(
                "notion.page_size must be within 1..={}",
                crate::notion::MAX_PAGE_SIZE
            )));
        }

        let labels = &self.labels;
        for (what, label) in [
            ("labels.initial_progress", &labels.initial_progress),
            ("labels.finished_progress", &labels.finished_progress),
        ] {
            ensure_known(what, label, &labels.progress)?;
        }

        for flag in &self.reminders.default_flags {
            if !is_reminder_flag(flag) {
                return Err(NotesError::Config(format!(
                    "reminders.default_flags: `{flag}` is not of the form tHH:MM"
                )));
            }
        }

        for template in &self.recurring {
            if template.title.trim().is_empty() {
                return Err(NotesError::Config("recurring note with empty title".into()));
            }
            let what = format!("recurring `{}` importance", template.title);
            ensure_known(&what, &template.importance, &labels.importance)?;
            for category in &template.category {
                let what = format!("recurring `{}` category", template.title);
                ensure_known(&what, category, &labels.categories)?;
            }
        }
        Ok(())
    }

    pub fn require_notion(&self) -> Result<()> {
        if self.notion.token.trim().is_empty() {
            return Err(NotesError::Config("notion.token is empty".into()));
        }
        if self.notion.database_id.trim().is_empty() {
            return Err(NotesError::Config("notion.database_id is empty".into()));
        }
        Ok(())
    }

    pub fn require_telegram(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(NotesError::Config("telegram.bot_token is empty".into()));
        }
        Ok(())
    }
}

fn ensure_known(what: &str, label: &str, allowed: &[String]) -> Result<()> {
    if allowed.iter().any(|a| a == label) {
        return Ok(());
    }
    Err(NotesError::Config(format!(
        "{what}: unknown label `{label}` (allowed: {})",
        allowed.join(", ")
    )))
}
