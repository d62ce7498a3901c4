//! Notion-backed notes with chat reminders.
//!
//! Notes live as rows of a Notion database. This crate reads and writes them
//! and reminds about them:
//! Scheduler → NotesService → Notion query (drained) → NoteRecord → chat
//!
//! # Architecture
//!
//! - **notion**: typed properties, filters, dates, paginated queries
//! - **notes**: the six-field note record and note operations
//! - **scheduler**: once-per-minute reminder loop and daily recurring notes
//! - **channels**: chat delivery (Telegram) and command replies

pub mod channels;
pub mod config;
pub mod error;
pub mod notes;
pub mod notion;
pub mod scheduler;

pub use config::NotesConfig;
pub use error::{NotesError, Result};
pub use notes::{NoteRecord, NotesService};
pub use notion::NotionClient;
pub use scheduler::ReminderScheduler;
