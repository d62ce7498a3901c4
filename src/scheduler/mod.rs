//! Reminder scheduler.
//!
//! Polls the notes database once per wall-clock minute and sends the notes
//! flagged for that minute to the configured recipients. Recurring notes are
//! created at the daily trigger time.

pub mod runner;
pub mod tasks;

pub use runner::{PollOutcome, ReminderScheduler};
pub use tasks::{Clock, ReminderSource, SystemClock, TickReport};
