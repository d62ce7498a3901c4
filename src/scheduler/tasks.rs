//! What the reminder loop does on each new minute.
//!
//! Defines the [`ReminderSource`] seam the loop fetches from, the [`Clock`]
//! it reads wall time from, and the pure helpers that turn a minute and a
//! list of notes into a reminder message.

use crate::config::RecurringTemplate;
use crate::error::Result;
use crate::notes::{NoteRecord, NotesService, RecurringOutcome};
use crate::notion::date::{DatePoint, now_in};
use async_trait::async_trait;
use chrono::FixedOffset;

/// First line of every reminder message.
pub const REMINDER_HEADER: &str = "🔔 Reminder about unfinished notes:";

/// Where the scheduler gets its notes from.
#[async_trait]
pub trait ReminderSource: Send + Sync {
    /// Today's notes that are not finished yet.
    async fn due_notes(&self, now: &DatePoint) -> Result<Vec<NoteRecord>>;

    /// Create today's recurring notes that do not exist yet.
    async fn create_recurring(
        &self,
        templates: &[RecurringTemplate],
        now: &DatePoint,
    ) -> Result<RecurringOutcome>;
}

#[async_trait]
impl ReminderSource for NotesService {
    async fn due_notes(&self, now: &DatePoint) -> Result<Vec<NoteRecord>> {
        self.today_notes(now, true).await
    }

    async fn create_recurring(
        &self,
        templates: &[RecurringTemplate],
        now: &DatePoint,
    ) -> Result<RecurringOutcome> {
        self.create_recurring_today(templates, now).await
    }
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DatePoint;
}

/// Real time in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DatePoint {
        now_in(self.offset)
    }
}

/// Reminder flag for the minute containing `now`, e.g. `t07:00`.
pub fn flag_token(now: &DatePoint) -> String {
    format!("t{}", now.format("%H:%M"))
}

/// Notes whose Remind set contains `token`, in input order.
pub fn select_due<'a>(notes: &'a [NoteRecord], token: &str) -> Vec<&'a NoteRecord> {
    notes.iter().filter(|note| note.reminds_at(token)).collect()
}

/// Header plus one rendered line per note, or `None` when nothing is due.
pub fn compose_message(notes: &[&NoteRecord], now: &DatePoint) -> Option<String> {
    if notes.is_empty() {
        return None;
    }
    let mut text = String::from(REMINDER_HEADER);
    for note in notes {
        text.push('\n');
        text.push_str(&note.render(now));
    }
    Some(text)
}

/// Summary of one processed minute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Flag token of the processed minute.
    pub token: String,
    /// Unfinished notes dated today.
    pub fetched: usize,
    /// Notes reminded about in this minute.
    pub matched: usize,
    /// Set when the daily trigger fired.
    pub recurring: Option<RecurringOutcome>,
    /// Recipients the message reached.
    pub delivered: usize,
}
