//! Chat commands understood by the notes bot.

use crate::error::Result;
use crate::notes::{NoteRecord, NotesService};
use crate::notion::date::DatePoint;

pub const HELP_TEXT: &str = "Commands:\n/today - unfinished notes for today\n/week - notes for next week";

/// Reply sent when a command fails.
pub const FAILURE_TEXT: &str = "Something went wrong, please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Today,
    Week,
    Unknown,
}

/// Parse the leading `/command` of a message. A `@botname` suffix and any
/// arguments are ignored.
pub fn parse_command(text: &str) -> BotCommand {
    let Some(first) = text.split_whitespace().next() else {
        return BotCommand::Unknown;
    };
    let name = first.split('@').next().unwrap_or(first);
    match name.to_ascii_lowercase().as_str() {
        "/start" | "/help" => BotCommand::Start,
        "/today" => BotCommand::Today,
        "/week" => BotCommand::Week,
        _ => BotCommand::Unknown,
    }
}

/// Header plus one rendered note per line, or `empty` when there are none.
pub fn format_listing(header: &str, empty: &str, notes: &[NoteRecord], now: &DatePoint) -> String {
    if notes.is_empty() {
        return empty.to_owned();
    }
    let mut text = header.to_owned();
    for note in notes {
        text.push('\n');
        text.push_str(&note.render(now));
    }
    text
}

/// Answer one inbound message.
pub async fn reply_for(service: &NotesService, text: &str, now: &DatePoint) -> Result<String> {
    match parse_command(text) {
        BotCommand::Start | BotCommand::Unknown => Ok(HELP_TEXT.to_owned()),
        BotCommand::Today => {
            let notes = service.today_notes(now, true).await?;
            Ok(format_listing(
                "Notes for today:",
                "No more notes for today!",
                &notes,
                now,
            ))
        }
        BotCommand::Week => {
            let notes = service.next_week_notes().await?;
            Ok(format_listing(
                "Notes for next week:",
                "No notes for next week!",
                &notes,
                now,
            ))
        }
    }
}
