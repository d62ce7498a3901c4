//! Notes: the six-property record stored in the database.
//!
//! Field names are fixed by the database layout; [`NoteSchema`] only carries
//! the time settings needed to read and write dates.

pub mod service;

use crate::config::NotesConfig;
use crate::error::{NotesError, Result};
use crate::notion::date::{DatePoint, DateRange, difference, format_stamp};
use crate::notion::property::{Property, PropertyKind};
use chrono::FixedOffset;
use serde_json::{Map, Value};

pub use service::{NotesService, RecurringOutcome};

pub const TITLE: &str = "Title";
pub const REMIND: &str = "Remind";
pub const DATE: &str = "Date";
pub const IMPORTANCE: &str = "Importance";
pub const PROGRESS: &str = "Progress";
pub const CATEGORY: &str = "Category";

/// Every note field with its kind, in wire order.
pub const FIELDS: [(&str, PropertyKind); 6] = [
    (TITLE, PropertyKind::Title),
    (REMIND, PropertyKind::MultiSelect),
    (DATE, PropertyKind::Date),
    (IMPORTANCE, PropertyKind::Select),
    (PROGRESS, PropertyKind::Select),
    (CATEGORY, PropertyKind::MultiSelect),
];

/// Time settings used when reading and writing note dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSchema {
    pub time_zone: Option<String>,
    pub offset: FixedOffset,
}

impl NoteSchema {
    pub fn new(time_zone: Option<String>, offset: FixedOffset) -> Self {
        Self { time_zone, offset }
    }

    pub fn from_config(config: &NotesConfig) -> Result<Self> {
        Ok(Self::new(config.notion.time_zone.clone(), config.utc_offset()?))
    }

    /// A date range carrying the configured time zone label.
    pub fn range(&self, begin: DatePoint, end: Option<DatePoint>) -> DateRange {
        DateRange {
            begin,
            end,
            time_zone: self.time_zone.clone(),
        }
    }
}

/// Glyph shown in front of a note of the given importance.
pub fn importance_glyph(label: &str) -> Option<&'static str> {
    match label {
        "Important" => Some("🔴"),
        "Unimportant" => Some("⚪"),
        "Urgent" => Some("🔥"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteRecord {
    /// Page id, known only for records read from the database.
    pub id: Option<String>,
    pub title: Property,
    pub remind: Property,
    pub date: Property,
    pub importance: Property,
    pub progress: Property,
    pub category: Property,
}

impl Default for NoteRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteRecord {
    /// A record with all six properties unset.
    pub fn new() -> Self {
        Self {
            id: None,
            title: Property::empty(PropertyKind::Title, TITLE),
            remind: Property::empty(PropertyKind::MultiSelect, REMIND),
            date: Property::empty(PropertyKind::Date, DATE),
            importance: Property::empty(PropertyKind::Select, IMPORTANCE),
            progress: Property::empty(PropertyKind::Select, PROGRESS),
            category: Property::empty(PropertyKind::MultiSelect, CATEGORY),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Property::title(TITLE, title);
        self
    }

    pub fn with_remind<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remind = Property::multi_select(REMIND, flags);
        self
    }

    pub fn with_date(mut self, range: DateRange) -> Self {
        self.date = Property::date(DATE, range);
        self
    }

    pub fn with_importance(mut self, label: impl Into<String>) -> Self {
        self.importance = Property::select(IMPORTANCE, label);
        self
    }

    pub fn with_progress(mut self, label: impl Into<String>) -> Self {
        self.progress = Property::select(PROGRESS, label);
        self
    }

    pub fn with_category<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category = Property::multi_select(CATEGORY, labels);
        self
    }

    /// Parse a full database row (`{"id": .., "properties": {..}}`).
    ///
    /// # Errors
    ///
    /// [`NotesError::Parse`] when any of the six fields is missing or of the
    /// wrong type.
    pub fn from_row(row: &Value, schema: &NoteSchema) -> Result<Self> {
        let properties = row
            .get("properties")
            .filter(|p| p.is_object())
            .ok_or_else(|| NotesError::parse("row has no properties object"))?;
        let read = |name: &str, kind| Property::from_wire(kind, name, properties, schema.offset);
        Ok(Self {
            id: row.get("id").and_then(Value::as_str).map(str::to_owned),
            title: read(TITLE, PropertyKind::Title)?,
            remind: read(REMIND, PropertyKind::MultiSelect)?,
            date: read(DATE, PropertyKind::Date)?,
            importance: read(IMPORTANCE, PropertyKind::Select)?,
            progress: read(PROGRESS, PropertyKind::Select)?,
            category: read(CATEGORY, PropertyKind::MultiSelect)?,
        })
    }

    fn properties(&self) -> [&Property; 6] {
        [
            &self.title,
            &self.remind,
            &self.date,
            &self.importance,
            &self.progress,
            &self.category,
        ]
    }

    /// Merge the six property fragments into one `properties` object.
    ///
    /// # Errors
    ///
    /// [`NotesError::Precondition`] when a property has no value.
    pub fn to_wire(&self) -> Result<Value> {
        let mut merged = Map::new();
        for property in self.properties() {
            let (name, value) = property.to_wire()?;
            merged.insert(name, value);
        }
        Ok(Value::Object(merged))
    }

    pub fn title_text(&self) -> &str {
        self.title.as_text().unwrap_or_default()
    }

    pub fn remind_flags(&self) -> &[String] {
        self.remind.as_options().unwrap_or_default()
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date.as_date()
    }

    pub fn importance_label(&self) -> Option<&str> {
        self.importance.as_selected()
    }

    pub fn progress_label(&self) -> Option<&str> {
        self.progress.as_selected()
    }

    pub fn categories(&self) -> &[String] {
        self.category.as_options().unwrap_or_default()
    }

    /// Whether the note carries the given remind flag.
    pub fn reminds_at(&self, flag: &str) -> bool {
        self.remind_flags().iter().any(|f| f == flag)
    }

    /// One-line summary: importance glyph, relative stamp, title.
    ///
    /// The stamp is shown in `now`'s offset, whatever offset the service
    /// returned the date in.
    pub fn render(&self, now: &DatePoint) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3);
        if let Some(glyph) = self.importance_label().and_then(importance_glyph) {
            parts.push(glyph.to_owned());
        }
        if let Some(range) = self.date_range() {
            let delta = difference(range, true, now);
            let reference = delta.reference.with_timezone(now.offset());
            let stamp = format_stamp(&reference, now);
            if !stamp.is_empty() {
                parts.push(format!("[{stamp}]"));
            }
        }
        parts.push(self.title_text().to_owned());
        parts.join(" ")
    }
}
