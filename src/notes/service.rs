//! Inbound note operations on top of the query engine.

use super::{DATE, IMPORTANCE, NoteRecord, NoteSchema, PROGRESS, TITLE};
use crate::config::{LabelSettings, NotesConfig, RecurringTemplate};
use crate::error::{NotesError, Result};
use crate::notion::client::NotionClient;
use crate::notion::date::{DatePoint, day_bounds};
use crate::notion::filter::{Filter, Sort};
use crate::notion::property::{Property, PropertyKind};
use serde_json::Value;
use tracing::{debug, info};

/// Result of one recurring-note pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurringOutcome {
    /// Titles created in this pass.
    pub created: Vec<String>,
    /// Titles that already had a note today.
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct NotesService {
    client: NotionClient,
    schema: NoteSchema,
    labels: LabelSettings,
    default_flags: Vec<String>,
}

impl NotesService {
    pub fn new(
        client: NotionClient,
        schema: NoteSchema,
        labels: LabelSettings,
        default_flags: Vec<String>,
    ) -> Self {
        Self {
            client,
            schema,
            labels,
            default_flags,
        }
    }

    /// Build the client and service from a validated config.
    pub fn from_config(config: &NotesConfig) -> Result<Self> {
        Ok(Self::new(
            NotionClient::new(&config.notion)?,
            NoteSchema::from_config(config)?,
            config.labels.clone(),
            config.reminders.default_flags.clone(),
        ))
    }

    pub fn client(&self) -> &NotionClient {
        &self.client
    }

    pub fn schema(&self) -> &NoteSchema {
        &self.schema
    }

    /// Create a page for `note` and return its id.
    ///
    /// # Errors
    ///
    /// [`NotesError::Precondition`] when a property is unset or a select
    /// label is not one of the configured ones.
    pub async fn create_note(&self, note: &NoteRecord) -> Result<String> {
        self.check_labels(note)?;
        let page = self.client.create_page(note.to_wire()?).await?;
        let id = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| NotesError::parse("created page has no id"))?
            .to_owned();
        info!(id = %id, title = note.title_text(), "note created");
        Ok(id)
    }

    /// Notes dated within the local day containing `now`, earliest first.
    pub async fn today_notes(&self, now: &DatePoint, exclude_finished: bool) -> Result<Vec<NoteRecord>> {
        let mut parts = self.today_filter(now)?;
        if exclude_finished {
            parts.push(
                Property::select(PROGRESS, self.labels.finished_progress.as_str())
                    .does_not_equal()?,
            );
        }
        self.fetch(Filter::and(parts), vec![Sort::ascending(DATE)])
            .await
    }

    /// Notes dated next week, by date and then most important first.
    pub async fn next_week_notes(&self) -> Result<Vec<NoteRecord>> {
        let filter = Property::empty(PropertyKind::Date, DATE).next_week()?;
        self.fetch(
            filter,
            vec![Sort::ascending(DATE), Sort::descending(IMPORTANCE)],
        )
        .await
    }

    /// First note dated today whose title equals `title`.
    pub async fn find_by_title_today(&self, title: &str, now: &DatePoint) -> Result<Option<NoteRecord>> {
        let mut parts = vec![Property::title(TITLE, title).equals()?];
        parts.extend(self.today_filter(now)?);
        let notes = self.fetch(Filter::and(parts), Vec::new()).await?;
        Ok(notes.into_iter().next())
    }

    /// Create today's note for every template that does not have one yet.
    ///
    /// The existence check is the only guard; two processes running this at
    /// the same time can both create a note.
    pub async fn create_recurring_today(
        &self,
        templates: &[RecurringTemplate],
        now: &DatePoint,
    ) -> Result<RecurringOutcome> {
        let mut outcome = RecurringOutcome::default();
        for template in templates {
            if self.find_by_title_today(&template.title, now).await?.is_some() {
                debug!(title = %template.title, "recurring note already exists today");
                outcome.skipped.push(template.title.clone());
                continue;
            }
            let note = self.note_from_template(template, now);
            self.create_note(&note).await?;
            outcome.created.push(template.title.clone());
        }
        info!(
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            "recurring notes processed"
        );
        Ok(outcome)
    }

    /// Today's whole-day note for `template`, with default flags and the
    /// initial progress.
    pub fn note_from_template(&self, template: &RecurringTemplate, now: &DatePoint) -> NoteRecord {
        let (start, _) = day_bounds(now);
        NoteRecord::new()
            .with_title(template.title.as_str())
            .with_remind(self.default_flags.iter().map(String::as_str))
            .with_date(self.schema.range(start, None))
            .with_importance(template.importance.as_str())
            .with_progress(self.labels.initial_progress.as_str())
            .with_category(template.category.iter().map(String::as_str))
    }

    fn today_filter(&self, now: &DatePoint) -> Result<Vec<Filter>> {
        let (start, end) = day_bounds(now);
        let bound = |point: DatePoint| Property::date(DATE, self.schema.range(point, None));
        Ok(vec![bound(start).on_or_after()?, bound(end).on_or_before()?])
    }

    async fn fetch(&self, filter: Filter, sorts: Vec<Sort>) -> Result<Vec<NoteRecord>> {
        let rows = self.client.drain(Some(filter), sorts).await?;
        rows.iter()
            .map(|row| NoteRecord::from_row(row, &self.schema))
            .collect()
    }

    fn check_labels(&self, note: &NoteRecord) -> Result<()> {
        let known = |set: &[String], label: &str| set.iter().any(|l| l == label);
        if let Some(label) = note.importance_label()
            && !known(&self.labels.importance, label)
        {
            return Err(NotesError::precondition(format!("unknown importance `{label}`")));
        }
        if let Some(label) = note.progress_label()
            && !known(&self.labels.progress, label)
        {
            return Err(NotesError::precondition(format!("unknown progress `{label}`")));
        }
        if let Some(label) = note.categories().iter().find(|c| !known(&self.labels.categories, c)) {
            return Err(NotesError::precondition(format!("unknown category `{label}`")));
        }
        Ok(())
    }
}
