//! Database metadata (`GET /v1/databases/{id}`).
//!
//! Only used for a startup sanity check: the note layout is fixed, so a
//! database missing one of its fields is reported rather than adapted to.

use super::client::NotionClient;
use super::property::PropertyKind;
use crate::error::{NotesError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseProperty {
    pub id: String,
    pub name: String,
    /// Raw wire type, e.g. `select`, `rich_text`, `formula`.
    pub kind: String,
}

impl DatabaseProperty {
    /// Codec kind of this property, `None` for wire types the codec lacks.
    pub fn property_kind(&self) -> Option<PropertyKind> {
        PropertyKind::from_wire_key(&self.kind)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSchema {
    pub id: String,
    pub title: String,
    /// Properties ordered by name.
    pub properties: Vec<DatabaseProperty>,
}

#[derive(Deserialize)]
struct RawDatabase {
    id: String,
    #[serde(default)]
    title: Vec<RawText>,
    properties: BTreeMap<String, RawProperty>,
}

#[derive(Deserialize)]
struct RawText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Deserialize)]
struct RawProperty {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl DatabaseSchema {
    pub fn from_wire(value: serde_json::Value) -> Result<Self> {
        let raw: RawDatabase = serde_json::from_value(value)
            .map_err(|e| NotesError::parse(format!("unexpected database shape: {e}")))?;
        Ok(Self {
            id: raw.id,
            title: raw.title.into_iter().map(|t| t.plain_text).collect(),
            properties: raw
                .properties
                .into_values()
                .map(|p| DatabaseProperty {
                    id: p.id,
                    name: p.name,
                    kind: p.kind,
                })
                .collect(),
        })
    }

    pub fn property(&self, name: &str) -> Option<&DatabaseProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Describe every expected field that is missing or of another kind.
    #[must_use]
    pub fn mismatches(&self, expected: &[(&str, PropertyKind)]) -> Vec<String> {
        expected
            .iter()
            .filter_map(|(name, kind)| match self.property(name) {
                None => Some(format!("missing property `{name}` ({kind})")),
                Some(found) if found.property_kind() != Some(*kind) => Some(format!(
                    "property `{name}` is `{}`, expected `{kind}`",
                    found.kind
                )),
                Some(_) => None,
            })
            .collect()
    }
}

impl NotionClient {
    pub async fn get_database(&self) -> Result<DatabaseSchema> {
        let path = format!("/v1/databases/{}", self.database_id());
        DatabaseSchema::from_wire(self.get_json(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn schema() -> DatabaseSchema {
        DatabaseSchema::from_wire(json!({
            "object": "database",
            "id": "db1",
            "title": [{"plain_text": "Notes"}],
            "properties": {
                "Title": {"id": "title", "name": "Title", "type": "title", "title": {}},
                "Progress": {"id": "p", "name": "Progress", "type": "status", "status": {}},
                "Date": {"id": "d", "name": "Date", "type": "date", "date": {}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_title_and_properties() {
        let schema = schema();
        assert_eq!(schema.id, "db1");
        assert_eq!(schema.title, "Notes");
        assert_eq!(schema.properties.len(), 3);
        assert_eq!(schema.property("Date").unwrap().kind, "date");
    }

    #[test]
    fn maps_known_wire_types_to_codec_kinds() {
        let schema = schema();
        assert_eq!(
            schema.property("Title").unwrap().property_kind(),
            Some(PropertyKind::Title)
        );
        assert_eq!(
            schema.property("Date").unwrap().property_kind(),
            Some(PropertyKind::Date)
        );
        assert_eq!(schema.property("Progress").unwrap().property_kind(), None);
    }

    #[test]
    fn reports_missing_and_mistyped_fields() {
        let problems = schema().mismatches(&[
            ("Title", PropertyKind::Title),
            ("Progress", PropertyKind::Select),
            ("Category", PropertyKind::MultiSelect),
        ]);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("Progress"));
        assert!(problems[1].contains("missing property `Category`"));
    }

    #[test]
    fn rejects_unexpected_shape() {
        assert!(matches!(
            DatabaseSchema::from_wire(json!({"id": 3})),
            Err(NotesError::Parse(_))
        ));
    }
}
