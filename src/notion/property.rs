//! Typed page properties and their wire encoding.
//!
//! Each [`Property`] is bound to a field name and holds at most one value.
//! A property without a value can still produce sorts and value-less filters
//! (`next_week`), but cannot be serialized.

use super::date::{DateRange, stringify};
use super::filter::{Filter, FilterOp, Sort};
use crate::error::{NotesError, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Property kinds supported by the codec, named after their wire type key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Title,
    Checkbox,
    Select,
    MultiSelect,
    Date,
}

impl PropertyKind {
    pub fn wire_key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Date => "date",
        }
    }

    pub fn from_wire_key(key: &str) -> Option<Self> {
        match key {
            "title" => Some(Self::Title),
            "checkbox" => Some(Self::Checkbox),
            "select" => Some(Self::Select),
            "multi_select" => Some(Self::MultiSelect),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    /// Operators the filter grammar accepts for this kind.
    pub fn supports(self, op: FilterOp) -> bool {
        use FilterOp::*;
        match self {
            Self::Title => matches!(op, Equals | DoesNotEqual | Contains | DoesNotContain),
            Self::Checkbox | Self::Select => matches!(op, Equals | DoesNotEqual),
            Self::MultiSelect => matches!(op, Contains | DoesNotContain),
            Self::Date => matches!(
                op,
                Equals | Before | After | OnOrAfter | OnOrBefore | NextWeek
            ),
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_key())
    }
}

/// A page property bound to a wire field name.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Title { name: String, text: Option<String> },
    Checkbox { name: String, checked: Option<bool> },
    Select { name: String, selected: Option<String> },
    MultiSelect { name: String, options: Option<Vec<String>> },
    Date { name: String, range: Option<DateRange> },
}

impl Property {
    /// A property of the given kind with no value yet.
    pub fn empty(kind: PropertyKind, name: impl Into<String>) -> Self {
        let name = name.into();
        match kind {
            PropertyKind::Title => Self::Title { name, text: None },
            PropertyKind::Checkbox => Self::Checkbox {
                name,
                checked: None,
            },
            PropertyKind::Select => Self::Select {
                name,
                selected: None,
            },
            PropertyKind::MultiSelect => Self::MultiSelect {
                name,
                options: None,
            },
            PropertyKind::Date => Self::Date { name, range: None },
        }
    }

    pub fn title(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Title {
            name: name.into(),
            text: Some(text.into()),
        }
    }

    pub fn checkbox(name: impl Into<String>, checked: bool) -> Self {
        Self::Checkbox {
            name: name.into(),
            checked: Some(checked),
        }
    }

    pub fn select(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Select {
            name: name.into(),
            selected: Some(label.into()),
        }
    }

    pub fn multi_select<I, S>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MultiSelect {
            name: name.into(),
            options: Some(labels.into_iter().map(Into::into).collect()),
        }
    }

    pub fn date(name: impl Into<String>, range: DateRange) -> Self {
        Self::Date {
            name: name.into(),
            range: Some(range),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Title { name, .. }
            | Self::Checkbox { name, .. }
            | Self::Select { name, .. }
            | Self::MultiSelect { name, .. }
            | Self::Date { name, .. } => name,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Title { .. } => PropertyKind::Title,
            Self::Checkbox { .. } => PropertyKind::Checkbox,
            Self::Select { .. } => PropertyKind::Select,
            Self::MultiSelect { .. } => PropertyKind::MultiSelect,
            Self::Date { .. } => PropertyKind::Date,
        }
    }

    pub fn is_set(&self) -> bool {
        match self {
            Self::Title { text, .. } => text.is_some(),
            Self::Checkbox { checked, .. } => checked.is_some(),
            Self::Select { selected, .. } => selected.is_some(),
            Self::MultiSelect { options, .. } => options.is_some(),
            Self::Date { range, .. } => range.is_some(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Title { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    pub fn as_checked(&self) -> Option<bool> {
        match self {
            Self::Checkbox { checked, .. } => *checked,
            _ => None,
        }
    }

    pub fn as_selected(&self) -> Option<&str> {
        match self {
            Self::Select { selected, .. } => selected.as_deref(),
            _ => None,
        }
    }

    pub fn as_options(&self) -> Option<&[String]> {
        match self {
            Self::MultiSelect { options, .. } => options.as_deref(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateRange> {
        match self {
            Self::Date { range, .. } => range.as_ref(),
            _ => None,
        }
    }

    /// Wire fragment `(field name, {<type>: <value>})`.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::Precondition`] when no value is bound.
    pub fn to_wire(&self) -> Result<(String, Value)> {
        let value = match self {
            Self::Title {
                text: Some(text), ..
            } => json!({ "title": [{ "type": "text", "text": { "content": text } }] }),
            Self::Checkbox {
                checked: Some(checked),
                ..
            } => json!({ "checkbox": checked }),
            Self::Select {
                selected: Some(label),
                ..
            } => json!({ "select": { "name": label } }),
            Self::MultiSelect {
                options: Some(labels),
                ..
            } => json!({
                "multi_select": labels.iter().map(|l| json!({ "name": l })).collect::<Vec<_>>()
            }),
            Self::Date {
                range: Some(range), ..
            } => json!({ "date": range.to_wire() }),
            _ => return Err(self.unset_error("serialize")),
        };
        Ok((self.name().to_owned(), value))
    }

    /// Read a property of `kind` named `name` from a row's `properties` map.
    ///
    /// A null select or date is read as an unset property; a missing field or
    /// one of another type is a parse error.
    pub fn from_wire(
        kind: PropertyKind,
        name: &str,
        properties: &Value,
        default_offset: FixedOffset,
    ) -> Result<Self> {
        let field = properties
            .get(name)
            .ok_or_else(|| NotesError::parse(format!("row has no `{name}` property")))?;
        if let Some(actual) = field.get("type").and_then(Value::as_str)
            && actual != kind.wire_key()
        {
            return Err(NotesError::parse(format!(
                "property `{name}` is `{actual}`, expected `{kind}`"
            )));
        }
        let raw = field
            .get(kind.wire_key())
            .ok_or_else(|| mistyped(name, kind))?;
        let name = name.to_owned();
        let parsed = match kind {
            PropertyKind::Title => {
                let pieces = raw.as_array().ok_or_else(|| mistyped(&name, kind))?;
                let text: String = pieces.iter().filter_map(rich_text_content).collect();
                Self::Title {
                    name,
                    text: Some(text),
                }
            }
            PropertyKind::Checkbox => Self::Checkbox {
                checked: Some(raw.as_bool().ok_or_else(|| mistyped(&name, kind))?),
                name,
            },
            PropertyKind::Select => {
                let selected = match raw {
                    Value::Null => None,
                    option => Some(option_name(option).ok_or_else(|| mistyped(&name, kind))?),
                };
                Self::Select { name, selected }
            }
            PropertyKind::MultiSelect => {
                let items = raw.as_array().ok_or_else(|| mistyped(&name, kind))?;
                let options = items
                    .iter()
                    .map(|item| option_name(item).ok_or_else(|| mistyped(&name, kind)))
                    .collect::<Result<Vec<_>>>()?;
                Self::MultiSelect {
                    name,
                    options: Some(options),
                }
            }
            PropertyKind::Date => {
                let range = match raw {
                    Value::Null => None,
                    value => Some(DateRange::from_wire(value, default_offset)?),
                };
                Self::Date { name, range }
            }
        };
        Ok(parsed)
    }

    /// Build a filter fragment for `op` against the bound value.
    ///
    /// # Errors
    ///
    /// [`NotesError::Precondition`] when the operator does not apply to this
    /// kind, or when it needs a value and none is bound.
    pub fn filter(&self, op: FilterOp) -> Result<Filter> {
        let kind = self.kind();
        if !kind.supports(op) {
            return Err(NotesError::precondition(format!(
                "`{op}` is not a {kind} operator (property `{}`)",
                self.name()
            )));
        }
        if !op.takes_operand() {
            return Ok(self.fragment(op, json!({})));
        }
        match self {
            Self::Title {
                text: Some(text), ..
            } => Ok(self.fragment(op, json!(text))),
            Self::Checkbox {
                checked: Some(checked),
                ..
            } => Ok(self.fragment(op, json!(checked))),
            Self::Select {
                selected: Some(label),
                ..
            } => Ok(self.fragment(op, json!(label))),
            Self::Date {
                range: Some(range), ..
            } => Ok(self.fragment(op, json!(stringify(&range.begin)))),
            Self::MultiSelect {
                options: Some(labels),
                ..
            } => {
                let mut fragments: Vec<Filter> = labels
                    .iter()
                    .map(|label| self.fragment(op, json!(label)))
                    .collect();
                match fragments.len() {
                    0 => Err(NotesError::precondition(format!(
                        "`{op}` on `{}` needs at least one label",
                        self.name()
                    ))),
                    1 => Ok(fragments.remove(0)),
                    _ => Ok(Filter::And(fragments)),
                }
            }
            _ => Err(self.unset_error(op.as_str())),
        }
    }

    pub fn equals(&self) -> Result<Filter> {
        self.filter(FilterOp::Equals)
    }

    pub fn does_not_equal(&self) -> Result<Filter> {
        self.filter(FilterOp::DoesNotEqual)
    }

    pub fn contains(&self) -> Result<Filter> {
        self.filter(FilterOp::Contains)
    }

    pub fn does_not_contain(&self) -> Result<Filter> {
        self.filter(FilterOp::DoesNotContain)
    }

    pub fn before(&self) -> Result<Filter> {
        self.filter(FilterOp::Before)
    }

    pub fn after(&self) -> Result<Filter> {
        self.filter(FilterOp::After)
    }

    pub fn on_or_after(&self) -> Result<Filter> {
        self.filter(FilterOp::OnOrAfter)
    }

    pub fn on_or_before(&self) -> Result<Filter> {
        self.filter(FilterOp::OnOrBefore)
    }

    pub fn next_week(&self) -> Result<Filter> {
        self.filter(FilterOp::NextWeek)
    }

    pub fn ascending(&self) -> Sort {
        Sort::ascending(self.name())
    }

    pub fn descending(&self) -> Sort {
        Sort::descending(self.name())
    }

    fn fragment(&self, op: FilterOp, operand: Value) -> Filter {
        Filter::Property {
            property: self.name().to_owned(),
            kind: self.kind(),
            op,
            operand,
        }
    }

    fn unset_error(&self, action: &str) -> NotesError {
        NotesError::precondition(format!(
            "cannot {action} {} property `{}` without a value",
            self.kind(),
            self.name()
        ))
    }
}

fn mistyped(name: &str, kind: PropertyKind) -> NotesError {
    NotesError::parse(format!("property `{name}` has no valid `{kind}` value"))
}

fn option_name(option: &Value) -> Option<String> {
    option.get("name").and_then(Value::as_str).map(str::to_owned)
}

fn rich_text_content(piece: &Value) -> Option<&str> {
    piece
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| piece.pointer("/text/content").and_then(Value::as_str))
}
