//! Query filter and sort fragments.
//!
//! Fragments are produced by [`Property`](super::property::Property) and
//! combined here; this module only knows how they look on the wire.

use super::property::PropertyKind;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Comparison operators understood by the database filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    DoesNotEqual,
    Contains,
    DoesNotContain,
    Before,
    After,
    OnOrAfter,
    OnOrBefore,
    /// Relative operator, no operand.
    NextWeek,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::DoesNotEqual => "does_not_equal",
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
            Self::Before => "before",
            Self::After => "after",
            Self::OnOrAfter => "on_or_after",
            Self::OnOrBefore => "on_or_before",
            Self::NextWeek => "next_week",
        }
    }

    /// Whether the operator needs a bound value.
    pub fn takes_operand(self) -> bool {
        !matches!(self, Self::NextWeek)
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter predicate, either over one property or a boolean combination.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Property {
        property: String,
        kind: PropertyKind,
        op: FilterOp,
        operand: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Wire JSON for this predicate.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Property {
                property,
                kind,
                op,
                operand,
            } => {
                let mut condition = Map::new();
                condition.insert(op.as_str().to_owned(), operand.clone());
                let mut fragment = Map::new();
                fragment.insert("property".into(), json!(property));
                fragment.insert(kind.wire_key().to_owned(), Value::Object(condition));
                Value::Object(fragment)
            }
            Self::And(filters) => json!({ "and": filters.iter().map(Self::to_wire).collect::<Vec<_>>() }),
            Self::Or(filters) => json!({ "or": filters.iter().map(Self::to_wire).collect::<Vec<_>>() }),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort key over one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Descending,
        }
    }
}
