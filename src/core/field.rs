//! Field value types and row comparison helpers

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

/// A polymorphic field value that can hold different types
///
/// Used as the operand of every predicate sent to a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Render the value the way it is stored in a JSON row
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Null => Value::Null,
        }
    }

    /// Render the value as plain text, as used in URL filters
    pub fn to_text(&self) -> String {
        match self.to_json() {
            Value::String(s) => s,
            Value::Null => "null".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether a stored JSON value equals this operand
    pub fn matches_json(&self, stored: &Value) -> bool {
        compare_json(stored, &self.to_json()) == Some(Ordering::Equal)
    }
}

macro_rules! field_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for FieldValue {
                fn from(value: $source) -> Self {
                    FieldValue::$variant(value.into())
                }
            }
        )*
    };
}

field_value_from!(
    String => String,
    &str => String,
    i64 => Integer,
    f64 => Float,
    bool => Boolean,
    Uuid => Uuid,
    DateTime<Utc> => DateTime,
    NaiveDate => Date,
);

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compare two stored JSON values.
///
/// Numbers compare numerically, RFC3339 timestamps and ISO dates
/// chronologically, other strings lexicographically. `Null` is greater
/// than everything else so it sorts last in ascending order. Returns
/// `None` for values of incompatible shapes.
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Greater),
        (_, Value::Null) => Some(Ordering::Less),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => {
            if let (Some(dx), Some(dy)) = (parse_instant(x), parse_instant(y)) {
                return Some(dx.cmp(&dy));
            }
            if let (Ok(dx), Ok(dy)) = (x.parse::<NaiveDate>(), y.parse::<NaiveDate>()) {
                return Some(dx.cmp(&dy));
            }
            Some(x.cmp(y))
        }
        _ => None,
    }
}

/// Plain-text rendering of a stored value for substring search
pub fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
