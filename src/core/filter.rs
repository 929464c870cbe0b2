//! Predicate model shared by every entity filter
//!
//! A filter is a plain struct of optional fields. `EntityFilter::predicates`
//! turns the fields that are set into store constraints; an empty filter
//! yields no constraints at all.

use crate::core::entity::Entity;
use crate::core::field::FieldValue;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};

/// A single constraint applied to a store query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Exact match
    Eq { column: String, value: FieldValue },

    /// Value in set
    In {
        column: String,
        values: Vec<FieldValue>,
    },

    /// Inclusive lower bound
    Gte { column: String, value: FieldValue },

    /// Inclusive upper bound
    Lte { column: String, value: FieldValue },

    /// Case-insensitive substring match OR-ed across columns
    Search { columns: Vec<String>, term: String },
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn in_list<V: Into<FieldValue>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Gte {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn lte(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Lte {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn search(columns: &[&str], term: impl Into<String>) -> Self {
        Predicate::Search {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            term: term.into(),
        }
    }

    /// Every column this predicate touches
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Gte { column, .. }
            | Predicate::Lte { column, .. } => vec![column.as_str()],
            Predicate::Search { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Replace a column name wherever it appears. Returns true if anything changed.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Gte { column, .. }
            | Predicate::Lte { column, .. } => {
                if column == from {
                    *column = to.to_string();
                    return true;
                }
                false
            }
            Predicate::Search { columns, .. } => {
                let mut changed = false;
                for column in columns.iter_mut().filter(|c| c.as_str() == from) {
                    *column = to.to_string();
                    changed = true;
                }
                changed
            }
        }
    }
}

/// A typed filter for one entity
pub trait EntityFilter: Default + Clone + std::fmt::Debug + Send + Sync + 'static {
    /// The entity this filter applies to
    type Entity: Entity;

    /// Equality, set-membership and range constraints for the fields that are set
    fn predicates(&self) -> Vec<Predicate>;

    /// Free-text search term, matched against `Entity::search_columns`
    fn search_term(&self) -> Option<&str> {
        None
    }
}

/// Push an equality predicate when the value is set
pub(crate) fn push_eq<V: Into<FieldValue> + Clone>(
    out: &mut Vec<Predicate>,
    column: &str,
    value: &Option<V>,
) {
    if let Some(v) = value {
        out.push(Predicate::eq(column, v.clone()));
    }
}

/// Push a set-membership predicate when the list is set
///
/// An empty set matches nothing.
pub(crate) fn push_in<V: Serialize>(out: &mut Vec<Predicate>, column: &str, values: &Option<Vec<V>>) {
    if let Some(values) = values {
        out.push(Predicate::In {
            column: column.to_string(),
            values: values.iter().map(enum_value).collect(),
        });
    }
}

/// Push inclusive range bounds when set
pub(crate) fn push_range<V: Into<FieldValue> + Clone>(
    out: &mut Vec<Predicate>,
    column: &str,
    min: &Option<V>,
    max: &Option<V>,
) {
    if let Some(min) = min {
        out.push(Predicate::gte(column, min.clone()));
    }
    if let Some(max) = max {
        out.push(Predicate::lte(column, max.clone()));
    }
}

/// Push whole-day bounds for a timestamp column
pub(crate) fn push_day_range(
    out: &mut Vec<Predicate>,
    column: &str,
    start: &Option<NaiveDate>,
    end: &Option<NaiveDate>,
) {
    push_range(out, column, &start.map(day_start), &end.map(day_end));
}

/// Serialize a serde value (usually a unit enum variant) into a predicate operand
pub(crate) fn enum_value<V: Serialize>(value: &V) -> FieldValue {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => FieldValue::String(s),
        Ok(serde_json::Value::Bool(b)) => FieldValue::Boolean(b),
        Ok(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or_default()),
        },
        _ => FieldValue::Null,
    }
}

/// First instant of a day
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable microsecond of a day
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    date.and_time(end).and_utc()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Csv(String),
    List(Vec<String>),
}

/// Deserialize a list filter from either a JSON array or a comma-separated string
///
/// Query strings carry `status=requested,scheduled`; JSON bodies may carry
/// `"status": ["requested", "scheduled"]`. A blank value means "no constraint".
pub fn deserialize_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    let items: Vec<String> = match raw {
        None => return Ok(None),
        Some(OneOrMany::Csv(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(OneOrMany::List(list)) => list,
    };
    if items.is_empty() {
        return Ok(None);
    }

    items
        .into_iter()
        .map(|item| {
            T::deserialize(item.as_str().into_deserializer())
                .map_err(|e: serde::de::value::Error| serde::de::Error::custom(e))
        })
        .collect::<Result<Vec<T>, D::Error>>()
        .map(Some)
}
