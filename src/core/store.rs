//! Store capability consumed by the query layer
//!
//! The hosted data store is treated as an opaque collaborator: given a
//! table name it accepts a fluent select (equality, set membership,
//! inclusive ranges, case-insensitive search, order, offset/count range
//! and an exact row count) plus row-level insert, update and delete.

use crate::core::field::FieldValue;
use crate::core::filter::Predicate;
use crate::core::query::SortSpec;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors reported by a store backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("column '{column}' does not exist on '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("row '{id}' not found in '{table}'")]
    RowNotFound { table: String, id: Uuid },

    #[error("duplicate value for unique column '{column}' on '{table}'")]
    UniqueViolation { table: String, column: String },

    #[error("malformed row: {0}")]
    Malformed(String),
}

impl StoreError {
    /// The missing column, if this is a schema mismatch
    pub fn missing_column(&self) -> Option<&str> {
        match self {
            StoreError::MissingColumn { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// Offset/count window of a select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub offset: usize,
    pub count: usize,
}

/// A fluent select against one table
///
/// # Example
///
/// ```rust,ignore
/// let query = SelectQuery::from("pickup_requests")
///     .eq("collector_id", collector_id)
///     .in_list("status", ["requested", "scheduled"])
///     .order(SortSpec::desc("scheduled_date"))
///     .range(0, 20)
///     .count_exact();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub predicates: Vec<Predicate>,
    pub order: Option<SortSpec>,
    pub range: Option<RowRange>,
    pub count: bool,
}

impl SelectQuery {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            predicates: Vec::new(),
            order: None,
            range: None,
            count: false,
        }
    }

    /// Restrict the returned columns
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Predicate::eq(column, value))
    }

    pub fn in_list<V: Into<FieldValue>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(Predicate::in_list(column, values))
    }

    pub fn gte(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Predicate::gte(column, value))
    }

    pub fn lte(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Predicate::lte(column, value))
    }

    pub fn search(self, columns: &[&str], term: &str) -> Self {
        self.filter(Predicate::search(columns, term))
    }

    pub fn order(mut self, sort: SortSpec) -> Self {
        self.order = Some(sort);
        self
    }

    pub fn range(mut self, offset: usize, count: usize) -> Self {
        self.range = Some(RowRange { offset, count });
        self
    }

    /// Ask the store for the exact number of matching rows
    pub fn count_exact(mut self) -> Self {
        self.count = true;
        self
    }

    /// Rename a column in every predicate; returns true if any predicate changed
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for predicate in &mut self.predicates {
            changed |= predicate.rename_column(from, to);
        }
        changed
    }
}

/// Rows returned by a select
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectResult {
    pub rows: Vec<Value>,

    /// Exact number of matching rows, when `count_exact` was requested
    pub total: Option<usize>,
}

/// Capability trait for the hosted data store
///
/// Implementations must be cheap to share behind an `Arc` and are
/// responsible for their own concurrency control.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run a select
    async fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError>;

    /// Insert one row, returning it as stored
    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    /// Apply a targeted patch to one row by id, returning the updated row
    async fn update(&self, table: &str, id: &Uuid, patch: Value) -> Result<Value, StoreError>;

    /// Apply a patch to every matching row, returning how many changed
    async fn update_where(
        &self,
        table: &str,
        predicates: &[Predicate],
        patch: Value,
    ) -> Result<usize, StoreError>;

    /// Delete one row by id
    async fn delete(&self, table: &str, id: &Uuid) -> Result<(), StoreError>;

    /// Delete every matching row, returning how many were removed
    async fn delete_where(&self, table: &str, predicates: &[Predicate]) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_constraints() {
        let id = Uuid::new_v4();
        let query = SelectQuery::from("pickup_requests")
            .columns(&["user_id"])
            .eq("collector_id", id)
            .in_list("status", ["requested", "scheduled"])
            .gte("scheduled_date", "2026-01-01")
            .search(&["area", "notes"], "oak")
            .order(SortSpec::desc("scheduled_date"))
            .range(20, 20)
            .count_exact();

        assert_eq!(query.table, "pickup_requests");
        assert_eq!(query.columns, Some(vec!["user_id".to_string()]));
        assert_eq!(query.predicates.len(), 4);
        assert_eq!(query.range, Some(RowRange { offset: 20, count: 20 }));
        assert!(query.count);
    }

    #[test]
    fn test_rename_column_in_query() {
        let mut query = SelectQuery::from("payments").search(&["reference_number"], "REF");
        assert!(query.rename_column("reference_number", "reference"));
        assert!(!query.rename_column("reference_number", "reference"));
    }

    #[test]
    fn test_missing_column_accessor() {
        let err = StoreError::MissingColumn {
            table: "payments".to_string(),
            column: "reference_number".to_string(),
        };
        assert_eq!(err.missing_column(), Some("reference_number"));
        assert_eq!(StoreError::Connection("x".into()).missing_column(), None);
        assert_eq!(
            err.to_string(),
            "column 'reference_number' does not exist on 'payments'"
        );
    }
}
