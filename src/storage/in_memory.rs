//! In-memory implementation of DataStore for testing and development

use crate::core::entity::Entity;
use crate::core::field::{compare_json, json_text};
use crate::core::filter::Predicate;
use crate::core::query::SortDirection;
use crate::core::store::{DataStore, SelectQuery, SelectResult, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Table {
    rows: Vec<Value>,
    /// Declared schema; `None` accepts any column
    columns: Option<HashSet<String>>,
    unique: Vec<String>,
}

impl Table {
    fn check_column(&self, table: &str, column: &str) -> Result<(), StoreError> {
        match &self.columns {
            Some(columns) if !columns.contains(column) => Err(StoreError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn check_row(&self, table: &str, row: &Map<String, Value>) -> Result<(), StoreError> {
        row.keys().try_for_each(|column| self.check_column(table, column))
    }

    fn check_unique(
        &self,
        table: &str,
        row: &Map<String, Value>,
        skip: Option<usize>,
    ) -> Result<(), StoreError> {
        self.check_unique_in(&self.rows, table, row, skip)
    }

    /// Unique-column check of `row` against `rows`, ignoring index `skip`
    fn check_unique_in(
        &self,
        rows: &[Value],
        table: &str,
        row: &Map<String, Value>,
        skip: Option<usize>,
    ) -> Result<(), StoreError> {
        for column in &self.unique {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = rows
                .iter()
                .enumerate()
                .any(|(i, existing)| Some(i) != skip && existing.get(column) == Some(value));
            if clash {
                return Err(StoreError::UniqueViolation {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn matching(&self, predicates: &[Predicate]) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| predicates.iter().all(|p| matches(row, p)))
            .map(|(i, _)| i)
            .collect()
    }

    fn position(&self, id: &Uuid) -> Option<usize> {
        let id = id.to_string();
        self.rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id.as_str()))
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Table>,
    selects: HashMap<String, usize>,
    failures: HashMap<String, StoreError>,
}

impl State {
    fn table_mut(&mut self, table: &str) -> &mut Table {
        self.tables.entry(table.to_string()).or_default()
    }

    /// Take the failure armed for a table, if any
    fn injected(&mut self, table: &str) -> Result<(), StoreError> {
        match self.failures.remove(table) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory data store
///
/// Rows are JSON objects kept per table. Tables may declare their columns
/// (queries and writes touching other columns then fail with
/// `MissingColumn`, the way a real schema would) and unique columns.
/// Selects are counted per table and a failure can be armed for the next
/// request against a table.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the columns of a table
    pub fn with_columns(self, table: &str, columns: &[&str]) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.table_mut(table).columns =
                Some(columns.iter().map(|c| (*c).to_string()).collect());
        }
        self
    }

    /// Declare a unique column
    pub fn with_unique(self, table: &str, column: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.table_mut(table).unique.push(column.to_string());
        }
        self
    }

    /// Insert entities directly, bypassing failure injection and counters
    pub fn seed<T: Entity>(&self, entities: &[T]) -> Result<(), StoreError> {
        for entity in entities {
            let row = entity
                .to_row()
                .map_err(|e| StoreError::Malformed(e.to_string()))?;
            self.insert_row(T::table(), row)?;
        }
        Ok(())
    }

    /// Insert one raw row, bypassing failure injection and counters
    pub fn insert_row(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let mut state = self.write()?;
        insert_into(state.table_mut(table), table, row)
    }

    /// All rows of a table in insertion order
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.tables.get(table).map(|t| t.rows.clone()))
            .unwrap_or_default()
    }

    /// Number of selects issued against a table, failed ones included
    pub fn select_count(&self, table: &str) -> usize {
        self.state
            .read()
            .ok()
            .and_then(|state| state.selects.get(table).copied())
            .unwrap_or(0)
    }

    /// Make the next request against `table` fail with `err`
    pub fn fail_next(&self, table: &str, err: StoreError) {
        if let Ok(mut state) = self.state.write() {
            state.failures.insert(table.to_string(), err);
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Connection(format!("failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Connection(format!("failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError> {
        {
            let mut state = self.write()?;
            *state.selects.entry(query.table.clone()).or_default() += 1;
            state.injected(&query.table)?;
        }

        let state = self.read()?;
        let Some(table) = state.tables.get(&query.table) else {
            return Ok(SelectResult {
                rows: Vec::new(),
                total: query.count.then_some(0),
            });
        };

        for predicate in &query.predicates {
            for column in predicate.columns() {
                table.check_column(&query.table, column)?;
            }
        }
        if let Some(order) = &query.order {
            table.check_column(&query.table, &order.field)?;
        }
        for column in query.columns.iter().flatten() {
            table.check_column(&query.table, column)?;
        }

        let mut rows: Vec<&Value> = table
            .matching(&query.predicates)
            .into_iter()
            .map(|i| &table.rows[i])
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_json(
                    a.get(&order.field).unwrap_or(&Value::Null),
                    b.get(&order.field).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let total = rows.len();
        let window: Vec<Value> = match query.range {
            Some(range) => rows
                .into_iter()
                .skip(range.offset)
                .take(range.count)
                .cloned()
                .collect(),
            None => rows.into_iter().cloned().collect(),
        };
        let rows = match &query.columns {
            Some(columns) => window.into_iter().map(|row| project(row, columns)).collect(),
            None => window,
        };

        Ok(SelectResult {
            rows,
            total: query.count.then_some(total),
        })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let mut state = self.write()?;
        state.injected(table)?;
        insert_into(state.table_mut(table), table, row)
    }

    async fn update(&self, table: &str, id: &Uuid, patch: Value) -> Result<Value, StoreError> {
        let mut state = self.write()?;
        state.injected(table)?;
        let target = state.table_mut(table);
        let patch = as_object(patch)?;
        target.check_row(table, &patch)?;

        let index = target.position(id).ok_or_else(|| StoreError::RowNotFound {
            table: table.to_string(),
            id: *id,
        })?;
        let merged = merge(&target.rows[index], &patch);
        target.check_unique(table, &merged, Some(index))?;

        let row = Value::Object(merged);
        target.rows[index] = row.clone();
        Ok(row)
    }

    async fn update_where(
        &self,
        table: &str,
        predicates: &[Predicate],
        patch: Value,
    ) -> Result<usize, StoreError> {
        let mut state = self.write()?;
        state.injected(table)?;
        let target = state.table_mut(table);
        let patch = as_object(patch)?;
        target.check_row(table, &patch)?;

        // stage every patched row and validate the whole table before writing
        let indices = target.matching(predicates);
        let mut staged = target.rows.clone();
        for &index in &indices {
            staged[index] = Value::Object(merge(&target.rows[index], &patch));
        }
        for &index in &indices {
            if let Value::Object(merged) = &staged[index] {
                target.check_unique_in(&staged, table, merged, Some(index))?;
            }
        }
        target.rows = staged;
        Ok(indices.len())
    }

    async fn delete(&self, table: &str, id: &Uuid) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.injected(table)?;
        let target = state.table_mut(table);
        let index = target.position(id).ok_or_else(|| StoreError::RowNotFound {
            table: table.to_string(),
            id: *id,
        })?;
        target.rows.remove(index);
        Ok(())
    }

    async fn delete_where(&self, table: &str, predicates: &[Predicate]) -> Result<usize, StoreError> {
        let mut state = self.write()?;
        state.injected(table)?;
        let target = state.table_mut(table);
        let before = target.rows.len();
        target
            .rows
            .retain(|row| !predicates.iter().all(|p| matches(row, p)));
        Ok(before - target.rows.len())
    }
}

fn insert_into(target: &mut Table, table: &str, row: Value) -> Result<Value, StoreError> {
    let row = as_object(row)?;
    target.check_row(table, &row)?;
    target.check_unique(table, &row, None)?;
    let row = Value::Object(row);
    target.rows.push(row.clone());
    Ok(row)
}

fn as_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn merge(row: &Value, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = row.as_object().cloned().unwrap_or_default();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn project(row: Value, columns: &[String]) -> Value {
    let Value::Object(map) = row else {
        return row;
    };
    Value::Object(
        map.into_iter()
            .filter(|(key, _)| columns.contains(key))
            .collect(),
    )
}

/// Whether a row satisfies a predicate; comparisons against null never match
fn matches(row: &Value, predicate: &Predicate) -> bool {
    let field = |column: &str| row.get(column).unwrap_or(&Value::Null);
    match predicate {
        Predicate::Eq { column, value } => value.matches_json(field(column)),
        Predicate::In { column, values } => values.iter().any(|v| v.matches_json(field(column))),
        Predicate::Gte { column, value } => {
            let stored = field(column);
            !stored.is_null()
                && matches!(
                    compare_json(stored, &value.to_json()),
                    Some(Ordering::Greater | Ordering::Equal)
                )
        }
        Predicate::Lte { column, value } => {
            let stored = field(column);
            !stored.is_null()
                && matches!(
                    compare_json(stored, &value.to_json()),
                    Some(Ordering::Less | Ordering::Equal)
                )
        }
        Predicate::Search { columns, term } => {
            let term = term.to_lowercase();
            columns.iter().any(|column| {
                json_text(field(column)).is_some_and(|text| text.to_lowercase().contains(&term))
            })
        }
    }
}
