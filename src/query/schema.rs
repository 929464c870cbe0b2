//! Schema generation gate
//!
//! A migration renamed `payments.reference` to `payments.reference_number`
//! and both shapes may be live at once. Entities declare the rename through
//! [`Entity::legacy_column`]; the gate decides which name a query uses.
//!
//! - `Current` / `Legacy` pin a generation and never guess.
//! - `Auto` uses the current names, and the first time the store reports a
//!   renamed column as missing it retries once with the legacy names. The
//!   outcome is remembered per table.

use crate::core::entity::Entity;
use crate::core::store::{SelectQuery, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Which column names a table is expected to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaGeneration {
    #[default]
    Auto,
    Current,
    Legacy,
}

#[derive(Debug, Default)]
pub struct SchemaGate {
    generation: SchemaGeneration,
    learned: RwLock<HashMap<&'static str, SchemaGeneration>>,
}

impl SchemaGate {
    pub fn new(generation: SchemaGeneration) -> Self {
        Self {
            generation,
            learned: RwLock::new(HashMap::new()),
        }
    }

    /// The configured generation
    pub fn generation(&self) -> SchemaGeneration {
        self.generation
    }

    /// Generation in effect for an entity's table
    ///
    /// Returns `Auto` while nothing has been learned yet.
    pub fn effective<T: Entity>(&self) -> SchemaGeneration {
        if self.generation != SchemaGeneration::Auto {
            return self.generation;
        }
        self.learned
            .read()
            .ok()
            .and_then(|learned| learned.get(T::table()).copied())
            .unwrap_or(SchemaGeneration::Auto)
    }

    /// Record which generation a table turned out to be on (`Auto` mode only)
    pub fn learn<T: Entity>(&self, generation: SchemaGeneration) {
        if self.generation != SchemaGeneration::Auto || generation == SchemaGeneration::Auto {
            return;
        }
        if let Ok(mut learned) = self.learned.write() {
            let previous = learned.insert(T::table(), generation);
            if previous != Some(generation) {
                tracing::info!(table = T::table(), ?generation, "schema generation resolved");
            }
        }
    }

    /// Physical name of a logical column
    pub fn column<T: Entity>(&self, logical: &str) -> String {
        match (self.effective::<T>(), T::legacy_column(logical)) {
            (SchemaGeneration::Legacy, Some(legacy)) => legacy.to_string(),
            _ => logical.to_string(),
        }
    }

    /// Rewrite a query to the generation in effect
    pub fn prepare<T: Entity>(&self, query: SelectQuery) -> SelectQuery {
        if self.effective::<T>() == SchemaGeneration::Legacy {
            return to_legacy::<T>(&query).unwrap_or(query);
        }
        query
    }

    /// Whether a query touches any renamed column
    pub fn is_sensitive<T: Entity>(&self, query: &SelectQuery) -> bool {
        to_legacy::<T>(query).is_some()
    }

    /// The single retry allowed after a failure
    ///
    /// Only offered in `Auto` mode, before the table has been resolved,
    /// when the store reports one of the entity's renamed columns missing.
    pub fn fallback<T: Entity>(&self, query: &SelectQuery, err: &StoreError) -> Option<SelectQuery> {
        if self.effective::<T>() != SchemaGeneration::Auto {
            return None;
        }
        let missing = err.missing_column()?;
        T::legacy_column(missing)?;
        let retry = to_legacy::<T>(query)?;
        tracing::warn!(
            table = T::table(),
            column = missing,
            "column missing, retrying with legacy schema"
        );
        Some(retry)
    }
}

/// Copy of the query with every renamed column mapped to its legacy name
fn to_legacy<T: Entity>(query: &SelectQuery) -> Option<SelectQuery> {
    let mut renamed = query.clone();
    let mut changed = false;

    let columns: Vec<String> = query
        .predicates
        .iter()
        .flat_map(|p| p.columns())
        .map(str::to_string)
        .collect();
    for column in columns {
        if let Some(legacy) = T::legacy_column(&column) {
            changed |= renamed.rename_column(&column, legacy);
        }
    }

    if let Some(order) = renamed.order.as_mut()
        && let Some(legacy) = T::legacy_column(&order.field)
    {
        order.field = legacy.to_string();
        changed = true;
    }

    if let Some(columns) = renamed.columns.as_mut() {
        for column in columns.iter_mut() {
            if let Some(legacy) = T::legacy_column(column) {
                *column = legacy.to_string();
                changed = true;
            }
        }
    }

    changed.then_some(renamed)
}
