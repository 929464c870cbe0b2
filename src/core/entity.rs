//! Entity trait defining the core abstraction for all stored records

use crate::core::query::SortSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// Base trait for every record kept in the hosted store.
///
/// All entities have:
/// - id: Unique identifier
/// - a table they live in
/// - created_at: Creation timestamp
/// - a fixed list of text columns used by free-text search
///
/// Rows travel as JSON objects; `from_row`/`to_row` go through serde.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The table name in the store (e.g., "pickup_requests")
    fn table() -> &'static str;

    /// The singular name used in messages (e.g., "pickup request")
    fn singular() -> &'static str;

    /// Text columns searched by a free-text term
    fn search_columns() -> &'static [&'static str] {
        &[]
    }

    /// Alternate column name from an older schema generation, if the
    /// given column was renamed by a migration that may still be in flight
    fn legacy_column(_column: &str) -> Option<&'static str> {
        None
    }

    /// Order applied when the caller does not ask for one
    fn default_sort() -> SortSpec {
        SortSpec::desc("created_at")
    }

    // === Core Entity Fields ===

    /// Get the unique identifier for this entity instance
    fn id(&self) -> Uuid;

    /// Get the creation timestamp
    fn created_at(&self) -> DateTime<Utc>;

    // === Utility Methods ===

    /// Decode a store row
    fn from_row(row: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(row)
    }

    /// Encode for insertion
    fn to_row(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
