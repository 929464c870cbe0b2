//! Core module containing the fundamental traits and types

pub mod entity;
pub mod error;
pub mod events;
pub mod field;
pub mod filter;
pub mod query;
pub mod store;

pub use entity::Entity;
pub use error::{ErrorResponse, QueryError, ServiceError};
pub use events::{EntityEvent, EventBus, EventEnvelope};
pub use field::FieldValue;
pub use filter::{EntityFilter, Predicate};
pub use query::{
    PageLimits, PageParams, PageRequest, PaginatedResponse, PaginationMeta, SortDirection,
    SortSpec,
};
pub use store::{DataStore, RowRange, SelectQuery, SelectResult, StoreError};
