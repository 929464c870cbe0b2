//! # wastewise
//!
//! Data-retrieval core of a multi-role waste-collection platform
//! (residents, collectors, admins) backed by a hosted relational store.
//!
//! ## Features
//!
//! - **Filter/Sort/Pagination contract**: one request shape for every list
//! - **Query translation**: typed filters become store selects, with
//!   tolerance for the renamed payment reference column
//! - **Customer details**: per-collector resident view joined from
//!   subscriptions, payments and pickups fetched concurrently
//! - **Live views**: page state machines that discard stale responses
//! - **Services**: audited mutation flows and an admin dashboard
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wastewise::prelude::*;
//!
//! let hub = ServiceHub::new(Arc::new(InMemoryStore::new()), &AppConfig::default());
//!
//! let page = hub
//!     .translator()
//!     .fetch_page(
//!         &PickupFilter { area: Some("Osu".into()), ..Default::default() },
//!         PageRequest::new(1, 20),
//!         Some(SortSpec::desc("scheduled_date")),
//!     )
//!     .await?;
//! println!("{} of {}", page.data.len(), page.pagination.total);
//! ```

pub mod config;
pub mod core;
pub mod models;
pub mod query;
pub mod server;
pub mod services;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        DataStore, Entity, EntityEvent, EntityFilter, EventBus, PageLimits, PageParams,
        PageRequest, PaginatedResponse, PaginationMeta, Predicate, QueryError, SelectQuery,
        ServiceError, SortDirection, SortSpec, StoreError,
    };

    // === Models ===
    pub use crate::models::*;

    // === Read side ===
    pub use crate::query::{
        CustomerDetails, CustomerDetailsComposer, CustomerFilter, EntityPageSource, PageSource,
        QueryTranslator, QueryView, SchemaGate, SchemaGeneration, ViewState, ViewStatus,
    };

    // === Services ===
    pub use crate::services::{ServiceContext, ServiceHub};

    // === Storage ===
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "postgrest")]
    pub use crate::storage::PostgrestStore;

    // === Config and server ===
    pub use crate::config::AppConfig;
    pub use crate::server::ServerBuilder;

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, NaiveDate, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
