//! Typed error handling
//!
//! # Error Categories
//!
//! - [`StoreError`](crate::core::store::StoreError): raw failures reported by a store backend
//! - [`QueryError`]: a read through the query layer failed; always names the
//!   entity and operation that failed
//! - [`ServiceError`]: everything a service or HTTP handler can return
//!
//! "No data" is never an error: a query that matches nothing returns an
//! empty page.
//!
//! # Example
//!
//! ```rust,ignore
//! match hub.payments.delete(id, actor).await {
//!     Ok(()) => {}
//!     Err(ServiceError::NotFound { id, .. }) => println!("payment {} is gone", id),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use crate::core::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A read through the query layer failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// The store rejected or failed the request
    #[error("failed to {operation} {entity}: {source}")]
    Store {
        entity: &'static str,
        operation: &'static str,
        source: StoreError,
    },

    /// A row came back in a shape the entity cannot be decoded from
    #[error("failed to decode {entity} row: {message}")]
    Decode {
        entity: &'static str,
        message: String,
    },
}

impl QueryError {
    /// Wrap a store error and log it
    pub fn store(entity: &'static str, operation: &'static str, source: StoreError) -> Self {
        tracing::error!(entity, operation, error = %source, "store query failed");
        QueryError::Store {
            entity,
            operation,
            source,
        }
    }

    pub fn decode(entity: &'static str, err: impl std::fmt::Display) -> Self {
        tracing::error!(entity, error = %err, "failed to decode row");
        QueryError::Decode {
            entity,
            message: err.to_string(),
        }
    }

    /// The underlying store error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            QueryError::Store { source, .. } => Some(source),
            QueryError::Decode { .. } => None,
        }
    }
}

/// Errors returned by services and HTTP handlers
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A mutation was rejected by the store
    #[error("failed to {operation} {entity}: {source}")]
    Store {
        entity: &'static str,
        operation: &'static str,
        source: StoreError,
    },

    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Lookup by a natural key (e.g. a payment reference) found nothing
    #[error("{entity} '{key}' not found")]
    KeyNotFound { entity: &'static str, key: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    /// Wrap a store error raised by a mutation and log it
    pub fn store(entity: &'static str, operation: &'static str, source: StoreError) -> Self {
        tracing::error!(entity, operation, error = %source, "store mutation failed");
        ServiceError::Store {
            entity,
            operation,
            source,
        }
    }

    fn store_error(&self) -> Option<&StoreError> {
        match self {
            ServiceError::Query(q) => q.store_error(),
            ServiceError::Store { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Query(_) | ServiceError::Store { .. } => match self.store_error() {
                Some(StoreError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
                Some(StoreError::RowNotFound { .. }) => StatusCode::NOT_FOUND,
                Some(StoreError::UniqueViolation { .. }) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::NotFound { .. } | ServiceError::KeyNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Query(_) => "QUERY_FAILED",
            ServiceError::Store { .. } => "STORE_ERROR",
            ServiceError::NotFound { .. } | ServiceError::KeyNotFound { .. } => "NOT_FOUND",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ServiceError::Forbidden(_) => "FORBIDDEN",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    /// Get additional details for the error
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::NotFound { entity, id } => Some(serde_json::json!({
                "entity": entity,
                "id": id.to_string()
            })),
            ServiceError::InvalidTransition { from, to, .. } => Some(serde_json::json!({
                "from": from,
                "to": to
            })),
            _ => match self.store_error() {
                Some(StoreError::MissingColumn { table, column }) => Some(serde_json::json!({
                    "table": table,
                    "column": column
                })),
                _ => None,
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}
