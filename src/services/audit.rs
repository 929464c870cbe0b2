//! Audit trail

use crate::core::entity::Entity;
use crate::core::error::{QueryError, ServiceError};
use crate::core::events::{EntityEvent, EventBus};
use crate::core::filter::Predicate;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{AuditLog, AuditLogFilter};
use crate::query::translator::QueryTranslator;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Append-only log of who changed what
///
/// A failed audit write is logged and dropped; it never fails the change
/// being audited.
#[derive(Clone)]
pub struct AuditTrail {
    translator: QueryTranslator,
    events: EventBus,
}

impl AuditTrail {
    pub fn new(translator: QueryTranslator, events: EventBus) -> Self {
        Self { translator, events }
    }

    pub async fn record(
        &self,
        actor: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        before: Option<Value>,
        after: Option<Value>,
    ) {
        let entry = AuditLog {
            id: Uuid::new_v4(),
            user_id: actor,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            before,
            after,
            created_at: Utc::now(),
        };
        let row = match entry.to_row() {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(action, error = %e, "failed to encode audit entry");
                return;
            }
        };
        if let Err(e) = self.translator.store().insert(AuditLog::table(), row).await {
            tracing::warn!(action, entity_type, error = %e, "failed to write audit entry");
        }
    }

    pub async fn list(
        &self,
        filter: &AuditLogFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<AuditLog>, QueryError> {
        self.translator.fetch_page(filter, page, sort).await
    }

    /// Maintenance purge of entries created at or before `cutoff`
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, ServiceError> {
        let removed = self
            .translator
            .store()
            .delete_where(AuditLog::table(), &[Predicate::lte("created_at", cutoff)])
            .await
            .map_err(|e| ServiceError::store(AuditLog::singular(), "purge", e))?;
        tracing::info!(removed, %cutoff, "purged audit logs");
        self.events.publish(EntityEvent::Purged {
            table: AuditLog::table().to_string(),
            count: removed,
        });
        Ok(removed)
    }
}
