//! In-app notifications

use crate::core::entity::Entity;
use crate::core::error::ServiceError;
use crate::core::events::EntityEvent;
use crate::core::filter::Predicate;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{Audience, Notification, NotificationFilter, NotificationKind};
use crate::services::ServiceContext;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationService {
    ctx: ServiceContext,
}

impl NotificationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Notify one user
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: Option<Value>,
    ) -> Result<Notification, ServiceError> {
        let notification = Notification::new(Audience::User(user_id), kind, title, message, data);
        self.ctx.insert(&notification).await
    }

    /// Notify without failing the caller; used as a side effect of other flows
    pub(crate) async fn notify_quietly(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: Option<Value>,
    ) {
        if let Err(e) = self.notify(user_id, kind, title, message, data).await {
            tracing::warn!(%user_id, ?kind, error = %e, "failed to send notification");
        }
    }

    /// Admin broadcast, addressed to no particular user
    pub async fn broadcast(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: Option<Value>,
        actor: Option<Uuid>,
    ) -> Result<Notification, ServiceError> {
        let notification = Notification::new(Audience::System, kind, title, message, data);
        let notification = self.ctx.insert(&notification).await?;
        self.ctx
            .record(
                actor,
                "notification.broadcast",
                notification.id,
                None,
                Some(&notification),
            )
            .await;
        Ok(notification)
    }

    pub async fn list(
        &self,
        filter: &NotificationFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<Notification>, ServiceError> {
        Ok(self.ctx.translator.fetch_page(filter, page, sort).await?)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<Notification, ServiceError> {
        let current = self.ctx.require::<Notification>(id).await?;
        if current.is_read {
            return Ok(current);
        }
        self.ctx
            .patch::<Notification>(id, json!({ "is_read": true }), false)
            .await
    }

    /// Mark every unread notification of a user as read
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize, ServiceError> {
        let changed = self
            .ctx
            .store()
            .update_where(
                Notification::table(),
                &[
                    Predicate::eq("user_id", user_id),
                    Predicate::eq("is_read", false),
                ],
                json!({ "is_read": true }),
            )
            .await
            .map_err(|e| ServiceError::store(Notification::singular(), "update", e))?;
        if changed > 0 {
            self.ctx.events.publish(EntityEvent::BulkUpdated {
                table: Notification::table().to_string(),
                count: changed,
            });
        }
        Ok(changed)
    }

    /// Maintenance sweep of notifications created at or before `cutoff`
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, ServiceError> {
        let removed = self
            .ctx
            .store()
            .delete_where(
                Notification::table(),
                &[Predicate::lte("created_at", cutoff)],
            )
            .await
            .map_err(|e| ServiceError::store(Notification::singular(), "purge", e))?;
        tracing::info!(removed, %cutoff, "purged notifications");
        self.ctx.events.publish(EntityEvent::Purged {
            table: Notification::table().to_string(),
            count: removed,
        });
        Ok(removed)
    }
}
