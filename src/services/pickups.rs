//! Pickup request lifecycle

use crate::core::error::ServiceError;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{
    NewPickupRequest, NotificationKind, PickupFilter, PickupRequest, PickupStatus, Role, User,
    label,
};
use crate::services::ServiceContext;
use crate::services::notifications::NotificationService;
use chrono::Utc;
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct PickupService {
    ctx: ServiceContext,
    notifications: NotificationService,
}

impl PickupService {
    pub fn new(ctx: ServiceContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    /// Request a collection at the resident's current address
    pub async fn request_pickup(
        &self,
        resident_id: Uuid,
        input: NewPickupRequest,
    ) -> Result<PickupRequest, ServiceError> {
        input.validate()?;
        let resident = self.ctx.require::<User>(resident_id).await?;
        if resident.role != Role::Resident {
            return Err(ServiceError::Forbidden(
                "only residents can request pickups".to_string(),
            ));
        }
        if !resident.is_active {
            return Err(ServiceError::Forbidden("account is deactivated".to_string()));
        }

        let now = Utc::now();
        if input.scheduled_date < now.date_naive() {
            return Err(ServiceError::Validation(
                "scheduled_date must not be in the past".to_string(),
            ));
        }

        let pickup = PickupRequest {
            id: Uuid::new_v4(),
            user_id: resident.id,
            collector_id: None,
            scheduled_date: input.scheduled_date,
            status: PickupStatus::Requested,
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            completed_at: None,
            location: resident.location,
            created_at: now,
            updated_at: now,
        };
        let pickup = self.ctx.insert(&pickup).await?;
        tracing::info!(pickup_id = %pickup.id, %resident_id, date = %pickup.scheduled_date, "pickup requested");
        self.ctx
            .record(Some(resident_id), "pickup.requested", pickup.id, None, Some(&pickup))
            .await;
        Ok(pickup)
    }

    /// Assign (or reassign) a collector; the request becomes scheduled
    pub async fn assign_collector(
        &self,
        id: Uuid,
        collector_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<PickupRequest, ServiceError> {
        let before = self.get(id).await?;
        if before.status.is_terminal() || before.status == PickupStatus::InProgress {
            return Err(invalid(before.status, PickupStatus::Scheduled));
        }
        let collector = self.ctx.require::<User>(collector_id).await?;
        if collector.role != Role::Collector || !collector.is_active {
            return Err(ServiceError::Validation(format!(
                "user '{}' is not an active collector",
                collector_id
            )));
        }

        let after = self
            .ctx
            .patch::<PickupRequest>(
                id,
                json!({
                    "collector_id": collector_id,
                    "status": label(&PickupStatus::Scheduled),
                }),
                true,
            )
            .await?;
        self.ctx
            .record(actor, "pickup.assigned", id, Some(&before), Some(&after))
            .await;
        self.notifications
            .notify_quietly(
                after.user_id,
                NotificationKind::PickupScheduled,
                "Pickup scheduled",
                &format!("Your pickup on {} has been scheduled.", after.scheduled_date),
                Some(json!({ "pickup_request_id": id, "collector_id": collector_id })),
            )
            .await;
        Ok(after)
    }

    /// Move a request to a new status
    ///
    /// Completed and cancelled requests are final. Completing stamps
    /// `completed_at` and notifies the resident.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: PickupStatus,
        actor: Option<Uuid>,
    ) -> Result<PickupRequest, ServiceError> {
        let before = self.get(id).await?;
        if before.status.is_terminal() || before.status == status {
            return Err(invalid(before.status, status));
        }
        if matches!(status, PickupStatus::InProgress | PickupStatus::Completed)
            && before.collector_id.is_none()
        {
            return Err(invalid(before.status, status));
        }

        let mut patch = Map::new();
        patch.insert("status".to_string(), Value::String(label(&status)));
        if status == PickupStatus::Completed {
            patch.insert("completed_at".to_string(), json!(Utc::now()));
        }
        let after = self
            .ctx
            .patch::<PickupRequest>(id, Value::Object(patch), true)
            .await?;
        let action = format!("pickup.{}", label(&status));
        self.ctx
            .record(actor, &action, id, Some(&before), Some(&after))
            .await;

        if status == PickupStatus::Completed {
            self.notifications
                .notify_quietly(
                    after.user_id,
                    NotificationKind::PickupCompleted,
                    "Pickup completed",
                    &format!("Your pickup on {} was completed.", after.scheduled_date),
                    Some(json!({ "pickup_request_id": id })),
                )
                .await;
        }
        Ok(after)
    }

    pub async fn get(&self, id: Uuid) -> Result<PickupRequest, ServiceError> {
        self.ctx.require::<PickupRequest>(id).await
    }

    pub async fn list(
        &self,
        filter: &PickupFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<PickupRequest>, ServiceError> {
        Ok(self.ctx.translator.fetch_page(filter, page, sort).await?)
    }
}

fn invalid(from: PickupStatus, to: PickupStatus) -> ServiceError {
    ServiceError::InvalidTransition {
        entity: "pickup request",
        from: label(&from),
        to: label(&to),
    }
}
