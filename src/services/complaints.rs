//! Complaint filing and resolution

use crate::core::error::ServiceError;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{
    Complaint, ComplaintFilter, ComplaintStatus, ComplaintStatusUpdate, NewComplaint,
    NotificationKind, PickupRequest, label,
};
use crate::services::ServiceContext;
use crate::services::notifications::NotificationService;
use chrono::Utc;
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ComplaintService {
    ctx: ServiceContext,
    notifications: NotificationService,
}

impl ComplaintService {
    pub fn new(ctx: ServiceContext, notifications: NotificationService) -> Self {
        Self { ctx, notifications }
    }

    /// File a complaint about one of the resident's own pickups
    pub async fn file_complaint(
        &self,
        resident_id: Uuid,
        input: NewComplaint,
    ) -> Result<Complaint, ServiceError> {
        input.validate()?;
        let pickup = self
            .ctx
            .require::<PickupRequest>(input.pickup_request_id)
            .await?;
        if pickup.user_id != resident_id {
            return Err(ServiceError::Forbidden(
                "pickup request belongs to another resident".to_string(),
            ));
        }

        let now = Utc::now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            user_id: resident_id,
            pickup_request_id: pickup.id,
            description: input.description.trim().to_string(),
            photo_url: input.photo_url,
            status: ComplaintStatus::Open,
            priority: input.priority,
            admin_notes: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        let complaint = self.ctx.insert(&complaint).await?;
        tracing::info!(complaint_id = %complaint.id, pickup_id = %pickup.id, "complaint filed");
        self.ctx
            .record(
                Some(resident_id),
                "complaint.filed",
                complaint.id,
                None,
                Some(&complaint),
            )
            .await;
        Ok(complaint)
    }

    /// Admin status change; statuses only move forward
    pub async fn update_status(
        &self,
        id: Uuid,
        update: ComplaintStatusUpdate,
        actor: Option<Uuid>,
    ) -> Result<Complaint, ServiceError> {
        update.validate()?;
        let before = self.get(id).await?;
        if !before.status.can_transition_to(update.status) {
            return Err(ServiceError::InvalidTransition {
                entity: "complaint",
                from: label(&before.status),
                to: label(&update.status),
            });
        }

        let mut patch = Map::new();
        patch.insert("status".to_string(), Value::String(label(&update.status)));
        if let Some(notes) = update.admin_notes.filter(|n| !n.trim().is_empty()) {
            patch.insert("admin_notes".to_string(), Value::String(notes));
        }
        if update.status.is_settled() && before.resolved_at.is_none() {
            patch.insert("resolved_at".to_string(), json!(Utc::now()));
        }

        let after = self
            .ctx
            .patch::<Complaint>(id, Value::Object(patch), true)
            .await?;
        let action = format!("complaint.{}", label(&after.status));
        self.ctx
            .record(actor, &action, id, Some(&before), Some(&after))
            .await;
        self.notifications
            .notify_quietly(
                after.user_id,
                NotificationKind::ComplaintUpdated,
                "Complaint updated",
                &format!(
                    "Your complaint is now {}.",
                    label(&after.status).replace('_', " ")
                ),
                Some(json!({ "complaint_id": id, "status": after.status })),
            )
            .await;
        Ok(after)
    }

    pub async fn get(&self, id: Uuid) -> Result<Complaint, ServiceError> {
        self.ctx.require::<Complaint>(id).await
    }

    pub async fn list(
        &self,
        filter: &ComplaintFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<Complaint>, ServiceError> {
        Ok(self.ctx.translator.fetch_page(filter, page, sort).await?)
    }
}
