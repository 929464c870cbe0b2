//! Registration and profile changes

use crate::core::error::ServiceError;
use crate::core::filter::Predicate;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{Location, NewUser, User, UserFilter};
use crate::services::ServiceContext;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a profile; emails are unique, case-insensitively
    pub async fn register(&self, input: NewUser) -> Result<User, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let taken = self
            .ctx
            .translator
            .count_where::<User>(vec![Predicate::eq("email", email.as_str())], None)
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "email '{}' is already registered",
                email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            full_name: input.full_name.trim().to_string(),
            phone: input.phone,
            role: input.role,
            location: input.location,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let user = self.ctx.insert(&user).await?;
        tracing::info!(user_id = %user.id, role = ?user.role, "user registered");
        self.ctx
            .record(Some(user.id), "user.registered", user.id, None, Some(&user))
            .await;
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ServiceError> {
        self.ctx.require::<User>(id).await
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<User>, ServiceError> {
        Ok(self.ctx.translator.fetch_page(filter, page, sort).await?)
    }

    /// Move a user to a new address
    ///
    /// Existing pickup requests keep the address they were created with;
    /// only requests made after this call see the new one.
    pub async fn update_location(
        &self,
        id: Uuid,
        location: Location,
        actor: Option<Uuid>,
    ) -> Result<User, ServiceError> {
        location.validate()?;
        let before = self.get(id).await?;
        let patch = serde_json::to_value(&location)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let after = self.ctx.patch::<User>(id, patch, true).await?;
        self.ctx
            .record(actor, "user.location_updated", id, Some(&before), Some(&after))
            .await;
        Ok(after)
    }

    pub async fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
        actor: Option<Uuid>,
    ) -> Result<User, ServiceError> {
        let before = self.get(id).await?;
        if before.is_active == is_active {
            return Ok(before);
        }
        let after = self
            .ctx
            .patch::<User>(id, json!({ "is_active": is_active }), true)
            .await?;
        let action = if is_active {
            "user.activated"
        } else {
            "user.deactivated"
        };
        self.ctx
            .record(actor, action, id, Some(&before), Some(&after))
            .await;
        Ok(after)
    }
}
