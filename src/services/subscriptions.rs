//! Subscription plans

use crate::core::error::ServiceError;
use crate::core::filter::Predicate;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{
    PlanType, Subscription, SubscriptionFilter, SubscriptionStatus, User, label,
};
use crate::services::ServiceContext;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionService {
    ctx: ServiceContext,
}

impl SubscriptionService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Start a plan; a user holds at most one active subscription
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        plan: PlanType,
        actor: Option<Uuid>,
    ) -> Result<Subscription, ServiceError> {
        let user = self.ctx.require::<User>(user_id).await?;
        if self.active_for(user.id).await?.is_some() {
            return Err(ServiceError::Conflict(
                "user already has an active subscription".to_string(),
            ));
        }

        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: user.id,
            plan_type: plan,
            status: SubscriptionStatus::Active,
            price: plan.monthly_price(),
            start_date: now.date_naive(),
            end_date: None,
            created_at: now,
            updated_at: now,
        };
        let subscription = self.ctx.insert(&subscription).await?;
        tracing::info!(subscription_id = %subscription.id, %user_id, ?plan, "subscribed");
        self.ctx
            .record(
                actor,
                "subscription.created",
                subscription.id,
                None,
                Some(&subscription),
            )
            .await;
        Ok(subscription)
    }

    pub async fn pause(&self, id: Uuid, actor: Option<Uuid>) -> Result<Subscription, ServiceError> {
        self.transition(id, SubscriptionStatus::Paused, actor).await
    }

    pub async fn resume(&self, id: Uuid, actor: Option<Uuid>) -> Result<Subscription, ServiceError> {
        self.transition(id, SubscriptionStatus::Active, actor).await
    }

    /// Cancel for good; stamps `end_date`
    pub async fn cancel(&self, id: Uuid, actor: Option<Uuid>) -> Result<Subscription, ServiceError> {
        self.transition(id, SubscriptionStatus::Cancelled, actor).await
    }

    async fn transition(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        actor: Option<Uuid>,
    ) -> Result<Subscription, ServiceError> {
        let before = self.ctx.require::<Subscription>(id).await?;
        let allowed = matches!(
            (before.status, status),
            (SubscriptionStatus::Active, SubscriptionStatus::Paused)
                | (SubscriptionStatus::Paused, SubscriptionStatus::Active)
                | (SubscriptionStatus::Active, SubscriptionStatus::Cancelled)
                | (SubscriptionStatus::Paused, SubscriptionStatus::Cancelled)
        );
        if !allowed {
            return Err(ServiceError::InvalidTransition {
                entity: "subscription",
                from: label(&before.status),
                to: label(&status),
            });
        }

        let patch = if status == SubscriptionStatus::Cancelled {
            json!({ "status": label(&status), "end_date": Utc::now().date_naive() })
        } else {
            json!({ "status": label(&status) })
        };
        let after = self.ctx.patch::<Subscription>(id, patch, true).await?;
        let action = format!("subscription.{}", label(&status));
        self.ctx
            .record(actor, &action, id, Some(&before), Some(&after))
            .await;
        Ok(after)
    }

    /// The user's active subscription, if any
    pub async fn active_for(&self, user_id: Uuid) -> Result<Option<Subscription>, ServiceError> {
        let active = self
            .ctx
            .translator
            .fetch_where::<Subscription>(
                vec![
                    Predicate::eq("user_id", user_id),
                    Predicate::eq("status", label(&SubscriptionStatus::Active)),
                ],
                None,
                None,
            )
            .await?;
        Ok(active.into_iter().next())
    }

    pub async fn list(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<Subscription>, ServiceError> {
        Ok(self.ctx.translator.fetch_page(filter, page, sort).await?)
    }
}
