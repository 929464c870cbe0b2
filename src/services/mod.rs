//! Write side: mutation flows and dashboards
//!
//! Every mutation goes through [`ServiceContext`], which writes to the
//! store, publishes an [`EntityEvent`] and leaves an audit entry. Reads go
//! through the shared [`QueryTranslator`].

pub mod audit;
pub mod complaints;
pub mod dashboard;
pub mod notifications;
pub mod payments;
pub mod pickups;
pub mod subscriptions;
pub mod users;

pub use audit::AuditTrail;
pub use complaints::ComplaintService;
pub use dashboard::{DashboardService, DashboardSummary};
pub use notifications::NotificationService;
pub use payments::PaymentService;
pub use pickups::PickupService;
pub use subscriptions::SubscriptionService;
pub use users::UserService;

use crate::config::{AppConfig, MAX_RETENTION_DAYS};
use crate::core::entity::Entity;
use crate::core::error::{QueryError, ServiceError};
use crate::core::events::{EntityEvent, EventBus};
use crate::core::store::DataStore;
use crate::query::aggregation::CustomerDetailsComposer;
use crate::query::schema::SchemaGate;
use crate::query::translator::QueryTranslator;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Store, change feed and audit trail shared by every service
#[derive(Clone)]
pub struct ServiceContext {
    pub translator: QueryTranslator,
    pub events: EventBus,
    pub audit: AuditTrail,
}

impl ServiceContext {
    pub fn new(translator: QueryTranslator, events: EventBus) -> Self {
        let audit = AuditTrail::new(translator.clone(), events.clone());
        Self {
            translator,
            events,
            audit,
        }
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        self.translator.store()
    }

    /// Load an entity or fail with `NotFound`
    pub async fn require<T: Entity>(&self, id: Uuid) -> Result<T, ServiceError> {
        self.translator
            .get::<T>(id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: T::singular(),
                id,
            })
    }

    /// Insert a new entity and announce it
    pub async fn insert<T: Entity>(&self, entity: &T) -> Result<T, ServiceError> {
        let row = encode(entity)?;
        let stored = self
            .store()
            .insert(T::table(), row)
            .await
            .map_err(|e| ServiceError::store(T::singular(), "create", e))?;
        let stored = decode::<T>(stored)?;
        self.events.publish(EntityEvent::Created {
            table: T::table().to_string(),
            id: stored.id(),
        });
        Ok(stored)
    }

    /// Apply a targeted patch; `updated_at` is set unless `T` has no such column
    pub async fn patch<T: Entity>(
        &self,
        id: Uuid,
        mut patch: Value,
        touch: bool,
    ) -> Result<T, ServiceError> {
        if touch && let Some(fields) = patch.as_object_mut() {
            fields.insert("updated_at".to_string(), json!(Utc::now()));
        }
        let stored = self
            .store()
            .update(T::table(), &id, patch)
            .await
            .map_err(|e| ServiceError::store(T::singular(), "update", e))?;
        let stored = decode::<T>(stored)?;
        self.events.publish(EntityEvent::Updated {
            table: T::table().to_string(),
            id,
        });
        Ok(stored)
    }

    /// Hard delete by id
    pub async fn delete<T: Entity>(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store()
            .delete(T::table(), &id)
            .await
            .map_err(|e| ServiceError::store(T::singular(), "delete", e))?;
        self.events.publish(EntityEvent::Deleted {
            table: T::table().to_string(),
            id,
        });
        Ok(())
    }

    /// Audit a change to an entity
    pub async fn record<T: Entity>(
        &self,
        actor: Option<Uuid>,
        action: &str,
        id: Uuid,
        before: Option<&T>,
        after: Option<&T>,
    ) {
        self.audit
            .record(
                actor,
                action,
                T::singular(),
                Some(id),
                before.and_then(snapshot),
                after.and_then(snapshot),
            )
            .await;
    }
}

fn encode<T: Entity>(entity: &T) -> Result<Value, ServiceError> {
    entity
        .to_row()
        .map_err(|e| QueryError::decode(T::table(), e).into())
}

fn decode<T: Entity>(row: Value) -> Result<T, ServiceError> {
    T::from_row(row).map_err(|e| QueryError::decode(T::table(), e).into())
}

fn snapshot<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// Rows removed by a maintenance run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub notifications: usize,
    pub audit_logs: usize,
}

/// All services over one store
#[derive(Clone)]
pub struct ServiceHub {
    pub context: ServiceContext,
    pub users: UserService,
    pub pickups: PickupService,
    pub payments: PaymentService,
    pub complaints: ComplaintService,
    pub subscriptions: SubscriptionService,
    pub notifications: NotificationService,
    pub dashboard: DashboardService,
    pub customers: CustomerDetailsComposer,
    config: AppConfig,
}

impl ServiceHub {
    pub fn new(store: Arc<dyn DataStore>, config: &AppConfig) -> Self {
        let translator = QueryTranslator::new(store)
            .with_schema(Arc::new(SchemaGate::new(config.payments.schema)))
            .with_limits(config.query);
        let context = ServiceContext::new(translator.clone(), EventBus::default());
        let notifications = NotificationService::new(context.clone());

        Self {
            users: UserService::new(context.clone()),
            pickups: PickupService::new(context.clone(), notifications.clone()),
            payments: PaymentService::new(
                context.clone(),
                notifications.clone(),
                config.payments.reference_prefix.clone(),
            ),
            complaints: ComplaintService::new(context.clone(), notifications.clone()),
            subscriptions: SubscriptionService::new(context.clone()),
            dashboard: DashboardService::new(translator.clone()),
            customers: CustomerDetailsComposer::new(translator),
            notifications,
            context,
            config: config.clone(),
        }
    }

    pub fn translator(&self) -> &QueryTranslator {
        &self.context.translator
    }

    pub fn events(&self) -> &EventBus {
        &self.context.events
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Purge old notifications and audit logs per the retention settings
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport, ServiceError> {
        let retention = &self.config.retention;
        let notification_cutoff =
            retention_cutoff(now, "notification_days", retention.notification_days)?;
        let audit_cutoff = retention_cutoff(now, "audit_log_days", retention.audit_log_days)?;
        let notifications = self
            .notifications
            .purge_older_than(notification_cutoff)
            .await?;
        let audit_logs = self.context.audit.purge_older_than(audit_cutoff).await?;
        tracing::info!(notifications, audit_logs, "maintenance sweep complete");
        Ok(MaintenanceReport {
            notifications,
            audit_logs,
        })
    }
}

/// `now` minus a retention period, refusing periods that would reach into the
/// future or overflow
fn retention_cutoff(now: DateTime<Utc>, name: &str, days: i64) -> Result<DateTime<Utc>, ServiceError> {
    if !(1..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(ServiceError::Validation(format!(
            "retention.{} must be between 1 and {}, got {}",
            name, MAX_RETENTION_DAYS, days
        )));
    }
    TimeDelta::try_days(days)
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| {
            ServiceError::Validation(format!("retention.{} of {} days is out of range", name, days))
        })
}
