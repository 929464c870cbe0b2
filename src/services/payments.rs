//! Payment recording
//!
//! Creation tolerates both generations of the payments table: the reference
//! is written to whichever column the schema gate resolves, and a store that
//! predates the `metadata` column gets the row without it.

use crate::core::entity::Entity;
use crate::core::error::{QueryError, ServiceError};
use crate::core::events::EntityEvent;
use crate::core::filter::Predicate;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::core::store::StoreError;
use crate::models::payment::{
    LEGACY_REFERENCE_COLUMN, REFERENCE_COLUMN, generate_reference, is_valid_reference,
    round_currency,
};
use crate::models::{
    NewPayment, NotificationKind, Payment, PaymentFilter, PaymentStatus, User, label,
};
use crate::query::schema::SchemaGeneration;
use crate::services::ServiceContext;
use crate::services::notifications::NotificationService;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

const METADATA_COLUMN: &str = "metadata";

#[derive(Clone)]
pub struct PaymentService {
    ctx: ServiceContext,
    notifications: NotificationService,
    reference_prefix: String,
}

impl PaymentService {
    pub fn new(
        ctx: ServiceContext,
        notifications: NotificationService,
        reference_prefix: String,
    ) -> Self {
        Self {
            ctx,
            notifications,
            reference_prefix,
        }
    }

    /// Record a pending payment
    ///
    /// A caller-supplied reference must be well formed and unused; otherwise
    /// one is generated.
    pub async fn create_payment(
        &self,
        input: NewPayment,
        actor: Option<Uuid>,
    ) -> Result<Payment, ServiceError> {
        input.validate()?;
        let amount = round_currency(input.amount);
        if amount <= 0.0 {
            return Err(ServiceError::Validation(format!(
                "amount {} rounds to {:.2}; payments must be at least 0.01",
                input.amount, amount
            )));
        }
        let user = self.ctx.require::<User>(input.user_id).await?;

        let reference = match input.reference {
            Some(reference) => {
                let reference = reference.trim().to_uppercase();
                if !is_valid_reference(&reference) {
                    return Err(ServiceError::Validation(format!(
                        "invalid payment reference '{}'",
                        reference
                    )));
                }
                reference
            }
            None => generate_reference(&self.reference_prefix, Utc::now()),
        };
        if self.find_by_reference(&reference).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "payment reference '{}' already exists",
                reference
            )));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: user.id,
            amount,
            method: input.method,
            reference,
            status: PaymentStatus::Pending,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };

        let stored = self.insert_any_generation(&payment).await?;
        self.ctx.events.publish(EntityEvent::Created {
            table: Payment::table().to_string(),
            id: stored.id,
        });
        tracing::info!(
            payment_id = %stored.id,
            reference = %stored.reference,
            amount = stored.amount,
            "payment created"
        );
        self.ctx
            .record(actor, "payment.created", stored.id, None, Some(&stored))
            .await;
        Ok(stored)
    }

    /// Ordered insert attempts: each candidate reference column, and for
    /// each, once more without `metadata` if the store lacks that column
    async fn insert_any_generation(&self, payment: &Payment) -> Result<Payment, ServiceError> {
        let candidates: &[(SchemaGeneration, &str)] =
            match self.ctx.translator.schema().effective::<Payment>() {
                SchemaGeneration::Current => &[(SchemaGeneration::Current, REFERENCE_COLUMN)],
                SchemaGeneration::Legacy => {
                    &[(SchemaGeneration::Legacy, LEGACY_REFERENCE_COLUMN)]
                }
                SchemaGeneration::Auto => &[
                    (SchemaGeneration::Current, REFERENCE_COLUMN),
                    (SchemaGeneration::Legacy, LEGACY_REFERENCE_COLUMN),
                ],
            };

        let row = payment
            .to_row()
            .map_err(|e| QueryError::decode(Payment::table(), e))?;
        let mut last_error = StoreError::MissingColumn {
            table: Payment::table().to_string(),
            column: REFERENCE_COLUMN.to_string(),
        };

        for (generation, column) in candidates {
            let mut row = with_reference_column(row.clone(), column);
            let mut attempt = 1;
            let result = loop {
                match self.ctx.store().insert(Payment::table(), row.clone()).await {
                    Err(StoreError::MissingColumn { column: missing, .. })
                        if missing == METADATA_COLUMN && attempt == 1 =>
                    {
                        tracing::warn!("payments table has no metadata column, retrying without it");
                        if let Some(fields) = row.as_object_mut() {
                            fields.remove(METADATA_COLUMN);
                        }
                        attempt += 1;
                    }
                    other => break other,
                }
            };

            match result {
                Ok(stored) => {
                    self.ctx.translator.schema().learn::<Payment>(*generation);
                    return Payment::from_row(stored)
                        .map_err(|e| QueryError::decode(Payment::table(), e).into());
                }
                Err(err) if err.missing_column() == Some(*column) => {
                    tracing::warn!(column, "payment reference column missing");
                    last_error = err;
                }
                Err(err) => return Err(ServiceError::store(Payment::singular(), "create", err)),
            }
        }

        Err(ServiceError::store(Payment::singular(), "create", last_error))
    }

    /// Mark a pending payment completed and notify the payer
    pub async fn complete(&self, id: Uuid, actor: Option<Uuid>) -> Result<Payment, ServiceError> {
        let payment = self
            .transition(id, PaymentStatus::Completed, actor)
            .await?;
        self.notifications
            .notify_quietly(
                payment.user_id,
                NotificationKind::PaymentReceived,
                "Payment received",
                &format!(
                    "We received your payment of {:.2} (ref {}).",
                    payment.amount, payment.reference
                ),
                Some(json!({ "payment_id": payment.id, "reference": payment.reference })),
            )
            .await;
        Ok(payment)
    }

    pub async fn fail(&self, id: Uuid, actor: Option<Uuid>) -> Result<Payment, ServiceError> {
        self.transition(id, PaymentStatus::Failed, actor).await
    }

    async fn transition(
        &self,
        id: Uuid,
        status: PaymentStatus,
        actor: Option<Uuid>,
    ) -> Result<Payment, ServiceError> {
        let before = self.get(id).await?;
        if !before.status.can_transition_to(status) {
            return Err(ServiceError::InvalidTransition {
                entity: Payment::singular(),
                from: label(&before.status),
                to: label(&status),
            });
        }
        let after = self
            .ctx
            .patch::<Payment>(id, json!({ "status": label(&status) }), true)
            .await?;
        let action = format!("payment.{}", label(&status));
        self.ctx
            .record(actor, &action, id, Some(&before), Some(&after))
            .await;
        Ok(after)
    }

    /// Hard delete; the audit entry keeps the last state
    pub async fn delete(&self, id: Uuid, actor: Option<Uuid>) -> Result<(), ServiceError> {
        let before = self.get(id).await?;
        self.ctx.delete::<Payment>(id).await?;
        tracing::info!(payment_id = %id, "payment deleted");
        self.ctx
            .record::<Payment>(actor, "payment.deleted", id, Some(&before), None)
            .await;
        Ok(())
    }

    /// Exact reference lookup on whichever column the live schema carries
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, ServiceError> {
        let found = self
            .ctx
            .translator
            .fetch_where::<Payment>(vec![Predicate::eq(REFERENCE_COLUMN, reference)], None, None)
            .await?;
        Ok(found.into_iter().next())
    }

    pub async fn get(&self, id: Uuid) -> Result<Payment, ServiceError> {
        self.ctx.require::<Payment>(id).await
    }

    pub async fn list(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<Payment>, ServiceError> {
        Ok(self.ctx.translator.fetch_page(filter, page, sort).await?)
    }
}

/// Move the reference value under the given physical column name
fn with_reference_column(mut row: Value, column: &str) -> Value {
    if column != REFERENCE_COLUMN
        && let Some(fields) = row.as_object_mut()
        && let Some(reference) = fields.remove(REFERENCE_COLUMN)
    {
        fields.insert(column.to_string(), reference);
    }
    row
}
