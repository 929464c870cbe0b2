//! Admin dashboard counters

use crate::core::entity::Entity;
use crate::core::error::QueryError;
use crate::core::filter::Predicate;
use crate::models::payment::round_currency;
use crate::models::{
    Complaint, ComplaintStatus, Payment, PaymentStatus, PickupRequest, PickupStatus, Role,
    Subscription, SubscriptionStatus, User, label,
};
use crate::query::translator::QueryTranslator;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub users_by_role: BTreeMap<String, usize>,
    pub pickups_by_status: BTreeMap<String, usize>,
    pub complaints_by_status: BTreeMap<String, usize>,
    pub active_subscriptions: usize,
    /// Sum of completed payments
    pub revenue: f64,
}

#[derive(Clone)]
pub struct DashboardService {
    translator: QueryTranslator,
}

impl DashboardService {
    pub fn new(translator: QueryTranslator) -> Self {
        Self { translator }
    }

    /// Every counter is an exact-count query; they run concurrently
    pub async fn summary(&self) -> Result<DashboardSummary, QueryError> {
        let (users_by_role, pickups_by_status, complaints_by_status, active, completed) = tokio::try_join!(
            self.counts_by::<User, _>("role", &Role::ALL),
            self.counts_by::<PickupRequest, _>("status", &PickupStatus::ALL),
            self.counts_by::<Complaint, _>("status", &ComplaintStatus::ALL),
            self.translator.count_where::<Subscription>(
                vec![Predicate::eq("status", label(&SubscriptionStatus::Active))],
                None,
            ),
            self.translator.fetch_where::<Payment>(
                vec![Predicate::eq("status", label(&PaymentStatus::Completed))],
                None,
                None,
            ),
        )?;

        let revenue = round_currency(completed.iter().map(|p| p.amount).sum());
        tracing::debug!(revenue, active, "dashboard summary computed");

        Ok(DashboardSummary {
            users_by_role,
            pickups_by_status,
            complaints_by_status,
            active_subscriptions: active,
            revenue,
        })
    }

    async fn counts_by<T: Entity, V: Serialize>(
        &self,
        column: &str,
        values: &[V],
    ) -> Result<BTreeMap<String, usize>, QueryError> {
        let labels: Vec<String> = values.iter().map(label).collect();
        let counts = try_join_all(labels.iter().map(|value| {
            self.translator
                .count_where::<T>(vec![Predicate::eq(column, value.as_str())], None)
        }))
        .await?;
        Ok(labels.into_iter().zip(counts).collect())
    }
}
