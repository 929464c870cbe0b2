//! Collection subscriptions

use crate::core::entity::Entity;
use crate::core::filter::{EntityFilter, Predicate, deserialize_list, push_eq, push_in};
use crate::core::query::SortSpec;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Basic,
    Standard,
    Premium,
}

impl PlanType {
    /// Monthly list price at the time of writing; copied onto each subscription
    pub fn monthly_price(&self) -> f64 {
        match self {
            PlanType::Basic => 50.0,
            PlanType::Standard => 80.0,
            PlanType::Premium => 120.0,
        }
    }

    pub fn pickups_per_month(&self) -> u32 {
        match self {
            PlanType::Basic => 4,
            PlanType::Standard => 8,
            PlanType::Premium => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    /// Price snapshot taken when the subscription started
    pub price: f64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Subscription {
    fn table() -> &'static str {
        "subscriptions"
    }

    fn singular() -> &'static str {
        "subscription"
    }

    fn default_sort() -> SortSpec {
        SortSpec::desc("start_date")
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriptionFilter {
    #[serde(skip)]
    pub user_ids: Option<Vec<Uuid>>,

    pub user_id: Option<Uuid>,

    #[serde(deserialize_with = "deserialize_list")]
    pub status: Option<Vec<SubscriptionStatus>>,

    #[serde(deserialize_with = "deserialize_list")]
    pub plan_type: Option<Vec<PlanType>>,
}

impl EntityFilter for SubscriptionFilter {
    type Entity = Subscription;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_in(&mut out, "user_id", &self.user_ids);
        push_eq(&mut out, "user_id", &self.user_id);
        push_in(&mut out, "status", &self.status);
        push_in(&mut out, "plan_type", &self.plan_type);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_pricing() {
        assert_eq!(PlanType::Basic.monthly_price(), 50.0);
        assert!(PlanType::Premium.monthly_price() > PlanType::Standard.monthly_price());
        assert_eq!(PlanType::Standard.pickups_per_month(), 8);
    }

    #[test]
    fn test_user_ids_filter() {
        let a = Uuid::new_v4();
        let filter = SubscriptionFilter {
            user_ids: Some(vec![a]),
            status: Some(vec![SubscriptionStatus::Active]),
            ..Default::default()
        };
        assert_eq!(
            filter.predicates(),
            vec![
                Predicate::in_list("user_id", [a.to_string()]),
                Predicate::in_list("status", ["active"]),
            ]
        );
    }
}
