//! Pickup requests

use crate::core::entity::Entity;
use crate::core::filter::{EntityFilter, Predicate, deserialize_list, push_eq, push_in, push_range};
use crate::core::query::SortSpec;
use crate::models::user::Location;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    Requested,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl PickupStatus {
    pub const ALL: [PickupStatus; 5] = [
        PickupStatus::Requested,
        PickupStatus::Scheduled,
        PickupStatus::InProgress,
        PickupStatus::Completed,
        PickupStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, PickupStatus::Completed | PickupStatus::Cancelled)
    }
}

/// A resident's request for a collection
///
/// `location` is a snapshot of the resident's address at creation time and
/// is never rewritten when the resident moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub collector_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub status: PickupStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub location: Location,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for PickupRequest {
    fn table() -> &'static str {
        "pickup_requests"
    }

    fn singular() -> &'static str {
        "pickup request"
    }

    fn search_columns() -> &'static [&'static str] {
        &["area", "street", "house_number", "notes"]
    }

    fn default_sort() -> SortSpec {
        SortSpec::desc("scheduled_date")
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPickupRequest {
    pub scheduled_date: NaiveDate,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Filter over pickup requests
///
/// `start_date`/`end_date` bound `scheduled_date` inclusively.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PickupFilter {
    pub user_id: Option<Uuid>,

    pub collector_id: Option<Uuid>,

    #[serde(deserialize_with = "deserialize_list")]
    pub status: Option<Vec<PickupStatus>>,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    pub area: Option<String>,

    pub search: Option<String>,
}

impl EntityFilter for PickupFilter {
    type Entity = PickupRequest;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_eq(&mut out, "user_id", &self.user_id);
        push_eq(&mut out, "collector_id", &self.collector_id);
        push_in(&mut out, "status", &self.status);
        push_range(&mut out, "scheduled_date", &self.start_date, &self.end_date);
        push_eq(&mut out, "area", &self.area);
        out
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}
