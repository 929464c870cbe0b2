//! Complaints raised by residents against a pickup request

use crate::core::entity::Entity;
use crate::core::filter::{
    EntityFilter, Predicate, deserialize_list, push_day_range, push_eq, push_in,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// open → in_progress → resolved | closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::Open,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Closed,
    ];

    fn rank(&self) -> u8 {
        match self {
            ComplaintStatus::Open => 0,
            ComplaintStatus::InProgress => 1,
            ComplaintStatus::Resolved => 2,
            ComplaintStatus::Closed => 3,
        }
    }

    /// Transitions only move forward; a resolved complaint may still be closed
    pub fn can_transition_to(&self, next: ComplaintStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pickup_request_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub status: ComplaintStatus,
    pub priority: ComplaintPriority,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Complaint {
    fn table() -> &'static str {
        "complaints"
    }

    fn singular() -> &'static str {
        "complaint"
    }

    fn search_columns() -> &'static [&'static str] {
        &["description", "admin_notes"]
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewComplaint {
    pub pickup_request_id: Uuid,

    #[validate(length(min = 10, max = 2000))]
    pub description: String,

    #[serde(default)]
    #[validate(url)]
    pub photo_url: Option<String>,

    #[serde(default)]
    pub priority: ComplaintPriority,
}

/// Admin status change
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ComplaintStatusUpdate {
    pub status: ComplaintStatus,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComplaintFilter {
    pub user_id: Option<Uuid>,

    pub pickup_request_id: Option<Uuid>,

    #[serde(deserialize_with = "deserialize_list")]
    pub status: Option<Vec<ComplaintStatus>>,

    #[serde(deserialize_with = "deserialize_list")]
    pub priority: Option<Vec<ComplaintPriority>>,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    pub search: Option<String>,
}

impl EntityFilter for ComplaintFilter {
    type Entity = Complaint;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_eq(&mut out, "user_id", &self.user_id);
        push_eq(&mut out, "pickup_request_id", &self.pickup_request_id);
        push_in(&mut out, "status", &self.status);
        push_in(&mut out, "priority", &self.priority);
        push_day_range(&mut out, "created_at", &self.start_date, &self.end_date);
        out
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}
