//! Append-only audit trail

use crate::core::entity::Entity;
use crate::core::filter::{EntityFilter, Predicate, push_day_range, push_eq};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One action performed against one entity, with before/after snapshots
///
/// Never updated; only removed by the maintenance purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    /// Acting user; `None` for maintenance jobs
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl Entity for AuditLog {
    fn table() -> &'static str {
        "audit_logs"
    }

    fn singular() -> &'static str {
        "audit log"
    }

    fn search_columns() -> &'static [&'static str] {
        &["action", "entity_type"]
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
pub struct AuditLogFilter {
    pub user_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

impl EntityFilter for AuditLogFilter {
    type Entity = AuditLog;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_eq(&mut out, "user_id", &self.user_id);
        push_eq(&mut out, "entity_type", &self.entity_type);
        push_eq(&mut out, "entity_id", &self.entity_id);
        push_eq(&mut out, "action", &self.action);
        push_day_range(&mut out, "created_at", &self.start_date, &self.end_date);
        out
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}
