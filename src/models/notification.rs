//! In-app notifications

use crate::core::entity::Entity;
use crate::core::filter::{EntityFilter, Predicate, deserialize_list, push_eq, push_in};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who a notification is addressed to
///
/// Admin broadcasts use `System` instead of a reserved user id, so they
/// can never collide with a real user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    User(Uuid),
    System,
}

/// Stored form of [`Audience`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceKind {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PickupScheduled,
    PickupCompleted,
    PaymentReceived,
    ComplaintUpdated,
    Announcement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub audience: AudienceKind,
    /// Set exactly when `audience` is `user`
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        audience: Audience,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let (audience, user_id) = match audience {
            Audience::User(id) => (AudienceKind::User, Some(id)),
            Audience::System => (AudienceKind::System, None),
        };
        Self {
            id: Uuid::new_v4(),
            audience,
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            data,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    /// Typed audience; `None` when the stored row is inconsistent
    pub fn audience(&self) -> Option<Audience> {
        match (self.audience, self.user_id) {
            (AudienceKind::User, Some(id)) => Some(Audience::User(id)),
            (AudienceKind::System, None) => Some(Audience::System),
            _ => None,
        }
    }
}

impl Entity for Notification {
    fn table() -> &'static str {
        "notifications"
    }

    fn singular() -> &'static str {
        "notification"
    }

    fn search_columns() -> &'static [&'static str] {
        &["title", "message"]
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
pub struct NotificationFilter {
    pub user_id: Option<Uuid>,

    pub audience: Option<AudienceKind>,

    #[serde(deserialize_with = "deserialize_list")]
    pub kind: Option<Vec<NotificationKind>>,

    pub is_read: Option<bool>,

    pub search: Option<String>,
}

impl EntityFilter for NotificationFilter {
    type Entity = Notification;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_eq(&mut out, "user_id", &self.user_id);
        if let Some(audience) = &self.audience {
            out.push(Predicate::eq("audience", crate::core::filter::enum_value(audience)));
        }
        push_in(&mut out, "kind", &self.kind);
        push_eq(&mut out, "is_read", &self.is_read);
        out
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}
