//! Users: residents, collectors and admins

use crate::core::entity::Entity;
use crate::core::filter::{EntityFilter, Predicate, deserialize_list, push_eq, push_in};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role of a user; decides which other records reference it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Resident,
    Collector,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Resident, Role::Collector, Role::Admin];
}

/// A street address, optionally geocoded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(length(min = 1, max = 120))]
    pub area: String,

    #[validate(length(min = 1, max = 120))]
    pub street: String,

    #[validate(length(min = 1, max = 20))]
    pub house_number: String,

    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(
        area: impl Into<String>,
        street: impl Into<String>,
        house_number: impl Into<String>,
    ) -> Self {
        Self {
            area: area.into(),
            street: street.into(),
            house_number: house_number.into(),
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(flatten)]
    pub location: Location,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Entity for User {
    fn table() -> &'static str {
        "users"
    }

    fn singular() -> &'static str {
        "user"
    }

    fn search_columns() -> &'static [&'static str] {
        &["full_name", "email", "phone", "area", "street"]
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Registration payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 2, max = 120))]
    pub full_name: String,

    #[serde(default)]
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,

    pub role: Role,

    #[validate(nested)]
    pub location: Location,
}

/// Filter over users
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    /// Restrict to an explicit id set (used by aggregation, never from a query string)
    #[serde(skip)]
    pub ids: Option<Vec<Uuid>>,

    #[serde(deserialize_with = "deserialize_list")]
    pub role: Option<Vec<Role>>,

    pub is_active: Option<bool>,

    pub area: Option<String>,

    pub search: Option<String>,
}

impl EntityFilter for UserFilter {
    type Entity = User;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_in(&mut out, "id", &self.ids);
        push_in(&mut out, "role", &self.role);
        push_eq(&mut out, "is_active", &self.is_active);
        push_eq(&mut out, "area", &self.area);
        out
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}
