//! Shared test harness for store and service testing
//!
//! Provides entity builders for every table, a [`Fixture`] wiring a
//! `ServiceHub` over an `InMemoryStore`, and the `data_store_tests!`
//! contract suite any `DataStore` backend can be checked against.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! use store_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod data_store_tests;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use wastewise::config::AppConfig;
use wastewise::models::payment::LEGACY_REFERENCE_COLUMN;
use wastewise::models::{
    Location, Payment, PaymentMethod, PaymentStatus, PickupRequest, PickupStatus, PlanType, Role,
    Subscription, SubscriptionStatus, User,
};
use wastewise::services::ServiceHub;
use wastewise::storage::InMemoryStore;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A hub over an in-memory store that tests can also inspect directly
pub struct Fixture {
    pub store: InMemoryStore,
    pub hub: ServiceHub,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(InMemoryStore::new(), AppConfig::default())
    }

    pub fn with_store(store: InMemoryStore, config: AppConfig) -> Self {
        let hub = ServiceHub::new(Arc::new(store.clone()), &config);
        Self { store, hub }
    }

    pub fn seed<T: wastewise::core::Entity>(&self, entities: &[T]) {
        self.store.seed(entities).expect("seeding failed");
    }
}

/// Columns of the payments table before the reference rename
pub fn legacy_payment_columns() -> Vec<&'static str> {
    vec![
        "id",
        "user_id",
        "amount",
        "method",
        LEGACY_REFERENCE_COLUMN,
        "status",
        "created_at",
        "updated_at",
    ]
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

pub fn user(name: &str, role: Role, area: &str) -> User {
    let created = at(1, 8);
    User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        full_name: name.to_string(),
        phone: None,
        role,
        location: Location::new(area, "Ring Road", "12"),
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

pub fn resident(name: &str, area: &str) -> User {
    user(name, Role::Resident, area)
}

pub fn collector(name: &str) -> User {
    user(name, Role::Collector, "Depot")
}

pub fn pickup(
    resident: &User,
    collector: Option<&User>,
    status: PickupStatus,
    day: u32,
) -> PickupRequest {
    let created = at(1, 9) + Duration::minutes(day as i64);
    PickupRequest {
        id: Uuid::new_v4(),
        user_id: resident.id,
        collector_id: collector.map(|c| c.id),
        scheduled_date: date(day),
        status,
        notes: None,
        completed_at: (status == PickupStatus::Completed).then(|| at(day, 15)),
        location: resident.location.clone(),
        created_at: created,
        updated_at: created,
    }
}

pub fn payment(user: &User, amount: f64, status: PaymentStatus, day: u32) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        user_id: user.id,
        amount,
        method: PaymentMethod::MobileMoney,
        reference: format!("TEST-{}", Uuid::new_v4().simple()).to_uppercase(),
        status,
        metadata: None,
        created_at: at(day, 10),
        updated_at: at(day, 10),
    }
}

pub fn subscription(user: &User, plan: PlanType, status: SubscriptionStatus, day: u32) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id: user.id,
        plan_type: plan,
        status,
        price: plan.monthly_price(),
        start_date: date(day),
        end_date: None,
        created_at: at(day, 7),
        updated_at: at(day, 7),
    }
}

/// A payment row as stored before the reference rename
pub fn legacy_payment_row(payment: &Payment) -> serde_json::Value {
    let mut row = serde_json::to_value(payment).expect("payment serializes");
    if let Some(fields) = row.as_object_mut() {
        if let Some(reference) = fields.remove("reference_number") {
            fields.insert(LEGACY_REFERENCE_COLUMN.to_string(), reference);
        }
        fields.remove("metadata");
    }
    row
}
