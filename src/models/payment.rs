//! Payments
//!
//! The reference column was renamed by a migration (`reference` became
//! `reference_number`). Rows of either generation decode into [`Payment`];
//! queries resolve the physical column through the schema gate.

use crate::core::entity::Entity;
use crate::core::filter::{
    EntityFilter, Predicate, deserialize_list, push_day_range, push_eq, push_in, push_range,
};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;
use validator::Validate;

/// Current name of the reference column
pub const REFERENCE_COLUMN: &str = "reference_number";

/// Name of the reference column before the rename migration
pub const LEGACY_REFERENCE_COLUMN: &str = "reference";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    Card,
    Cash,
    BankTransfer,
}

/// pending → completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub method: PaymentMethod,
    /// Unique per payment; used as the display and idempotency key
    #[serde(rename = "reference_number", alias = "reference")]
    pub reference: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Payment {
    fn table() -> &'static str {
        "payments"
    }

    fn singular() -> &'static str {
        "payment"
    }

    fn search_columns() -> &'static [&'static str] {
        &[REFERENCE_COLUMN]
    }

    fn legacy_column(column: &str) -> Option<&'static str> {
        (column == REFERENCE_COLUMN).then_some(LEGACY_REFERENCE_COLUMN)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPayment {
    pub user_id: Uuid,

    #[validate(range(exclusive_min = 0.0, max = 1_000_000.0))]
    pub amount: f64,

    pub method: PaymentMethod,

    /// Caller-supplied reference; generated when absent
    #[serde(default)]
    pub reference: Option<String>,

    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Round to currency precision (2 decimals)
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Whether a reference has the accepted shape
pub fn is_valid_reference(reference: &str) -> bool {
    static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = REFERENCE_REGEX.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]{5,63}$").unwrap());
    regex.is_match(reference)
}

/// Build a fresh reference, e.g. `PAY-20261019-3FA85F64`
pub fn generate_reference(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix.to_uppercase(),
        now.format("%Y%m%d"),
        suffix.get(..8).unwrap_or(&suffix).to_uppercase()
    )
}

/// Filter over payments
///
/// `start_date`/`end_date` bound `created_at` by whole days.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentFilter {
    pub user_id: Option<Uuid>,

    #[serde(deserialize_with = "deserialize_list")]
    pub status: Option<Vec<PaymentStatus>>,

    #[serde(deserialize_with = "deserialize_list")]
    pub method: Option<Vec<PaymentMethod>>,

    pub min_amount: Option<f64>,

    pub max_amount: Option<f64>,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    /// Matched against the payment reference
    pub search: Option<String>,
}

impl EntityFilter for PaymentFilter {
    type Entity = Payment;

    fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_eq(&mut out, "user_id", &self.user_id);
        push_in(&mut out, "status", &self.status);
        push_in(&mut out, "method", &self.method);
        push_range(&mut out, "amount", &self.min_amount, &self.max_amount);
        push_day_range(&mut out, "created_at", &self.start_date, &self.end_date);
        out
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }
}
