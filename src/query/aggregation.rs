//! Customer details for a collector
//!
//! Pagination is applied to the resident list first; the enrichment
//! queries only ever cover the residents on the current page.

use crate::core::entity::Entity;
use crate::core::error::QueryError;
use crate::core::filter::Predicate;
use crate::core::query::{PageRequest, PaginatedResponse, SortSpec};
use crate::models::{
    Payment, PaymentStatus, PickupRequest, PickupStatus, Subscription, SubscriptionFilter,
    SubscriptionStatus, User, UserFilter, label,
};
use crate::query::translator::QueryTranslator;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// User-level filters applied to a collector's residents
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CustomerFilter {
    pub is_active: Option<bool>,
    pub area: Option<String>,
    pub search: Option<String>,
}

impl CustomerFilter {
    fn for_residents(&self, residents: Vec<Uuid>) -> UserFilter {
        UserFilter {
            ids: Some(residents),
            is_active: self.is_active,
            area: self.area.clone(),
            search: self.search.clone(),
            ..Default::default()
        }
    }
}

/// One resident served by a collector, with billing and pickup history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDetails {
    #[serde(flatten)]
    pub user: User,
    /// Active subscription, if any
    pub subscription: Option<Subscription>,
    /// Sum of completed payments
    pub total_payments: f64,
    pub last_payment_date: Option<DateTime<Utc>>,
    /// Pickups handled by this collector
    pub pickup_count: usize,
    pub last_pickup_date: Option<NaiveDate>,
    /// Completed pickups as a percentage of `pickup_count`; 0 without pickups
    pub completion_rate: f64,
}

#[derive(Clone)]
pub struct CustomerDetailsComposer {
    translator: QueryTranslator,
}

impl CustomerDetailsComposer {
    pub fn new(translator: QueryTranslator) -> Self {
        Self { translator }
    }

    /// One page of enriched residents for a collector
    ///
    /// A collector with no pickups, or a page with no residents, returns an
    /// empty page without issuing the subscription, payment and pickup
    /// queries.
    pub async fn customers_for_collector(
        &self,
        collector_id: Uuid,
        filter: &CustomerFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<CustomerDetails>, QueryError> {
        let page = page.clamped(&self.translator.limits());

        let residents = self
            .translator
            .distinct_ids::<PickupRequest>(
                "user_id",
                vec![Predicate::eq("collector_id", collector_id)],
            )
            .await?;
        if residents.is_empty() {
            tracing::debug!(%collector_id, "collector has no pickups");
            return Ok(PaginatedResponse::empty(page));
        }

        let users = self
            .translator
            .fetch_page(
                &filter.for_residents(residents),
                page,
                Some(sort.unwrap_or_else(|| SortSpec::asc("full_name"))),
            )
            .await?;
        if users.data.is_empty() {
            return Ok(PaginatedResponse {
                data: Vec::new(),
                pagination: users.pagination,
            });
        }

        let ids: Vec<Uuid> = users.data.iter().map(|u| u.id).collect();
        let subscriptions = SubscriptionFilter {
            user_ids: Some(ids.clone()),
            status: Some(vec![SubscriptionStatus::Active]),
            ..Default::default()
        };
        let payments = vec![
            Predicate::in_list("user_id", ids.iter().copied()),
            Predicate::eq("status", label(&PaymentStatus::Completed)),
        ];
        let pickups = vec![
            Predicate::in_list("user_id", ids.iter().copied()),
            Predicate::eq("collector_id", collector_id),
        ];

        let (subscriptions, payments, pickups) = tokio::try_join!(
            self.translator.fetch_all(&subscriptions, None),
            self.translator.fetch_where::<Payment>(payments, None, None),
            self.translator.fetch_where::<PickupRequest>(pickups, None, None),
        )?;
        tracing::debug!(
            %collector_id,
            residents = ids.len(),
            subscriptions = subscriptions.len(),
            payments = payments.len(),
            pickups = pickups.len(),
            "customer details fan-out complete"
        );

        Ok(PaginatedResponse {
            data: join_customer_details(users.data, &subscriptions, &payments, &pickups),
            pagination: users.pagination,
        })
    }
}

#[derive(Default)]
struct Tally {
    total_payments: f64,
    last_payment_date: Option<DateTime<Utc>>,
    pickups: usize,
    completed: usize,
    last_pickup_date: Option<NaiveDate>,
}

/// Join a page of residents with their related rows
///
/// Only active subscriptions and completed payments count; rows for users
/// outside `residents` are ignored. Output keeps the order of `residents`.
pub fn join_customer_details(
    residents: Vec<User>,
    subscriptions: &[Subscription],
    payments: &[Payment],
    pickups: &[PickupRequest],
) -> Vec<CustomerDetails> {
    let mut active: HashMap<Uuid, &Subscription> = HashMap::new();
    for sub in subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
    {
        active
            .entry(sub.user_id)
            .and_modify(|current| {
                if sub.start_date > current.start_date {
                    *current = sub;
                }
            })
            .or_insert(sub);
    }

    let mut tallies: HashMap<Uuid, Tally> = HashMap::new();
    for payment in payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
    {
        let tally = tallies.entry(payment.user_id).or_default();
        tally.total_payments += payment.amount;
        tally.last_payment_date = tally.last_payment_date.max(Some(payment.created_at()));
    }
    for pickup in pickups {
        let tally = tallies.entry(pickup.user_id).or_default();
        tally.pickups += 1;
        if pickup.status == PickupStatus::Completed {
            tally.completed += 1;
        }
        tally.last_pickup_date = tally.last_pickup_date.max(Some(pickup.scheduled_date));
    }

    residents
        .into_iter()
        .map(|user| {
            let tally = tallies.remove(&user.id).unwrap_or_default();
            let completion_rate = if tally.pickups == 0 {
                0.0
            } else {
                tally.completed as f64 / tally.pickups as f64 * 100.0
            };
            CustomerDetails {
                subscription: active.get(&user.id).map(|s| (*s).clone()),
                total_payments: (tally.total_payments * 100.0).round() / 100.0,
                last_payment_date: tally.last_payment_date,
                pickup_count: tally.pickups,
                last_pickup_date: tally.last_pickup_date,
                completion_rate,
                user,
            }
        })
        .collect()
}
