//! Service flow tests over the in-memory store
//!
//! These tests verify that:
//! - Mutations validate input and enforce lifecycle rules
//! - Every mutation leaves an audit entry and publishes a change event
//! - Side effects (notifications, location snapshots) land where expected
//! - Payment creation survives the legacy payments schema

#[macro_use]
mod store_harness;

use chrono::{Duration, Utc};
use store_harness::*;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;
use wastewise::config::AppConfig;
use wastewise::core::{EntityEvent, PageRequest, ServiceError};
use wastewise::models::payment::LEGACY_REFERENCE_COLUMN;
use wastewise::models::{
    AuditLogFilter, AudienceKind, ComplaintStatus, ComplaintStatusUpdate, Location, NewComplaint,
    NewPayment, NewPickupRequest, NewUser, NotificationFilter, NotificationKind, PaymentMethod,
    PaymentStatus, PickupFilter, PickupStatus, PlanType, Role, SubscriptionStatus, User,
};
use wastewise::query::SchemaGeneration;
use wastewise::storage::InMemoryStore;

fn new_user(email: &str, role: Role) -> NewUser {
    NewUser {
        email: email.to_string(),
        full_name: "Abena Boateng".to_string(),
        phone: Some("+233201234567".to_string()),
        role,
        location: Location::new("Osu", "Oxford Street", "7"),
    }
}

fn soon() -> NewPickupRequest {
    NewPickupRequest {
        scheduled_date: Utc::now().date_naive() + Duration::days(3),
        notes: Some("Two bins by the gate".to_string()),
    }
}

fn new_payment(user: &User, reference: Option<&str>) -> NewPayment {
    NewPayment {
        user_id: user.id,
        amount: 79.999,
        method: PaymentMethod::MobileMoney,
        reference: reference.map(str::to_string),
        metadata: Some(serde_json::json!({ "network": "mtn" })),
    }
}

// =============================================================================
// Users
// =============================================================================

mod user_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_audits_and_publishes() {
        let fixture = Fixture::new();
        let mut events = fixture.hub.events().subscribe();

        let user = fixture
            .hub
            .users
            .register(new_user("Abena@Example.com", Role::Resident))
            .await
            .unwrap();
        assert_eq!(user.email, "abena@example.com");
        assert!(user.is_active);

        let envelope = events.recv().await.unwrap();
        assert_eq!(
            envelope.event,
            EntityEvent::Created {
                table: "users".to_string(),
                id: user.id
            }
        );

        let audit = fixture
            .hub
            .context
            .audit
            .list(
                &AuditLogFilter {
                    entity_id: Some(user.id),
                    ..Default::default()
                },
                PageRequest::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(audit.data.len(), 1);
        assert_eq!(audit.data[0].action, "user.registered");
        assert!(audit.data[0].before.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let fixture = Fixture::new();
        let users = &fixture.hub.users;
        users
            .register(new_user("kojo@example.com", Role::Resident))
            .await
            .unwrap();

        let err = assert_err!(
            users
                .register(new_user("KOJO@example.com", Role::Collector))
                .await
        );
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let fixture = Fixture::new();
        let err = fixture
            .hub
            .users
            .register(new_user("not-an-email", Role::Resident))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(fixture.store.rows("users").is_empty());
    }

    #[tokio::test]
    async fn test_location_change_only_affects_future_pickups() {
        let fixture = Fixture::new();
        let hub = &fixture.hub;
        let resident = hub
            .users
            .register(new_user("afia@example.com", Role::Resident))
            .await
            .unwrap();
        let before = hub.pickups.request_pickup(resident.id, soon()).await.unwrap();

        let moved = Location::new("Cantonments", "Switchback Road", "21");
        let updated = hub
            .users
            .update_location(resident.id, moved.clone(), Some(resident.id))
            .await
            .unwrap();
        assert_eq!(updated.location, moved);

        let unchanged = hub.pickups.get(before.id).await.unwrap();
        assert_eq!(unchanged.location.area, "Osu");

        let after = hub.pickups.request_pickup(resident.id, soon()).await.unwrap();
        assert_eq!(after.location.area, "Cantonments");
    }

    #[tokio::test]
    async fn test_deactivated_resident_cannot_request() {
        let fixture = Fixture::new();
        let hub = &fixture.hub;
        let resident = hub
            .users
            .register(new_user("yaa@example.com", Role::Resident))
            .await
            .unwrap();
        hub.users.set_active(resident.id, false, None).await.unwrap();

        let err = hub
            .pickups
            .request_pickup(resident.id, soon())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}

// =============================================================================
// Pickups
// =============================================================================

mod pickup_tests {
    use super::*;

    struct Setup {
        fixture: Fixture,
        resident: User,
        collector: User,
    }

    fn setup() -> Setup {
        let fixture = Fixture::new();
        let resident = resident("Ama Owusu", "Osu");
        let collector = collector("Yaw Collector");
        fixture.seed(&[resident.clone(), collector.clone()]);
        Setup {
            fixture,
            resident,
            collector,
        }
    }

    #[tokio::test]
    async fn test_request_copies_resident_location() {
        let s = setup();
        let pickup = s
            .fixture
            .hub
            .pickups
            .request_pickup(s.resident.id, soon())
            .await
            .unwrap();
        assert_eq!(pickup.status, PickupStatus::Requested);
        assert_eq!(pickup.location, s.resident.location);
        assert_eq!(pickup.collector_id, None);
    }

    #[tokio::test]
    async fn test_request_rules() {
        let s = setup();
        let pickups = &s.fixture.hub.pickups;

        let err = pickups
            .request_pickup(s.collector.id, soon())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let past = NewPickupRequest {
            scheduled_date: Utc::now().date_naive() - Duration::days(1),
            notes: None,
        };
        let err = pickups.request_pickup(s.resident.id, past).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = pickups
            .request_pickup(Uuid::new_v4(), soon())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "user", .. }));
    }

    #[tokio::test]
    async fn test_assign_and_complete_notify_resident() {
        let s = setup();
        let hub = &s.fixture.hub;
        let pickup = hub.pickups.request_pickup(s.resident.id, soon()).await.unwrap();

        let scheduled = hub
            .pickups
            .assign_collector(pickup.id, s.collector.id, None)
            .await
            .unwrap();
        assert_eq!(scheduled.status, PickupStatus::Scheduled);
        assert_eq!(scheduled.collector_id, Some(s.collector.id));

        hub.pickups
            .update_status(pickup.id, PickupStatus::InProgress, Some(s.collector.id))
            .await
            .unwrap();
        let done = hub
            .pickups
            .update_status(pickup.id, PickupStatus::Completed, Some(s.collector.id))
            .await
            .unwrap();
        assert!(done.completed_at.is_some());

        let inbox = hub
            .notifications
            .list(
                &NotificationFilter {
                    user_id: Some(s.resident.id),
                    ..Default::default()
                },
                PageRequest::default(),
                None,
            )
            .await
            .unwrap();
        let mut kinds: Vec<NotificationKind> = inbox.data.iter().map(|n| n.kind).collect();
        kinds.sort_by_key(|k| format!("{:?}", k));
        assert_eq!(
            kinds,
            vec![NotificationKind::PickupCompleted, NotificationKind::PickupScheduled]
        );

        let err = hub
            .pickups
            .update_status(pickup.id, PickupStatus::Cancelled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_only_collectors_can_be_assigned() {
        let s = setup();
        let hub = &s.fixture.hub;
        let pickup = hub.pickups.request_pickup(s.resident.id, soon()).await.unwrap();

        let err = hub
            .pickups
            .assign_collector(pickup.id, s.resident.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unassigned_pickup_cannot_complete() {
        let s = setup();
        let hub = &s.fixture.hub;
        let pickup = hub.pickups.request_pickup(s.resident.id, soon()).await.unwrap();

        let err = hub
            .pickups
            .update_status(pickup.id, PickupStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));

        let listed = hub
            .pickups
            .list(
                &PickupFilter {
                    status: Some(vec![PickupStatus::Requested]),
                    ..Default::default()
                },
                PageRequest::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(listed.pagination.total, 1);
    }
}

// =============================================================================
// Payments
// =============================================================================

mod payment_tests {
    use super::*;

    fn payer(fixture: &Fixture) -> User {
        let user = resident("Kofi Mensah", "Labone");
        fixture.seed(&[user.clone()]);
        user
    }

    #[tokio::test]
    async fn test_create_generates_reference_and_rounds() {
        let fixture = Fixture::new();
        let user = payer(&fixture);

        let payment = fixture
            .hub
            .payments
            .create_payment(new_payment(&user, None), Some(user.id))
            .await
            .unwrap();
        assert!(payment.reference.starts_with("PAY-"));
        assert_eq!(payment.amount, 80.0);
        assert_eq!(payment.status, PaymentStatus::Pending);

        let found = fixture
            .hub
            .payments
            .find_by_reference(&payment.reference)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(payment.id));
    }

    #[tokio::test]
    async fn test_references_are_unique_and_well_formed() {
        let fixture = Fixture::new();
        let user = payer(&fixture);
        let payments = &fixture.hub.payments;

        payments
            .create_payment(new_payment(&user, Some("momo-2026-0001")), None)
            .await
            .unwrap();
        let err = payments
            .create_payment(new_payment(&user, Some("MOMO-2026-0001")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = payments
            .create_payment(new_payment(&user, Some("bad ref!")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sub_cent_amount_is_rejected() {
        let fixture = Fixture::new();
        let user = payer(&fixture);

        let mut input = new_payment(&user, None);
        input.amount = 0.004;
        let err = assert_err!(fixture.hub.payments.create_payment(input, None).await);
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(fixture.store.rows("payments").is_empty());

        let mut input = new_payment(&user, None);
        input.amount = 0.005;
        let payment = assert_ok!(fixture.hub.payments.create_payment(input, None).await);
        assert_eq!(payment.amount, 0.01);
    }

    #[tokio::test]
    async fn test_lifecycle_is_pending_only() {
        let fixture = Fixture::new();
        let user = payer(&fixture);
        let hub = &fixture.hub;
        let payment = hub
            .payments
            .create_payment(new_payment(&user, None), None)
            .await
            .unwrap();

        let completed = hub.payments.complete(payment.id, None).await.unwrap();
        assert_eq!(completed.status, PaymentStatus::Completed);

        let err = hub.payments.fail(payment.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition { entity: "payment", .. }
        ));

        let inbox = hub
            .notifications
            .list(
                &NotificationFilter {
                    user_id: Some(user.id),
                    ..Default::default()
                },
                PageRequest::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(inbox.data.len(), 1);
        assert_eq!(inbox.data[0].kind, NotificationKind::PaymentReceived);
    }

    #[tokio::test]
    async fn test_delete_is_hard_and_audited() {
        let fixture = Fixture::new();
        let user = payer(&fixture);
        let hub = &fixture.hub;
        let payment = hub
            .payments
            .create_payment(new_payment(&user, None), None)
            .await
            .unwrap();

        hub.payments.delete(payment.id, Some(user.id)).await.unwrap();
        assert!(fixture.store.rows("payments").is_empty());

        let err = hub.payments.get(payment.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let audit = hub
            .context
            .audit
            .list(
                &AuditLogFilter {
                    action: Some("payment.deleted".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(audit.data.len(), 1);
        assert!(audit.data[0].before.is_some());
        assert!(audit.data[0].after.is_none());
    }

    #[tokio::test]
    async fn test_create_on_legacy_schema() {
        let store = InMemoryStore::new().with_columns("payments", &legacy_payment_columns());
        let fixture = Fixture::with_store(store, AppConfig::default());
        let user = payer(&fixture);

        let payment = fixture
            .hub
            .payments
            .create_payment(new_payment(&user, Some("LEGACY-0001")), None)
            .await
            .unwrap();
        assert_eq!(payment.reference, "LEGACY-0001");
        assert_eq!(payment.metadata, None, "metadata column does not exist");

        let rows = fixture.store.rows("payments");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][LEGACY_REFERENCE_COLUMN], "LEGACY-0001");
        assert_eq!(
            fixture
                .hub
                .translator()
                .schema()
                .effective::<wastewise::models::Payment>(),
            SchemaGeneration::Legacy
        );

        let found = fixture
            .hub
            .payments
            .find_by_reference("LEGACY-0001")
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(payment.id));
    }
}

// =============================================================================
// Complaints
// =============================================================================

mod complaint_tests {
    use super::*;

    fn complaint_about(pickup_id: Uuid) -> NewComplaint {
        NewComplaint {
            pickup_request_id: pickup_id,
            description: "Bins were left half full on the kerb".to_string(),
            photo_url: None,
            priority: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_complaint_ownership() {
        let fixture = Fixture::new();
        let owner = resident("Ama Owusu", "Osu");
        let neighbour = resident("Esi Appiah", "Osu");
        let pickup = pickup(&owner, None, PickupStatus::Completed, 3);
        fixture.seed(&[owner.clone(), neighbour.clone()]);
        fixture.seed(&[pickup.clone()]);
        let complaints = &fixture.hub.complaints;

        let err = complaints
            .file_complaint(neighbour.id, complaint_about(pickup.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = complaints
            .file_complaint(owner.id, complaint_about(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NotFound {
                entity: "pickup request",
                ..
            }
        ));

        let filed = complaints
            .file_complaint(owner.id, complaint_about(pickup.id))
            .await
            .unwrap();
        assert_eq!(filed.status, ComplaintStatus::Open);
    }

    #[tokio::test]
    async fn test_status_only_moves_forward() {
        let fixture = Fixture::new();
        let owner = resident("Ama Owusu", "Osu");
        let pickup = pickup(&owner, None, PickupStatus::Completed, 3);
        fixture.seed(&[owner.clone()]);
        fixture.seed(&[pickup.clone()]);
        let complaints = &fixture.hub.complaints;
        let filed = complaints
            .file_complaint(owner.id, complaint_about(pickup.id))
            .await
            .unwrap();

        let resolved = complaints
            .update_status(
                filed.id,
                ComplaintStatusUpdate {
                    status: ComplaintStatus::Resolved,
                    admin_notes: Some("Crew sent back".to_string()),
                },
                None,
            )
            .await
            .unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.admin_notes.as_deref(), Some("Crew sent back"));

        let err = complaints
            .update_status(
                filed.id,
                ComplaintStatusUpdate {
                    status: ComplaintStatus::InProgress,
                    admin_notes: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));

        let closed = complaints
            .update_status(
                filed.id,
                ComplaintStatusUpdate {
                    status: ComplaintStatus::Closed,
                    admin_notes: None,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(closed.resolved_at, resolved.resolved_at);
    }
}

// =============================================================================
// Subscriptions, notifications, dashboard, maintenance
// =============================================================================

mod account_tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let fixture = Fixture::new();
        let user = resident("Ama Owusu", "Osu");
        fixture.seed(&[user.clone()]);
        let subs = &fixture.hub.subscriptions;

        let sub = assert_ok!(subs.subscribe(user.id, PlanType::Premium, None).await);
        assert_eq!(sub.price, 120.0);
        assert_eq!(sub.status, SubscriptionStatus::Active);

        let err = subs
            .subscribe(user.id, PlanType::Basic, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        subs.pause(sub.id, None).await.unwrap();
        assert!(subs.active_for(user.id).await.unwrap().is_none());
        subs.resume(sub.id, None).await.unwrap();

        let cancelled = subs.cancel(sub.id, None).await.unwrap();
        assert!(cancelled.end_date.is_some());
        let err = subs.resume(sub.id, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_broadcast_and_mark_read() {
        let fixture = Fixture::new();
        let user = resident("Ama Owusu", "Osu");
        fixture.seed(&[user.clone()]);
        let notifications = &fixture.hub.notifications;

        let broadcast = notifications
            .broadcast(
                NotificationKind::Announcement,
                "Holiday schedule",
                "No collections on Monday",
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(broadcast.user_id, None);
        assert_eq!(broadcast.audience, AudienceKind::System);

        for title in ["One", "Two"] {
            notifications
                .notify(user.id, NotificationKind::PickupScheduled, title, "body", None)
                .await
                .unwrap();
        }
        let mut events = fixture.hub.events().subscribe();
        assert_eq!(notifications.mark_all_read(user.id).await.unwrap(), 2);
        assert_eq!(
            events.recv().await.unwrap().event,
            EntityEvent::BulkUpdated {
                table: "notifications".to_string(),
                count: 2
            }
        );
        assert_eq!(notifications.mark_all_read(user.id).await.unwrap(), 0);
        assert!(events.try_recv().is_err(), "nothing changed, nothing published");

        let unread = notifications
            .list(
                &NotificationFilter {
                    is_read: Some(false),
                    ..Default::default()
                },
                PageRequest::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(unread.data.len(), 1, "the broadcast stays unread");
    }

    #[tokio::test]
    async fn test_dashboard_summary() {
        let fixture = Fixture::new();
        let ama = resident("Ama Owusu", "Osu");
        let kofi = resident("Kofi Mensah", "Labone");
        let yaw = collector("Yaw Collector");
        fixture.seed(&[ama.clone(), kofi.clone(), yaw.clone()]);
        fixture.seed(&[
            pickup(&ama, Some(&yaw), PickupStatus::Completed, 2),
            pickup(&kofi, None, PickupStatus::Requested, 3),
        ]);
        fixture.seed(&[
            payment(&ama, 50.25, PaymentStatus::Completed, 2),
            payment(&kofi, 30.0, PaymentStatus::Completed, 3),
            payment(&kofi, 99.0, PaymentStatus::Pending, 4),
        ]);
        fixture.seed(&[subscription(&ama, PlanType::Basic, SubscriptionStatus::Active, 1)]);

        let summary = fixture.hub.dashboard.summary().await.unwrap();
        assert_eq!(summary.users_by_role["resident"], 2);
        assert_eq!(summary.users_by_role["collector"], 1);
        assert_eq!(summary.users_by_role["admin"], 0);
        assert_eq!(summary.pickups_by_status["completed"], 1);
        assert_eq!(summary.pickups_by_status["requested"], 1);
        assert_eq!(summary.complaints_by_status["open"], 0);
        assert_eq!(summary.active_subscriptions, 1);
        assert_eq!(summary.revenue, 80.25);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_mutation() {
        let fixture = Fixture::new();
        fixture.store.fail_next(
            "audit_logs",
            wastewise::core::StoreError::Connection("audit store down".to_string()),
        );

        let user = fixture
            .hub
            .users
            .register(new_user("kwame@example.com", Role::Admin))
            .await
            .unwrap();
        assert_eq!(fixture.store.rows("users").len(), 1);
        assert!(fixture.store.rows("audit_logs").is_empty());
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_maintenance_purges_by_age() {
        let fixture = Fixture::new();
        let user = fixture
            .hub
            .users
            .register(new_user("adjoa@example.com", Role::Resident))
            .await
            .unwrap();
        fixture
            .hub
            .notifications
            .notify(user.id, NotificationKind::Announcement, "Hi", "Welcome", None)
            .await
            .unwrap();

        let report = fixture.hub.run_maintenance(Utc::now()).await.unwrap();
        assert_eq!(report.notifications, 0);
        assert_eq!(report.audit_logs, 0);

        let report = fixture
            .hub
            .run_maintenance(Utc::now() + Duration::days(120))
            .await
            .unwrap();
        assert_eq!(report.notifications, 1);
        assert_eq!(report.audit_logs, 0);

        let report = fixture
            .hub
            .run_maintenance(Utc::now() + Duration::days(400))
            .await
            .unwrap();
        assert_eq!(report.audit_logs, 1);
        assert!(fixture.store.rows("notifications").is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_refuses_bad_retention() {
        let mut config = AppConfig::default();
        config.retention.notification_days = -30;
        let fixture = Fixture::with_store(InMemoryStore::new(), config);
        let user = resident("Ama Owusu", "Osu");
        fixture.seed(&[user.clone()]);
        fixture
            .hub
            .notifications
            .notify(user.id, NotificationKind::Announcement, "Hi", "Welcome", None)
            .await
            .unwrap();

        let err = assert_err!(fixture.hub.run_maintenance(Utc::now()).await);
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(fixture.store.rows("notifications").len(), 1);

        let mut config = AppConfig::default();
        config.retention.audit_log_days = i64::MAX / 2;
        let fixture = Fixture::with_store(InMemoryStore::new(), config);
        let err = assert_err!(fixture.hub.run_maintenance(Utc::now()).await);
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
