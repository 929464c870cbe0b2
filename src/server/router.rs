//! Route table

use crate::server::handlers::{self, AppState};
use axum::Router;
use axum::routing::{get, post, put};

/// Every REST route over one application state
///
/// - `GET /health`, `GET /healthz`
/// - paginated `GET` on `/users`, `/pickups`, `/payments`, `/complaints`,
///   `/subscriptions`, `/notifications`, `/audit-logs`
/// - `GET /collectors/{id}/customers`
/// - `GET /admin/dashboard`, `POST /admin/maintenance`
/// - mutations for each service
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        // users
        .route(
            "/users",
            get(handlers::list_users).post(handlers::register_user),
        )
        .route("/users/{id}", get(handlers::get_user))
        .route("/users/{id}/location", put(handlers::update_user_location))
        .route("/users/{id}/active", put(handlers::set_user_active))
        .route(
            "/users/{id}/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        // pickups
        .route(
            "/pickups",
            get(handlers::list_pickups).post(handlers::request_pickup),
        )
        .route("/pickups/{id}", get(handlers::get_pickup))
        .route("/pickups/{id}/assign", put(handlers::assign_collector))
        .route("/pickups/{id}/status", put(handlers::update_pickup_status))
        // payments
        .route(
            "/payments",
            get(handlers::list_payments).post(handlers::create_payment),
        )
        .route(
            "/payments/{id}",
            get(handlers::get_payment).delete(handlers::delete_payment),
        )
        .route("/payments/{id}/complete", post(handlers::complete_payment))
        .route("/payments/{id}/fail", post(handlers::fail_payment))
        .route(
            "/payment-references/{reference}",
            get(handlers::get_payment_by_reference),
        )
        // complaints
        .route(
            "/complaints",
            get(handlers::list_complaints).post(handlers::file_complaint),
        )
        .route("/complaints/{id}", get(handlers::get_complaint))
        .route(
            "/complaints/{id}/status",
            put(handlers::update_complaint_status),
        )
        // subscriptions
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions).post(handlers::subscribe),
        )
        .route(
            "/subscriptions/{id}/pause",
            post(handlers::pause_subscription),
        )
        .route(
            "/subscriptions/{id}/resume",
            post(handlers::resume_subscription),
        )
        .route(
            "/subscriptions/{id}/cancel",
            post(handlers::cancel_subscription),
        )
        // notifications
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/broadcast",
            post(handlers::broadcast_notification),
        )
        .route(
            "/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        // audit, aggregation, admin
        .route("/audit-logs", get(handlers::list_audit_logs))
        .route(
            "/collectors/{id}/customers",
            get(handlers::collector_customers),
        )
        .route("/admin/dashboard", get(handlers::dashboard))
        .route("/admin/maintenance", post(handlers::run_maintenance))
        .with_state(state)
}
