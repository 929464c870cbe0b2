//! HTTP handlers
//!
//! List endpoints take two query extractors over the same query string: the
//! paging parameters (`page`, `limit`, `sort`) and the entity's filter.

use crate::core::error::ServiceError;
use crate::core::query::{PageParams, PaginatedResponse};
use crate::models::{
    AuditLog, AuditLogFilter, Complaint, ComplaintFilter, ComplaintStatusUpdate, Location,
    NewComplaint, NewPayment, NewPickupRequest, NewUser, Notification, NotificationFilter,
    NotificationKind, Payment, PaymentFilter, PickupFilter, PickupRequest, PickupStatus, PlanType,
    Subscription, SubscriptionFilter, User, UserFilter,
};
use crate::query::aggregation::{CustomerDetails, CustomerFilter};
use crate::server::extract::Actor;
use crate::services::dashboard::DashboardSummary;
use crate::services::{MaintenanceReport, ServiceHub};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ServiceHub>,
}

type ApiResult<T> = Result<Json<T>, ServiceError>;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "wastewise"
    }))
}

// === Users ===

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<PaginatedResponse<User>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state.hub.users.list(&filter, page, params.sort_spec()).await?,
    ))
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ServiceError> {
    let user = state.hub.users.register(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<User> {
    Ok(Json(state.hub.users.get(id).await?))
}

pub async fn update_user_location(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(location): Json<Location>,
) -> ApiResult<User> {
    Ok(Json(
        state.hub.users.update_location(id, location, actor.0).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

pub async fn set_user_active(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ActiveRequest>,
) -> ApiResult<User> {
    Ok(Json(
        state.hub.users.set_active(id, body.is_active, actor.0).await?,
    ))
}

// === Pickups ===

pub async fn list_pickups(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<PickupFilter>,
) -> ApiResult<PaginatedResponse<PickupRequest>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state.hub.pickups.list(&filter, page, params.sort_spec()).await?,
    ))
}

/// The acting resident requests a pickup for themselves
pub async fn request_pickup(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewPickupRequest>,
) -> Result<(StatusCode, Json<PickupRequest>), ServiceError> {
    let resident = actor.required()?;
    let pickup = state.hub.pickups.request_pickup(resident, input).await?;
    Ok((StatusCode::CREATED, Json(pickup)))
}

pub async fn get_pickup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PickupRequest> {
    Ok(Json(state.hub.pickups.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub collector_id: Uuid,
}

pub async fn assign_collector(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<PickupRequest> {
    Ok(Json(
        state
            .hub
            .pickups
            .assign_collector(id, body.collector_id, actor.0)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct PickupStatusRequest {
    pub status: PickupStatus,
}

pub async fn update_pickup_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PickupStatusRequest>,
) -> ApiResult<PickupRequest> {
    Ok(Json(
        state.hub.pickups.update_status(id, body.status, actor.0).await?,
    ))
}

// === Payments ===

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<PaginatedResponse<Payment>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state.hub.payments.list(&filter, page, params.sort_spec()).await?,
    ))
}

pub async fn create_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewPayment>,
) -> Result<(StatusCode, Json<Payment>), ServiceError> {
    let payment = state.hub.payments.create_payment(input, actor.0).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    Ok(Json(state.hub.payments.get(id).await?))
}

pub async fn get_payment_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Payment> {
    state
        .hub
        .payments
        .find_by_reference(&reference)
        .await?
        .map(Json)
        .ok_or(ServiceError::KeyNotFound {
            entity: "payment",
            key: reference,
        })
}

pub async fn complete_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    Ok(Json(state.hub.payments.complete(id, actor.0).await?))
}

pub async fn fail_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    Ok(Json(state.hub.payments.fail(id, actor.0).await?))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.hub.payments.delete(id, actor.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

// === Complaints ===

pub async fn list_complaints(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<ComplaintFilter>,
) -> ApiResult<PaginatedResponse<Complaint>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state
            .hub
            .complaints
            .list(&filter, page, params.sort_spec())
            .await?,
    ))
}

pub async fn file_complaint(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewComplaint>,
) -> Result<(StatusCode, Json<Complaint>), ServiceError> {
    let resident = actor.required()?;
    let complaint = state.hub.complaints.file_complaint(resident, input).await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

pub async fn get_complaint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Complaint> {
    Ok(Json(state.hub.complaints.get(id).await?))
}

pub async fn update_complaint_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(update): Json<ComplaintStatusUpdate>,
) -> ApiResult<Complaint> {
    Ok(Json(
        state.hub.complaints.update_status(id, update, actor.0).await?,
    ))
}

// === Subscriptions ===

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<SubscriptionFilter>,
) -> ApiResult<PaginatedResponse<Subscription>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state
            .hub
            .subscriptions
            .list(&filter, page, params.sort_spec())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub user_id: Uuid,
    pub plan_type: PlanType,
}

pub async fn subscribe(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<Subscription>), ServiceError> {
    let subscription = state
        .hub
        .subscriptions
        .subscribe(body.user_id, body.plan_type, actor.0)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn pause_subscription(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Subscription> {
    Ok(Json(state.hub.subscriptions.pause(id, actor.0).await?))
}

pub async fn resume_subscription(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Subscription> {
    Ok(Json(state.hub.subscriptions.resume(id, actor.0).await?))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Subscription> {
    Ok(Json(state.hub.subscriptions.cancel(id, actor.0).await?))
}

// === Notifications ===

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<NotificationFilter>,
) -> ApiResult<PaginatedResponse<Notification>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state
            .hub
            .notifications
            .list(&filter, page, params.sort_spec())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    #[serde(default = "default_broadcast_kind")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_broadcast_kind() -> NotificationKind {
    NotificationKind::Announcement
}

pub async fn broadcast_notification(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<Notification>), ServiceError> {
    if body.title.trim().is_empty() || body.message.trim().is_empty() {
        return Err(ServiceError::Validation(
            "title and message are required".to_string(),
        ));
    }
    let notification = state
        .hub
        .notifications
        .broadcast(body.kind, &body.title, &body.message, body.data, actor.0)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Notification> {
    Ok(Json(state.hub.notifications.mark_read(id).await?))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Value> {
    let updated = state.hub.notifications.mark_all_read(user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

// === Audit, aggregation and admin ===

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<AuditLogFilter>,
) -> ApiResult<PaginatedResponse<AuditLog>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state
            .hub
            .context
            .audit
            .list(&filter, page, params.sort_spec())
            .await?,
    ))
}

/// Residents a collector has served, enriched with billing and pickup stats
pub async fn collector_customers(
    State(state): State<AppState>,
    Path(collector_id): Path<Uuid>,
    Query(params): Query<PageParams>,
    Query(filter): Query<CustomerFilter>,
) -> ApiResult<PaginatedResponse<CustomerDetails>> {
    let page = params.page_request(&state.hub.config().query);
    Ok(Json(
        state
            .hub
            .customers
            .customers_for_collector(collector_id, &filter, page, params.sort_spec())
            .await?,
    ))
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    Ok(Json(state.hub.dashboard.summary().await?))
}

pub async fn run_maintenance(State(state): State<AppState>) -> ApiResult<MaintenanceReport> {
    Ok(Json(state.hub.run_maintenance(Utc::now()).await?))
}
