//! Domain records persisted in the hosted store

pub mod audit;
pub mod complaint;
pub mod notification;
pub mod payment;
pub mod pickup;
pub mod subscription;
pub mod user;

pub use audit::{AuditLog, AuditLogFilter};
pub use complaint::{
    Complaint, ComplaintFilter, ComplaintPriority, ComplaintStatus, ComplaintStatusUpdate,
    NewComplaint,
};
pub use notification::{Audience, AudienceKind, Notification, NotificationFilter, NotificationKind};
pub use payment::{NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentStatus};
pub use pickup::{NewPickupRequest, PickupFilter, PickupRequest, PickupStatus};
pub use subscription::{PlanType, Subscription, SubscriptionFilter, SubscriptionStatus};
pub use user::{Location, NewUser, Role, User, UserFilter};

/// Wire name of a unit enum variant, e.g. `in_progress`
pub fn label<V: serde::Serialize>(value: &V) -> String {
    crate::core::filter::enum_value(value).to_text()
}
