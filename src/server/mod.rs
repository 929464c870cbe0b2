//! REST exposure over the service hub
//!
//! Authentication is delegated to whatever sits in front of this server; the
//! acting user arrives in the `x-actor-id` header.

pub mod builder;
pub mod extract;
pub mod handlers;
pub mod router;

pub use builder::ServerBuilder;
pub use extract::{ACTOR_HEADER, Actor};
pub use handlers::AppState;
pub use router::build_routes;
