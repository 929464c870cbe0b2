//! Request extractors

use crate::core::error::ServiceError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

/// Header naming the user on whose behalf a request is made
///
/// Authentication happens upstream; this service only trusts the header.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The acting user, if the request names one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Option<Uuid>);

impl Actor {
    /// The actor id, or `Forbidden` for anonymous requests
    pub fn required(&self) -> Result<Uuid, ServiceError> {
        self.0.ok_or_else(|| {
            ServiceError::Forbidden(format!("missing {} header", ACTOR_HEADER))
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(None));
        };
        value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|id| Actor(Some(id)))
            .ok_or_else(|| ServiceError::Validation(format!("invalid {} header", ACTOR_HEADER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Actor, ServiceError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_header() {
        let id = Uuid::new_v4();
        assert_eq!(extract(Some(&id.to_string())).await.unwrap(), Actor(Some(id)));
        assert_eq!(extract(None).await.unwrap(), Actor(None));
        assert!(matches!(
            extract(Some("nobody")).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_required() {
        assert!(matches!(
            Actor(None).required(),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
