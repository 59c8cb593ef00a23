//! Caller identity from the `X-User-Identity` header, set by whatever authenticates in front of us.

use crate::model::UserIdentity;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const USER_IDENTITY_HEADER: &str = "X-User-Identity";

/// `None` for anonymous requests. Blank header values count as anonymous.
#[derive(Clone, Debug, Default)]
pub struct CallerIdentity(pub Option<UserIdentity>);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = parts
            .headers
            .get(USER_IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(UserIdentity::new);
        Ok(CallerIdentity(caller))
    }
}
