//! Caller identity.
//!
//! Tokens are issued and verified upstream; the gateway forwards the
//! authenticated user id in `x-user-id`. Requests without it are rejected.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user owning the campaigns a request touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized("missing x-user-id header"))?;
        Ok(Owner(user_id.to_string()))
    }
}
