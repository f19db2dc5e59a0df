use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;

/// Header the upstream gateway sets for authenticated callers.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller; `None` when unauthenticated or the header is not a UUID.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Option<UserId>);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<UserId>().ok());

        Ok(Self(user_id))
    }
}
