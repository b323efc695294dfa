use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::GlucoseError;

/// Header the upstream authentication layer sets on every forwarded request.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller, taken as given from the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = GlucoseError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_string()))
            .ok_or(GlucoseError::Unauthorized)
    }
}
