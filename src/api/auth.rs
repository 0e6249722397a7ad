//! Owner identity boundary.
//!
//! Authentication itself is an external collaborator: an upstream gateway
//! verifies credentials and injects the owner id as the `x-owner-id`
//! header. This module only extracts it.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;

use super::handlers::ErrorResponse;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Required owner identity; rejects with 401 when the header is absent.
pub struct Owner(pub String);

fn owner_from_parts(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(String::from)
}

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        owner_from_parts(parts).map(Owner).ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "authentication required".to_string(),
            }),
        ))
    }
}
