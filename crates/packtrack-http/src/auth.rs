//! Bearer-secret check for the reconciliation trigger.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Rejects the request with 401 unless it carries
/// `Authorization: Bearer <CRON_SECRET>`. Runs before any handler work.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(value) = req.headers().get("authorization") else {
        return ApiError::Unauthorized("Missing Authorization header".to_string()).into_response();
    };

    let Ok(value) = value.to_str() else {
        return ApiError::Unauthorized("Invalid Authorization header encoding".to_string())
            .into_response();
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if secrets_match(token, &state.cron_secret) => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "rejected request with bad bearer token");
            ApiError::Unauthorized("Invalid bearer token".to_string()).into_response()
        }
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn secrets_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
