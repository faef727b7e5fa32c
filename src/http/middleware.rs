//! API-key rate limiting middleware.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, error, warn};

use super::response::{apply_quota_headers, ApiError};
use super::AppState;
use crate::ratelimit::{Decision, RateLimitError};

/// Extract the caller API key: the username of HTTP Basic authorization.
pub fn caller_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(credentials.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let username = match decoded.split_once(':') {
        Some((username, _password)) => username,
        None => decoded.as_str(),
    };
    Some(username.to_string())
}

/// Count the request against its API key and reject it when over quota.
///
/// Quota headers are set on every response that got a decision, including
/// responses of the wrapped handler.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = caller_key(request.headers());

    match state.limiter.check(key.as_deref()).await {
        Ok(Decision::Allow(quota)) => {
            let mut response = next.run(request).await;
            apply_quota_headers(response.headers_mut(), &quota);
            response
        }
        Ok(Decision::Deny(quota)) => {
            debug!(key = ?key, "Rejecting request over quota");
            let mut response = ApiError::TooManyRequests.into_response();
            apply_quota_headers(response.headers_mut(), &quota);
            response
        }
        Err(RateLimitError::Unauthorized) => ApiError::Unauthorized("API Key required").into_response(),
        Err(RateLimitError::ServiceUnavailable) => {
            warn!(key = ?key, operation = "is_ready", "Counter store not ready, rejecting request");
            ApiError::ServiceUnavailable.into_response()
        }
        Err(RateLimitError::Internal(e)) => {
            error!(
                key = ?key,
                operation = "increment_or_create",
                error = %e,
                "Counter store error"
            );
            ApiError::Internal("Internal server error").into_response()
        }
    }
}
