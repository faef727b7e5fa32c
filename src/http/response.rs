//! Error responses returned by the HTTP API.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ratelimit::Quota;

pub const HEADER_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// An error answered to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(&'static str),
    Unauthorized(&'static str),
    NotFound(&'static str),
    TooManyRequests,
    Internal(&'static str),
    ServiceUnavailable,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorBody {
        let (code, message) = match self {
            ApiError::BadRequest(message) => ("BadRequest", *message),
            ApiError::Unauthorized(message) => ("Unauthorized", *message),
            ApiError::NotFound(message) => ("NotFound", *message),
            ApiError::TooManyRequests => ("TooManyRequests", "Rate limit exceeded"),
            ApiError::Internal(message) => ("InternalServer", *message),
            ApiError::ServiceUnavailable => ("ServiceUnavailable", "Service unavailable, please retry"),
        };
        ErrorBody { code, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Set the `X-RateLimit-*` headers from `quota`.
pub fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(HEADER_RATE_LIMIT_RESET, HeaderValue::from(quota.reset_at));
}

/// Set headers telling clients and proxies not to cache the response.
pub fn apply_no_cache_headers(headers: &mut HeaderMap) {
    headers.insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(axum::http::header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(axum::http::header::EXPIRES, HeaderValue::from_static("0"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::TooManyRequests.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::Internal("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::ServiceUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_quota_headers() {
        let mut headers = HeaderMap::new();
        apply_quota_headers(
            &mut headers,
            &Quota {
                limit: 5,
                remaining: 2,
                reset_at: 1_700_000_060,
            },
        );

        assert_eq!(headers[HEADER_RATE_LIMIT_LIMIT], "5");
        assert_eq!(headers[HEADER_RATE_LIMIT_REMAINING], "2");
        assert_eq!(headers[HEADER_RATE_LIMIT_RESET], "1700000060");
    }
}
