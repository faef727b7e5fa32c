//! Request handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::response::{apply_no_cache_headers, ApiError};
use super::AppState;
use crate::weather::WeatherError;

/// Path parameters of the weather endpoint.
#[derive(Debug, Deserialize)]
pub struct WeatherPath {
    pub country: String,
    pub city: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub weather: String,
}

/// `GET /weather/{country}/{city}`: current weather description.
#[instrument(skip_all, fields(country = %path.country, city = %path.city))]
pub async fn weather_handler(
    State(state): State<AppState>,
    Path(path): Path<WeatherPath>,
) -> Result<Response, ApiError> {
    let country = path.country.trim();
    let city = path.city.trim();
    if country.is_empty() || city.is_empty() {
        return Err(ApiError::BadRequest("Missing parameter: country or city"));
    }

    let description = state
        .weather
        .description(country, city)
        .await
        .map_err(|e| {
            debug!(error = %e, "Weather lookup failed");
            match e {
                WeatherError::NotFound => ApiError::NotFound("Could not find weather"),
                WeatherError::AccessDenied | WeatherError::PleaseRetry => {
                    ApiError::Internal("Server error, please retry")
                }
            }
        })?;

    let mut response = Json(WeatherResponse {
        weather: description,
    })
    .into_response();
    apply_no_cache_headers(response.headers_mut());
    Ok(response)
}

/// `GET /health`: liveness plus counter store readiness.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store_ready = state.store.is_ready();
    let status = if store_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if store_ready { "healthy" } else { "degraded" },
            "store_ready": store_ready,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
