//! OpenWeatherMap API client.

use async_trait::async_trait;
use reqwest::{header, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::{Result, WeatherGateError};

/// Path of the current weather endpoint, relative to the API host.
pub const WEATHER_API_PATH: &str = "data/2.5/weather";

/// Errors returned by the weather API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SdkError {
    /// No weather for the requested place, or an unusable response
    #[error("weather not found")]
    NotFound,
    /// The API rejected our credentials or quota
    #[error("weather API refused the request")]
    Unauthorized,
    /// Network failure or server-side error; retrying may succeed
    #[error("weather API temporarily unavailable")]
    Retryable,
}

/// Current weather payload. Only the fields the service reads are decoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherData {
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One weather condition entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherCondition {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Source of current weather data.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the current weather for a city in a country.
    async fn get_weather(&self, country: &str, city: &str) -> std::result::Result<WeatherData, SdkError>;
}

/// Client for the OpenWeatherMap current weather API.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl OpenWeatherMapClient {
    /// Create a client for `api_host`, authenticating with `api_key`.
    pub fn new(client: reqwest::Client, api_host: &str, api_key: &str) -> Result<Self> {
        let api_host = api_host.trim();
        if api_host.is_empty() || api_key.trim().is_empty() {
            return Err(WeatherGateError::Config(
                "weather API host and key are required".to_string(),
            ));
        }

        let base = if api_host.ends_with('/') {
            format!("{}{}", api_host, WEATHER_API_PATH)
        } else {
            format!("{}/{}", api_host, WEATHER_API_PATH)
        };
        let endpoint = Url::parse(&base).map_err(|e| {
            WeatherGateError::Config(format!("invalid weather API host {}: {}", api_host, e))
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.trim().to_string(),
        })
    }

    fn request_url(&self, country: &str, city: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(
                "q",
                &format!("{},{}", city.to_lowercase(), country.to_lowercase()),
            )
            .append_pair("appid", &self.api_key);
        url
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherMapClient {
    async fn get_weather(&self, country: &str, city: &str) -> std::result::Result<WeatherData, SdkError> {
        let url = self.request_url(country, city);
        debug!(country = %country, city = %city, "Fetching current weather");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Weather API network error");
                SdkError::Retryable
            })?;

        let status = response.status();
        debug!(status = %status, "Weather API responded");

        if status.is_success() {
            return response.json::<WeatherData>().await.map_err(|e| {
                error!(error = %e, "Weather API returned an unreadable body");
                SdkError::NotFound
            });
        }

        Err(match status {
            StatusCode::NOT_FOUND => SdkError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                warn!(status = %status, "Weather API refused the request");
                SdkError::Unauthorized
            }
            s if s.is_server_error() => SdkError::Retryable,
            s => {
                error!(status = %s, "Weather API returned an unhandled status");
                SdkError::NotFound
            }
        })
    }
}
