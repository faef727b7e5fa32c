//! Weather description lookup on top of a weather source.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::sdk::{SdkError, WeatherSource};

/// Errors from looking up a weather description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("could not find weather for country and city")]
    NotFound,
    #[error("access to the weather source was denied")]
    AccessDenied,
    #[error("weather source failed, please retry")]
    PleaseRetry,
}

impl From<SdkError> for WeatherError {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::NotFound => WeatherError::NotFound,
            SdkError::Unauthorized => WeatherError::AccessDenied,
            SdkError::Retryable => WeatherError::PleaseRetry,
        }
    }
}

/// Looks up short weather descriptions by country and city.
#[derive(Clone)]
pub struct WeatherModel {
    source: Arc<dyn WeatherSource>,
}

impl WeatherModel {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }

    /// Get the description of the current weather, e.g. "few clouds".
    pub async fn description(&self, country: &str, city: &str) -> Result<String, WeatherError> {
        let data = self.source.get_weather(country, city).await?;

        let description = data
            .weather
            .first()
            .and_then(|condition| condition.description.as_deref())
            .filter(|description| !description.is_empty())
            .ok_or(WeatherError::NotFound)?;

        debug!(country = %country, city = %city, description = %description, "Resolved weather description");
        Ok(description.to_string())
    }
}
