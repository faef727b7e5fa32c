//! HTTP API: routes, rate limiting middleware and server.

mod handlers;
mod middleware;
mod response;
mod server;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::ratelimit::{CounterStore, RateLimiter};
use crate::weather::WeatherModel;

pub use handlers::{health_handler, weather_handler, WeatherResponse};
pub use middleware::{caller_key, rate_limit_middleware};
pub use response::{
    ApiError, HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET,
};
pub use server::HttpServer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub weather: WeatherModel,
    pub store: Arc<dyn CounterStore>,
}

/// Build the service router.
///
/// Only the weather endpoint is rate limited; `/health` is open.
pub fn router(state: AppState) -> Router {
    let weather = Router::new()
        .route("/weather/{country}/{city}", get(weather_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(weather)
        .route("/health", get(health_handler))
        .with_state(state)
}
