//! Weather Gate - Rate Limited Weather API
//!
//! This crate serves current weather descriptions from OpenWeatherMap behind
//! a per-API-key rate limiter. Usage counters live in a shared counter store
//! whose records expire once their window has elapsed.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod weather;
