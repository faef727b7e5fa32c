//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::{router, AppState};
use crate::error::{Result, WeatherGateError};

/// HTTP server for the weather API.
pub struct HttpServer {
    /// Bound listener
    listener: TcpListener,
    /// Shared handler state
    state: AppState,
}

impl HttpServer {
    /// Bind the server to `addr`.
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(addr = %addr, error = %e, "Failed to bind HTTP listener");
            WeatherGateError::Io(e)
        })?;
        Ok(Self { listener, state })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until the provided signal resolves.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(addr = %addr, "Starting HTTP server for weather API");

        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                WeatherGateError::Io(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{
        WeatherResponse, HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING,
        HEADER_RATE_LIMIT_RESET,
    };
    use crate::ratelimit::{
        Clock, CounterStore, KeyRegistry, LimitConfig, MemoryCounterStore, RateLimiter,
        StoreError, SystemClock, UsageRecord,
    };
    use crate::weather::{SdkError, WeatherCondition, WeatherData, WeatherModel, WeatherSource};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    const VALID_KEY: &str = "27f01d68e204427fbeb7c0dff06c7e94";

    struct FakeWeather;

    #[async_trait]
    impl WeatherSource for FakeWeather {
        async fn get_weather(&self, country: &str, city: &str) -> std::result::Result<WeatherData, SdkError> {
            match (country, city) {
                ("australia", "melbourne") | ("uk", "london") => Ok(WeatherData {
                    weather: vec![WeatherCondition {
                        description: Some("few clouds".to_string()),
                        ..Default::default()
                    }],
                    name: None,
                }),
                ("please_retry", _) => Err(SdkError::Retryable),
                _ => Err(SdkError::NotFound),
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn increment_or_create(&self, _key: &str, _window_secs: u64) -> std::result::Result<UsageRecord, StoreError> {
            Err(StoreError::Closed)
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    struct TestServer {
        base: String,
        client: reqwest::Client,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl TestServer {
        async fn start(limit: u64, store: Arc<dyn CounterStore>) -> Self {
            let state = AppState {
                limiter: Arc::new(RateLimiter::new(
                    LimitConfig {
                        limit,
                        window_secs: 60,
                    },
                    KeyRegistry::new([VALID_KEY]),
                    store.clone(),
                )),
                weather: WeatherModel::new(Arc::new(FakeWeather)),
                store,
            };

            let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), state)
                .await
                .unwrap();
            let addr = server.local_addr().unwrap();
            let (tx, rx) = oneshot::channel::<()>();
            tokio::spawn(server.serve_with_shutdown(async move {
                let _ = rx.await;
            }));

            Self {
                base: format!("http://{}", addr),
                client: reqwest::Client::new(),
                shutdown: Some(tx),
            }
        }

        async fn get(&self, path: &str, key: Option<&str>) -> reqwest::Response {
            let mut request = self.client.get(format!("{}{}", self.base, path));
            if let Some(key) = key {
                request = request.basic_auth(key, Some("x"));
            }
            request.send().await.unwrap()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    fn memory_store() -> Arc<MemoryCounterStore> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Arc::new(MemoryCounterStore::new(60, clock))
    }

    fn header(response: &reqwest::Response, name: &str) -> i64 {
        response.headers()[name].to_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_valid_key_gets_weather_and_quota_headers() {
        let server = TestServer::start(5, memory_store()).await;
        let now = chrono::Utc::now().timestamp();

        let response = server.get("/weather/australia/melbourne", Some(VALID_KEY)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, HEADER_RATE_LIMIT_LIMIT), 5);
        assert_eq!(header(&response, HEADER_RATE_LIMIT_REMAINING), 4);
        assert!(header(&response, HEADER_RATE_LIMIT_RESET) > now);
        assert_eq!(
            response.headers()["cache-control"],
            "no-cache, no-store, must-revalidate"
        );

        let body: WeatherResponse = response.json().await.unwrap();
        assert_eq!(body.weather, "few clouds");
    }

    #[tokio::test]
    async fn test_uppercase_key_is_accepted() {
        let server = TestServer::start(5, memory_store()).await;

        let response = server
            .get("/weather/uk/london", Some(&VALID_KEY.to_uppercase()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_or_missing_key_is_unauthorized() {
        let store = memory_store();
        let server = TestServer::start(5, store.clone()).await;

        let response = server.get("/weather/australia/melbourne", Some("INVALID_API_KEY")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(HEADER_RATE_LIMIT_LIMIT).is_none());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "Unauthorized");
        assert_eq!(body["message"], "API Key required");

        let response = server.get("/weather/australia/melbourne", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_second_call_over_limit_is_rejected() {
        let server = TestServer::start(1, memory_store()).await;

        let first = server.get("/weather/uk/london", Some(VALID_KEY)).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(header(&first, HEADER_RATE_LIMIT_REMAINING), 0);
        let reset = header(&first, HEADER_RATE_LIMIT_RESET);

        let second = server.get("/weather/uk/london", Some(VALID_KEY)).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&second, HEADER_RATE_LIMIT_LIMIT), 1);
        assert_eq!(header(&second, HEADER_RATE_LIMIT_REMAINING), 0);
        assert_eq!(header(&second, HEADER_RATE_LIMIT_RESET), reset);
    }

    #[tokio::test]
    async fn test_weather_errors_keep_quota_headers() {
        let server = TestServer::start(5, memory_store()).await;

        let not_found = server.get("/weather/uukk/lonlon", Some(VALID_KEY)).await;
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&not_found, HEADER_RATE_LIMIT_REMAINING), 4);
        let body: serde_json::Value = not_found.json().await.unwrap();
        assert_eq!(body["message"], "Could not find weather");

        let retry = server.get("/weather/please_retry/please_retry", Some(VALID_KEY)).await;
        assert_eq!(retry.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = retry.json().await.unwrap();
        assert_eq!(body["message"], "Server error, please retry");
    }

    #[tokio::test]
    async fn test_blank_parameter_is_bad_request() {
        let server = TestServer::start(5, memory_store()).await;

        let response = server.get("/weather/%20/london", Some(VALID_KEY)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_not_ready_is_service_unavailable() {
        let store = memory_store();
        store.set_ready(false);
        let server = TestServer::start(5, store).await;

        let response = server.get("/weather/uk/london", Some(VALID_KEY)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let health = server.get("/health", None).await;
        assert_eq!(health.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let server = TestServer::start(5, Arc::new(BrokenStore)).await;

        let response = server.get("/weather/uk/london", Some(VALID_KEY)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(HEADER_RATE_LIMIT_LIMIT).is_none());
    }

    #[tokio::test]
    async fn test_health_is_not_rate_limited() {
        let server = TestServer::start(1, memory_store()).await;

        for _ in 0..3 {
            let response = server.get("/health", None).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value = response.json().await.unwrap();
            assert_eq!(body["status"], "healthy");
        }
    }
}
