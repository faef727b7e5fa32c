use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weather_gate::config::GateConfig;
use weather_gate::http::{AppState, HttpServer};
use weather_gate::ratelimit::{self, KeyRegistry, RateLimiter, SystemClock};
use weather_gate::weather::{OpenWeatherMapClient, WeatherModel};

/// Weather description API guarded by a per-API-key rate limiter.
#[derive(Parser, Debug)]
#[command(name = "weather-gate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "WEATHER_GATE_CONFIG")]
    config: Option<String>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// OpenWeatherMap API host
    #[arg(long, env = "OPEN_WEATHER_API_HOST")]
    weather_api_host: Option<String>,

    /// OpenWeatherMap API key
    #[arg(long, env = "OPEN_WEATHER_API_KEY", hide_env_values = true)]
    weather_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GateConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    if let Some(host) = args.weather_api_host {
        config.weather_api.api_host = host;
    }
    if let Some(key) = args.weather_api_key {
        config.weather_api.api_key = key;
    }
    config.validate()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Weather Gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        listen_addr = %config.server.listen_addr,
        limit = config.rate_limiting.limit,
        window_seconds = config.rate_limiting.window_seconds,
        "Configuration loaded"
    );

    // Open the counter store and start expiring records
    let store = ratelimit::connect(&config.store_options(), Arc::new(SystemClock)).await?;
    let sweeper = store.spawn_sweeper(config.sweep_interval());

    let registry = KeyRegistry::new(&config.api_keys);
    if registry.is_empty() {
        warn!("No API keys configured, every weather request will be rejected");
    }
    let rate_limiter = Arc::new(RateLimiter::new(config.limit_config(), registry, store.clone()));
    info!("Rate limiter initialized");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let weather_client = OpenWeatherMapClient::new(
        http_client,
        &config.weather_api.api_host,
        &config.weather_api.api_key,
    )?;

    let state = AppState {
        limiter: rate_limiter,
        weather: WeatherModel::new(Arc::new(weather_client)),
        store: store.clone(),
    };

    let server = HttpServer::bind(config.server.listen_addr, state).await?;
    info!("Starting HTTP server on {}", server.local_addr()?);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    sweeper.abort();
    let _ = sweeper.await;
    store.close().await?;
    info!("Counter store closed");

    info!("Weather Gate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
