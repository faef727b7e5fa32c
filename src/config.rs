//! Configuration management for the weather gate.
//!
//! Settings come from an optional YAML file overlaid with environment
//! variables prefixed `WEATHER_GATE_`, using `__` between nested keys, e.g.
//! `WEATHER_GATE_RATE_LIMITING__LIMIT=10`.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, WeatherGateError};
use crate::ratelimit::{LimitConfig, StoreOptions, DEFAULT_LIMIT, DEFAULT_WINDOW_SECS};

/// Prefix of environment variables read by [`GateConfig::load`].
pub const ENV_PREFIX: &str = "WEATHER_GATE";

/// Main configuration for the weather gate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Upstream weather API configuration
    #[serde(default)]
    pub weather_api: WeatherApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Registered caller API keys
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Calls allowed per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Counter store connection url (`memory://` or `file://<path>`)
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Attempts made to open the counter store
    #[serde(default = "default_store_reconnect_tries")]
    pub store_reconnect_tries: u32,

    /// Pause between counter store open attempts, in milliseconds
    #[serde(default = "default_store_reconnect_interval_ms")]
    pub store_reconnect_interval_ms: u64,

    /// How often expired usage records are swept, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_seconds: default_window_seconds(),
            store_url: default_store_url(),
            store_reconnect_tries: default_store_reconnect_tries(),
            store_reconnect_interval_ms: default_store_reconnect_interval_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_store_url() -> String {
    "memory://".to_string()
}

fn default_store_reconnect_tries() -> u32 {
    30
}

fn default_store_reconnect_interval_ms() -> u64 {
    1000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Upstream weather API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherApiConfig {
    /// Base url of the OpenWeatherMap API
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// OpenWeatherMap API key
    #[serde(default)]
    pub api_key: String,
}

impl Default for WeatherApiConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_key: String::new(),
        }
    }
}

fn default_api_host() -> String {
    "https://api.openweathermap.org/".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter, e.g. `info` or `weather_gate=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GateConfig {
    /// Load configuration from an optional file and the process environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_env(path, env_source())
    }

    /// Load configuration from an optional file and the given environment source.
    pub fn load_with_env(path: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let config: GateConfig = builder.add_source(env).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Check the settings the service cannot run without.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if rl.limit == 0 {
            return Err(WeatherGateError::Config(
                "rate_limiting.limit must be positive".to_string(),
            ));
        }
        if rl.window_seconds == 0 {
            return Err(WeatherGateError::Config(
                "rate_limiting.window_seconds must be positive".to_string(),
            ));
        }
        if rl.store_reconnect_tries == 0 {
            return Err(WeatherGateError::Config(
                "rate_limiting.store_reconnect_tries must be positive".to_string(),
            ));
        }
        if rl.sweep_interval_secs == 0 {
            return Err(WeatherGateError::Config(
                "rate_limiting.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.weather_api.api_host.trim().is_empty() || self.weather_api.api_key.trim().is_empty() {
            return Err(WeatherGateError::Config(
                "weather_api.api_host and weather_api.api_key are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Rate limiter settings.
    pub fn limit_config(&self) -> LimitConfig {
        LimitConfig {
            limit: self.rate_limiting.limit,
            window_secs: self.rate_limiting.window_seconds,
        }
    }

    /// Counter store settings.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            url: self.rate_limiting.store_url.clone(),
            ttl_secs: self.rate_limiting.window_seconds,
            reconnect_tries: self.rate_limiting.store_reconnect_tries,
            reconnect_interval: Duration::from_millis(self.rate_limiting.store_reconnect_interval_ms),
        }
    }

    /// Interval of the expired record sweeper.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limiting.sweep_interval_secs)
    }
}

/// Environment source for `WEATHER_GATE_*` variables.
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("api_keys")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_map(pairs: &[(&str, &str)]) -> Environment {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();
        env_source().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();

        assert_eq!(config.server.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.rate_limiting.limit, 5);
        assert_eq!(config.rate_limiting.window_seconds, 3600);
        assert_eq!(config.rate_limiting.store_url, "memory://");
        assert_eq!(config.weather_api.api_host, "https://api.openweathermap.org/");
        assert_eq!(config.logging.level, "info");
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
server:
  listen_addr: "127.0.0.1:9000"
rate_limiting:
  limit: 1
  window_seconds: 60
  store_url: "file:///tmp/usage.json"
weather_api:
  api_key: A_VALID_API_KEY
logging:
  level: debug
api_keys:
  - 27f01d68e204427fbeb7c0dff06c7e94
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.limit_config(), LimitConfig { limit: 1, window_secs: 60 });
        assert_eq!(config.store_options().url, "file:///tmp/usage.json");
        assert_eq!(config.store_options().ttl_secs, 60);
        assert_eq!(config.rate_limiting.store_reconnect_tries, 30);
        assert_eq!(config.weather_api.api_key, "A_VALID_API_KEY");
        assert_eq!(config.api_keys, vec!["27f01d68e204427fbeb7c0dff06c7e94"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "rate_limiting:\n  limit: 3\nweather_api:\n  api_key: from_file").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let env = env_map(&[
            ("WEATHER_GATE_RATE_LIMITING__LIMIT", "7"),
            ("WEATHER_GATE_RATE_LIMITING__STORE_RECONNECT_INTERVAL_MS", "250"),
            ("WEATHER_GATE_API_KEYS", "abc,def"),
        ]);
        let config = GateConfig::load_with_env(Some(&path), env).unwrap();

        assert_eq!(config.rate_limiting.limit, 7);
        assert_eq!(config.store_options().reconnect_interval, Duration::from_millis(250));
        assert_eq!(config.weather_api.api_key, "from_file");
        assert_eq!(config.api_keys, vec!["abc", "def"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = GateConfig::load_with_env(Some("/nonexistent/weather-gate"), env_map(&[]));
        assert!(matches!(result, Err(WeatherGateError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GateConfig::default();
        config.weather_api.api_key = "key".to_string();
        assert!(config.validate().is_ok());

        let mut zero_limit = config.clone();
        zero_limit.rate_limiting.limit = 0;
        assert!(zero_limit.validate().is_err());

        let mut zero_window = config.clone();
        zero_window.rate_limiting.window_seconds = 0;
        assert!(zero_window.validate().is_err());

        let mut zero_tries = config.clone();
        zero_tries.rate_limiting.store_reconnect_tries = 0;
        assert!(zero_tries.validate().is_err());

        let mut no_key = config;
        no_key.weather_api.api_key = String::new();
        assert!(no_key.validate().is_err());
    }
}
