use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Market data endpoint returning `{ "markets": [...] }`.
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Per-request timeout.
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Total stake spread across the "No" leg set, in USD.
    #[serde(default = "default_stake")]
    pub stake: f64,
    /// Fee taken from winnings (0.10 = 10%).
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Quotes below this are stale placeholders and excluded from the risk sum.
    #[serde(default = "default_min_qualifying_price")]
    pub min_qualifying_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// ntfy topic URL - overridden by env NTFY_URL
    #[serde(default = "default_ntfy_url")]
    pub ntfy_url: String,
    /// Relative change in least profit required to re-alert (0.02 = 2%).
    #[serde(default = "default_min_percent_change")]
    pub min_percent_change: f64,
    /// Also run change detection on every background refresh, not just startup.
    #[serde(default)]
    pub on_refresh: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// File holding the previously alerted batch.
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served for any path not matched by the API routes.
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_feed_url() -> String {
    "https://www.predictit.org/api/marketdata/all/".to_string()
}
fn default_feed_timeout() -> u64 {
    10
}
fn default_stake() -> f64 {
    850.0
}
fn default_fee_rate() -> f64 {
    0.10
}
fn default_min_qualifying_price() -> f64 {
    0.01
}
fn default_refresh_interval() -> u64 {
    120
}
fn default_ntfy_url() -> String {
    "https://ntfy.sh/predictitjohn".to_string()
}
fn default_min_percent_change() -> f64 {
    0.02
}
fn default_store_path() -> String {
    "neg_risk.json".to_string()
}
fn default_true() -> bool {
    true
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            timeout_secs: default_feed_timeout(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            stake: default_stake(),
            fee_rate: default_fee_rate(),
            min_qualifying_price: default_min_qualifying_price(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            ntfy_url: default_ntfy_url(),
            min_percent_change: default_min_percent_change(),
            on_refresh: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            static_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides (no file needed).
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("NEGRISK_FEED_URL") {
            self.feed.url = url;
        }
        if let Ok(url) = std::env::var("NTFY_URL") {
            self.alerts.ntfy_url = url;
        }
        if let Ok(path) = std::env::var("NEGRISK_STORE_PATH") {
            self.store.path = path;
        }
        if let Ok(bind) = std::env::var("NEGRISK_BIND") {
            self.dashboard.bind = bind;
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.strategy.stake, 850.0);
        assert_eq!(config.strategy.fee_rate, 0.10);
        assert_eq!(config.alerts.min_percent_change, 0.02);
        assert_eq!(config.refresh_interval(), Duration::from_secs(120));
        assert!(!config.alerts.on_refresh);
        assert!(config.dashboard.enabled);
        assert_eq!(config.store.path, "neg_risk.json");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [strategy]
            stake = 500.0

            [alerts]
            on_refresh = true

            [dashboard]
            bind = "127.0.0.1:9000"
            static_dir = "static"
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy.stake, 500.0);
        assert_eq!(config.strategy.fee_rate, 0.10);
        assert!(config.alerts.on_refresh);
        assert_eq!(config.dashboard.bind, "127.0.0.1:9000");
        assert_eq!(config.dashboard.static_dir.as_deref(), Some("static"));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = Config::parse("[strategy\nstake = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
