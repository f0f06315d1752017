use chrono::{DateTime, Duration, NaiveTime, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use validator::Validate;

use crate::entities::outbound_notification::Channel;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Time-of-day range in which a channel may be used, half-open `[start, end)`.
/// Windows may wrap midnight (e.g. 22:00–06:00).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct SendWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SendWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// A window with `start == end` permits sending at any time.
    pub fn is_always_open(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if self.is_always_open() {
            return true;
        }
        let t = at.time();
        if self.start < self.end {
            t >= self.start && t < self.end
        } else {
            // wraps midnight
            t >= self.start || t < self.end
        }
    }

    /// The next instant at or after `now` at which the window opens.
    /// Callers only use this when `contains(now)` is false.
    pub fn next_open(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.contains(now) {
            return now;
        }
        let today_start = now
            .date_naive()
            .and_time(self.start)
            .and_utc();
        if today_start > now {
            today_start
        } else {
            today_start + Duration::days(1)
        }
    }
}

impl Default for SendWindow {
    fn default() -> Self {
        // midnight-to-midnight, i.e. always open
        Self::new(NaiveTime::MIN, NaiveTime::MIN)
    }
}

/// Configuration for the notification dispatcher, injected at construction
/// time so tests can run with deterministic windows and tiers.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct DispatcherConfig {
    /// Permitted send window per channel; channels absent from the map are
    /// treated as always open
    #[serde(default)]
    pub send_windows: HashMap<String, SendWindow>,

    /// Fixed backoff tiers in seconds; attempt k waits `tiers[min(k-1, len-1)]`
    #[serde(default = "default_backoff_tiers")]
    #[validate(length(min = 1))]
    pub backoff_tiers_secs: Vec<u64>,

    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: i32,

    /// Client-side cap on a single delivery attempt
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

fn default_backoff_tiers() -> Vec<u64> {
    vec![60, 300, 900]
}

fn default_max_attempts() -> i32 {
    3
}

fn default_delivery_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    15
}

fn default_batch_size() -> u64 {
    50
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            send_windows: HashMap::new(),
            backoff_tiers_secs: default_backoff_tiers(),
            max_attempts: default_max_attempts(),
            delivery_timeout_secs: default_delivery_timeout(),
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
        }
    }
}

impl DispatcherConfig {
    pub fn window_for(&self, channel: Channel) -> SendWindow {
        self.send_windows
            .get(channel.as_str())
            .copied()
            .unwrap_or_default()
    }

    /// Backoff delay after the given attempt number (1-based). Attempts past
    /// the last tier reuse it.
    pub fn backoff_after(&self, attempt: i32) -> Duration {
        if self.backoff_tiers_secs.is_empty() {
            return Duration::seconds(default_backoff_tiers()[0] as i64);
        }
        let idx = (attempt.max(1) as usize - 1).min(self.backoff_tiers_secs.len() - 1);
        Duration::seconds(self.backoff_tiers_secs[idx] as i64)
    }
}

/// Configuration for the stock monitor and expiry sweep.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct StockMonitorConfig {
    #[serde(default = "default_monitor_interval")]
    pub scan_interval_secs: u64,

    /// Validity of generated quotation requests, in days
    #[serde(default = "default_request_validity")]
    #[validate(range(min = 1, max = 90))]
    pub request_validity_days: i64,

    #[serde(default = "default_sweep_interval")]
    pub expiry_sweep_interval_secs: u64,
}

fn default_monitor_interval() -> u64 {
    3600
}

fn default_request_validity() -> i64 {
    7
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for StockMonitorConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_monitor_interval(),
            request_validity_days: default_request_validity(),
            expiry_sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Application configuration, loaded from `config/` files layered with
/// `APP_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run migrations on startup; tests always do
    #[serde(default)]
    pub auto_migrate: bool,

    /// Base URL for supplier magic links, e.g. "https://shop.example/portal"
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,

    /// Secret for the magic-link token service
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Staff address for internal notifications
    #[serde(default)]
    pub staff_email: Option<String>,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub stock_monitor: StockMonitorConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_portal_base_url() -> String {
    "http://localhost:8080/portal".to_string()
}

fn default_token_secret() -> String {
    // development-only default; deployments override via APP_TOKEN_SECRET
    "dev_token_secret_change_me_in_production".to_string()
}

impl AppConfig {
    /// Minimal constructor used by tests and embedded setups.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            auto_migrate: false,
            portal_base_url: default_portal_base_url(),
            token_secret: default_token_secret(),
            staff_email: None,
            dispatcher: DispatcherConfig::default(),
            stock_monitor: StockMonitorConfig::default(),
        }
    }

    /// Loads layered configuration: `config/default`, then
    /// `config/{environment}`, then `APP_`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();

        let default_path = Path::new(CONFIG_DIR).join("default");
        builder = builder.add_source(File::from(default_path).required(false));

        let env_path = Path::new(CONFIG_DIR).join(&environment);
        builder = builder.add_source(File::from(env_path).required(false));

        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}
