use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::polling::{DEFAULT_LISTS_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
use crate::store::{DEFAULT_CACHE_MAX_AGE_MS, DEFAULT_CACHE_MAX_ITEMS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Process-wide trial-mode flag: suppresses alert bodies in lookup
    /// responses while preserving counts. Not a per-request input — set once
    /// at startup from config or the `TRIAL_MODE` environment variable.
    #[serde(default)]
    pub trial_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    /// Vendor base URL; must not carry a trailing slash.
    #[serde(default)]
    pub url: String,
    /// Poll period in seconds; floored at 30 on load.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub lists_to_watch: Vec<String>,
    #[serde(default = "default_alert_types")]
    pub alert_types_to_watch: Vec<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// `"standard"` (token/cursor pagination) or `"bulk"` (HMAC/ZIP feed).
    /// The two modes are mutually exclusive per process.
    #[serde(default = "default_ingest_mode")]
    pub ingest_mode: String,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            lists_to_watch: Vec::new(),
            alert_types_to_watch: default_alert_types(),
            timezone: None,
            ingest_mode: default_ingest_mode(),
        }
    }
}

fn default_ingest_mode() -> String {
    "standard".to_string()
}

fn default_poll_interval_secs() -> u64 {
    MIN_POLL_INTERVAL_MS / 1000
}

fn default_alert_types() -> Vec<String> {
    vec!["flash".to_string(), "urgent".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_items")]
    pub max_items: usize,
    #[serde(default = "default_cache_max_age_ms")]
    pub max_age_ms: i64,
    #[serde(default = "default_lists_poll_interval_ms")]
    pub lists_poll_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: default_cache_max_items(),
            max_age_ms: default_cache_max_age_ms(),
            lists_poll_interval_ms: default_lists_poll_interval_ms(),
        }
    }
}

fn default_cache_max_items() -> usize {
    DEFAULT_CACHE_MAX_ITEMS
}

fn default_cache_max_age_ms() -> i64 {
    DEFAULT_CACHE_MAX_AGE_MS
}

fn default_lists_poll_interval_ms() -> u64 {
    DEFAULT_LISTS_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    // "DEBUG", "INFO", "WARN", "ERROR"
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_to_console")]
    pub log_to_console: bool,
}

fn default_log_to_console() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), log_to_console: true }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vendor: VendorConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            trial_mode: false,
        }
    }
}

/// A vendor URL is valid when non-empty, free of a trailing slash, and
/// actually parses as a URL.
pub fn is_valid_vendor_url(url: &str) -> bool {
    !url.is_empty() && !url.ends_with('/') && reqwest::Url::parse(url).is_ok()
}

/// Credentials loaded from the environment, never persisted to the TOML file.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "vendor-feed", "alert-ingest-core") {
        let config_dir = proj_dirs.config_dir().to_path_buf();
        fs::create_dir_all(&config_dir).ok();
        config_dir
    } else {
        PathBuf::from(".")
    }
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Get the logs directory path
pub fn get_logs_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "vendor-feed", "alert-ingest-core") {
        let logs_dir = proj_dirs.data_dir().join("logs");
        fs::create_dir_all(&logs_dir).ok();
        logs_dir
    } else {
        let logs_dir = std::env::temp_dir().join("alert_ingest_core_logs");
        fs::create_dir_all(&logs_dir).ok();
        logs_dir
    }
}

/// Generate a timestamped log file path for this session
pub fn get_log_file_path() -> PathBuf {
    let logs_dir = get_logs_dir();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    logs_dir.join(format!("alert_ingest_core_{}.log", timestamp))
}

/// Load configuration from file, or create default if not exists. The poll
/// interval is floored at the minimum regardless of what's on disk, and
/// `TRIAL_MODE` in the environment overrides whatever's on disk.
pub fn load_config() -> AppConfig {
    dotenvy::dotenv().ok();
    let config_path = get_config_path();

    let mut config = if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("failed to parse config at {config_path:?}, using defaults: {e}");
                    write_default_config(&config_path)
                }
            },
            Err(_) => write_default_config(&config_path),
        }
    } else {
        write_default_config(&config_path)
    };

    config.vendor.poll_interval_secs = config.vendor.poll_interval_secs.max(MIN_POLL_INTERVAL_MS / 1000);
    if let Ok(v) = std::env::var("TRIAL_MODE") {
        config.trial_mode = v.eq_ignore_ascii_case("true") || v == "1";
    }
    config
}

fn write_default_config(config_path: &PathBuf) -> AppConfig {
    let default_config = AppConfig::default();
    if let Ok(toml_content) = toml::to_string_pretty(&default_config) {
        fs::write(config_path, toml_content).ok();
    }
    default_config
}

/// Overlays `clientId`/`clientSecret` from the environment (via `.env` or
/// the real environment), matching the teacher's `dotenvy` handling.
pub fn load_credentials() -> Option<Credentials> {
    dotenvy::dotenv().ok();
    let client_id = std::env::var("VENDOR_CLIENT_ID").ok()?;
    let client_secret = std::env::var("VENDOR_CLIENT_SECRET").ok()?;
    Some(Credentials { client_id, client_secret })
}
