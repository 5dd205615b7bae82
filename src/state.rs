//! Composition root for the REST server: owns the vendor client, alert
//! store, polling/supervisor lifecycle, config, and the access log, the way
//! the teacher's `AppState` owns the Jira client and its own access log.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::filters::TypeFilterFactory;
use crate::polling::{IngestMode, PollingEngine};
use crate::renderer::{AlertRenderer, FallbackRenderer};
use crate::store::AlertStore;
use crate::supervisor::Supervisor;
use crate::vendor::VendorClient;

/// Single access log entry for HTTP requests.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: u64,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub client_ip: String,
}

/// Shared application state for the REST server.
pub struct AppState {
    /// Generated at startup, guards the `/dispatch` endpoint.
    pub auth_token: String,
    pub start_time: Instant,

    pub config: AppConfig,
    pub vendor: Arc<VendorClient>,
    pub store: Arc<AlertStore>,
    pub filters: Arc<TypeFilterFactory>,
    pub supervisor: Arc<Supervisor>,
    pub dispatcher: Dispatcher,

    /// Whether both vendor credentials were supplied at startup; polling
    /// refuses to start without them, per the documented configuration-error
    /// behavior (missing credentials must not silently start a doomed loop).
    has_credentials: bool,

    access_log: RwLock<Vec<AccessLogEntry>>,
    log_counter: RwLock<u64>,
}

impl AppState {
    pub fn new(auth_token: String, config: AppConfig, client_id: String, client_secret: String) -> Arc<Self> {
        let has_credentials = !client_id.is_empty() && !client_secret.is_empty();
        let vendor = Arc::new(VendorClient::new(config.vendor.url.clone(), client_id.clone(), client_secret.clone()));
        let store = Arc::new(AlertStore::new(config.cache.max_items, config.cache.max_age_ms));
        let filters = Arc::new(TypeFilterFactory::new());

        let polling = Arc::new(PollingEngine::new(
            Arc::clone(&vendor),
            Arc::clone(&store),
            Arc::clone(&filters),
            config.vendor.alert_types_to_watch.clone(),
            IngestMode::from_config_str(&config.vendor.ingest_mode),
            config.vendor.poll_interval_secs * 1000,
            client_id,
            client_secret,
        ));
        let supervisor = Arc::new(Supervisor::new(polling));

        let dispatcher = Dispatcher {
            vendor: Arc::clone(&vendor),
            store: Arc::clone(&store),
            filters: Arc::clone(&filters),
            renderer: Arc::new(FallbackRenderer) as Arc<dyn AlertRenderer>,
            watched_types: config.vendor.alert_types_to_watch.clone(),
            watched_lists: config.vendor.lists_to_watch.clone(),
            trial_mode: config.trial_mode,
        };

        Arc::new(Self {
            auth_token,
            start_time: Instant::now(),
            config,
            vendor,
            store,
            filters,
            supervisor,
            dispatcher,
            has_credentials,
            access_log: RwLock::new(Vec::new()),
            log_counter: RwLock::new(0),
        })
    }

    /// Verify Bearer token.
    pub fn verify_token(&self, token: &str) -> bool {
        self.auth_token == token
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Lazily bootstraps polling on the first request, but only once a valid
    /// vendor URL and non-empty credentials are configured; otherwise this is
    /// a configuration error and polling refuses to start (logged once per
    /// call rather than silently retrying a doomed token exchange forever).
    pub fn ensure_polling_started(&self) {
        if self.supervisor.is_polling_initialized() {
            return;
        }
        if !crate::config::is_valid_vendor_url(&self.config.vendor.url) {
            log::warn!("refusing to start polling: invalid or missing vendor url");
            return;
        }
        if !self.has_credentials {
            log::warn!("refusing to start polling: missing vendor client_id/client_secret");
            return;
        }
        self.supervisor.ensure_polling_started();
    }

    /// Add an access log entry.
    pub fn add_access_log(&self, method: String, path: String, status_code: u16, duration_ms: u64, client_ip: String) {
        let mut counter = self.log_counter.write();
        *counter += 1;
        let id = *counter;

        let entry = AccessLogEntry {
            id,
            timestamp: chrono::Local::now().to_rfc3339(),
            method,
            path,
            status_code,
            duration_ms,
            client_ip,
        };

        let mut log = self.access_log.write();
        log.push(entry);

        // Keep only the last 1000 entries to prevent memory bloat.
        let len = log.len();
        if len > 1000 {
            log.drain(0..len - 1000);
        }
    }

    /// Get all access log entries.
    pub fn get_access_logs(&self) -> Vec<AccessLogEntry> {
        self.access_log.read().clone()
    }

    /// Clear access log.
    pub fn clear_access_logs(&self) {
        self.access_log.write().clear();
    }
}
