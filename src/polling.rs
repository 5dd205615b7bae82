//! The periodic polling engine (C3): cursor-based alert pagination and a
//! separate lists-catalog refresh loop. Task-loop shape follows the
//! teacher's background-thread pattern in `main.rs::start_rest_server`
//! (spawn + sleep), generalized to two independent cancellable loops.

use crate::filters::TypeFilterFactory;
use crate::store::AlertStore;
use crate::vendor::VendorClient;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGES_PER_POLL: u32 = 50;
pub const DEFAULT_LISTS_POLL_INTERVAL_MS: u64 = 5 * 60 * 1000;
pub const MIN_POLL_INTERVAL_MS: u64 = 30_000;
const INTER_PAGE_PACING_MS: u64 = 300;

/// Which vendor protocol the polling engine speaks. The two are mutually
/// exclusive per process: starting one does not start the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    Standard,
    Bulk,
}

impl IngestMode {
    /// Parses the `vendor.ingest_mode` config value, falling back to
    /// `Standard` for anything unrecognized.
    pub fn from_config_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bulk" => IngestMode::Bulk,
            _ => IngestMode::Standard,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PollingState {
    pub last_poll_time: Option<i64>,
    pub last_cursor: Option<String>,
    pub alert_count: u64,
    pub total_alerts_processed: u64,
}

pub struct PollingEngine {
    vendor: Arc<VendorClient>,
    store: Arc<AlertStore>,
    filters: Arc<TypeFilterFactory>,
    watched_types: Vec<String>,
    mode: IngestMode,
    poll_interval_ms: u64,
    client_id: String,
    client_secret: String,
    state: Mutex<PollingState>,
    running: AtomicBool,
    alerts_handle: Mutex<Option<JoinHandle<()>>>,
    lists_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vendor: Arc<VendorClient>,
        store: Arc<AlertStore>,
        filters: Arc<TypeFilterFactory>,
        watched_types: Vec<String>,
        mode: IngestMode,
        poll_interval_ms: u64,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            vendor,
            store,
            filters,
            watched_types,
            mode,
            poll_interval_ms: poll_interval_ms.max(MIN_POLL_INTERVAL_MS),
            client_id,
            client_secret,
            state: Mutex::new(PollingState::default()),
            running: AtomicBool::new(false),
            alerts_handle: Mutex::new(None),
            lists_handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollingState {
        self.state.lock().clone()
    }

    /// Idempotent bootstrap: a second call while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("polling engine already running, ignoring start()");
            return;
        }
        log::info!("starting polling engine in {:?} mode", self.mode);

        let alerts_engine = Arc::clone(self);
        *self.alerts_handle.lock() = Some(tokio::spawn(async move {
            alerts_engine.run_alerts_loop().await;
        }));

        let lists_engine = Arc::clone(self);
        *self.lists_handle.lock() = Some(tokio::spawn(async move {
            lists_engine.run_lists_loop().await;
        }));
    }

    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("shutting down polling engine");
        if let Some(handle) = self.alerts_handle.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.lists_handle.lock().take() {
            handle.abort();
        }
    }

    async fn run_alerts_loop(&self) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            match self.mode {
                IngestMode::Standard => self.poll_once_standard().await,
                IngestMode::Bulk => self.poll_once_bulk().await,
            }
            tokio::time::sleep(Duration::from_millis(self.poll_interval_ms)).await;
        }
    }

    async fn poll_once_standard(&self) {
        let filter = self.filters.get(&self.watched_types);
        let mut cursor = self.state.lock().last_cursor.clone();
        let mut pages = 0u32;
        let mut processed = 0u64;

        loop {
            if pages >= MAX_PAGES_PER_POLL {
                log::warn!("poll reached max pages ({MAX_PAGES_PER_POLL}), resuming next cycle");
                break;
            }
            let page = match self.vendor.fetch_alerts_page(cursor.as_deref(), DEFAULT_PAGE_SIZE).await {
                Ok(page) => page,
                Err(crate::error::VendorError::RateLimited { .. }) => {
                    log::warn!("alerts poll rate-limited, preserving cursor and aborting this cycle");
                    return;
                }
                Err(e) => {
                    log::error!("alerts poll failed, preserving cursor: {e}");
                    return;
                }
            };

            let page_len = page.alerts.len();
            let next_cursor = page.next_cursor();

            let now_ms = chrono::Utc::now().timestamp_millis();
            for alert in page.alerts {
                if self.store.add(alert, &|t| filter.matches(t), now_ms) {
                    processed += 1;
                }
            }
            pages += 1;

            match next_cursor {
                Some(next) if page_len as u32 >= DEFAULT_PAGE_SIZE => {
                    cursor = Some(next);
                    tokio::time::sleep(Duration::from_millis(INTER_PAGE_PACING_MS)).await;
                }
                _ => break,
            }
        }

        let mut state = self.state.lock();
        state.last_poll_time = Some(chrono::Utc::now().timestamp_millis());
        state.last_cursor = cursor;
        state.alert_count = processed;
        state.total_alerts_processed += processed;
    }

    async fn poll_once_bulk(&self) {
        let filter = self.filters.get(&self.watched_types);
        let since = self.state.lock().last_cursor.as_deref().and_then(|c| c.parse::<i64>().ok());

        let zip_bytes = match self.vendor.fetch_bulk_zip(&self.client_id, &self.client_secret, since).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("bulk feed fetch failed, preserving watermark: {e}");
                return;
            }
        };

        let alerts = match crate::vendor::hmac::extract_alerts(&zip_bytes) {
            Ok(alerts) => alerts,
            Err(e) => {
                log::error!("bulk archive extraction failed, preserving watermark: {e}");
                return;
            }
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut processed = 0u64;
        for alert in alerts {
            if self.store.add(alert, &|t| filter.matches(t), now_ms) {
                processed += 1;
            }
        }

        let next_watermark = match crate::vendor::hmac::latest_watermark(&zip_bytes) {
            Ok(w) => w,
            Err(e) => {
                log::warn!("could not read bulk watermark, keeping previous: {e}");
                None
            }
        };

        let mut state = self.state.lock();
        state.last_poll_time = Some(now_ms);
        if let Some(w) = next_watermark {
            state.last_cursor = Some(w.to_string());
        }
        state.alert_count = processed;
        state.total_alerts_processed += processed;
    }

    async fn run_lists_loop(&self) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            match self.vendor.fetch_lists().await {
                Ok(lists) => self.store.set_lists(lists),
                Err(e) => {
                    // Never clear the catalog to empty on a failed refresh.
                    log::error!("lists refresh failed, keeping previous catalog: {e}");
                }
            }
            tokio::time::sleep(Duration::from_millis(DEFAULT_LISTS_POLL_INTERVAL_MS)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Arc<PollingEngine> {
        let vendor = Arc::new(VendorClient::new(
            "https://vendor.example".to_string(),
            "id".to_string(),
            "secret".to_string(),
        ));
        let store = Arc::new(AlertStore::with_defaults());
        let filters = Arc::new(TypeFilterFactory::new());
        Arc::new(PollingEngine::new(
            vendor,
            store,
            filters,
            vec!["flash".to_string()],
            IngestMode::Standard,
            1_000,
            "id".to_string(),
            "secret".to_string(),
        ))
    }

    #[test]
    fn poll_interval_is_floored_at_minimum() {
        let vendor = Arc::new(VendorClient::new("u".into(), "i".into(), "s".into()));
        let store = Arc::new(AlertStore::with_defaults());
        let filters = Arc::new(TypeFilterFactory::new());
        let e = PollingEngine::new(
            vendor,
            store,
            filters,
            vec![],
            IngestMode::Standard,
            10,
            "i".to_string(),
            "s".to_string(),
        );
        assert_eq!(e.poll_interval_ms, MIN_POLL_INTERVAL_MS);
    }

    #[test]
    fn bulk_mode_parses_from_config_string() {
        assert_eq!(IngestMode::from_config_str("bulk"), IngestMode::Bulk);
        assert_eq!(IngestMode::from_config_str("BULK"), IngestMode::Bulk);
        assert_eq!(IngestMode::from_config_str("standard"), IngestMode::Standard);
        assert_eq!(IngestMode::from_config_str("anything-else"), IngestMode::Standard);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let e = engine();
        e.start();
        assert!(e.running.load(Ordering::SeqCst));
        e.start();
        assert!(e.alerts_handle.lock().is_some());
        e.shutdown();
        assert!(!e.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_before_start_is_a_no_op() {
        let e = engine();
        e.shutdown();
        assert!(!e.running.load(Ordering::SeqCst));
    }
}
