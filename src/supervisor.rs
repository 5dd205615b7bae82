//! Process lifecycle (C6): logger installation, lazy polling bootstrap on
//! the first credentialed request, and shutdown.

use crate::polling::PollingEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Supervisor {
    polling: Arc<PollingEngine>,
    initialized: AtomicBool,
}

impl Supervisor {
    pub fn new(polling: Arc<PollingEngine>) -> Self {
        Self { polling, initialized: AtomicBool::new(false) }
    }

    /// Installs the logger and logs a startup marker. Does not start
    /// polling — that happens lazily on the first credentialed request.
    pub fn startup(&self) {
        log::info!("alert-ingest-core supervisor starting up");
    }

    /// Idempotent: the first request that carries credentials triggers
    /// this, subsequent calls are no-ops until `shutdown()` resets the flag.
    pub fn ensure_polling_started(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("bootstrapping polling engine on first credentialed request");
        self.polling.start();
    }

    pub fn is_polling_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Cancels both polling timers and marks polling as not initialized;
    /// subsequent requests re-bootstrap.
    pub fn shutdown(&self) {
        log::info!("supervisor shutting down");
        self.polling.shutdown();
        self.initialized.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::TypeFilterFactory;
    use crate::polling::IngestMode;
    use crate::store::AlertStore;
    use crate::vendor::VendorClient;

    fn supervisor() -> Supervisor {
        let vendor = Arc::new(VendorClient::new("u".into(), "i".into(), "s".into()));
        let store = Arc::new(AlertStore::with_defaults());
        let filters = Arc::new(TypeFilterFactory::new());
        let polling = Arc::new(PollingEngine::new(
            vendor,
            store,
            filters,
            vec![],
            IngestMode::Standard,
            60_000,
            "i".to_string(),
            "s".to_string(),
        ));
        Supervisor::new(polling)
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let s = supervisor();
        assert!(!s.is_polling_initialized());
        s.ensure_polling_started();
        assert!(s.is_polling_initialized());
        s.ensure_polling_started();
        assert!(s.is_polling_initialized());
    }

    #[test]
    fn shutdown_resets_initialized_flag() {
        let s = supervisor();
        s.ensure_polling_started();
        s.shutdown();
        assert!(!s.is_polling_initialized());
    }
}
