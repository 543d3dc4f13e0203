//! Application state management

use lanagent_core::{ScanCache, ScanResult};
use lanagent_discovery::ArpScanner;
use std::sync::Arc;

use crate::config::Config;

/// Shared application state
///
/// The cache is the only mutable state shared between the scan loop and
/// the HTTP handlers.
pub struct AppState {
    /// Neighbor scanner
    pub scanner: Arc<ArpScanner>,
    /// Latest scan result
    pub cache: Arc<ScanCache>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Arc<Self> {
        let scanner = Arc::new(ArpScanner::new(config.to_scanner_config()));
        Self::with_scanner(config, scanner)
    }

    pub fn with_scanner(config: Config, scanner: Arc<ArpScanner>) -> Arc<Self> {
        Arc::new(Self {
            scanner,
            cache: Arc::new(ScanCache::new()),
            config,
        })
    }

    /// Snapshot of the latest scan
    pub async fn snapshot(&self) -> Arc<ScanResult> {
        self.cache.read().await
    }
}
