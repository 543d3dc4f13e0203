//! Last-write-wins store for the most recent scan
//!
//! The periodic scan loop is the only writer; HTTP handlers are readers. A
//! reader receives an `Arc` snapshot, so iterating it never races with the
//! next `update`, and the write lock is only held for the pointer swap.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::device::ScanResult;

/// Shared cache of the latest `ScanResult`
#[derive(Debug, Default)]
pub struct ScanCache {
    current: RwLock<Arc<ScanResult>>,
}

impl ScanCache {
    /// Create a cache holding an empty result
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ScanResult::empty())),
        }
    }

    /// Replace the stored result as a whole
    pub async fn update(&self, result: ScanResult) {
        let next = Arc::new(result);
        let devices = next.len();
        *self.current.write().await = next;
        debug!(devices, "Scan cache updated");
    }

    /// Snapshot of the current result
    pub async fn read(&self) -> Arc<ScanResult> {
        self.current.read().await.clone()
    }
}
