//! Discovery scanner that combines interface detection, the probe sweep and
//! the neighbor-table dump

use lanagent_core::{dedup_by_ip, Device, ScanCache, ScanResult};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::arp::{platform_source, read_neighbor_table, NeighborTableSource};
use crate::error::DiscoveryError;
use crate::interface::{detect_interface, LocalInterface};
use crate::probe::{NeighborProbe, PROBE_CONCURRENCY, PROBE_TIMEOUT_MS};
use crate::schedule::run_periodic;

/// Default cap on swept addresses, enough for a /24
pub const MAX_SWEEP_HOSTS: usize = 254;

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between scan starts
    pub interval_secs: u64,
    /// Scan this interface instead of the first eligible one
    pub interface: Option<String>,
    /// Per-host echo timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Maximum number of pings in flight
    pub probe_concurrency: usize,
    /// Neighbor-table command timeout in seconds
    pub dump_timeout_secs: u64,
    /// Upper bound on swept addresses, lowest first
    pub max_hosts: Option<usize>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            interface: None,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            probe_concurrency: PROBE_CONCURRENCY,
            dump_timeout_secs: 5,
            max_hosts: Some(MAX_SWEEP_HOSTS),
        }
    }
}

impl ScannerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn dump_timeout(&self) -> Duration {
        Duration::from_secs(self.dump_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// ARP scanner
///
/// Holds only configuration; the interface and subnet are re-detected on
/// every scan so roaming between networks is picked up.
pub struct ArpScanner {
    config: ScannerConfig,
    probe: NeighborProbe,
    source: Result<Arc<dyn NeighborTableSource>, String>,
}

impl ArpScanner {
    /// Scanner using the neighbor table of the running OS
    ///
    /// An unsupported OS is not an error here; every scan reports it instead.
    pub fn new(config: ScannerConfig) -> Self {
        let source = platform_source()
            .map(Arc::<dyn NeighborTableSource>::from)
            .map_err(|_| std::env::consts::OS.to_string());
        Self::build(config, source)
    }

    /// Scanner reading neighbors from a specific source
    pub fn with_source(config: ScannerConfig, source: Arc<dyn NeighborTableSource>) -> Self {
        Self::build(config, Ok(source))
    }

    fn build(config: ScannerConfig, source: Result<Arc<dyn NeighborTableSource>, String>) -> Self {
        let probe = NeighborProbe::new(config.probe_timeout(), config.probe_concurrency);
        Self {
            config,
            probe,
            source,
        }
    }

    /// Run a single scan on the detected interface
    pub async fn scan(&self) -> Result<ScanResult, DiscoveryError> {
        let iface = detect_interface(self.config.interface.as_deref())?;
        self.scan_on(&iface).await
    }

    /// Run a single scan on a known interface
    pub async fn scan_on(&self, iface: &LocalInterface) -> Result<ScanResult, DiscoveryError> {
        let source = self
            .source
            .as_ref()
            .map_err(|os| DiscoveryError::UnsupportedPlatform { os: os.clone() })?;

        let subnet = iface.subnet();
        let hosts = sweep_targets(iface, self.config.max_hosts);

        info!(
            interface = %iface.name,
            subnet = %subnet,
            hosts = hosts.len(),
            "Starting discovery scan"
        );
        if (hosts.len() as u64) < subnet.host_count().saturating_sub(1) {
            warn!(
                subnet = %subnet,
                subnet_hosts = subnet.host_count(),
                swept = hosts.len(),
                "Subnet larger than max_hosts, sweeping lowest addresses only"
            );
        }

        // Step 1: warm the neighbor table
        self.probe.probe(&hosts).await;

        // Step 2: read it back
        let neighbors = read_neighbor_table(source.as_ref(), self.config.dump_timeout()).await?;

        // Step 3: normalize and add ourselves
        let devices = assemble(neighbors, iface);
        debug!(devices = devices.len(), "Scan assembled");

        Ok(ScanResult::new(devices))
    }

    /// Scan now and every configured interval until `shutdown` fires
    pub async fn run(&self, cache: Arc<ScanCache>, shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.config.interval_secs, "Scan scheduler started");
        run_periodic(move || self.scan(), cache, self.config.interval(), shutdown).await;
    }
}

/// Addresses to probe: the subnet minus our own address, optionally capped
fn sweep_targets(iface: &LocalInterface, max_hosts: Option<usize>) -> Vec<Ipv4Addr> {
    let hosts = iface.subnet().host_addresses().filter(|&ip| ip != iface.ip);
    match max_hosts {
        Some(limit) => hosts.take(limit).collect(),
        None => hosts.collect(),
    }
}

/// De-duplicate the parsed neighbors and append the local machine if absent
fn assemble(neighbors: Vec<Device>, iface: &LocalInterface) -> Vec<Device> {
    let mut devices = dedup_by_ip(neighbors);
    if !devices.iter().any(|d| d.ip == iface.ip) {
        devices.push(Device::local(iface.ip, iface.mac.as_deref()));
    }
    devices
}
