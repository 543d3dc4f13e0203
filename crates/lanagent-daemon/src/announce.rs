//! Local-network service announcement
//!
//! The daemon only needs "advertise this port under this name until
//! shutdown"; the mDNS protocol itself is handled by `mdns-sd`.

use anyhow::Result;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AnnounceConfig;

/// TXT record version advertised alongside the API path
pub const ANNOUNCE_VERSION: &str = "1.0";

/// Path clients should fetch
pub const SCAN_PATH: &str = "/scan";

/// Everything needed to advertise the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub service_type: String,
    pub instance_name: String,
    pub host_name: String,
    /// Address to advertise; `None` lets the responder pick interface addresses
    pub ip: Option<Ipv4Addr>,
    pub port: u16,
    pub properties: HashMap<String, String>,
}

impl Announcement {
    pub fn new(config: &AnnounceConfig, hostname: &str, ip: Option<Ipv4Addr>, port: u16) -> Self {
        let short = short_hostname(hostname);
        let properties = HashMap::from([
            ("version".to_string(), ANNOUNCE_VERSION.to_string()),
            ("path".to_string(), SCAN_PATH.to_string()),
            ("description".to_string(), config.description.clone()),
            ("hostname".to_string(), short.clone()),
        ]);

        Self {
            service_type: config.service_type.clone(),
            instance_name: format!("lanagent-{}-{}", short, port),
            host_name: format!("{}.local.", short),
            ip,
            port,
            properties,
        }
    }
}

/// First label of a host name
fn short_hostname(hostname: &str) -> String {
    match hostname.split('.').next() {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => "lanagent".to_string(),
    }
}

/// This machine's host name
pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read host name");
            "lanagent".to_string()
        })
}

/// Service announcement capability
pub trait Announcer: Send + Sync {
    /// Start advertising
    fn announce(&self, announcement: &Announcement) -> Result<()>;

    /// Stop advertising whatever `announce` registered
    fn withdraw(&self) -> Result<()>;
}

/// Announcer used when advertising is disabled
#[derive(Debug, Default)]
pub struct NoopAnnouncer;

impl Announcer for NoopAnnouncer {
    fn announce(&self, announcement: &Announcement) -> Result<()> {
        debug!(instance = %announcement.instance_name, "Service announcement disabled");
        Ok(())
    }

    fn withdraw(&self) -> Result<()> {
        Ok(())
    }
}

/// Multicast DNS announcer
pub struct MdnsAnnouncer {
    daemon: ServiceDaemon,
    registered: Mutex<Option<String>>,
}

impl MdnsAnnouncer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            registered: Mutex::new(None),
        })
    }
}

impl Announcer for MdnsAnnouncer {
    fn announce(&self, announcement: &Announcement) -> Result<()> {
        let ip = announcement.ip.map(|ip| ip.to_string()).unwrap_or_default();
        let mut info = ServiceInfo::new(
            &announcement.service_type,
            &announcement.instance_name,
            &announcement.host_name,
            ip.as_str(),
            announcement.port,
            announcement.properties.clone(),
        )?;
        if announcement.ip.is_none() {
            info = info.enable_addr_auto();
        }

        let fullname = info.get_fullname().to_string();
        self.daemon.register(info)?;
        *self.registered.lock().unwrap_or_else(PoisonError::into_inner) = Some(fullname.clone());

        info!(
            service = %fullname,
            service_type = %announcement.service_type,
            ip = ?announcement.ip,
            port = announcement.port,
            "Service registered via mDNS"
        );
        Ok(())
    }

    fn withdraw(&self) -> Result<()> {
        let registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(fullname) = registered {
            let status = self.daemon.unregister(&fullname)?;
            if let Err(e) = status.recv_timeout(Duration::from_secs(1)) {
                debug!(service = %fullname, error = %e, "No unregister confirmation");
            }
            info!(service = %fullname, "Service unregistered");
        }
        if let Err(e) = self.daemon.shutdown() {
            debug!(error = %e, "mDNS daemon already stopped");
        }
        Ok(())
    }
}

/// Announcer for the configured mode
///
/// Failure to start mDNS is not fatal; the API keeps working unadvertised.
pub fn announcer(config: &AnnounceConfig) -> Box<dyn Announcer> {
    if !config.enabled {
        return Box::new(NoopAnnouncer);
    }
    match MdnsAnnouncer::new() {
        Ok(mdns) => Box::new(mdns),
        Err(e) => {
            warn!(error = %e, "mDNS unavailable, service will not be announced");
            Box::new(NoopAnnouncer)
        }
    }
}
