//! Active interface detection

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::subnet::SubnetSpec;

/// The IPv4 interface a scan runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Hardware address as reported by the OS, if any
    pub mac: Option<String>,
}

impl LocalInterface {
    pub fn subnet(&self) -> SubnetSpec {
        SubnetSpec::from_interface(self.ip, self.netmask)
    }
}

/// Pick the interface to scan
///
/// With `preferred` set only that interface is eligible. Otherwise the first
/// non-loopback interface with an IPv4 address and netmask wins, in whatever
/// order the OS enumerates them. On multi-homed hosts that may not be the
/// interface carrying the default route.
pub fn detect_interface(preferred: Option<&str>) -> Result<LocalInterface, DiscoveryError> {
    let interfaces = NetworkInterface::show().map_err(|e| {
        warn!(error = %e, "Failed to enumerate network interfaces");
        DiscoveryError::NoInterface
    })?;

    let candidates: Vec<LocalInterface> = interfaces.iter().flat_map(ipv4_entries).collect();
    let selected = select_interface(&candidates, preferred).ok_or(DiscoveryError::NoInterface)?;

    debug!(
        interface = %selected.name,
        ip = %selected.ip,
        netmask = %selected.netmask,
        candidates = candidates.len(),
        "Selected scan interface"
    );
    Ok(selected)
}

/// One entry per IPv4 address carrying a netmask
fn ipv4_entries(iface: &NetworkInterface) -> Vec<LocalInterface> {
    iface
        .addr
        .iter()
        .filter_map(|addr| match addr {
            Addr::V4(v4) => v4.netmask.map(|netmask| LocalInterface {
                name: iface.name.clone(),
                ip: v4.ip,
                netmask,
                mac: iface.mac_addr.clone(),
            }),
            Addr::V6(_) => None,
        })
        .collect()
}

fn select_interface(candidates: &[LocalInterface], preferred: Option<&str>) -> Option<LocalInterface> {
    candidates
        .iter()
        .filter(|c| !c.ip.is_loopback() && !c.ip.is_unspecified())
        .find(|c| preferred.map_or(true, |name| c.name == name))
        .cloned()
}
