//! Neighbor-table dumps and their per-platform text grammars

use lanagent_core::Device;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::DiscoveryError;

/// A command that prints the OS neighbor table, and the grammar of its output
pub trait NeighborTableSource: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    fn program(&self) -> &str;

    fn args(&self) -> Vec<String>;

    /// Parse one line of output; `None` skips the line
    fn parse_line(&self, line: &str) -> Option<Device>;

    /// Parse a whole dump, skipping lines that do not resolve to a device
    fn parse(&self, output: &str) -> Vec<Device> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let device = self.parse_line(line);
                if device.is_none() {
                    trace!(source = self.name(), line, "Skipping neighbor line");
                }
                device
            })
            .collect()
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program().to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Linux `ip neigh show`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxIpNeigh;

impl NeighborTableSource for LinuxIpNeigh {
    fn name(&self) -> &'static str {
        "ip-neigh"
    }

    fn program(&self) -> &str {
        "ip"
    }

    fn args(&self) -> Vec<String> {
        vec!["neigh".to_string(), "show".to_string()]
    }

    fn parse_line(&self, line: &str) -> Option<Device> {
        parse_ip_neigh_line(line)
    }
}

/// macOS `arp -a`
#[derive(Debug, Clone, Copy, Default)]
pub struct MacOsArp;

impl NeighborTableSource for MacOsArp {
    fn name(&self) -> &'static str {
        "arp"
    }

    fn program(&self) -> &str {
        "arp"
    }

    fn args(&self) -> Vec<String> {
        vec!["-a".to_string()]
    }

    fn parse_line(&self, line: &str) -> Option<Device> {
        parse_arp_a_line(line)
    }
}

/// Neighbor table source for the named OS (`std::env::consts::OS` values)
pub fn for_os(os: &str) -> Result<Box<dyn NeighborTableSource>, DiscoveryError> {
    match os {
        "linux" => Ok(Box::new(LinuxIpNeigh)),
        "macos" => Ok(Box::new(MacOsArp)),
        other => Err(DiscoveryError::UnsupportedPlatform {
            os: other.to_string(),
        }),
    }
}

/// Neighbor table source for the running OS
pub fn platform_source() -> Result<Box<dyn NeighborTableSource>, DiscoveryError> {
    for_os(std::env::consts::OS)
}

/// Run the dump command and parse its output
///
/// The child is killed if it outlives `timeout`.
pub async fn read_neighbor_table(
    source: &dyn NeighborTableSource,
    timeout: Duration,
) -> Result<Vec<Device>, DiscoveryError> {
    let command = source.command_line();
    let child = Command::new(source.program())
        .args(source.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DiscoveryError::CommandFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(DiscoveryError::CommandFailed {
                command,
                reason: e.to_string(),
            })
        }
        Err(_) => return Err(DiscoveryError::CommandTimeout { command, timeout }),
    };

    if !output.status.success() {
        return Err(DiscoveryError::CommandFailed {
            command,
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let devices = source.parse(&stdout);
    debug!(source = source.name(), devices = devices.len(), "Read neighbor table");
    Ok(devices)
}

/// Linux neighbor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpState {
    Reachable,
    Stale,
    Delay,
    Probe,
    Failed,
    Incomplete,
    Permanent,
    Noarp,
    Unknown,
}

impl ArpState {
    /// States that carry no usable link-layer address
    pub fn is_unresolved(self) -> bool {
        matches!(self, ArpState::Failed | ArpState::Incomplete)
    }
}

fn parse_arp_state(s: &str) -> ArpState {
    match s.to_uppercase().as_str() {
        "REACHABLE" => ArpState::Reachable,
        "STALE" => ArpState::Stale,
        "DELAY" => ArpState::Delay,
        "PROBE" => ArpState::Probe,
        "FAILED" => ArpState::Failed,
        "INCOMPLETE" => ArpState::Incomplete,
        "PERMANENT" => ArpState::Permanent,
        "NOARP" => ArpState::Noarp,
        _ => ArpState::Unknown,
    }
}

/// Parse a line from `ip neigh show`
fn parse_ip_neigh_line(line: &str) -> Option<Device> {
    // Format: "192.168.1.1 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE"
    let parts: Vec<&str> = line.split_whitespace().collect();

    let ip = Ipv4Addr::from_str(parts.first()?).ok()?;

    let state = parts.last().map(|s| parse_arp_state(s)).unwrap_or(ArpState::Unknown);
    if state.is_unresolved() {
        return None;
    }

    // MAC is absent for INCOMPLETE/FAILED entries
    let lladdr_idx = parts.iter().position(|&p| p == "lladdr")?;
    let mac = parts.get(lladdr_idx + 1)?;

    Device::new(ip, mac)
}

/// Parse a line from `arp -a`
fn parse_arp_a_line(line: &str) -> Option<Device> {
    // Format: "gateway (192.168.1.1) at aa:bb:cc:dd:ee:ff on en0 ifscope [ethernet]"
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() < 4 || parts[2] != "at" {
        return None;
    }

    let ip = parts[1].strip_prefix('(')?.strip_suffix(')')?;
    let ip = Ipv4Addr::from_str(ip).ok()?;

    // "(incomplete)" fails MAC normalization
    Device::new(ip, parts[3])
}
