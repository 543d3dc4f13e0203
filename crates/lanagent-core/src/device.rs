//! Device types produced by a neighbor-table scan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// MAC placeholder used when the local machine's hardware address is unknown
pub const MAC_UNRESOLVED: &str = "N/A";

/// A host seen in the neighbor table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// IPv4 address of the host
    pub ip: Ipv4Addr,
    /// Colon-separated uppercase MAC, or `N/A` for an unresolved local entry
    pub mac: String,
}

impl Device {
    /// Build a device from a raw MAC token, rejecting anything that is not a
    /// six-octet hardware address
    pub fn new(ip: Ipv4Addr, mac: &str) -> Option<Self> {
        normalize_mac(mac).map(|mac| Self { ip, mac })
    }

    /// Entry for the machine running the scan
    pub fn local(ip: Ipv4Addr, mac: Option<&str>) -> Self {
        let mac = mac
            .and_then(normalize_mac)
            .filter(|m| m != "00:00:00:00:00:00")
            .unwrap_or_else(|| MAC_UNRESOLVED.to_string());
        Self { ip, mac }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.ip, self.mac)
    }
}

/// Outcome of one complete scan
///
/// A result is never edited after it is produced; the cache swaps whole
/// results in and out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub devices: Vec<Device>,
    pub scanned_at: DateTime<Utc>,
}

impl ScanResult {
    /// Stamp a device list with the current time
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            scanned_at: Utc::now(),
        }
    }

    /// Result with no devices, used before the first scan completes
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for ScanResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Normalize a MAC token into `XX:XX:XX:XX:XX:XX`
///
/// Accepts upper or lower case hex and single-digit octets (`0:1a:2b:3:4:5`,
/// as printed by BSD `arp`). Returns `None` for anything else, including the
/// `(incomplete)` markers some tools print in place of an address.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split(':').collect();
    if octets.len() != 6 {
        return None;
    }

    let mut normalized = Vec::with_capacity(6);
    for octet in octets {
        if octet.is_empty() || octet.len() > 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        normalized.push(format!("{:0>2}", octet.to_ascii_uppercase()));
    }

    Some(normalized.join(":"))
}

/// Collapse duplicate IPs within one scan
///
/// Each IP keeps the position of its first appearance and the MAC of its last.
pub fn dedup_by_ip(devices: Vec<Device>) -> Vec<Device> {
    let mut seen: HashMap<Ipv4Addr, usize> = HashMap::with_capacity(devices.len());
    let mut unique: Vec<Device> = Vec::with_capacity(devices.len());

    for device in devices {
        match seen.get(&device.ip) {
            Some(&idx) => unique[idx].mac = device.mac,
            None => {
                seen.insert(device.ip, unique.len());
                unique.push(device);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(ip: [u8; 4], mac: &str) -> Device {
        Device::new(Ipv4Addr::from(ip), mac).unwrap()
    }

    #[test]
    fn test_normalize_mac_uppercases() {
        assert_eq!(
            normalize_mac("aa:bb:cc:dd:ee:ff").as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
    }

    #[test]
    fn test_normalize_mac_pads_short_octets() {
        assert_eq!(
            normalize_mac("0:1a:2b:3:4:5").as_deref(),
            Some("00:1A:2B:03:04:05")
        );
    }

    #[test]
    fn test_normalize_mac_rejects_garbage() {
        assert!(normalize_mac("(incomplete)").is_none());
        assert!(normalize_mac("<incomplete>").is_none());
        assert!(normalize_mac("aa:bb:cc:dd:ee").is_none());
        assert!(normalize_mac("aa:bb:cc:dd:ee:ff:00").is_none());
        assert!(normalize_mac("aaa:bb:cc:dd:ee:ff").is_none());
        assert!(normalize_mac("gg:bb:cc:dd:ee:ff").is_none());
        assert!(normalize_mac("aa::cc:dd:ee:ff").is_none());
    }

    #[test]
    fn test_local_device_without_mac() {
        let local = Device::local(Ipv4Addr::new(192, 168, 1, 10), None);
        assert_eq!(local.mac, MAC_UNRESOLVED);

        let zeroed = Device::local(Ipv4Addr::new(192, 168, 1, 10), Some("00:00:00:00:00:00"));
        assert_eq!(zeroed.mac, MAC_UNRESOLVED);
    }

    #[test]
    fn test_local_device_with_mac() {
        let local = Device::local(Ipv4Addr::new(192, 168, 1, 10), Some("3c:22:fb:01:02:03"));
        assert_eq!(local.mac, "3C:22:FB:01:02:03");
    }

    #[test]
    fn test_dedup_last_mac_wins_first_position_kept() {
        let devices = vec![
            device([192, 168, 1, 1], "aa:aa:aa:aa:aa:aa"),
            device([192, 168, 1, 2], "bb:bb:bb:bb:bb:bb"),
            device([192, 168, 1, 1], "cc:cc:cc:cc:cc:cc"),
        ];

        let unique = dedup_by_ip(devices);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].ip, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(unique[0].mac, "CC:CC:CC:CC:CC:CC");
        assert_eq!(unique[1].ip, Ipv4Addr::new(192, 168, 1, 2));
    }

    #[test]
    fn test_device_serializes_as_strings() {
        let json = serde_json::to_value(device([10, 0, 0, 7], "de:ad:be:ef:00:01")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ip": "10.0.0.7", "mac": "DE:AD:BE:EF:00:01"})
        );
    }
}
