//! LAN Agent Core - Device types and the shared scan cache
//!
//! This crate provides the foundational types for LAN Agent:
//! - `Device` and `ScanResult`, the normalized output of a neighbor-table scan
//! - MAC address normalization and per-scan IP de-duplication
//! - `ScanCache`, the last-write-wins store shared by the scan loop and HTTP handlers

pub mod cache;
pub mod device;

pub use cache::ScanCache;
pub use device::{dedup_by_ip, normalize_mac, Device, ScanResult, MAC_UNRESOLVED};
