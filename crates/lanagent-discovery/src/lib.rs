//! LAN Agent Discovery - Neighbor-table based device discovery
//!
//! A scan runs in three steps:
//! - detect the active IPv4 interface and compute its subnet
//! - sweep the subnet with ICMP echo so the kernel learns its neighbors
//! - dump and parse the platform neighbor table into a device list
//!
//! `run_periodic` drives scans on a fixed schedule and publishes each result
//! into a shared `ScanCache`.

pub mod arp;
pub mod error;
pub mod interface;
pub mod probe;
pub mod scanner;
pub mod schedule;
pub mod subnet;

pub use arp::{for_os, platform_source, read_neighbor_table, LinuxIpNeigh, MacOsArp, NeighborTableSource};
pub use error::DiscoveryError;
pub use interface::{detect_interface, LocalInterface};
pub use probe::NeighborProbe;
pub use scanner::{ArpScanner, ScannerConfig, MAX_SWEEP_HOSTS};
pub use schedule::run_periodic;
pub use subnet::SubnetSpec;
