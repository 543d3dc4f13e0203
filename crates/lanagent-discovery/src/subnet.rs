//! Subnet arithmetic for the probe sweep

use std::net::Ipv4Addr;

/// Address range derived from an interface's address and netmask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl SubnetSpec {
    /// Derive the subnet an interface address lives in
    ///
    /// The prefix length is the number of set bits in the netmask, so a
    /// non-contiguous mask is treated as its contiguous equivalent.
    pub fn from_interface(ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        let prefix_len = u32::from(netmask).count_ones() as u8;
        let network = Ipv4Addr::from(u32::from(ip) & prefix_mask(prefix_len));
        Self {
            network,
            prefix_len,
        }
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !prefix_mask(self.prefix_len))
    }

    /// Number of addresses `host_addresses` yields
    pub fn host_count(&self) -> u64 {
        let size = 1u64 << (32 - u32::from(self.prefix_len));
        if self.prefix_len >= 31 {
            size
        } else {
            size - 2
        }
    }

    /// Usable host addresses in ascending order
    ///
    /// The network and broadcast addresses are excluded, except on /31 and /32
    /// where every address is a host.
    pub fn host_addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let network = u32::from(self.network);
        let broadcast = u32::from(self.broadcast());
        let (first, last) = if self.prefix_len >= 31 {
            (network, broadcast)
        } else {
            (network + 1, broadcast - 1)
        };
        (first..=last).map(Ipv4Addr::from)
    }
}

impl std::fmt::Display for SubnetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 32 {
        0xFFFFFFFF
    } else {
        !((1u32 << (32 - prefix_len)) - 1)
    }
}
