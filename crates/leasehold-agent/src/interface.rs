//! Interface selection
//!
//! Picks the one interface every lease session binds to: the first one, in
//! enumeration order, that is up, not loopback, and has at least one address.

use crate::error::{AgentError, Result};
use std::net::IpAddr;
use tracing::debug;

/// A host network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceHandle {
    pub name: String,
    pub index: u32,
    pub mac: Option<[u8; 6]>,
    pub is_up: bool,
    pub is_loopback: bool,
    pub addresses: Vec<IpAddr>,
}

impl InterfaceHandle {
    /// Hardware address for DHCP chaddr, zeroed when the interface has none
    pub fn hw_addr(&self) -> [u8; 6] {
        self.mac.unwrap_or_default()
    }
}

impl From<netdev::Interface> for InterfaceHandle {
    fn from(iface: netdev::Interface) -> Self {
        let addresses = iface
            .ipv4
            .iter()
            .map(|net| IpAddr::V4(net.addr))
            .chain(iface.ipv6.iter().map(|net| IpAddr::V6(net.addr)))
            .collect();

        Self {
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
            mac: iface.mac_addr.map(|mac| mac.octets()),
            name: iface.name,
            index: iface.index,
            addresses,
        }
    }
}

/// Source of host interfaces
pub trait InterfaceSource: Send + Sync {
    /// List interfaces in the host's enumeration order
    fn interfaces(&self) -> Result<Vec<InterfaceHandle>>;
}

/// Interfaces of the running host
#[derive(Debug, Default, Clone, Copy)]
pub struct HostInterfaces;

impl InterfaceSource for HostInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceHandle>> {
        Ok(netdev::get_interfaces()
            .into_iter()
            .map(InterfaceHandle::from)
            .collect())
    }
}

/// Select the interface to bind lease sessions to
pub fn select_interface(source: &dyn InterfaceSource) -> Result<InterfaceHandle> {
    for iface in source.interfaces()? {
        if !iface.is_up || iface.is_loopback {
            debug!(iface = %iface.name, "Skipping interface: down or loopback");
            continue;
        }

        if iface.addresses.is_empty() {
            debug!(iface = %iface.name, "Skipping interface: no addresses");
            continue;
        }

        return Ok(iface);
    }

    Err(AgentError::NoSuitableInterface)
}
