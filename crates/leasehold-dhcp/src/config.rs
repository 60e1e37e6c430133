//! DHCP client configuration
//!
//! This module provides configuration types for the DHCP client: the
//! interface to run on, the hardware address to present, and the timing
//! used for exchanges and retries.

use dhcproto::v4::OptionCode;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

/// UDP port DHCP clients listen on
pub const CLIENT_PORT: u16 = 68;

/// UDP port DHCP servers listen on
pub const SERVER_PORT: u16 = 67;

/// Default time to wait for a reply to one message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default delay before retrying a failed acquisition
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Parameters requested from the server unless told otherwise
pub const DEFAULT_PARAMS_REQUEST_LIST: &[OptionCode] = &[
    OptionCode::SubnetMask,
    OptionCode::Router,
    OptionCode::TimeOffset,
    OptionCode::DomainNameServer,
    OptionCode::DomainName,
    OptionCode::InterfaceMtu,
    OptionCode::NtpServers,
];

/// DHCP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Interface to bind to (e.g., "eth0")
    pub interface: String,

    /// Attach the socket to `interface` with SO_BINDTODEVICE (Linux only)
    pub bind_device: bool,

    /// Hardware address placed in chaddr
    pub hw_addr: [u8; 6],

    /// Hostname sent with option 12
    pub hostname: Option<String>,

    /// How long to wait for each OFFER/ACK
    pub timeout: Duration,

    /// Delay between failed acquisition attempts, and the shortest pause
    /// between any two lease events
    pub retry_delay: Duration,

    /// Address the socket binds to
    pub bind_addr: SocketAddrV4,

    /// Where requests are sent
    pub server_addr: SocketAddrV4,
}

impl ClientConfig {
    /// Create a new client config for an interface and hardware address
    pub fn new(interface: impl Into<String>, hw_addr: [u8; 6]) -> Self {
        Self {
            interface: interface.into(),
            bind_device: true,
            hw_addr,
            hostname: None,
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            bind_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, CLIENT_PORT),
            server_addr: SocketAddrV4::new(Ipv4Addr::BROADCAST, SERVER_PORT),
        }
    }

    /// Enable or disable binding the socket to the interface
    pub fn with_device_binding(mut self, enabled: bool) -> Self {
        self.bind_device = enabled;
        self
    }

    /// Set the hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the reply timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the local bind address
    pub fn with_bind_addr(mut self, addr: SocketAddrV4) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Override the destination for outgoing requests
    pub fn with_server_addr(mut self, addr: SocketAddrV4) -> Self {
        self.server_addr = addr;
        self
    }

    /// Hardware address formatted as colon-separated hex
    pub fn mac_string(&self) -> String {
        let m = self.hw_addr;
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}
