//! Agent configuration
//!
//! The target list arrives as one comma-separated string (usually from
//! `TARGET_ADDRS`). It is validated strictly: a missing list, an empty
//! element or a non-IPv4 element stops startup.

use crate::error::{AgentError, Result};
use leasehold_dhcp::{DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Where the metrics endpoint listens unless configured otherwise
pub const DEFAULT_METRICS_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1337));

/// An address the agent keeps a lease for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetAddress(Ipv4Addr);

impl TargetAddress {
    pub fn new(addr: Ipv4Addr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.0
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Split and validate a comma-separated target list
///
/// Duplicates are kept; each one gets its own session.
pub fn parse_targets(raw: Option<&str>) -> Result<Vec<TargetAddress>> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(AgentError::MissingTargets),
    };

    raw.split(',')
        .enumerate()
        .map(|(index, value)| {
            if value.is_empty() {
                return Err(AgentError::EmptyTarget {
                    position: index + 1,
                });
            }
            value
                .parse::<Ipv4Addr>()
                .map(TargetAddress)
                .map_err(|source| AgentError::InvalidTarget {
                    value: value.to_string(),
                    source,
                })
        })
        .collect()
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Raw comma-separated target list
    pub target_addrs: Option<String>,

    /// Metrics listen address (None = no metrics endpoint)
    pub metrics_addr: Option<SocketAddr>,

    /// Per-message reply timeout for each client
    pub client_timeout: Duration,

    /// Delay between failed acquisition attempts
    pub retry_delay: Duration,

    /// Hostname sent with every request (option 12)
    pub hostname: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            target_addrs: None,
            metrics_addr: Some(DEFAULT_METRICS_ADDR),
            client_timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            hostname: None,
        }
    }
}

impl AgentConfig {
    /// Create a config for a raw target list
    pub fn new(target_addrs: Option<String>) -> Self {
        Self {
            target_addrs,
            ..Default::default()
        }
    }

    /// Set or clear the metrics listen address
    pub fn with_metrics_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.metrics_addr = addr;
        self
    }

    /// Set the client reply timeout
    pub fn with_client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Set the retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set or clear the hostname clients announce
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }
}
