//! Error types for the lease agent
//!
//! Every variant here is fatal at startup: the binary logs it and exits
//! non-zero before any lease session runs.

use std::net::SocketAddr;
use thiserror::Error;

/// Error type for agent startup
#[derive(Debug, Error)]
pub enum AgentError {
    /// No interface is up, non-loopback and addressed
    #[error("unable to find a suitable network interface")]
    NoSuitableInterface,

    /// The host refused to list its interfaces
    #[error("failed to enumerate network interfaces: {0}")]
    InterfaceEnumeration(String),

    /// Target list not configured
    #[error("TARGET_ADDRS is not set")]
    MissingTargets,

    /// Target list contains an empty element
    #[error("empty target address at position {position}")]
    EmptyTarget { position: usize },

    /// Target list contains something that is not an IPv4 address
    #[error("invalid target address {value:?}: {source}")]
    InvalidTarget {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Metrics could not be registered or encoded
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics listener could not be bound
    #[error("failed to bind metrics listener on {addr}: {source}")]
    MetricsBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Metrics server stopped with an error
    #[error("metrics server error: {0}")]
    MetricsServer(#[source] std::io::Error),
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
