//! Error types for the DHCP client
//!
//! This module provides error types for DHCP operations including
//! socket binding, packet parsing and lease negotiation.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Error type for DHCP operations
#[derive(Debug, Error)]
pub enum DhcpError {
    /// Failed to bind to socket
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to attach the socket to a network device
    #[error("failed to bind socket to interface {interface}: {source}")]
    BindDeviceFailed {
        interface: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse DHCP packet
    #[error("failed to parse DHCP packet: {0}")]
    ParseError(String),

    /// Failed to encode DHCP packet
    #[error("failed to encode DHCP packet: {0}")]
    EncodeError(String),

    /// Socket send or receive error
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// No matching reply arrived in time
    #[error("no {expected} received within {timeout:?}")]
    Timeout {
        expected: &'static str,
        timeout: Duration,
    },

    /// Server refused the requested address
    #[error("server {server} refused the request")]
    Nak { server: String },
}

/// Result type for DHCP operations
pub type Result<T> = std::result::Result<T, DhcpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_error_display() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 68);
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = DhcpError::BindFailed {
            addr,
            source: io_err,
        };
        assert!(err.to_string().contains("failed to bind to 0.0.0.0:68"));

        let err = DhcpError::Timeout {
            expected: "OFFER",
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "no OFFER received within 5s");

        let err = DhcpError::Nak {
            server: "10.0.0.1".to_string(),
        };
        assert_eq!(err.to_string(), "server 10.0.0.1 refused the request");
    }

    #[test]
    fn test_bind_device_error_keeps_source() {
        use std::error::Error as _;

        let err = DhcpError::BindDeviceFailed {
            interface: "eth9".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such device"),
        };
        assert!(err.to_string().contains("eth9"));
        assert!(err.source().is_some());
    }
}
