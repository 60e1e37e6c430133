//! Leasehold DHCP Client
//!
//! This crate provides a DHCPv4 client that claims one specific address on
//! one interface and keeps the lease alive. Several clients can run side by
//! side on the same interface, each asking for a different address.
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 DhcpClient                          │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │   DISCOVER → OFFER → REQUEST → ACK            │  │
//! │  └───────────────────────────────────────────────┘  │
//! │                       │                             │
//! │                       ▼                             │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │   Bound: renew at T1, expire at lease end     │  │
//! │  └───────────────────────────────────────────────┘  │
//! │                       │                             │
//! │                       ▼                             │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │   on_bound(lease) | on_expire(lease | None)   │  │
//! │  └───────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use leasehold_dhcp::{ClientConfig, DhcpClient, DhcpOption, LeaseClient};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new("eth0", [0x02, 0, 0, 0, 0, 1]);
//! let mut client = DhcpClient::new(config);
//! client.add_option(DhcpOption::RequestedIpAddress(Ipv4Addr::new(10, 0, 0, 5)));
//! client.on_bound(Box::new(|lease| println!("bound {}", lease.fixed_address)));
//! client.on_expire(Box::new(|lease| println!("expired {:?}", lease)));
//! client.start();
//! // ...
//! client.stop().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod packet;

pub use client::*;
pub use config::*;
pub use error::*;
pub use packet::*;

pub use dhcproto::v4::{DhcpOption, MessageType, OptionCode};
