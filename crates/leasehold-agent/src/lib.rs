//! Leasehold Agent
//!
//! Keeps DHCP leases alive for a fixed set of target addresses on one host
//! interface and reports each lease's lifecycle as Prometheus metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Supervisor                          │
//! │   select_interface ─► parse_targets ─► spawn sessions    │
//! │                                                          │
//! │   ┌──────────────┐ ┌──────────────┐     ┌──────────────┐ │
//! │   │ run_session  │ │ run_session  │ ... │ serve_metrics│ │
//! │   │  10.0.0.5    │ │  10.0.0.6    │     │  /metrics    │ │
//! │   └──────┬───────┘ └──────┬───────┘     └──────┬───────┘ │
//! │          └────────────────┴─────────┬──────────┘         │
//! │                                     ▼                    │
//! │              ShutdownTrigger (watch<bool>)               │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod interface;
pub mod metrics;
pub mod session;
pub mod shutdown;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{parse_targets, AgentConfig, TargetAddress, DEFAULT_METRICS_ADDR};
pub use error::{AgentError, Result};
pub use exporter::{bind_metrics, metrics_router, serve_metrics};
pub use interface::{select_interface, HostInterfaces, InterfaceHandle, InterfaceSource};
pub use metrics::{LeaseMetrics, TargetMetrics, TargetSnapshot};
pub use session::{run_session, ClientFactory, DhcpClientFactory};
pub use shutdown::{await_shutdown, wait_for_signal, ShutdownReason, ShutdownTrigger};
pub use supervisor::Supervisor;
