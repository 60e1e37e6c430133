//! Lease lifecycle metrics
//!
//! All series carry a single `ip` label holding the target address. The
//! registry is created once and shared; each session receives a
//! [`TargetMetrics`] handle already bound to its own label.
//!
//! # Metrics
//!
//! | Metric                                 | Type    | Meaning                         |
//! |----------------------------------------|---------|---------------------------------|
//! | `dhcp_acquired_leases_total`           | Counter | Leases granted or renewed       |
//! | `dhcp_expired_leases_total`            | Counter | Leases that ran out             |
//! | `dhcp_failed_leases_total`             | Counter | Failed acquisition attempts     |
//! | `dhcp_lease_expiry_timestamp_seconds`  | Gauge   | Unix time the current lease ends|

use crate::config::TargetAddress;
use crate::error::Result;
use leasehold_dhcp::Lease;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

const IP_LABEL: &str = "ip";

/// Shared lease metrics registry
#[derive(Clone)]
pub struct LeaseMetrics {
    registry: Registry,
    acquired_total: CounterVec,
    expired_total: CounterVec,
    failed_total: CounterVec,
    expiry_timestamp: GaugeVec,
}

impl LeaseMetrics {
    /// Create a fresh registry with all lease metrics registered
    ///
    /// # Errors
    ///
    /// Returns an error if a metric fails to register.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let acquired_total = CounterVec::new(
            Opts::new(
                "dhcp_acquired_leases_total",
                "The number of times a lease was acquired, labeled by IP",
            ),
            &[IP_LABEL],
        )?;
        registry.register(Box::new(acquired_total.clone()))?;

        let expired_total = CounterVec::new(
            Opts::new(
                "dhcp_expired_leases_total",
                "The number of times a lease has expired, labeled by IP",
            ),
            &[IP_LABEL],
        )?;
        registry.register(Box::new(expired_total.clone()))?;

        let failed_total = CounterVec::new(
            Opts::new(
                "dhcp_failed_leases_total",
                "The number of times a lease failed to be acquired, labeled by IP",
            ),
            &[IP_LABEL],
        )?;
        registry.register(Box::new(failed_total.clone()))?;

        let expiry_timestamp = GaugeVec::new(
            Opts::new(
                "dhcp_lease_expiry_timestamp_seconds",
                "A timestamp representing the expiry time for a lease as a unix timestamp, labeled by IP",
            ),
            &[IP_LABEL],
        )?;
        registry.register(Box::new(expiry_timestamp.clone()))?;

        Ok(Self {
            registry,
            acquired_total,
            expired_total,
            failed_total,
            expiry_timestamp,
        })
    }

    /// Bind handles for one target
    ///
    /// Creating the handles creates the series, at zero. Binding a label
    /// that already exists leaves its current values untouched.
    pub fn bind(&self, target: &TargetAddress) -> TargetMetrics {
        let ip = target.to_string();
        let labels = [ip.as_str()];
        TargetMetrics {
            acquired_total: self.acquired_total.with_label_values(&labels),
            expired_total: self.expired_total.with_label_values(&labels),
            failed_total: self.failed_total.with_label_values(&labels),
            expiry_timestamp: self.expiry_timestamp.with_label_values(&labels),
        }
    }

    /// Encode all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Current values for `target` without resetting them
    #[must_use]
    pub fn snapshot(&self, target: &TargetAddress) -> TargetSnapshot {
        let ip = target.to_string();
        let labels = [ip.as_str()];
        TargetSnapshot {
            acquired: self.acquired_total.with_label_values(&labels).get(),
            expired: self.expired_total.with_label_values(&labels).get(),
            failed: self.failed_total.with_label_values(&labels).get(),
            expiry_timestamp: self.expiry_timestamp.with_label_values(&labels).get(),
        }
    }

    /// Number of labeled series across all lease metrics
    pub fn series_count(&self) -> usize {
        self.registry
            .gather()
            .iter()
            .map(|family| family.get_metric().len())
            .sum()
    }
}

impl std::fmt::Debug for LeaseMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseMetrics").finish_non_exhaustive()
    }
}

/// Metric handles pre-bound to one target's `ip` label
#[derive(Clone)]
pub struct TargetMetrics {
    acquired_total: prometheus::Counter,
    expired_total: prometheus::Counter,
    failed_total: prometheus::Counter,
    expiry_timestamp: prometheus::Gauge,
}

/// Point-in-time values of one target's series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSnapshot {
    pub acquired: f64,
    pub expired: f64,
    pub failed: f64,
    pub expiry_timestamp: f64,
}

impl TargetMetrics {
    /// A lease was granted or renewed
    pub fn record_bound(&self, lease: &Lease) {
        self.acquired_total.inc();
        self.expiry_timestamp.set(lease.expire.timestamp() as f64);
    }

    /// A previously held lease expired
    pub fn record_expired(&self) {
        self.expired_total.inc();
    }

    /// An acquisition attempt failed
    pub fn record_failed(&self) {
        self.failed_total.inc();
    }

    /// Current values, primarily for tests
    #[must_use]
    pub fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            acquired: self.acquired_total.get(),
            expired: self.expired_total.get(),
            failed: self.failed_total.get(),
            expiry_timestamp: self.expiry_timestamp.get(),
        }
    }
}

impl std::fmt::Debug for TargetMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
