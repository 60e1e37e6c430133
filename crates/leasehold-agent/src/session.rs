//! Lease sessions
//!
//! A session owns one lease client for one target address. It wires the
//! client's callbacks into that target's metrics and logs, starts the
//! client, and stops it once shutdown is signalled.

use crate::config::TargetAddress;
use crate::interface::InterfaceHandle;
use crate::metrics::{LeaseMetrics, TargetMetrics};
use chrono::Utc;
use leasehold_dhcp::{
    ClientConfig, DhcpClient, DhcpOption, LeaseClient, DEFAULT_PARAMS_REQUEST_LIST,
    DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

/// Builds the lease client a session drives
pub trait ClientFactory: Send + Sync {
    fn create(&self, interface: &InterfaceHandle) -> Box<dyn LeaseClient>;
}

/// Factory for real DHCP clients bound to the selected interface
#[derive(Debug, Clone)]
pub struct DhcpClientFactory {
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub hostname: Option<String>,
}

impl Default for DhcpClientFactory {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            hostname: None,
        }
    }
}

impl DhcpClientFactory {
    /// Client settings for `interface`
    pub fn client_config(&self, interface: &InterfaceHandle) -> ClientConfig {
        let config = ClientConfig::new(interface.name.clone(), interface.hw_addr())
            .with_timeout(self.timeout)
            .with_retry_delay(self.retry_delay);
        match &self.hostname {
            Some(hostname) => config.with_hostname(hostname.clone()),
            None => config,
        }
    }
}

impl ClientFactory for DhcpClientFactory {
    fn create(&self, interface: &InterfaceHandle) -> Box<dyn LeaseClient> {
        Box::new(DhcpClient::new(self.client_config(interface)))
    }
}

/// Run one lease session until `shutdown` flips to true
///
/// Metrics for the target are bound before the client starts, so the
/// target is visible at zero before its first lease event.
pub async fn run_session(
    shutdown: watch::Receiver<bool>,
    interface: Arc<InterfaceHandle>,
    target: TargetAddress,
    metrics: LeaseMetrics,
    factory: Arc<dyn ClientFactory>,
) {
    let span = info_span!("session", target_addr = %target);
    drive(shutdown, interface, target, metrics.bind(&target), factory)
        .instrument(span)
        .await
}

async fn drive(
    mut shutdown: watch::Receiver<bool>,
    interface: Arc<InterfaceHandle>,
    target: TargetAddress,
    bound: TargetMetrics,
    factory: Arc<dyn ClientFactory>,
) {
    info!(target_addr = %target, "Will continually request a lease for target addr");

    let mut client = factory.create(&interface);
    for code in DEFAULT_PARAMS_REQUEST_LIST {
        client.add_param_request(*code);
    }
    client.add_option(DhcpOption::RequestedIpAddress(target.addr()));

    let on_bound = bound.clone();
    let bound_span = tracing::Span::current();
    client.on_bound(Box::new(move |lease| {
        let _entered = bound_span.enter();
        let ttl = lease.ttl(Utc::now());
        info!(addr = %lease.fixed_address, ttl = ?ttl, "Got lease");
        on_bound.record_bound(lease);
    }));

    let on_expire = bound;
    let expire_span = tracing::Span::current();
    client.on_expire(Box::new(move |lease| {
        let _entered = expire_span.enter();
        match lease {
            None => {
                warn!(target_addr = %target, "Acquiring lease failed, will retry");
                on_expire.record_failed();
            }
            Some(lease) => {
                info!(
                    addr = %lease.fixed_address,
                    server = %lease.server_id,
                    expire = %lease.expire,
                    "Lease expired"
                );
                on_expire.record_expired();
            }
        }
    }));

    info!(iface = %interface.name, "Starting dhcp client");
    client.start();

    // A dropped sender counts as shutdown too.
    let _ = shutdown.wait_for(|stop| *stop).await;

    info!("Stopping dhcp client");
    client.stop().await;
}
