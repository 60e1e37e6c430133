//! Session supervisor
//!
//! Startup order matters: the target list is validated and the interface
//! selected before any session or metric series exists, so a bad
//! configuration exits without side effects. Targets are checked first so
//! configuration errors surface the same way on every host.

use crate::config::{parse_targets, AgentConfig};
use crate::error::Result;
use crate::exporter::{bind_metrics, serve_metrics};
use crate::interface::{select_interface, HostInterfaces, InterfaceSource};
use crate::metrics::LeaseMetrics;
use crate::session::{run_session, ClientFactory, DhcpClientFactory};
use crate::shutdown::{await_shutdown, wait_for_signal, ShutdownReason, ShutdownTrigger};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// Runs one lease session per configured target until shutdown
pub struct Supervisor {
    config: AgentConfig,
    interfaces: Arc<dyn InterfaceSource>,
    factory: Arc<dyn ClientFactory>,
    metrics: Option<LeaseMetrics>,
}

impl Supervisor {
    /// Supervisor using host interfaces and real DHCP clients
    pub fn new(config: AgentConfig) -> Self {
        let factory = DhcpClientFactory {
            timeout: config.client_timeout,
            retry_delay: config.retry_delay,
            hostname: config.hostname.clone(),
        };
        Self {
            config,
            interfaces: Arc::new(HostInterfaces),
            factory: Arc::new(factory),
            metrics: None,
        }
    }

    pub fn with_interface_source(mut self, source: impl InterfaceSource + 'static) -> Self {
        self.interfaces = Arc::new(source);
        self
    }

    pub fn with_client_factory(mut self, factory: impl ClientFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Use an existing registry instead of creating one
    pub fn with_metrics(mut self, metrics: LeaseMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until SIGINT/SIGTERM or exporter failure
    pub async fn run(self) -> Result<ShutdownReason> {
        self.run_until(wait_for_signal()).await
    }

    /// Run until `signal` resolves or the exporter fails
    ///
    /// Returns only after every session has stopped its client.
    pub async fn run_until<S>(self, signal: S) -> Result<ShutdownReason>
    where
        S: Future<Output = &'static str>,
    {
        let targets = parse_targets(self.config.target_addrs.as_deref())?;

        let interface = Arc::new(select_interface(self.interfaces.as_ref())?);
        info!(iface = %interface.name, index = interface.index, "Using interface");

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => LeaseMetrics::new()?,
        };

        let trigger = ShutdownTrigger::new();
        let mut sessions = JoinSet::new();
        for target in targets {
            sessions.spawn(run_session(
                trigger.subscribe(),
                interface.clone(),
                target,
                metrics.clone(),
                self.factory.clone(),
            ));
        }
        debug!(count = sessions.len(), "Lease sessions spawned");

        let (failure_tx, failure_rx) = oneshot::channel();
        let exporter = match self.config.metrics_addr {
            Some(addr) => Some(spawn_exporter(addr, metrics, &trigger, failure_tx)),
            None => {
                debug!("Metrics endpoint disabled");
                None
            }
        };

        let reason = await_shutdown(signal, failure_rx, &trigger).await;

        while let Some(result) = sessions.join_next().await {
            if let Err(e) = result {
                error!("Lease session task failed: {}", e);
            }
        }
        if let Some(handle) = exporter {
            if let Err(e) = handle.await {
                error!("Metrics server task failed: {}", e);
            }
        }

        info!("All lease sessions stopped");
        Ok(reason)
    }
}

/// Spawn the metrics endpoint; any failure is reported on `failure_tx`
fn spawn_exporter(
    addr: std::net::SocketAddr,
    metrics: LeaseMetrics,
    trigger: &ShutdownTrigger,
    failure_tx: oneshot::Sender<String>,
) -> JoinHandle<()> {
    let shutdown = trigger.subscribe();
    tokio::spawn(async move {
        let result = match bind_metrics(addr).await {
            Ok(listener) => serve_metrics(listener, metrics, shutdown.clone()).await,
            Err(e) => Err(e),
        };

        let failure = match result {
            Err(e) => Some(e.to_string()),
            Ok(()) if !*shutdown.borrow() => Some("metrics server stopped unexpectedly".to_string()),
            Ok(()) => None,
        };
        if let Some(message) = failure {
            let _ = failure_tx.send(message);
        }
    })
}
