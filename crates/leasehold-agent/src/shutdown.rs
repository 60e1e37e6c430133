//! Shutdown coordination
//!
//! Cancellation is a single `watch` channel: every session holds a receiver
//! and stops its client once the value flips to `true`.

use std::future::Future;
use tokio::sync::{oneshot, watch};
use tracing::{error, info};

/// Why the agent shut down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal arrived (name of the signal)
    Signal(&'static str),

    /// The metrics exporter stopped with an error
    ExporterFailed(String),
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Signal(_) => 0,
            Self::ExporterFailed(_) => 1,
        }
    }
}

/// Sending half of the cancellation channel
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// New receiver that observes cancellation
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Fire cancellation; returns false if it had already fired
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|stop| {
            if *stop {
                false
            } else {
                *stop = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Resolve when SIGINT (Ctrl-C) or SIGTERM arrives, yielding its name
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}

/// Wait for a signal or an exporter failure, then fire cancellation once
///
/// A dropped `exporter_failure` sender means the exporter is absent or
/// finished cleanly; it never triggers shutdown on its own.
pub async fn await_shutdown<S>(
    signal: S,
    exporter_failure: oneshot::Receiver<String>,
    trigger: &ShutdownTrigger,
) -> ShutdownReason
where
    S: Future<Output = &'static str>,
{
    let exporter = async {
        match exporter_failure.await {
            Ok(message) => message,
            Err(_) => std::future::pending().await,
        }
    };

    let reason = tokio::select! {
        name = signal => {
            info!(signal = name, "Received signal, exiting");
            ShutdownReason::Signal(name)
        }
        message = exporter => {
            error!(error = %message, "Metric server failed, exiting");
            ShutdownReason::ExporterFailed(message)
        }
    };

    trigger.fire();
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShutdownReason::Signal("SIGTERM").exit_code(), 0);
        assert_eq!(ShutdownReason::ExporterFailed("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_fire_is_idempotent() {
        let trigger = ShutdownTrigger::new();
        let rx = trigger.subscribe();
        assert!(!trigger.is_fired());

        assert!(trigger.fire());
        assert!(!trigger.fire());
        assert!(trigger.is_fired());
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_signal_fires_cancellation() {
        let trigger = ShutdownTrigger::new();
        let mut rx = trigger.subscribe();
        let (_failure_tx, failure_rx) = oneshot::channel::<String>();

        let reason = await_shutdown(async { "SIGINT" }, failure_rx, &trigger).await;

        assert_eq!(reason, ShutdownReason::Signal("SIGINT"));
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_exporter_failure_fires_cancellation() {
        let trigger = ShutdownTrigger::new();
        let (failure_tx, failure_rx) = oneshot::channel();
        failure_tx.send("address in use".to_string()).unwrap();

        let never = std::future::pending::<&'static str>();
        let reason = await_shutdown(never, failure_rx, &trigger).await;

        assert_eq!(
            reason,
            ShutdownReason::ExporterFailed("address in use".to_string())
        );
        assert_eq!(reason.exit_code(), 1);
        assert!(trigger.is_fired());
    }

    #[tokio::test]
    async fn test_dropped_exporter_does_not_shut_down() {
        let trigger = ShutdownTrigger::new();
        let (failure_tx, failure_rx) = oneshot::channel::<String>();
        drop(failure_tx);

        let signal = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "SIGTERM"
        };
        let reason = await_shutdown(signal, failure_rx, &trigger).await;

        assert_eq!(reason, ShutdownReason::Signal("SIGTERM"));
    }
}
