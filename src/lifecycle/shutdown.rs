//! Shutdown coordination for the proxy.
//!
//! Shutdown is ordered: the listener stops accepting and drains in-flight
//! requests first, then the health probes are cancelled (the server loop
//! does this once serving returns). The controller here is the trigger
//! side; [`ShutdownHandle`]s are handed to whatever needs to observe it.

use tokio::sync::watch;

/// Trigger side of the shutdown signal.
///
/// Triggering is idempotent and latches: handles created after the fact
/// still observe the shutdown immediately.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A handle that resolves once shutdown is triggered.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Trip the signal. Only the first call has any effect.
    pub fn trigger(&self) {
        if self.tx.send_if_modified(latch) {
            tracing::info!("Shutdown triggered, draining in-flight requests");
        }
    }

    /// Trip the signal when the process receives an interrupt.
    pub fn trigger_on_ctrl_c(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && tx.send_if_modified(latch) {
                tracing::info!("Interrupt received, draining in-flight requests");
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

fn latch(triggered: &mut bool) -> bool {
    if *triggered {
        false
    } else {
        *triggered = true;
        true
    }
}

/// Observer side of the shutdown signal.
#[derive(Clone)]
pub struct ShutdownHandle {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Resolve once shutdown has been triggered. Also resolves if the
    /// controller is gone, so a dropped `Shutdown` cannot wedge the
    /// server loop.
    pub async fn triggered(mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
