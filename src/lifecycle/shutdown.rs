//! Shutdown coordination for the manager.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Provides a single-fire signal that all long-running tasks can subscribe to.
/// Unlike a broadcast channel, the fired state is retained, so a task that
/// subscribes after the signal fired still observes it.
#[derive(Clone)]
pub struct Shutdown {
    /// Fired flag. Only ever transitions `false -> true`.
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `true` only for the call that actually fired the signal;
    /// every later call is a no-op and returns `false`.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's view of the shutdown signal.
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Wait until shutdown fires. Returns immediately if it already has.
    pub async fn recv(&mut self) {
        // The sender lives inside every `Shutdown` clone; if all of them are
        // gone nobody can fire anymore, so treat that as shutdown too.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Whether shutdown has fired.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
