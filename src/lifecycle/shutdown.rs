//! Shutdown coordination for the supervisor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Coordinator for process teardown.
///
/// Carries the quitting flag every recovery path checks first, plus a
/// broadcast channel that long-running tasks subscribe to. Clones share state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Set once teardown starts; never cleared.
    quitting: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            quitting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Mark the process as quitting and wake every subscriber.
    ///
    /// Returns false when teardown had already started.
    pub fn trigger(&self) -> bool {
        let first = !self.quitting.swap(true, Ordering::SeqCst);
        let _ = self.tx.send(());
        first
    }

    /// Whether teardown has started.
    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_sets_flag_and_notifies() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let clone = shutdown.clone();

        assert!(!clone.is_quitting());
        assert!(shutdown.trigger());
        assert!(clone.is_quitting());
        assert!(rx.recv().await.is_ok());

        assert!(!clone.trigger());
    }
}
