// State module
//
// Process-wide lifecycle state: the global cancellation signal, lifecycle
// events for interested subsystems, and the shutdown coordinator.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};

pub mod shutdown;

pub use shutdown::{
    ManagedResource, ShutdownCoordinator, ShutdownOutcome, ShutdownReport, StepReport,
    TeardownStep,
};

/// Owner side of a cancellation flag.
///
/// Cancellation is monotonic: once set it never clears, and setting it again
/// is a no-op. Consumers get a read-only [`ShutdownToken`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Derive a read-only token
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Set the flag.
    ///
    /// # Returns
    /// `true` for the call that actually flipped it, `false` afterwards
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`ShutdownSignal`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal is cancelled.
    ///
    /// Also resolves if the owning signal is dropped, since nothing can
    /// cancel it afterwards.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Lifecycle states of an [`Environment`](crate::Environment)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Events broadcast at lifecycle transitions
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// `init` finished
    Initialized,
    /// Teardown has begun
    ShutdownStarted,
    /// Teardown finished; `failures` steps reported an error
    ShutdownCompleted { failures: usize },
}

/// Broadcast channel for [`LifecycleEvent`]s.
///
/// Sending never fails the caller; it is fine if nobody is listening.
#[derive(Debug, Clone)]
pub struct LifecycleEvents {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        tracing::debug!("Lifecycle event: {:?}", event);
        let _ = self.tx.send(event);
    }
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self::new()
    }
}
