use super::{LifecycleEvent, LifecycleEvents, LifecycleState, ShutdownSignal, ShutdownToken};
use crate::metrics::Metrics;
use crate::services::SharedClient;
use anyhow::{Result, anyhow};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const STOPPED: u8 = 2;

/// An externally created resource the environment disposes at shutdown
/// (media backend, exclusively held input devices).
#[cfg_attr(test, mockall::automock)]
pub trait ManagedResource: Send + Sync {
    fn name(&self) -> &'static str;

    fn release(&self) -> Result<()>;
}

type QuitObserver = Box<dyn FnOnce() + Send>;

/// Teardown steps in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    HttpClient,
    MediaBackend,
    CancelSignal,
    QuitObservers,
    Peripherals,
}

impl TeardownStep {
    pub const ORDER: [TeardownStep; 5] = [
        TeardownStep::HttpClient,
        TeardownStep::MediaBackend,
        TeardownStep::CancelSignal,
        TeardownStep::QuitObservers,
        TeardownStep::Peripherals,
    ];
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeardownStep::HttpClient => "http client",
            TeardownStep::MediaBackend => "media backend",
            TeardownStep::CancelSignal => "cancel signal",
            TeardownStep::QuitObservers => "quit observers",
            TeardownStep::Peripherals => "peripherals",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: TeardownStep,
    /// Error message when the step failed
    pub error: Option<String>,
}

/// Outcome of every teardown step of one shutdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownReport {
    pub steps: Vec<StepReport>,
}

impl ShutdownReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownOutcome {
    /// This call ran the teardown
    Completed(ShutdownReport),
    /// Another call already started (or finished) the teardown
    AlreadyRequested,
}

/// Runs the process teardown exactly once.
///
/// The first [`request_shutdown`](Self::request_shutdown) wins a
/// compare-exchange on the lifecycle state and executes every
/// [`TeardownStep`] in order. A failing (or panicking) step is logged and
/// recorded in the report; the remaining steps still run and the state always
/// ends at [`LifecycleState::Stopped`]. Any other caller, concurrent or later,
/// returns [`ShutdownOutcome::AlreadyRequested`] without waiting.
///
/// The cancellation signal is set before quit observers run, so an observer
/// reading the token always sees it cancelled.
pub struct ShutdownCoordinator {
    state: AtomicU8,
    signal: ShutdownSignal,
    client: SharedClient,
    media: Mutex<Option<Box<dyn ManagedResource>>>,
    observers: Mutex<Vec<QuitObserver>>,
    peripherals: Mutex<Vec<Box<dyn ManagedResource>>>,
    events: LifecycleEvents,
    metrics: Arc<Metrics>,
}

impl ShutdownCoordinator {
    pub fn new(
        signal: ShutdownSignal,
        client: SharedClient,
        events: LifecycleEvents,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            signal,
            client,
            media: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            peripherals: Mutex::new(Vec::new()),
            events,
            metrics,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => LifecycleState::Running,
            SHUTTING_DOWN => LifecycleState::ShuttingDown,
            _ => LifecycleState::Stopped,
        }
    }

    pub fn token(&self) -> ShutdownToken {
        self.signal.token()
    }

    /// Install the media backend, replacing (and releasing) any previous one
    pub fn set_media_backend(&self, backend: Box<dyn ManagedResource>) {
        if let Some(previous) = lock(&self.media).replace(backend) {
            if let Err(e) = previous.release() {
                tracing::warn!("Failed to release media backend {}: {:#}", previous.name(), e);
            }
        }
    }

    pub fn has_media_backend(&self) -> bool {
        lock(&self.media).is_some()
    }

    pub fn add_peripheral(&self, resource: Box<dyn ManagedResource>) {
        lock(&self.peripherals).push(resource);
    }

    /// Register a last-chance callback, run once during shutdown in
    /// registration order.
    ///
    /// # Returns
    /// `false` (and drops the callback) if shutdown has already started
    pub fn on_quit<F>(&self, observer: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        // Checked under the lock so a concurrent teardown cannot miss it
        let mut observers = lock(&self.observers);
        if self.state() != LifecycleState::Running {
            tracing::warn!("Quit observer registered after shutdown started; ignored");
            return false;
        }
        observers.push(Box::new(observer));
        true
    }

    pub fn request_shutdown(&self) -> ShutdownOutcome {
        if self
            .state
            .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Shutdown already requested");
            return ShutdownOutcome::AlreadyRequested;
        }

        tracing::info!("Shutdown requested");
        self.events.emit(LifecycleEvent::ShutdownStarted);

        let mut report = ShutdownReport::default();
        for step in TeardownStep::ORDER {
            let result = catch_unwind(AssertUnwindSafe(|| self.run_step(step)))
                .unwrap_or_else(|panic| Err(anyhow!("panicked: {}", panic_message(&*panic))));

            let error = match result {
                Ok(()) => {
                    tracing::debug!("Teardown step '{}' done", step);
                    None
                }
                Err(e) => {
                    tracing::error!("Teardown step '{}' failed: {:#}", step, e);
                    self.metrics.record_teardown_failure();
                    Some(format!("{:#}", e))
                }
            };
            report.steps.push(StepReport { step, error });
        }

        self.state.store(STOPPED, Ordering::Release);
        let failures = report.failures().count();
        self.events
            .emit(LifecycleEvent::ShutdownCompleted { failures });
        self.metrics.log_summary();
        tracing::info!("Shutdown complete ({} failed steps)", failures);

        ShutdownOutcome::Completed(report)
    }

    fn run_step(&self, step: TeardownStep) -> Result<()> {
        match step {
            TeardownStep::HttpClient => {
                self.client.shutdown_now();
                Ok(())
            }
            TeardownStep::MediaBackend => {
                let backend = lock(&self.media).take();
                match backend {
                    Some(backend) => backend
                        .release()
                        .map_err(|e| e.context(format!("releasing {}", backend.name()))),
                    None => Ok(()),
                }
            }
            TeardownStep::CancelSignal => {
                self.signal.cancel();
                Ok(())
            }
            TeardownStep::QuitObservers => {
                let observers = std::mem::take(&mut *lock(&self.observers));
                let mut failed = 0;
                for (index, observer) in observers.into_iter().enumerate() {
                    self.metrics.record_quit_observer();
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(observer)) {
                        tracing::error!(
                            "Quit observer #{} panicked: {}",
                            index,
                            panic_message(&*panic)
                        );
                        failed += 1;
                    }
                }
                if failed > 0 {
                    Err(anyhow!("{} quit observer(s) panicked", failed))
                } else {
                    Ok(())
                }
            }
            TeardownStep::Peripherals => {
                let peripherals = std::mem::take(&mut *lock(&self.peripherals));
                let errors: Vec<String> = peripherals
                    .iter()
                    .filter_map(|p| p.release().err().map(|e| format!("{}: {:#}", p.name(), e)))
                    .collect();
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(anyhow!(errors.join("; ")))
                }
            }
        }
    }
}

/// Lock ignoring poisoning; teardown must proceed even after a panic elsewhere
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ClientConfig;
    use mockall::Sequence;
    use std::sync::atomic::AtomicUsize;

    fn coordinator() -> ShutdownCoordinator {
        let metrics = Arc::new(Metrics::new());
        let client = SharedClient::new(&ClientConfig::new("Test", "0.0.0"), metrics.clone()).unwrap();
        ShutdownCoordinator::new(ShutdownSignal::new(), client, LifecycleEvents::new(), metrics)
    }

    fn completed(outcome: ShutdownOutcome) -> ShutdownReport {
        match outcome {
            ShutdownOutcome::Completed(report) => report,
            ShutdownOutcome::AlreadyRequested => panic!("expected the first shutdown"),
        }
    }

    #[test]
    fn test_steps_run_in_order() {
        let report = completed(coordinator().request_shutdown());

        let steps: Vec<_> = report.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, TeardownStep::ORDER.to_vec());
        assert!(report.is_clean());
    }

    #[test]
    fn test_second_request_is_noop() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        coordinator.on_quit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        completed(coordinator.request_shutdown());
        assert_eq!(coordinator.request_shutdown(), ShutdownOutcome::AlreadyRequested);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
        assert!(coordinator.token().is_cancelled());
    }

    #[test]
    fn test_observers_see_cancelled_token() {
        let coordinator = coordinator();
        let token = coordinator.token();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        coordinator.on_quit(move || {
            *slot.lock().unwrap() = Some(token.is_cancelled());
        });

        coordinator.request_shutdown();

        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let coordinator = coordinator();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = order.clone();
            coordinator.on_quit(move || order.lock().unwrap().push(i));
        }

        coordinator.request_shutdown();

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_panicking_observer_does_not_stop_teardown() {
        let coordinator = coordinator();
        let after = Arc::new(AtomicUsize::new(0));
        let counter = after.clone();
        coordinator.on_quit(|| panic!("observer blew up"));
        coordinator.on_quit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let report = completed(coordinator.request_shutdown());

        assert_eq!(after.load(Ordering::SeqCst), 1);
        let failures: Vec<_> = report.failures().map(|s| s.step).collect();
        assert_eq!(failures, vec![TeardownStep::QuitObservers]);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_media_failure_is_reported_and_later_steps_run() {
        let coordinator = coordinator();
        let mut media = MockManagedResource::new();
        media.expect_name().return_const("vlc");
        media
            .expect_release()
            .times(1)
            .returning(|| Err(anyhow!("device busy")));
        coordinator.set_media_backend(Box::new(media));

        let mut device = MockManagedResource::new();
        device.expect_name().return_const("hid");
        device.expect_release().times(1).returning(|| Ok(()));
        coordinator.add_peripheral(Box::new(device));

        let report = completed(coordinator.request_shutdown());

        let media_step = &report.steps[1];
        assert_eq!(media_step.step, TeardownStep::MediaBackend);
        assert!(media_step.error.as_deref().unwrap().contains("device busy"));
        assert!(report.steps[4].error.is_none());
        assert!(coordinator.token().is_cancelled());
    }

    #[test]
    fn test_media_released_before_peripherals() {
        let coordinator = coordinator();
        let mut seq = Sequence::new();

        let mut media = MockManagedResource::new();
        media.expect_name().return_const("media");
        media
            .expect_release()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let mut device = MockManagedResource::new();
        device.expect_name().return_const("device");
        device
            .expect_release()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        coordinator.set_media_backend(Box::new(media));
        coordinator.add_peripheral(Box::new(device));

        assert!(completed(coordinator.request_shutdown()).is_clean());
    }

    #[test]
    fn test_on_quit_after_shutdown_is_rejected() {
        let coordinator = coordinator();
        coordinator.request_shutdown();
        assert!(!coordinator.on_quit(|| {}));
    }

    #[test]
    fn test_concurrent_requests_run_once() {
        let coordinator = Arc::new(coordinator());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        coordinator.on_quit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                std::thread::spawn(move || coordinator.request_shutdown())
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, ShutdownOutcome::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
