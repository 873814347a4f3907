use crate::config::{LoadedSettings, RuntimeOptions, SettingsSource, SettingsStore};
use crate::error::{EnvError, Result};
use crate::metrics::Metrics;
use crate::models::SettingsDocument;
use crate::services::{
    ClientConfig, DirectoryBootstrapper, MainThreadHandle, MainThreadQueue, PathResolver,
    PlatformPaths, SharedClient, ensure,
};
use crate::state::{
    LifecycleEvent, LifecycleEvents, LifecycleState, ManagedResource, ShutdownCoordinator,
    ShutdownOutcome, ShutdownSignal, ShutdownToken,
};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::sync::broadcast;

/// Creates the native media backend. Only called on layouts that support it.
pub type MediaFactory =
    Box<dyn FnOnce(&PathResolver) -> anyhow::Result<Box<dyn ManagedResource>> + Send>;

/// Scheduling priority label recorded for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPriority {
    Normal,
    AboveNormal,
}

/// Priority the main thread is expected to run at
pub const THREAD_PRIORITY_MAIN: ThreadPriority = ThreadPriority::Normal;
/// Priority for dedicated I/O threads
pub const THREAD_PRIORITY_IO: ThreadPriority = ThreadPriority::AboveNormal;

/// Identity of the thread that ran [`Environment::init`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainThreadInfo {
    pub id: ThreadId,
    pub name: String,
    pub priority: ThreadPriority,
}

/// What the host is running the environment for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RunMode {
    #[default]
    Play = 0,
    View = 1,
}

/// Builder for [`Environment`].
pub struct EnvironmentBuilder {
    app_name: String,
    version: String,
    platform: Option<PlatformPaths>,
    options: RuntimeOptions,
    media_factory: Option<MediaFactory>,
    peripherals: Vec<Box<dyn ManagedResource>>,
}

impl EnvironmentBuilder {
    /// Use an explicit layout instead of [`PlatformPaths::detect`]
    pub fn platform(mut self, platform: PlatformPaths) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn media_backend<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&PathResolver) -> anyhow::Result<Box<dyn ManagedResource>> + Send + 'static,
    {
        self.media_factory = Some(Box::new(factory));
        self
    }

    /// Register an exclusively held device, released last at shutdown
    pub fn peripheral(mut self, resource: Box<dyn ManagedResource>) -> Self {
        self.peripherals.push(resource);
        self
    }

    /// Construct the environment. No filesystem access happens here.
    pub fn build(self) -> Result<Environment> {
        let platform = match self.platform {
            Some(platform) => platform,
            None => PlatformPaths::detect(&self.app_name)?,
        }
        .with_overrides(self.options.root_override(), self.options.cache_override());

        let metrics = Arc::new(Metrics::new());
        let client_config = ClientConfig::new(&self.options.user_agent_product, &self.version);
        let client = SharedClient::new(&client_config, metrics.clone())?;

        let events = LifecycleEvents::new();
        let coordinator = ShutdownCoordinator::new(
            ShutdownSignal::new(),
            client.clone(),
            events.clone(),
            metrics.clone(),
        );
        for peripheral in self.peripherals {
            coordinator.add_peripheral(peripheral);
        }

        Ok(Environment {
            app_name: self.app_name,
            version: self.version,
            paths: PathResolver::new(platform),
            options: self.options,
            settings: ArcSwap::from_pointee(SettingsDocument::default()),
            settings_source: OnceLock::new(),
            client,
            coordinator,
            events,
            queue: MainThreadQueue::new(),
            media_factory: Mutex::new(self.media_factory),
            main_thread: OnceLock::new(),
            mode: AtomicU8::new(RunMode::default() as u8),
            initialized: AtomicBool::new(false),
            metrics,
        })
    }
}

/// The process environment: paths, settings, shared HTTP client and the
/// shutdown sequence, with an explicit `init`/quit lifecycle.
///
/// Construct one at startup, call [`init`](Self::init) on the main thread,
/// then share it by reference (or `Arc`). After `init` every accessor is a
/// lock-free read.
pub struct Environment {
    app_name: String,
    version: String,
    paths: PathResolver,
    options: RuntimeOptions,
    settings: ArcSwap<SettingsDocument>,
    settings_source: OnceLock<SettingsSource>,
    client: SharedClient,
    coordinator: ShutdownCoordinator,
    events: LifecycleEvents,
    queue: MainThreadQueue,
    media_factory: Mutex<Option<MediaFactory>>,
    main_thread: OnceLock<MainThreadInfo>,
    mode: AtomicU8,
    initialized: AtomicBool,
    metrics: Arc<Metrics>,
}

impl Environment {
    pub fn builder(app_name: impl Into<String>, version: impl Into<String>) -> EnvironmentBuilder {
        EnvironmentBuilder {
            app_name: app_name.into(),
            version: version.into(),
            platform: None,
            options: RuntimeOptions::default(),
            media_factory: None,
            peripherals: Vec::new(),
        }
    }

    /// Prepare the environment for the rest of the process.
    ///
    /// Starts the media backend where supported, creates the directory tree,
    /// loads and normalizes settings, applies the configured HTTP timeout and
    /// records the calling thread as the main thread.
    ///
    /// # Errors
    /// - [`EnvError::AlreadyInitialized`] on a second call
    /// - directory creation or first-run settings write failures
    pub fn init(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(EnvError::AlreadyInitialized);
        }
        tracing::info!("Initializing {} v{} at {}", self.app_name, self.version, self.paths.root());

        self.start_media_backend();

        ensure(self.paths.skins())?;
        DirectoryBootstrapper::new(&self.paths).ensure_all()?;

        let LoadedSettings {
            mut document,
            source,
        } = SettingsStore::new(self.paths.settings()).load()?;
        document.normalize();
        self.settings.store(Arc::new(document));
        let _ = self.settings_source.set(source);

        self.client
            .reconfigure(Duration::from_millis(self.options.http_timeout_ms));

        let info = record_main_thread();
        tracing::info!(
            "Main thread: {} ({:?}, priority {:?})",
            info.name,
            info.id,
            info.priority
        );
        let _ = self.main_thread.set(info);

        self.events.emit(LifecycleEvent::Initialized);
        Ok(())
    }

    fn start_media_backend(&self) {
        let factory = self
            .media_factory
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let Some(factory) = factory else {
            return;
        };

        if !self.paths.platform().supports_native_media() {
            tracing::info!("Native media backend not supported on this platform, skipping");
            return;
        }

        match factory(&self.paths) {
            Ok(backend) => {
                tracing::info!("Media backend '{}' started", backend.name());
                self.coordinator.set_media_backend(backend);
            }
            Err(e) => tracing::error!("Failed to start media backend: {:#}", e),
        }
    }

    /// Host hook for process exit. Runs the teardown at most once.
    pub fn on_application_quit_requested(&self) -> ShutdownOutcome {
        self.coordinator.request_shutdown()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Current settings snapshot; defaults until `init` has loaded the file
    pub fn settings(&self) -> Arc<SettingsDocument> {
        self.settings.load_full()
    }

    /// How the settings were obtained, once `init` has run
    pub fn settings_source(&self) -> Option<&SettingsSource> {
        self.settings_source.get()
    }

    pub fn client(&self) -> &SharedClient {
        &self.client
    }

    /// Read-only handle to the global cancellation signal
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.coordinator.token()
    }

    /// See [`ShutdownCoordinator::on_quit`]
    pub fn on_quit<F>(&self, observer: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.coordinator.on_quit(observer)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.coordinator.state()
    }

    pub fn has_media_backend(&self) -> bool {
        self.coordinator.has_media_backend()
    }

    pub fn main_thread(&self) -> Option<&MainThreadInfo> {
        self.main_thread.get()
    }

    pub fn is_main_thread(&self) -> bool {
        self.main_thread
            .get()
            .is_some_and(|info| info.id == thread::current().id())
    }

    pub fn main_thread_handle(&self) -> MainThreadHandle {
        self.queue.handle()
    }

    /// Run jobs posted through [`main_thread_handle`](Self::main_thread_handle)
    pub fn drain_main_thread_queue(&self) -> usize {
        self.queue.drain()
    }

    pub fn run_mode(&self) -> RunMode {
        match self.mode.load(Ordering::Acquire) {
            1 => RunMode::View,
            _ => RunMode::Play,
        }
    }

    pub fn set_run_mode(&self, mode: RunMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

fn record_main_thread() -> MainThreadInfo {
    let current = thread::current();
    MainThreadInfo {
        id: current.id(),
        name: current
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| crate::MAIN_THREAD_NAME.to_string()),
        priority: THREAD_PRIORITY_MAIN,
    }
}
