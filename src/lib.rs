// stagenv - process environment manager
//
// Library crate: path resolution, settings persistence, the shared HTTP
// client and the global shutdown sequence. The binary crate (main.rs) is a
// minimal host that drives the lifecycle.

use std::time::Duration;

pub mod config;
pub mod environment;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{LoadedSettings, RuntimeOptions, SettingsSource, SettingsStore};
pub use environment::{Environment, EnvironmentBuilder, RunMode};
pub use error::{EnvError, Result};
pub use models::{Location, SettingsDocument};
pub use services::{PathResolver, PlatformPaths, SharedClient};
pub use state::{ShutdownCoordinator, ShutdownOutcome, ShutdownSignal, ShutdownToken};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Default product token of the shared client's `User-Agent`
pub const USER_AGENT_PRODUCT: &str = "StagePlay";

/// Default timeout of the shared HTTP client
pub const HTTP_TIMEOUT: Duration = Duration::from_millis(8000);

/// Read buffer size for streamed downloads
pub const HTTP_BUFFER_SIZE: usize = 8192;

/// Upper bound for caller-side retries on the shared client
pub const HTTP_REQUEST_MAX_RETRY: u32 = 4;

/// One frame at 60 fps
pub const FRAME_LENGTH: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// File name of the runtime log inside the logs directory
pub const LOG_FILE_NAME: &str = "Runtime.log";

/// Name recorded for the main thread when it has none
pub const MAIN_THREAD_NAME: &str = "StagePlay MainThread";
