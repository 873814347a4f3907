//! Services module - the infrastructure pieces the environment is built from.
//!
//! # Components
//!
//! - [`PathResolver`]: Memoized well-known locations, derived from a [`PlatformPaths`] layout
//! - [`DirectoryBootstrapper`]: Idempotent creation of the required directory tree
//! - [`SharedClient`]: The single process-wide outbound HTTP client
//! - [`MainThreadQueue`]: Closures posted from workers, drained on the main thread
//!
//! None of these own global state; the [`Environment`](crate::Environment)
//! constructs one of each and hands out references.

pub mod directories;
pub mod dispatch;
pub mod http;
pub mod paths;

pub use directories::{DirectoryBootstrapper, REQUIRED_DIRECTORIES, ensure};
pub use dispatch::{MainThreadHandle, MainThreadQueue};
pub use http::{ClientConfig, SharedClient};
pub use paths::{PathResolver, PlatformPaths};
