use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced by the environment manager.
///
/// Only infrastructure failures end up here. A malformed settings document is
/// recovered inside [`SettingsStore`](crate::config::SettingsStore) and never
/// becomes an `EnvError`.
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Failed to create directory {path}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read settings file {path}")]
    ReadSettings {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings file {path}")]
    WriteSettings {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    SerializeSettings(#[from] serde_json::Error),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("HTTP client has been shut down")]
    ClientShutDown,

    #[error("Request cancelled by shutdown")]
    Cancelled,

    #[error("HTTP request failed")]
    Request(#[source] reqwest::Error),

    #[error("Invalid runtime options: {0}")]
    Options(#[from] ::config::ConfigError),

    #[error("Could not determine platform base directories: {0}")]
    PlatformDirs(String),

    #[error("Environment already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, EnvError>;
