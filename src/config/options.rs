// Runtime options
//
// Process-level knobs read from `STAGENV_*` environment variables. These are
// not user settings and are never persisted.

use crate::error::Result;
use camino::Utf8PathBuf;
use serde::Deserialize;

/// Environment variable prefix, e.g. `STAGENV_HTTP_TIMEOUT_MS=3000`
pub const ENV_PREFIX: &str = "STAGENV";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Timeout applied to the shared HTTP client by `init`
    pub http_timeout_ms: u64,
    pub debug_logging: bool,
    pub console_logging: bool,
    /// Overrides the detected root directory
    pub root_dir: Option<String>,
    /// Overrides the detected cache directory
    pub cache_dir: Option<String>,
    /// Product token of the `User-Agent` header
    pub user_agent_product: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            http_timeout_ms: u64::try_from(crate::HTTP_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            debug_logging: false,
            console_logging: true,
            root_dir: None,
            cache_dir: None,
            user_agent_product: crate::USER_AGENT_PRODUCT.to_string(),
        }
    }
}

impl RuntimeOptions {
    /// Read options from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(::config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(source: ::config::Environment) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()?;

        let options: RuntimeOptions = settings.try_deserialize()?;
        tracing::debug!("Runtime options: {:?}", options);
        Ok(options)
    }

    pub fn root_override(&self) -> Option<Utf8PathBuf> {
        self.root_dir.as_deref().map(Utf8PathBuf::from)
    }

    pub fn cache_override(&self) -> Option<Utf8PathBuf> {
        self.cache_dir.as_deref().map(Utf8PathBuf::from)
    }
}
