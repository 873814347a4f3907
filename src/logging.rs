use anyhow::{Context, Result, anyhow};
use camino::Utf8Path;
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup logging into the fixed-name runtime log file.
///
/// The file is appended to rather than rotated; the logs directory holds one
/// file per install.
///
/// # Arguments
/// * `log_file` - Full path of the log file (e.g., `<root>/Logs/Runtime.log`)
/// * `debug_mode` - If true, use debug level; otherwise use info level
/// * `console_output` - If true, also log to console
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn setup_logging(
    log_file: &Utf8Path,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = log_file
        .parent()
        .ok_or_else(|| anyhow!("Log file has no parent directory: {}", log_file))?;
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow!("Log file has no file name: {}", log_file))?;

    // Create log directory if it doesn't exist
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }

    let file_appender = rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::info!(
        "Logging initialized: file={}, debug={}, console={}",
        log_file,
        debug_mode,
        console_output
    );

    Ok(guard)
}

/// `RUST_LOG` wins when set; otherwise [`default_level`]
fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(debug_mode)))
}

fn default_level(debug_mode: bool) -> &'static str {
    if debug_mode { "debug" } else { "info" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_setup_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let log_file = root.join("Logs").join("Runtime.log");

        // May fail if another test already installed a subscriber,
        // but the directory is created first either way
        let _ = setup_logging(&log_file, false, false);

        assert!(root.join("Logs").is_dir());
    }

    #[test]
    fn test_rejects_path_without_file_name() {
        assert!(setup_logging(Utf8Path::new("/"), false, false).is_err());
    }

    #[test]
    fn test_default_levels() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }
}
