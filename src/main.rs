//! stagenv - minimal host for the process environment
//!
//! # Execution Flow
//!
//! 1. Read runtime options from `STAGENV_*` environment variables
//! 2. Build the [`Environment`] for the detected platform layout
//! 3. Initialize logging → `<root>/Logs/Runtime.log`
//! 4. `init`: directories, settings, HTTP client timeout
//! 5. Run a frame loop draining the main-thread queue until Ctrl+C
//! 6. `on_application_quit_requested`: ordered teardown, exactly once

use anyhow::{Context, Result};
use stagenv::{APP_NAME, Environment, FRAME_LENGTH, RuntimeOptions, ShutdownOutcome, VERSION};
use std::sync::Arc;

fn main() -> Result<()> {
    let options = RuntimeOptions::from_env().context("Failed to read runtime options")?;

    let env = Arc::new(
        Environment::builder(APP_NAME, VERSION)
            .options(options.clone())
            .build()
            .context("Failed to build environment")?,
    );

    let _guard = stagenv::logging::setup_logging(
        env.paths().log_file(),
        options.debug_logging,
        options.console_logging,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    env.init().context("Startup failed")?;

    let settings = env.settings();
    tracing::info!(
        "Settings: source={:?}, skin={}, language={}",
        env.settings_source(),
        settings.display.skin,
        settings.game.language
    );

    env.on_quit(|| tracing::info!("Quit observers running"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("stagenv-worker")
        .build()?;

    // Ctrl+C may arrive on a worker; quitting is safe from any thread
    let quitter = env.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            quitter.on_application_quit_requested();
        }
    });

    let token = env.shutdown_token();
    while !token.is_cancelled() {
        env.drain_main_thread_queue();
        std::thread::sleep(FRAME_LENGTH);
    }

    // A no-op when the interrupt handler already ran the teardown
    if let ShutdownOutcome::Completed(report) = env.on_application_quit_requested() {
        for failure in report.failures() {
            tracing::warn!("Teardown step {} failed: {:?}", failure.step, failure.error);
        }
    }

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Application shutdown complete");
    Ok(())
}
