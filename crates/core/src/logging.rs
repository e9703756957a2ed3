//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,orrery=debug,orrery_renderer=debug,orrery_scene=debug";

/// Initialize the global tracing subscriber.
///
/// Filtering honours `RUST_LOG`; without it the workspace crates log at
/// `debug` and everything else at `info`.
///
/// # Example
/// ```no_run
/// orrery_core::init_logging();
/// tracing::info!("Visualizer starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .init();
}
