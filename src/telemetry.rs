//! Logging setup for the `consonance-sweep` binary.
//!
//! The library only emits `tracing` events (truncation, formula fallbacks,
//! sweep timing, config fallbacks); installing a subscriber is left to the
//! binary. Output goes to stderr so the curve on stdout stays machine-readable.

use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "consonance_sweep=info";

/// Install the global subscriber once; later calls are no-ops.
pub fn init() {
    TELEMETRY_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
            .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into()));

        // rayon workers and the sweep worker are named threads
        if let Err(err) = fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init()
        {
            eprintln!("[consonance-sweep] failed to initialise tracing subscriber: {err}");
        }
    });
}
