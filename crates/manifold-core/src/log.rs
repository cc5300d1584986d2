//! Logging setup for Manifold.
//!
//! Diagnostics go to stderr so that stdout stays reserved for the generated
//! manifest stream.

use manifold_types::{ManifoldError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a log filter directive.
pub const LOG_ENV: &str = "MANIFOLD_LOG";

/// Filter directive for a verbosity level.
///
/// `quiet` wins over any verbosity.
pub fn directive_for(verbosity: u8, quiet: bool) -> String {
    let level = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    format!("warn,manifold={}", level)
}

/// Initialize the logging system.
///
/// `MANIFOLD_LOG` takes precedence, then `RUST_LOG`, then `default_directive`.
pub fn init(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| ManifoldError::Config(format!("failed to initialize logging: {}", e)))
}
