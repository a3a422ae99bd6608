//! Opt-in tracing subscriber setup.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive, e.g. `CASK_LOG=cask=debug`.
pub const LOG_ENV: &str = "CASK_LOG";

/// Install a global fmt subscriber filtered by `CASK_LOG` (default `warn`).
///
/// Returns false when a global subscriber is already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
