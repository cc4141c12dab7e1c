use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ADA_EVAL_LOG";

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Install the stderr subscriber once; later calls are no-ops.
///
/// `verbose` raises the default level from `warn` to `debug` when the
/// environment does not specify a filter.
pub fn initialize_logging(verbose: bool) {
    if INIT_GUARD.set(()).is_err() {
        return;
    }
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
