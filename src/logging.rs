//! Console logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for CLI runs.
///
/// `RUST_LOG` overrides the default `featurepipe=info` filter.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("featurepipe=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
