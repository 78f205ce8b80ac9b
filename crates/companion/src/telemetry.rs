//! Log output setup for binaries embedding the server.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "companion=info";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `companion=info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
