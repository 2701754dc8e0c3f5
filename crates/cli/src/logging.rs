use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// sqlx logs every statement at info level
const DEFAULT_FILTER: &str = "info,sqlx=warn";
const VERBOSE_FILTER: &str = "debug,sqlx=warn";

/// Install the stderr subscriber. `RUST_LOG` wins unless `verbose` is set.
pub fn init(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_new(VERBOSE_FILTER)?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
