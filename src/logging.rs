use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "taskwatch=info";
const VERBOSE_LOG_FILTER: &str = "taskwatch=debug";

/// Initialize tracing on stderr. `RUST_LOG` overrides the default filter.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
