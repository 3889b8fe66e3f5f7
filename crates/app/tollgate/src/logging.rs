use tracing_subscriber::EnvFilter;

use crate::Error;

const DEFAULT_FILTER: &str = "info,tollgate_api=debug,tollgate_core=debug,tollgate_gateway=debug";

/// Install the global subscriber. Logs go to stderr; `RUST_LOG` overrides the
/// default filter.
pub fn init() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER));
    let filter = filter.map_err(|e| Error::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
