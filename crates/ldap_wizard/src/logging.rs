use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::WizardError;

pub const DEFAULT_FILTER: &str = "info";

/// Filter from `RUST_LOG`, else the configured directive, else `info`.
pub fn filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// command output.
pub fn init(configured: Option<&str>) -> Result<(), WizardError> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter(configured));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| WizardError::Logging(e.to_string()))
}
