//! Tracing subscriber setup shared by the binaries.
//!
//! Diagnostics go to stderr so that the summaries the tools print on stdout
//! stay clean. `RUST_LOG` takes precedence over the configured level:
//!
//! ```text
//! RUST_LOG=cardio_prep=debug cardio-convert
//! ```

use crate::config::PipelineConfig;
use crate::error::{AppResult, PrepError};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global fmt subscriber filtered at `level`.
pub fn init(level: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| PrepError::Configuration(format!("Invalid log filter: {e}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| PrepError::Configuration(format!("Tracing already initialized: {e}")))
}

/// Installs the subscriber at the configured application log level.
pub fn init_from_config(config: &PipelineConfig) -> AppResult<()> {
    init(&config.application.log_level)
}
