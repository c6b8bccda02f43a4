//! Command line interface for the release pipeline.
//!
//! Parses arguments (with environment fallbacks), builds the
//! [`ReleaseConfig`], runs the pipeline and turns the outcome into an exit
//! code.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::config::ReleaseConfig;
use crate::error::{CliError, Result};
use crate::pipeline::{self, PipelineOutcome};

/// Main CLI entry point
///
/// # Returns
///
/// * `Ok(0)` - released, or nothing to release
/// * `Err(_)` - fatal error; the binary exits with code 1
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    validate_args(&args).map_err(|reason| CliError::InvalidArguments { reason })?;

    let runtime_config = create_runtime_config(&args);
    let config = ReleaseConfig::from_args(&args)?;

    match pipeline::run(&config, &runtime_config).await {
        Ok(PipelineOutcome::NothingToRelease { .. }) => Ok(0),
        Ok(PipelineOutcome::Released(summary)) => {
            if summary.is_degraded() {
                runtime_config.warn(&format!(
                    "Released {} with degraded mirror or notifications",
                    summary.version
                ));
            } else {
                runtime_config.success(&format!("Released {}", summary.version));
            }
            Ok(0)
        }
        Err(e) => {
            runtime_config.error("Release failed, nothing was published");
            Err(e)
        }
    }
}

/// Parse arguments without executing (for testing)
pub fn parse_args() -> Args {
    Args::parse_args()
}

/// Validate arguments without executing (for testing)
pub fn validate_args(args: &Args) -> std::result::Result<(), String> {
    args.validate()
}

/// Create runtime configuration from arguments
pub fn create_runtime_config(args: &Args) -> RuntimeConfig {
    RuntimeConfig::from(args)
}
