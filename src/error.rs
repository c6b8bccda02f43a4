//! Error types for release pipeline operations.
//!
//! Errors are split the same way the pipeline splits its stages: anything that
//! surfaces as a [`ReleaseError`] from a pre-publish stage is fatal, while the
//! mirror and notification stages log their errors and degrade instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// CLI argument and subprocess errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid endpoint URLs
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid tag pattern
    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// A required configuration value is absent
    #[error("Missing configuration: {name} (set {env})")]
    MissingConfig {
        /// Configuration field
        name: &'static str,
        /// Environment variable that supplies it
        env: &'static str,
    },

    /// The build descriptor has no version name assignment
    #[error("No versionName assignment found in {}", path.display())]
    MissingVersionName {
        /// Descriptor path
        path: PathBuf,
    },

    /// The base version in the descriptor is not `MAJOR.MINOR.PATCH`
    #[error("Invalid base version '{version}': {reason}")]
    InvalidVersion {
        /// Raw version text
        version: String,
        /// Parser message
        reason: String,
    },

    /// Gradle or the signer exited with a non-zero status
    #[error("Build step failed: {command} (exit code {code:?})")]
    BuildFailed {
        /// Command line that failed
        command: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },

    /// No APK could be found after the fallback scan
    #[error("No build artifact found under {}", dir.display())]
    ArtifactNotFound {
        /// Directory that was scanned
        dir: PathBuf,
    },

    /// A remote API answered with an unexpected status
    #[error("{service} returned {status}: {body}")]
    Api {
        /// Remote service name
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Shorthand for a failed subprocess invocation.
    pub fn execution(command: impl Into<String>, reason: impl Into<String>) -> Self {
        ReleaseError::Cli(CliError::ExecutionFailed {
            command: command.into(),
            reason: reason.into(),
        })
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Only connection failures and timeouts count; HTTP error statuses and
    /// local IO problems are permanent for the purpose of retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ReleaseError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Whether the request failed before reaching the server.
    ///
    /// Stricter than [`is_transient`](Self::is_transient): a timed-out
    /// request may already have taken effect, so non-idempotent calls
    /// (creating a release, posting an announcement) only retry on this.
    pub fn is_undelivered(&self) -> bool {
        matches!(self, ReleaseError::Http(e) if e.is_connect())
    }
}
