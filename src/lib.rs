//! Release pipeline for an Android application.
//!
//! One run resolves the last release tag of a channel, turns the emoji-coded
//! commits since then into a categorized changelog, stamps a new version into
//! the Gradle descriptor, builds and signs the APK, publishes it to GitHub
//! Releases and a cloud drive mirror, and announces it on the forum and
//! Telegram.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod http;
pub mod notify;
pub mod pipeline;
pub mod publish;
pub mod release;

// Re-export commonly used types
pub use config::{Channel, ReleaseConfig};
pub use error::{CliError, ReleaseError, Result};
pub use pipeline::{Pipeline, PipelineOutcome};
