//! Gradle build, artifact collection and signing.
//!
//! # Overview
//!
//! The build runner:
//! 1. Runs `gradlew assemble<Variant>Release` with live output
//! 2. Locates the APK (exact name, then directory scan)
//! 3. Copies it to `dist/app-<variant>.apk`
//! 4. Signs it into `dist/app-<variant>-signed.apk`
//! 5. Returns a [`BuildOutput`] with both paths and the signed checksum
//!
//! Any failure here is fatal: nothing is published from a partial build.
//!
//! # Module Organization
//!
//! - [`artifact`] - APK discovery and naming
//! - [`checksum`] - SHA256 of the signed artifact
//! - [`process`] - subprocess execution with streamed output
//! - [`signing`] - apksigner invocation

pub mod artifact;
pub mod checksum;
pub mod process;
pub mod signing;

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::release::VersionIdentifier;
pub use signing::ApkSigner;
use std::path::{Path, PathBuf};

/// Artifacts produced by one build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Unsigned copy in the dist directory
    pub unsigned: PathBuf,
    /// Signed APK in the dist directory
    pub signed: PathBuf,
    /// SHA-256 of the signed APK
    pub sha256: String,
}

/// Gradle task that assembles the release build of `variant`.
pub fn assemble_task(variant: &str) -> String {
    let mut chars = variant.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("assemble{}Release", capitalized)
}

/// Runs the build for one variant.
#[derive(Debug)]
pub struct BuildRunner {
    workspace: PathBuf,
    dist_dir: PathBuf,
    variant: String,
    signer: ApkSigner,
}

impl BuildRunner {
    /// Creates a runner. The signer is resolved up front so a missing SDK
    /// root fails before Gradle spends minutes building.
    pub fn new(workspace: &Path, dist_dir: &Path, variant: &str, signer: ApkSigner) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            dist_dir: dist_dir.to_path_buf(),
            variant: variant.to_string(),
            signer,
        }
    }

    /// Builds, collects and signs the APK for `version`.
    pub async fn run(
        &self,
        version: &VersionIdentifier,
        runtime_config: &RuntimeConfig,
    ) -> Result<BuildOutput> {
        let gradlew = self.workspace.join("gradlew");
        let task = assemble_task(&self.variant);
        runtime_config.progress(&format!("Building {} ({})", self.variant, task));
        process::run_streaming(&gradlew, &[task], &self.workspace, runtime_config).await?;

        let output_dir = artifact::output_dir(&self.workspace, &self.variant);
        let expected = artifact::expected_file_name(&version.to_string(), version.code, &self.variant);
        let built = artifact::locate_artifact(&output_dir, &expected)?;

        tokio::fs::create_dir_all(&self.dist_dir).await?;
        let unsigned = self
            .dist_dir
            .join(format!("app-{}.{}", self.variant, artifact::APK_EXTENSION));
        tokio::fs::copy(&built, &unsigned).await?;
        runtime_config.success(&format!("APK copied to {}", unsigned.display()));

        let signed = self.signer.sign(&unsigned, runtime_config).await?;
        let sha256 = checksum::calculate_sha256(&signed).await?;
        runtime_config.success(&format!("Signed {} (sha256 {})", signed.display(), sha256));

        Ok(BuildOutput {
            unsigned,
            signed,
            sha256,
        })
    }
}
