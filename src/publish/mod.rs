//! Release distribution.
//!
//! GitHub Releases is the authoritative destination: any failure there is
//! returned and stops the run. The drive mirror runs afterwards and only
//! reports how many files made it.

pub mod drive;
pub mod github;

pub use drive::{DriveMirror, MirrorFile, MirrorReport};
pub use github::{GithubPublisher, PublishedRelease};

use crate::build::BuildOutput;
use crate::cli::RuntimeConfig;
use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::http::RetryPolicy;
use crate::release::VersionIdentifier;
use crate::release::manifest::{CHANGELOG_FILE, MANIFEST_FILE};

/// What the publish stage delivered.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// GitHub release and asset
    pub github: PublishedRelease,
    /// Mirror result, `None` when no drive token is configured
    pub mirror: Option<MirrorReport>,
}

/// Publishes the signed APK, manifest and changelog.
#[derive(Debug)]
pub struct Publisher {
    github: GithubPublisher,
    drive: Option<DriveMirror>,
}

impl Publisher {
    /// Builds the destination clients from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the GitHub token or repository is missing.
    pub fn from_config(config: &ReleaseConfig, retry: RetryPolicy) -> Result<Self> {
        let (token, repo) = config.require_publish_credentials()?;
        let github = GithubPublisher::new(&config.github.api_url, repo, token, retry)?;
        let drive = match &config.drive.token {
            Some(token) => Some(DriveMirror::new(
                &config.drive.base_url,
                token,
                &config.drive.root,
                retry,
            )?),
            None => None,
        };
        Ok(Self { github, drive })
    }

    /// GitHub first (fatal on failure), then the mirror (best effort).
    pub async fn publish(
        &self,
        config: &ReleaseConfig,
        version: &VersionIdentifier,
        changelog: &str,
        build: &BuildOutput,
        runtime_config: &RuntimeConfig,
    ) -> Result<PublishReport> {
        let tag = version.to_string();
        runtime_config.progress(&format!("Creating GitHub release {}", tag));
        let github = self
            .github
            .publish(&tag, changelog, &build.signed, !config.channel.is_stable())
            .await?;
        runtime_config.success(&format!("GitHub release: {}", github.release.html_url));

        let mirror = match &self.drive {
            Some(drive) => {
                runtime_config.progress("Mirroring to cloud drive");
                let dist = config.dist_dir();
                let files = [
                    MirrorFile::new(dist.join(MANIFEST_FILE), MANIFEST_FILE),
                    MirrorFile::new(dist.join(CHANGELOG_FILE), CHANGELOG_FILE),
                    MirrorFile::new(&build.signed, format!("{}.apk", tag)),
                ];
                let report = drive.mirror(&config.channel, &files).await;
                if report.is_complete() {
                    runtime_config.success(&format!("Mirrored {} files", report));
                } else {
                    runtime_config.warn(&format!("Mirrored {} files", report));
                }
                Some(report)
            }
            None => {
                log::info!("No drive token configured, skipping mirror");
                None
            }
        };

        Ok(PublishReport { github, mirror })
    }
}
