//! Version computation and build descriptor patching.
//!
//! The descriptor is a Gradle Kotlin DSL file with a single
//! `versionName = "X.Y.Z"` assignment. The pipeline rewrites it to the
//! composite `X.Y.Z-<channel>.<stamp>` before building so the APK carries the
//! release version.

use crate::config::Channel;
use crate::error::{ReleaseError, Result};
use chrono::{DateTime, Datelike, Local};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Timestamp resolution of the version suffix.
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn version_name_regex() -> Result<Regex> {
    Ok(Regex::new(r#"(versionName\s*=\s*")([^"]*)(")"#)?)
}

/// Reads the `versionName` value out of descriptor text.
pub fn extract_version_name(content: &str) -> Result<Option<String>> {
    Ok(version_name_regex()?
        .captures(content)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string()))
}

/// Replaces the first `versionName` value, keeping the surrounding syntax.
pub fn replace_version_name(content: &str, new_version: &str) -> Result<String> {
    Ok(version_name_regex()?
        .replace(content, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], new_version, &caps[3])
        })
        .into_owned())
}

/// Release version of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionIdentifier {
    /// `MAJOR.MINOR.PATCH` from the descriptor
    pub base: String,
    /// Release channel
    pub channel: Channel,
    /// Build timestamp, [`STAMP_FORMAT`]
    pub stamp: String,
    /// Android version code
    pub code: u64,
}

impl VersionIdentifier {
    /// Composes the version for `channel` at `now`.
    ///
    /// Any pre-release suffix left on `base` by an earlier run is dropped so
    /// repeated runs do not stack suffixes.
    pub fn compose(base: &str, channel: &Channel, now: DateTime<Local>, code: u64) -> Result<Self> {
        let parsed = semver::Version::parse(base.trim()).map_err(|e| ReleaseError::InvalidVersion {
            version: base.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base: format!("{}.{}.{}", parsed.major, parsed.minor, parsed.patch),
            channel: channel.clone(),
            stamp: now.format(STAMP_FORMAT).to_string(),
            code,
        })
    }

    /// Name of the git tag created for this release.
    pub fn tag_name(&self) -> String {
        format!("{}.{}", self.channel, self)
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.base, self.channel, self.stamp)
    }
}

/// Version code derived from the date, `yyyy * 10000 + mm * 100 + dd`.
///
/// Same rule the descriptor uses when no explicit code is supplied.
pub fn date_version_code(now: DateTime<Local>) -> u64 {
    now.year() as u64 * 10000 + now.month() as u64 * 100 + now.day() as u64
}

/// Last line of `output` that is a plain unsigned integer.
pub fn parse_version_code(output: &str) -> Option<u64> {
    output
        .lines()
        .rev()
        .find_map(|line| line.trim().parse::<u64>().ok())
}

/// Computes the version and writes it into the build descriptor.
#[derive(Debug)]
pub struct VersionWriter {
    workspace: PathBuf,
    descriptor: PathBuf,
    version_code_task: Option<String>,
}

impl VersionWriter {
    /// Creates a writer for `descriptor` inside `workspace`.
    pub fn new(workspace: &Path, descriptor: &Path, version_code_task: Option<String>) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            descriptor: descriptor.to_path_buf(),
            version_code_task,
        }
    }

    /// Computes the new version and rewrites the descriptor in place.
    ///
    /// This modifies a tracked file; tagging must wait until the build has
    /// succeeded.
    pub async fn apply(&self, channel: &Channel, now: DateTime<Local>) -> Result<VersionIdentifier> {
        let content = tokio::fs::read_to_string(&self.descriptor).await.map_err(|e| {
            ReleaseError::execution(
                "read_build_descriptor",
                format!("Failed to read {}: {}", self.descriptor.display(), e),
            )
        })?;

        let base = extract_version_name(&content)?.ok_or_else(|| ReleaseError::MissingVersionName {
            path: self.descriptor.clone(),
        })?;
        log::info!("Base versionName: {}", base);

        let code = self.version_code(now).await;
        let version = VersionIdentifier::compose(&base, channel, now, code)?;

        let updated = replace_version_name(&content, &version.to_string())?;
        tokio::fs::write(&self.descriptor, updated).await?;
        log::info!("✓ Wrote versionName {} ({})", version, version.code);

        Ok(version)
    }

    /// Asks Gradle for the version code, falling back to the date rule.
    async fn version_code(&self, now: DateTime<Local>) -> u64 {
        let Some(task) = &self.version_code_task else {
            return date_version_code(now);
        };

        let gradlew = self.workspace.join("gradlew");
        let output = Command::new(&gradlew)
            .args(["-q", task.as_str()])
            .current_dir(&self.workspace)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                match parse_version_code(&String::from_utf8_lossy(&out.stdout)) {
                    Some(code) => return code,
                    None => log::warn!("Gradle task {} printed no version code", task),
                }
            }
            Ok(out) => log::warn!(
                "Gradle task {} failed (exit code {:?}), using date-derived version code",
                task,
                out.status.code()
            ),
            Err(e) => log::warn!("Could not run {}: {}", gradlew.display(), e),
        }
        date_version_code(now)
    }
}
