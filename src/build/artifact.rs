//! Build artifact discovery.

use crate::error::{ReleaseError, Result};
use std::path::{Path, PathBuf};

/// Extension of the artifacts Gradle produces.
pub const APK_EXTENSION: &str = "apk";

/// Directory Gradle writes `variant` release APKs to.
pub fn output_dir(workspace: &Path, variant: &str) -> PathBuf {
    workspace
        .join("app")
        .join("build")
        .join("outputs")
        .join("apk")
        .join(variant)
        .join("release")
}

/// File name Gradle gives the APK, from `archivesBaseName = app-<name>(<code>)`.
pub fn expected_file_name(version_name: &str, version_code: u64, variant: &str) -> String {
    format!("app-{}({})-{}-release.{}", version_name, version_code, variant, APK_EXTENSION)
}

/// Finds the built APK in `dir`.
///
/// Looks for `expected_name` first. If Gradle named the file differently,
/// falls back to the first `.apk` under `dir` in path order and warns when
/// that choice was ambiguous.
pub fn locate_artifact(dir: &Path, expected_name: &str) -> Result<PathBuf> {
    let expected = dir.join(expected_name);
    if expected.is_file() {
        log::info!("✓ Found artifact {}", expected.display());
        return Ok(expected);
    }
    log::warn!(
        "Expected artifact {} not found, scanning {}",
        expected_name,
        dir.display()
    );

    let mut candidates: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(APK_EXTENSION))
        })
        .collect();
    candidates.sort();

    match candidates.as_slice() {
        [] => Err(ReleaseError::ArtifactNotFound {
            dir: dir.to_path_buf(),
        }),
        [only] => Ok(only.clone()),
        [first, rest @ ..] => {
            log::warn!(
                "{} APK candidates in {}, using {} (also found: {})",
                rest.len() + 1,
                dir.display(),
                first.display(),
                rest.iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Ok(first.clone())
        }
    }
}

/// Path of the signed copy of `unsigned`: `<stem>-signed.apk`.
pub fn signed_path(unsigned: &Path) -> PathBuf {
    let stem = unsigned
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    unsigned.with_file_name(format!("{}-signed.{}", stem, APK_EXTENSION))
}
