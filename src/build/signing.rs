//! APK signing with the Android SDK's apksigner.
//!
//! The keystore lives in the repository; alias and password come from the
//! environment.

use super::artifact::signed_path;
use super::process::run_streaming;
use crate::cli::RuntimeConfig;
use crate::config::SigningConfig;
use crate::error::{ReleaseError, Result};
use std::path::{Path, PathBuf};

/// apksigner invocation for one APK.
#[derive(Clone)]
pub struct ApkSigner {
    signer: PathBuf,
    keystore: PathBuf,
    alias: String,
    password: String,
}

impl std::fmt::Debug for ApkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApkSigner")
            .field("signer", &self.signer)
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ApkSigner {
    /// Resolves the signer binary and credentials.
    ///
    /// # Errors
    ///
    /// Fails when `ANDROID_HOME`, the alias or the password is missing.
    pub fn from_config(config: &SigningConfig) -> Result<Self> {
        let android_home = config.android_home.as_ref().ok_or(ReleaseError::MissingConfig {
            name: "Android SDK root",
            env: "ANDROID_HOME",
        })?;
        let alias = config.alias.clone().ok_or(ReleaseError::MissingConfig {
            name: "signing key alias",
            env: "SIGN_ALIAS",
        })?;
        let password = config.password.clone().ok_or(ReleaseError::MissingConfig {
            name: "signing password",
            env: "SIGN_PASSWORD",
        })?;

        Ok(Self {
            signer: android_home
                .join("build-tools")
                .join(&config.build_tools_version)
                .join("apksigner"),
            keystore: config.keystore.clone(),
            alias,
            password,
        })
    }

    /// apksigner arguments that sign `unsigned` into `signed`.
    pub fn sign_args(&self, unsigned: &Path, signed: &Path) -> Vec<String> {
        vec![
            "sign".to_string(),
            "--ks".to_string(),
            self.keystore.display().to_string(),
            "--ks-key-alias".to_string(),
            self.alias.clone(),
            "--ks-pass".to_string(),
            format!("pass:{}", self.password),
            "--key-pass".to_string(),
            format!("pass:{}", self.password),
            "--out".to_string(),
            signed.display().to_string(),
            unsigned.display().to_string(),
        ]
    }

    /// Signs `unsigned`, leaving it in place, and returns the signed path.
    pub async fn sign(&self, unsigned: &Path, runtime_config: &RuntimeConfig) -> Result<PathBuf> {
        let signed = signed_path(unsigned);
        let cwd = unsigned.parent().unwrap_or(Path::new("."));
        run_streaming(&self.signer, &self.sign_args(unsigned, &signed), cwd, runtime_config).await?;

        if !signed.is_file() {
            return Err(ReleaseError::ArtifactNotFound {
                dir: cwd.to_path_buf(),
            });
        }
        log::info!("✓ Signed APK: {}", signed.display());
        Ok(signed)
    }
}
