//! Pipeline configuration.
//!
//! [`ReleaseConfig`] is assembled once from [`Args`] (which already folded in
//! the environment) and handed to every stage. Tokens for optional
//! destinations stay `Option`al: an absent token skips that destination
//! rather than failing the run.

use crate::cli::Args;
use crate::error::{ReleaseError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the stable channel.
pub const STABLE_CHANNEL: &str = "Stable";

/// Timeout for cloud drive uploads.
pub const DRIVE_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for every other API request.
pub const API_TIMEOUT: Duration = Duration::from_secs(60);

/// A release track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel(String);

impl Channel {
    /// Creates a channel from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The stable channel.
    pub fn stable() -> Self {
        Self::new(STABLE_CHANNEL)
    }

    /// Channel name as used in tags and version strings.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the stable channel. Any other channel is a pre-release.
    pub fn is_stable(&self) -> bool {
        self.0 == STABLE_CHANNEL
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format of the manifest `log` field.
///
/// Parsed by clap, case-insensitively, from `--log-format` or `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Keep the Markdown changelog as-is
    #[default]
    #[value(alias = "md")]
    Markdown,
    /// Convert the changelog to HTML
    Html,
}

/// Signing inputs for apksigner.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Android SDK root (`ANDROID_HOME`)
    pub android_home: Option<PathBuf>,
    /// build-tools version that ships apksigner
    pub build_tools_version: String,
    /// Absolute keystore path
    pub keystore: PathBuf,
    /// Key alias
    pub alias: Option<String>,
    /// Keystore and key password
    pub password: Option<String>,
}

/// GitHub Releases destination.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST API base URL
    pub api_url: String,
    /// `owner/repo`
    pub repo: Option<String>,
    /// API token
    pub token: Option<String>,
}

/// Cloud drive mirror destination.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Drive base URL
    pub base_url: String,
    /// Drive token, mirror skipped when absent
    pub token: Option<String>,
    /// Directory holding one folder per channel
    pub root: String,
    /// Public browse URL of `root`
    pub public_url: Option<String>,
}

/// Forum destination.
#[derive(Debug, Clone)]
pub struct ForumConfig {
    /// Forum base URL
    pub base_url: String,
    /// API key, forum post skipped when absent
    pub api_key: Option<String>,
    /// User the post is made as
    pub username: String,
    /// Category id
    pub category: u64,
}

/// Telegram destination.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API base URL
    pub api_url: String,
    /// Bot token, Telegram skipped when absent
    pub token: Option<String>,
    /// Chat that archives every APK
    pub archive_chat: Option<String>,
    /// Chat that receives the announcement
    pub broadcast_chat: Option<String>,
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// Release channel
    pub channel: Channel,
    /// Android project root
    pub workspace: PathBuf,
    /// Build variant (product flavor)
    pub variant: String,
    /// Absolute path of the build descriptor
    pub descriptor: PathBuf,
    /// Absolute path of the category mapping
    pub categories: PathBuf,
    /// Manifest `log` field format
    pub log_format: LogFormat,
    /// Whether to create and push a git tag after the build
    pub create_tag: bool,
    /// Gradle task that prints the version code
    pub version_code_task: Option<String>,
    /// Path prefixes whose change requires a restart notice
    pub restart_paths: Vec<String>,
    /// apksigner inputs
    pub signing: SigningConfig,
    /// GitHub Releases
    pub github: GithubConfig,
    /// Cloud drive mirror
    pub drive: DriveConfig,
    /// Forum
    pub forum: ForumConfig,
    /// Telegram
    pub telegram: TelegramConfig,
}

impl ReleaseConfig {
    /// Builds the configuration from parsed arguments.
    ///
    /// Relative paths are resolved against the workspace, which itself
    /// defaults to the current directory.
    pub fn from_args(args: &Args) -> Result<Self> {
        let workspace = match &args.workspace {
            Some(path) => path.clone(),
            None => std::env::current_dir()?,
        };
        Ok(Self {
            channel: Channel::new(args.channel.trim()),
            variant: args.variant.clone(),
            descriptor: resolve(&workspace, &args.descriptor),
            categories: resolve(&workspace, &args.categories),
            log_format: args.log_format,
            create_tag: args.create_tag,
            version_code_task: args.version_code_task.clone(),
            restart_paths: args
                .restart_paths
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            signing: SigningConfig {
                android_home: args.android_home.clone(),
                build_tools_version: args.build_tools_version.clone(),
                keystore: resolve(&workspace, &args.keystore),
                alias: args.sign_alias.clone(),
                password: args.sign_password.clone(),
            },
            github: GithubConfig {
                api_url: args.github_api.clone(),
                repo: args.repo.clone(),
                token: non_empty(&args.github_token),
            },
            drive: DriveConfig {
                base_url: args.drive_url.clone(),
                token: non_empty(&args.drive_token),
                root: args.drive_root.clone(),
                public_url: non_empty(&args.drive_public_url),
            },
            forum: ForumConfig {
                base_url: args.forum_url.clone(),
                api_key: non_empty(&args.forum_api_key),
                username: args.forum_username.clone(),
                category: args.forum_category,
            },
            telegram: TelegramConfig {
                api_url: args.telegram_api.clone(),
                token: non_empty(&args.telegram_token),
                archive_chat: non_empty(&args.telegram_archive_chat),
                broadcast_chat: non_empty(&args.telegram_chat),
            },
            workspace,
        })
    }

    /// Directory receiving the manifest, changelog and APKs.
    pub fn dist_dir(&self) -> PathBuf {
        self.workspace.join("dist")
    }

    /// Checks the values that are fatal when missing, before anything is built.
    pub fn require_publish_credentials(&self) -> Result<(&str, &str)> {
        let token = self.github.token.as_deref().ok_or(ReleaseError::MissingConfig {
            name: "GitHub token",
            env: "GITHUB_TOKEN",
        })?;
        let repo = self.github.repo.as_deref().ok_or(ReleaseError::MissingConfig {
            name: "GitHub repository",
            env: "GITHUB_REPOSITORY",
        })?;
        Ok((token, repo))
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
