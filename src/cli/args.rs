//! Command line argument parsing and validation.
//!
//! Every option falls back to the environment variable a CI workflow would
//! export, so the binary can run with no flags at all inside a GitHub Actions
//! job.

use crate::config::LogFormat;
use clap::Parser;
use std::path::PathBuf;

/// Release pipeline for the Android application
#[derive(Parser, Debug, Clone)]
#[command(
    name = "apk_release",
    version,
    about = "Build, sign, publish and announce an Android release",
    long_about = "Resolves the last release tag for a channel, builds a changelog from emoji-coded
commits, writes a new version into the Gradle descriptor, builds and signs the APK,
publishes it to GitHub Releases and the cloud drive mirror, then notifies the forum
and Telegram.

Usage:
  apk_release --channel Stable
  CHANNEL=Beta GITHUB_TOKEN=... apk_release --repo owner/app

Exit code 0 = released, or nothing to release. Exit code 1 = fatal error, nothing published."
)]
pub struct Args {
    /// Release channel (Stable or a pre-release channel id)
    #[arg(short, long, env = "CHANNEL", default_value = "Stable")]
    pub channel: String,

    /// Workspace root of the Android project
    #[arg(short, long, env = "GITHUB_WORKSPACE", value_name = "PATH")]
    pub workspace: Option<PathBuf>,

    /// GitHub repository (owner/repo)
    #[arg(short, long, env = "GITHUB_REPOSITORY", value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// Build variant (product flavor) to assemble
    #[arg(long, env = "BUILD_VARIANT", default_value = "xposed")]
    pub variant: String,

    /// Build descriptor holding the versionName assignment, relative to the workspace
    #[arg(long, env = "BUILD_DESCRIPTOR", default_value = "app/build.gradle.kts")]
    pub descriptor: PathBuf,

    /// Category mapping JSON, relative to the workspace
    #[arg(
        long,
        env = "CATEGORY_CONFIG",
        default_value = ".github/workflows/configuration.json"
    )]
    pub categories: PathBuf,

    /// Keystore used by apksigner, relative to the workspace
    #[arg(long, env = "SIGN_KEYSTORE", default_value = ".github/workflows/key")]
    pub keystore: PathBuf,

    /// Android SDK root
    #[arg(long, env = "ANDROID_HOME", value_name = "PATH")]
    pub android_home: Option<PathBuf>,

    /// Android build-tools version containing apksigner
    #[arg(long, env = "BUILD_TOOLS_VERSION", default_value = "29.0.3")]
    pub build_tools_version: String,

    /// Keystore alias
    #[arg(long, env = "SIGN_ALIAS", hide_env_values = true)]
    pub sign_alias: Option<String>,

    /// Keystore and key password
    #[arg(long, env = "SIGN_PASSWORD", hide_env_values = true)]
    pub sign_password: Option<String>,

    /// GitHub token used to create releases
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api: String,

    /// Cloud drive base URL
    #[arg(long, env = "DRIVE_URL", default_value = "https://cloud.ankio.net")]
    pub drive_url: String,

    /// Cloud drive token (mirror upload is skipped without it)
    #[arg(long, env = "ALIST_TOKEN", hide_env_values = true)]
    pub drive_token: Option<String>,

    /// Directory on the cloud drive that holds one folder per channel
    #[arg(long, env = "DRIVE_ROOT", default_value = "/releases")]
    pub drive_root: String,

    /// Public browse URL of the drive root, used for download links
    #[arg(long, env = "DRIVE_PUBLIC_URL")]
    pub drive_public_url: Option<String>,

    /// Forum base URL
    #[arg(long, env = "FORUM_URL", default_value = "https://forum.ez-book.org")]
    pub forum_url: String,

    /// Forum API key (forum post is skipped without it)
    #[arg(long, env = "FORUMS_API_KEY", hide_env_values = true)]
    pub forum_api_key: Option<String>,

    /// Forum user the post is made as
    #[arg(long, env = "FORUM_USERNAME", default_value = "system")]
    pub forum_username: String,

    /// Forum category id for release posts
    #[arg(long, env = "FORUM_CATEGORY", default_value_t = 8)]
    pub forum_category: u64,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api: String,

    /// Telegram bot token (Telegram notification is skipped without it)
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Chat that archives every APK
    #[arg(long, env = "TELEGRAM_ARCHIVE_CHAT")]
    pub telegram_archive_chat: Option<String>,

    /// Chat that receives the release announcement
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat: Option<String>,

    /// Format of the manifest `log` field
    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true, default_value = "markdown")]
    pub log_format: LogFormat,

    /// Create and push a `<channel>.<version>` git tag after the build
    #[arg(long, env = "CREATE_TAG")]
    pub create_tag: bool,

    /// Gradle task that prints the version code
    #[arg(long, env = "VERSION_CODE_TASK")]
    pub version_code_task: Option<String>,

    /// Path prefixes whose change requires users to restart the app
    #[arg(long, env = "RESTART_PATHS", value_delimiter = ',')]
    pub restart_paths: Vec<String>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.channel.trim().is_empty() {
            return Err("Channel cannot be empty".to_string());
        }
        if !self
            .channel
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!(
                "Invalid channel: {}. Use letters, digits, '-' or '_'",
                self.channel
            ));
        }

        if let Some(repo) = &self.repo
            && repo.split('/').filter(|p| !p.is_empty()).count() != 2
        {
            return Err(format!("Invalid repository: {}. Expected owner/repo", repo));
        }

        if self.variant.is_empty() {
            return Err("Build variant cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(!args.quiet, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Runtime configuration that prints nothing, for library callers and tests.
    pub fn quiet() -> Self {
        Self {
            output: super::OutputManager::new(false, true),
        }
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) {
        self.output.verbose(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) {
        self.output.warn(message)
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        self.output.error(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        self.output.indent(message)
    }
}
