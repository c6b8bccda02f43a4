//! Release manifest (`index.json`) and changelog file (`README.md`).
//!
//! The manifest is read by the in-app update checker, so its field names are
//! fixed: `version`, `code`, `log`, `date`.

use super::version::VersionIdentifier;
use crate::config::Channel;
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// File name of the manifest inside the dist directory.
pub const MANIFEST_FILE: &str = "index.json";

/// File name of the changelog inside the dist directory.
pub const CHANGELOG_FILE: &str = "README.md";

/// Format of the `date` field and the release time in the changelog file.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Latest release description consumed by the update checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Full version string
    pub version: String,
    /// Version code
    pub code: u64,
    /// Changelog, Markdown or HTML depending on configuration
    pub log: String,
    /// Release time, `%Y-%m-%d %H:%M:%S`
    pub date: String,
}

impl ReleaseManifest {
    /// Manifest for `version` released at `released_at`.
    pub fn new(version: &VersionIdentifier, log: String, released_at: DateTime<Local>) -> Self {
        Self {
            version: version.to_string(),
            code: version.code,
            log,
            date: released_at.format(DATE_FORMAT).to_string(),
        }
    }

    /// Writes `index.json` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Human-readable release page: download links, restart notice, changelog.
#[derive(Debug, Clone)]
pub struct ChangelogFile<'a> {
    /// GitHub `owner/repo`, used for the release link
    pub repo: Option<&'a str>,
    /// Release channel
    pub channel: &'a Channel,
    /// Full version string
    pub version: &'a str,
    /// Release time
    pub released_at: DateTime<Local>,
    /// Public drive URL holding one folder per channel
    pub mirror_url: Option<&'a str>,
    /// Whether the app must be restarted after updating
    pub restart_required: bool,
    /// Markdown changelog body
    pub body: &'a str,
}

impl ChangelogFile<'_> {
    /// Renders the Markdown document.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Downloads");
        if let Some(repo) = self.repo {
            let _ = writeln!(
                out,
                " - [GitHub](https://github.com/{}/releases/tag/{})",
                repo, self.version
            );
        }
        if let Some(mirror) = self.mirror_url {
            let _ = writeln!(
                out,
                " - [Mirror]({}/{}/{}.apk)",
                mirror.trim_end_matches('/'),
                self.channel,
                self.version
            );
        }
        if self.restart_required {
            let _ = writeln!(out, "# Restart required");
            let _ = writeln!(
                out,
                "This release changes the hook layer. Restart the device or the hooked apps after updating."
            );
        }
        let _ = writeln!(out, "# Changelog");
        let _ = writeln!(out, " - Version: {}", self.version);
        let _ = writeln!(out, " - Released: {}", self.released_at.format(DATE_FORMAT));
        out.push_str(self.body);
        out
    }

    /// Writes `README.md` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CHANGELOG_FILE);
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}

/// Whether any changed file falls under one of the `restart_paths` prefixes.
pub fn requires_restart<S: AsRef<str>>(changed_files: &[S], restart_paths: &[String]) -> bool {
    changed_files.iter().any(|file| {
        restart_paths
            .iter()
            .any(|prefix| file.as_ref().starts_with(prefix.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn version() -> VersionIdentifier {
        VersionIdentifier {
            base: "1.2.0".into(),
            channel: Channel::stable(),
            stamp: "20240501103000".into(),
            code: 20240501,
        }
    }

    fn released_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn manifest_keeps_contract_field_names() {
        let manifest = ReleaseManifest::new(&version(), "Features\n- Add export\n".into(), released_at());
        let value: serde_json::Value = serde_json::to_value(&manifest).unwrap();

        assert_eq!(value["version"], "1.2.0-Stable.20240501103000");
        assert_eq!(value["code"], 20240501);
        assert_eq!(value["log"], "Features\n- Add export\n");
        assert_eq!(value["date"], "2024-05-01 10:30:00");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn manifest_is_written_to_dist() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ReleaseManifest::new(&version(), String::new(), released_at());
        let path = manifest.write_to(&dir.path().join("dist")).unwrap();

        let read: ReleaseManifest =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(read, manifest);
    }

    #[test]
    fn changelog_file_lists_links_and_body() {
        let channel = Channel::stable();
        let file = ChangelogFile {
            repo: Some("owner/app"),
            channel: &channel,
            version: "1.2.0-Stable.20240501103000",
            released_at: released_at(),
            mirror_url: Some("https://drive.example/releases/"),
            restart_required: false,
            body: "Features\n- Add export\n",
        };
        let text = file.render();

        assert!(text.starts_with("# Downloads\n"));
        assert!(text.contains(
            "https://github.com/owner/app/releases/tag/1.2.0-Stable.20240501103000"
        ));
        assert!(text.contains(
            "(https://drive.example/releases/Stable/1.2.0-Stable.20240501103000.apk)"
        ));
        assert!(!text.contains("# Restart required"));
        assert!(text.ends_with("# Changelog\n - Version: 1.2.0-Stable.20240501103000\n - Released: 2024-05-01 10:30:00\nFeatures\n- Add export\n"));
    }

    #[test]
    fn restart_notice_sits_between_links_and_changelog() {
        let channel = Channel::new("Beta");
        let file = ChangelogFile {
            repo: None,
            channel: &channel,
            version: "1.2.0-Beta.20240501103000",
            released_at: released_at(),
            mirror_url: None,
            restart_required: true,
            body: "Fixes\n- Fix hook\n",
        };
        let text = file.render();

        assert!(text.starts_with(
            "# Downloads\n# Restart required\nThis release changes the hook layer."
        ));
        let notice = text.find("# Restart required").unwrap();
        assert!(notice < text.find("# Changelog").unwrap());
        assert!(text.ends_with("Fixes\n- Fix hook\n"));
    }

    #[test]
    fn restart_notice_follows_changed_paths() {
        let restart = vec!["app/src/xposed/".to_string()];
        assert!(requires_restart(&["app/src/xposed/Hook.kt", "README.md"], &restart));
        assert!(!requires_restart(&["app/src/main/Main.kt"], &restart));
        assert!(!requires_restart(&["app/src/xposed/Hook.kt"], &[]));
    }
}
