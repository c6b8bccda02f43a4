//! Thin wrapper over the system `git` binary.
//!
//! Only the handful of commands the pipeline needs: tag listing, one-line log,
//! changed file names, and tag creation/push.

use crate::error::{ReleaseError, Result};
use std::path::PathBuf;
use tokio::process::Command;

/// Git client bound to one repository.
#[derive(Debug, Clone)]
pub struct GitClient {
    repo_path: PathBuf,
}

impl GitClient {
    /// Creates a client for the repository at `repo_path`.
    ///
    /// Fails when no `git` executable is on `PATH`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Result<Self> {
        let git = which::which("git").map_err(|e| {
            ReleaseError::execution("git", format!("git executable not found: {}", e))
        })?;
        log::debug!("Using git at {}", git.display());
        Ok(Self {
            repo_path: repo_path.into(),
        })
    }

    /// Lists all tags, oldest first by creation date.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let output = self
            .run(&["tag", "--list", "--sort=creatordate"])
            .await?;
        Ok(lines(&output))
    }

    /// One-line commit summaries from `since` (exclusive) to HEAD, newest first.
    ///
    /// Each line is `<hash>\t<subject>`. The hash is as long as git needs to
    /// keep it unambiguous. With no `since` the whole history is listed.
    pub async fn log_oneline(&self, since: Option<&str>) -> Result<Vec<String>> {
        let range = since.map(|tag| format!("{}..HEAD", tag));
        let mut args = vec!["log", "--no-decorate", "--format=%h%x09%s"];
        if let Some(range) = &range {
            args.push(range);
        }
        let output = self.run(&args).await?;
        Ok(lines(&output))
    }

    /// Files changed between `from` and HEAD.
    pub async fn changed_files(&self, from: &str) -> Result<Vec<String>> {
        let output = self.run(&["diff", "--name-only", from, "HEAD"]).await?;
        Ok(lines(&output))
    }

    /// Creates a lightweight tag at HEAD.
    pub async fn create_tag(&self, name: &str) -> Result<()> {
        self.run(&["tag", name]).await?;
        Ok(())
    }

    /// Pushes one tag to `remote`.
    pub async fn push_tag(&self, remote: &str, name: &str) -> Result<()> {
        self.run(&["push", remote, name]).await?;
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        log::debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await
            .map_err(|e| ReleaseError::execution(format!("git {}", args.join(" ")), e.to_string()))?;

        if !output.status.success() {
            return Err(ReleaseError::execution(
                format!("git {}", args.join(" ")),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
