//! Cloud drive mirror.
//!
//! Files are PUT to `/api/fs/put` with the target path in a `file-path`
//! header. The mirror is best effort: each file is retried on network
//! errors, and a file that still fails is reported and skipped.

use crate::config::{Channel, DRIVE_UPLOAD_TIMEOUT};
use crate::error::{ReleaseError, Result};
use crate::http::{RetryPolicy, build_client, check_status, endpoint, retry};
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Drive API answer. HTTP 200 can still carry an application error code.
#[derive(Debug, Deserialize)]
struct DriveResponse {
    code: Option<u16>,
    message: Option<String>,
}

/// Result of a mirror batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorReport {
    /// Files uploaded
    pub succeeded: usize,
    /// Files attempted
    pub total: usize,
}

impl MirrorReport {
    /// Whether every file made it.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

impl fmt::Display for MirrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.total)
    }
}

/// One file to mirror: local path and name inside the channel folder.
#[derive(Debug, Clone)]
pub struct MirrorFile {
    /// Local file
    pub local: PathBuf,
    /// File name on the drive
    pub remote_name: String,
}

impl MirrorFile {
    /// Pairs a local file with its remote name.
    pub fn new(local: impl Into<PathBuf>, remote_name: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote_name: remote_name.into(),
        }
    }
}

/// Cloud drive client.
#[derive(Debug, Clone)]
pub struct DriveMirror {
    client: Client,
    base_url: String,
    token: String,
    root: String,
    retry: RetryPolicy,
}

impl DriveMirror {
    /// Creates a client that uploads below `root` on the drive at `base_url`.
    pub fn new(base_url: &str, token: &str, root: &str, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(DRIVE_UPLOAD_TIMEOUT)?,
            base_url: base_url.to_string(),
            token: token.to_string(),
            root: root.to_string(),
            retry,
        })
    }

    /// Drive path of `name` in the `channel` folder.
    pub fn remote_path(&self, channel: &Channel, name: &str) -> String {
        format!(
            "/{}/{}/{}",
            self.root.trim_matches('/'),
            channel,
            name.trim_start_matches('/')
        )
        .replace("//", "/")
    }

    /// Uploads every file, continuing past failures.
    pub async fn mirror(&self, channel: &Channel, files: &[MirrorFile]) -> MirrorReport {
        let mut succeeded = 0;
        for file in files {
            let remote = self.remote_path(channel, &file.remote_name);
            match self.upload(&file.local, &remote).await {
                Ok(()) => {
                    log::info!("✓ Mirrored {} -> {}", file.local.display(), remote);
                    succeeded += 1;
                }
                Err(e) => log::warn!("Mirror upload of {} failed: {}", file.local.display(), e),
            }
        }
        MirrorReport {
            succeeded,
            total: files.len(),
        }
    }

    /// PUTs one file to `remote_path`.
    pub async fn upload(&self, local: &Path, remote_path: &str) -> Result<()> {
        let url = endpoint(&self.base_url, "api/fs/put")?;
        let content = Bytes::from(tokio::fs::read(local).await?);
        let encoded_path = urlencoding::encode(remote_path).into_owned();

        let response = retry(&self.retry, ReleaseError::is_transient, |_| {
            let request = self
                .client
                .put(url.clone())
                .header(AUTHORIZATION, self.token.as_str())
                .header("file-path", encoded_path.as_str())
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(content.clone());
            async move { request.send().await.map_err(ReleaseError::from) }
        })
        .await?;

        let response = check_status("Drive", response).await?;
        let body = response.text().await?;
        match serde_json::from_str::<DriveResponse>(&body) {
            Ok(DriveResponse {
                code: Some(code),
                message,
            }) if code != 200 => Err(ReleaseError::Api {
                service: "Drive",
                status: code,
                body: message.unwrap_or(body),
            }),
            _ => Ok(()),
        }
    }
}
