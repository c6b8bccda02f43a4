//! GitHub Releases: create a release and attach the signed APK.

use crate::config::API_TIMEOUT;
use crate::error::{ReleaseError, Result};
use crate::http::{RetryPolicy, build_client, check_status, endpoint, retry};
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const APK_CONTENT_TYPE: &str = "application/vnd.android.package-archive";

/// Request body of `POST /repos/{repo}/releases`.
#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

/// Fields of a created release the pipeline uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release id
    pub id: u64,
    /// Release page
    pub html_url: String,
    /// Asset upload URL template (`...assets{?name,label}`)
    pub upload_url: String,
}

/// Fields of an uploaded asset the pipeline uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// Public download link
    pub browser_download_url: String,
}

/// Outcome of a successful GitHub publish.
#[derive(Debug, Clone)]
pub struct PublishedRelease {
    /// The created release
    pub release: Release,
    /// The attached APK
    pub asset: ReleaseAsset,
}

/// GitHub Releases client for one repository.
#[derive(Debug, Clone)]
pub struct GithubPublisher {
    client: Client,
    api_url: String,
    repo: String,
    token: String,
    retry: RetryPolicy,
}

impl GithubPublisher {
    /// Creates a client for `repo` (`owner/name`).
    pub fn new(api_url: &str, repo: &str, token: &str, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(API_TIMEOUT)?,
            api_url: api_url.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            retry,
        })
    }

    /// Replaces the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Creates the release `tag` and uploads `apk` to it.
    ///
    /// `prerelease` is set for every channel except stable.
    pub async fn publish(
        &self,
        tag: &str,
        body: &str,
        apk: &Path,
        prerelease: bool,
    ) -> Result<PublishedRelease> {
        let release = self.create_release(tag, tag, body, prerelease).await?;
        log::info!("✓ Release created: {}", release.html_url);

        let asset = self.upload_asset(&release, apk).await?;
        log::info!("✓ Asset uploaded: {}", asset.browser_download_url);

        Ok(PublishedRelease { release, asset })
    }

    /// `POST /repos/{repo}/releases`, expecting `201 Created`.
    pub async fn create_release(
        &self,
        tag: &str,
        name: &str,
        body: &str,
        prerelease: bool,
    ) -> Result<Release> {
        let url = endpoint(&self.api_url, &format!("repos/{}/releases", self.repo))?;
        let payload = CreateRelease {
            tag_name: tag,
            name,
            body,
            draft: false,
            prerelease,
        };

        let response = retry(&self.retry, ReleaseError::is_undelivered, |_| {
            let request = self
                .client
                .post(url.clone())
                .header(AUTHORIZATION, format!("token {}", self.token))
                .header(ACCEPT, GITHUB_ACCEPT)
                .json(&payload);
            async move { request.send().await.map_err(ReleaseError::from) }
        })
        .await?;

        let response = check_status("GitHub", response).await?;
        Ok(response.json().await?)
    }

    /// Uploads `file` as a binary asset of `release`.
    pub async fn upload_asset(&self, release: &Release, file: &Path) -> Result<ReleaseAsset> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ReleaseError::ArtifactNotFound {
                dir: file.to_path_buf(),
            })?;
        let url = upload_endpoint(&release.upload_url, &name)?;
        let content = Bytes::from(tokio::fs::read(file).await?);

        let response = retry(&self.retry, ReleaseError::is_undelivered, |_| {
            let request = self
                .client
                .post(url.clone())
                .header(AUTHORIZATION, format!("token {}", self.token))
                .header(ACCEPT, GITHUB_ACCEPT)
                .header(CONTENT_TYPE, APK_CONTENT_TYPE)
                .body(content.clone());
            async move { request.send().await.map_err(ReleaseError::from) }
        })
        .await?;

        let response = check_status("GitHub upload", response).await?;
        Ok(response.json().await?)
    }
}

/// Upload URL with the `{?name,label}` template removed and `name` set.
pub fn upload_endpoint(template: &str, name: &str) -> Result<Url> {
    let base = template.split('{').next().unwrap_or(template);
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("name", name);
    Ok(url)
}
