//! Forum announcement through the Discourse `posts.json` endpoint.

use crate::config::{API_TIMEOUT, Channel, ForumConfig};
use crate::error::{ReleaseError, Result};
use crate::http::{RetryPolicy, build_client, check_status, endpoint, retry};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Tag every release topic carries besides the channel name.
pub const RELEASE_TAG: &str = "release";

#[derive(Debug, Serialize)]
struct NewTopic<'a> {
    title: &'a str,
    raw: &'a str,
    category: u64,
    tags: Vec<&'a str>,
}

/// Fields of a created post the pipeline logs.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPost {
    /// Post id
    pub id: u64,
    /// Topic id
    pub topic_id: Option<u64>,
}

/// Creates release topics on the forum.
#[derive(Debug, Clone)]
pub struct ForumNotifier {
    client: Client,
    base_url: String,
    api_key: String,
    username: String,
    category: u64,
    retry: RetryPolicy,
}

impl ForumNotifier {
    /// Builds a notifier, or `None` when no API key is configured.
    pub fn from_config(config: &ForumConfig, retry: RetryPolicy) -> Result<Option<Self>> {
        let Some(api_key) = &config.api_key else {
            return Ok(None);
        };
        Ok(Some(Self {
            client: build_client(API_TIMEOUT)?,
            base_url: config.base_url.clone(),
            api_key: api_key.clone(),
            username: config.username.clone(),
            category: config.category,
            retry,
        }))
    }

    /// Posts a topic titled `version` with `body` as its first post.
    pub async fn post(&self, channel: &Channel, version: &str, body: &str) -> Result<CreatedPost> {
        let url = endpoint(&self.base_url, "posts.json")?;
        let topic = NewTopic {
            title: version,
            raw: body,
            category: self.category,
            tags: vec![RELEASE_TAG, channel.as_str()],
        };

        let response = retry(&self.retry, ReleaseError::is_undelivered, |_| {
            let request = self
                .client
                .post(url.clone())
                .header("Api-Key", self.api_key.as_str())
                .header("Api-Username", self.username.as_str())
                .json(&topic);
            async move { request.send().await.map_err(ReleaseError::from) }
        })
        .await?;

        let response = check_status("Forum", response).await?;
        Ok(response.json().await?)
    }
}
