//! Telegram announcements.
//!
//! The APK is uploaded to the archive chat first; the resulting `file_id` is
//! then re-sent to the broadcast chat as a media group with the changelog as
//! caption. If either step fails the broadcast chat gets a text-only message
//! with the same caption.

use crate::config::{API_TIMEOUT, DRIVE_UPLOAD_TIMEOUT, TelegramConfig};
use crate::error::{ReleaseError, Result};
use crate::http::{RetryPolicy, build_client, check_status, endpoint, retry};
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;

/// Telegram's caption limit.
pub const CAPTION_LIMIT: usize = 1024;

/// Appended to truncated captions.
pub const ELLIPSIS: &str = "…";

const PARSE_MODE: &str = "MarkdownV2";

/// Characters MarkdownV2 requires to be escaped outside entities.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escapes `text` for MarkdownV2.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Cuts `text` to at most `limit` characters, ending in [`ELLIPSIS`] when cut.
///
/// A cut never leaves a dangling escape backslash.
pub fn truncate_caption(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.chars().count());
    let mut cut: String = text.chars().take(keep).collect();

    let trailing_backslashes = cut.chars().rev().take_while(|c| *c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        cut.pop();
    }
    cut.push_str(ELLIPSIS);
    cut
}

/// Announcement caption: bold version line, then the changelog.
pub fn caption(version: &str, changelog: &str) -> String {
    let text = format!(
        "*{}*\n\n{}",
        escape_markdown_v2(version),
        escape_markdown_v2(changelog.trim_end())
    );
    truncate_caption(&text, CAPTION_LIMIT)
}

/// How the announcement reached the broadcast chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramDelivery {
    /// APK and caption as a media group
    Document,
    /// Text-only fallback
    TextOnly,
    /// Nothing could be sent
    Failed,
    /// Telegram not configured
    Skipped,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    document: Option<SentDocument>,
}

#[derive(Debug, Deserialize)]
struct SentDocument {
    file_id: String,
}

/// Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    upload_client: Client,
    api_url: String,
    token: String,
    archive_chat: String,
    broadcast_chat: String,
    retry: RetryPolicy,
}

impl TelegramNotifier {
    /// Builds a notifier, or `None` when the token or broadcast chat is
    /// missing. The archive chat defaults to the broadcast chat.
    pub fn from_config(config: &TelegramConfig, retry: RetryPolicy) -> Result<Option<Self>> {
        let (Some(token), Some(broadcast_chat)) = (&config.token, &config.broadcast_chat) else {
            return Ok(None);
        };
        Ok(Some(Self {
            client: build_client(API_TIMEOUT)?,
            upload_client: build_client(DRIVE_UPLOAD_TIMEOUT)?,
            api_url: config.api_url.clone(),
            token: token.clone(),
            archive_chat: config
                .archive_chat
                .clone()
                .unwrap_or_else(|| broadcast_chat.clone()),
            broadcast_chat: broadcast_chat.clone(),
            retry,
        }))
    }

    /// Announces the release, degrading to text when the document path fails.
    pub async fn notify(&self, apk: &Path, version: &str, changelog: &str) -> TelegramDelivery {
        let caption = caption(version, changelog);

        match self.send_with_document(apk, &caption).await {
            Ok(()) => return TelegramDelivery::Document,
            Err(e) => log::warn!("Telegram document announcement failed: {}", e),
        }

        match self.send_message(&self.broadcast_chat, &caption).await {
            Ok(()) => TelegramDelivery::TextOnly,
            Err(e) => {
                log::warn!("Telegram text announcement failed: {}", e);
                TelegramDelivery::Failed
            }
        }
    }

    async fn send_with_document(&self, apk: &Path, caption: &str) -> Result<()> {
        let file_id = self.send_document(&self.archive_chat, apk).await?;
        self.send_media_group(&self.broadcast_chat, &file_id, caption).await
    }

    /// `sendDocument`, returning the uploaded file's `file_id`.
    pub async fn send_document(&self, chat: &str, file: &Path) -> Result<String> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app.apk".to_string());
        let content = Bytes::from(tokio::fs::read(file).await?);
        let url = endpoint(&self.api_url, &format!("bot{}/sendDocument", self.token))?;

        let response = retry(&self.retry, ReleaseError::is_undelivered, |_| {
            let part = Part::stream_with_length(content.clone(), content.len() as u64)
                .file_name(name.clone());
            let form = Form::new()
                .text("chat_id", chat.to_string())
                .part("document", part);
            let request = self.upload_client.post(url.clone()).multipart(form);
            async move { request.send().await.map_err(|e| ReleaseError::from(e.without_url())) }
        })
        .await?;

        let sent: SentMessage = self.parse(response).await?;
        sent.document
            .map(|d| d.file_id)
            .ok_or_else(|| ReleaseError::Api {
                service: "Telegram",
                status: 200,
                body: "sendDocument returned no document".to_string(),
            })
    }

    /// `sendMediaGroup` with one already-uploaded document.
    pub async fn send_media_group(&self, chat: &str, file_id: &str, caption: &str) -> Result<()> {
        let payload = json!({
            "chat_id": chat,
            "media": [{
                "type": "document",
                "media": file_id,
                "caption": caption,
                "parse_mode": PARSE_MODE,
            }],
        });
        self.post_json::<serde_json::Value>("sendMediaGroup", &payload).await?;
        Ok(())
    }

    /// `sendMessage` in MarkdownV2.
    pub async fn send_message(&self, chat: &str, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": chat,
            "text": text,
            "parse_mode": PARSE_MODE,
        });
        self.post_json::<serde_json::Value>("sendMessage", &payload).await?;
        Ok(())
    }

    async fn post_json<T: DeserializeOwned>(&self, method: &str, payload: &serde_json::Value) -> Result<T> {
        let url = endpoint(&self.api_url, &format!("bot{}/{}", self.token, method))?;
        let response = retry(&self.retry, ReleaseError::is_undelivered, |_| {
            let request = self.client.post(url.clone()).json(payload);
            async move { request.send().await.map_err(|e| ReleaseError::from(e.without_url())) }
        })
        .await?;
        self.parse(response).await
    }

    async fn parse<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = check_status("Telegram", response).await?;
        let body: ApiResponse<T> = response.json().await.map_err(|e| e.without_url())?;
        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(ReleaseError::Api {
                service: "Telegram",
                status: 200,
                body: description.unwrap_or_else(|| "request not ok".to_string()),
            }),
        }
    }
}
