//! Release announcements.
//!
//! Notification runs after the release is public, so nothing here fails the
//! run: every destination reports how it went and the pipeline logs it.

pub mod forum;
pub mod telegram;

pub use forum::ForumNotifier;
pub use telegram::{TelegramDelivery, TelegramNotifier};

use crate::cli::RuntimeConfig;
use crate::config::{Channel, ReleaseConfig};
use crate::error::Result;
use crate::http::RetryPolicy;
use std::path::Path;

/// How the forum announcement went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumDelivery {
    /// Topic created
    Posted,
    /// Not a stable release, or no API key
    Skipped,
    /// Request failed
    Failed,
}

/// Outcome of the notify stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyReport {
    /// Forum result
    pub forum: ForumDelivery,
    /// Telegram result
    pub telegram: TelegramDelivery,
}

/// Sends the forum post and the Telegram announcement.
#[derive(Debug)]
pub struct Notifier {
    forum: Option<ForumNotifier>,
    telegram: Option<TelegramNotifier>,
}

impl Notifier {
    /// Builds the notifiers whose credentials are configured.
    pub fn from_config(config: &ReleaseConfig, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            forum: ForumNotifier::from_config(&config.forum, retry)?,
            telegram: TelegramNotifier::from_config(&config.telegram, retry)?,
        })
    }

    /// Announces `version`. The forum is only told about stable releases.
    pub async fn notify(
        &self,
        channel: &Channel,
        version: &str,
        changelog: &str,
        apk: &Path,
        runtime_config: &RuntimeConfig,
    ) -> NotifyReport {
        let forum = match (&self.forum, channel.is_stable()) {
            (Some(forum), true) => {
                runtime_config.progress("Posting to forum");
                match forum.post(channel, version, changelog).await {
                    Ok(post) => {
                        runtime_config.success(&format!("Forum post {} created", post.id));
                        ForumDelivery::Posted
                    }
                    Err(e) => {
                        runtime_config.warn(&format!("Forum post failed: {}", e));
                        ForumDelivery::Failed
                    }
                }
            }
            (None, true) => {
                log::info!("No forum API key configured, skipping forum post");
                ForumDelivery::Skipped
            }
            (_, false) => ForumDelivery::Skipped,
        };

        let telegram = match &self.telegram {
            Some(telegram) => {
                runtime_config.progress("Announcing on Telegram");
                let delivery = telegram.notify(apk, version, changelog).await;
                match delivery {
                    TelegramDelivery::Document => runtime_config.success("Telegram announcement sent"),
                    TelegramDelivery::TextOnly => {
                        runtime_config.warn("Telegram announcement sent without the APK")
                    }
                    TelegramDelivery::Failed => runtime_config.warn("Telegram announcement failed"),
                    TelegramDelivery::Skipped => {}
                }
                delivery
            }
            None => {
                log::info!("Telegram not configured, skipping announcement");
                TelegramDelivery::Skipped
            }
        };

        NotifyReport { forum, telegram }
    }
}
