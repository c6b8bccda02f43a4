//! Latest release tag lookup per channel.

use crate::config::Channel;
use crate::error::Result;
use crate::git::GitClient;
use regex::Regex;

/// Tag shape that marks a release on a given channel.
///
/// Stable releases are tagged `vMAJOR.MINOR.PATCH`; pre-release channels are
/// tagged with the full version string `MAJOR.MINOR.PATCH-<channel>.<stamp>`.
#[derive(Debug, Clone)]
pub struct TagPattern {
    regex: Regex,
}

impl TagPattern {
    /// Builds the pattern for `channel`.
    pub fn for_channel(channel: &Channel) -> Result<Self> {
        let pattern = if channel.is_stable() {
            r"^v\d+\.\d+\.\d+$".to_string()
        } else {
            format!(r"^\d+\.\d+\.\d+-{}\.\d+$", regex::escape(channel.as_str()))
        };
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Whether `tag` is a release tag of this channel.
    pub fn matches(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }
}

/// Picks the tag the changelog starts from.
///
/// `tags` must be ordered oldest first. The newest tag matching the channel
/// pattern wins; without a match the newest tag of any kind is used, and with
/// no tags at all the result is `None` (changelog from the first commit).
pub fn resolve_latest_tag<'a>(pattern: &TagPattern, tags: &'a [String]) -> Option<&'a str> {
    tags.iter()
        .rev()
        .find(|tag| pattern.matches(tag))
        .or_else(|| tags.last())
        .map(String::as_str)
}

/// Resolves the starting tag from the repository.
#[derive(Debug)]
pub struct TagResolver<'a> {
    git: &'a GitClient,
}

impl<'a> TagResolver<'a> {
    /// Creates a resolver over `git`.
    pub fn new(git: &'a GitClient) -> Self {
        Self { git }
    }

    /// Latest release tag for `channel`, read-only with respect to the repository.
    pub async fn resolve(&self, channel: &Channel) -> Result<Option<String>> {
        let pattern = TagPattern::for_channel(channel)?;
        let tags = self.git.list_tags().await?;
        log::debug!("Found {} tags", tags.len());

        let tag = resolve_latest_tag(&pattern, &tags).map(String::from);
        match &tag {
            Some(t) if pattern.matches(t) => log::info!("Latest {} tag: {}", channel, t),
            Some(t) => log::warn!("No {} release tag, falling back to latest tag {}", channel, t),
            None => log::warn!("Repository has no tags, using full history"),
        }
        Ok(tag)
    }
}
