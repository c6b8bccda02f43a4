//! Commit classification by leading emoji code.

use crate::error::Result;
use crate::git::GitClient;

/// Separates the hash from the subject on every log line.
pub const HASH_SEPARATOR: char = '\t';

/// A user-facing commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Code between the colons, e.g. `sparkles`
    pub emoji_code: String,
    /// Commit subject without the emoji token
    pub message: String,
}

/// Parses one `git log` line into a record.
///
/// Returns `None` for commits without a leading `:code:` token, and for
/// commits whose subject is nothing but the token.
pub fn parse_commit_line(line: &str) -> Option<CommitRecord> {
    let (_hash, subject) = line.split_once(HASH_SEPARATOR)?;
    let subject = subject.trim();
    let emoji_code = leading_emoji_code(subject)?.to_string();

    let message = subject
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default();
    if message.is_empty() {
        return None;
    }

    Some(CommitRecord {
        emoji_code,
        message: message.to_string(),
    })
}

/// The `code` of a subject starting with `:code:`, where `code` is one or
/// more word characters.
fn leading_emoji_code(subject: &str) -> Option<&str> {
    let rest = subject.strip_prefix(':')?;
    let (code, _) = rest.split_once(':')?;
    if code.is_empty() || !code.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(code)
}

/// Classifies log lines, preserving their order (newest first).
pub fn classify<S: AsRef<str>>(lines: &[S]) -> Vec<CommitRecord> {
    lines
        .iter()
        .filter_map(|line| {
            let record = parse_commit_line(line.as_ref());
            if record.is_none() {
                log::debug!("Skipping commit without emoji code: {}", line.as_ref());
            }
            record
        })
        .collect()
}

/// Lists and classifies commits from the repository.
#[derive(Debug)]
pub struct CommitClassifier<'a> {
    git: &'a GitClient,
}

impl<'a> CommitClassifier<'a> {
    /// Creates a classifier over `git`.
    pub fn new(git: &'a GitClient) -> Self {
        Self { git }
    }

    /// User-facing commits after `tag`, or in the whole history when `None`.
    pub async fn since(&self, tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        let lines = self.git.log_oneline(tag).await?;
        let records = classify(&lines);
        log::info!(
            "{} of {} commits since {} carry an emoji code",
            records.len(),
            lines.len(),
            tag.unwrap_or("the first commit")
        );
        Ok(records)
    }
}
