//! Changelog construction and rendering.
//!
//! Commits are grouped into the categories declared in the category mapping
//! file. A commit whose code appears in several label sets is listed under
//! each of them; within a category a message is listed once, in first-seen
//! order.

use super::commits::CommitRecord;
use crate::config::LogFormat;
use crate::error::{ReleaseError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// One changelog section and the emoji codes that feed it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Section title
    pub title: String,
    /// Emoji codes, without colons
    pub labels: HashSet<String>,
}

/// Ordered list of categories, as declared in the configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CategoryMapping {
    /// Categories in declaration order
    pub categories: Vec<Category>,
}

impl CategoryMapping {
    /// Loads `{"categories": [{"title": ..., "labels": [...]}, ...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReleaseError::execution(
                "read_category_config",
                format!("Failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::from_json(&content)
    }

    /// Parses the mapping from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Categorized release notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    sections: Vec<(String, Vec<String>)>,
}

impl Changelog {
    /// Groups `commits` by `mapping`. Empty categories are left out.
    pub fn build(commits: &[CommitRecord], mapping: &CategoryMapping) -> Self {
        let mut sections: Vec<(String, Vec<String>)> = mapping
            .categories
            .iter()
            .map(|c| (c.title.clone(), Vec::new()))
            .collect();

        for commit in commits {
            for (category, (_, messages)) in mapping.categories.iter().zip(sections.iter_mut()) {
                if category.labels.contains(&commit.emoji_code)
                    && !messages.contains(&commit.message)
                {
                    messages.push(commit.message.clone());
                }
            }
        }

        sections.retain(|(_, messages)| !messages.is_empty());
        Self { sections }
    }

    /// Sections in category order.
    pub fn sections(&self) -> &[(String, Vec<String>)] {
        &self.sections
    }

    /// Messages listed under `title`.
    pub fn messages(&self, title: &str) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, m)| m.as_slice())
    }

    /// Whether no commit matched any category.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// `"<title>\n- <message>\n..."` for every section, in order.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for (title, messages) in &self.sections {
            let _ = writeln!(out, "{}", title);
            for message in messages {
                let _ = writeln!(out, "- {}", message);
            }
        }
        out
    }
}

/// Turns the Markdown changelog into the manifest `log` field.
pub trait LogRenderer: Send + Sync {
    /// Renders `markdown`.
    fn render(&self, markdown: &str) -> String;
}

/// Keeps the Markdown untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl LogRenderer for PassThrough {
    fn render(&self, markdown: &str) -> String {
        markdown.to_string()
    }
}

/// Converts Markdown to HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl LogRenderer for HtmlRenderer {
    fn render(&self, markdown: &str) -> String {
        let parser = pulldown_cmark::Parser::new_ext(markdown, pulldown_cmark::Options::empty());
        let mut html = String::with_capacity(markdown.len() * 2);
        pulldown_cmark::html::push_html(&mut html, parser);
        html
    }
}

/// Renderer selected by configuration.
pub fn renderer_for(format: LogFormat) -> Box<dyn LogRenderer> {
    match format {
        LogFormat::Markdown => Box::new(PassThrough),
        LogFormat::Html => Box::new(HtmlRenderer),
    }
}
