//! Release preparation: everything that happens before Gradle runs.
//!
//! - [`tag`] - latest release tag per channel
//! - [`commits`] - emoji-coded commit classification
//! - [`changelog`] - categorized changelog and manifest log renderers
//! - [`manifest`] - `index.json` and `README.md` outputs
//! - [`version`] - composite version and descriptor patching

pub mod changelog;
pub mod commits;
pub mod manifest;
pub mod tag;
pub mod version;

pub use changelog::{CategoryMapping, Changelog, LogRenderer, renderer_for};
pub use commits::{CommitClassifier, CommitRecord};
pub use manifest::{ChangelogFile, ReleaseManifest};
pub use tag::TagResolver;
pub use version::{VersionIdentifier, VersionWriter};
