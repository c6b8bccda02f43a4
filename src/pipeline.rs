//! The release pipeline.
//!
//! Stages run strictly in sequence and hand over through files in
//! `<workspace>/dist`. Everything up to and including the build is fatal on
//! error; GitHub is fatal too; the drive mirror and notifications only
//! degrade the result.

use crate::build::{ApkSigner, BuildOutput, BuildRunner};
use crate::cli::RuntimeConfig;
use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::git::GitClient;
use crate::http::RetryPolicy;
use crate::notify::{ForumDelivery, Notifier, NotifyReport, TelegramDelivery};
use crate::publish::{PublishReport, Publisher};
use crate::release::manifest::requires_restart;
use crate::release::{
    CategoryMapping, Changelog, ChangelogFile, CommitClassifier, ReleaseManifest, TagResolver,
    VersionIdentifier, VersionWriter, renderer_for,
};
use chrono::Local;

/// Remote the release tag is pushed to.
pub const TAG_REMOTE: &str = "origin";

/// Everything a completed release produced.
#[derive(Debug, Clone)]
pub struct ReleaseSummary {
    /// Tag the commit range started from
    pub previous_tag: Option<String>,
    /// Version written and published
    pub version: VersionIdentifier,
    /// Categorized changelog
    pub changelog: Changelog,
    /// Built and signed artifacts
    pub build: BuildOutput,
    /// Git tag pushed, if tagging is enabled
    pub git_tag: Option<String>,
    /// GitHub and mirror results
    pub publish: PublishReport,
    /// Forum and Telegram results
    pub notify: NotifyReport,
}

impl ReleaseSummary {
    /// Whether a best-effort destination fell short.
    pub fn is_degraded(&self) -> bool {
        let mirror_incomplete = self
            .publish
            .mirror
            .is_some_and(|report| !report.is_complete());
        mirror_incomplete
            || self.notify.forum == ForumDelivery::Failed
            || matches!(
                self.notify.telegram,
                TelegramDelivery::TextOnly | TelegramDelivery::Failed
            )
    }
}

/// How a run ended without a fatal error.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// No user-facing commits since the last tag; nothing was built
    NothingToRelease {
        /// Tag the empty range started from
        previous_tag: Option<String>,
    },
    /// A release was built and published
    Released(Box<ReleaseSummary>),
}

/// One pipeline invocation over a workspace.
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a ReleaseConfig,
    runtime_config: &'a RuntimeConfig,
    retry: RetryPolicy,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline with the default retry policy.
    pub fn new(config: &'a ReleaseConfig, runtime_config: &'a RuntimeConfig) -> Self {
        Self {
            config,
            runtime_config,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy used by every HTTP destination.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs every stage.
    ///
    /// # Returns
    ///
    /// * `Ok(PipelineOutcome::NothingToRelease)` - no releasable commits
    /// * `Ok(PipelineOutcome::Released(_))` - GitHub release created
    /// * `Err(_)` - a fatal stage failed; nothing was published
    pub async fn run(&self) -> Result<PipelineOutcome> {
        let config = self.config;
        let out = self.runtime_config;

        out.section(&format!("Release {} ({})", config.channel, config.variant));

        let git = GitClient::new(&config.workspace)?;
        let previous_tag = TagResolver::new(&git).resolve(&config.channel).await?;
        match &previous_tag {
            Some(tag) => out.indent(&format!("Previous release: {}", tag)),
            None => out.indent("No previous release, using full history"),
        }

        let commits = CommitClassifier::new(&git).since(previous_tag.as_deref()).await?;
        if commits.is_empty() {
            out.success("No releasable commits, nothing to build");
            return Ok(PipelineOutcome::NothingToRelease { previous_tag });
        }
        out.indent(&format!("{} releasable commits", commits.len()));

        let mapping = CategoryMapping::load(&config.categories)?;
        let changelog = Changelog::build(&commits, &mapping);
        if changelog.is_empty() {
            out.warn("No commit matched a changelog category");
        }
        let changelog_text = changelog.to_markdown();

        // Fatal preconditions, checked before the descriptor is touched
        let signer = ApkSigner::from_config(&config.signing)?;
        let publisher = Publisher::from_config(config, self.retry)?;
        let notifier = Notifier::from_config(config, self.retry)?;

        out.section("Version");
        let now = Local::now();
        let writer = VersionWriter::new(
            &config.workspace,
            &config.descriptor,
            config.version_code_task.clone(),
        );
        let version = writer.apply(&config.channel, now).await?;
        out.success(&format!("Version {} ({})", version, version.code));

        let restart_required = match &previous_tag {
            Some(tag) if !config.restart_paths.is_empty() => {
                let changed = git.changed_files(tag).await?;
                requires_restart(&changed, &config.restart_paths)
            }
            _ => false,
        };
        if restart_required {
            out.warn("Changes touch restart-sensitive paths");
        }

        let dist = config.dist_dir();
        let version_name = version.to_string();
        let renderer = renderer_for(config.log_format);
        ReleaseManifest::new(&version, renderer.render(&changelog_text), now).write_to(&dist)?;
        ChangelogFile {
            repo: config.github.repo.as_deref(),
            channel: &config.channel,
            version: &version_name,
            released_at: now,
            mirror_url: config.drive.public_url.as_deref(),
            restart_required,
            body: &changelog_text,
        }
        .write_to(&dist)?;
        out.verbose_println(&format!("Wrote manifest and changelog to {}", dist.display()));

        out.section("Build");
        let runner = BuildRunner::new(&config.workspace, &dist, &config.variant, signer);
        let build = runner.run(&version, out).await?;

        let git_tag = if config.create_tag {
            let name = version.tag_name();
            git.create_tag(&name).await?;
            git.push_tag(TAG_REMOTE, &name).await?;
            out.success(&format!("Pushed tag {}", name));
            Some(name)
        } else {
            None
        };

        out.section("Publish");
        let publish = publisher
            .publish(config, &version, &changelog_text, &build, out)
            .await?;

        out.section("Notify");
        let notify = notifier
            .notify(&config.channel, &version_name, &changelog_text, &build.signed, out)
            .await;

        Ok(PipelineOutcome::Released(Box::new(ReleaseSummary {
            previous_tag,
            version,
            changelog,
            build,
            git_tag,
            publish,
            notify,
        })))
    }
}

/// Runs the pipeline with the default retry policy.
pub async fn run(config: &ReleaseConfig, runtime_config: &RuntimeConfig) -> Result<PipelineOutcome> {
    Pipeline::new(config, runtime_config).run().await
}
