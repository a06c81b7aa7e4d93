//! Documentation and train-wide actions backed by configured commands.
//!
//! Each action runs its command list in order. Documentation repository
//! commands run in a checkout of `git.documentation_url`; every other action
//! runs in the working directory. `{{version}}` expands to the released
//! version (the release train version for train-wide actions) and
//! `{{branch}}` to the documentation branch. An empty list makes the action
//! a no-op.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;
use trainman_core::config::{BuildConfig, PostReleaseConfig};
use trainman_core::{
    DocumentationUpdater, PostReleaseActions, Projects, ProjectVersion, ReleaseError,
    ReleaserConfig, Result,
};
use uuid::Uuid;

use crate::command::CommandRunner;
use crate::git::git;

const BRANCH_PLACEHOLDER: &str = "{{branch}}";

fn clone_root(config: &ReleaserConfig) -> PathBuf {
    config
        .git
        .clone_destination_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("trainman-{}", Uuid::new_v4())))
}

pub struct ScriptedActions {
    commands: PostReleaseConfig,
    build: BuildConfig,
    working_dir: PathBuf,
    documentation_url: String,
    documentation_checkout: PathBuf,
    train_project: String,
    runner: CommandRunner,
}

impl ScriptedActions {
    pub fn new(config: &ReleaserConfig) -> Self {
        Self {
            commands: config.post_release.clone(),
            build: config.build.clone(),
            working_dir: config.working_dir(),
            documentation_url: config.git.documentation_url.clone(),
            documentation_checkout: clone_root(config).join("documentation"),
            train_project: config.meta_release.release_train_project_name.clone(),
            runner: CommandRunner::new(config.build.wait_time()),
        }
    }

    async fn run(
        &self,
        action: &str,
        commands: &[String],
        dir: &Path,
        version: &str,
        branch: &str,
    ) -> Result<()> {
        if commands.is_empty() {
            info!(action = %action, "No commands configured; skipping");
            return Ok(());
        }
        for command in commands {
            let command = self
                .build
                .render(command, version)
                .replace(BRANCH_PLACEHOLDER, branch);
            self.runner.run_checked(dir, &command).await?;
        }
        info!(action = %action, commands = commands.len(), "Action finished");
        Ok(())
    }

    /// Clone of the documentation repository at `branch`, reused when present.
    async fn documentation_checkout(&self, branch: &str) -> Result<PathBuf> {
        let checkout = &self.documentation_checkout;
        if !checkout.join(".git").is_dir() {
            let parent = checkout.parent().unwrap_or(checkout.as_path());
            tokio::fs::create_dir_all(parent).await?;
            let target = checkout.to_string_lossy().into_owned();
            info!(url = %self.documentation_url, dir = %target, "Cloning documentation");
            git(parent, &["clone", &self.documentation_url, &target]).await?;
        }
        if git(checkout, &["rev-parse", "--abbrev-ref", "HEAD"]).await? != branch {
            git(checkout, &["checkout", branch]).await?;
        }
        Ok(checkout.clone())
    }

    fn train_version<'a>(&self, versions: &'a Projects) -> &'a str {
        versions
            .get(&self.train_project)
            .map(ProjectVersion::version)
            .unwrap_or_default()
    }

    async fn run_train_action(
        &self,
        action: &str,
        commands: &[String],
        versions: &Projects,
    ) -> Result<()> {
        self.run(
            action,
            commands,
            &self.working_dir,
            self.train_version(versions),
            "",
        )
        .await
        .map_err(|e| ReleaseError::PostRelease(format!("{action}: {e}")))
    }
}

#[async_trait]
impl DocumentationUpdater for ScriptedActions {
    async fn update_docs_repo(&self, release: &ProjectVersion, branch: &str) -> Result<()> {
        let commands = &self.commands.docs_repo_commands;
        if commands.is_empty() {
            info!(action = "update_docs_repo", "No commands configured; skipping");
            return Ok(());
        }
        async {
            let checkout = self.documentation_checkout(branch).await?;
            self.run("update_docs_repo", commands, &checkout, release.version(), branch)
                .await
        }
        .await
        .map_err(|e| ReleaseError::Documentation(e.to_string()))
    }

    async fn update_project_page(&self, versions: &Projects) -> Result<()> {
        self.run(
            "update_project_page",
            &self.commands.project_page_commands,
            &self.working_dir,
            self.train_version(versions),
            "",
        )
        .await
        .map_err(|e| ReleaseError::Documentation(e.to_string()))
    }
}

#[async_trait]
impl PostReleaseActions for ScriptedActions {
    async fn run_updated_samples(&self, versions: &Projects) -> Result<()> {
        self.run_train_action("run_updated_samples", &self.commands.samples_commands, versions)
            .await
    }

    async fn generate_train_docs(&self, versions: &Projects) -> Result<()> {
        self.run_train_action("generate_train_docs", &self.commands.train_docs_commands, versions)
            .await
    }

    async fn update_all_samples(&self, versions: &Projects) -> Result<()> {
        self.run_train_action(
            "update_all_samples",
            &self.commands.update_all_samples_commands,
            versions,
        )
        .await
    }
}
