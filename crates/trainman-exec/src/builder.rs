//! Build tool invocation through configured shell commands.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;
use trainman_core::config::BuildConfig;
use trainman_core::{ProjectBuilder, ProjectVersion, Result};

use crate::command::CommandRunner;

/// [`ProjectBuilder`] running the `build` section's commands, each bounded
/// by `wait_time_minutes`.
pub struct ProcessBuilder {
    config: BuildConfig,
    runner: CommandRunner,
}

impl ProcessBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let runner = CommandRunner::new(config.wait_time());
        Self { config, runner }
    }

    async fn run(&self, project: &Path, version: &ProjectVersion, command: &str) -> Result<()> {
        let command = self.config.render(command, version.version());
        self.runner.run_checked(project, &command).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectBuilder for ProcessBuilder {
    async fn build(&self, project: &Path, version: &ProjectVersion) -> Result<()> {
        info!(version = %version.version(), "Building project");
        self.run(project, version, &self.config.build_command).await
    }

    async fn deploy(&self, project: &Path, version: &ProjectVersion) -> Result<()> {
        info!(version = %version.version(), "Deploying artifacts");
        self.run(project, version, &self.config.deploy_command).await
    }

    async fn publish_docs(&self, project: &Path, version: &ProjectVersion) -> Result<()> {
        for command in &self.config.publish_docs_commands {
            self.run(project, version, command).await?;
        }
        Ok(())
    }
}
