//! Release-phase tasks: bump, build, tag, deploy, push.
//!
//! Any error returned here is a hard fault.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Arguments, ExecutionResult, Task, TaskPhase};
use crate::collaborators::{DescriptorHandler, ProjectBuilder, VcsHandler};
use crate::error::Result;

pub struct UpdateDescriptorsTask {
    descriptor: Arc<dyn DescriptorHandler>,
}

impl UpdateDescriptorsTask {
    pub fn new(descriptor: Arc<dyn DescriptorHandler>) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Task for UpdateDescriptorsTask {
    fn name(&self) -> &'static str {
        "updatePoms"
    }

    fn short_name(&self) -> &'static str {
        "u"
    }

    fn header(&self) -> &'static str {
        "UPDATING VERSIONS"
    }

    fn description(&self) -> &'static str {
        "Update the project and its managed dependencies to the train versions"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::Release
    }

    fn order(&self) -> i32 {
        1000
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.descriptor
            .update_dependency_versions(&args.project_checkout, &args.versions, &args.target, true)
            .await?;
        Ok(ExecutionResult::success())
    }
}

pub struct BuildTask {
    builder: Arc<dyn ProjectBuilder>,
}

impl BuildTask {
    pub fn new(builder: Arc<dyn ProjectBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Task for BuildTask {
    fn name(&self) -> &'static str {
        "build"
    }

    fn short_name(&self) -> &'static str {
        "b"
    }

    fn header(&self) -> &'static str {
        "BUILD PROJECT"
    }

    fn description(&self) -> &'static str {
        "Build the project with the configured build command"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::Release
    }

    fn order(&self) -> i32 {
        900
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.builder.build(&args.project_checkout, &args.target).await?;
        Ok(ExecutionResult::success())
    }
}

pub struct CommitTask {
    vcs: Arc<dyn VcsHandler>,
}

impl CommitTask {
    pub fn new(vcs: Arc<dyn VcsHandler>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Task for CommitTask {
    fn name(&self) -> &'static str {
        "commit"
    }

    fn short_name(&self) -> &'static str {
        "c"
    }

    fn header(&self) -> &'static str {
        "COMMITTING (ALL) AND PUSHING TAGS (NON-SNAPSHOTS)"
    }

    fn description(&self) -> &'static str {
        "Commit the version bump and tag non-snapshot releases"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::Release
    }

    fn order(&self) -> i32 {
        800
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.vcs
            .commit_and_tag(&args.project_checkout, &args.target)
            .await?;
        Ok(ExecutionResult::success())
    }
}

pub struct DeployTask {
    builder: Arc<dyn ProjectBuilder>,
}

impl DeployTask {
    pub fn new(builder: Arc<dyn ProjectBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Task for DeployTask {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn short_name(&self) -> &'static str {
        "d"
    }

    fn header(&self) -> &'static str {
        "ARTIFACT DEPLOYMENT"
    }

    fn description(&self) -> &'static str {
        "Deploy the built artifacts to the artifact repository"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::Release
    }

    fn order(&self) -> i32 {
        700
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.builder.deploy(&args.project_checkout, &args.target).await?;
        Ok(ExecutionResult::success())
    }
}

pub struct PushTask {
    vcs: Arc<dyn VcsHandler>,
}

impl PushTask {
    pub fn new(vcs: Arc<dyn VcsHandler>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Task for PushTask {
    fn name(&self) -> &'static str {
        "push"
    }

    fn short_name(&self) -> &'static str {
        "p"
    }

    fn header(&self) -> &'static str {
        "PUSHING CHANGES"
    }

    fn description(&self) -> &'static str {
        "Push the release commit and tags to the remote"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::Release
    }

    fn order(&self) -> i32 {
        600
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.vcs.push_current_branch(&args.project_checkout).await?;
        Ok(ExecutionResult::success())
    }
}
