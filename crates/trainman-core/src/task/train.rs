//! Train-wide post-release tasks.
//!
//! During a meta-release these run once, for the release train project.

use std::sync::Arc;

use async_trait::async_trait;

use super::post_release::generated;
use super::{Arguments, ExecutionResult, Task, TaskPhase};
use crate::collaborators::{PostReleaseActions, TemplateGenerator};
use crate::error::Result;

pub struct UpdateReleaseTrainWikiTask {
    templates: Arc<dyn TemplateGenerator>,
}

impl UpdateReleaseTrainWikiTask {
    pub fn new(templates: Arc<dyn TemplateGenerator>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Task for UpdateReleaseTrainWikiTask {
    fn name(&self) -> &'static str {
        "updateReleaseTrainWiki"
    }

    fn short_name(&self) -> &'static str {
        "uw"
    }

    fn header(&self) -> &'static str {
        "UPDATE RELEASE TRAIN WIKI"
    }

    fn description(&self) -> &'static str {
        "Add the release to the release train wiki page"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::TrainPostRelease
    }

    fn order(&self) -> i32 {
        140
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        let outcome = self.templates.wiki(&args.versions, &args.target).await;
        Ok(generated("wiki", outcome))
    }
}

pub struct RunUpdatedSamplesTask {
    actions: Arc<dyn PostReleaseActions>,
}

impl RunUpdatedSamplesTask {
    pub fn new(actions: Arc<dyn PostReleaseActions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl Task for RunUpdatedSamplesTask {
    fn name(&self) -> &'static str {
        "runUpdatedSamples"
    }

    fn short_name(&self) -> &'static str {
        "ws"
    }

    fn header(&self) -> &'static str {
        "RUN UPDATED SAMPLES"
    }

    fn description(&self) -> &'static str {
        "Bump the sample projects to the train and run them"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::TrainPostRelease
    }

    fn order(&self) -> i32 {
        130
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.actions.run_updated_samples(&args.versions).await?;
        Ok(ExecutionResult::success())
    }
}

pub struct GenerateTrainDocsTask {
    actions: Arc<dyn PostReleaseActions>,
}

impl GenerateTrainDocsTask {
    pub fn new(actions: Arc<dyn PostReleaseActions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl Task for GenerateTrainDocsTask {
    fn name(&self) -> &'static str {
        "generateTrainDocs"
    }

    fn short_name(&self) -> &'static str {
        "td"
    }

    fn header(&self) -> &'static str {
        "GENERATE RELEASE TRAIN DOCUMENTATION"
    }

    fn description(&self) -> &'static str {
        "Generate the aggregated documentation of the train"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::TrainPostRelease
    }

    fn order(&self) -> i32 {
        120
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.actions.generate_train_docs(&args.versions).await?;
        Ok(ExecutionResult::success())
    }
}

pub struct UpdateAllSamplesTask {
    actions: Arc<dyn PostReleaseActions>,
}

impl UpdateAllSamplesTask {
    pub fn new(actions: Arc<dyn PostReleaseActions>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl Task for UpdateAllSamplesTask {
    fn name(&self) -> &'static str {
        "updateAllSamples"
    }

    fn short_name(&self) -> &'static str {
        "us"
    }

    fn header(&self) -> &'static str {
        "UPDATE ALL SAMPLES"
    }

    fn description(&self) -> &'static str {
        "Push the train versions to every sample repository"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::TrainPostRelease
    }

    fn order(&self) -> i32 {
        110
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.actions.update_all_samples(&args.versions).await?;
        Ok(ExecutionResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaserConfig;
    use crate::fakes::{FakePostRelease, FakeTemplates};
    use crate::projects::Projects;
    use crate::task::RuntimeOptions;
    use crate::version::ProjectVersion;

    fn args(project: &str, meta_release: bool) -> Arguments {
        let target = ProjectVersion::new(project, "2021.0.0").unwrap();
        let options = RuntimeOptions {
            config: Arc::new(ReleaserConfig::default()),
            meta_release,
        };
        Arguments::new(
            format!("/checkouts/{project}"),
            Arc::new(Projects::from_versions([target.clone()])),
            target,
            options,
        )
    }

    #[test]
    fn test_train_tasks_skip_other_projects_in_meta_release() {
        let task = GenerateTrainDocsTask::new(Arc::new(FakePostRelease::new()));

        assert!(task.skip_reason(&args("spring-cloud-build", true)).is_some());
        assert!(task.skip_reason(&args("spring-cloud-release", true)).is_none());
        assert!(task.skip_reason(&args("spring-cloud-build", false)).is_none());
    }

    #[tokio::test]
    async fn test_wiki_without_output_is_failure() {
        let task = UpdateReleaseTrainWikiTask::new(Arc::new(
            FakeTemplates::new().producing_nothing("wiki"),
        ));
        let result = task.run(&args("spring-cloud-release", true)).await.unwrap();
        assert!(result.is_failure());
    }
}
