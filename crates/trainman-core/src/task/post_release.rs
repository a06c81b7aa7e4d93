//! Per-project publishing tasks.
//!
//! Errors here are soft faults: the run is marked unstable and the next task
//! still runs. Template generators report problems as `Failure` results.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{phase_skip_reason, Arguments, ExecutionResult, Task, TaskPhase};
use crate::collaborators::{
    DescriptorHandler, DocumentationUpdater, ProjectBuilder, ProjectCatalog, TemplateGenerator,
    VcsHandler,
};
use crate::error::Result;
use crate::version::ProjectVersion;

/// Turn a generator outcome into a task result without raising.
pub(crate) fn generated(kind: &str, outcome: Result<Option<PathBuf>>) -> ExecutionResult {
    match outcome {
        Ok(Some(path)) => {
            info!(template = kind, path = %path.display(), "Generated template");
            ExecutionResult::success()
        }
        Ok(None) => ExecutionResult::failure(format!("{kind} template produced no output")),
        Err(e) => ExecutionResult::failure(format!("{kind} template failed: {e}")),
    }
}

pub struct PublishDocsTask {
    builder: Arc<dyn ProjectBuilder>,
}

impl PublishDocsTask {
    pub fn new(builder: Arc<dyn ProjectBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Task for PublishDocsTask {
    fn name(&self) -> &'static str {
        "publishDocs"
    }

    fn short_name(&self) -> &'static str {
        "pd"
    }

    fn header(&self) -> &'static str {
        "PUBLISHING DOCS"
    }

    fn description(&self) -> &'static str {
        "Publish the reference documentation of the released version"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        500
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.builder
            .publish_docs(&args.project_checkout, &args.target)
            .await?;
        Ok(ExecutionResult::success())
    }
}

pub struct CloseMilestoneTask {
    vcs: Arc<dyn VcsHandler>,
}

impl CloseMilestoneTask {
    pub fn new(vcs: Arc<dyn VcsHandler>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Task for CloseMilestoneTask {
    fn name(&self) -> &'static str {
        "closeMilestone"
    }

    fn short_name(&self) -> &'static str {
        "m"
    }

    fn header(&self) -> &'static str {
        "CLOSING MILESTONE"
    }

    fn description(&self) -> &'static str {
        "Close the milestone of the released version"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        450
    }

    fn skip_reason(&self, args: &Arguments) -> Option<String> {
        phase_skip_reason(self.phase(), args).or_else(|| {
            (!args.config().git.has_token())
                .then(|| "no OAuth token configured to close milestones".to_string())
        })
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.vcs.close_milestone(&args.target).await?;
        Ok(ExecutionResult::success())
    }
}

/// Updates the project catalog entry (the project's page on the website).
pub struct UpdateCatalogTask {
    catalog: Arc<dyn ProjectCatalog>,
    vcs: Arc<dyn VcsHandler>,
    descriptor: Arc<dyn DescriptorHandler>,
}

impl UpdateCatalogTask {
    pub fn new(
        catalog: Arc<dyn ProjectCatalog>,
        vcs: Arc<dyn VcsHandler>,
        descriptor: Arc<dyn DescriptorHandler>,
    ) -> Self {
        Self {
            catalog,
            vcs,
            descriptor,
        }
    }
}

#[async_trait]
impl Task for UpdateCatalogTask {
    fn name(&self) -> &'static str {
        "updateSagan"
    }

    fn short_name(&self) -> &'static str {
        "g"
    }

    fn header(&self) -> &'static str {
        "UPDATING PROJECT CATALOG"
    }

    fn description(&self) -> &'static str {
        "Register the released version in the project catalog"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        400
    }

    fn skip_reason(&self, args: &Arguments) -> Option<String> {
        phase_skip_reason(self.phase(), args).or_else(|| {
            (!args.config().catalog.enabled).then(|| "project catalog updates disabled".to_string())
        })
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        let project = args.target.project_name();
        let branch = self.vcs.current_branch(&args.project_checkout).await?;
        let on_disk = self.descriptor.read_version(&args.project_checkout).await?;
        let original = ProjectVersion::new(project, on_disk)?;
        debug!(branch = %branch, original = %original.version(), "Updating catalog entry");
        self.catalog
            .update_entry(project, &branch, &original, &args.target)
            .await?;
        Ok(ExecutionResult::success())
    }
}

/// Generates the email, blog and tweet announcements.
pub struct CreateTemplatesTask {
    templates: Arc<dyn TemplateGenerator>,
}

impl CreateTemplatesTask {
    pub fn new(templates: Arc<dyn TemplateGenerator>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Task for CreateTemplatesTask {
    fn name(&self) -> &'static str {
        "createTemplates"
    }

    fn short_name(&self) -> &'static str {
        "t"
    }

    fn header(&self) -> &'static str {
        "CREATING TEMPLATES"
    }

    fn description(&self) -> &'static str {
        "Generate the email, blog and tweet announcements"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        350
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        let versions = &args.versions;
        let target = &args.target;
        let results = [
            generated("email", self.templates.email(versions, target).await),
            generated("blog", self.templates.blog(versions, target).await),
            generated("tweet", self.templates.tweet(versions, target).await),
        ];

        let causes: Vec<String> = results.into_iter().filter_map(|r| r.cause).collect();
        if causes.is_empty() {
            Ok(ExecutionResult::success())
        } else {
            Ok(ExecutionResult::failure(causes.join("; ")))
        }
    }
}

pub struct ReleaseNotesTask {
    templates: Arc<dyn TemplateGenerator>,
}

impl ReleaseNotesTask {
    pub fn new(templates: Arc<dyn TemplateGenerator>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Task for ReleaseNotesTask {
    fn name(&self) -> &'static str {
        "releaseNotes"
    }

    fn short_name(&self) -> &'static str {
        "rn"
    }

    fn header(&self) -> &'static str {
        "CREATING RELEASE NOTES"
    }

    fn description(&self) -> &'static str {
        "Generate the release notes of the train"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        300
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        let outcome = self
            .templates
            .release_notes(&args.versions, &args.target)
            .await;
        Ok(generated("release notes", outcome))
    }
}

/// Opens issues asking the guides to move to the new release.
pub struct UpdateGuidesTask {
    vcs: Arc<dyn VcsHandler>,
}

impl UpdateGuidesTask {
    pub fn new(vcs: Arc<dyn VcsHandler>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Task for UpdateGuidesTask {
    fn name(&self) -> &'static str {
        "updateGuides"
    }

    fn short_name(&self) -> &'static str {
        "ug"
    }

    fn header(&self) -> &'static str {
        "UPDATING GUIDES"
    }

    fn description(&self) -> &'static str {
        "Open issues to bump the guides to the released version"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        250
    }

    fn skip_reason(&self, args: &Arguments) -> Option<String> {
        if !args.target.is_release_or_service_release() {
            return Some("guides are only updated for GA and service releases".to_string());
        }
        (!args.config().git.update_guides).then(|| "guide updates disabled".to_string())
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.vcs.create_issue(&args.versions, &args.target).await?;
        Ok(ExecutionResult::success())
    }
}

pub struct UpdateDocumentationTask {
    docs: Arc<dyn DocumentationUpdater>,
}

impl UpdateDocumentationTask {
    pub fn new(docs: Arc<dyn DocumentationUpdater>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl Task for UpdateDocumentationTask {
    fn name(&self) -> &'static str {
        "updateDocumentation"
    }

    fn short_name(&self) -> &'static str {
        "ud"
    }

    fn header(&self) -> &'static str {
        "UPDATING DOCUMENTATION REPOSITORY"
    }

    fn description(&self) -> &'static str {
        "Point the documentation repository at the released version"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        200
    }

    fn skip_reason(&self, args: &Arguments) -> Option<String> {
        phase_skip_reason(self.phase(), args).or_else(|| {
            (!args.config().git.update_documentation_repo)
                .then(|| "documentation repository updates disabled".to_string())
        })
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        let branch = &args.config().git.documentation_branch;
        self.docs.update_docs_repo(&args.target, branch).await?;
        Ok(ExecutionResult::success())
    }
}

pub struct UpdateProjectPageTask {
    docs: Arc<dyn DocumentationUpdater>,
}

impl UpdateProjectPageTask {
    pub fn new(docs: Arc<dyn DocumentationUpdater>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl Task for UpdateProjectPageTask {
    fn name(&self) -> &'static str {
        "updateProjectPage"
    }

    fn short_name(&self) -> &'static str {
        "pp"
    }

    fn header(&self) -> &'static str {
        "UPDATING PROJECT PAGE"
    }

    fn description(&self) -> &'static str {
        "Regenerate the project page with the train versions"
    }

    fn phase(&self) -> TaskPhase {
        TaskPhase::PostRelease
    }

    fn order(&self) -> i32 {
        150
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult> {
        self.docs.update_project_page(&args.versions).await?;
        Ok(ExecutionResult::success())
    }
}
