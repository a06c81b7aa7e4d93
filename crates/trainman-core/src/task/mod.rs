//! Release tasks and the ordered task registry.
//!
//! A task is a stateless unit of work that delegates to one collaborator.
//! Per-run state travels in [`Arguments`]. Tasks run in descending
//! [`Task::order`]; equal weights keep registration order.
//!
//! The [`TaskPhase`] decides how an error is treated: an error from a
//! `Release` task is a hard fault (stop and roll back), an error from any
//! other phase is a soft fault (mark unstable and continue).

pub mod post_release;
pub mod release;
pub mod train;

use std::cmp::Reverse;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collaborators::Collaborators;
use crate::config::ReleaserConfig;
use crate::error::{ReleaseError, Result};
use crate::projects::Projects;
use crate::version::ProjectVersion;

pub use post_release::{
    CloseMilestoneTask, CreateTemplatesTask, PublishDocsTask, ReleaseNotesTask,
    UpdateCatalogTask, UpdateDocumentationTask, UpdateGuidesTask, UpdateProjectPageTask,
};
pub use release::{BuildTask, CommitTask, DeployTask, PushTask, UpdateDescriptorsTask};
pub use train::{
    GenerateTrainDocsTask, RunUpdatedSamplesTask, UpdateAllSamplesTask, UpdateReleaseTrainWikiTask,
};

/// When in a release a task runs, and how its failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Version bump, build, tag, deploy, push. Errors are hard faults.
    Release,
    /// Per-project publishing. Errors are soft faults.
    PostRelease,
    /// Train-wide publishing, run once for the release train project.
    TrainPostRelease,
}

impl TaskPhase {
    /// Whether an error in this phase aborts the pipeline.
    pub fn is_hard(&self) -> bool {
        matches!(self, TaskPhase::Release)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Release => write!(f, "release"),
            TaskPhase::PostRelease => write!(f, "post-release"),
            TaskPhase::TrainPostRelease => write!(f, "train-post-release"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failure => write!(f, "failure"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of a task that ran to completion.
///
/// `Failure` is for expected, recoverable problems; a task that cannot
/// produce a meaningful result returns an error instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self {
            status: TaskStatus::Success,
            cause: None,
        }
    }

    pub fn failure(cause: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failure,
            cause: Some(cause.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Skipped,
            cause: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == TaskStatus::Failure
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }
}

/// Immutable runtime options shared by every task of a run.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub config: Arc<ReleaserConfig>,
    /// Set while the meta-release coordinator drives the pipeline.
    pub meta_release: bool,
}

impl RuntimeOptions {
    pub fn new(config: Arc<ReleaserConfig>) -> Self {
        Self {
            config,
            meta_release: false,
        }
    }

    pub fn for_meta_release(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            meta_release: true,
        }
    }
}

/// The only input a task receives.
#[derive(Debug, Clone)]
pub struct Arguments {
    pub project_checkout: PathBuf,
    pub versions: Arc<Projects>,
    /// Version this project is being released as.
    pub target: ProjectVersion,
    pub options: RuntimeOptions,
}

impl Arguments {
    pub fn new(
        project_checkout: impl Into<PathBuf>,
        versions: Arc<Projects>,
        target: ProjectVersion,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            project_checkout: project_checkout.into(),
            versions,
            target,
            options,
        }
    }

    pub fn config(&self) -> &ReleaserConfig {
        &self.options.config
    }

    /// Whether this run is for the project hosting the train BOM.
    pub fn is_release_train_project(&self) -> bool {
        self.target.project_name() == self.config().meta_release.release_train_project_name
    }
}

/// A single step of a project release.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable identifier, e.g. `updateReleaseTrainWiki`.
    fn name(&self) -> &'static str;

    /// Two or three letter code for command-line selection.
    fn short_name(&self) -> &'static str;

    /// Banner printed when the task starts.
    fn header(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn phase(&self) -> TaskPhase;

    /// Ordering weight. Higher weights run first.
    fn order(&self) -> i32;

    /// Reason to skip this task for `args`, or `None` to run it.
    fn skip_reason(&self, args: &Arguments) -> Option<String> {
        phase_skip_reason(self.phase(), args)
    }

    async fn run(&self, args: &Arguments) -> Result<ExecutionResult>;
}

/// Skip rules shared by every task of a phase.
///
/// Nothing is published for snapshots, and train-wide tasks only run for
/// the release train project when driven by the meta-release coordinator.
pub fn phase_skip_reason(phase: TaskPhase, args: &Arguments) -> Option<String> {
    match phase {
        TaskPhase::Release => None,
        TaskPhase::PostRelease | TaskPhase::TrainPostRelease if args.target.is_snapshot() => {
            Some("nothing is published for a SNAPSHOT version".to_string())
        }
        TaskPhase::TrainPostRelease
            if args.options.meta_release && !args.is_release_train_project() =>
        {
            Some(format!(
                "train-wide task runs only for {}",
                args.config().meta_release.release_train_project_name
            ))
        }
        _ => None,
    }
}

/// Display data of a registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDescriptor {
    pub name: &'static str,
    pub short_name: &'static str,
    pub header: &'static str,
    pub description: &'static str,
    pub phase: TaskPhase,
    pub order: i32,
}

impl TaskDescriptor {
    fn of(task: &dyn Task) -> Self {
        Self {
            name: task.name(),
            short_name: task.short_name(),
            header: task.header(),
            description: task.description(),
            phase: task.phase(),
            order: task.order(),
        }
    }
}

/// Registered tasks, assembled once at startup.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in task wired to `collaborators`.
    pub fn builtin(collaborators: &Collaborators) -> Self {
        let c = collaborators;
        Self::new()
            .with(UpdateDescriptorsTask::new(c.descriptor.clone()))
            .with(BuildTask::new(c.builder.clone()))
            .with(CommitTask::new(c.vcs.clone()))
            .with(DeployTask::new(c.builder.clone()))
            .with(PushTask::new(c.vcs.clone()))
            .with(PublishDocsTask::new(c.builder.clone()))
            .with(CloseMilestoneTask::new(c.vcs.clone()))
            .with(UpdateCatalogTask::new(
                c.catalog.clone(),
                c.vcs.clone(),
                c.descriptor.clone(),
            ))
            .with(CreateTemplatesTask::new(c.templates.clone()))
            .with(ReleaseNotesTask::new(c.templates.clone()))
            .with(UpdateGuidesTask::new(c.vcs.clone()))
            .with(UpdateDocumentationTask::new(c.docs.clone()))
            .with(UpdateProjectPageTask::new(c.docs.clone()))
            .with(UpdateReleaseTrainWikiTask::new(c.templates.clone()))
            .with(RunUpdatedSamplesTask::new(c.post_release.clone()))
            .with(GenerateTrainDocsTask::new(c.post_release.clone()))
            .with(UpdateAllSamplesTask::new(c.post_release.clone()))
    }

    pub fn with(mut self, task: impl Task + 'static) -> Self {
        self.register(Arc::new(task));
        self
    }

    pub fn register(&mut self, task: Arc<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in execution order: descending weight, stable on ties.
    pub fn ordered(&self) -> Vec<Arc<dyn Task>> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|t| Reverse(t.order()));
        tasks
    }

    pub fn descriptors(&self) -> Vec<TaskDescriptor> {
        self.ordered()
            .iter()
            .map(|t| TaskDescriptor::of(t.as_ref()))
            .collect()
    }

    /// Look a task up by name or short name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks
            .iter()
            .find(|t| t.name() == name || t.short_name() == name)
            .cloned()
    }

    /// Registry restricted to the named tasks (by name or short name).
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut selected = Self::new();
        for name in names {
            let task = self.find(name.as_ref()).ok_or_else(|| self.unknown(name.as_ref()))?;
            if !selected.tasks.iter().any(|t| t.name() == task.name()) {
                selected.register(task);
            }
        }
        Ok(selected)
    }

    /// Registry holding `name` and every task ordered after it.
    pub fn starting_from(&self, name: &str) -> Result<Self> {
        let ordered = self.ordered();
        let start = ordered
            .iter()
            .position(|t| t.name() == name || t.short_name() == name)
            .ok_or_else(|| self.unknown(name))?;
        Ok(Self {
            tasks: ordered[start..].to_vec(),
        })
    }

    fn unknown(&self, name: &str) -> ReleaseError {
        let known: Vec<String> = self
            .ordered()
            .iter()
            .map(|t| format!("{} ({})", t.name(), t.short_name()))
            .collect();
        ReleaseError::Config(format!(
            "unknown task `{name}`; known tasks: {}",
            known.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeCollaborators;

    struct Named {
        name: &'static str,
        order: i32,
    }

    #[async_trait]
    impl Task for Named {
        fn name(&self) -> &'static str {
            self.name
        }
        fn short_name(&self) -> &'static str {
            self.name
        }
        fn header(&self) -> &'static str {
            "NAMED"
        }
        fn description(&self) -> &'static str {
            "test task"
        }
        fn phase(&self) -> TaskPhase {
            TaskPhase::PostRelease
        }
        fn order(&self) -> i32 {
            self.order
        }
        async fn run(&self, _args: &Arguments) -> Result<ExecutionResult> {
            Ok(ExecutionResult::success())
        }
    }

    fn names(registry: &TaskRegistry) -> Vec<&'static str> {
        registry.ordered().iter().map(|t| t.name()).collect()
    }

    #[test]
    fn test_ordered_descending_and_stable() {
        let registry = TaskRegistry::new()
            .with(Named { name: "low", order: -5 })
            .with(Named { name: "tie-a", order: 10 })
            .with(Named { name: "high", order: 100 })
            .with(Named { name: "tie-b", order: 10 });

        assert_eq!(names(&registry), vec!["high", "tie-a", "tie-b", "low"]);
    }

    #[test]
    fn test_builtin_registry_order() {
        let registry = TaskRegistry::builtin(&FakeCollaborators::new().collaborators());
        let ordered = names(&registry);

        assert_eq!(ordered.len(), 17);
        assert_eq!(&ordered[..5], &["updatePoms", "build", "commit", "deploy", "push"]);
        assert_eq!(ordered.last(), Some(&"updateAllSamples"));

        let release_done = registry
            .ordered()
            .iter()
            .position(|t| t.phase() != TaskPhase::Release)
            .unwrap();
        assert!(registry.ordered()[release_done..]
            .iter()
            .all(|t| t.phase() != TaskPhase::Release));
    }

    #[test]
    fn test_builtin_short_names_are_unique() {
        let registry = TaskRegistry::builtin(&FakeCollaborators::new().collaborators());
        let mut shorts: Vec<&str> = registry.descriptors().iter().map(|d| d.short_name).collect();
        shorts.sort_unstable();
        shorts.dedup();
        assert_eq!(shorts.len(), registry.len());
    }

    #[test]
    fn test_select_by_name_and_short_name() {
        let registry = TaskRegistry::builtin(&FakeCollaborators::new().collaborators());
        let selected = registry.select(&["uw", "build", "build"]).unwrap();
        assert_eq!(names(&selected), vec!["build", "updateReleaseTrainWiki"]);
    }

    #[test]
    fn test_select_unknown_lists_known_tasks() {
        let registry = TaskRegistry::builtin(&FakeCollaborators::new().collaborators());
        let err = registry.select(&["nope"]).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("unknown task `nope`"));
        assert!(msg.contains("updatePoms (u)"));
    }

    #[test]
    fn test_starting_from() {
        let registry = TaskRegistry::builtin(&FakeCollaborators::new().collaborators());
        let rest = registry.starting_from("push").unwrap();
        let ordered = names(&rest);
        assert_eq!(ordered.first(), Some(&"push"));
        assert!(!ordered.contains(&"deploy"));
        assert_eq!(ordered.len(), 13);
    }

    #[test]
    fn test_phase_hardness() {
        assert!(TaskPhase::Release.is_hard());
        assert!(!TaskPhase::PostRelease.is_hard());
        assert!(!TaskPhase::TrainPostRelease.is_hard());
    }
}
