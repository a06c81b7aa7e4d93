//! Single-project release pipeline.
//!
//! [`TaskScheduler`] runs the registered tasks for one project in
//! descending weight order and folds their outcomes into a [`RunReport`]:
//!
//! - `Ok(Success | Skipped)`: continue.
//! - `Ok(Failure)` or an error from a non-release task: mark the run
//!   unstable and continue.
//! - An error from a release-phase task: stop, roll back once, abort.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::warn;

use crate::error::ReleaseError;
use crate::obs::{self, ProjectSpan};
use crate::rollback::{RollbackHandler, RollbackReport};
use crate::task::{Arguments, ExecutionResult, Task, TaskPhase, TaskRegistry};

pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// At least one soft fault; every task still ran.
    Unstable,
    /// Stopped early by a hard fault or a cancellation.
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Unstable => write!(f, "unstable"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub name: String,
    pub short_name: String,
    pub phase: TaskPhase,
    pub result: ExecutionResult,
    pub duration_ms: u64,
    /// [`ReleaseError::category`] when the task returned an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<&'static str>,
}

/// Outcome of one project pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub project: String,
    pub version: String,
    pub status: RunStatus,
    /// Every task that was reached, in execution order.
    pub tasks: Vec<TaskRecord>,
    /// What aborted the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn start(args: &Arguments) -> Self {
        let now = Utc::now();
        Self {
            project: args.target.project_name().to_string(),
            version: args.target.version().to_string(),
            status: RunStatus::Success,
            tasks: Vec::new(),
            cause: None,
            rollback: None,
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, task: &dyn Task, result: ExecutionResult, duration_ms: u64) {
        self.tasks.push(TaskRecord {
            name: task.name().to_string(),
            short_name: task.short_name().to_string(),
            phase: task.phase(),
            result,
            duration_ms,
            error_category: None,
        });
    }

    fn record_error(&mut self, task: &dyn Task, err: &ReleaseError, duration_ms: u64) {
        self.record(task, ExecutionResult::failure(err.to_string()), duration_ms);
        if let Some(record) = self.tasks.last_mut() {
            record.error_category = Some(err.category());
        }
    }

    fn mark_unstable(&mut self) {
        if self.status == RunStatus::Success {
            self.status = RunStatus::Unstable;
        }
    }

    fn abort(&mut self, cause: String) {
        self.status = RunStatus::Aborted;
        self.cause = Some(cause);
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == RunStatus::Aborted && self.cause.as_deref() == Some(CANCELLED)
    }

    pub fn task(&self, name: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Names of the tasks that actually ran (not skipped).
    pub fn executed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| !t.result.is_skipped())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.result.is_failure())
            .map(|t| t.name.as_str())
            .collect()
    }
}

pub struct TaskScheduler {
    registry: TaskRegistry,
    rollback: RollbackHandler,
    cancel: Option<watch::Receiver<bool>>,
}

impl TaskScheduler {
    pub fn new(registry: TaskRegistry, rollback: RollbackHandler) -> Self {
        Self {
            registry,
            rollback,
            cancel: None,
        }
    }

    /// Stop before the next task once `cancel` reads `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run every registered task for `args.target`.
    pub async fn run(&self, args: &Arguments) -> RunReport {
        let span = ProjectSpan::new(args.target.project_name(), args.target.version());
        span.instrument(self.run_pipeline(args)).await
    }

    async fn run_pipeline(&self, args: &Arguments) -> RunReport {
        let clock = Instant::now();
        let mut report = RunReport::start(args);

        for task in self.registry.ordered() {
            if self.is_cancelled() {
                warn!(task = task.name(), "Release cancelled before task");
                report.abort(CANCELLED.to_string());
                break;
            }

            if let Some(reason) = task.skip_reason(args) {
                obs::emit_task_skipped(task.name(), &reason);
                report.record(task.as_ref(), ExecutionResult::skipped(reason), 0);
                continue;
            }

            obs::emit_task_started(task.name(), task.header());
            let started = Instant::now();
            let outcome = task.run(args).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    if result.is_failure() {
                        let cause = result.cause.as_deref().unwrap_or_default();
                        obs::emit_task_unstable(task.name(), cause);
                        report.mark_unstable();
                    }
                    obs::emit_task_finished(task.name(), &result.status.to_string(), duration_ms);
                    report.record(task.as_ref(), result, duration_ms);
                }
                Err(e) if task.phase().is_hard() => {
                    obs::emit_task_error(task.name(), &e, true);
                    obs::emit_task_finished(task.name(), "failure", duration_ms);
                    report.record_error(task.as_ref(), &e, duration_ms);
                    report.abort(format!("{}: {e}", task.name()));
                    report.rollback = Some(self.rollback.rollback(args).await);
                    break;
                }
                Err(e) => {
                    obs::emit_task_error(task.name(), &e, false);
                    obs::emit_task_finished(task.name(), "failure", duration_ms);
                    report.record_error(task.as_ref(), &e, duration_ms);
                    report.mark_unstable();
                }
            }
        }

        report.finished_at = Utc::now();
        obs::emit_project_finished(
            &report.project,
            &report.status.to_string(),
            clock.elapsed().as_millis() as u64,
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fakes::{FakeBuilder, FakeCollaborators, FakeDescriptor, FakeDocs};
    use crate::projects::Projects;
    use crate::rollback::RollbackState;
    use crate::task::{RuntimeOptions, TaskStatus};
    use crate::version::ProjectVersion;

    const PROJECT: &str = "spring-cloud-sleuth";

    fn args(version: &str) -> Arguments {
        let target = ProjectVersion::new(PROJECT, version).unwrap();
        Arguments::new(
            format!("/checkouts/{PROJECT}"),
            Arc::new(Projects::from_versions([target.clone()])),
            target,
            RuntimeOptions::default(),
        )
    }

    fn scheduler(fakes: &FakeCollaborators) -> TaskScheduler {
        let c = fakes.collaborators();
        TaskScheduler::new(
            TaskRegistry::builtin(&c),
            RollbackHandler::new(c.descriptor.clone(), c.vcs.clone()),
        )
    }

    #[tokio::test]
    async fn test_all_tasks_succeed() {
        let fakes = FakeCollaborators::new()
            .with_descriptor(FakeDescriptor::new().with_version(PROJECT, "3.1.0.RELEASE"));

        let report = scheduler(&fakes).run(&args("3.1.0.RELEASE")).await;

        assert_eq!(report.status, RunStatus::Success, "{report:?}");
        assert_eq!(report.tasks.len(), 17);
        assert!(report.rollback.is_none());
        // Milestones are closed only with a token configured.
        assert_eq!(report.task("closeMilestone").unwrap().result.status, TaskStatus::Skipped);
    }

    #[tokio::test]
    async fn test_soft_fault_keeps_later_tasks_running() {
        let fakes = FakeCollaborators::new()
            .with_descriptor(FakeDescriptor::new().with_version(PROJECT, "3.1.0.RELEASE"))
            .with_builder(FakeBuilder::new().failing("publish_docs"));

        let report = scheduler(&fakes).run(&args("3.1.0.RELEASE")).await;

        assert_eq!(report.status, RunStatus::Unstable);
        assert_eq!(report.failed(), vec!["publishDocs"]);
        assert!(report.executed().contains(&"updateAllSamples"));
        assert!(report.rollback.is_none());
        assert_eq!(fakes.calls().count("revert_changes"), 0);
    }

    #[tokio::test]
    async fn test_hard_fault_stops_and_rolls_back_once() {
        let fakes = FakeCollaborators::new()
            .with_descriptor(FakeDescriptor::new().with_version(PROJECT, "3.1.0-SNAPSHOT"))
            .with_builder(FakeBuilder::new().failing("build"));

        let report = scheduler(&fakes).run(&args("3.1.0.RELEASE")).await;

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.executed(), vec!["updatePoms", "build"]);
        assert!(report.cause.as_deref().unwrap().starts_with("build:"));
        assert_eq!(report.task("build").unwrap().error_category, Some("build"));
        assert_eq!(report.task("updatePoms").unwrap().error_category, None);
        assert_eq!(report.rollback.unwrap().state, RollbackState::RolledBack);
        assert_eq!(fakes.calls().count("revert_changes"), 1);
        assert_eq!(fakes.calls().count("commit_and_tag"), 0);
    }

    #[tokio::test]
    async fn test_soft_faults_do_not_escalate_to_abort() {
        let fakes = FakeCollaborators::new()
            .with_docs(FakeDocs::new().failing("update_project_page"))
            .with_builder(FakeBuilder::new().failing("publish_docs"));

        let report = scheduler(&fakes).run(&args("3.1.0.RELEASE")).await;

        // updateSagan also fails: the fake descriptor has no version on disk.
        assert_eq!(report.status, RunStatus::Unstable);
        assert_eq!(
            report.failed(),
            vec!["publishDocs", "updateSagan", "updateProjectPage"]
        );
        assert_eq!(
            report.task("updateProjectPage").unwrap().error_category,
            Some("documentation")
        );

        let json = serde_json::to_value(&report).unwrap();
        let page = json["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["name"] == "updateProjectPage")
            .unwrap();
        assert_eq!(page["error_category"], "documentation");
    }

    #[tokio::test]
    async fn test_cancelled_before_first_task() {
        let fakes = FakeCollaborators::new();
        let (tx, rx) = watch::channel(false);
        let scheduler = scheduler(&fakes).with_cancellation(rx);
        tx.send(true).unwrap();

        let report = scheduler.run(&args("3.1.0.RELEASE")).await;

        assert!(report.was_cancelled());
        assert!(report.tasks.is_empty());
        assert!(report.rollback.is_none());
        assert!(fakes.calls().entries().is_empty());
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let fakes = FakeCollaborators::new();
        let report = scheduler(&fakes).run(&args("3.1.0-SNAPSHOT")).await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["tasks"][0]["name"], "updatePoms");
        assert_eq!(json["tasks"][0]["phase"], "release");
    }
}
