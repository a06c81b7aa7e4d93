//! Release a whole train, one project after another.
//!
//! [`MetaReleaseCoordinator`] clones each project and drives the
//! single-project pipeline over it. Projects on the configured skip-list are
//! recorded as skipped. The first aborted project stops the train: later
//! projects may manage a version of it and must not be released against a
//! broken artifact. Projects already released stay released.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::collaborators::VcsHandler;
use crate::obs;
use crate::projects::Projects;
use crate::scheduler::{RunReport, RunStatus, TaskScheduler, CANCELLED};
use crate::task::{Arguments, RuntimeOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectOutcome {
    Success,
    Unstable,
    Aborted,
    /// On the configured skip-list.
    Skipped,
    /// Not reached because the train stopped earlier.
    NotAttempted,
}

impl From<RunStatus> for ProjectOutcome {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => ProjectOutcome::Success,
            RunStatus::Unstable => ProjectOutcome::Unstable,
            RunStatus::Aborted => ProjectOutcome::Aborted,
        }
    }
}

impl std::fmt::Display for ProjectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectOutcome::Success => "success",
            ProjectOutcome::Unstable => "unstable",
            ProjectOutcome::Aborted => "aborted",
            ProjectOutcome::Skipped => "skipped",
            ProjectOutcome::NotAttempted => "not_attempted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainEntry {
    pub project: String,
    pub outcome: ProjectOutcome,
    /// Pipeline report, when the pipeline was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl TrainEntry {
    fn without_run(project: &str, outcome: ProjectOutcome, cause: Option<String>) -> Self {
        Self {
            project: project.to_string(),
            outcome,
            report: None,
            cause,
        }
    }
}

/// Ordered outcome of every project of a train.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub train_id: String,
    pub entries: Vec<TrainEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TrainReport {
    pub fn entry(&self, project: &str) -> Option<&TrainEntry> {
        self.entries.iter().find(|e| e.project == project)
    }

    pub fn outcome(&self, project: &str) -> Option<ProjectOutcome> {
        self.entry(project).map(|e| e.outcome)
    }

    /// Projects whose pipeline was started, in order.
    pub fn attempted(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.report.is_some())
            .map(|e| e.project.as_str())
            .collect()
    }

    fn any(&self, outcome: ProjectOutcome) -> bool {
        self.entries.iter().any(|e| e.outcome == outcome)
    }

    pub fn is_success(&self) -> bool {
        !self.any(ProjectOutcome::Aborted) && !self.any(ProjectOutcome::Unstable)
    }

    /// `0` when everything succeeded or was skipped, `2` when something is
    /// unstable, `1` when the train was aborted.
    pub fn exit_code(&self) -> i32 {
        if self.any(ProjectOutcome::Aborted) {
            1
        } else if self.any(ProjectOutcome::Unstable) {
            2
        } else {
            0
        }
    }
}

pub struct MetaReleaseCoordinator {
    scheduler: TaskScheduler,
    vcs: Arc<dyn VcsHandler>,
    options: RuntimeOptions,
    cancel: Option<watch::Receiver<bool>>,
}

impl MetaReleaseCoordinator {
    pub fn new(
        scheduler: TaskScheduler,
        vcs: Arc<dyn VcsHandler>,
        options: &RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            vcs,
            options: options.for_meta_release(),
            cancel: None,
        }
    }

    /// Stop before the next project once `cancel` reads `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) || self.scheduler.is_cancelled()
    }

    /// Release `train` in order against the train-wide `versions`.
    pub async fn run(&self, train: &[String], versions: Arc<Projects>) -> TrainReport {
        let train_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let config = &self.options.config;
        info!(train_id = %train_id, projects = train.len(), "Starting meta-release");

        let mut entries = Vec::with_capacity(train.len());
        let mut stopped_by: Option<String> = None;

        for project in train {
            if let Some(cause) = &stopped_by {
                entries.push(TrainEntry::without_run(
                    project,
                    ProjectOutcome::NotAttempted,
                    Some(cause.clone()),
                ));
                continue;
            }

            if config.is_skipped(project) {
                info!(project = %project, "Project is on the skip-list");
                entries.push(TrainEntry::without_run(project, ProjectOutcome::Skipped, None));
                continue;
            }

            if self.is_cancelled() {
                warn!(project = %project, "Meta-release cancelled");
                entries.push(TrainEntry::without_run(
                    project,
                    ProjectOutcome::Aborted,
                    Some(CANCELLED.to_string()),
                ));
                stopped_by = Some(CANCELLED.to_string());
                continue;
            }

            let entry = self.release_project(project, &versions).await;
            if entry.outcome == ProjectOutcome::Aborted {
                error!(project = %project, "Project aborted; stopping the train");
                stopped_by = Some(format!("train stopped after {project} aborted"));
            }
            entries.push(entry);
        }

        let report = TrainReport {
            train_id,
            entries,
            started_at,
            finished_at: Utc::now(),
        };
        obs::emit_train_finished(&report.train_id, report.attempted().len(), report.is_success());
        report
    }

    async fn release_project(&self, project: &str, versions: &Arc<Projects>) -> TrainEntry {
        let target = match versions.require(project) {
            Ok(target) => target.clone(),
            Err(e) => {
                return TrainEntry::without_run(
                    project,
                    ProjectOutcome::Aborted,
                    Some(e.to_string()),
                );
            }
        };

        let checkout = match self.vcs.clone_project(project).await {
            Ok(checkout) => checkout,
            Err(e) => {
                error!(project = %project, error = %e, "Failed to clone project");
                return TrainEntry::without_run(
                    project,
                    ProjectOutcome::Aborted,
                    Some(format!("clone failed: {e}")),
                );
            }
        };

        let args = Arguments::new(checkout, Arc::clone(versions), target, self.options.clone());
        let report = self.scheduler.run(&args).await;
        TrainEntry {
            project: project.to_string(),
            outcome: report.status.into(),
            cause: report.cause.clone(),
            report: Some(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCollaborators, FakeVcs};
    use crate::rollback::RollbackHandler;
    use crate::task::TaskRegistry;
    use crate::version::ProjectVersion;

    fn train(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn versions(names: &[&str]) -> Arc<Projects> {
        Arc::new(
            names
                .iter()
                .map(|n| ProjectVersion::new(*n, "1.0.0-SNAPSHOT").unwrap())
                .collect(),
        )
    }

    fn coordinator(fakes: &FakeCollaborators) -> MetaReleaseCoordinator {
        let c = fakes.collaborators();
        let scheduler = TaskScheduler::new(
            TaskRegistry::builtin(&c),
            RollbackHandler::new(c.descriptor.clone(), c.vcs.clone()),
        );
        MetaReleaseCoordinator::new(scheduler, c.vcs.clone(), &RuntimeOptions::default())
    }

    #[tokio::test]
    async fn test_missing_version_aborts_train() {
        let fakes = FakeCollaborators::new();
        let report = coordinator(&fakes)
            .run(&train(&["a", "b"]), versions(&["b"]))
            .await;

        assert_eq!(report.outcome("a"), Some(ProjectOutcome::Aborted));
        assert_eq!(report.outcome("b"), Some(ProjectOutcome::NotAttempted));
        assert!(report.attempted().is_empty());
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_clone_failure_aborts_train() {
        let fakes = FakeCollaborators::new().with_vcs(FakeVcs::new().failing("clone_project:a"));
        let report = coordinator(&fakes)
            .run(&train(&["a", "b"]), versions(&["a", "b"]))
            .await;

        let entry = report.entry("a").unwrap();
        assert_eq!(entry.outcome, ProjectOutcome::Aborted);
        assert!(entry.cause.as_deref().unwrap().starts_with("clone failed"));
        assert_eq!(report.outcome("b"), Some(ProjectOutcome::NotAttempted));
    }

    #[tokio::test]
    async fn test_cancelled_train_stops_before_next_project() {
        let fakes = FakeCollaborators::new();
        let (tx, rx) = watch::channel(true);
        let report = coordinator(&fakes)
            .with_cancellation(rx)
            .run(&train(&["a", "b"]), versions(&["a", "b"]))
            .await;
        drop(tx);

        assert_eq!(report.entry("a").unwrap().cause.as_deref(), Some(CANCELLED));
        assert_eq!(report.outcome("b"), Some(ProjectOutcome::NotAttempted));
        assert_eq!(fakes.calls().count("clone_project"), 0);
    }

    #[test]
    fn test_exit_codes() {
        let entry = |outcome| TrainEntry::without_run("p", outcome, None);
        let report = |entries| TrainReport {
            train_id: "t".to_string(),
            entries,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let exit_code = |a, b| report(vec![entry(a), entry(b)]).exit_code();
        assert_eq!(exit_code(ProjectOutcome::Success, ProjectOutcome::Skipped), 0);
        assert_eq!(exit_code(ProjectOutcome::Unstable, ProjectOutcome::Success), 2);
        assert_eq!(exit_code(ProjectOutcome::Unstable, ProjectOutcome::Aborted), 1);
    }
}
