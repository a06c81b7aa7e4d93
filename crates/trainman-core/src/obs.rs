//! Structured observability hooks for release pipelines.
//!
//! Every emitter logs a stable `event` field so log aggregation can follow a
//! train: `task.started`, `task.finished`, `task.skipped`, `task.unstable`,
//! `task.failed`, `rollback.finished`, `project.finished` and
//! `train.finished`. Errors carry their [`ReleaseError::category`].

use std::future::Future;

use tracing::instrument::Instrumented;
use tracing::{error, info, warn, Instrument};

use crate::error::ReleaseError;

/// Span that tags everything logged during one project pipeline.
///
/// The pipeline awaits collaborators, so the span is attached to the
/// pipeline future rather than entered on the current thread.
///
/// ```ignore
/// let span = ProjectSpan::new("spring-cloud-sleuth", "3.1.0.RELEASE");
/// span.instrument(pipeline).await;
/// ```
pub struct ProjectSpan {
    span: tracing::Span,
}

impl ProjectSpan {
    pub fn new(project: &str, version: &str) -> Self {
        Self {
            span: tracing::info_span!("trainman.project", project = %project, version = %version),
        }
    }

    pub fn instrument<F: Future>(&self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span.clone())
    }
}

pub fn emit_task_started(task: &str, header: &str) {
    info!(event = "task.started", task = %task, "{header}");
}

pub fn emit_task_finished(task: &str, status: &str, duration_ms: u64) {
    info!(
        event = "task.finished",
        task = %task,
        status = %status,
        duration_ms = duration_ms,
    );
}

pub fn emit_task_skipped(task: &str, reason: &str) {
    info!(event = "task.skipped", task = %task, reason = %reason);
}

/// Soft faults are logged at warn level and never stop the pipeline.
pub fn emit_task_unstable(task: &str, cause: &str) {
    warn!(event = "task.unstable", task = %task, cause = %cause);
}

/// A task returned an error: `task.failed` for a hard fault, otherwise
/// `task.unstable`.
pub fn emit_task_error(task: &str, err: &ReleaseError, hard: bool) {
    if hard {
        error!(
            event = "task.failed",
            task = %task,
            category = err.category(),
            timed_out = err.is_timeout(),
            cause = %err,
        );
    } else {
        warn!(
            event = "task.unstable",
            task = %task,
            category = err.category(),
            timed_out = err.is_timeout(),
            cause = %err,
        );
    }
}

pub fn emit_rollback(project: &str, state: &str, errors: usize) {
    warn!(
        event = "rollback.finished",
        project = %project,
        state = %state,
        errors = errors,
    );
}

pub fn emit_project_finished(project: &str, status: &str, duration_ms: u64) {
    info!(
        event = "project.finished",
        project = %project,
        status = %status,
        duration_ms = duration_ms,
    );
}

pub fn emit_train_finished(train_id: &str, attempted: usize, success: bool) {
    info!(
        event = "train.finished",
        train_id = %train_id,
        attempted = attempted,
        success = success,
    );
}
