//! Undo a failed release of one project.
//!
//! Every step is best-effort: a failing step is logged and recorded in the
//! report, and never replaces the fault that triggered the rollback.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::collaborators::{DescriptorHandler, VcsHandler};
use crate::obs;
use crate::task::Arguments;
use crate::version::ProjectVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackState {
    /// Snapshot target; nothing was published.
    NotRequired,
    /// Version bump reverted; no restoration commit.
    RevertedOnly,
    /// Version bump reverted and snapshot coordinates restored and committed.
    RolledBack,
}

impl std::fmt::Display for RollbackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackState::NotRequired => write!(f, "not_required"),
            RollbackState::RevertedOnly => write!(f, "reverted_only"),
            RollbackState::RolledBack => write!(f, "rolled_back"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub state: RollbackState,
    /// Version found on disk after the revert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_version: Option<String>,
    /// Steps that failed, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RollbackReport {
    fn new(state: RollbackState) -> Self {
        Self {
            state,
            original_version: None,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, step: &str, err: impl std::fmt::Display) {
        warn!(step = step, error = %err, "Rollback step failed");
        self.errors.push(format!("{step}: {err}"));
    }
}

pub struct RollbackHandler {
    descriptor: Arc<dyn DescriptorHandler>,
    vcs: Arc<dyn VcsHandler>,
}

impl RollbackHandler {
    pub fn new(descriptor: Arc<dyn DescriptorHandler>, vcs: Arc<dyn VcsHandler>) -> Self {
        Self { descriptor, vcs }
    }

    /// Revert the release of `args.target` and, when the project was on a
    /// snapshot before a GA or service release, restore and commit the
    /// snapshot coordinates.
    pub async fn rollback(&self, args: &Arguments) -> RollbackReport {
        let report = self.run_steps(args).await;
        obs::emit_rollback(
            args.target.project_name(),
            &report.state.to_string(),
            report.errors.len(),
        );
        report
    }

    async fn run_steps(&self, args: &Arguments) -> RollbackReport {
        let target = &args.target;
        if target.is_snapshot() {
            info!("Snapshot release failed; nothing to roll back");
            return RollbackReport::new(RollbackState::NotRequired);
        }

        let checkout = &args.project_checkout;
        let mut report = RollbackReport::new(RollbackState::RevertedOnly);

        info!(version = %target.version(), "Reverting version bump");
        if let Err(e) = self.vcs.revert_changes(checkout, target).await {
            report.record("revert_changes", e);
        }

        let original = match self.descriptor.read_version(checkout).await {
            Ok(raw) => ProjectVersion::new(target.project_name(), raw),
            Err(e) => Err(e),
        };
        let original = match original {
            Ok(original) => original,
            Err(e) => {
                report.record("read_version", e);
                return report;
            }
        };
        report.original_version = Some(original.version().to_string());

        if !(target.is_release_or_service_release() && original.is_snapshot()) {
            info!(
                original = %original.version(),
                "Original version is not a snapshot; revert only"
            );
            return report;
        }

        info!(original = %original.version(), "Restoring snapshot versions");
        let restored = args.versions.for_rollback(&original);
        if let Err(e) = self
            .descriptor
            .update_dependency_versions(checkout, &restored, &original, false)
            .await
        {
            report.record("update_dependency_versions", e);
            return report;
        }
        if let Err(e) = self
            .vcs
            .commit_after_bumping_versions(checkout, &original)
            .await
        {
            report.record("commit_after_bumping_versions", e);
            return report;
        }

        report.state = RollbackState::RolledBack;
        report
    }
}
