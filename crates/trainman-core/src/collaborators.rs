//! Contracts for the external systems the release engine drives.
//!
//! The engine never touches descriptors, repositories, build tools or web
//! APIs directly. Each concern is an async trait object injected at startup;
//! `trainman-exec` provides process-backed implementations and
//! [`crate::fakes`] provides in-memory ones for tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::projects::Projects;
use crate::version::ProjectVersion;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Reads and rewrites a project's build descriptor (POM, Gradle properties, ...).
#[async_trait]
pub trait DescriptorHandler: Send + Sync {
    /// Name of the project checked out at `project`.
    async fn read_project_name(&self, project: &Path) -> Result<String>;

    /// Version currently declared by the descriptor at `project`.
    async fn read_version(&self, project: &Path) -> Result<String>;

    /// Every dependency-managed `(project, version)` pair declared by a BOM.
    async fn read_bom_versions(&self, bom: &Path) -> Result<Vec<(String, String)>>;

    /// Rewrite the project version to `target` and every managed dependency
    /// to its entry in `versions`.
    ///
    /// With `assert_snapshots` set, a snapshot coordinate left behind for a
    /// non-snapshot `target` is a `DescriptorUpdate` error.
    async fn update_dependency_versions(
        &self,
        project: &Path,
        versions: &Projects,
        target: &ProjectVersion,
        assert_snapshots: bool,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VcsHandler: Send + Sync {
    /// Clone `project_name` from the configured organization, returning the checkout.
    async fn clone_project(&self, project_name: &str) -> Result<PathBuf>;

    /// Commit the version bump and, for non-snapshots, tag it.
    async fn commit_and_tag(&self, project: &Path, version: &ProjectVersion) -> Result<()>;

    /// Revert the version bump commit and tag, if any were made.
    async fn revert_changes(&self, project: &Path, version: &ProjectVersion) -> Result<()>;

    /// Commit descriptors restored to `version` after a rollback.
    async fn commit_after_bumping_versions(
        &self,
        project: &Path,
        version: &ProjectVersion,
    ) -> Result<()>;

    async fn push_current_branch(&self, project: &Path) -> Result<()>;

    async fn current_branch(&self, project: &Path) -> Result<String>;

    /// Switch the checkout at `project` to `branch`.
    async fn checkout_branch(&self, project: &Path, branch: &str) -> Result<()>;

    async fn close_milestone(&self, version: &ProjectVersion) -> Result<()>;

    /// Open an issue asking downstream guides to move to `version`.
    async fn create_issue(&self, versions: &Projects, version: &ProjectVersion) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Build tool
// ---------------------------------------------------------------------------

/// Subprocess-backed build tool, bounded by the configured wait time.
#[async_trait]
pub trait ProjectBuilder: Send + Sync {
    async fn build(&self, project: &Path, version: &ProjectVersion) -> Result<()>;

    async fn deploy(&self, project: &Path, version: &ProjectVersion) -> Result<()>;

    async fn publish_docs(&self, project: &Path, version: &ProjectVersion) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Generates release announcement artifacts.
///
/// `Ok(None)` means the generator ran but produced nothing.
#[async_trait]
pub trait TemplateGenerator: Send + Sync {
    async fn email(&self, versions: &Projects, release: &ProjectVersion)
        -> Result<Option<PathBuf>>;

    async fn blog(&self, versions: &Projects, release: &ProjectVersion) -> Result<Option<PathBuf>>;

    async fn tweet(&self, versions: &Projects, release: &ProjectVersion)
        -> Result<Option<PathBuf>>;

    async fn release_notes(
        &self,
        versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>>;

    async fn wiki(&self, versions: &Projects, release: &ProjectVersion) -> Result<Option<PathBuf>>;
}

/// Project catalog web API (the project pages listing released versions).
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    async fn update_entry(
        &self,
        project: &str,
        branch: &str,
        original: &ProjectVersion,
        release: &ProjectVersion,
    ) -> Result<()>;
}

#[async_trait]
pub trait DocumentationUpdater: Send + Sync {
    async fn update_docs_repo(&self, release: &ProjectVersion, branch: &str) -> Result<()>;

    async fn update_project_page(&self, versions: &Projects) -> Result<()>;
}

/// Train-wide actions run once the train has been released.
#[async_trait]
pub trait PostReleaseActions: Send + Sync {
    async fn run_updated_samples(&self, versions: &Projects) -> Result<()>;

    async fn generate_train_docs(&self, versions: &Projects) -> Result<()>;

    async fn update_all_samples(&self, versions: &Projects) -> Result<()>;
}

/// Every collaborator the built-in tasks need.
#[derive(Clone)]
pub struct Collaborators {
    pub descriptor: Arc<dyn DescriptorHandler>,
    pub vcs: Arc<dyn VcsHandler>,
    pub builder: Arc<dyn ProjectBuilder>,
    pub templates: Arc<dyn TemplateGenerator>,
    pub catalog: Arc<dyn ProjectCatalog>,
    pub docs: Arc<dyn DocumentationUpdater>,
    pub post_release: Arc<dyn PostReleaseActions>,
}
