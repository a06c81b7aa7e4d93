//! In-memory fakes for the collaborator traits (testing only)
//!
//! Every fake appends `operation:subject` entries to a [`CallLog`]. Fakes
//! wired through [`FakeCollaborators`] share one log, so tests can assert the
//! global order of collaborator calls. Failures are scripted per operation
//! (`"deploy"`) or per operation and subject (`"deploy:spring-cloud-build"`).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::collaborators::*;
use crate::error::{ReleaseError, Result};
use crate::projects::Projects;
use crate::version::ProjectVersion;

const TRAIN: &str = "train";

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// Shared, ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Operation names in call order, without subjects.
    pub fn operations(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|e| e.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }

    /// Number of calls of `operation`, for any subject.
    pub fn count(&self, operation: &str) -> usize {
        self.operations().iter().filter(|op| *op == operation).count()
    }
}

/// Call recording plus scripted failures, embedded in every fake.
#[derive(Debug, Default)]
struct Recorder {
    log: CallLog,
    failing: HashSet<String>,
}

impl Recorder {
    /// Record the call and report whether it is scripted to fail.
    fn call(&self, operation: &str, subject: &str) -> bool {
        self.log.push(format!("{operation}:{subject}"));
        self.failing.contains(operation) || self.failing.contains(&format!("{operation}:{subject}"))
    }
}

fn subject_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

macro_rules! scripted {
    ($ty:ident) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            /// Fail `key` (`operation` or `operation:subject`) with the
            /// error kind this collaborator raises.
            pub fn failing(mut self, key: &str) -> Self {
                self.recorder.failing.insert(key.to_string());
                self
            }

            pub fn calls(&self) -> CallLog {
                self.recorder.log.clone()
            }

            fn attach(mut self, log: &CallLog) -> Self {
                self.recorder.log = log.clone();
                self
            }
        }
    };
}

// ---------------------------------------------------------------------------
// FakeDescriptor
// ---------------------------------------------------------------------------

/// A descriptor update observed by [`FakeDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpdate {
    pub project: String,
    pub target: ProjectVersion,
    pub versions: Projects,
    pub assert_snapshots: bool,
}

/// Descriptor fake keyed by checkout directory name.
///
/// Updates are recorded, not applied: `read_version` keeps reporting the
/// version the project had before the release, which is what a revert
/// restores.
#[derive(Debug, Default)]
pub struct FakeDescriptor {
    recorder: Recorder,
    bom: Vec<(String, String)>,
    versions: HashMap<String, String>,
    updates: Mutex<Vec<RecordedUpdate>>,
}

scripted!(FakeDescriptor);

impl FakeDescriptor {
    pub fn with_bom<S: Into<String>>(mut self, bom: Vec<(S, S)>) -> Self {
        self.bom = bom.into_iter().map(|(n, v)| (n.into(), v.into())).collect();
        self
    }

    /// Version declared on disk by the checkout named `project`.
    pub fn with_version(mut self, project: &str, version: &str) -> Self {
        self.versions.insert(project.to_string(), version.to_string());
        self
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DescriptorHandler for FakeDescriptor {
    async fn read_project_name(&self, project: &Path) -> Result<String> {
        let name = subject_of(project);
        if self.recorder.call("read_project_name", &name) {
            return Err(ReleaseError::DescriptorUpdate(format!("cannot read {name}")));
        }
        Ok(name)
    }

    async fn read_version(&self, project: &Path) -> Result<String> {
        let name = subject_of(project);
        if self.recorder.call("read_version", &name) {
            return Err(ReleaseError::DescriptorUpdate(format!("cannot read {name}")));
        }
        self.versions
            .get(&name)
            .cloned()
            .ok_or_else(|| ReleaseError::DescriptorUpdate(format!("{name} declares no version")))
    }

    async fn read_bom_versions(&self, bom: &Path) -> Result<Vec<(String, String)>> {
        if self.recorder.call("read_bom_versions", &subject_of(bom)) {
            return Err(ReleaseError::BomResolution(format!(
                "cannot parse {}",
                bom.display()
            )));
        }
        Ok(self.bom.clone())
    }

    async fn update_dependency_versions(
        &self,
        project: &Path,
        versions: &Projects,
        target: &ProjectVersion,
        assert_snapshots: bool,
    ) -> Result<()> {
        let name = subject_of(project);
        if self.recorder.call("update_dependency_versions", &name) {
            return Err(ReleaseError::DescriptorUpdate(format!(
                "missing coordinates in {name}"
            )));
        }
        self.updates.lock().unwrap().push(RecordedUpdate {
            project: name,
            target: target.clone(),
            versions: versions.clone(),
            assert_snapshots,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeVcs {
    recorder: Recorder,
    branch: Option<String>,
}

scripted!(FakeVcs);

impl FakeVcs {
    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    fn check(&self, operation: &str, subject: &str) -> Result<()> {
        if self.recorder.call(operation, subject) {
            return Err(ReleaseError::Vcs(format!("{operation} rejected for {subject}")));
        }
        Ok(())
    }
}

#[async_trait]
impl VcsHandler for FakeVcs {
    async fn clone_project(&self, project_name: &str) -> Result<PathBuf> {
        self.check("clone_project", project_name)?;
        Ok(PathBuf::from("/checkouts").join(project_name))
    }

    async fn commit_and_tag(&self, project: &Path, _version: &ProjectVersion) -> Result<()> {
        self.check("commit_and_tag", &subject_of(project))
    }

    async fn revert_changes(&self, project: &Path, _version: &ProjectVersion) -> Result<()> {
        self.check("revert_changes", &subject_of(project))
    }

    async fn commit_after_bumping_versions(
        &self,
        project: &Path,
        _version: &ProjectVersion,
    ) -> Result<()> {
        self.check("commit_after_bumping_versions", &subject_of(project))
    }

    async fn push_current_branch(&self, project: &Path) -> Result<()> {
        self.check("push_current_branch", &subject_of(project))
    }

    async fn current_branch(&self, project: &Path) -> Result<String> {
        self.check("current_branch", &subject_of(project))?;
        Ok(self.branch.clone().unwrap_or_else(|| "main".to_string()))
    }

    async fn checkout_branch(&self, project: &Path, branch: &str) -> Result<()> {
        self.check("checkout_branch", &format!("{}@{branch}", subject_of(project)))
    }

    async fn close_milestone(&self, version: &ProjectVersion) -> Result<()> {
        self.check("close_milestone", version.project_name())
    }

    async fn create_issue(&self, _versions: &Projects, version: &ProjectVersion) -> Result<()> {
        self.check("create_issue", version.project_name())
    }
}

// ---------------------------------------------------------------------------
// FakeBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeBuilder {
    recorder: Recorder,
}

scripted!(FakeBuilder);

impl FakeBuilder {
    fn check(&self, operation: &str, project: &Path) -> Result<()> {
        if self.recorder.call(operation, &subject_of(project)) {
            return Err(ReleaseError::Build {
                command: operation.to_string(),
                reason: "exit status 1".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectBuilder for FakeBuilder {
    async fn build(&self, project: &Path, _version: &ProjectVersion) -> Result<()> {
        self.check("build", project)
    }

    async fn deploy(&self, project: &Path, _version: &ProjectVersion) -> Result<()> {
        self.check("deploy", project)
    }

    async fn publish_docs(&self, project: &Path, _version: &ProjectVersion) -> Result<()> {
        self.check("publish_docs", project)
    }
}

// ---------------------------------------------------------------------------
// FakeTemplates
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeTemplates {
    recorder: Recorder,
    empty: HashSet<String>,
}

scripted!(FakeTemplates);

impl FakeTemplates {
    /// Make `operation` succeed without producing an artifact.
    pub fn producing_nothing(mut self, operation: &str) -> Self {
        self.empty.insert(operation.to_string());
        self
    }

    fn generate(&self, operation: &str, release: &ProjectVersion) -> Result<Option<PathBuf>> {
        if self.recorder.call(operation, release.project_name()) {
            return Err(ReleaseError::Template(format!("{operation} template failed")));
        }
        if self.empty.contains(operation) {
            return Ok(None);
        }
        Ok(Some(PathBuf::from("/templates").join(format!(
            "{operation}-{}",
            release.version()
        ))))
    }
}

#[async_trait]
impl TemplateGenerator for FakeTemplates {
    async fn email(
        &self,
        _versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("email", release)
    }

    async fn blog(
        &self,
        _versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("blog", release)
    }

    async fn tweet(
        &self,
        _versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("tweet", release)
    }

    async fn release_notes(
        &self,
        _versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("release_notes", release)
    }

    async fn wiki(
        &self,
        _versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("wiki", release)
    }
}

// ---------------------------------------------------------------------------
// FakeCatalog
// ---------------------------------------------------------------------------

/// A catalog update observed by [`FakeCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub project: String,
    pub branch: String,
    pub original: String,
    pub release: String,
}

#[derive(Debug, Default)]
pub struct FakeCatalog {
    recorder: Recorder,
    entries: Mutex<Vec<CatalogEntry>>,
}

scripted!(FakeCatalog);

impl FakeCatalog {
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectCatalog for FakeCatalog {
    async fn update_entry(
        &self,
        project: &str,
        branch: &str,
        original: &ProjectVersion,
        release: &ProjectVersion,
    ) -> Result<()> {
        if self.recorder.call("update_entry", project) {
            return Err(ReleaseError::Catalog("503 Service Unavailable".to_string()));
        }
        self.entries.lock().unwrap().push(CatalogEntry {
            project: project.to_string(),
            branch: branch.to_string(),
            original: original.version().to_string(),
            release: release.version().to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeDocs / FakePostRelease
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeDocs {
    recorder: Recorder,
}

scripted!(FakeDocs);

#[async_trait]
impl DocumentationUpdater for FakeDocs {
    async fn update_docs_repo(&self, release: &ProjectVersion, _branch: &str) -> Result<()> {
        if self.recorder.call("update_docs_repo", release.project_name()) {
            return Err(ReleaseError::Documentation("push rejected".to_string()));
        }
        Ok(())
    }

    async fn update_project_page(&self, _versions: &Projects) -> Result<()> {
        if self.recorder.call("update_project_page", TRAIN) {
            return Err(ReleaseError::Documentation("page build failed".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakePostRelease {
    recorder: Recorder,
}

scripted!(FakePostRelease);

impl FakePostRelease {
    fn check(&self, operation: &str) -> Result<()> {
        if self.recorder.call(operation, TRAIN) {
            return Err(ReleaseError::PostRelease(format!("{operation} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl PostReleaseActions for FakePostRelease {
    async fn run_updated_samples(&self, _versions: &Projects) -> Result<()> {
        self.check("run_updated_samples")
    }

    async fn generate_train_docs(&self, _versions: &Projects) -> Result<()> {
        self.check("generate_train_docs")
    }

    async fn update_all_samples(&self, _versions: &Projects) -> Result<()> {
        self.check("update_all_samples")
    }
}

// ---------------------------------------------------------------------------
// FakeCollaborators
// ---------------------------------------------------------------------------

/// One fake of every collaborator, all recording to a shared [`CallLog`].
pub struct FakeCollaborators {
    log: CallLog,
    pub descriptor: Arc<FakeDescriptor>,
    pub vcs: Arc<FakeVcs>,
    pub builder: Arc<FakeBuilder>,
    pub templates: Arc<FakeTemplates>,
    pub catalog: Arc<FakeCatalog>,
    pub docs: Arc<FakeDocs>,
    pub post_release: Arc<FakePostRelease>,
}

impl Default for FakeCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCollaborators {
    pub fn new() -> Self {
        let log = CallLog::new();
        Self {
            descriptor: Arc::new(FakeDescriptor::new().attach(&log)),
            vcs: Arc::new(FakeVcs::new().attach(&log)),
            builder: Arc::new(FakeBuilder::new().attach(&log)),
            templates: Arc::new(FakeTemplates::new().attach(&log)),
            catalog: Arc::new(FakeCatalog::new().attach(&log)),
            docs: Arc::new(FakeDocs::new().attach(&log)),
            post_release: Arc::new(FakePostRelease::new().attach(&log)),
            log,
        }
    }

    pub fn with_descriptor(mut self, fake: FakeDescriptor) -> Self {
        self.descriptor = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn with_vcs(mut self, fake: FakeVcs) -> Self {
        self.vcs = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn with_builder(mut self, fake: FakeBuilder) -> Self {
        self.builder = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn with_templates(mut self, fake: FakeTemplates) -> Self {
        self.templates = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn with_catalog(mut self, fake: FakeCatalog) -> Self {
        self.catalog = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn with_docs(mut self, fake: FakeDocs) -> Self {
        self.docs = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn with_post_release(mut self, fake: FakePostRelease) -> Self {
        self.post_release = Arc::new(fake.attach(&self.log));
        self
    }

    pub fn calls(&self) -> CallLog {
        self.log.clone()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            descriptor: self.descriptor.clone(),
            vcs: self.vcs.clone(),
            builder: self.builder.clone(),
            templates: self.templates.clone(),
            catalog: self.catalog.clone(),
            docs: self.docs.clone(),
            post_release: self.post_release.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_log_records_in_call_order() {
        let fakes = FakeCollaborators::new();
        let c = fakes.collaborators();
        let version = ProjectVersion::new("spring-cloud-build", "3.1.0.RELEASE").unwrap();
        let checkout = Path::new("/checkouts/spring-cloud-build");

        c.builder.build(checkout, &version).await.unwrap();
        c.vcs.commit_and_tag(checkout, &version).await.unwrap();

        assert_eq!(
            fakes.calls().entries(),
            vec!["build:spring-cloud-build", "commit_and_tag:spring-cloud-build"]
        );
    }

    #[tokio::test]
    async fn test_failure_scripted_per_subject() {
        let vcs = FakeVcs::new().failing("clone_project:spring-cloud-vault");

        assert!(vcs.clone_project("spring-cloud-build").await.is_ok());
        let err = vcs.clone_project("spring-cloud-vault").await.unwrap_err();
        assert!(matches!(err, ReleaseError::Vcs(_)));
        assert_eq!(vcs.calls().count("clone_project"), 2);
    }

    #[tokio::test]
    async fn test_templates_producing_nothing() {
        let templates = FakeTemplates::new().producing_nothing("tweet");
        let version = ProjectVersion::new("spring-cloud-release", "2021.0.0").unwrap();

        let tweet = templates.tweet(&Projects::new(), &version).await.unwrap();
        let blog = templates.blog(&Projects::new(), &version).await.unwrap();

        assert!(tweet.is_none());
        assert!(blog.is_some());
    }
}
