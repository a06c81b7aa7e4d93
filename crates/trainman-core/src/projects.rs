//! The train-wide version set.
//!
//! [`Projects`] maps each project of a release train to the version it must
//! adopt. It is built once per run and then only read; every change produces
//! a new set.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::collaborators::DescriptorHandler;
use crate::error::{ReleaseError, Result};
use crate::version::ProjectVersion;

/// Project name to resolved version, in train declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projects {
    order: Vec<String>,
    entries: BTreeMap<String, ProjectVersion>,
}

impl Projects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from versions; a later entry for the same project replaces an
    /// earlier one but keeps its position.
    pub fn from_versions(versions: impl IntoIterator<Item = ProjectVersion>) -> Self {
        let mut projects = Self::new();
        for version in versions {
            projects.upsert(version);
        }
        projects
    }

    /// Resolve the version set from a release train BOM.
    ///
    /// Any failure reading the BOM, an empty BOM, or an unclassifiable
    /// version is reported as [`ReleaseError::BomResolution`].
    pub async fn resolve_from_train_bom(
        reader: &dyn DescriptorHandler,
        bom: &Path,
    ) -> Result<Self> {
        let managed = reader.read_bom_versions(bom).await.map_err(|e| match e {
            ReleaseError::BomResolution(_) => e,
            other => ReleaseError::BomResolution(format!("{}: {other}", bom.display())),
        })?;

        if managed.is_empty() {
            return Err(ReleaseError::BomResolution(format!(
                "{} declares no managed versions",
                bom.display()
            )));
        }

        let mut projects = Self::new();
        for (name, version) in managed {
            let version = ProjectVersion::new(&name, &version).map_err(|e| {
                ReleaseError::BomResolution(format!("project {name}: {e}"))
            })?;
            projects.upsert(version);
        }

        info!(bom = %bom.display(), projects = projects.len(), "Resolved release train BOM");
        Ok(projects)
    }

    /// Build a set purely from a fixed-version map.
    pub fn from_fixed_versions(fixed: &BTreeMap<String, String>) -> Result<Self> {
        fixed
            .iter()
            .map(|(name, version)| ProjectVersion::new(name, version))
            .collect::<Result<Vec<_>>>()
            .map(Self::from_versions)
    }

    /// New set with the versions of projects named in `overrides` replaced.
    ///
    /// Names that are not part of this set are ignored, so overrides can be
    /// staged ahead of a project joining the BOM.
    pub fn apply_fixed_overrides(&self, overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut projects = self.clone();
        for (name, version) in overrides {
            if !projects.contains(name) {
                debug!(project = %name, "Ignoring fixed version for project outside the train");
                continue;
            }
            projects.upsert(ProjectVersion::new(name, version)?);
        }
        Ok(projects)
    }

    /// New set identical to this one except for `original`'s project,
    /// which is set back to `original`.
    pub fn for_rollback(&self, original: &ProjectVersion) -> Self {
        let mut projects = self.clone();
        projects.upsert(original.clone());
        projects
    }

    pub fn get(&self, project: &str) -> Option<&ProjectVersion> {
        self.entries.get(project)
    }

    /// Like [`Projects::get`], but a missing entry is an error.
    pub fn require(&self, project: &str) -> Result<&ProjectVersion> {
        self.get(project).ok_or_else(|| ReleaseError::MissingVersion {
            project: project.to_string(),
        })
    }

    pub fn contains(&self, project: &str) -> bool {
        self.entries.contains_key(project)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Project names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Versions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectVersion> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    fn upsert(&mut self, version: ProjectVersion) {
        let name = version.project_name().to_string();
        if self.entries.insert(name.clone(), version).is_none() {
            self.order.push(name);
        }
    }
}

impl FromIterator<ProjectVersion> for Projects {
    fn from_iter<I: IntoIterator<Item = ProjectVersion>>(iter: I) -> Self {
        Self::from_versions(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeDescriptor;

    fn pv(name: &str, version: &str) -> ProjectVersion {
        ProjectVersion::new(name, version).unwrap()
    }

    fn train() -> Projects {
        Projects::from_versions([
            pv("spring-cloud-build", "3.1.0-SNAPSHOT"),
            pv("spring-cloud-commons", "3.1.0-SNAPSHOT"),
            pv("spring-cloud-sleuth", "3.1.0-SNAPSHOT"),
        ])
    }

    #[test]
    fn test_preserves_declaration_order() {
        let projects = train();
        let names: Vec<&str> = projects.names().collect();
        assert_eq!(
            names,
            vec!["spring-cloud-build", "spring-cloud-commons", "spring-cloud-sleuth"]
        );
    }

    #[test]
    fn test_for_rollback_does_not_mutate_input() {
        let released = Projects::from_versions([
            pv("spring-cloud-build", "3.1.0.RELEASE"),
            pv("spring-cloud-commons", "3.1.0.RELEASE"),
        ]);
        let before = released.clone();

        let rolled = released.for_rollback(&pv("spring-cloud-commons", "3.1.0-SNAPSHOT"));

        assert_eq!(released, before);
        assert_eq!(
            rolled.get("spring-cloud-commons").unwrap().version(),
            "3.1.0-SNAPSHOT"
        );
        assert_eq!(
            rolled.get("spring-cloud-build").unwrap().version(),
            "3.1.0.RELEASE"
        );
        assert_eq!(rolled.len(), released.len());
    }

    #[test]
    fn test_fixed_override_replaces_only_named_project() {
        let mut overrides = BTreeMap::new();
        overrides.insert("spring-cloud-sleuth".to_string(), "1.2.3.RELEASE".to_string());

        let overridden = train().apply_fixed_overrides(&overrides).unwrap();

        assert_eq!(
            overridden.get("spring-cloud-sleuth").unwrap().version(),
            "1.2.3.RELEASE"
        );
        assert_eq!(
            overridden.get("spring-cloud-build").unwrap().version(),
            "3.1.0-SNAPSHOT"
        );
        assert_eq!(overridden.names().last(), Some("spring-cloud-sleuth"));
    }

    #[test]
    fn test_fixed_override_ignores_unknown_projects() {
        let mut overrides = BTreeMap::new();
        overrides.insert("spring-cloud-future".to_string(), "1.0.0.RELEASE".to_string());

        let overridden = train().apply_fixed_overrides(&overrides).unwrap();
        assert_eq!(overridden, train());
    }

    #[test]
    fn test_fixed_override_rejects_bad_version() {
        let mut overrides = BTreeMap::new();
        overrides.insert("spring-cloud-build".to_string(), "garbage".to_string());
        assert!(train().apply_fixed_overrides(&overrides).is_err());
    }

    #[test]
    fn test_require_missing_project() {
        let err = train().require("spring-cloud-vault").unwrap_err();
        assert!(matches!(err, ReleaseError::MissingVersion { .. }));
    }

    #[tokio::test]
    async fn test_resolve_from_train_bom() {
        let reader = FakeDescriptor::new().with_bom(vec![
            ("spring-cloud-build", "3.1.0.RELEASE"),
            ("spring-cloud-commons", "3.1.0.SR1"),
        ]);

        let projects = Projects::resolve_from_train_bom(&reader, Path::new("bom.properties"))
            .await
            .unwrap();

        assert_eq!(projects.len(), 2);
        assert!(projects.get("spring-cloud-commons").unwrap().is_service_release());
    }

    #[tokio::test]
    async fn test_resolve_from_empty_bom_fails() {
        let reader = FakeDescriptor::new().with_bom(Vec::<(&str, &str)>::new());
        let err = Projects::resolve_from_train_bom(&reader, Path::new("bom.properties"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::BomResolution(_)));
    }

    #[tokio::test]
    async fn test_resolve_from_bom_with_bad_version_fails() {
        let reader = FakeDescriptor::new().with_bom(vec![("spring-cloud-build", "nightly")]);
        let err = Projects::resolve_from_train_bom(&reader, Path::new("bom.properties"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::BomResolution(_)));
    }
}
