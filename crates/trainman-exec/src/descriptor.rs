//! Properties-file descriptors (`gradle.properties` style) and BOMs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};
use trainman_core::config::{BomConfig, DescriptorConfig};
use trainman_core::{DescriptorHandler, ProjectVersion, Projects, ReleaseError, Result};

use crate::properties;

const NAME_KEY: &str = "name";
const VERSION_KEY: &str = "version";

/// [`DescriptorHandler`] over a properties file inside each checkout.
///
/// `version` holds the project version; every property listed in the
/// substitution map holds the version of another train project.
pub struct PropertiesDescriptor {
    file: PathBuf,
    substitutions: BTreeMap<String, String>,
    bom_pattern: Regex,
}

impl PropertiesDescriptor {
    pub fn new(descriptor: &DescriptorConfig, bom: &BomConfig) -> Result<Self> {
        let bom_pattern = Regex::new(&bom.bom_version_pattern)
            .map_err(|e| ReleaseError::Config(format!("invalid BOM pattern: {e}")))?;
        Ok(Self {
            file: descriptor.file.clone(),
            substitutions: descriptor.substitutions.clone(),
            bom_pattern,
        })
    }

    fn path(&self, project: &Path) -> PathBuf {
        project.join(&self.file)
    }

    async fn read(&self, project: &Path) -> Result<String> {
        let path = self.path(project);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            ReleaseError::DescriptorUpdate(format!("cannot read {}: {e}", path.display()))
        })
    }

    /// New values for every coordinate this descriptor manages.
    fn planned_updates(
        &self,
        versions: &Projects,
        target: &ProjectVersion,
    ) -> Result<BTreeMap<String, String>> {
        let mut updates = BTreeMap::new();
        updates.insert(VERSION_KEY.to_string(), target.version().to_string());
        for (property, project) in &self.substitutions {
            let version = if project == target.project_name() {
                target
            } else {
                versions.get(project).ok_or_else(|| {
                    ReleaseError::DescriptorUpdate(format!(
                        "property {property} needs a version of {project}, \
                         which is not in the train"
                    ))
                })?
            };
            updates.insert(property.clone(), version.version().to_string());
        }
        Ok(updates)
    }
}

#[async_trait]
impl DescriptorHandler for PropertiesDescriptor {
    async fn read_project_name(&self, project: &Path) -> Result<String> {
        let content = self.read(project).await?;
        if let Some(name) = properties::get(&content, NAME_KEY) {
            return Ok(name);
        }
        project
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ReleaseError::DescriptorUpdate(format!(
                    "{} declares no project name",
                    self.path(project).display()
                ))
            })
    }

    async fn read_version(&self, project: &Path) -> Result<String> {
        let content = self.read(project).await?;
        properties::get(&content, VERSION_KEY).ok_or_else(|| {
            ReleaseError::DescriptorUpdate(format!(
                "{} declares no version",
                self.path(project).display()
            ))
        })
    }

    async fn read_bom_versions(&self, bom: &Path) -> Result<Vec<(String, String)>> {
        let content = tokio::fs::read_to_string(bom).await.map_err(|e| {
            ReleaseError::BomResolution(format!("cannot read {}: {e}", bom.display()))
        })?;

        let managed: Vec<(String, String)> = properties::parse(&content)
            .into_iter()
            .filter_map(|(key, value)| {
                let name = self.bom_pattern.captures(&key)?.get(1)?.as_str().to_string();
                Some((name, value))
            })
            .collect();

        if managed.is_empty() {
            return Err(ReleaseError::BomResolution(format!(
                "no property of {} matches {}",
                bom.display(),
                self.bom_pattern.as_str()
            )));
        }
        debug!(bom = %bom.display(), managed = managed.len(), "Read BOM versions");
        Ok(managed)
    }

    async fn update_dependency_versions(
        &self,
        project: &Path,
        versions: &Projects,
        target: &ProjectVersion,
        assert_snapshots: bool,
    ) -> Result<()> {
        let path = self.path(project);
        let content = self.read(project).await?;
        let updates = self.planned_updates(versions, target)?;

        let (rewritten, found) = properties::rewrite(&content, &updates);
        if !found.contains(VERSION_KEY) {
            return Err(ReleaseError::DescriptorUpdate(format!(
                "{} declares no version",
                path.display()
            )));
        }

        if assert_snapshots && !target.is_snapshot() {
            let snapshots: Vec<String> = properties::parse(&rewritten)
                .into_iter()
                .filter(|(key, value)| {
                    (key == VERSION_KEY || self.substitutions.contains_key(key))
                        && value.ends_with("SNAPSHOT")
                })
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            if !snapshots.is_empty() {
                return Err(ReleaseError::DescriptorUpdate(format!(
                    "{} would keep snapshot coordinates for {}: {}",
                    path.display(),
                    target.version(),
                    snapshots.join(", ")
                )));
            }
        }

        tokio::fs::write(&path, rewritten).await?;
        info!(
            descriptor = %path.display(),
            version = %target.version(),
            updated = found.len(),
            "Updated descriptor versions"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(substitutions: &[(&str, &str)]) -> PropertiesDescriptor {
        let config = DescriptorConfig {
            substitutions: substitutions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..DescriptorConfig::default()
        };
        PropertiesDescriptor::new(&config, &BomConfig::default()).unwrap()
    }

    fn pv(name: &str, version: &str) -> ProjectVersion {
        ProjectVersion::new(name, version).unwrap()
    }

    fn checkout(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gradle.properties"), content).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_update_rewrites_version_and_substitutions() {
        let dir = checkout("version=3.1.0-SNAPSHOT\nverifierVersion=3.1.0-SNAPSHOT\nother=1\n");
        let handler = descriptor(&[("verifierVersion", "spring-cloud-contract")]);
        let versions = Projects::from_versions([
            pv("spring-cloud-contract", "3.1.0.RELEASE"),
            pv("spring-cloud-build", "3.1.0.RELEASE"),
        ]);

        handler
            .update_dependency_versions(
                dir.path(),
                &versions,
                &pv("spring-cloud-contract", "3.1.0.RELEASE"),
                true,
            )
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("gradle.properties")).unwrap();
        assert_eq!(content, "version=3.1.0.RELEASE\nverifierVersion=3.1.0.RELEASE\nother=1\n");
    }

    #[tokio::test]
    async fn test_snapshot_coordinates_refused_for_release() {
        let original = "version=1.0.0-SNAPSHOT\ncommonsVersion=3.1.0-SNAPSHOT\n";
        let dir = checkout(original);
        let handler = descriptor(&[("commonsVersion", "spring-cloud-commons")]);
        let versions = Projects::from_versions([pv("spring-cloud-commons", "3.1.0-SNAPSHOT")]);
        let target = pv("spring-cloud-foo", "1.0.0.RELEASE");

        let err = handler
            .update_dependency_versions(dir.path(), &versions, &target, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::DescriptorUpdate(_)));
        let content = std::fs::read_to_string(dir.path().join("gradle.properties")).unwrap();
        assert_eq!(content, original);

        handler
            .update_dependency_versions(dir.path(), &versions, &target, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_substituted_project_is_error() {
        let dir = checkout("version=1.0.0-SNAPSHOT\n");
        let handler = descriptor(&[("commonsVersion", "spring-cloud-commons")]);
        let err = handler
            .update_dependency_versions(
                dir.path(),
                &Projects::new(),
                &pv("spring-cloud-foo", "1.0.0.RELEASE"),
                true,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spring-cloud-commons"));
    }

    #[tokio::test]
    async fn test_read_name_falls_back_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("spring-cloud-vault");
        std::fs::create_dir(&project).unwrap();
        std::fs::write(project.join("gradle.properties"), "version=3.1.0\n").unwrap();

        let handler = descriptor(&[]);
        assert_eq!(handler.read_project_name(&project).await.unwrap(), "spring-cloud-vault");
        assert_eq!(handler.read_version(&project).await.unwrap(), "3.1.0");
    }
}
