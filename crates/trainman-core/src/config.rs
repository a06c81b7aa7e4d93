//! Releaser configuration.
//!
//! Loaded once (usually from `trainman.toml`) and shared read-only through
//! [`crate::task::RuntimeOptions`]. Every field has a default so a config
//! file only needs to name what it changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, Result};

pub const VERSION_PLACEHOLDER: &str = "{{version}}";
pub const SYSTEM_PROPS_PLACEHOLDER: &str = "{{systemProps}}";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReleaserConfig {
    /// Project checkout released in single-project mode. Defaults to the
    /// current directory.
    pub working_dir: Option<PathBuf>,

    /// Project name to version. Overrides versions resolved from the BOM.
    pub fixed_versions: BTreeMap<String, String>,

    pub meta_release: MetaReleaseConfig,
    pub git: GitConfig,
    pub bom: BomConfig,
    pub build: BuildConfig,
    pub descriptor: DescriptorConfig,
    pub catalog: CatalogConfig,
    pub template: TemplateConfig,
    pub post_release: PostReleaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetaReleaseConfig {
    /// Project that hosts the train BOM; train-wide tasks run only for it.
    pub release_train_project_name: String,

    /// Organization URL each project name is appended to when cloning.
    pub git_org_url: String,

    /// Projects that are part of the train but released elsewhere.
    pub projects_to_skip: Vec<String>,
}

impl Default for MetaReleaseConfig {
    fn default() -> Self {
        Self {
            release_train_project_name: "spring-cloud-release".to_string(),
            git_org_url: "https://github.com/spring-cloud".to_string(),
            projects_to_skip: vec![
                "spring-boot".to_string(),
                "spring-cloud-stream".to_string(),
                "spring-cloud-task".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Repository holding the published documentation, checked out at
    /// `documentation_branch` before the documentation commands run.
    pub documentation_url: String,
    pub documentation_branch: String,
    pub update_documentation_repo: bool,

    /// Open issues in the guides repositories for GA and service releases.
    pub update_guides: bool,

    /// Resolve versions from the train BOM; when `false` only
    /// `fixed_versions` are used.
    pub fetch_versions_from_git: bool,

    /// Clone destination. A temporary directory when unset.
    pub clone_destination_dir: Option<PathBuf>,

    /// Token for hosted-repository APIs (milestones, issues).
    pub oauth_token: String,
    pub github_api_url: String,

    /// `owner/repo` that receives the guide update issues.
    pub guides_repository: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            documentation_url: "https://github.com/spring-cloud/spring-cloud-static".to_string(),
            documentation_branch: "gh-pages".to_string(),
            update_documentation_repo: true,
            update_guides: true,
            fetch_versions_from_git: true,
            clone_destination_dir: None,
            oauth_token: String::new(),
            github_api_url: "https://api.github.com".to_string(),
            guides_repository: "spring-guides/getting-started-guides".to_string(),
        }
    }
}

impl GitConfig {
    pub fn has_token(&self) -> bool {
        !self.oauth_token.trim().is_empty()
    }
}

impl MetaReleaseConfig {
    /// Organization name, the last segment of `git_org_url`.
    pub fn org_name(&self) -> &str {
        self.git_org_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Clone URL of `project` under the organization.
    pub fn clone_url(&self, project: &str) -> String {
        format!("{}/{project}", self.git_org_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BomConfig {
    /// Branch of the release train project the BOM is read from.
    pub branch: String,

    /// Path of the BOM inside the release train project.
    pub train_bom: PathBuf,

    /// Pattern a BOM property key must match; group 1 is the project name.
    pub bom_version_pattern: String,
}

impl Default for BomConfig {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            train_bom: PathBuf::from("spring-cloud-dependencies/bom.properties"),
            bom_version_pattern: r"^(spring-cloud-.*)\.version$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    pub build_command: String,
    pub deploy_command: String,
    pub publish_docs_commands: Vec<String>,

    /// Substituted for `{{systemProps}}` in every command.
    pub system_properties: String,

    /// Max wait for a single build tool invocation.
    pub wait_time_minutes: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_command: "./mvnw clean install -B -Pdocs {{systemProps}}".to_string(),
            deploy_command: "./mvnw deploy -DskipTests -B -Pfast,deploy {{systemProps}}"
                .to_string(),
            publish_docs_commands: vec![
                "mkdir -p target".to_string(),
                "./docs/ghpages.sh -v {{version}} -c".to_string(),
            ],
            system_properties: String::new(),
            wait_time_minutes: 20,
        }
    }
}

impl BuildConfig {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_minutes.saturating_mul(60))
    }

    /// Substitute the version and system property placeholders in `command`.
    pub fn render(&self, command: &str, version: &str) -> String {
        command
            .replace(VERSION_PLACEHOLDER, version)
            .replace(SYSTEM_PROPS_PLACEHOLDER, &self.system_properties)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Properties file holding `name=` and `version=` of a project.
    pub file: PathBuf,

    /// Property in the descriptor to the project whose version it carries,
    /// e.g. `verifierVersion = "spring-cloud-contract"`.
    pub substitutions: BTreeMap<String, String>,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("gradle.properties"),
            substitutions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub enabled: bool,
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://spring.io".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TemplateConfig {
    pub output_dir: PathBuf,

    /// Repository path of the BOM artifact, used for release links.
    pub bom_artifact_path: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("target/release-templates"),
            bom_artifact_path: "org/springframework/cloud/spring-cloud-dependencies".to_string(),
        }
    }
}

/// Shell commands backing documentation and train-wide post-release actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostReleaseConfig {
    pub docs_repo_commands: Vec<String>,
    pub project_page_commands: Vec<String>,
    pub samples_commands: Vec<String>,
    pub update_all_samples_commands: Vec<String>,
    pub train_docs_commands: Vec<String>,
}

impl ReleaserConfig {
    /// Parse from TOML and validate.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ReleaseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReleaseError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.build.wait_time_minutes == 0 {
            return Err(ReleaseError::Config(
                "build.wait_time_minutes must be greater than zero".to_string(),
            ));
        }
        let pattern = regex::Regex::new(&self.bom.bom_version_pattern).map_err(|e| {
            ReleaseError::Config(format!("bom.bom_version_pattern is not a valid regex: {e}"))
        })?;
        if pattern.captures_len() < 2 {
            return Err(ReleaseError::Config(
                "bom.bom_version_pattern must capture the project name in group 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn is_skipped(&self, project: &str) -> bool {
        self.meta_release
            .projects_to_skip
            .iter()
            .any(|skipped| skipped == project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReleaserConfig::default();
        assert_eq!(config.build.wait_time_minutes, 20);
        assert_eq!(config.build.wait_time(), Duration::from_secs(1200));
        assert!(config.is_skipped("spring-boot"));
        assert!(!config.is_skipped("spring-cloud-sleuth"));
        assert!(!config.git.has_token());
        assert_eq!(config.meta_release.org_name(), "spring-cloud");
        assert_eq!(
            config.meta_release.clone_url("spring-cloud-build"),
            "https://github.com/spring-cloud/spring-cloud-build"
        );
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReleaserConfig::from_toml_str(
            r#"
            [fixed_versions]
            "spring-cloud-sleuth" = "3.1.0.RELEASE"

            [meta_release]
            projects_to_skip = ["spring-cloud-vault"]

            [build]
            wait_time_minutes = 5
            "#,
        )
        .expect("parse");

        assert_eq!(config.meta_release.release_train_project_name, "spring-cloud-release");
        assert!(config.is_skipped("spring-cloud-vault"));
        assert!(!config.is_skipped("spring-boot"));
        assert_eq!(config.build.wait_time_minutes, 5);
        assert!(config.build.deploy_command.contains("deploy"));
        assert_eq!(
            config.fixed_versions.get("spring-cloud-sleuth").map(String::as_str),
            Some("3.1.0.RELEASE")
        );
    }

    #[test]
    fn test_zero_wait_time_rejected() {
        let err =
            ReleaserConfig::from_toml_str("[build]\nwait_time_minutes = 0\n").unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }

    #[test]
    fn test_huge_wait_time_saturates() {
        let build = BuildConfig {
            wait_time_minutes: u64::MAX,
            ..BuildConfig::default()
        };
        assert_eq!(build.wait_time(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_bom_pattern_needs_capture_group() {
        let err = ReleaserConfig::from_toml_str(
            "[bom]\nbom_version_pattern = \"^.*\\\\.version$\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("group 1"));

        let err = ReleaserConfig::from_toml_str("[bom]\nbom_version_pattern = \"(\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("not a valid regex"));
    }

    #[test]
    fn test_render_command_placeholders() {
        let build = BuildConfig {
            system_properties: "-Dgpg.skip".to_string(),
            ..BuildConfig::default()
        };
        assert_eq!(
            build.render("./mvnw deploy {{systemProps}}", "1.0.0.RELEASE"),
            "./mvnw deploy -Dgpg.skip"
        );
        assert_eq!(
            build.render("./ghpages.sh -v {{version}} {{systemProps}}", "1.0.0.RELEASE"),
            "./ghpages.sh -v 1.0.0.RELEASE -Dgpg.skip"
        );
        assert_eq!(
            BuildConfig::default().render("./mvnw install {{systemProps}}", "x"),
            "./mvnw install"
        );
    }
}
