//! Release announcements rendered with Tera.
//!
//! Templates are embedded at compile time. Each generator writes one file
//! under `template.output_dir` and returns its path; a template that renders
//! to nothing produces no file.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tera::Tera;
use tracing::info;
use trainman_core::{
    Projects, ProjectVersion, ReleaseError, ReleaserConfig, Result, TemplateGenerator,
};

const TEMPLATES: &[(&str, &str)] = &[
    ("email", include_str!("templates/email.tera")),
    ("blog", include_str!("templates/blog.tera")),
    ("tweet", include_str!("templates/tweet.tera")),
    ("release_notes", include_str!("templates/release_notes.tera")),
    ("wiki", include_str!("templates/wiki.tera")),
];

#[derive(Debug, Serialize)]
struct ProjectCtx {
    name: String,
    version: String,
}

/// Rendering payload shared by every template.
#[derive(Debug, Serialize)]
struct ReleaseCtx {
    release_name: String,
    release_version: String,
    availability: String,
    release_link: String,
    non_release: bool,
    projects: Vec<ProjectCtx>,
    train_project: String,
    train_url: String,
    blog_url: String,
    org: String,
    date: String,
}

pub struct TeraTemplates {
    tera: Tera,
    output_dir: PathBuf,
    bom_artifact_path: String,
    train_project: String,
    train_url: String,
    blog_url: String,
    org: String,
}

impl TeraTemplates {
    pub fn new(config: &ReleaserConfig) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().map(|(name, body)| (*name, *body)))
            .map_err(|e| ReleaseError::Template(e.to_string()))?;
        let meta = &config.meta_release;
        Ok(Self {
            tera,
            output_dir: config.template.output_dir.clone(),
            bom_artifact_path: config.template.bom_artifact_path.clone(),
            train_project: meta.release_train_project_name.clone(),
            train_url: meta.clone_url(&meta.release_train_project_name),
            blog_url: format!("{}/blog", config.catalog.base_url.trim_end_matches('/')),
            org: meta.org_name().to_string(),
        })
    }

    fn context(&self, versions: &Projects, release: &ProjectVersion) -> Result<tera::Context> {
        let ctx = ReleaseCtx {
            release_name: release.release_name().to_string(),
            release_version: release.version().to_string(),
            availability: release.availability(),
            release_link: release.release_link(&self.bom_artifact_path),
            non_release: release.is_non_release(),
            projects: versions
                .iter()
                .map(|p| ProjectCtx {
                    name: p.project_name().to_string(),
                    version: p.version().to_string(),
                })
                .collect(),
            train_project: self.train_project.clone(),
            train_url: self.train_url.clone(),
            blog_url: self.blog_url.clone(),
            org: self.org.clone(),
            date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        };
        tera::Context::from_serialize(ctx).map_err(|e| ReleaseError::Template(e.to_string()))
    }

    async fn generate(
        &self,
        template: &str,
        file_name: &str,
        versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        let rendered = self
            .tera
            .render(template, &self.context(versions, release)?)
            .map_err(|e| ReleaseError::Template(format!("{template}: {e}")))?;
        if rendered.trim().is_empty() {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, rendered).await?;
        info!(template = %template, path = %path.display(), "Rendered template");
        Ok(Some(path))
    }
}

#[async_trait]
impl TemplateGenerator for TeraTemplates {
    async fn email(
        &self,
        versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("email", "email.txt", versions, release).await
    }

    async fn blog(
        &self,
        versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("blog", "blog.md", versions, release).await
    }

    async fn tweet(
        &self,
        versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("tweet", "tweet.txt", versions, release).await
    }

    async fn release_notes(
        &self,
        versions: &Projects,
        release: &ProjectVersion,
    ) -> Result<Option<PathBuf>> {
        self.generate("release_notes", "release_notes.md", versions, release)
            .await
    }

    async fn wiki(&self, versions: &Projects, release: &ProjectVersion) -> Result<Option<PathBuf>> {
        self.generate("wiki", "wiki.md", versions, release).await
    }
}
