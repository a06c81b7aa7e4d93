//! HTTP client for the project catalog (the website's project pages).

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use trainman_core::config::CatalogConfig;
use trainman_core::{ProjectCatalog, ProjectVersion, ReleaseError, Result, VersionKind};

const USER_AGENT: &str = concat!("trainman/", env!("CARGO_PKG_VERSION"));

/// Release entry sent to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    pub version: String,
    pub branch: String,
    pub status: &'static str,
    pub reference_doc_url: String,
    pub api_doc_url: String,
    /// Version the branch was on before this release.
    pub previous_version: String,
}

impl ReleaseEntry {
    pub fn new(
        project: &str,
        branch: &str,
        original: &ProjectVersion,
        release: &ProjectVersion,
    ) -> Self {
        let version = release.version();
        Self {
            version: version.to_string(),
            branch: branch.to_string(),
            status: release_status(release.kind()),
            reference_doc_url: format!(
                "https://docs.spring.io/{project}/docs/{version}/reference/html/"
            ),
            api_doc_url: format!("https://docs.spring.io/{project}/docs/{version}/api/"),
            previous_version: original.version().to_string(),
        }
    }
}

fn release_status(kind: VersionKind) -> &'static str {
    match kind {
        VersionKind::Release | VersionKind::ServiceRelease(_) => "GENERAL_AVAILABILITY",
        VersionKind::Milestone(_) | VersionKind::ReleaseCandidate(_) => "PRERELEASE",
        VersionKind::Snapshot => "SNAPSHOT",
    }
}

/// [`ProjectCatalog`] posting release entries over HTTP.
pub struct HttpCatalog {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReleaseError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn releases_url(&self, project: &str) -> String {
        format!("{}/api/projects/{project}/releases", self.base_url)
    }
}

#[async_trait]
impl ProjectCatalog for HttpCatalog {
    async fn update_entry(
        &self,
        project: &str,
        branch: &str,
        original: &ProjectVersion,
        release: &ProjectVersion,
    ) -> Result<()> {
        let entry = ReleaseEntry::new(project, branch, original, release);
        let mut request = self.http.post(self.releases_url(project)).json(&entry);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReleaseError::Catalog(format!("{project}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReleaseError::Catalog(format!(
                "{project}: catalog returned {status}: {}",
                body.trim()
            )));
        }

        info!(project = %project, version = %entry.version, "Updated catalog entry");
        Ok(())
    }
}
