//! GitHub REST calls for milestones and guide issues.

use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::info;
use trainman_core::config::GitConfig;
use trainman_core::{ReleaseError, Result};

const USER_AGENT: &str = concat!("trainman/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Milestone {
    number: u64,
    title: String,
}

#[derive(Debug, Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    org: String,
    token: String,
}

impl GithubClient {
    pub fn new(git: &GitConfig, org: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReleaseError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: git.github_api_url.trim_end_matches('/').to_string(),
            org: org.to_string(),
            token: git.oauth_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    async fn send(request: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ReleaseError::Vcs(format!("{what}: {e}")))?;
        if !response.status().is_success() {
            return Err(ReleaseError::Vcs(format!(
                "{what}: GitHub returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// Close the open milestone of `repo` titled `title`.
    pub async fn close_milestone(&self, repo: &str, title: &str) -> Result<()> {
        let path = format!("/repos/{}/{repo}/milestones", self.org);
        let open: Vec<Milestone> = Self::send(
            self.request(Method::GET, &path)
                .query(&[("state", "open"), ("per_page", "100")]),
            "list milestones",
        )
        .await?
        .json()
        .await
        .map_err(|e| ReleaseError::Vcs(format!("list milestones: {e}")))?;

        let milestone = find_milestone(&open, title).ok_or_else(|| {
            ReleaseError::Vcs(format!("no open milestone {title} in {}/{repo}", self.org))
        })?;

        Self::send(
            self.request(Method::PATCH, &format!("{path}/{}", milestone.number))
                .json(&serde_json::json!({ "state": "closed" })),
            "close milestone",
        )
        .await?;
        info!(repo = %repo, milestone = %milestone.title, "Closed milestone");
        Ok(())
    }

    /// Open an issue in `repository` (`owner/name`).
    pub async fn create_issue(&self, repository: &str, title: &str, body: &str) -> Result<()> {
        Self::send(
            self.request(Method::POST, &format!("/repos/{repository}/issues"))
                .json(&NewIssue { title, body }),
            "create issue",
        )
        .await?;
        info!(repository = %repository, title = %title, "Created issue");
        Ok(())
    }
}

/// Milestones are titled either with the full version or without the
/// `.RELEASE` suffix.
fn find_milestone<'a>(milestones: &'a [Milestone], version: &str) -> Option<&'a Milestone> {
    let short = version.strip_suffix(".RELEASE").unwrap_or(version);
    milestones
        .iter()
        .find(|m| m.title == version || m.title == short)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milestone(number: u64, title: &str) -> Milestone {
        Milestone {
            number,
            title: title.to_string(),
        }
    }

    #[test]
    fn test_find_milestone_by_full_or_short_title() {
        let open = vec![milestone(1, "3.0.5"), milestone(2, "3.1.0"), milestone(3, "3.1.0.M2")];

        assert_eq!(find_milestone(&open, "3.1.0.RELEASE").unwrap().number, 2);
        assert_eq!(find_milestone(&open, "3.1.0.M2").unwrap().number, 3);
        assert!(find_milestone(&open, "3.2.0").is_none());
    }
}
