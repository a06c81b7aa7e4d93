//! Version control through the system `git` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use trainman_core::config::{GitConfig, MetaReleaseConfig};
use trainman_core::{Projects, ProjectVersion, ReleaseError, Result, VcsHandler};
use uuid::Uuid;

use crate::github::GithubClient;

const SNAPSHOT_COMMIT: &str = "Bumping versions";
const RESTORE_COMMIT: &str = "Going back to snapshots";

fn release_commit_message(version: &ProjectVersion) -> String {
    format!("Update SNAPSHOT to {}", version.version())
}

fn tag_name(version: &ProjectVersion) -> String {
    format!("v{}", version.version())
}

/// Run `git` with `args` in `dir`, returning trimmed stdout.
pub async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    debug!(dir = %dir.display(), ?args, "git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ReleaseError::Vcs(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReleaseError::Vcs(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// [`VcsHandler`] shelling out to `git`, with GitHub for milestones and
/// issues when a token is configured.
pub struct SystemGit {
    meta_release: MetaReleaseConfig,
    clone_destination: Option<PathBuf>,
    guides_repository: String,
    github: Option<GithubClient>,
}

impl SystemGit {
    pub fn new(git: &GitConfig, meta_release: &MetaReleaseConfig) -> Result<Self> {
        let github = if git.has_token() {
            Some(GithubClient::new(git, meta_release.org_name())?)
        } else {
            None
        };
        Ok(Self {
            meta_release: meta_release.clone(),
            clone_destination: git.clone_destination_dir.clone(),
            guides_repository: git.guides_repository.clone(),
            github,
        })
    }

    fn github(&self, operation: &str) -> Result<&GithubClient> {
        self.github.as_ref().ok_or_else(|| {
            ReleaseError::Unsupported(format!("{operation} needs git.oauth_token"))
        })
    }

    async fn has_changes(&self, project: &Path) -> Result<bool> {
        Ok(!git(project, &["status", "--porcelain"]).await?.is_empty())
    }

    async fn commit_all(&self, project: &Path, message: &str) -> Result<bool> {
        git(project, &["add", "-A"]).await?;
        if !self.has_changes(project).await? {
            info!("Nothing to commit");
            return Ok(false);
        }
        git(project, &["commit", "-m", message]).await?;
        Ok(true)
    }
}

#[async_trait]
impl VcsHandler for SystemGit {
    async fn clone_project(&self, project_name: &str) -> Result<PathBuf> {
        let base = self
            .clone_destination
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(format!("trainman-{}", Uuid::new_v4())));
        let destination = base.join(project_name);

        if destination.join(".git").is_dir() {
            info!(project = %project_name, dir = %destination.display(), "Reusing existing clone");
            return Ok(destination);
        }

        tokio::fs::create_dir_all(&base).await?;
        let url = self.meta_release.clone_url(project_name);
        let target = destination.to_string_lossy().into_owned();
        info!(url = %url, dir = %target, "Cloning project");
        git(&base, &["clone", &url, &target]).await?;
        Ok(destination)
    }

    async fn commit_and_tag(&self, project: &Path, version: &ProjectVersion) -> Result<()> {
        if version.is_snapshot() {
            self.commit_all(project, SNAPSHOT_COMMIT).await?;
            return Ok(());
        }
        self.commit_all(project, &release_commit_message(version))
            .await?;
        git(project, &["tag", &tag_name(version)]).await?;
        info!(tag = %tag_name(version), "Tagged release");
        Ok(())
    }

    async fn revert_changes(&self, project: &Path, version: &ProjectVersion) -> Result<()> {
        let tag = tag_name(version);
        if !git(project, &["tag", "-l", &tag]).await?.is_empty() {
            git(project, &["tag", "-d", &tag]).await?;
            info!(tag = %tag, "Deleted release tag");
        }

        let last = git(project, &["log", "-1", "--pretty=%s"]).await?;
        if last == release_commit_message(version) {
            git(project, &["reset", "--hard", "HEAD~1"]).await?;
            info!("Reverted release commit");
        } else {
            git(project, &["reset", "--hard", "HEAD"]).await?;
            info!("No release commit; discarded uncommitted changes");
        }
        Ok(())
    }

    async fn commit_after_bumping_versions(
        &self,
        project: &Path,
        _version: &ProjectVersion,
    ) -> Result<()> {
        self.commit_all(project, RESTORE_COMMIT).await?;
        Ok(())
    }

    async fn push_current_branch(&self, project: &Path) -> Result<()> {
        let branch = self.current_branch(project).await?;
        git(project, &["push", "origin", &branch]).await?;
        git(project, &["push", "origin", "--tags"]).await?;
        info!(branch = %branch, "Pushed branch and tags");
        Ok(())
    }

    async fn current_branch(&self, project: &Path) -> Result<String> {
        git(project, &["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn checkout_branch(&self, project: &Path, branch: &str) -> Result<()> {
        if self.current_branch(project).await? == branch {
            return Ok(());
        }
        git(project, &["checkout", branch]).await?;
        info!(branch = %branch, "Checked out branch");
        Ok(())
    }

    async fn close_milestone(&self, version: &ProjectVersion) -> Result<()> {
        self.github("closing milestones")?
            .close_milestone(version.project_name(), version.version())
            .await
    }

    async fn create_issue(&self, versions: &Projects, version: &ProjectVersion) -> Result<()> {
        let title = format!(
            "Upgrade to {} {}",
            version.project_name(),
            version.version()
        );
        let mut body = format!(
            "{} `{}` is out. Please update the guides to the following versions:\n\n",
            version.availability(),
            version.version()
        );
        for project in versions.iter() {
            body.push_str(&format!("- {}: `{}`\n", project.project_name(), project.version()));
        }
        self.github("creating issues")?
            .create_issue(&self.guides_repository, &title, &body)
            .await
    }
}
