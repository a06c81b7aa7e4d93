//! Trainman Exec: concrete collaborators for the release engine
//!
//! - [`ProcessBuilder`]: build, deploy and docs commands with a bounded wait
//! - [`SystemGit`]: clone, commit, tag, revert and push through `git`
//! - [`PropertiesDescriptor`]: properties-file descriptors and BOMs
//! - [`TeraTemplates`]: email, blog, tweet, release notes and wiki
//! - [`HttpCatalog`]: project catalog updates over HTTP
//! - [`ScriptedActions`]: documentation and train-wide command lists

pub mod builder;
pub mod catalog;
pub mod command;
pub mod descriptor;
pub mod git;
pub mod github;
mod properties;
pub mod scripted;
pub mod templates;

use std::sync::Arc;

use trainman_core::{Collaborators, ReleaserConfig, Result};

pub use builder::ProcessBuilder;
pub use catalog::HttpCatalog;
pub use command::{CommandOutput, CommandRunner};
pub use descriptor::PropertiesDescriptor;
pub use git::SystemGit;
pub use scripted::ScriptedActions;
pub use templates::TeraTemplates;

/// Wire every collaborator from `config`.
pub fn collaborators(config: &ReleaserConfig) -> Result<Collaborators> {
    let scripted = Arc::new(ScriptedActions::new(config));
    Ok(Collaborators {
        descriptor: Arc::new(PropertiesDescriptor::new(&config.descriptor, &config.bom)?),
        vcs: Arc::new(SystemGit::new(&config.git, &config.meta_release)?),
        builder: Arc::new(ProcessBuilder::new(config.build.clone())),
        templates: Arc::new(TeraTemplates::new(config)?),
        catalog: Arc::new(HttpCatalog::new(&config.catalog)?),
        docs: scripted.clone(),
        post_release: scripted,
    })
}
