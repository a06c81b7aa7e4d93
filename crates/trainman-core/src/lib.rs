//! Trainman Core: release train orchestration engine
//!
//! Decides which version every project of a release train adopts, runs the
//! ordered release pipeline for a project and undoes a failed release.
//!
//! ## Key Components
//!
//! - [`version`]: version classification (`SNAPSHOT`, `M<n>`, `RC<n>`, `SR<n>`, GA)
//! - [`Projects`]: the train-wide version set
//! - [`task`]: the task model, built-in tasks and the [`TaskRegistry`]
//! - [`TaskScheduler`]: single-project pipeline with soft/hard fault handling
//! - [`RollbackHandler`]: reverts a failed release and restores snapshots
//! - [`MetaReleaseCoordinator`]: releases a whole train in order
//!
//! All I/O goes through the traits in [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod error;
pub mod fakes;
pub mod meta_release;
pub mod obs;
pub mod projects;
pub mod rollback;
pub mod scheduler;
pub mod task;
pub mod telemetry;
pub mod version;

pub use collaborators::{
    Collaborators, DescriptorHandler, DocumentationUpdater, PostReleaseActions, ProjectBuilder,
    ProjectCatalog, TemplateGenerator, VcsHandler,
};
pub use config::ReleaserConfig;
pub use error::{ReleaseError, Result};
pub use meta_release::{MetaReleaseCoordinator, ProjectOutcome, TrainEntry, TrainReport};
pub use projects::Projects;
pub use rollback::{RollbackHandler, RollbackReport, RollbackState};
pub use scheduler::{RunReport, RunStatus, TaskRecord, TaskScheduler};
pub use task::{
    Arguments, ExecutionResult, RuntimeOptions, Task, TaskDescriptor, TaskPhase, TaskRegistry,
    TaskStatus,
};
pub use version::{classify, ProjectVersion, VersionKind};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scheduler over the built-in tasks, rolling back through `collaborators`.
pub fn builtin_scheduler(collaborators: &Collaborators) -> TaskScheduler {
    TaskScheduler::new(
        TaskRegistry::builtin(collaborators),
        RollbackHandler::new(collaborators.descriptor.clone(), collaborators.vcs.clone()),
    )
}
