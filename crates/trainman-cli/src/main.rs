//! Trainman CLI - release train orchestration
//!
//! The `trainman` command resolves release train versions and runs release
//! pipelines against real project checkouts.
//!
//! ## Commands
//!
//! - `tasks`: List the release tasks in execution order
//! - `classify`: Classify a version string
//! - `versions`: Resolve the train-wide version set
//! - `release`: Run the release pipeline for one project
//! - `meta-release`: Release a whole train in order

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn, Level};

use trainman_core::telemetry::init_tracing;
use trainman_core::{
    builtin_scheduler, Arguments, Collaborators, MetaReleaseCoordinator, ProjectVersion, Projects,
    ReleaserConfig, RollbackHandler, RunReport, RunStatus, RuntimeOptions, TaskRegistry,
    TaskScheduler, TrainReport,
};

#[derive(Parser)]
#[command(name = "trainman")]
#[command(author = "Stevedores Org")]
#[command(version = trainman_core::VERSION)]
#[command(about = "Release train orchestration", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults are used when omitted
    #[arg(short, long, global = true, env = "TRAINMAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Print run reports as JSON on stdout
    #[arg(long, global = true)]
    json_report: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List release tasks in execution order
    Tasks,

    /// Classify a version string
    Classify {
        /// Version to classify, e.g. `2021.0.0-M3` or `Hoxton.SR3`
        version: String,
    },

    /// Resolve the train-wide version set
    Versions {
        /// Train BOM (properties file)
        #[arg(long)]
        bom: Option<PathBuf>,
    },

    /// Run the release pipeline for one project
    Release {
        /// Project checkout (default: `working_dir` from the config, else `.`)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Only run these tasks (names or short names, comma separated)
        #[arg(short, long, value_delimiter = ',', conflicts_with = "from")]
        tasks: Vec<String>,

        /// Run this task and every task after it
        #[arg(long)]
        from: Option<String>,

        /// Release this version instead of the one in the version set
        #[arg(long)]
        version: Option<String>,

        /// Train BOM (properties file)
        #[arg(long)]
        bom: Option<PathBuf>,
    },

    /// Release every project of a train in order
    MetaRelease {
        /// Projects to release, in order (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        train: Vec<String>,

        /// Train BOM (properties file)
        #[arg(long)]
        bom: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = Arc::new(load_config(cli.config.as_deref())?);

    match cli.command {
        Commands::Tasks => cmd_tasks(&config, cli.json_report),
        Commands::Classify { version } => Ok(cmd_classify(&version)),
        Commands::Versions { bom } => cmd_versions(&config, bom.as_deref(), cli.json_report).await,
        Commands::Release {
            project,
            tasks,
            from,
            version,
            bom,
        } => {
            let selection = TaskSelection::new(tasks, from);
            cmd_release(
                config,
                project,
                &selection,
                version.as_deref(),
                bom.as_deref(),
                cli.json_report,
            )
            .await
        }
        Commands::MetaRelease { train, bom } => {
            cmd_meta_release(config, &train, bom.as_deref(), cli.json_report).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ReleaserConfig> {
    match path {
        Some(path) => ReleaserConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ReleaserConfig::default()),
    }
}

fn collaborators(config: &ReleaserConfig) -> Result<Collaborators> {
    trainman_exec::collaborators(config).context("failed to set up collaborators")
}

/// Sender side is flipped by Ctrl-C; schedulers poll the receiver between steps.
fn cancellation() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping before the next step");
            let _ = tx.send(true);
        }
    });
    rx
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ========== Task Selection ==========

/// Which tasks a single-project release runs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskSelection {
    All,
    Only(Vec<String>),
    From(String),
}

impl TaskSelection {
    fn new(tasks: Vec<String>, from: Option<String>) -> Self {
        let tasks: Vec<String> = tasks
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        match from {
            Some(from) => TaskSelection::From(from),
            None if !tasks.is_empty() => TaskSelection::Only(tasks),
            None => TaskSelection::All,
        }
    }

    fn apply(&self, registry: TaskRegistry) -> Result<TaskRegistry> {
        let selected = match self {
            TaskSelection::All => registry,
            TaskSelection::Only(names) => registry.select(names.as_slice())?,
            TaskSelection::From(name) => registry.starting_from(name)?,
        };
        Ok(selected)
    }
}

fn run_status_exit_code(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => 0,
        RunStatus::Aborted => 1,
        RunStatus::Unstable => 2,
    }
}

// ========== Version Resolution ==========

/// Resolve the version set: the BOM first, then fixed overrides on top.
///
/// Without an explicit BOM the train project is cloned and checked out at
/// `bom.branch` when `git.fetch_versions_from_git` is set; otherwise only
/// `fixed_versions` are used.
async fn resolve_versions(
    config: &ReleaserConfig,
    collaborators: &Collaborators,
    bom: Option<&Path>,
) -> Result<Projects> {
    let from_bom = match bom {
        Some(bom) => Some(bom.to_path_buf()),
        None if config.git.fetch_versions_from_git => {
            let train = &config.meta_release.release_train_project_name;
            let checkout = collaborators
                .vcs
                .clone_project(train)
                .await
                .with_context(|| format!("failed to clone release train project {train}"))?;
            let branch = &config.bom.branch;
            collaborators
                .vcs
                .checkout_branch(&checkout, branch)
                .await
                .with_context(|| format!("failed to check out {train} at {branch}"))?;
            Some(checkout.join(&config.bom.train_bom))
        }
        None => None,
    };

    let versions = match from_bom {
        Some(bom) => Projects::resolve_from_train_bom(collaborators.descriptor.as_ref(), &bom)
            .await
            .with_context(|| format!("failed to resolve versions from {}", bom.display()))?
            .apply_fixed_overrides(&config.fixed_versions)?,
        None => Projects::from_fixed_versions(&config.fixed_versions)?,
    };
    if versions.is_empty() {
        bail!("no versions resolved; pass --bom or configure fixed_versions");
    }
    Ok(versions)
}

// ========== Commands ==========

fn cmd_tasks(config: &ReleaserConfig, json_report: bool) -> Result<ExitCode> {
    let registry = TaskRegistry::builtin(&collaborators(config)?);
    let descriptors = registry.descriptors();
    if json_report {
        print_json(&descriptors)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<24} {:<6} {:<20} {:>6}  DESCRIPTION", "NAME", "SHORT", "PHASE", "WEIGHT");
    for task in descriptors {
        println!(
            "{:<24} {:<6} {:<20} {:>6}  {}",
            task.name,
            task.short_name,
            task.phase.to_string(),
            task.order,
            task.description
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_classify(version: &str) -> ExitCode {
    match ProjectVersion::new("version", version) {
        Ok(parsed) => {
            let kind = parsed.kind();
            println!("{version}: {} ({})", kind.code(), parsed.availability());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

#[derive(Serialize)]
struct VersionRow<'a> {
    project: &'a str,
    version: &'a str,
    kind: String,
}

async fn cmd_versions(
    config: &ReleaserConfig,
    bom: Option<&Path>,
    json_report: bool,
) -> Result<ExitCode> {
    let collaborators = collaborators(config)?;
    let versions = resolve_versions(config, &collaborators, bom).await?;

    let rows: Vec<VersionRow<'_>> = versions
        .iter()
        .map(|v| VersionRow {
            project: v.project_name(),
            version: v.version(),
            kind: v.kind().code(),
        })
        .collect();
    if json_report {
        print_json(&rows)?;
    } else {
        for row in rows {
            println!("{:<40} {:<24} {}", row.project, row.version, row.kind);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_release(
    config: Arc<ReleaserConfig>,
    project: Option<PathBuf>,
    selection: &TaskSelection,
    version: Option<&str>,
    bom: Option<&Path>,
    json_report: bool,
) -> Result<ExitCode> {
    let collaborators = collaborators(&config)?;
    let checkout = project.unwrap_or_else(|| config.working_dir());
    let name = collaborators
        .descriptor
        .read_project_name(&checkout)
        .await
        .with_context(|| format!("failed to read project name in {}", checkout.display()))?;

    let (versions, target) = match version {
        Some(version) => {
            let target = ProjectVersion::new(&name, version)?;
            let resolved = match resolve_versions(&config, &collaborators, bom).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(error = %e, "No version set resolved; releasing {name} on its own");
                    Projects::new()
                }
            };
            let versions =
                Projects::from_versions(resolved.iter().cloned().chain([target.clone()]));
            (versions, target)
        }
        None => {
            let versions = resolve_versions(&config, &collaborators, bom).await?;
            let target = versions.require(&name)?.clone();
            (versions, target)
        }
    };

    let registry = selection.apply(TaskRegistry::builtin(&collaborators))?;
    let rollback =
        RollbackHandler::new(collaborators.descriptor.clone(), collaborators.vcs.clone());
    let scheduler = TaskScheduler::new(registry, rollback).with_cancellation(cancellation());

    info!(project = %name, version = %target.version(), "Releasing project");
    let args = Arguments::new(
        checkout,
        Arc::new(versions),
        target,
        RuntimeOptions::new(config),
    );
    let report = scheduler.run(&args).await;

    if json_report {
        print_json(&report)?;
    } else {
        print_run_report(&report);
    }
    Ok(ExitCode::from(run_status_exit_code(report.status)))
}

async fn cmd_meta_release(
    config: Arc<ReleaserConfig>,
    train: &[String],
    bom: Option<&Path>,
    json_report: bool,
) -> Result<ExitCode> {
    let collaborators = collaborators(&config)?;
    let versions = resolve_versions(&config, &collaborators, bom).await?;

    let cancel = cancellation();
    let scheduler = builtin_scheduler(&collaborators).with_cancellation(cancel.clone());
    let coordinator = MetaReleaseCoordinator::new(
        scheduler,
        collaborators.vcs.clone(),
        &RuntimeOptions::new(config),
    )
    .with_cancellation(cancel);

    let report = coordinator.run(train, Arc::new(versions)).await;

    if json_report {
        print_json(&report)?;
    } else {
        print_train_report(&report);
    }
    let code = u8::try_from(report.exit_code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}

// ========== Output ==========

fn print_run_report(report: &RunReport) {
    println!("{} {}: {}", report.project, report.version, report.status);
    for task in &report.tasks {
        let detail = task.result.cause.as_deref().unwrap_or("");
        println!(
            "  {:<24} {:<8} {:>7}ms  {}",
            task.name,
            task.result.status.to_string(),
            task.duration_ms,
            detail
        );
    }
    if let Some(cause) = &report.cause {
        println!("Cause: {cause}");
    }
    if let Some(rollback) = &report.rollback {
        println!("Rollback: {}", rollback.state);
        for error in &rollback.errors {
            println!("  {error}");
        }
    }
}

fn print_train_report(report: &TrainReport) {
    println!("Train {}", report.train_id);
    for entry in &report.entries {
        match &entry.cause {
            Some(cause) => println!(
                "  {:<40} {:<14} {}",
                entry.project,
                entry.outcome.to_string(),
                cause
            ),
            None => println!("  {:<40} {}", entry.project, entry.outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use trainman_core::fakes::{FakeCollaborators, FakeDescriptor, FakeVcs};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_release_arguments() {
        let cli = Cli::try_parse_from([
            "trainman",
            "--json-report",
            "release",
            "--project",
            "/tmp/spring-cloud-build",
            "--tasks",
            "u,b",
            "--version",
            "3.1.0",
        ])
        .unwrap();

        assert!(cli.json_report);
        match cli.command {
            Commands::Release {
                project,
                tasks,
                version,
                from,
                ..
            } => {
                assert_eq!(project, Some(PathBuf::from("/tmp/spring-cloud-build")));
                assert_eq!(tasks, vec!["u", "b"]);
                assert_eq!(version.as_deref(), Some("3.1.0"));
                assert!(from.is_none());
            }
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn test_tasks_and_from_conflict() {
        let parsed = Cli::try_parse_from([
            "trainman", "release", "--tasks", "build", "--from", "push",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_meta_release_requires_train() {
        assert!(Cli::try_parse_from(["trainman", "meta-release"]).is_err());

        let cli = Cli::try_parse_from([
            "trainman",
            "meta-release",
            "--train",
            "spring-cloud-build,spring-cloud-commons",
        ])
        .unwrap();
        match cli.command {
            Commands::MetaRelease { train, bom } => {
                assert_eq!(train, vec!["spring-cloud-build", "spring-cloud-commons"]);
                assert!(bom.is_none());
            }
            _ => panic!("expected meta-release"),
        }
    }

    #[test]
    fn test_task_selection() {
        assert_eq!(TaskSelection::new(vec![], None), TaskSelection::All);
        assert_eq!(
            TaskSelection::new(vec![" u".to_string(), String::new()], None),
            TaskSelection::Only(vec!["u".to_string()])
        );
        assert_eq!(
            TaskSelection::new(vec![], Some("push".to_string())),
            TaskSelection::From("push".to_string())
        );
    }

    #[test]
    fn test_task_selection_applies_to_registry() {
        let fakes = FakeCollaborators::new();
        let registry = TaskRegistry::builtin(&fakes.collaborators());

        let only = TaskSelection::Only(vec!["b".to_string(), "updatePoms".to_string()])
            .apply(registry.clone())
            .unwrap();
        let names: Vec<&str> = only.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["updatePoms", "build"]);

        let from = TaskSelection::From("updateAllSamples".to_string())
            .apply(registry.clone())
            .unwrap();
        assert_eq!(from.len(), 1);

        assert!(TaskSelection::From("nope".to_string()).apply(registry).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(run_status_exit_code(RunStatus::Success), 0);
        assert_eq!(run_status_exit_code(RunStatus::Aborted), 1);
        assert_eq!(run_status_exit_code(RunStatus::Unstable), 2);
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainman.toml");
        std::fs::write(
            &path,
            "[fixed_versions]\nspring-cloud-build = \"3.1.0\"\n\n[build]\nwait_time_minutes = 5\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.build.wait_time_minutes, 5);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
        assert_eq!(load_config(None).unwrap(), ReleaserConfig::default());
    }

    #[tokio::test]
    async fn test_resolve_versions_from_fixed_versions() {
        let mut config = ReleaserConfig::default();
        config.git.fetch_versions_from_git = false;
        config
            .fixed_versions
            .insert("spring-cloud-build".to_string(), "3.1.0".to_string());
        let fakes = FakeCollaborators::new();

        let versions = resolve_versions(&config, &fakes.collaborators(), None)
            .await
            .unwrap();

        assert_eq!(versions.get("spring-cloud-build").unwrap().version(), "3.1.0");
        assert_eq!(fakes.calls().count("clone_project"), 0);
    }

    #[tokio::test]
    async fn test_resolve_versions_without_any_source_fails() {
        let mut config = ReleaserConfig::default();
        config.git.fetch_versions_from_git = false;
        let fakes = FakeCollaborators::new();

        let err = resolve_versions(&config, &fakes.collaborators(), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no versions resolved"), "{err:#}");
    }

    #[tokio::test]
    async fn test_resolve_versions_clones_train_project_at_bom_branch() {
        let mut config = ReleaserConfig::default();
        config.bom.branch = "2021.0.x".to_string();
        config
            .fixed_versions
            .insert("spring-cloud-commons".to_string(), "3.1.1".to_string());
        let fakes = FakeCollaborators::new().with_descriptor(FakeDescriptor::new().with_bom(vec![
            ("spring-cloud-build", "3.1.0"),
            ("spring-cloud-commons", "3.1.0"),
        ]));

        let versions = resolve_versions(&config, &fakes.collaborators(), None)
            .await
            .unwrap();

        assert_eq!(
            fakes.calls().operations(),
            vec!["clone_project", "checkout_branch", "read_bom_versions"]
        );
        assert!(fakes
            .calls()
            .contains("checkout_branch:spring-cloud-release@2021.0.x"));
        assert_eq!(versions.get("spring-cloud-build").unwrap().version(), "3.1.0");
        assert_eq!(versions.get("spring-cloud-commons").unwrap().version(), "3.1.1");
    }

    #[tokio::test]
    async fn test_resolve_versions_from_git_with_empty_bom_fails() {
        let fakes = FakeCollaborators::new();

        let err = resolve_versions(&ReleaserConfig::default(), &fakes.collaborators(), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to resolve versions"), "{err:#}");
    }

    #[tokio::test]
    async fn test_resolve_versions_stops_when_bom_branch_is_missing() {
        let fakes = FakeCollaborators::new().with_vcs(FakeVcs::new().failing("checkout_branch"));

        let err = resolve_versions(&ReleaserConfig::default(), &fakes.collaborators(), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to check out spring-cloud-release at main"));
        assert_eq!(fakes.calls().count("read_bom_versions"), 0);
    }
}
