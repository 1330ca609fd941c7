//! arbalest-tasks - main entry point

use anyhow::{Context, Result};
use arbalest_tasks::cli::{Cli, Commands};
use arbalest_tasks::{
    SystemRunner, Task, TaskConfig, TaskContext, TaskError, preflight, process_guard, run_task,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Configuration picked up from the project directory when `--config` is
/// not given
const PROJECT_CONFIG_FILE: &str = "arbalest-tasks.json";

/// Initialize logging. `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    // Interrupting a task must not leave pip or vagrant running
    if let Err(e) = process_guard::init_signal_handlers() {
        tracing::warn!("Failed to initialize signal handlers: {}", e);
    }

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        let code = e
            .downcast_ref::<TaskError>()
            .map(TaskError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if matches!(cli.command, Some(Commands::List)) {
        for (task, description) in Task::catalog() {
            println!("{:<18} # {}", task.to_string(), description);
        }
        return Ok(());
    }

    let project_dir = cli
        .project_dir
        .canonicalize()
        .with_context(|| format!("Project directory {:?} is not accessible", cli.project_dir))?;
    let config = load_config(cli, &project_dir)?;

    let tasks = cli.tasks();
    let planned: Vec<Task> = tasks.iter().flat_map(|t| t.plan()).collect();
    debug!(?planned, "task plan");

    if !cli.skip_preflight && !cli.dry_run {
        let result = preflight::verify_tools(&planned, &config);
        if !result.is_ok() {
            anyhow::bail!(
                "missing required tools: {} (use --skip-preflight to run anyway)",
                result.missing_tools.join(", ")
            );
        }
    }

    let mut runner = SystemRunner::new(cli.dry_run);
    let mut ctx = TaskContext::new(project_dir, config, cli.dry_run, &mut runner);

    for task in tasks {
        run_task(task, &mut ctx)?;
    }

    info!("all tasks finished");
    Ok(())
}

/// Load the task configuration and apply command-line overrides
fn load_config(cli: &Cli, project_dir: &Path) -> Result<TaskConfig> {
    let path: Option<PathBuf> = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let candidate = project_dir.join(PROJECT_CONFIG_FILE);
            candidate.is_file().then_some(candidate)
        }
    };

    let mut config = match &path {
        Some(path) => TaskConfig::load_from_file(path)
            .with_context(|| format!("Failed to load task configuration {}", path.display()))?,
        None => TaskConfig::default(),
    };

    if let Some(Commands::Provision { home: Some(home) }) = &cli.command {
        config.provision.home = home.clone();
    }

    config.validate().context("Invalid task configuration")?;
    Ok(config)
}
