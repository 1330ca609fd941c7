//! Operator-facing tasks.
//!
//! Each task is a linear sequence of steps with no retries. Composite tasks
//! expand into their members through [`Task::plan`].

pub mod install;
pub mod integration;
pub mod provision;
pub mod uninstall;
pub mod unit;

use crate::cleanup;
use crate::config::TaskConfig;
use crate::error::{Result, TaskError};
use crate::runner::{CommandRunner, OutputMode, ToolCommand};
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Every task the runner knows, named the way operators type them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Task {
    #[strum(serialize = "clean")]
    Clean,
    #[strum(serialize = "test:unit")]
    TestUnit,
    #[strum(serialize = "test:integration")]
    TestIntegration,
    #[strum(serialize = "install")]
    Install,
    #[strum(serialize = "uninstall")]
    Uninstall,
    #[strum(serialize = "provision")]
    Provision,
    #[strum(serialize = "default")]
    Default,
}

impl Task {
    pub fn description(self) -> &'static str {
        match self {
            Self::Clean => "Remove the build directory and compiled artifacts",
            Self::TestUnit => "Run unit tests in a throwaway virtualenv",
            Self::TestIntegration => "Run integration tests in a provisioned VM",
            Self::Install => "Install the package and record installed files",
            Self::Uninstall => "Remove every recorded file, then clean",
            Self::Provision => "Run the in-VM provisioning recipe",
            Self::Default => "Clean, then run unit tests",
        }
    }

    /// Concrete tasks this task runs, in order
    pub fn plan(self) -> Vec<Task> {
        match self {
            Self::Default => vec![Self::Clean, Self::TestUnit],
            other => vec![other],
        }
    }

    /// Tools that must be on PATH before the task starts
    pub fn required_tools(self, config: &TaskConfig) -> Vec<String> {
        match self {
            Self::Clean | Self::Uninstall => Vec::new(),
            Self::TestUnit | Self::Install => vec![config.python.clone()],
            Self::TestIntegration => vec!["git".to_string(), "vagrant".to_string()],
            Self::Provision => {
                let mut tools = vec![config.python.clone(), "easy_install".to_string()];
                tools.extend(config.provision.package_command.first().cloned());
                tools
            }
            Self::Default => self
                .plan()
                .into_iter()
                .flat_map(|t| t.required_tools(config))
                .collect(),
        }
    }

    /// Task listing, one `name  description` line per task
    pub fn catalog() -> Vec<(Task, &'static str)> {
        Task::iter().map(|t| (t, t.description())).collect()
    }
}

/// Everything a task needs, passed in explicitly
pub struct TaskContext<'r> {
    pub project_dir: PathBuf,
    pub config: TaskConfig,
    pub dry_run: bool,
    runner: &'r mut dyn CommandRunner,
}

impl<'r> TaskContext<'r> {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        config: TaskConfig,
        dry_run: bool,
        runner: &'r mut dyn CommandRunner,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            config,
            dry_run,
            runner,
        }
    }

    /// Resolve a project-relative path
    pub fn project_path(&self, rel: &Path) -> PathBuf {
        self.project_dir.join(rel)
    }

    pub fn runner(&mut self) -> &mut dyn CommandRunner {
        &mut *self.runner
    }

    /// Run a step with output streamed to the terminal; non-zero exit is an
    /// error. Steps without a working directory run in the project directory.
    pub fn run_step(&mut self, command: ToolCommand) -> Result<()> {
        let command = command.with_default_dir(&self.project_dir);
        let output = self.runner.run(&command, OutputMode::Inherit)?;
        output.ensure_success(&command)
    }
}

/// Run one task (expanding composites) against `ctx`
pub fn run_task(task: Task, ctx: &mut TaskContext<'_>) -> Result<()> {
    for step in task.plan() {
        tracing::info!(task = %step, "starting task");
        match step {
            Task::Clean => {
                cleanup::clean(&ctx.project_dir, &ctx.config, ctx.dry_run)?;
            }
            Task::TestUnit => unit::run_unit_tests(ctx)?,
            Task::TestIntegration => integration::run_integration_tests(ctx)?,
            Task::Install => {
                install::install(ctx)?;
            }
            Task::Uninstall => {
                let report = uninstall::uninstall(ctx)?;
                if !report.failed.is_empty() {
                    return Err(TaskError::Uninstall {
                        failed: report.failed.len(),
                    });
                }
            }
            Task::Provision => provision::provision(ctx)?,
            Task::Default => unreachable!("composite tasks are expanded by plan()"),
        }
        tracing::info!(task = %step, "task finished");
    }
    Ok(())
}
