use crate::tasks::Task;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// arbalest-tasks - build, test, install and provision arbalest
#[derive(Parser)]
#[command(name = "arbalest-tasks")]
#[command(about = "Task runner for the arbalest Redshift loader")]
#[command(version)]
pub struct Cli {
    /// Project checkout the tasks operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// JSON task configuration (defaults to arbalest-tasks.json in the
    /// project directory, if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dry-run mode: log every step without changing anything.
    ///
    /// Read-only probes (interpreter pointer width) still execute so the
    /// preview matches the real platform.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip the check for required tools on PATH
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove the build directory and compiled artifacts
    Clean,
    /// Run test suites
    Test {
        #[command(subcommand)]
        suite: TestCommands,
    },
    /// Install the package and record installed files
    Install,
    /// Remove every recorded file, then clean
    Uninstall,
    /// Run the in-VM provisioning recipe
    Provision {
        /// Project home inside the VM
        #[arg(long)]
        home: Option<PathBuf>,
    },
    /// List every task with its description
    List,
    /// Run tasks by name, in order (e.g. `run clean test:unit`)
    Run {
        #[arg(required = true, value_parser = parse_task)]
        tasks: Vec<Task>,
    },
}

#[derive(Subcommand)]
pub enum TestCommands {
    /// Unit tests in a throwaway virtualenv
    Unit,
    /// Integration tests in a provisioned VM
    Integration,
}

fn parse_task(name: &str) -> Result<Task, String> {
    name.parse::<Task>().map_err(|_| {
        let known: Vec<String> = Task::catalog().iter().map(|(t, _)| t.to_string()).collect();
        format!("unknown task '{}' (known: {})", name, known.join(", "))
    })
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Tasks to run; no subcommand means the default composite.
    /// `list` runs none.
    pub fn tasks(&self) -> Vec<Task> {
        match &self.command {
            None => vec![Task::Default],
            Some(Commands::Clean) => vec![Task::Clean],
            Some(Commands::Test { suite }) => match suite {
                TestCommands::Unit => vec![Task::TestUnit],
                TestCommands::Integration => vec![Task::TestIntegration],
            },
            Some(Commands::Install) => vec![Task::Install],
            Some(Commands::Uninstall) => vec![Task::Uninstall],
            Some(Commands::Provision { .. }) => vec![Task::Provision],
            Some(Commands::List) => Vec::new(),
            Some(Commands::Run { tasks }) => tasks.clone(),
        }
    }
}
