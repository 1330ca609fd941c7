//! `provision`: the recipe run inside the integration VM.
//!
//! Three stages: system packages needed to build the database driver, the
//! pip bootstrap, then the test bootstrap inside the project home (install,
//! unit tests, test discovery helper, discovered integration tests).

use super::TaskContext;
use crate::config::TaskConfig;
use crate::error::Result;
use crate::runner::ToolCommand;

/// Every recipe step in execution order
pub fn recipe(config: &TaskConfig) -> Vec<ToolCommand> {
    let provision = &config.provision;
    let home = &provision.home;
    let mut steps = Vec::new();

    if let Some((program, base_args)) = provision.package_command.split_first() {
        for package in &provision.packages {
            steps.push(ToolCommand::new(program).args(base_args).arg(package));
        }
    }

    steps.push(ToolCommand::new("easy_install").arg("pip"));
    steps.push(ToolCommand::new("pip").args(["install", "psycopg2"]));

    let python = &config.python;
    steps.push(
        ToolCommand::new(python)
            .args(["setup.py", "install"])
            .current_dir(home),
    );
    steps.push(ToolCommand::new(python).args(["setup.py", "test"]).current_dir(home));
    steps.push(ToolCommand::new("pip").args(["install", "discover"]).current_dir(home));
    steps.push(
        ToolCommand::new(python)
            .args(["-m", "discover", "-s"])
            .arg(&provision.integration_dir)
            .current_dir(home),
    );

    steps
}

/// Run the recipe, stopping at the first failing step
pub fn provision(ctx: &mut TaskContext<'_>) -> Result<()> {
    let steps = recipe(&ctx.config);
    tracing::info!(
        home = %ctx.config.provision.home.display(),
        steps = steps.len(),
        "provisioning"
    );
    for step in steps {
        ctx.run_step(step)?;
    }
    Ok(())
}
