//! `test:integration`: run the provisioning recipe's test steps in a VM.

use super::TaskContext;
use crate::error::Result;
use crate::runner::ToolCommand;

/// Fetch submodules, bring the VM up with provisioning, then destroy it.
///
/// Once `vagrant up` has been attempted the VM is always destroyed. If both
/// fail, the `vagrant up` error is the one reported.
pub fn run_integration_tests(ctx: &mut TaskContext<'_>) -> Result<()> {
    ctx.run_step(ToolCommand::new("git").args(["submodule", "update", "--init"]))?;

    let up = ctx.run_step(ToolCommand::new("vagrant").args(["up", "--provision"]));
    if let Err(e) = &up {
        tracing::error!(error = %e, "provisioned test run failed, destroying VM");
    }

    let destroy = ctx.run_step(ToolCommand::new("vagrant").args(["destroy", "-f"]));
    up.and(destroy)
}
