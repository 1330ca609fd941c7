//! `test:unit`: run the unit suite in a throwaway virtualenv.

use super::TaskContext;
use crate::cleanup::remove_path_if_exists;
use crate::error::Result;
use crate::platform::{PlatformInfo, venv_python};
use crate::runner::ToolCommand;
use std::path::{Path, PathBuf};

/// Removes the virtualenv directory when dropped, whatever the tests did
pub struct VenvGuard {
    path: PathBuf,
    dry_run: bool,
}

impl VenvGuard {
    pub fn new(path: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            path: path.into(),
            dry_run,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VenvGuard {
    fn drop(&mut self) {
        if self.dry_run {
            tracing::info!(path = %self.path.display(), "[dry run] would remove virtualenv");
            return;
        }
        match remove_path_if_exists(&self.path) {
            Ok(_) => tracing::debug!(path = %self.path.display(), "virtualenv removed"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove virtualenv")
            }
        }
    }
}

/// Create the virtualenv, install the platform's driver build, run
/// `setup.py test`, and tear the virtualenv down even if a step failed.
pub fn run_unit_tests(ctx: &mut TaskContext<'_>) -> Result<()> {
    let python = ctx.config.python.clone();
    let venv_dir = ctx.project_path(&ctx.config.venv_dir);

    ctx.run_step(
        ToolCommand::new(&python).args(["-m", "pip", "install", "virtualenv", "--upgrade"]),
    )?;

    // Without any driver build configured the width is irrelevant
    let driver = if ctx.config.driver_requirements.is_empty() {
        None
    } else {
        let platform = PlatformInfo::detect(ctx.runner(), &python)?;
        ctx.config
            .driver_requirements
            .for_width(platform.pointer_width)
            .map(|requirement| (platform.pointer_width, requirement.to_string()))
    };

    // Armed before creation so a half-built env is removed too
    let venv = VenvGuard::new(&venv_dir, ctx.dry_run);
    ctx.run_step(ToolCommand::new(&python).args(["-m", "virtualenv"]).arg(venv.path()))?;

    let env_python = venv_python(venv.path());
    if let Some((pointer_width, requirement)) = driver {
        tracing::info!(%pointer_width, %requirement, "installing driver build");
        ctx.run_step(
            ToolCommand::new(&env_python)
                .args(["-m", "pip", "install", "-e"])
                .arg(requirement),
        )?;
    }

    ctx.run_step(ToolCommand::new(&env_python).args(["setup.py", "test"]))
}
