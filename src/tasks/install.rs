//! `install`: install the package and record what was installed.

use super::TaskContext;
use crate::error::{Result, TaskError};
use crate::manifest::InstallManifest;
use crate::runner::ToolCommand;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Number of paths in the freshly written manifest
    pub recorded: usize,
}

/// Run `python setup.py install --record <manifest>`.
///
/// The manifest is written by setup.py itself and replaced on every run. A
/// failed install propagates; whatever the tool wrote before failing stays
/// as-is.
pub fn install(ctx: &mut TaskContext<'_>) -> Result<InstallReport> {
    let manifest = InstallManifest::new(ctx.project_path(&ctx.config.manifest));
    let command = ToolCommand::new(&ctx.config.python)
        .args(["setup.py", "install", "--record"])
        .arg(manifest.path());
    ctx.run_step(command)?;

    if ctx.dry_run {
        return Ok(InstallReport::default());
    }

    match manifest.read_entries() {
        Ok(entries) => {
            tracing::info!(
                manifest = %manifest.path().display(),
                recorded = entries.len(),
                "install recorded"
            );
            Ok(InstallReport {
                recorded: entries.len(),
            })
        }
        Err(TaskError::ManifestMissing(path)) => {
            tracing::warn!(manifest = %path.display(), "install succeeded but wrote no manifest");
            Ok(InstallReport::default())
        }
        Err(e) => Err(e),
    }
}
