//! Removal of build output and compiled artifacts.

use crate::config::TaskConfig;
use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a cleanup pass removed (or would remove, in dry-run mode)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub build_dir_removed: bool,
    pub artifacts: Vec<PathBuf>,
}

/// Forced, recursive removal of `path`.
///
/// Returns `Ok(false)` when there was nothing to remove. Symlinks are removed
/// themselves, never followed.
pub fn remove_path_if_exists(path: &Path) -> Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(true),
        // Lost a race with another remover; the end state is the same
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Compiled artifacts under `root` with extension `ext`, in walk order.
///
/// A missing root yields nothing.
pub fn find_artifacts(root: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().is_some_and(|e| e == ext) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Delete the build directory, then every compiled artifact under the
/// configured source and test trees. Idempotent.
pub fn clean(project_dir: &Path, config: &TaskConfig, dry_run: bool) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    let build_dir = project_dir.join(&config.build_dir);
    if dry_run {
        report.build_dir_removed = build_dir.exists();
    } else {
        report.build_dir_removed = remove_path_if_exists(&build_dir)?;
    }
    if report.build_dir_removed {
        tracing::info!(path = %build_dir.display(), dry_run, "removed build directory");
    }

    for root in &config.artifact_roots {
        let root = project_dir.join(root);
        for artifact in find_artifacts(&root, &config.artifact_extension)? {
            if dry_run || remove_path_if_exists(&artifact)? {
                tracing::debug!(path = %artifact.display(), dry_run, "removed artifact");
                report.artifacts.push(artifact);
            }
        }
    }

    tracing::info!(
        artifacts = report.artifacts.len(),
        build_dir = report.build_dir_removed,
        "clean finished"
    );
    Ok(report)
}
