//! `uninstall`: remove every path recorded by `install`, then clean.
//!
//! Removal continues past individual failures. Each manifest line is visited
//! exactly once, in file order, and failures are collected in the report.
//! Cleanup always runs after the manifest has been processed.

use super::TaskContext;
use crate::cleanup::{self, CleanReport, remove_path_if_exists};
use crate::error::Result;
use crate::manifest::InstallManifest;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Default)]
pub struct UninstallReport {
    /// Every manifest entry, in the order it was processed
    pub visited: Vec<PathBuf>,
    /// Entries that existed and were removed
    pub removed: Vec<PathBuf>,
    /// Entries that could not be removed, with the reason
    pub failed: Vec<(PathBuf, String)>,
    pub clean: CleanReport,
}

/// Process the install manifest, then run cleanup.
///
/// A missing manifest is an error and nothing is removed. Per-path failures
/// do not abort: they are logged and returned in [`UninstallReport::failed`].
pub fn uninstall(ctx: &mut TaskContext<'_>) -> Result<UninstallReport> {
    let manifest = InstallManifest::new(ctx.project_path(&ctx.config.manifest));
    let entries = manifest.read_entries()?;
    tracing::info!(
        manifest = %manifest.path().display(),
        entries = entries.len(),
        "uninstalling recorded files"
    );

    let mut report = UninstallReport::default();
    for raw in entries {
        // Relative entries are relative to the directory setup.py ran in
        let entry = ctx.project_path(&raw);
        if let Some(reason) = removal_refusal(&raw, &entry, &ctx.project_dir) {
            tracing::error!(path = %entry.display(), reason, "refusing to remove");
            report.failed.push((entry.clone(), reason.to_string()));
        } else if ctx.dry_run {
            if std::fs::symlink_metadata(&entry).is_ok() {
                tracing::info!(path = %entry.display(), "[dry run] would remove");
                report.removed.push(entry.clone());
            }
        } else {
            match remove_path_if_exists(&entry) {
                Ok(true) => {
                    tracing::debug!(path = %entry.display(), "removed");
                    report.removed.push(entry.clone());
                }
                Ok(false) => {
                    tracing::debug!(path = %entry.display(), "already absent");
                }
                Err(e) => {
                    tracing::error!(path = %entry.display(), error = %e, "failed to remove");
                    report.failed.push((entry.clone(), e.to_string()));
                }
            }
        }
        report.visited.push(entry);
    }

    report.clean = cleanup::clean(&ctx.project_dir, &ctx.config, ctx.dry_run)?;

    if report.failed.is_empty() {
        tracing::info!(removed = report.removed.len(), "uninstall finished");
    } else {
        tracing::warn!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "uninstall finished with failures"
        );
    }
    Ok(report)
}

/// Why `resolved` must not be removed, if it must not.
///
/// Entries naming `.` or `..`, the file system root, or the project
/// directory or one of its ancestors are refused.
fn removal_refusal(raw: &Path, resolved: &Path, project_dir: &Path) -> Option<&'static str> {
    if matches!(
        raw.components().next_back(),
        Some(Component::CurDir | Component::ParentDir)
    ) {
        return Some("refusing to remove '.' or '..'");
    }

    let target = normalize_lexically(resolved);
    if target.parent().is_none() {
        return Some("refusing to remove the file system root");
    }
    if normalize_lexically(project_dir).starts_with(&target) {
        return Some("refusing to remove the project directory or one of its ancestors");
    }
    None
}

/// Resolve `.` and `..` without touching the file system
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskConfig;
    use crate::error::TaskError;
    use crate::runner::RecordingRunner;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_manifest_is_error() {
        let dir = tempdir().unwrap();
        let mut runner = RecordingRunner::new();
        let mut ctx = TaskContext::new(dir.path(), TaskConfig::default(), false, &mut runner);
        let err = uninstall(&mut ctx).unwrap_err();
        assert!(matches!(err, TaskError::ManifestMissing(_)));
    }

    #[test]
    fn test_refuses_dot_entries_and_ancestors() {
        let project = Path::new("/srv/arbalest");
        let check = |raw: &str| {
            let raw = Path::new(raw);
            removal_refusal(raw, &project.join(raw), project)
        };

        assert!(check(".").is_some());
        assert!(check("./").is_some());
        assert!(check("..").is_some());
        assert!(check("build/..").is_some());
        assert!(check("/").is_some());
        assert!(check("/srv").is_some());
        assert!(check("/srv/arbalest").is_some());
        assert!(check("/srv/arbalest/build/../.").is_some());

        assert!(check("build/lib").is_none());
        assert!(check("/usr/lib/python2.7/site-packages/arbalest").is_none());
        assert!(check("/srv/arbalest-old").is_none());
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/b/../c/.")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dry_run_counts_dangling_symlink() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("site-packages/arbalest.egg-link");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();
        InstallManifest::new(dir.path().join("install.txt"))
            .write_entries(&[&link])
            .unwrap();

        let mut runner = RecordingRunner::new();
        let mut ctx = TaskContext::new(dir.path(), TaskConfig::default(), true, &mut runner);
        let report = uninstall(&mut ctx).unwrap();

        assert_eq!(report.removed, vec![link.clone()]);
        assert!(fs::symlink_metadata(&link).is_ok());
    }

    #[test]
    fn test_dry_run_keeps_files() {
        let dir = tempdir().unwrap();
        let installed = dir.path().join("site-packages/arbalest/core.py");
        fs::create_dir_all(installed.parent().unwrap()).unwrap();
        fs::write(&installed, "").unwrap();
        InstallManifest::new(dir.path().join("install.txt"))
            .write_entries(&[&installed])
            .unwrap();

        let mut runner = RecordingRunner::new();
        let mut ctx = TaskContext::new(dir.path(), TaskConfig::default(), true, &mut runner);
        let report = uninstall(&mut ctx).unwrap();

        assert_eq!(report.removed, vec![installed.clone()]);
        assert!(installed.exists());
    }
}
