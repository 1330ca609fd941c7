//! Tests for the manifest-driven install/uninstall flow
//!
//! These tests verify:
//! - Uninstall visits every manifest line once, in file order
//! - Already-absent paths are not errors
//! - A failing removal does not stop later removals
//! - Install followed by uninstall leaves no recorded path behind

use arbalest_tasks::error::Result;
use arbalest_tasks::tasks::{install, uninstall};
use arbalest_tasks::{
    CommandOutput, CommandRunner, InstallManifest, OutputMode, RecordingRunner, Task, TaskConfig,
    TaskContext, TaskError, ToolCommand, run_task,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// Project directory with a manifest listing `entries`
fn project_with_manifest(entries: &[PathBuf]) -> TempDir {
    let dir = tempdir().unwrap();
    InstallManifest::new(dir.path().join("install.txt"))
        .write_entries(entries)
        .unwrap();
    dir
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "installed").unwrap();
}

// =============================================================================
// Uninstall Tests
// =============================================================================

#[test]
fn test_uninstall_removes_listed_files_in_order() {
    let scratch = tempdir().unwrap();
    let file1 = scratch.path().join("a/file1");
    let file2 = scratch.path().join("a/file2");
    touch(&file1);
    touch(&file2);

    let project = project_with_manifest(&[file1.clone(), file2.clone()]);
    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    let report = uninstall::uninstall(&mut ctx).unwrap();

    assert!(!file1.exists());
    assert!(!file2.exists());
    assert_eq!(report.visited, vec![file1.clone(), file2.clone()]);
    assert_eq!(report.removed, vec![file1, file2]);
    assert!(report.failed.is_empty());
}

#[test]
fn test_uninstall_tolerates_missing_paths() {
    let scratch = tempdir().unwrap();
    let gone = scratch.path().join("already/removed.py");
    let present = scratch.path().join("site-packages/arbalest/s3.py");
    touch(&present);

    let project = project_with_manifest(&[gone.clone(), present.clone()]);
    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    let report = uninstall::uninstall(&mut ctx).unwrap();

    assert_eq!(report.visited.len(), 2);
    assert_eq!(report.removed, vec![present.clone()]);
    assert!(report.failed.is_empty());
    assert!(!present.exists());
}

#[test]
fn test_uninstall_is_idempotent() {
    let scratch = tempdir().unwrap();
    let file = scratch.path().join("lib/arbalest/core.py");
    touch(&file);

    let project = project_with_manifest(&[file.clone()]);
    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    run_task(Task::Uninstall, &mut ctx).unwrap();
    run_task(Task::Uninstall, &mut ctx).unwrap();
    assert!(!file.exists());
}

#[test]
fn test_uninstall_removes_directories_recursively() {
    let scratch = tempdir().unwrap();
    let egg = scratch.path().join("arbalest-1.5.0-py2.7.egg");
    touch(&egg.join("EGG-INFO/PKG-INFO"));
    touch(&egg.join("arbalest/core.py"));

    let project = project_with_manifest(&[egg.clone()]);
    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    uninstall::uninstall(&mut ctx).unwrap();
    assert!(!egg.exists());
}

#[test]
fn test_uninstall_runs_cleanup_afterwards() {
    let scratch = tempdir().unwrap();
    let file = scratch.path().join("core.py");
    touch(&file);

    let project = project_with_manifest(&[file]);
    touch(&project.path().join("build/lib/arbalest/core.py"));
    touch(&project.path().join("arbalest/core.pyc"));

    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);
    let report = uninstall::uninstall(&mut ctx).unwrap();

    assert!(report.clean.build_dir_removed);
    assert_eq!(report.clean.artifacts.len(), 1);
    assert!(!project.path().join("build").exists());
    assert!(!project.path().join("arbalest/core.pyc").exists());
    // The manifest itself is left in place
    assert!(project.path().join("install.txt").exists());
}

#[test]
fn test_missing_manifest_fails_task() {
    let project = tempdir().unwrap();
    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    let err = run_task(Task::Uninstall, &mut ctx).unwrap_err();
    assert!(matches!(err, TaskError::ManifestMissing(_)));
}

#[cfg(unix)]
#[test]
fn test_uninstall_continues_after_failed_removal() {
    use std::os::unix::fs::PermissionsExt;

    // Root ignores directory permissions, so the failure cannot be staged
    if nix::unistd::geteuid().is_root() {
        return;
    }

    let scratch = tempdir().unwrap();
    let locked_dir = scratch.path().join("locked");
    let stuck = locked_dir.join("stuck.py");
    let later = scratch.path().join("later.py");
    touch(&stuck);
    touch(&later);
    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o555)).unwrap();

    let project = project_with_manifest(&[stuck.clone(), later.clone()]);
    let mut runner = RecordingRunner::new();
    let report = {
        let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);
        uninstall::uninstall(&mut ctx).unwrap()
    };

    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, stuck);
    assert!(!later.exists(), "later entries are still processed");
    assert_eq!(report.visited.len(), 2);

    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o555)).unwrap();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);
    let err = run_task(Task::Uninstall, &mut ctx).unwrap_err();
    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(matches!(err, TaskError::Uninstall { failed: 1 }));
}

#[test]
fn test_uninstall_refuses_project_and_root_entries() {
    let project = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let installed = scratch.path().join("site-packages/arbalest/core.py");
    touch(&installed);
    touch(&project.path().join("arbalest/core.py"));

    InstallManifest::new(project.path().join("install.txt"))
        .write_entries(&[
            PathBuf::from("."),
            PathBuf::from(".."),
            project.path().to_path_buf(),
            PathBuf::from("/"),
            installed.clone(),
        ])
        .unwrap();

    let mut runner = RecordingRunner::new();
    let report = {
        let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);
        uninstall::uninstall(&mut ctx).unwrap()
    };

    assert_eq!(report.failed.len(), 4);
    assert_eq!(report.visited.len(), 5);
    assert_eq!(report.removed, vec![installed.clone()]);
    assert!(!installed.exists());
    assert!(project.path().join("arbalest/core.py").exists());
    assert!(project.path().join("install.txt").exists());

    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);
    let err = run_task(Task::Uninstall, &mut ctx).unwrap_err();
    assert!(matches!(err, TaskError::Uninstall { failed: 4 }));
}

#[cfg(unix)]
#[test]
fn test_uninstall_removes_non_utf8_paths() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let scratch = tempdir().unwrap();
    let good = scratch.path().join("good.py");
    let odd = scratch.path().join(OsStr::from_bytes(b"caf\xe9.py"));
    touch(&good);
    touch(&odd);

    let project = project_with_manifest(&[good.clone(), odd.clone()]);
    let mut runner = RecordingRunner::new();
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    let report = uninstall::uninstall(&mut ctx).unwrap();

    assert_eq!(report.removed, vec![good.clone(), odd.clone()]);
    assert!(!good.exists());
    assert!(!odd.exists());
}

// =============================================================================
// Install -> Uninstall Round Trip
// =============================================================================

/// Stands in for `setup.py install --record`: creates the files it
/// "installs" and records them in the manifest it was given
struct FakeSetupPy {
    site_packages: PathBuf,
}

impl CommandRunner for FakeSetupPy {
    fn run(&mut self, command: &ToolCommand, _mode: OutputMode) -> Result<CommandOutput> {
        let args: Vec<PathBuf> = command.get_args().map(PathBuf::from).collect();
        let record = args
            .iter()
            .position(|a| a.as_os_str() == "--record")
            .map(|i| args[i + 1].clone())
            .expect("install must pass --record");

        let installed = vec![
            self.site_packages.join("arbalest/__init__.py"),
            self.site_packages.join("arbalest/core.py"),
            self.site_packages.join("arbalest/redshift/step.py"),
        ];
        for path in &installed {
            touch(path);
        }
        InstallManifest::new(record).write_entries(&installed)?;
        Ok(CommandOutput::ok(""))
    }
}

#[test]
fn test_install_then_uninstall_leaves_nothing() {
    let project = tempdir().unwrap();
    let site = tempdir().unwrap();
    let mut runner = FakeSetupPy {
        site_packages: site.path().to_path_buf(),
    };
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);

    let installed = install::install(&mut ctx).unwrap();
    assert_eq!(installed.recorded, 3);

    let entries = InstallManifest::new(project.path().join("install.txt"))
        .read_entries()
        .unwrap();
    assert!(entries.iter().all(|p| p.exists()));

    run_task(Task::Uninstall, &mut ctx).unwrap();
    assert!(entries.iter().all(|p| !p.exists()));
}

#[test]
fn test_reinstall_reports_new_manifest() {
    let project = tempdir().unwrap();
    let site = tempdir().unwrap();
    let manifest = InstallManifest::new(project.path().join("install.txt"));
    manifest
        .write_entries(&[site.path().join("stale/old_module.py")])
        .unwrap();

    let mut runner = FakeSetupPy {
        site_packages: site.path().to_path_buf(),
    };
    let mut ctx = TaskContext::new(project.path(), TaskConfig::default(), false, &mut runner);
    let report = install::install(&mut ctx).unwrap();

    // The count comes from the manifest as re-read after the install step
    assert_eq!(report.recorded, 3);
    run_task(Task::Uninstall, &mut ctx).unwrap();
    assert!(!site.path().join("arbalest/core.py").exists());
}
