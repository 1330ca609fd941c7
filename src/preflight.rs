//! Pre-flight checks run before any task step
//!
//! Verifies that the tools a task plan needs are on PATH, so a missing
//! `vagrant` is reported up front instead of after submodules were fetched.

use crate::config::TaskConfig;
use crate::tasks::Task;
use std::env;
use std::ffi::OsStr;
use std::path::Path;

#[derive(Debug, Default)]
pub struct PreflightResult {
    pub missing_tools: Vec<String>,
}

impl PreflightResult {
    pub fn is_ok(&self) -> bool {
        self.missing_tools.is_empty()
    }
}

/// True if `name` is a path to an existing file or is found on `path_var`
pub fn tool_exists(name: &str, path_var: Option<&OsStr>) -> bool {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }

    let Some(path_var) = path_var else {
        return false;
    };
    env::split_paths(path_var).any(|dir| {
        let full = dir.join(name);
        full.is_file() || (cfg!(windows) && dir.join(format!("{name}.exe")).is_file())
    })
}

/// Check every tool required by `tasks`, each reported once
pub fn verify_tools(tasks: &[Task], config: &TaskConfig) -> PreflightResult {
    let path_var = env::var_os("PATH");
    let mut missing: Vec<String> = Vec::new();

    for task in tasks {
        for tool in task.required_tools(config) {
            if missing.contains(&tool) {
                continue;
            }
            if !tool_exists(&tool, path_var.as_deref()) {
                tracing::debug!(%task, %tool, "required tool not found");
                missing.push(tool);
            }
        }
    }

    PreflightResult {
        missing_tools: missing,
    }
}
