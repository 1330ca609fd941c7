//! Execution of external tools.
//!
//! Tasks describe each step as a [`ToolCommand`] and hand it to a
//! [`CommandRunner`]. [`SystemRunner`] is the real implementation: it spawns
//! the tool in its own process group, registers the PID for signal cleanup
//! and waits for it to exit. [`RecordingRunner`] records steps without
//! spawning anything and can be scripted to fail or answer queries.

use crate::error::{Result, TaskError};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Fill in the working directory unless the step chose its own
    pub(crate) fn with_default_dir(mut self, dir: &Path) -> Self {
        if self.cwd.is_none() {
            self.cwd = Some(dir.to_path_buf());
        }
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a step's output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream straight to the operator's terminal
    Inherit,
    /// Capture stdout/stderr for the caller to inspect
    Capture,
}

/// Result of a finished step
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured stdout (empty in `Inherit` mode)
    pub stdout: String,
    /// Captured stderr (empty in `Inherit` mode)
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Successful output, used by dry runs and fakes
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            success: true,
            ..Self::default()
        }
    }

    /// Turn a non-zero exit into [`TaskError::CommandFailed`]
    pub fn ensure_success(&self, command: &ToolCommand) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            if !self.stderr.trim().is_empty() {
                tracing::error!(command = %command, stderr = %self.stderr.trim(), "step failed");
            }
            Err(TaskError::command_failed(command.to_string(), self.exit_code))
        }
    }
}

/// Seam between tasks and process execution
pub trait CommandRunner {
    /// Run a step to completion. A non-zero exit is reported through
    /// [`CommandOutput::success`], not as an `Err`.
    fn run(&mut self, command: &ToolCommand, mode: OutputMode) -> Result<CommandOutput>;
}

/// Runs tools as real child processes
#[derive(Debug, Default)]
pub struct SystemRunner {
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl CommandRunner for SystemRunner {
    /// In dry-run mode `Inherit` steps are logged and skipped. `Capture`
    /// steps are read-only queries (e.g. interpreter probes) and still run so
    /// the preview reflects the real platform.
    fn run(&mut self, command: &ToolCommand, mode: OutputMode) -> Result<CommandOutput> {
        if self.dry_run && mode == OutputMode::Inherit {
            tracing::info!(command = %command, "[dry run] skipped");
            return Ok(CommandOutput::ok(""));
        }

        tracing::info!(
            command = %command,
            cwd = ?command.get_current_dir(),
            "running step"
        );

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null()).in_new_process_group();
        match mode {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        let child = cmd.spawn().map_err(|source| TaskError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let waited = child.wait_with_output();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let output = waited?;
        let exit_code = output.status.code();
        let success = output.status.success();
        if success {
            tracing::debug!(command = %command, "step finished");
        } else {
            tracing::warn!(command = %command, exit_code = ?exit_code, "step exited unsuccessfully");
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            success,
        })
    }
}

/// Records every step instead of running it.
///
/// Steps whose rendered command line contains a registered failure pattern
/// exit with the given code; steps matching a response pattern get that
/// stdout. Everything else succeeds with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Vec<ToolCommand>,
    failures: Vec<(String, i32)>,
    responses: Vec<(String, String)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make steps containing `pattern` exit with `code`
    pub fn fail_on(mut self, pattern: impl Into<String>, code: i32) -> Self {
        self.failures.push((pattern.into(), code));
        self
    }

    /// Make steps containing `pattern` print `stdout`
    pub fn respond(mut self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.push((pattern.into(), stdout.into()));
        self
    }

    pub fn calls(&self) -> &[ToolCommand] {
        &self.calls
    }

    /// Rendered command lines, in execution order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.iter().map(ToString::to_string).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, command: &ToolCommand, _mode: OutputMode) -> Result<CommandOutput> {
        self.calls.push(command.clone());
        let line = command.to_string();

        if let Some((_, code)) = self.failures.iter().find(|(p, _)| line.contains(p.as_str())) {
            return Ok(CommandOutput {
                stderr: format!("{} failed", line),
                exit_code: Some(*code),
                success: false,
                ..CommandOutput::default()
            });
        }

        let stdout = self
            .responses
            .iter()
            .find(|(p, _)| line.contains(p.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(CommandOutput::ok(stdout))
    }
}
