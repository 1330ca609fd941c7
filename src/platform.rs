//! Interpreter platform detection
//!
//! The unit-test task installs a database driver build that must match the
//! interpreter's pointer width. The width is probed once, parsed into
//! [`PointerWidth`], and everything downstream matches on the enum.

use crate::error::{Result, TaskError};
use crate::runner::{CommandRunner, OutputMode, ToolCommand};
use std::fmt;
use std::path::{Path, PathBuf};

/// Prints the interpreter's pointer size in bits
pub const POINTER_WIDTH_PROBE: &str = "import struct; print(struct.calcsize('P') * 8)";

/// Pointer width of the Python interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    /// Parse the probe's output (`"32"` or `"64"`, surrounding whitespace
    /// allowed)
    pub fn from_probe_output(output: &str) -> Result<Self> {
        match output.trim() {
            "32" => Ok(Self::Bits32),
            "64" => Ok(Self::Bits64),
            other => Err(TaskError::platform(format!(
                "unexpected pointer width from interpreter: {:?}",
                other
            ))),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }
}

impl fmt::Display for PointerWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Facts about the interpreter the tasks run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    pub pointer_width: PointerWidth,
}

impl PlatformInfo {
    /// Probe `python` for its pointer width.
    pub fn detect(runner: &mut dyn CommandRunner, python: &str) -> Result<Self> {
        let probe = ToolCommand::new(python).args(["-c", POINTER_WIDTH_PROBE]);
        let output = runner.run(&probe, OutputMode::Capture)?;
        output.ensure_success(&probe)?;

        let pointer_width = PointerWidth::from_probe_output(&output.stdout)?;
        tracing::info!(python, %pointer_width, "interpreter platform detected");
        Ok(Self { pointer_width })
    }
}

/// Directory holding executables inside a virtualenv
pub fn venv_bin_dir() -> &'static str {
    if cfg!(windows) { "Scripts" } else { "bin" }
}

/// Interpreter inside the virtualenv at `venv`
pub fn venv_python(venv: &Path) -> PathBuf {
    venv.join(venv_bin_dir())
        .join(format!("python{}", std::env::consts::EXE_SUFFIX))
}
