//! Task configuration.
//!
//! Every value a task needs is carried explicitly in [`TaskConfig`]: the
//! interpreter, the manifest location, artifact locations, the virtualenv
//! directory and the provisioning recipe inputs. Nothing is looked up from
//! ambient state at task time. A JSON file can override any subset of the
//! defaults; fields absent from the file keep their default values.

use crate::error::{Result, TaskError};
use crate::platform::PointerWidth;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Default install manifest written by `setup.py install --record`
pub const DEFAULT_MANIFEST: &str = "install.txt";

/// Default home of the project inside the provisioned VM (the Vagrant share)
pub const DEFAULT_PROVISION_HOME: &str = "/vagrant";

/// Configuration shared by all tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Interpreter used for setup.py, pip and virtualenv
    pub python: String,
    /// Install manifest, relative to the project directory
    pub manifest: PathBuf,
    /// Build output directory removed by `clean`
    pub build_dir: PathBuf,
    /// Trees scanned for compiled artifacts (source tree, test tree)
    pub artifact_roots: Vec<PathBuf>,
    /// Extension of compiled artifacts, without the leading dot
    pub artifact_extension: String,
    /// Throwaway virtualenv used by `test:unit`
    pub venv_dir: PathBuf,
    /// Database driver installed into the virtualenv, per interpreter width
    pub driver_requirements: DriverRequirements,
    /// Inputs of the in-VM provisioning recipe
    pub provision: ProvisionConfig,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            build_dir: PathBuf::from("build"),
            artifact_roots: vec![PathBuf::from("arbalest"), PathBuf::from("test")],
            artifact_extension: "pyc".to_string(),
            venv_dir: PathBuf::from("env"),
            driver_requirements: DriverRequirements::default(),
            provision: ProvisionConfig::default(),
        }
    }
}

/// Editable pip requirement for the database driver, keyed by pointer width.
///
/// `None` means the interpreter's platform needs no special build and the
/// driver comes from the regular `install_requires` resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverRequirements {
    pub bits32: Option<String>,
    pub bits64: Option<String>,
}

impl Default for DriverRequirements {
    fn default() -> Self {
        // Prebuilt psycopg2 wheels are only needed where no compiler is around
        if cfg!(windows) {
            Self {
                bits32: Some(
                    "git+https://github.com/nwcell/psycopg2-windows.git@win32-py27#egg=psycopg2"
                        .to_string(),
                ),
                bits64: Some(
                    "git+https://github.com/nwcell/psycopg2-windows.git@win64-py27#egg=psycopg2"
                        .to_string(),
                ),
            }
        } else {
            Self {
                bits32: None,
                bits64: None,
            }
        }
    }
}

impl DriverRequirements {
    /// No driver build is configured for either width
    pub fn is_empty(&self) -> bool {
        self.bits32.is_none() && self.bits64.is_none()
    }

    /// Requirement for the given interpreter width, if any
    pub fn for_width(&self, width: PointerWidth) -> Option<&str> {
        match width {
            PointerWidth::Bits32 => self.bits32.as_deref(),
            PointerWidth::Bits64 => self.bits64.as_deref(),
        }
    }
}

/// Inputs of the provisioning recipe run inside the integration VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Project checkout inside the VM
    pub home: PathBuf,
    /// Package manager invocation; each package is appended as the last arg
    pub package_command: Vec<String>,
    /// System packages needed to build the database driver
    pub packages: Vec<String>,
    /// Directory of discovered integration tests, relative to `home`
    pub integration_dir: PathBuf,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(DEFAULT_PROVISION_HOME),
            package_command: vec!["yum".to_string(), "install".to_string(), "-y".to_string()],
            packages: ["gcc", "python-devel", "python-setuptools", "postgresql-devel"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            integration_dir: PathBuf::from("integration"),
        }
    }
}

impl TaskConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TaskError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded task configuration");
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values that would make a task act on the wrong paths
    pub fn validate(&self) -> Result<()> {
        if self.python.trim().is_empty() {
            return Err(TaskError::config("python interpreter must be specified"));
        }
        if self.manifest.as_os_str().is_empty() {
            return Err(TaskError::config("manifest path must be specified"));
        }
        if self.build_dir.as_os_str().is_empty() {
            return Err(TaskError::config("build directory must be specified"));
        }
        if self.venv_dir.as_os_str().is_empty() {
            return Err(TaskError::config("virtualenv directory must be specified"));
        }

        let ext = &self.artifact_extension;
        if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(TaskError::config(format!(
                "artifact extension must be a bare extension like \"pyc\", got {:?}",
                ext
            )));
        }

        // Cleanup deletes recursively under these, so they must stay inside
        // the project directory
        for root in &self.artifact_roots {
            if root.has_root() || root.components().any(|c| c.as_os_str() == "..") {
                return Err(TaskError::config(format!(
                    "artifact root must be relative to the project: {}",
                    root.display()
                )));
            }
        }
        // `.` or `./.` would make cleanup remove the whole project
        if self.build_dir.has_root()
            || self.build_dir.components().any(|c| c.as_os_str() == "..")
            || !self
                .build_dir
                .components()
                .any(|c| matches!(c, Component::Normal(_)))
        {
            return Err(TaskError::config(format!(
                "build directory must be relative to the project: {}",
                self.build_dir.display()
            )));
        }

        if self.provision.package_command.is_empty() {
            return Err(TaskError::config("provision package command must not be empty"));
        }
        if !self.provision.home.has_root() {
            return Err(TaskError::config(format!(
                "provision home must be an absolute path inside the VM: {}",
                self.provision.home.display()
            )));
        }

        Ok(())
    }
}
