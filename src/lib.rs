//! arbalest-tasks library
//!
//! Build, test, install and provisioning tasks for the arbalest Python
//! package, driven by explicit configuration and an install manifest.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod platform;
pub mod preflight;
pub mod process_guard;
pub mod runner;
pub mod tasks;

// Re-export main types for convenience
pub use cleanup::{CleanReport, clean, remove_path_if_exists};
pub use config::{DriverRequirements, ProvisionConfig, TaskConfig};
pub use error::{Result, TaskError};
pub use manifest::InstallManifest;
pub use platform::{PlatformInfo, PointerWidth};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use runner::{
    CommandOutput, CommandRunner, OutputMode, RecordingRunner, SystemRunner, ToolCommand,
};
pub use tasks::install::InstallReport;
pub use tasks::uninstall::UninstallReport;
pub use tasks::{Task, TaskContext, run_task};
