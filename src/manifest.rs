//! Install manifest.
//!
//! Plain text, one installed path per line, exactly as written by
//! `setup.py install --record`. No header, no checksum. The manifest is
//! overwritten by every install and left in place after uninstall.

use crate::error::{Result, TaskError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallManifest {
    path: PathBuf,
}

impl InstallManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Recorded paths in file order.
    ///
    /// Nothing is checked against the file system; entries may already be
    /// gone.
    pub fn read_entries(&self) -> Result<Vec<PathBuf>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TaskError::ManifestMissing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_entries(content))
    }

    /// Replace the manifest with `entries`, one per line
    pub fn write_entries<P: AsRef<Path>>(&self, entries: &[P]) -> Result<()> {
        let mut content = Vec::new();
        for entry in entries {
            content.extend_from_slice(&path_to_bytes(entry.as_ref()));
            content.push(b'\n');
        }
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Split manifest content into paths.
///
/// Line endings (`\n` or `\r\n`) are stripped and blank lines skipped.
/// Leading and trailing spaces are kept: they are legal in file names. On
/// Unix the bytes of each line are taken as-is, so names that are not
/// valid UTF-8 survive.
pub fn parse_entries(content: impl AsRef<[u8]>) -> Vec<PathBuf> {
    content
        .as_ref()
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(path_from_bytes)
        .collect()
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}
