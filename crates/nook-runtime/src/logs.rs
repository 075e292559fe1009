//! Container log management.

use std::fs::{File, OpenOptions};
use std::path::Path;

use nook_common::error::{NookError, Result};

/// Opens the log file that receives a detached container's standard
/// output for appending, creating it and its directory first.
///
/// Existing content is kept. The log is opened before the container's
/// name is claimed, so it must not clobber a log that belongs to another
/// container under the same name.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| NookError::io(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NookError::io(path, e))
}

/// Reads a container log.
///
/// Returns an empty string if the log file does not exist, which is the
/// case for interactive containers.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_log(path: &Path) -> Result<String> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(NookError::io(path, e)),
    }
}
