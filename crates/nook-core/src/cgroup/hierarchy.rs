//! Locating subsystem hierarchies in the mount table.
//!
//! Each cgroup v1 subsystem is mounted at its own hierarchy root. The root
//! is found by scanning `/proc/self/mountinfo` for an entry whose super
//! options name the subsystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nook_common::error::{NookError, Result};

/// Index of the mount point within a mountinfo line.
const MOUNT_POINT_FIELD: usize = 4;

/// Handle to the mount table used to resolve subsystem roots.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    mountinfo: PathBuf,
}

impl Hierarchy {
    /// Creates a hierarchy resolver reading the given mountinfo file.
    #[must_use]
    pub fn new(mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: mountinfo.into(),
        }
    }

    /// Returns the hierarchy root for a subsystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read or no entry
    /// carries the subsystem in its options.
    pub fn mountpoint(&self, subsystem: &str) -> Result<PathBuf> {
        let table = std::fs::read_to_string(&self.mountinfo)
            .map_err(|e| NookError::io(&self.mountinfo, e))?;
        find_mountpoint(&table, subsystem).ok_or_else(|| NookError::NotFound {
            kind: "cgroup hierarchy",
            id: subsystem.to_string(),
        })
    }

    /// Resolves the absolute directory of `cgroup_path` under a subsystem's
    /// hierarchy root.
    ///
    /// A missing directory is created when `auto_create` is set; otherwise
    /// it is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be located, the directory is
    /// missing without `auto_create`, or creation fails.
    pub fn cgroup_dir(&self, subsystem: &str, cgroup_path: &Path, auto_create: bool) -> Result<PathBuf> {
        let dir = self.mountpoint(subsystem)?.join(cgroup_path);
        match std::fs::metadata(&dir) {
            Ok(_) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::NotFound && auto_create => {
                std::fs::create_dir_all(&dir).map_err(|e| NookError::io(&dir, e))?;
                tracing::debug!(subsystem, path = %dir.display(), "cgroup created");
                Ok(dir)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(NookError::Config {
                message: format!(
                    "cgroup {} does not exist and auto-create was not requested",
                    dir.display()
                ),
            }),
            Err(e) => Err(NookError::io(&dir, e)),
        }
    }
}

/// Finds the mount point of the first entry whose super options contain
/// `subsystem` exactly.
#[must_use]
pub fn find_mountpoint(mountinfo: &str, subsystem: &str) -> Option<PathBuf> {
    mountinfo.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let options = fields.last()?;
        if options.split(',').any(|opt| opt == subsystem) {
            fields.get(MOUNT_POINT_FIELD).map(PathBuf::from)
        } else {
            None
        }
    })
}

/// Writes a value to a control file inside a cgroup directory.
pub(crate) fn write_control(dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = dir.join(file);
    std::fs::write(&path, value).map_err(|e| NookError::io(&path, e))
}
