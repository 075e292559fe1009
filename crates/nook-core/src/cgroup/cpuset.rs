//! CPU pinning via the cgroup v1 `cpuset` subsystem.

use std::path::{Component, Path, PathBuf};

use nook_common::error::{NookError, Result};
use nook_common::types::ResourceConfig;

use super::hierarchy::{Hierarchy, write_control};
use super::subsystem::{Subsystem, attach_pid, configured, remove_cgroup};

/// Allowed CPUs control file.
pub const CPUS_FILE: &str = "cpuset.cpus";

/// Allowed memory nodes control file.
pub const MEMS_FILE: &str = "cpuset.mems";

/// Writes `cpuset.cpus`.
#[derive(Debug, Clone)]
pub struct CpusetSubsystem {
    hierarchy: Hierarchy,
}

impl CpusetSubsystem {
    /// Creates the subsystem bound to a mount table.
    #[must_use]
    pub const fn new(hierarchy: Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Creates every level of `cgroup_path` below the hierarchy root and
    /// copies `cpuset.cpus` and `cpuset.mems` down into each level that is
    /// still empty. The kernel refuses tasks, and children, in an unseeded
    /// cpuset. Returns the directory of the last level.
    fn prepare(&self, cgroup_path: &Path) -> Result<PathBuf> {
        let mut parent = self.hierarchy.mountpoint(self.name())?;
        for component in cgroup_path.components() {
            let Component::Normal(level) = component else {
                return Err(NookError::Config {
                    message: format!("cgroup path must be relative: {}", cgroup_path.display()),
                });
            };
            let dir = parent.join(level);
            std::fs::create_dir_all(&dir).map_err(|e| NookError::io(&dir, e))?;
            seed(&parent, &dir)?;
            parent = dir;
        }
        Ok(parent)
    }
}

fn seed(parent: &Path, dir: &Path) -> Result<()> {
    for file in [CPUS_FILE, MEMS_FILE] {
        if !read_control(dir, file)?.is_empty() {
            continue;
        }
        let inherited = read_control(parent, file)?;
        if !inherited.is_empty() {
            write_control(dir, file, &inherited)?;
        }
    }
    Ok(())
}

/// Reads a control file, treating an absent file as empty.
fn read_control(dir: &Path, file: &str) -> Result<String> {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(NookError::io(&path, e)),
    }
}

impl Subsystem for CpusetSubsystem {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn set(&self, cgroup_path: &Path, config: &ResourceConfig) -> Result<()> {
        match configured(config.cpu_set.as_ref()) {
            Some(cpus) => {
                let dir = self.prepare(cgroup_path)?;
                write_control(&dir, CPUS_FILE, cpus)
            }
            None => Ok(()),
        }
    }

    fn apply(&self, cgroup_path: &Path, pid: u32) -> Result<()> {
        let _ = self.prepare(cgroup_path)?;
        attach_pid(&self.hierarchy, self.name(), cgroup_path, pid)
    }

    fn remove(&self, cgroup_path: &Path) -> Result<()> {
        remove_cgroup(&self.hierarchy, self.name(), cgroup_path)
    }
}
