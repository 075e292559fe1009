//! The pluggable resource subsystem capability.

use std::fmt;
use std::path::Path;

use nook_common::error::{NookError, Result};
use nook_common::types::ResourceConfig;

use super::cpu::CpuSubsystem;
use super::cpuset::CpusetSubsystem;
use super::hierarchy::{Hierarchy, write_control};
use super::memory::MemorySubsystem;

/// Process-membership control file of a cgroup v1 directory.
pub const TASKS_FILE: &str = "tasks";

/// One resource-limiting capability over a cgroup path.
///
/// Implementations own no per-container state; every call receives the
/// cgroup path relative to the subsystem's hierarchy root.
pub trait Subsystem: fmt::Debug + Send + Sync {
    /// Returns the kernel name of the subsystem (`memory`, `cpu`, `cpuset`).
    fn name(&self) -> &'static str;

    /// Writes this subsystem's limit from `config`. A no-op when the
    /// relevant field is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup cannot be resolved or written.
    fn set(&self, cgroup_path: &Path, config: &ResourceConfig) -> Result<()>;

    /// Adds `pid` to the cgroup's membership file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup cannot be resolved or written.
    fn apply(&self, cgroup_path: &Path, pid: u32) -> Result<()>;

    /// Removes the cgroup directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup is missing or cannot be removed.
    fn remove(&self, cgroup_path: &Path) -> Result<()>;
}

/// Returns the default ordered subsystem set bound to one mount table.
#[must_use]
pub fn default_subsystems(hierarchy: &Hierarchy) -> Vec<Box<dyn Subsystem>> {
    vec![
        Box::new(CpusetSubsystem::new(hierarchy.clone())),
        Box::new(MemorySubsystem::new(hierarchy.clone())),
        Box::new(CpuSubsystem::new(hierarchy.clone())),
    ]
}

/// Returns a configured, non-empty value.
pub(crate) fn configured(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Writes a limit value into a subsystem's auto-created cgroup.
pub(crate) fn write_limit(
    hierarchy: &Hierarchy,
    subsystem: &str,
    cgroup_path: &Path,
    file: &str,
    value: &str,
) -> Result<()> {
    let dir = hierarchy.cgroup_dir(subsystem, cgroup_path, true)?;
    write_control(&dir, file, value)?;
    tracing::debug!(subsystem, file, value, "cgroup limit set");
    Ok(())
}

/// Records `pid` in the subsystem's `tasks` file.
pub(crate) fn attach_pid(hierarchy: &Hierarchy, subsystem: &str, cgroup_path: &Path, pid: u32) -> Result<()> {
    let dir = hierarchy.cgroup_dir(subsystem, cgroup_path, true)?;
    write_control(&dir, TASKS_FILE, &pid.to_string())?;
    tracing::debug!(subsystem, pid, "process attached to cgroup");
    Ok(())
}

/// Removes the subsystem's cgroup directory.
///
/// Uses `rmdir` semantics: the kernel drops the control files along with
/// the directory, while a recursive delete would fail on them.
pub(crate) fn remove_cgroup(hierarchy: &Hierarchy, subsystem: &str, cgroup_path: &Path) -> Result<()> {
    let dir = hierarchy.cgroup_dir(subsystem, cgroup_path, false)?;
    std::fs::remove_dir(&dir).map_err(|e| NookError::io(&dir, e))?;
    tracing::debug!(subsystem, path = %dir.display(), "cgroup removed");
    Ok(())
}
