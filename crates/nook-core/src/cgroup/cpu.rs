//! CPU share control via the cgroup v1 `cpu` subsystem.

use std::path::Path;

use nook_common::error::Result;
use nook_common::types::ResourceConfig;

use super::hierarchy::Hierarchy;
use super::subsystem::{Subsystem, attach_pid, configured, remove_cgroup, write_limit};

/// Relative CPU weight control file.
pub const SHARES_FILE: &str = "cpu.shares";

/// Writes `cpu.shares`, the relative weight a cgroup receives under
/// contention.
#[derive(Debug, Clone)]
pub struct CpuSubsystem {
    hierarchy: Hierarchy,
}

impl CpuSubsystem {
    /// Creates the subsystem bound to a mount table.
    #[must_use]
    pub const fn new(hierarchy: Hierarchy) -> Self {
        Self { hierarchy }
    }
}

impl Subsystem for CpuSubsystem {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn set(&self, cgroup_path: &Path, config: &ResourceConfig) -> Result<()> {
        match configured(config.cpu_share.as_ref()) {
            Some(shares) => write_limit(&self.hierarchy, self.name(), cgroup_path, SHARES_FILE, shares),
            None => Ok(()),
        }
    }

    fn apply(&self, cgroup_path: &Path, pid: u32) -> Result<()> {
        attach_pid(&self.hierarchy, self.name(), cgroup_path, pid)
    }

    fn remove(&self, cgroup_path: &Path) -> Result<()> {
        remove_cgroup(&self.hierarchy, self.name(), cgroup_path)
    }
}
