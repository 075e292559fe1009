//! Memory resource control via the cgroup v1 `memory` subsystem.

use std::path::Path;

use nook_common::error::Result;
use nook_common::types::ResourceConfig;

use super::hierarchy::Hierarchy;
use super::subsystem::{Subsystem, attach_pid, configured, remove_cgroup, write_limit};

/// Hard memory limit control file.
pub const LIMIT_FILE: &str = "memory.limit_in_bytes";

/// Writes `memory.limit_in_bytes`.
#[derive(Debug, Clone)]
pub struct MemorySubsystem {
    hierarchy: Hierarchy,
}

impl MemorySubsystem {
    /// Creates the subsystem bound to a mount table.
    #[must_use]
    pub const fn new(hierarchy: Hierarchy) -> Self {
        Self { hierarchy }
    }
}

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, cgroup_path: &Path, config: &ResourceConfig) -> Result<()> {
        match configured(config.memory_limit.as_ref()) {
            Some(limit) => write_limit(&self.hierarchy, self.name(), cgroup_path, LIMIT_FILE, limit),
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
