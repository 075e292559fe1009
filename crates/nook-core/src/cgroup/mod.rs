//! Cgroup v1 resource management.
//!
//! A [`CgroupManager`] holds one cgroup path and one resource
//! configuration and forwards `set`, `apply`, and `destroy` to an ordered
//! chain of [`Subsystem`]s. Every pass is best-effort: a failing subsystem
//! is logged and the remaining ones still run.

pub mod cpu;
pub mod cpuset;
pub mod hierarchy;
pub mod memory;
pub mod subsystem;

use std::path::PathBuf;
use std::sync::Arc;

use nook_common::types::ResourceConfig;

pub use hierarchy::Hierarchy;
pub use subsystem::{Subsystem, default_subsystems};

/// Resource control chain for one container.
#[derive(Debug)]
pub struct CgroupManager {
    /// Cgroup path relative to each subsystem's hierarchy root.
    path: PathBuf,
    /// Limits written by [`CgroupManager::set`].
    config: ResourceConfig,
    /// Registered subsystems, visited in order. Stateless, so one set may
    /// back many managers.
    subsystems: Arc<[Box<dyn Subsystem>]>,
}

impl CgroupManager {
    /// Creates a manager over an explicit subsystem set.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        config: ResourceConfig,
        subsystems: impl Into<Arc<[Box<dyn Subsystem>]>>,
    ) -> Self {
        Self {
            path: path.into(),
            config,
            subsystems: subsystems.into(),
        }
    }

    /// Writes the configured limits through every subsystem.
    ///
    /// Returns the names of the subsystems that failed.
    pub fn set(&self) -> Vec<&'static str> {
        self.for_each("set", |s| s.set(&self.path, &self.config))
    }

    /// Attaches `pid` to the cgroup of every subsystem.
    ///
    /// Returns the names of the subsystems that failed.
    pub fn apply(&self, pid: u32) -> Vec<&'static str> {
        tracing::info!(path = %self.path.display(), pid, "attaching process to cgroups");
        self.for_each("apply", |s| s.apply(&self.path, pid))
    }

    /// Removes the cgroup directory of every subsystem.
    ///
    /// Returns the names of the subsystems that failed.
    pub fn destroy(&self) -> Vec<&'static str> {
        let failed = self.for_each("remove", |s| s.remove(&self.path));
        tracing::info!(path = %self.path.display(), failed = failed.len(), "cgroups destroyed");
        failed
    }

    fn for_each<F>(&self, operation: &str, mut op: F) -> Vec<&'static str>
    where
        F: FnMut(&dyn Subsystem) -> nook_common::error::Result<()>,
    {
        let mut failed = Vec::new();
        for subsystem in self.subsystems.iter() {
            if let Err(e) = op(subsystem.as_ref()) {
                tracing::warn!(
                    subsystem = subsystem.name(),
                    operation,
                    error = %e,
                    "cgroup subsystem operation failed"
                );
                failed.push(subsystem.name());
            }
        }
        failed
    }
}
