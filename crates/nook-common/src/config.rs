//! Runtime configuration threaded through every manager constructor.

use std::path::PathBuf;

use crate::constants;

/// Root configuration for the nook runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NookConfig {
    /// Directory holding image archives, base layers, write layers and
    /// merged mount points.
    pub root_dir: PathBuf,
    /// Directory holding one record directory per container name.
    pub state_dir: PathBuf,
    /// Parent cgroup path under every subsystem hierarchy.
    pub cgroup_parent: PathBuf,
    /// Mount table scanned to locate subsystem hierarchies.
    pub mountinfo: PathBuf,
    /// Root of the process pseudo-filesystem.
    pub proc_root: PathBuf,
}

impl NookConfig {
    /// Builds a configuration rooted at the given directories, keeping the
    /// default cgroup parent and kernel paths.
    #[must_use]
    pub fn with_dirs(root_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    /// Returns the cgroup path for a container, relative to each
    /// subsystem's hierarchy root.
    #[must_use]
    pub fn cgroup_path(&self, container_name: &str) -> PathBuf {
        self.cgroup_parent.join(container_name)
    }

    /// Returns the `/proc/<pid>` directory for a host pid.
    #[must_use]
    pub fn proc_dir(&self, pid: &str) -> PathBuf {
        self.proc_root.join(pid)
    }
}

impl Default for NookConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(constants::DEFAULT_ROOT_DIR),
            state_dir: PathBuf::from(constants::DEFAULT_STATE_DIR),
            cgroup_parent: PathBuf::from(constants::DEFAULT_CGROUP_PARENT),
            mountinfo: PathBuf::from(constants::DEFAULT_MOUNTINFO),
            proc_root: PathBuf::from(constants::DEFAULT_PROC_ROOT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgroup_path_is_scoped_under_parent() {
        let config = NookConfig::default();
        assert_eq!(config.cgroup_path("web"), PathBuf::from("nook/web"));
    }

    #[test]
    fn with_dirs_keeps_kernel_defaults() {
        let config = NookConfig::with_dirs("/tmp/root", "/tmp/state");
        assert_eq!(config.root_dir, PathBuf::from("/tmp/root"));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/state"));
        assert_eq!(config.mountinfo, PathBuf::from(constants::DEFAULT_MOUNTINFO));
        assert_eq!(config.proc_dir("42"), PathBuf::from("/proc/42"));
    }
}
