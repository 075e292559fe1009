//! Linux namespace kinds used for isolation and namespace entry.
//!
//! A container's init process is cloned into a fresh namespace of every
//! [`NamespaceKind`]; `exec` later joins those same namespaces through the
//! init process's `/proc/<pid>/ns` files.

pub mod join;

use std::fmt;

use nix::sched::CloneFlags;

pub use join::{JoinReport, NamespaceJoiner, SetnsJoiner, join_all};

/// One isolated namespace class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// System V IPC and POSIX message queues.
    Ipc,
    /// Hostname and domain name.
    Uts,
    /// Network stack.
    Net,
    /// Process ids.
    Pid,
    /// Mount table.
    Mnt,
}

impl NamespaceKind {
    /// Order in which namespaces are joined. The mount namespace comes last
    /// so the earlier `/proc/<pid>/ns` paths still resolve on the host.
    pub const JOIN_ORDER: [Self; 5] = [Self::Ipc, Self::Uts, Self::Net, Self::Pid, Self::Mnt];

    /// Returns the file name under `/proc/<pid>/ns`.
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Uts => "uts",
            Self::Net => "net",
            Self::Pid => "pid",
            Self::Mnt => "mnt",
        }
    }

    /// Returns the `clone(2)`/`setns(2)` flag for this kind.
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Net => CloneFlags::CLONE_NEWNET,
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Mnt => CloneFlags::CLONE_NEWNS,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

/// Returns the clone flags requesting a new namespace of every kind.
#[must_use]
pub fn isolation_flags() -> CloneFlags {
    NamespaceKind::JOIN_ORDER
        .iter()
        .fold(CloneFlags::empty(), |flags, kind| flags | kind.clone_flag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_requests_all_five_namespaces() {
        let flags = isolation_flags();
        for flag in [
            CloneFlags::CLONE_NEWUTS,
            CloneFlags::CLONE_NEWPID,
            CloneFlags::CLONE_NEWNS,
            CloneFlags::CLONE_NEWNET,
            CloneFlags::CLONE_NEWIPC,
        ] {
            assert!(flags.contains(flag));
        }
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
    }

    #[test]
    fn join_order_matches_proc_names() {
        let names: Vec<_> = NamespaceKind::JOIN_ORDER.iter().map(|k| k.proc_name()).collect();
        assert_eq!(names, ["ipc", "uts", "net", "pid", "mnt"]);
    }
}
