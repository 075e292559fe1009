//! Joining the namespaces of a running process.

use std::fs::File;
use std::path::Path;

use nook_common::error::{NookError, Result};

use super::NamespaceKind;

/// Joins the calling process to a namespace given its open file.
pub trait NamespaceJoiner {
    /// Joins the namespace referenced by `ns_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refuses the join.
    fn join(&self, kind: NamespaceKind, ns_file: &File) -> Result<()>;
}

/// Joins namespaces with `setns(2)`.
///
/// Joining a mount namespace requires a single-threaded caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetnsJoiner;

impl NamespaceJoiner for SetnsJoiner {
    fn join(&self, kind: NamespaceKind, ns_file: &File) -> Result<()> {
        nix::sched::setns(ns_file, kind.clone_flag())
            .map_err(|e| NookError::kernel(format!("setns {kind}"), e))
    }
}

/// Outcome of a best-effort join pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Namespaces successfully joined, in join order.
    pub joined: Vec<NamespaceKind>,
    /// Namespaces whose file could not be opened or joined.
    pub failed: Vec<NamespaceKind>,
}

/// Joins every namespace of the process at `proc_dir` (`/proc/<pid>`) in
/// [`NamespaceKind::JOIN_ORDER`].
///
/// A kind that cannot be opened or joined is logged and skipped; the pass
/// always continues with the remaining kinds.
pub fn join_all(proc_dir: &Path, joiner: &dyn NamespaceJoiner) -> JoinReport {
    let mut report = JoinReport::default();
    for kind in NamespaceKind::JOIN_ORDER {
        let ns_path = proc_dir.join("ns").join(kind.proc_name());
        let outcome = File::open(&ns_path)
            .map_err(|e| NookError::io(&ns_path, e))
            .and_then(|file| joiner.join(kind, &file));
        match outcome {
            Ok(()) => {
                tracing::debug!(namespace = %kind, "joined namespace");
                report.joined.push(kind);
            }
            Err(e) => {
                tracing::warn!(namespace = %kind, error = %e, "namespace join failed, continuing");
                report.failed.push(kind);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        joined: RefCell<Vec<NamespaceKind>>,
        refuse: Option<NamespaceKind>,
    }

    impl NamespaceJoiner for Recorder {
        fn join(&self, kind: NamespaceKind, _ns_file: &File) -> Result<()> {
            if self.refuse == Some(kind) {
                return Err(NookError::Config {
                    message: "refused".into(),
                });
            }
            self.joined.borrow_mut().push(kind);
            Ok(())
        }
    }

    fn fake_proc_dir(skip: Option<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("ns")).expect("mkdir ns");
        for name in ["ipc", "uts", "net", "pid", "mnt"] {
            if Some(name) != skip {
                std::fs::write(dir.path().join("ns").join(name), "").expect("ns file");
            }
        }
        dir
    }

    #[test]
    fn missing_namespace_file_is_skipped() {
        let proc_dir = fake_proc_dir(Some("net"));
        let joiner = Recorder::default();
        let report = join_all(proc_dir.path(), &joiner);

        assert_eq!(report.failed, vec![NamespaceKind::Net]);
        assert_eq!(
            *joiner.joined.borrow(),
            vec![
                NamespaceKind::Ipc,
                NamespaceKind::Uts,
                NamespaceKind::Pid,
                NamespaceKind::Mnt
            ]
        );
    }

    #[test]
    fn refused_join_continues_with_remaining_kinds() {
        let proc_dir = fake_proc_dir(None);
        let joiner = Recorder {
            refuse: Some(NamespaceKind::Ipc),
            ..Recorder::default()
        };
        let report = join_all(proc_dir.path(), &joiner);

        assert_eq!(report.failed, vec![NamespaceKind::Ipc]);
        assert_eq!(report.joined.len(), 4);
    }
}
