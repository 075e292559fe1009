//! Running commands inside an already-running container.
//!
//! `nook exec` re-invokes the runtime as `/proc/self/exe nsenter` with the
//! target PID and command carried in `NOOK_EXEC_PID` / `NOOK_EXEC_CMD`,
//! plus the environment of the container's init process. The `nsenter`
//! role joins the target's namespaces and runs the command through `sh`.

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus};

use nook_common::config::NookConfig;
use nook_common::constants::{EXEC_CMD_ENV, EXEC_PID_ENV, SELF_EXE};
use nook_common::error::{NookError, Result};
use nook_core::namespace::{NamespaceJoiner, join_all};

use crate::state::Registry;

/// Argument selecting the nsenter role of the runtime binary.
pub const NSENTER_ROLE: &str = "nsenter";

/// Reads `<proc_dir>/environ` as `(key, value)` pairs.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_environ(proc_dir: &Path) -> Result<Vec<(String, String)>> {
    let path = proc_dir.join("environ");
    let raw = std::fs::read(&path).map_err(|e| NookError::io(&path, e))?;
    Ok(parse_environ(&raw))
}

fn parse_environ(raw: &[u8]) -> Vec<(String, String)> {
    raw.split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

/// Runs `command` inside the namespaces of the container `name` and
/// returns its exit code.
///
/// # Errors
///
/// Returns `NotFound` for an unknown container, or an error if the
/// container's environment cannot be read or the runtime cannot be
/// re-invoked.
pub fn exec_in_container(config: &NookConfig, registry: &Registry, name: &str, command: &[String]) -> Result<i32> {
    if command.is_empty() {
        return Err(NookError::Config {
            message: "exec command is empty".into(),
        });
    }
    let record = registry.lookup(name)?;
    let environ = read_environ(&config.proc_dir(&record.pid))?;
    let joined = command.join(" ");
    tracing::info!(name, pid = %record.pid, cmd = %joined, "exec into container");

    let status = nsenter_command(&record.pid, &joined, environ)
        .status()
        .map_err(|e| NookError::io(SELF_EXE, e))?;
    Ok(exit_code(status))
}

/// Builds the `nsenter` re-invocation. The target's environment goes in
/// first so its own `NOOK_EXEC_*` entries cannot override the markers.
fn nsenter_command(pid: &str, command: &str, environ: Vec<(String, String)>) -> Command {
    let mut nsenter = Command::new(SELF_EXE);
    let _ = nsenter
        .arg(NSENTER_ROLE)
        .envs(environ)
        .env(EXEC_PID_ENV, pid)
        .env(EXEC_CMD_ENV, command);
    nsenter
}

/// Joins the namespaces of the process at `proc_dir` and runs `command`
/// with `sh -c`, returning its exit code.
///
/// Namespaces that cannot be joined are logged and skipped; the command
/// runs regardless.
///
/// # Errors
///
/// Returns an error if the command is empty or the shell cannot be
/// spawned.
pub fn enter_and_run(proc_dir: &Path, command: &str, joiner: &dyn NamespaceJoiner) -> Result<i32> {
    if command.trim().is_empty() {
        return Err(NookError::Config {
            message: "nsenter command is empty".into(),
        });
    }
    let report = join_all(proc_dir, joiner);
    tracing::debug!(joined = report.joined.len(), failed = report.failed.len(), "namespaces entered");

    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .map_err(|e| NookError::io("sh", e))?;
    Ok(exit_code(status))
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_is_split_on_nul() {
        let raw = b"PATH=/bin:/usr/bin\0HOME=/root\0\0EMPTY=\0garbage\0";
        assert_eq!(
            parse_environ(raw),
            vec![
                ("PATH".into(), "/bin:/usr/bin".into()),
                ("HOME".into(), "/root".into()),
                ("EMPTY".into(), String::new()),
            ]
        );
    }

    #[test]
    fn value_may_contain_equals() {
        assert_eq!(
            parse_environ(b"OPTS=a=b\0"),
            vec![("OPTS".into(), "a=b".into())]
        );
    }

    #[test]
    fn exec_markers_win_over_inherited_environment() {
        let environ = vec![
            ("PATH".to_string(), "/bin".to_string()),
            (EXEC_PID_ENV.to_string(), "1".to_string()),
            (EXEC_CMD_ENV.to_string(), "reboot".to_string()),
        ];
        let nsenter = nsenter_command("4242", "ls -l", environ);

        let envs: std::collections::HashMap<_, _> = nsenter
            .get_envs()
            .map(|(k, v)| (k.to_os_string(), v.map(std::ffi::OsStr::to_os_string)))
            .collect();
        assert_eq!(envs[std::ffi::OsStr::new(EXEC_PID_ENV)], Some("4242".into()));
        assert_eq!(envs[std::ffi::OsStr::new(EXEC_CMD_ENV)], Some("ls -l".into()));
        assert_eq!(envs[std::ffi::OsStr::new("PATH")], Some("/bin".into()));
        assert_eq!(nsenter.get_args().collect::<Vec<_>>(), vec![NSENTER_ROLE]);
    }

    #[test]
    fn read_environ_of_missing_process_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_environ(&dir.path().join("99999")).is_err());
    }

    #[test]
    fn exec_of_unknown_container_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = NookConfig::with_dirs(dir.path().join("root"), dir.path().join("state"));
        let registry = Registry::new(&config.state_dir);
        let err = exec_in_container(&config, &registry, "ghost", &["ls".into()]).expect_err("unknown");
        assert!(err.is_not_found());
    }
}
