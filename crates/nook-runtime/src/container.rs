//! Run options and process signalling for containers.

use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::Pid;
use nook_common::error::{NookError, Result};
use nook_common::types::{ContainerId, ResourceConfig};

/// Parameters of one `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Attach the workload to the caller's terminal.
    pub interactive: bool,
    /// Return right after launch instead of waiting for the workload.
    pub detach: bool,
    /// Optional `source:target` volume spec.
    pub volume: Option<String>,
    /// Container name; defaults to the generated ID.
    pub name: Option<String>,
    /// Image whose archive provides the base layer.
    pub image: String,
    /// Command line executed as PID 1.
    pub command: Vec<String>,
    /// Resource limits.
    pub resources: ResourceConfig,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
}

impl RunOptions {
    /// Checks that the options describe a runnable container.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for conflicting or missing values.
    pub fn validate(&self) -> Result<()> {
        if self.interactive && self.detach {
            return Err(NookError::Config {
                message: "interactive and detached modes are mutually exclusive".into(),
            });
        }
        if self.command.is_empty() {
            return Err(NookError::Config {
                message: "no command given".into(),
            });
        }
        if self.image.is_empty() {
            return Err(NookError::Config {
                message: "no image given".into(),
            });
        }
        Ok(())
    }

    /// Resolves the container name, falling back to `id`.
    #[must_use]
    pub fn name_or(&self, id: &ContainerId) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.to_string())
    }
}

/// How a `run` invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The container keeps running in the background.
    Detached {
        /// Generated container ID.
        id: ContainerId,
        /// Container name.
        name: String,
        /// Host PID of the init process.
        pid: u32,
    },
    /// The workload exited and the container was torn down.
    Exited {
        /// Exit code of the workload.
        code: i32,
    },
}

/// How long `stop` waits after `SIGTERM` before sending `SIGKILL`.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// How long a process may linger after `SIGKILL`.
const KILL_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stops a recorded PID and waits until it is gone.
///
/// Sends `SIGTERM`, waits up to `grace`, then escalates to `SIGKILL`. The
/// init of a PID namespace has no default signal handlers, so a workload
/// that installs none only ever dies of the escalation. A process that
/// no longer exists counts as stopped.
///
/// # Errors
///
/// Returns an error if the PID is malformed, a signal is refused, or the
/// process survives `SIGKILL`.
pub fn terminate(pid: &str, grace: Duration) -> Result<()> {
    let pid = parse_pid(pid)?;
    if !signal(pid, Signal::SIGTERM)? || wait_gone(pid, grace) {
        tracing::info!(pid = pid.as_raw(), "process stopped");
        return Ok(());
    }

    tracing::warn!(pid = pid.as_raw(), grace = ?grace, "process ignored SIGTERM, sending SIGKILL");
    if !signal(pid, Signal::SIGKILL)? || wait_gone(pid, KILL_TIMEOUT) {
        tracing::info!(pid = pid.as_raw(), "process killed");
        return Ok(());
    }
    Err(NookError::Process {
        message: format!("pid {pid} survived SIGKILL"),
    })
}

fn parse_pid(pid: &str) -> Result<Pid> {
    let raw: i32 = pid.parse().map_err(|_| NookError::Config {
        message: format!("invalid pid in record: {pid:?}"),
    })?;
    if raw <= 0 {
        return Err(NookError::Config {
            message: format!("refusing to signal pid {raw}"),
        });
    }
    Ok(Pid::from_raw(raw))
}

/// Delivers `sig`; returns `false` if the process no longer exists.
fn signal(pid: Pid, sig: Signal) -> Result<bool> {
    match kill(pid, sig) {
        Ok(()) => {
            tracing::debug!(pid = pid.as_raw(), signal = %sig, "signal sent");
            Ok(true)
        }
        Err(Errno::ESRCH) => {
            tracing::debug!(pid = pid.as_raw(), "process already gone");
            Ok(false)
        }
        Err(e) => Err(NookError::kernel(format!("kill {pid}"), e)),
    }
}

/// Polls until `pid` is gone or `timeout` elapses.
fn wait_gone(pid: Pid, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if is_gone(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// A zombie still answers `kill(pid, 0)`, so children of this process are
/// reaped first; for anyone else's child `waitpid` fails with `ECHILD`.
fn is_gone(pid: Pid) -> bool {
    let _ = waitpid(pid, Some(WaitPidFlag::WNOHANG));
    matches!(kill(pid, None), Err(Errno::ESRCH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RunOptions {
        RunOptions {
            interactive: true,
            image: "busybox".into(),
            command: vec!["/bin/echo".into(), "hi".into()],
            ..RunOptions::default()
        }
    }

    #[test]
    fn interactive_and_detached_conflict() {
        let opts = RunOptions {
            detach: true,
            ..options()
        };
        assert!(opts.validate().is_err());
        assert!(options().validate().is_ok());
    }

    #[test]
    fn empty_command_is_rejected() {
        let opts = RunOptions {
            command: Vec::new(),
            ..options()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn name_defaults_to_id() {
        let id = ContainerId::new("a1b2c3d4e5");
        assert_eq!(options().name_or(&id), "a1b2c3d4e5");
        let named = RunOptions {
            name: Some("web".into()),
            ..options()
        };
        assert_eq!(named.name_or(&id), "web");
    }

    #[test]
    fn terminate_rejects_bad_pids() {
        for pid in ["abc", "0", "-1"] {
            assert!(terminate(pid, Duration::ZERO).is_err(), "{pid} accepted");
        }
    }

    #[test]
    fn terminate_escalates_when_sigterm_is_ignored() {
        let mut child = std::process::Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .expect("spawn");
        let pid = child.id().to_string();
        // Let the shell install the trap before it is signalled.
        std::thread::sleep(Duration::from_millis(200));

        terminate(&pid, Duration::from_millis(200)).expect("terminate");

        assert!(is_gone(parse_pid(&pid).unwrap()));
        assert!(child.wait().is_err(), "reaped by terminate");
    }
}
