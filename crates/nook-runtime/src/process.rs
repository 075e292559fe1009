//! Namespace-isolated process launch and the init stage.
//!
//! The launcher clones the runtime's own executable (`/proc/self/exe init`)
//! into fresh UTS, PID, mount, network, and IPC namespaces. The child
//! receives the read end of a pipe on fd 3 and blocks on it until the
//! parent has attached cgroups and written the command line. It then
//! pivots into the merged view and replaces itself with the workload as
//! PID 1 of the new namespace.

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use nook_common::constants::{HANDOFF_FD, SELF_EXE};
use nook_common::error::{NookError, Result};
use nook_core::filesystem::{mount, pivot_root};
use nook_core::namespace;

/// Stack handed to the cloned child before it execs.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Argument selecting the init role of the runtime binary.
pub const INIT_ROLE: &str = "init";

/// Everything the launcher needs to start one container.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Connect the child's standard streams to the caller's terminal.
    pub interactive: bool,
    /// Merged mount point, used as the child's working directory.
    pub root: PathBuf,
    /// Log file receiving stdout when not interactive.
    pub log_file: Option<PathBuf>,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
}

/// A launched init process as seen by the engine.
pub trait InitProcess: fmt::Debug {
    /// Host PID of the init process.
    fn pid(&self) -> u32;

    /// Blocks until the init process exits and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited for.
    fn wait(&self) -> Result<i32>;
}

/// The parent's side of the command handoff.
pub trait Handoff: fmt::Debug {
    /// Delivers the command line and releases the blocked init process.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be delivered.
    fn send(self: Box<Self>, command: &[String]) -> Result<()>;
}

/// Starts init processes. Dropping the returned handoff without sending
/// must release the child with an empty command.
pub trait Launcher: fmt::Debug + Send + Sync {
    /// Starts the init process described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    fn launch(&self, request: &LaunchRequest) -> Result<(Box<dyn InitProcess>, Box<dyn Handoff>)>;
}

/// Launches through `clone(2)` and `/proc/self/exe init`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneLauncher;

impl Launcher for CloneLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<(Box<dyn InitProcess>, Box<dyn Handoff>)> {
        let (child, pipe) = launch(request)?;
        Ok((Box::new(child), Box::new(pipe)))
    }
}

/// Handle to a cloned init process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerProcess {
    pid: Pid,
}

impl InitProcess for ContainerProcess {
    fn pid(&self) -> u32 {
        self.pid.as_raw().unsigned_abs()
    }

    /// A process killed by a signal reports `128 + signal`.
    fn wait(&self) -> Result<i32> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => return Err(NookError::kernel(format!("waitpid {}", self.pid), e)),
            }
        }
    }
}

/// Write end of the command handoff pipe.
#[derive(Debug)]
pub struct HandoffPipe {
    write: OwnedFd,
}

impl Handoff for HandoffPipe {
    /// Writes the command line and closes the pipe.
    fn send(self: Box<Self>, command: &[String]) -> Result<()> {
        let mut pipe = File::from(self.write);
        pipe.write_all(command.join(" ").as_bytes())
            .map_err(|e| NookError::Process {
                message: format!("command handoff failed: {e}"),
            })
    }
}

/// Starts the init process for a container.
///
/// Returns the child handle and the write end of its handoff pipe. The
/// child does nothing until the pipe is sent or dropped.
///
/// # Errors
///
/// Returns an error if the pipe or log file cannot be created, an argument
/// contains a NUL byte, or `clone(2)` fails. No child is left running.
pub fn launch(request: &LaunchRequest) -> Result<(ContainerProcess, HandoffPipe)> {
    let (read, write) =
        nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| NookError::kernel("pipe2", e))?;

    let log = match (&request.log_file, request.interactive) {
        (Some(path), false) => Some(crate::logs::open_log(path)?),
        _ => None,
    };

    let exe = c_string(SELF_EXE.as_bytes())?;
    let argv = [exe.clone(), c_string(INIT_ROLE.as_bytes())?];
    let envp = environment(&request.env)?;
    let root = c_string(request.root.as_os_str().as_bytes())?;

    let argv_ptrs = null_terminated(&argv);
    let envp_ptrs = null_terminated(&envp);
    let read_fd = read.as_raw_fd();
    let log_fd = log.as_ref().map(AsRawFd::as_raw_fd);

    // Only raw syscalls run between clone and execve in the child.
    let child = Box::new(move || -> isize {
        // SAFETY: every pointer refers to memory owned by the enclosing
        // frame, which stays alive in the child's copy of the address space.
        unsafe {
            if let Some(fd) = log_fd {
                if libc::dup2(fd, libc::STDOUT_FILENO) < 0 {
                    libc::_exit(126);
                }
            }
            let handoff = if read_fd == HANDOFF_FD {
                libc::fcntl(read_fd, libc::F_SETFD, 0)
            } else {
                libc::dup2(read_fd, HANDOFF_FD)
            };
            if handoff < 0 || libc::chdir(root.as_ptr()) < 0 {
                libc::_exit(126);
            }
            let _ = libc::execve(exe.as_ptr(), argv_ptrs.as_ptr(), envp_ptrs.as_ptr());
            libc::_exit(127)
        }
    });

    let mut stack = vec![0_u8; CHILD_STACK_SIZE];
    // SAFETY: the child does not return into Rust code; it either execs or
    // exits, so no state shared with the parent is touched after the clone.
    let pid = unsafe {
        nix::sched::clone(
            child,
            &mut stack,
            namespace::isolation_flags(),
            Some(libc::SIGCHLD),
        )
    }
    .map_err(|e| NookError::kernel("clone with new namespaces", e))?;

    drop(read);
    drop(log);
    tracing::info!(pid = pid.as_raw(), root = %request.root.display(), interactive = request.interactive, "init process launched");
    Ok((ContainerProcess { pid }, HandoffPipe { write }))
}

/// Runs the init stage inside the new namespaces.
///
/// Reads the command from fd 3, pivots into the working directory, mounts
/// `/proc` and `/dev`, and execs the command. Returns only on failure.
///
/// # Errors
///
/// Returns an error if no command arrives, the root switch fails, or the
/// command cannot be resolved or executed.
pub fn run_init() -> Result<Infallible> {
    let command = read_handoff()?;
    let args: Vec<&str> = command.split_whitespace().collect();
    let Some(program) = args.first() else {
        return Err(NookError::Process {
            message: "no command received on handoff pipe".into(),
        });
    };
    tracing::debug!(command = %command, "init received command");

    let cwd = std::env::current_dir().map_err(|e| NookError::io(".", e))?;
    enter_root(&cwd)?;

    let resolved = which::which(program).map_err(|e| {
        tracing::error!(program, error = %e, "command lookup failed");
        NookError::NotFound {
            kind: "executable",
            id: (*program).to_string(),
        }
    })?;
    let path = c_string(resolved.as_os_str().as_bytes())?;
    let argv = args
        .iter()
        .map(|a| c_string(a.as_bytes()))
        .collect::<Result<Vec<_>>>()?;
    let envp = environment(&[])?;

    nix::unistd::execve(&path, &argv, &envp)
        .map_err(|e| NookError::kernel(format!("execve {}", resolved.display()), e))
}

fn read_handoff() -> Result<String> {
    // SAFETY: fd 3 is installed by the launcher and nothing else in this
    // process owns it.
    let mut pipe = unsafe { File::from_raw_fd(HANDOFF_FD) };
    let mut command = String::new();
    let _ = pipe
        .read_to_string(&mut command)
        .map_err(|e| NookError::Process {
            message: format!("reading handoff pipe: {e}"),
        })?;
    Ok(command)
}

fn enter_root(root: &Path) -> Result<()> {
    mount::make_mounts_private()?;
    pivot_root::pivot_root(root)?;
    mount::mount_essential_filesystems()
}

/// The current environment followed by `extra` entries.
fn environment(extra: &[String]) -> Result<Vec<CString>> {
    let mut entries = Vec::new();
    for (key, value) in std::env::vars_os() {
        let mut entry: OsString = key;
        entry.push("=");
        entry.push(value);
        entries.push(c_string(&entry.into_vec())?);
    }
    for entry in extra {
        if !entry.contains('=') {
            return Err(NookError::Config {
                message: format!("environment entry must be KEY=VALUE: {entry:?}"),
            });
        }
        entries.push(c_string(entry.as_bytes())?);
    }
    Ok(entries)
}

fn c_string(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|e| NookError::Config {
        message: format!("argument contains a NUL byte: {e}"),
    })
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_environment_is_appended() {
        let env = environment(&["APP_MODE=test".into()]).expect("env");
        assert_eq!(env.last().unwrap().to_str().unwrap(), "APP_MODE=test");
    }

    #[test]
    fn environment_entry_without_equals_is_rejected() {
        let err = environment(&["BROKEN".into()]).expect_err("no '='");
        assert!(err.to_string().contains("KEY=VALUE"));
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(c_string(b"a\0b").is_err());
    }

    #[test]
    fn pointer_list_is_null_terminated() {
        let strings = [CString::new("a").unwrap(), CString::new("b").unwrap()];
        let ptrs = null_terminated(&strings);
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
    }

    #[test]
    fn handoff_pipe_delivers_joined_command() {
        let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC).expect("pipe");
        Box::new(HandoffPipe { write })
            .send(&["/bin/echo".into(), "hi".into()])
            .expect("send");
        let mut received = String::new();
        let _ = File::from(read).read_to_string(&mut received).expect("read");
        assert_eq!(received, "/bin/echo hi");
    }
}
