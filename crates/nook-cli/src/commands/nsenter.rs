//! `nook nsenter` — Second stage of `exec`, run by the runtime itself.

use clap::Args;
use nook_common::config::NookConfig;
use nook_common::constants::{EXEC_CMD_ENV, EXEC_PID_ENV};
use nook_core::namespace::SetnsJoiner;

/// Target of the namespace entry, passed through the environment.
#[derive(Args, Debug)]
pub struct NsenterArgs {
    /// Host PID whose namespaces are joined.
    #[arg(long, env = EXEC_PID_ENV)]
    pub pid: String,

    /// Command line run with `sh -c`.
    #[arg(long, env = EXEC_CMD_ENV)]
    pub command: String,
}

/// Joins the target's namespaces, runs the command, and exits with its
/// code.
///
/// # Errors
///
/// Returns an error if the command is empty or cannot be spawned.
pub fn execute(args: NsenterArgs, config: &NookConfig) -> anyhow::Result<()> {
    let proc_dir = config.proc_dir(&args.pid);
    let code = nook_runtime::exec::enter_and_run(&proc_dir, &args.command, &SetnsJoiner)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    std::process::exit(code);
}
