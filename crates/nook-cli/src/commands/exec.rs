//! `nook exec` — Execute a command inside a running container.

use clap::Args;
use nook_common::config::NookConfig;
use nook_runtime::engine::Engine;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// Joins the target container's namespaces, runs the command with the
/// terminal attached, and exits with its code.
///
/// # Errors
///
/// Returns an error if the container is unknown or the runtime cannot be
/// re-invoked.
pub fn execute(args: ExecArgs, config: NookConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let code = engine
        .exec(&args.container, &args.command)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    std::process::exit(code);
}
