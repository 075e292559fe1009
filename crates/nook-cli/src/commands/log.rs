//! `nook log` — Print a container's captured output.

use clap::Args;
use nook_common::config::NookConfig;
use nook_runtime::engine::Engine;

/// Arguments for the `log` command.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `log` command.
///
/// Interactive containers have no log, which prints nothing.
///
/// # Errors
///
/// Returns an error if the container is unknown or its log is unreadable.
pub fn execute(args: LogArgs, config: NookConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let logs = engine.logs(&args.container).map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{logs}");
    Ok(())
}
