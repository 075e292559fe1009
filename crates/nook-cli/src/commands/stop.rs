//! `nook stop` — Stop running containers.

use clap::Args;
use nook_common::config::NookConfig;
use nook_runtime::engine::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container names.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if any container cannot be stopped; the remaining
/// names are still attempted.
pub fn execute(args: StopArgs, config: NookConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let mut failed = 0_usize;
    for name in &args.containers {
        match engine.stop(name) {
            Ok(()) => println!("{name}"),
            Err(e) => {
                tracing::error!(name = %name, error = %e, "stop failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} container(s) could not be stopped");
    }
    Ok(())
}
