//! `nook rm` — Remove containers and their layers.

use clap::Args;
use nook_common::config::NookConfig;
use nook_runtime::engine::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container names.
    #[arg(required = true)]
    pub containers: Vec<String>,

    /// Stop running containers before removing them.
    #[arg(short, long)]
    pub force: bool,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if any container cannot be removed; the remaining
/// names are still attempted.
pub fn execute(args: RmArgs, config: NookConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let mut failed = 0_usize;
    for name in &args.containers {
        match engine.remove(name, args.force) {
            Ok(()) => println!("{name}"),
            Err(e) => {
                tracing::error!(name = %name, error = %e, "remove failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} container(s) could not be removed");
    }
    Ok(())
}
