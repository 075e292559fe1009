//! `nook commit` — Pack a container's filesystem into a new image.

use clap::Args;
use nook_common::config::NookConfig;
use nook_runtime::engine::Engine;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub container: String,

    /// Name of the new image.
    pub image: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or packing fails.
pub fn execute(args: CommitArgs, config: NookConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let archive = engine
        .commit(&args.container, &args.image)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", archive.display());
    Ok(())
}
