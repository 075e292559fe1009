//! `nook ps` — List containers.

use nook_common::config::NookConfig;
use nook_runtime::engine::Engine;

use crate::output;

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the state directory cannot be read.
pub fn execute(config: NookConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let records = engine.list().map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{}", output::container_table(&records));
    Ok(())
}
