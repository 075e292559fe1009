//! `nook init` — Container init stage, run by the runtime itself.

/// Waits for the command on the handoff pipe and execs it.
///
/// # Errors
///
/// Returns an error if no command arrives or it cannot be executed; on
/// success this never returns.
pub fn execute() -> anyhow::Result<()> {
    match nook_runtime::process::run_init() {
        Ok(never) => match never {},
        Err(e) => Err(anyhow::anyhow!("init failed: {e}")),
    }
}
