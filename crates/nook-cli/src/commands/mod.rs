//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod log;
pub mod nsenter;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nook_common::config::NookConfig;
use nook_common::constants::{DEFAULT_ROOT_DIR, DEFAULT_STATE_DIR};

/// nook — minimal daemon-less container runtime.
#[derive(Parser, Debug)]
#[command(name = "nook", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Directory for image archives, base layers, and container layers.
    #[arg(long, global = true, env = "NOOK_ROOT", default_value = DEFAULT_ROOT_DIR)]
    pub root: PathBuf,

    /// Directory for container records and logs.
    #[arg(long, global = true, env = "NOOK_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Cli {
    /// Builds the runtime configuration from the global flags.
    #[must_use]
    pub fn config(&self) -> NookConfig {
        NookConfig::with_dirs(&self.root, &self.state_dir)
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
    /// List containers.
    Ps,
    /// Print a container's captured output.
    Log(log::LogArgs),
    /// Stop running containers.
    Stop(stop::StopArgs),
    /// Remove containers and their layers.
    Rm(rm::RmArgs),
    /// Pack a container's filesystem into a new image.
    Commit(commit::CommitArgs),
    /// Container init stage (internal).
    #[command(hide = true)]
    Init,
    /// Namespace entry stage of `exec` (internal).
    #[command(hide = true)]
    Nsenter(nsenter::NsenterArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();
    match cli.command {
        Command::Run(args) => run::execute(args, config),
        Command::Exec(args) => exec::execute(args, config),
        Command::Ps => ps::execute(config),
        Command::Log(args) => log::execute(args, config),
        Command::Stop(args) => stop::execute(args, config),
        Command::Rm(args) => rm::execute(args, config),
        Command::Commit(args) => commit::execute(args, config),
        Command::Init => init::execute(),
        Command::Nsenter(args) => nsenter::execute(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_dirs_feed_the_config() {
        let cli = Cli::try_parse_from(["nook", "--root", "/tmp/r", "--state-dir", "/tmp/s", "ps"]).unwrap();
        let config = cli.config();
        assert_eq!(config.root_dir, PathBuf::from("/tmp/r"));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/s"));
    }
}
