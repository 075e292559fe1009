//! `nook run` — Create and start a container.

use clap::Args;
use nook_common::config::NookConfig;
use nook_common::types::ResourceConfig;
use nook_runtime::container::{RunOptions, RunOutcome};
use nook_runtime::engine::Engine;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach the container to this terminal.
    #[arg(long = "ti", conflicts_with = "detach")]
    pub interactive: bool,

    /// Run in the background.
    #[arg(short = 'd', long = "d")]
    pub detach: bool,

    /// Bind a host directory, as `SOURCE:TARGET`.
    #[arg(short = 'v', long)]
    pub volume: Option<String>,

    /// Container name (defaults to the generated ID).
    #[arg(long)]
    pub name: Option<String>,

    /// Memory limit, written to `memory.limit_in_bytes`.
    #[arg(short = 'm', long)]
    pub memory: Option<String>,

    /// Relative CPU weight, written to `cpu.shares`.
    #[arg(long)]
    pub cpushare: Option<String>,

    /// Allowed CPUs, written to `cpuset.cpus`.
    #[arg(long)]
    pub cpuset: Option<String>,

    /// Extra environment entries, as `KEY=VALUE`.
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Image to run.
    pub image: String,

    /// Command executed as the container's PID 1.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        Self {
            interactive: args.interactive,
            detach: args.detach,
            volume: args.volume,
            name: args.name,
            image: args.image,
            command: args.command,
            resources: ResourceConfig {
                memory_limit: args.memory,
                cpu_share: args.cpushare,
                cpu_set: args.cpuset,
            },
            env: args.env,
        }
    }
}

/// Executes the `run` command.
///
/// In the foreground, SIGINT is left to the workload; this process waits,
/// tears the container down, and exits with the workload's code.
///
/// # Errors
///
/// Returns an error if the container cannot be set up.
pub fn execute(args: RunArgs, config: NookConfig) -> anyhow::Result<()> {
    let opts = RunOptions::from(args);
    if !opts.detach {
        ctrlc::set_handler(|| tracing::debug!("SIGINT left to the container"))
            .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;
    }

    let engine = Engine::new(config);
    match engine.run(&opts).map_err(|e| anyhow::anyhow!("{e}"))? {
        RunOutcome::Detached { name, .. } => {
            println!("{name}");
            Ok(())
        }
        RunOutcome::Exited { code } => std::process::exit(code),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn parse(args: &[&str]) -> Result<RunOptions, clap::Error> {
        let cli = Cli::try_parse_from(std::iter::once("nook").chain(args.iter().copied()))?;
        match cli.command {
            Command::Run(run) => Ok(run.into()),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn detached_run_with_volume_and_limits() {
        let opts = parse(&[
            "run", "--d", "-v", "/host/data:/data", "--name", "web", "-m", "100m", "--cpushare", "512", "-e",
            "A=1", "-e", "B=2", "nginx", "/bin/sleep", "100",
        ])
        .unwrap();
        assert!(opts.detach && !opts.interactive);
        assert_eq!(opts.volume.as_deref(), Some("/host/data:/data"));
        assert_eq!(opts.name.as_deref(), Some("web"));
        assert_eq!(opts.resources.memory_limit.as_deref(), Some("100m"));
        assert_eq!(opts.resources.cpu_share.as_deref(), Some("512"));
        assert_eq!(opts.env, vec!["A=1", "B=2"]);
        assert_eq!(opts.image, "nginx");
        assert_eq!(opts.command, vec!["/bin/sleep", "100"]);
    }

    #[test]
    fn trailing_command_keeps_its_flags() {
        let opts = parse(&["run", "--ti", "busybox", "/bin/ls", "-l", "/"]).unwrap();
        assert!(opts.interactive);
        assert_eq!(opts.command, vec!["/bin/ls", "-l", "/"]);
    }

    #[test]
    fn interactive_conflicts_with_detach() {
        assert!(parse(&["run", "--ti", "--d", "busybox", "sh"]).is_err());
    }

    #[test]
    fn command_is_required() {
        assert!(parse(&["run", "busybox"]).is_err());
    }
}
