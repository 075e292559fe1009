//! Runtime engine that orchestrates container lifecycle.
//!
//! `run` proceeds in a fixed order: build the workspace, clone the init
//! process, configure cgroups and attach its PID, persist the record, and
//! only then hand the command over the pipe. The workload therefore never
//! runs outside its cgroups or without a record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nook_common::config::NookConfig;
use nook_common::error::{NookError, Result};
use nook_common::types::{ContainerId, ContainerStatus, ResourceConfig};
use nook_core::cgroup::{CgroupManager, Hierarchy, Subsystem, default_subsystems};
use nook_core::filesystem::MountOps;

use crate::container::{self, RunOptions, RunOutcome, STOP_GRACE};
use crate::process::{CloneLauncher, LaunchRequest, Launcher};
use crate::state::{ContainerRecord, Registry};
use crate::workspace::WorkspaceManager;

/// Coordinates the workspace, launcher, cgroups, and registry.
#[derive(Debug)]
pub struct Engine {
    config: NookConfig,
    registry: Registry,
    workspace: WorkspaceManager,
    launcher: Box<dyn Launcher>,
    subsystems: Arc<[Box<dyn Subsystem>]>,
    stop_grace: Duration,
}

impl Engine {
    /// Creates an engine that performs real mounts, clones real init
    /// processes, and writes the cgroup hierarchies from the mount table.
    #[must_use]
    pub fn new(config: NookConfig) -> Self {
        let subsystems = default_subsystems(&Hierarchy::new(&config.mountinfo)).into();
        Self {
            registry: Registry::new(&config.state_dir),
            workspace: WorkspaceManager::new(&config),
            launcher: Box::new(CloneLauncher),
            subsystems,
            stop_grace: STOP_GRACE,
            config,
        }
    }

    /// Replaces the mount implementation used for workspaces.
    #[must_use]
    pub fn with_mounts(mut self, mounts: Box<dyn MountOps>) -> Self {
        self.workspace = WorkspaceManager::with_mounts(&self.config, mounts);
        self
    }

    /// Replaces the init process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replaces the cgroup subsystem chain.
    #[must_use]
    pub fn with_subsystems(mut self, subsystems: Vec<Box<dyn Subsystem>>) -> Self {
        self.subsystems = subsystems.into();
        self
    }

    /// Sets how long `stop` waits for `SIGTERM` before `SIGKILL`.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Returns the container registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the workspace manager.
    #[must_use]
    pub const fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    fn cgroup(&self, name: &str, resources: ResourceConfig) -> CgroupManager {
        CgroupManager::new(self.config.cgroup_path(name), resources, Arc::clone(&self.subsystems))
    }

    /// Runs a container.
    ///
    /// Detached runs return once the command is handed over. Attached runs
    /// wait for the workload, then mark it exited, destroy its cgroups,
    /// delete its workspace, and finally remove its record.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, the name is taken, or
    /// any setup step fails. A workspace built before the failure is left
    /// in place. If the workspace cannot be deleted after an attached run,
    /// the record is kept so `rm` can retry.
    pub fn run(&self, opts: &RunOptions) -> Result<RunOutcome> {
        opts.validate()?;
        let id = ContainerId::generate();
        let name = opts.name_or(&id);
        self.registry.ensure_available(&name)?;

        let root = self.workspace.build(&opts.image, &name, opts.volume.as_deref())?;
        let request = LaunchRequest {
            interactive: opts.interactive,
            root,
            log_file: (!opts.interactive).then(|| self.registry.log_path(&name)),
            env: opts.env.clone(),
        };
        let (child, pipe) = self.launcher.launch(&request)?;
        let pid = child.pid();

        let cgroup = self.cgroup(&name, opts.resources.clone());
        let _ = cgroup.set();
        let _ = cgroup.apply(pid);

        let record = ContainerRecord::running(id.clone(), &name, pid, &opts.command, opts.volume.as_deref());
        if let Err(e) = self.registry.create(&record) {
            // Closing the pipe unblocks init with an empty command.
            drop(pipe);
            if let Err(wait) = child.wait() {
                tracing::warn!(pid, error = %wait, "failed to reap init process");
            }
            let _ = cgroup.destroy();
            return Err(e);
        }
        pipe.send(&opts.command)?;
        tracing::info!(name = %name, id = %id, pid, "container started");

        if opts.detach {
            return Ok(RunOutcome::Detached { id, name, pid });
        }

        let waited = child.wait();
        match &waited {
            Ok(code) => tracing::info!(name = %name, code, "container exited"),
            Err(e) => tracing::warn!(name = %name, pid, error = %e, "lost track of init process"),
        }
        if let Err(e) = self.registry.update_status(&name, ContainerStatus::Exited) {
            tracing::warn!(name = %name, error = %e, "failed to record exit");
        }
        let _ = cgroup.destroy();
        self.workspace.delete(&name, opts.volume.as_deref())?;
        self.registry.remove(&name)?;
        Ok(RunOutcome::Exited { code: waited? })
    }

    /// Lists every recorded container.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.registry.list()
    }

    /// Returns the captured output of a container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown container, or an error if the log
    /// exists but cannot be read.
    pub fn logs(&self, name: &str) -> Result<String> {
        let _ = self.registry.lookup(name)?;
        crate::logs::read_log(&self.registry.log_path(name))
    }

    /// Stops a container and marks it stopped.
    ///
    /// Sends `SIGTERM`, escalates to `SIGKILL` after the grace period, and
    /// returns only once the process is gone.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown container, or an error if the
    /// process cannot be signalled or outlives `SIGKILL`, or the record
    /// update fails.
    pub fn stop(&self, name: &str) -> Result<()> {
        let record = self.registry.lookup(name)?;
        container::terminate(&record.pid, self.stop_grace)?;
        let _ = self.registry.update_status(name, ContainerStatus::Stopped)?;
        tracing::info!(name, "container stopped");
        Ok(())
    }

    /// Removes a container: cgroups, workspace, and record.
    ///
    /// A running container is refused unless `force` is set, in which case
    /// it is stopped first and teardown starts only once it is gone.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown container, a configuration error
    /// for a running one without `force`, or an error if the workspace
    /// cannot be torn down. The record is kept when teardown fails.
    pub fn remove(&self, name: &str, force: bool) -> Result<()> {
        let record = self.registry.lookup(name)?;
        if record.status == ContainerStatus::Running {
            if !force {
                return Err(NookError::Config {
                    message: format!("container {name} is running; stop it first or use -f"),
                });
            }
            self.stop(name)?;
        }

        let _ = self.cgroup(name, ResourceConfig::default()).destroy();
        self.workspace.delete(name, record.volume_spec())?;
        self.registry.remove(name)?;
        tracing::info!(name, "container removed");
        Ok(())
    }

    /// Packs a container's merged view into `<root>/<image>.tar`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown container or missing mount point,
    /// or an error if packing fails.
    pub fn commit(&self, name: &str, image: &str) -> Result<PathBuf> {
        let _ = self.registry.lookup(name)?;
        let merged = self.workspace.mount_point(name);
        if !merged.is_dir() {
            return Err(NookError::NotFound {
                kind: "mount point",
                id: merged.display().to_string(),
            });
        }
        let store = self.workspace.store();
        let layer = store.commit(&merged, image)?;
        let archive = store.archive_path(image)?;
        tracing::info!(name, image, size = layer.size_bytes, archive = %archive.display(), "container committed");
        Ok(archive)
    }

    /// Runs a command inside a running container and returns its exit
    /// code.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown container, or an error if the
    /// runtime cannot be re-invoked.
    pub fn exec(&self, name: &str, command: &[String]) -> Result<i32> {
        crate::exec::exec_in_container(&self.config, &self.registry, name, command)
    }
}
