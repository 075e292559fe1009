//! Mount utilities for container filesystem setup.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nook_common::error::{NookError, Result};

/// Creates a bind mount from `source` to `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| NookError::kernel(format!("bind mount {} -> {}", source.display(), target.display()), e))?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        "bind mount created"
    );
    Ok(())
}

/// Lazily detaches the filesystem mounted at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
pub fn unmount(target: &Path) -> Result<()> {
    umount2(target, MntFlags::MNT_DETACH)
        .map_err(|e| NookError::kernel(format!("unmount {}", target.display()), e))?;
    tracing::debug!(target = %target.display(), "unmounted");
    Ok(())
}

/// Marks every mount in the current namespace private so that mounts made
/// by the container never propagate back to the host.
///
/// # Errors
///
/// Returns an error if the remount fails.
pub fn make_mounts_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| NookError::kernel("make / private", e))
}

/// Mounts `/proc` and a `tmpfs` `/dev` inside the (already pivoted) root.
///
/// # Errors
///
/// Returns an error if a mount point cannot be created or a mount fails.
pub fn mount_essential_filesystems() -> Result<()> {
    for dir in ["/proc", "/dev"] {
        std::fs::create_dir_all(dir).map_err(|e| NookError::io(dir, e))?;
    }
    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| NookError::kernel("mount /proc", e))?;
    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755"),
    )
    .map_err(|e| NookError::kernel("mount /dev", e))?;
    tracing::debug!("essential filesystems mounted");
    Ok(())
}
