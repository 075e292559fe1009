//! Root filesystem switching via `pivot_root(2)`.
//!
//! Unlike `chroot`, this changes the root mount of the namespace so the old
//! root can be detached entirely.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nook_common::error::{NookError, Result};

/// Directory inside the new root that temporarily holds the old root.
const PUT_OLD: &str = ".pivot_root";

/// Makes `new_root` the root of the calling mount namespace and detaches
/// the previous root.
///
/// `new_root` is bind-mounted onto itself first because `pivot_root(2)`
/// requires the new root to be a mount point.
///
/// # Errors
///
/// Returns an error if any mount, `pivot_root(2)`, or cleanup step fails.
pub fn pivot_root(new_root: &Path) -> Result<()> {
    tracing::debug!(new_root = %new_root.display(), "performing pivot_root");

    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| NookError::kernel(format!("bind {} onto itself", new_root.display()), e))?;

    let put_old = new_root.join(PUT_OLD);
    std::fs::create_dir_all(&put_old).map_err(|e| NookError::io(&put_old, e))?;

    nix::unistd::pivot_root(new_root, &put_old).map_err(|e| NookError::kernel("pivot_root", e))?;
    nix::unistd::chdir("/").map_err(|e| NookError::kernel("chdir /", e))?;

    let old_root = Path::new("/").join(PUT_OLD);
    umount2(&old_root, MntFlags::MNT_DETACH)
        .map_err(|e| NookError::kernel("detach old root", e))?;
    std::fs::remove_dir(&old_root).map_err(|e| NookError::io(&old_root, e))?;
    Ok(())
}
