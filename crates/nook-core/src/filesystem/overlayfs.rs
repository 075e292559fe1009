//! `OverlayFS` union of a writable layer over a read-only base layer.

use std::path::PathBuf;

use nix::mount::{MsFlags, mount};
use nook_common::error::{NookError, Result};

/// Directories composing one union mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionLayers {
    /// Read-only base layer, shared between containers of one image.
    pub lower_dir: PathBuf,
    /// Writable upper directory inside the container's write layer.
    pub upper_dir: PathBuf,
    /// Scratch directory required by `OverlayFS`, on the upper's filesystem.
    pub work_dir: PathBuf,
    /// Merged mount point.
    pub merged_dir: PathBuf,
}

impl UnionLayers {
    /// Returns the `OverlayFS` mount data string.
    #[must_use]
    pub fn mount_options(&self) -> String {
        format!(
            "lowerdir={},upperdir={},workdir={}",
            self.lower_dir.display(),
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// Mounts an `OverlayFS` at `layers.merged_dir`. All directories must exist.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
pub fn mount_overlay(layers: &UnionLayers) -> Result<()> {
    let opts = layers.mount_options();
    mount(
        Some("overlay"),
        &layers.merged_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| NookError::kernel(format!("overlay mount at {}", layers.merged_dir.display()), e))?;

    tracing::info!(merged = %layers.merged_dir.display(), "overlayfs mounted");
    Ok(())
}
