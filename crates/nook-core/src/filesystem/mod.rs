//! Filesystem primitives for container roots.
//!
//! Provides the `OverlayFS` union mount, bind mounts, `pivot_root`, and the
//! [`MountOps`] seam through which the layered workspace drives them.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;

use std::path::Path;

use nook_common::error::Result;

pub use overlayfs::UnionLayers;

/// Mount operations used to build and retire a container workspace.
pub trait MountOps {
    /// Mounts the union of a write layer over a base layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_union(&self, layers: &UnionLayers) -> Result<()>;

    /// Bind-mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;

    /// Unmounts whatever is mounted at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// [`MountOps`] backed by `mount(2)` and `umount2(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelMounts;

impl MountOps for KernelMounts {
    fn mount_union(&self, layers: &UnionLayers) -> Result<()> {
        overlayfs::mount_overlay(layers)
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        mount::bind_mount(source, target)
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        mount::unmount(target)
    }
}
