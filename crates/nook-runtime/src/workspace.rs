//! Layered filesystem lifecycle for container roots.
//!
//! Each container gets a write layer under `<root>/writeLayer/<name>` and a
//! merged view at `<root>/mnt/<name>`. The base layer `<root>/<image>` is
//! shared between containers of one image and is never removed here.

use std::path::{Component, Path, PathBuf};

use nook_common::config::NookConfig;
use nook_common::constants::{MOUNT_DIR, WRITE_LAYER_DIR};
use nook_common::error::{NookError, Result};
use nook_core::filesystem::{KernelMounts, MountOps, UnionLayers};
use nook_image::storage::ImageStore;

/// Upper directory inside a write layer.
const UPPER_DIR: &str = "diff";
/// `OverlayFS` scratch directory inside a write layer.
const WORK_DIR: &str = "work";

/// Host directory bound into the merged view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    /// Directory on the host.
    pub source: PathBuf,
    /// Path inside the container.
    pub target: PathBuf,
}

impl VolumeBinding {
    /// Parses a `source:target` volume spec.
    ///
    /// Returns `None` unless the spec has exactly two non-empty segments
    /// and the target stays inside the container (no `..` components).
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split(':');
        let (Some(source), Some(target), None) = (parts.next(), parts.next(), parts.next()) else {
            return None;
        };
        if source.is_empty() || target.is_empty() {
            return None;
        }
        if Path::new(target).components().any(|c| c == Component::ParentDir) {
            return None;
        }
        Some(Self {
            source: PathBuf::from(source),
            target: PathBuf::from(target),
        })
    }

    /// Location of the target under a merged mount point.
    #[must_use]
    pub fn target_in(&self, merged: &Path) -> PathBuf {
        merged.join(self.target.strip_prefix("/").unwrap_or(&self.target))
    }
}

/// Builds and retires per-container root filesystems.
pub struct WorkspaceManager {
    root: PathBuf,
    store: ImageStore,
    mounts: Box<dyn MountOps>,
}

impl std::fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("root", &self.root)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl WorkspaceManager {
    /// Creates a manager that performs real kernel mounts.
    #[must_use]
    pub fn new(config: &NookConfig) -> Self {
        Self::with_mounts(config, Box::new(KernelMounts))
    }

    /// Creates a manager over the given mount implementation.
    #[must_use]
    pub fn with_mounts(config: &NookConfig, mounts: Box<dyn MountOps>) -> Self {
        Self {
            root: config.root_dir.clone(),
            store: ImageStore::new(&config.root_dir),
            mounts,
        }
    }

    /// Returns the image store backing base layers.
    #[must_use]
    pub const fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Write-layer directory of a container.
    #[must_use]
    pub fn write_layer_path(&self, name: &str) -> PathBuf {
        self.root.join(WRITE_LAYER_DIR).join(name)
    }

    /// Merged mount point of a container.
    #[must_use]
    pub fn mount_point(&self, name: &str) -> PathBuf {
        self.root.join(MOUNT_DIR).join(name)
    }

    fn layers(&self, image: &str, name: &str) -> Result<UnionLayers> {
        let write_layer = self.write_layer_path(name);
        Ok(UnionLayers {
            lower_dir: self.store.base_layer_path(image)?,
            upper_dir: write_layer.join(UPPER_DIR),
            work_dir: write_layer.join(WORK_DIR),
            merged_dir: self.mount_point(name),
        })
    }

    /// Builds the root filesystem for `name` and returns its merged path.
    ///
    /// A malformed volume spec is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the base layer cannot be materialized, a
    /// directory cannot be created, or a mount fails. Directories created
    /// before the failure are left in place.
    pub fn build(&self, image: &str, name: &str, volume: Option<&str>) -> Result<PathBuf> {
        let _ = self.store.materialize(image)?;

        let layers = self.layers(image, name)?;
        for dir in [&layers.upper_dir, &layers.work_dir, &layers.merged_dir] {
            std::fs::create_dir_all(dir).map_err(|e| NookError::io(dir, e))?;
        }
        self.mounts.mount_union(&layers)?;

        if let Some(spec) = volume.filter(|s| !s.is_empty()) {
            match VolumeBinding::parse(spec) {
                Some(binding) => self.mount_volume(&layers.merged_dir, &binding)?,
                None => tracing::warn!(name, volume = spec, "malformed volume spec, starting without it"),
            }
        }

        tracing::info!(name, image, merged = %layers.merged_dir.display(), "workspace built");
        Ok(layers.merged_dir)
    }

    fn mount_volume(&self, merged: &Path, binding: &VolumeBinding) -> Result<()> {
        let target = binding.target_in(merged);
        for dir in [&binding.source, &target] {
            std::fs::create_dir_all(dir).map_err(|e| NookError::io(dir, e))?;
        }
        self.mounts.bind_mount(&binding.source, &target)?;
        tracing::info!(
            source = %binding.source.display(),
            target = %target.display(),
            "volume mounted"
        );
        Ok(())
    }

    /// Tears down the root filesystem of `name`.
    ///
    /// Unmounts the volume target (if the spec is well formed), then the
    /// merged view, removes the mount point, and removes the write layer
    /// last. The base layer is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if an unmount or removal fails; the write layer is
    /// kept when an unmount fails.
    pub fn delete(&self, name: &str, volume: Option<&str>) -> Result<()> {
        let merged = self.mount_point(name);
        if merged.exists() {
            if let Some(binding) = volume.and_then(VolumeBinding::parse) {
                self.mounts.unmount(&binding.target_in(&merged))?;
            }
            self.mounts.unmount(&merged)?;
            std::fs::remove_dir_all(&merged).map_err(|e| NookError::io(&merged, e))?;
        } else {
            tracing::debug!(name, "mount point already gone");
        }

        let write_layer = self.write_layer_path(name);
        match std::fs::remove_dir_all(&write_layer) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(NookError::io(&write_layer, e)),
        }
        tracing::info!(name, "workspace deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_two_segments() {
        assert_eq!(
            VolumeBinding::parse("/host/data:/data"),
            Some(VolumeBinding {
                source: "/host/data".into(),
                target: "/data".into(),
            })
        );
    }

    #[test]
    fn parse_rejects_malformed_specs() {
        for spec in ["badspec", "", ":/data", "/host:", "/a:/b:/c", ":", "/h:../../etc", "/h:/data/../..", "/h:.."] {
            assert_eq!(VolumeBinding::parse(spec), None, "{spec:?} accepted");
        }
    }

    #[test]
    fn target_is_resolved_inside_merged_view() {
        let binding = VolumeBinding::parse("/host/data:/data").unwrap();
        assert_eq!(
            binding.target_in(Path::new("/var/lib/nook/mnt/web")),
            PathBuf::from("/var/lib/nook/mnt/web/data")
        );
        let relative = VolumeBinding::parse("/host/data:srv/data").unwrap();
        assert_eq!(
            relative.target_in(Path::new("/m")),
            PathBuf::from("/m/srv/data")
        );
    }

    #[test]
    fn layer_paths_follow_root_layout() {
        let config = NookConfig::with_dirs("/var/lib/nook", "/var/run/nook");
        let manager = WorkspaceManager::new(&config);
        assert_eq!(
            manager.write_layer_path("c1"),
            PathBuf::from("/var/lib/nook/writeLayer/c1")
        );
        assert_eq!(manager.mount_point("c1"), PathBuf::from("/var/lib/nook/mnt/c1"));
        let layers = manager.layers("busybox", "c1").unwrap();
        assert_eq!(layers.lower_dir, PathBuf::from("/var/lib/nook/busybox"));
        assert_eq!(layers.upper_dir, PathBuf::from("/var/lib/nook/writeLayer/c1/diff"));
    }
}
