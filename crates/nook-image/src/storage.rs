//! Local storage of image archives and base layers.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<image>.tar   image archive (plain or gzip tar)
//! <root>/<image>/      base layer, extracted once and shared read-only
//! ```

use std::path::{Path, PathBuf};

use nook_common::constants::IMAGE_ARCHIVE_EXTENSION;
use nook_common::error::{NookError, Result};

use crate::layer::{self, Layer};

/// Result of ensuring a base layer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// The archive was extracted into a new base layer.
    Extracted(Layer),
    /// The base layer already existed and was reused as is.
    Reused,
}

/// Manages image archives and their base layers.
#[derive(Debug, Clone)]
pub struct ImageStore {
    /// Root directory for archives and base layers.
    root: PathBuf,
}

impl ImageStore {
    /// Opens the store at the given root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the archive path for an image name.
    ///
    /// # Errors
    ///
    /// Returns an error if the image name is not a single path component.
    pub fn archive_path(&self, image: &str) -> Result<PathBuf> {
        validate_image_name(image)?;
        Ok(self.root.join(format!("{image}.{IMAGE_ARCHIVE_EXTENSION}")))
    }

    /// Returns the base-layer directory for an image name.
    ///
    /// # Errors
    ///
    /// Returns an error if the image name is not a single path component.
    pub fn base_layer_path(&self, image: &str) -> Result<PathBuf> {
        validate_image_name(image)?;
        Ok(self.root.join(image))
    }

    /// Ensures the base layer for `image` exists, extracting its archive
    /// only when the directory is absent.
    ///
    /// A failed extraction removes the half-written directory so the next
    /// attempt extracts again instead of reusing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is missing or extraction fails.
    pub fn materialize(&self, image: &str) -> Result<Materialized> {
        let base = self.base_layer_path(image)?;
        if base.is_dir() {
            tracing::debug!(image, path = %base.display(), "reusing base layer");
            return Ok(Materialized::Reused);
        }

        let archive = self.archive_path(image)?;
        if !archive.is_file() {
            return Err(NookError::NotFound {
                kind: "image archive",
                id: archive.display().to_string(),
            });
        }

        match layer::extract_layer(&archive, &base) {
            Ok(layer) => Ok(Materialized::Extracted(layer)),
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&base) {
                    tracing::warn!(path = %base.display(), error = %cleanup, "failed to clean partial base layer");
                }
                Err(e)
            }
        }
    }

    /// Packs `source` into a new image archive named `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or packing fails.
    pub fn commit(&self, source: &Path, image: &str) -> Result<Layer> {
        let archive = self.archive_path(image)?;
        std::fs::create_dir_all(&self.root).map_err(|e| NookError::io(&self.root, e))?;
        layer::pack_layer(source, &archive)
    }
}

/// Rejects image names that would escape the root or collide with the
/// per-container directories.
fn validate_image_name(image: &str) -> Result<()> {
    let reserved = [
        nook_common::constants::WRITE_LAYER_DIR,
        nook_common::constants::MOUNT_DIR,
    ];
    if image.is_empty() || image == "." || image == ".." || image.contains('/') || reserved.contains(&image) {
        return Err(NookError::Config {
            message: format!("invalid image name: {image:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_archive(root: &Path, image: &str) {
        std::fs::create_dir_all(root).expect("mkdir root");
        let file = std::fs::File::create(root.join(format!("{image}.tar"))).expect("create");
        let mut builder = tar::Builder::new(file);
        let data = b"#!/bin/sh\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "bin/sh", &data[..])
            .expect("append");
        builder.finish().expect("finish");
    }

    #[test]
    fn layout_paths_are_keyed_by_image() {
        let store = ImageStore::new("/var/lib/nook");
        assert_eq!(
            store.archive_path("busybox").unwrap(),
            PathBuf::from("/var/lib/nook/busybox.tar")
        );
        assert_eq!(
            store.base_layer_path("busybox").unwrap(),
            PathBuf::from("/var/lib/nook/busybox")
        );
    }

    #[test]
    fn invalid_image_names_are_rejected() {
        let store = ImageStore::new("/var/lib/nook");
        for name in ["", "..", "a/b", "mnt", "writeLayer"] {
            assert!(store.base_layer_path(name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn materialize_extracts_only_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_archive(dir.path(), "busybox");
        let store = ImageStore::new(dir.path());

        let first = store.materialize("busybox").expect("first");
        assert!(matches!(first, Materialized::Extracted(_)));
        assert!(dir.path().join("busybox/bin/sh").is_file());

        std::fs::write(dir.path().join("busybox/marker"), "kept").expect("marker");
        let second = store.materialize("busybox").expect("second");
        assert_eq!(second, Materialized::Reused);
        assert!(dir.path().join("busybox/marker").exists());
    }

    #[test]
    fn materialize_missing_archive_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path());
        let err = store.materialize("nginx").expect_err("no archive");
        assert!(err.is_not_found());
        assert!(!dir.path().join("nginx").exists());
    }

    #[test]
    fn corrupt_archive_leaves_no_base_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.tar"), vec![0x1f, 0x8b, 0, 1, 2, 3]).expect("write");
        let store = ImageStore::new(dir.path());
        assert!(store.materialize("broken").is_err());
        assert!(!dir.path().join("broken").exists());
    }

    #[test]
    fn commit_writes_archive_under_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let merged = dir.path().join("mnt/c1");
        std::fs::create_dir_all(&merged).expect("mkdir");
        std::fs::write(merged.join("app.conf"), "x=1").expect("write");
        let store = ImageStore::new(dir.path());

        let _ = store.commit(&merged, "snapshot").expect("commit");
        assert!(dir.path().join("snapshot.tar").is_file());
        assert!(matches!(
            store.materialize("snapshot").expect("materialize"),
            Materialized::Extracted(_)
        ));
        assert!(dir.path().join("snapshot/app.conf").is_file());
    }
}
