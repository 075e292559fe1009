//! Filesystem layer archives.
//!
//! A base layer is the extracted content of an image archive. Archives may
//! be plain or gzip-compressed tar files; compression is detected from the
//! content rather than the file name.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use nook_common::error::{NookError, Result};

/// Leading bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Summary of an extracted or packed layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Size of the archive in bytes.
    pub size_bytes: u64,
    /// Whether the archive was gzip-compressed.
    pub compressed: bool,
}

/// Extracts a tar archive into `target`, creating `target` if needed.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<Layer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target).map_err(|e| NookError::io(target, e))?;

    let size_bytes = std::fs::metadata(archive_path)
        .map_err(|e| NookError::io(archive_path, e))?
        .len();
    let compressed = is_gzip_archive(archive_path)?;
    let file = File::open(archive_path).map_err(|e| NookError::io(archive_path, e))?;
    let reader = BufReader::new(file);

    let unpacked = if compressed {
        tar::Archive::new(GzDecoder::new(reader)).unpack(target)
    } else {
        tar::Archive::new(reader).unpack(target)
    };
    unpacked.map_err(|e| NookError::io(target, e))?;

    tracing::info!(size = size_bytes, compressed, "layer extracted");
    Ok(Layer {
        size_bytes,
        compressed,
    })
}

/// Packs the contents of `source` into a gzip-compressed tar archive at
/// `archive_path`. Entries are stored relative to `source`.
///
/// The archive is written beside its destination and renamed into place,
/// so a failed pack never leaves a truncated image behind.
///
/// # Errors
///
/// Returns an error if `source` cannot be read or the archive written.
pub fn pack_layer(source: &Path, archive_path: &Path) -> Result<Layer> {
    tracing::info!(
        source = %source.display(),
        archive = %archive_path.display(),
        "packing layer"
    );

    let staging = archive_path.with_extension("tar.partial");
    let file = File::create(&staging).map_err(|e| NookError::io(&staging, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source)
        .map_err(|e| NookError::io(source, e))?;
    let encoder = builder.into_inner().map_err(|e| NookError::io(&staging, e))?;
    let _ = encoder.finish().map_err(|e| NookError::io(&staging, e))?;

    std::fs::rename(&staging, archive_path).map_err(|e| NookError::io(archive_path, e))?;
    let size_bytes = std::fs::metadata(archive_path)
        .map_err(|e| NookError::io(archive_path, e))?
        .len();
    Ok(Layer {
        size_bytes,
        compressed: true,
    })
}

/// Determines whether the archive starts with the gzip magic bytes.
fn is_gzip_archive(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| NookError::io(path, e))?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(NookError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_file<W: std::io::Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data)
            .expect("failed to append data");
    }

    fn create_test_tar(dir: &Path) -> std::path::PathBuf {
        let tar_path = dir.join("busybox.tar");
        let file = File::create(&tar_path).expect("failed to create tar file");
        let mut builder = tar::Builder::new(file);
        append_file(&mut builder, "bin/hello.txt", b"hello from layer");
        builder.finish().expect("failed to finish tar");
        tar_path
    }

    fn create_test_tar_gz(dir: &Path) -> std::path::PathBuf {
        // Deliberately named `.tar`: compression is detected from content.
        let path = dir.join("gzipped.tar");
        let file = File::create(&path).expect("failed to create tar.gz");
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        append_file(&mut builder, "gzhello.txt", b"hello from gzipped layer");
        let encoder = builder.into_inner().expect("failed to finish encoder");
        let _ = encoder.finish().expect("failed to finish gzip");
        path
    }

    #[test]
    fn extract_plain_tar_creates_expected_files() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let tar_path = create_test_tar(dir.path());
        let target = dir.path().join("busybox");

        let layer = extract_layer(&tar_path, &target).expect("extract failed");
        assert!(!layer.compressed);
        let content = std::fs::read_to_string(target.join("bin/hello.txt")).expect("read failed");
        assert_eq!(content, "hello from layer");
    }

    #[test]
    fn extract_detects_gzip_by_content() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = create_test_tar_gz(dir.path());
        let target = dir.path().join("extracted_gz");

        let layer = extract_layer(&path, &target).expect("extract failed");
        assert!(layer.compressed);
        let content = std::fs::read_to_string(target.join("gzhello.txt")).expect("read failed");
        assert_eq!(content, "hello from gzipped layer");
    }

    #[test]
    fn extract_nonexistent_archive_returns_error() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let result = extract_layer(&dir.path().join("missing.tar"), &dir.path().join("out"));
        assert!(result.is_err());
    }

    #[test]
    fn packed_directory_extracts_to_same_content() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let source = dir.path().join("merged");
        std::fs::create_dir_all(source.join("etc")).expect("mkdir");
        std::fs::write(source.join("etc/motd"), "committed").expect("write");

        let archive = dir.path().join("snapshot.tar");
        let packed = pack_layer(&source, &archive).expect("pack failed");
        assert!(packed.compressed);
        assert!(!dir.path().join("snapshot.tar.partial").exists());

        let restored = dir.path().join("snapshot");
        let _ = extract_layer(&archive, &restored).expect("extract failed");
        let content = std::fs::read_to_string(restored.join("etc/motd")).expect("read");
        assert_eq!(content, "committed");
    }
}
