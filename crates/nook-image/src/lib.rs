//! # nook-image
//!
//! Image archives and base layers for the nook runtime.
//!
//! Handles:
//! - **Layers**: extracting a (optionally gzip-compressed) tar archive into
//!   a base-layer directory, and packing a directory back into an archive.
//! - **Storage**: the on-disk layout of `<root>/<image>.tar` archives and
//!   their `<root>/<image>/` base layers, with idempotent materialization.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod layer;
pub mod storage;
