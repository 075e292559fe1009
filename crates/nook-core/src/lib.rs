//! # nook-core
//!
//! Low-level Linux isolation primitives for the nook runtime.
//!
//! This crate provides safe abstractions over:
//! - **Cgroups v1**: an ordered chain of `memory`, `cpu`, and `cpuset`
//!   subsystems located through the mount table.
//! - **Namespaces**: the five isolated kinds and best-effort `setns(2)`
//!   joining of a running process's namespaces.
//! - **Filesystem**: `OverlayFS` unions, bind mounts, and `pivot_root`.
//!
//! Kernel-touching operations sit behind small traits ([`cgroup::Subsystem`],
//! [`filesystem::MountOps`], [`namespace::NamespaceJoiner`]) so callers can
//! substitute fakes in tests.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
