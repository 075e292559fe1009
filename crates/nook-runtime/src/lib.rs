//! Container lifecycle for the nook runtime: layered workspaces, the
//! namespaced launcher and init stage, the registry, and exec.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod engine;
pub mod exec;
pub mod logs;
pub mod process;
pub mod state;
pub mod workspace;
