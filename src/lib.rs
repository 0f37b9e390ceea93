//! # Drover
//!
//! Drover is a source-based package manager and build driver for native
//! (C/C++) libraries. It resolves dependencies by name and version range
//! from a catalog, materializes their source distributions into a local
//! repository, and compiles everything as an incremental, parallel build
//! producing static archives, executables, and a libman index for
//! downstream consumers.
//!
//! ## Core Concepts
//!
//! - **Catalog (`catalog`)**: a durable SQLite index of known packages,
//!   their remotes, and their declared dependencies.
//! - **Repository (`repository`)**: a local directory of extracted
//!   source distributions, guarded by a cross-process write lock.
//! - **Resolver (`solve`)**: turns a set of root dependencies plus the
//!   catalog into a concrete package-version assignment.
//! - **Source distributions (`sdist`, `source`)**: canonical project
//!   layouts (manifest + `src/` + `include/`) that can be packaged,
//!   stored, and built.
//! - **Build (`build`)**: a planner that maps sdists onto a DAG of
//!   compile/archive/link work units, and a parallel executor that runs
//!   them incrementally against a file-deps database.
//! - **Toolchain (`toolchain`)**: pure-data description of how to invoke
//!   a compiler family.
//!
//! The `drover` binary is a thin clap front-end over this library; all
//! behavior lives here so it can be driven programmatically and tested.

pub mod build;
pub mod catalog;
pub mod defaults;
pub mod error;
pub mod ident;
pub mod libman;
pub mod manifest;
pub mod proc;
pub mod repository;
pub mod sdist;
pub mod signal;
pub mod solve;
pub mod source;
pub mod suggestions;
pub mod toolchain;
pub mod version;

pub use error::{Error, Result};

/// Process exit codes used by the CLI.
pub mod exit_codes {
    /// Operation completed successfully.
    pub const SUCCESS: i32 = 0;
    /// A user-correctable error (bad input, failed build, missing package).
    pub const USER_ERROR: i32 = 1;
    /// Cancellation or an unexpected internal failure.
    pub const INTERNAL: i32 = 2;
}
