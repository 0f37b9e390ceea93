//! Where drover keeps its machine-wide state when no flag or
//! environment variable says otherwise.
//!
//! The catalog is small and durable, so it goes in the roaming data
//! directory; the repository is a rebuildable cache of extracted
//! sources and goes in the local (non-roaming) one. Both fall back to
//! a `.drover` directory under the current directory on platforms
//! where no base directory can be determined.

use std::path::PathBuf;

fn state_path(platform_dir: Option<PathBuf>, leaf: &str) -> PathBuf {
    match platform_dir {
        Some(base) => base.join("drover").join(leaf),
        None => PathBuf::from(".drover").join(leaf),
    }
}

/// Default catalog database location. Overridden by `--catalog` or
/// `DROVER_CATALOG`.
pub fn default_catalog_path() -> PathBuf {
    state_path(dirs::data_dir(), "catalog.db")
}

/// Default repository directory for extracted source distributions.
/// Overridden by `--repo-dir` or `DROVER_REPO_DIR`.
pub fn default_repo_dir() -> PathBuf {
    state_path(dirs::data_local_dir(), "repo")
}
