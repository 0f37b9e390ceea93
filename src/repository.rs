//! # Local Source-Distribution Repository
//!
//! The repository is a directory holding one extracted source
//! distribution per `name@version` subdirectory, shared by every build
//! on the machine. Mutation happens under a cross-process advisory
//! file lock on a sentinel file; readers take no lock and tolerate
//! concurrent writers because installs are staged in a temporary
//! sibling directory and renamed into place atomically.
//!
//! Invariant (holds across process crashes): a `name@version`
//! directory either contains a complete sdist whose manifest ident
//! matches the directory name, or it does not exist.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::ident::{Dependency, PackageId};
use crate::sdist::{copy_tree, Sdist};
use crate::solve;

const LOCK_FILE_NAME: &str = ".drover-repo.lock";

/// How [`Repository::add_sdist`] treats an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    /// Fail with `sdist_exists`.
    Fail,
    /// Stage the replacement, then remove the old entry and rename the
    /// new one into place.
    Replace,
    /// Keep the existing entry and do nothing.
    Ignore,
}

/// Flags controlling repository acquisition.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepoFlags {
    /// Create the repository directory if it does not exist.
    pub create_if_absent: bool,
    /// Take the cross-process write lock; required for mutation.
    pub write_lock: bool,
}

impl RepoFlags {
    /// Read-only access, no lock.
    pub fn read() -> Self {
        RepoFlags::default()
    }

    /// Exclusive write access.
    pub fn write() -> Self {
        RepoFlags {
            write_lock: true,
            ..Default::default()
        }
    }

    pub fn create_if_absent(mut self) -> Self {
        self.create_if_absent = true;
        self
    }
}

/// An open repository scope. Obtain one via [`with_repository`].
pub struct Repository {
    root: PathBuf,
    writable: bool,
    // Held for the scope; the advisory lock releases when the file
    // closes, on every exit path.
    _lock: Option<File>,
}

/// Open the repository at `path` for the duration of `f`.
///
/// Under `write_lock` an advisory lock on a sentinel file inside the
/// repository is held for the whole scope and released on all exit
/// paths (the lock is dropped with the `Repository`).
pub fn with_repository<T>(
    path: &Path,
    flags: RepoFlags,
    f: impl FnOnce(&mut Repository) -> Result<T>,
) -> Result<T> {
    if !path.is_dir() {
        if flags.create_if_absent {
            fs::create_dir_all(path)?;
        } else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("repository directory {} does not exist", path.display()),
            )));
        }
    }

    let lock = if flags.write_lock {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path.join(LOCK_FILE_NAME))?;
        lock_file.lock_exclusive()?;
        Some(lock_file)
    } else {
        None
    };

    let mut repo = Repository {
        root: path.to_path_buf(),
        writable: flags.write_lock,
        _lock: lock,
    };
    f(&mut repo)
}

impl Repository {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate the valid sdists in the repository: subdirectories
    /// whose names parse as a package ID and whose manifest agrees.
    /// Anything else (the lock sentinel, staging leftovers, entries
    /// mid-install) is skipped.
    pub fn iter_sdists(&self) -> Result<Vec<Sdist>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dirname = entry.file_name();
            let Ok(expected) = PackageId::parse(&dirname.to_string_lossy()) else {
                continue;
            };
            match Sdist::from_directory(&entry.path()) {
                Ok(sd) if sd.manifest.ident == expected => out.push(sd),
                Ok(sd) => log::warn!(
                    "Ignoring repository entry {} whose manifest declares '{}'",
                    entry.path().display(),
                    sd.manifest.ident
                ),
                Err(e) => log::warn!(
                    "Ignoring unreadable repository entry {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }
        out.sort_by(|a, b| a.manifest.ident.cmp(&b.manifest.ident));
        Ok(out)
    }

    /// Look up a single package's sdist.
    pub fn find(&self, pk_id: &PackageId) -> Result<Option<Sdist>> {
        let dir = self.root.join(pk_id.to_string());
        if !dir.is_dir() {
            return Ok(None);
        }
        let sd = Sdist::from_directory(&dir)?;
        if sd.manifest.ident != *pk_id {
            return Err(Error::SdistIdentMismatch {
                path: dir,
                expected: pk_id.to_string(),
                actual: sd.manifest.ident.to_string(),
            });
        }
        Ok(Some(sd))
    }

    /// Install an sdist into the repository.
    ///
    /// The content is first copied into a temporary sibling directory
    /// inside the repository, then renamed into place, so a crash can
    /// never leave a half-populated `name@version` entry.
    pub fn add_sdist(&mut self, sd: &Sdist, if_exists: IfExists) -> Result<()> {
        if !self.writable {
            return Err(Error::RepoNotWritable {
                path: self.root.clone(),
            });
        }

        let ident = sd.manifest.ident.clone();
        let dest = self.root.join(ident.to_string());
        if dest.exists() {
            match if_exists {
                IfExists::Fail => {
                    return Err(Error::SdistExists { path: dest });
                }
                IfExists::Ignore => {
                    log::info!("Ignoring already-present package {ident}");
                    return Ok(());
                }
                IfExists::Replace => {}
            }
        }

        let staging = tempfile::tempdir_in(&self.root)?;
        let staged = staging.path().join("sdist");
        copy_tree(&sd.path, &staged)?;

        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        fs::rename(&staged, &dest)?;
        log::info!("Installed package {ident}");
        Ok(())
    }

    /// Resolve `deps` against `catalog`. Delegates to [`solve`];
    /// present for callers already holding a repository scope.
    pub fn solve(&self, deps: &[Dependency], catalog: &Catalog) -> Result<Vec<PackageId>> {
        solve::solve(deps, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdist::{create_sdist, SdistParams};
    use tempfile::TempDir;

    fn fixture_sdist(tmp: &TempDir, name: &str, version: &str) -> Sdist {
        let proj = tmp.path().join(format!("{name}-{version}-proj"));
        fs::create_dir_all(proj.join("src")).unwrap();
        fs::write(
            proj.join("package.jsonc"),
            format!(r#"{{ "name": "{name}", "version": "{version}" }}"#),
        )
        .unwrap();
        fs::write(proj.join("src").join(format!("{name}.cpp")), "// lib").unwrap();
        create_sdist(&SdistParams {
            project_dir: proj,
            dest_path: tmp.path().join(format!("{name}@{version}.sdist")),
            force: false,
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_list_empty() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let count = with_repository(&repo_dir, RepoFlags::read().create_if_absent(), |repo| {
            Ok(repo.iter_sdists()?.len())
        })
        .unwrap();
        assert_eq!(count, 0);
        assert!(repo_dir.is_dir());
    }

    #[test]
    fn test_open_missing_without_create_fails() {
        let tmp = TempDir::new().unwrap();
        let res = with_repository(&tmp.path().join("nope"), RepoFlags::read(), |_| Ok(()));
        assert!(res.is_err());
    }

    #[test]
    fn test_add_find_iter() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let sd = fixture_sdist(&tmp, "widgets", "1.0.0");

        with_repository(
            &repo_dir,
            RepoFlags::write().create_if_absent(),
            |repo| repo.add_sdist(&sd, IfExists::Fail),
        )
        .unwrap();

        with_repository(&repo_dir, RepoFlags::read(), |repo| {
            let found = repo
                .find(&PackageId::parse("widgets@1.0.0").unwrap())?
                .unwrap();
            assert_eq!(found.manifest.ident.to_string(), "widgets@1.0.0");
            assert!(found.path.join("src/widgets.cpp").is_file());

            let all = repo.iter_sdists()?;
            assert_eq!(all.len(), 1);
            assert!(repo
                .find(&PackageId::parse("widgets@2.0.0").unwrap())?
                .is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_add_existing_fail_ignore_replace() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let sd = fixture_sdist(&tmp, "w", "1.0.0");

        with_repository(&repo_dir, RepoFlags::write().create_if_absent(), |repo| {
            repo.add_sdist(&sd, IfExists::Fail)?;

            let err = repo.add_sdist(&sd, IfExists::Fail).unwrap_err();
            assert_eq!(err.id(), "sdist_exists");

            repo.add_sdist(&sd, IfExists::Ignore)?;
            repo.add_sdist(&sd, IfExists::Replace)?;
            assert_eq!(repo.iter_sdists()?.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_mutation_requires_write_lock() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let sd = fixture_sdist(&tmp, "w", "1.0.0");

        fs::create_dir_all(&repo_dir).unwrap();
        let err = with_repository(&repo_dir, RepoFlags::read(), |repo| {
            repo.add_sdist(&sd, IfExists::Fail)
        })
        .unwrap_err();
        assert_eq!(err.id(), "repo_not_writable");
    }

    #[test]
    fn test_lock_released_after_scope() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");

        // An error return must still release the lock.
        let res: Result<()> = with_repository(
            &repo_dir,
            RepoFlags::write().create_if_absent(),
            |_| Err(Error::UserCancelled),
        );
        assert!(res.is_err());

        // A second write acquisition succeeds immediately.
        with_repository(&repo_dir, RepoFlags::write(), |_| Ok(())).unwrap();
    }

    #[test]
    fn test_iter_skips_foreign_entries() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        fs::create_dir_all(repo_dir.join("not-a-package-id")).unwrap();
        fs::create_dir_all(repo_dir.join("mismatch@1.0.0")).unwrap();

        with_repository(&repo_dir, RepoFlags::read(), |repo| {
            assert!(repo.iter_sdists()?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
