//! # Source Distributions
//!
//! A source distribution (sdist) is a directory in the canonical
//! layout: the package manifest at the root plus the `src/` and
//! `include/` subtrees. The identity of an sdist is its manifest's
//! package ID.
//!
//! This module creates sdists from project directories and
//! materializes them from catalog remotes (shallow git clone at a
//! pinned ref, with optional manifest synthesis for upstreams that do
//! not carry one).

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::catalog::{PackageInfo, RemoteListing};
use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::proc::run_proc;
use crate::source;

/// An on-disk source distribution and its parsed manifest.
#[derive(Debug, Clone)]
pub struct Sdist {
    pub manifest: PackageManifest,
    pub path: PathBuf,
}

impl Sdist {
    /// Load the sdist rooted at `path`. Fails if the directory has no
    /// manifest.
    pub fn from_directory(path: &Path) -> Result<Sdist> {
        let manifest = PackageManifest::load_from_directory(path)?.ok_or_else(|| {
            Error::InvalidPkgManifest {
                path: path.display().to_string(),
                message: "no package manifest (package.json5/jsonc/json) was found".to_string(),
            }
        })?;
        Ok(Sdist {
            manifest,
            path: path.to_path_buf(),
        })
    }
}

/// Parameters for [`create_sdist`].
#[derive(Debug, Clone)]
pub struct SdistParams {
    pub project_dir: PathBuf,
    pub dest_path: PathBuf,
    /// Replace an existing destination instead of failing.
    pub force: bool,
}

/// Package a project directory into a source distribution at
/// `dest_path`.
///
/// Copies the manifest, any license files, and the recognized source
/// files beneath `src/` and `include/`, preserving the relative
/// layout.
pub fn create_sdist(params: &SdistParams) -> Result<Sdist> {
    let man_path = PackageManifest::find_in_directory(&params.project_dir).ok_or_else(|| {
        Error::InvalidPkgManifest {
            path: params.project_dir.display().to_string(),
            message: "no package manifest (package.json5/jsonc/json) was found".to_string(),
        }
    })?;

    if params.dest_path.exists() {
        if !params.force {
            return Err(Error::SdistExists {
                path: params.dest_path.clone(),
            });
        }
        fs::remove_dir_all(&params.dest_path)?;
    }
    fs::create_dir_all(&params.dest_path)?;

    // The manifest, verbatim under its own file name.
    copy_one(&man_path, &params.project_dir, &params.dest_path)?;

    // License files at the project root.
    for entry in fs::read_dir(&params.project_dir)? {
        let entry = entry?;
        let fname = entry.file_name();
        let fname = fname.to_string_lossy();
        if entry.file_type()?.is_file()
            && (fname.starts_with("LICENSE") || fname.starts_with("COPYING"))
        {
            copy_one(&entry.path(), &params.project_dir, &params.dest_path)?;
        }
    }

    // Recognized source files under the conventional subtrees.
    for sub in ["src", "include"] {
        let root = params.project_dir.join(sub);
        for file in source::collect_sources(&root)? {
            copy_one(&file.path, &params.project_dir, &params.dest_path)?;
        }
    }

    Sdist::from_directory(&params.dest_path)
}

fn copy_one(file: &Path, src_root: &Path, dest_root: &Path) -> Result<()> {
    let rel = file
        .strip_prefix(src_root)
        .expect("source file must live under the project root");
    let dest = dest_root.join(rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(file, &dest)?;
    Ok(())
}

/// Copy an entire directory tree, preserving relative layout.
pub fn copy_tree(src_root: &Path, dest_root: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src_root) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src_root)
            .expect("walked file must live under its root");
        let dest = dest_root.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// An sdist staged in temporary directories. The directories live as
/// long as this value; install the sdist into a repository before
/// dropping it.
pub struct TempSdist {
    _clone_dir: TempDir,
    _sdist_dir: TempDir,
    pub sdist: Sdist,
}

/// Materialize a catalog package into a temporary sdist by fetching
/// its remote.
pub fn get_package_sdist(info: &PackageInfo) -> Result<TempSdist> {
    let RemoteListing::Git {
        url,
        gitref,
        auto_lib,
    } = &info.remote;

    let clone_dir = TempDir::new()?;
    let checkout = clone_dir.path().join("checkout");
    clone_at_ref(url, gitref, &checkout)?;

    if PackageManifest::find_in_directory(&checkout).is_none() {
        let Some(auto) = auto_lib else {
            return Err(Error::InvalidPkgManifest {
                path: url.clone(),
                message: format!(
                    "the remote for '{}' contains no package manifest and the catalog \
                     has no auto-lib info for it",
                    info.ident
                ),
            });
        };
        synthesize_manifest(&checkout, info, &auto.namespace)?;
    }

    let sdist_dir = TempDir::new()?;
    let dest = sdist_dir.path().join(info.ident.to_string());
    let sdist = create_sdist(&SdistParams {
        project_dir: checkout,
        dest_path: dest.clone(),
        force: true,
    })?;

    if sdist.manifest.ident != info.ident {
        return Err(Error::SdistIdentMismatch {
            path: dest,
            expected: info.ident.to_string(),
            actual: sdist.manifest.ident.to_string(),
        });
    }

    Ok(TempSdist {
        _clone_dir: clone_dir,
        _sdist_dir: sdist_dir,
        sdist,
    })
}

/// Shallow-clone `url` at `gitref` into `target_dir`.
fn clone_at_ref(url: &str, gitref: &str, target_dir: &Path) -> Result<()> {
    let mut argv: Vec<String> = ["git", "clone", "--depth=1", "--branch", gitref, url]
        .iter()
        .map(|s| s.to_string())
        .collect();
    argv.push(target_dir.display().to_string());

    log::debug!("Cloning {url} at {gitref}");
    let res = run_proc(&argv)?;
    if !res.okay() {
        return Err(Error::GitFetch {
            action: "clone".to_string(),
            url: url.to_string(),
            gitref: gitref.to_string(),
            message: res.output,
        });
    }
    Ok(())
}

/// Write a minimal `package.jsonc` for a remote with no manifest of
/// its own: the ident comes from the catalog row, the namespace from
/// the auto-lib hint.
fn synthesize_manifest(dir: &Path, info: &PackageInfo, namespace: &str) -> Result<()> {
    let man = serde_json::json!({
        "name": info.ident.name,
        "version": info.ident.version.to_string(),
        "namespace": namespace,
    });
    fs::write(
        dir.join("package.jsonc"),
        serde_json::to_string_pretty(&man).expect("manifest value serializes"),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AutoLib;
    use crate::ident::PackageId;

    fn fixture_project(dir: &Path) {
        fs::create_dir_all(dir.join("src/detail")).unwrap();
        fs::create_dir_all(dir.join("include/widgets")).unwrap();
        fs::write(
            dir.join("package.jsonc"),
            r#"{ "name": "widgets", "version": "1.0.0", "depends": { "gadgets": "^1.0.0" } }"#,
        )
        .unwrap();
        fs::write(dir.join("LICENSE.txt"), "MIT").unwrap();
        fs::write(dir.join("src/widgets.cpp"), "// impl").unwrap();
        fs::write(dir.join("src/detail/inner.cpp"), "// impl").unwrap();
        fs::write(dir.join("include/widgets/widgets.hpp"), "// api").unwrap();
        fs::write(dir.join("src/notes.txt"), "not a source file").unwrap();
    }

    #[test]
    fn test_create_sdist_layout() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fixture_project(&proj);

        let dest = tmp.path().join("widgets.sdist");
        let sdist = create_sdist(&SdistParams {
            project_dir: proj,
            dest_path: dest.clone(),
            force: false,
        })
        .unwrap();

        assert_eq!(sdist.manifest.ident.to_string(), "widgets@1.0.0");
        assert!(dest.join("package.jsonc").is_file());
        assert!(dest.join("LICENSE.txt").is_file());
        assert!(dest.join("src/widgets.cpp").is_file());
        assert!(dest.join("src/detail/inner.cpp").is_file());
        assert!(dest.join("include/widgets/widgets.hpp").is_file());
        // Unrecognized files are not part of a source distribution.
        assert!(!dest.join("src/notes.txt").exists());
    }

    #[test]
    fn test_sdist_manifest_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fixture_project(&proj);

        let original = PackageManifest::load_from_directory(&proj).unwrap().unwrap();
        let sdist = create_sdist(&SdistParams {
            project_dir: proj,
            dest_path: tmp.path().join("out"),
            force: false,
        })
        .unwrap();
        assert_eq!(sdist.manifest, original);
    }

    #[test]
    fn test_create_sdist_exists() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fixture_project(&proj);
        let dest = tmp.path().join("out");

        let params = SdistParams {
            project_dir: proj,
            dest_path: dest,
            force: false,
        };
        create_sdist(&params).unwrap();
        let err = create_sdist(&params).unwrap_err();
        assert_eq!(err.id(), "sdist_exists");

        let forced = SdistParams {
            force: true,
            ..params
        };
        create_sdist(&forced).unwrap();
    }

    #[test]
    fn test_create_sdist_requires_manifest() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("empty");
        fs::create_dir_all(&proj).unwrap();
        let err = create_sdist(&SdistParams {
            project_dir: proj,
            dest_path: tmp.path().join("out"),
            force: false,
        })
        .unwrap_err();
        assert_eq!(err.id(), "invalid_pkg_manifest");
    }

    #[test]
    fn test_synthesize_manifest() {
        let tmp = TempDir::new().unwrap();
        let info = PackageInfo {
            ident: PackageId::parse("bare@0.3.0").unwrap(),
            deps: vec![],
            description: String::new(),
            remote: RemoteListing::Git {
                url: "https://example.com/bare.git".to_string(),
                gitref: "v0.3.0".to_string(),
                auto_lib: Some(AutoLib::parse("acme/bare").unwrap()),
            },
        };
        synthesize_manifest(tmp.path(), &info, "acme").unwrap();

        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.ident, info.ident);
        assert_eq!(man.namespace, "acme");
    }

    #[test]
    fn test_copy_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/c.txt"), "deep").unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();

        let dst = tmp.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/c.txt")).unwrap(), "deep");
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    }
}
