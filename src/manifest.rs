//! # Package Manifests
//!
//! A package manifest describes a single package: its identity, the
//! namespace its libraries live in, its dependencies, and (optionally)
//! which test driver its test executables should link against.
//!
//! Manifests are written as JSON5 (`package.json5`), JSONC
//! (`package.jsonc`), or plain JSON (`package.json`). A legacy
//! line-oriented `package.dds` key-value form is still accepted with a
//! deprecation warning. Parsing is a manual walk over the decoded
//! value so that unknown keys can be rejected with a "did you mean"
//! hint rather than a generic deserializer error.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::ident::{Dependency, PackageId};
use crate::suggestions::{did_you_mean, sentence_suffix};
use crate::version::{parse_version, VersionRange};

/// How test executables obtain their `main()` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDriver {
    /// Drover provides a canned Catch `main()`; tests only contain
    /// test cases.
    CatchMain,
    /// Tests provide their own `main()`.
    Catch,
}

impl TestDriver {
    const NAMES: [&'static str; 2] = ["Catch-Main", "Catch"];

    fn parse(s: &str) -> Result<TestDriver> {
        match s {
            "Catch-Main" => Ok(TestDriver::CatchMain),
            "Catch" => Ok(TestDriver::Catch),
            other => {
                let hint = did_you_mean(other, Self::NAMES).unwrap_or_default();
                Err(Error::UnknownTestDriver {
                    driver: other.to_string(),
                    hint,
                })
            }
        }
    }
}

/// An in-memory package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    /// The package's identity.
    pub ident: PackageId,
    /// The namespace under which the package's libraries are consumed
    /// (`namespace/name` in libman terms). Defaults to the package name.
    pub namespace: String,
    /// Declared dependencies.
    pub dependencies: Vec<Dependency>,
    /// Selected test driver, if any.
    pub test_driver: Option<TestDriver>,
}

const MANIFEST_KEYS: [&str; 5] = ["name", "namespace", "version", "depends", "test_driver"];

impl PackageManifest {
    /// Load a manifest from a JSON5/JSONC/JSON file.
    pub fn load_from_file(fpath: &Path) -> Result<PackageManifest> {
        let content = fs::read_to_string(fpath)?;
        let bad = |message: String| Error::InvalidPkgManifest {
            path: fpath.display().to_string(),
            message,
        };

        let data: Value =
            json5::from_str(&content).map_err(|e| bad(format!("parse error: {e}")))?;
        let root = data
            .as_object()
            .ok_or_else(|| bad("Root value must be an object".to_string()))?;

        let mut name: Option<String> = None;
        let mut namespace: Option<String> = None;
        let mut version = None;
        let mut dependencies = Vec::new();
        let mut test_driver = None;

        for (key, value) in root {
            match key.as_str() {
                "$schema" => {}
                "name" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| bad("`name` must be a string".to_string()))?;
                    name = Some(s.to_string());
                }
                "namespace" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| bad("`namespace` must be a string".to_string()))?;
                    namespace = Some(s.to_string());
                }
                "version" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| bad("`version` must be a string".to_string()))?;
                    version = Some(parse_version(s)?);
                }
                "depends" => {
                    let map = value.as_object().ok_or_else(|| {
                        bad(
                            "`depends` must be a mapping between package names and version ranges"
                                .to_string(),
                        )
                    })?;
                    for (dep_name, range_val) in map {
                        let range_str = range_val.as_str().ok_or_else(|| {
                            bad(format!("Dependency for '{dep_name}' must be a range string"))
                        })?;
                        let versions = VersionRange::parse_restricted(range_str)?;
                        dependencies.push(Dependency::new(dep_name.clone(), versions));
                    }
                }
                "test_driver" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| bad("`test_driver` must be a string".to_string()))?;
                    test_driver = Some(TestDriver::parse(s)?);
                }
                unknown => {
                    let hint = sentence_suffix(did_you_mean(unknown, MANIFEST_KEYS));
                    return Err(bad(format!("Unknown key `{unknown}`{hint}")));
                }
            }
        }

        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(bad("The 'name' field is required.".to_string())),
        };
        let version = version.ok_or_else(|| bad("The 'version' field is required.".to_string()))?;
        let namespace = namespace.unwrap_or_else(|| name.clone());

        Ok(PackageManifest {
            ident: PackageId::new(name, version),
            namespace,
            dependencies,
            test_driver,
        })
    }

    /// Load a manifest from the deprecated `package.dds` key-value form.
    pub fn load_from_dds_file(fpath: &Path) -> Result<PackageManifest> {
        log::warn!(
            "Using deprecated package.dds parsing (on file {}). This will be removed soon. Migrate!",
            fpath.display()
        );
        let content = fs::read_to_string(fpath)?;
        let bad = |message: String| Error::InvalidPkgManifest {
            path: fpath.display().to_string(),
            message,
        };

        let mut name: Option<String> = None;
        let mut namespace: Option<String> = None;
        let mut version = None;
        let mut dependencies = Vec::new();
        let mut test_driver = None;

        const KEYS: [&str; 5] = ["Name", "Namespace", "Version", "Depends", "Test-Driver"];

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| bad(format!("Line is not a 'Key: value' pair: '{line}'")))?;
            let value = value.trim();
            match key.trim() {
                "Name" => name = Some(value.to_string()),
                "Namespace" => namespace = Some(value.to_string()),
                "Version" => version = Some(parse_version(value)?),
                "Depends" => dependencies.push(Dependency::parse_depends_string(value)?),
                "Test-Driver" => test_driver = Some(TestDriver::parse(value)?),
                unknown => {
                    let hint = sentence_suffix(did_you_mean(unknown, KEYS));
                    return Err(bad(format!("Unknown key `{unknown}`{hint}")));
                }
            }
        }

        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(bad("The 'Name' field is required.".to_string())),
        };
        let version = version.ok_or_else(|| bad("The 'Version' field is required.".to_string()))?;
        let namespace = namespace.unwrap_or_else(|| name.clone());

        Ok(PackageManifest {
            ident: PackageId::new(name, version),
            namespace,
            dependencies,
            test_driver,
        })
    }

    /// Locate the manifest file within a directory, if one exists.
    pub fn find_in_directory(dirpath: &Path) -> Option<PathBuf> {
        let cands = ["package.json5", "package.jsonc", "package.json"];
        for c in cands {
            let cand = dirpath.join(c);
            if cand.is_file() {
                return Some(cand);
            }
        }
        let dds_fname = dirpath.join("package.dds");
        if dds_fname.is_file() {
            return Some(dds_fname);
        }
        None
    }

    /// Load the manifest for a directory, if the directory has one.
    pub fn load_from_directory(dirpath: &Path) -> Result<Option<PackageManifest>> {
        let Some(found) = Self::find_in_directory(dirpath) else {
            return Ok(None);
        };
        let man = if found.extension().is_some_and(|e| e == "dds") {
            Self::load_from_dds_file(&found)?
        } else {
            Self::load_from_file(&found)?
        };
        Ok(Some(man))
    }
}

/// A plain list of dependency declarations, as read from a `--deps`
/// file: one `name@range` per line, `#` comments and blank lines
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct DependencyManifest {
    pub dependencies: Vec<Dependency>,
}

impl DependencyManifest {
    pub fn from_file(fpath: &Path) -> Result<DependencyManifest> {
        let content = fs::read_to_string(fpath)?;
        let mut dependencies = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            dependencies.push(Dependency::parse_depends_string(line)?);
        }
        Ok(DependencyManifest { dependencies })
    }
}
