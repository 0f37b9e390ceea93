//! Emission and consumption of the libman index (`INDEX.lmi`).
//!
//! The index is a line-oriented `Key: value` document describing the
//! built libraries for downstream consumers: one `Library:` record per
//! library with its archive path, exported include directories, and
//! the libraries it uses.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One library record in a libman index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// Qualified `namespace/name`.
    pub qualified_name: String,
    /// Path to the static archive.
    pub path: PathBuf,
    /// Exported include directories.
    pub include_paths: Vec<PathBuf>,
    /// Qualified names of libraries this one uses.
    pub uses: Vec<String>,
}

/// Write an index describing `libraries` to `path`.
pub fn write_index(path: &Path, libraries: &[Library]) -> Result<()> {
    let mut out = String::from("Type: Index\nVersion: 1\n");
    for lib in libraries {
        out.push('\n');
        out.push_str(&format!("Library: {}\n", lib.qualified_name));
        out.push_str(&format!("Path: {}\n", lib.path.display()));
        for inc in &lib.include_paths {
            out.push_str(&format!("Include-Path: {}\n", inc.display()));
        }
        for uses in &lib.uses {
            out.push_str(&format!("Uses: {uses}\n"));
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, out)?;
    log::info!("Wrote libman index at {}", path.display());
    Ok(())
}

/// Read an index previously written by [`write_index`] (or another
/// libman producer). Keys that drover does not consume are ignored.
pub fn parse_index(path: &Path) -> Result<Vec<Library>> {
    let content = fs::read_to_string(path)?;
    let mut libraries: Vec<Library> = Vec::new();

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "{}:{}: not a 'Key: value' line: '{raw}'",
                    path.display(),
                    lineno + 1
                ),
            ))
        })?;
        let value = value.trim();
        match key.trim() {
            "Type" | "Version" => {}
            "Library" => libraries.push(Library {
                qualified_name: value.to_string(),
                path: PathBuf::new(),
                include_paths: vec![],
                uses: vec![],
            }),
            "Path" => {
                if let Some(lib) = libraries.last_mut() {
                    lib.path = PathBuf::from(value);
                }
            }
            "Include-Path" => {
                if let Some(lib) = libraries.last_mut() {
                    lib.include_paths.push(PathBuf::from(value));
                }
            }
            "Uses" => {
                if let Some(lib) = libraries.last_mut() {
                    lib.uses.push(value.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(libraries)
}
