//! Source file classification and enumeration.
//!
//! Drover infers the role of each file in a source tree from its
//! extension(s): ordinary headers and translation units make up a
//! library, while a secondary extension marks entry points
//! (`app.main.cpp`) and tests (`widget.test.cpp`).

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// The role a source file plays in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// An includable header; never compiled directly.
    Header,
    /// A library translation unit.
    Source,
    /// An application entry point (`*.main.<ext>`); compiled and
    /// linked into an executable.
    App,
    /// A test entry point (`*.test.<ext>`).
    Test,
}

impl SourceKind {
    /// Whether files of this kind are handed to the compiler.
    pub fn is_compiled(self) -> bool {
        !matches!(self, SourceKind::Header)
    }
}

/// A classified file inside a source tree.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path to the file.
    pub path: PathBuf,
    pub kind: SourceKind,
}

const HEADER_EXTS: [&str; 6] = ["h", "h++", "hh", "hpp", "hxx", "inl"];
const SOURCE_EXTS: [&str; 5] = ["c", "c++", "cc", "cpp", "cxx"];

/// Infer the kind of a source file from its path, or `None` if the
/// file is not a recognized source file at all.
pub fn infer_source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?;
    if HEADER_EXTS.contains(&ext) {
        return Some(SourceKind::Header);
    }
    if !SOURCE_EXTS.contains(&ext) {
        return None;
    }
    // A second extension distinguishes entry points from library code.
    let stem = path.file_stem().map(Path::new)?;
    match stem.extension().and_then(|s| s.to_str()) {
        Some("main") => Some(SourceKind::App),
        Some("test") => Some(SourceKind::Test),
        _ => Some(SourceKind::Source),
    }
}

/// Recursively enumerate the recognized source files beneath `root`,
/// sorted by path for deterministic planning. A missing `root` yields
/// an empty list.
pub fn collect_sources(root: &Path) -> Result<Vec<SourceFile>> {
    let mut out = Vec::new();
    if !root.is_dir() {
        return Ok(out);
    }
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = infer_source_kind(entry.path()) {
            out.push(SourceFile {
                path: entry.path().to_path_buf(),
                kind,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_infer_source_kind() {
        assert_eq!(infer_source_kind(Path::new("foo.h")), Some(SourceKind::Header));
        assert_eq!(infer_source_kind(Path::new("foo.hpp")), Some(SourceKind::Header));
        assert_eq!(infer_source_kind(Path::new("foo.hh")), Some(SourceKind::Header));
        assert_eq!(infer_source_kind(Path::new("foo.cpp")), Some(SourceKind::Source));
        assert_eq!(infer_source_kind(Path::new("foo.txt")), None);
        assert_eq!(infer_source_kind(Path::new("foo")), None);
    }

    #[test]
    fn test_infer_entry_points() {
        assert_eq!(
            infer_source_kind(Path::new("app.main.cpp")),
            Some(SourceKind::App)
        );
        assert_eq!(
            infer_source_kind(Path::new("widget.test.cc")),
            Some(SourceKind::Test)
        );
        // Only the stem's own extension counts, not directory names.
        assert_eq!(
            infer_source_kind(Path::new("main/foo.cpp")),
            Some(SourceKind::Source)
        );
        // Headers never become entry points.
        assert_eq!(
            infer_source_kind(Path::new("app.main.hpp")),
            Some(SourceKind::Header)
        );
    }

    #[test]
    fn test_collect_sources() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.cpp"), "").unwrap();
        fs::write(src.join("a.hpp"), "").unwrap();
        fs::write(src.join("nested/b.cpp"), "").unwrap();
        fs::write(src.join("tool.main.cpp"), "").unwrap();
        fs::write(src.join("README.md"), "").unwrap();

        let files = collect_sources(&src).unwrap();
        assert_eq!(files.len(), 4);
        let compiled: Vec<_> = files.iter().filter(|f| f.kind.is_compiled()).collect();
        assert_eq!(compiled.len(), 3);
    }

    #[test]
    fn test_collect_sources_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let files = collect_sources(&dir.path().join("nope")).unwrap();
        assert!(files.is_empty());
    }
}
