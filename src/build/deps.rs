//! Parsing of compiler-emitted header dependency information.
//!
//! GNU-mode toolchains write a makefile-format depfile (`-MD -MF`);
//! MSVC-mode toolchains interleave `Note: including file:` lines into
//! their output (`/showIncludes`), which are parsed out and removed
//! from what the user sees. The note prefix is localizable and comes
//! from the toolchain.

use std::fs;
use std::path::{Path, PathBuf};

/// The inputs/command/output record for one produced file.
#[derive(Debug, Clone, Default)]
pub struct FileDepsInfo {
    pub output: PathBuf,
    pub command: String,
    pub command_output: String,
    pub inputs: Vec<PathBuf>,
}

/// Split a makefile dependency list into tokens, honoring backslash
/// escapes for spaces and line continuations.
fn split_mkfile_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(' ') | Some('\\') => {
                    cur.push(chars.next().unwrap());
                }
                Some('\n') | Some('\r') => {
                    // Escaped newline: token break.
                    chars.next();
                    if !cur.is_empty() {
                        tokens.push(std::mem::take(&mut cur));
                    }
                }
                _ => cur.push(c),
            },
            c if c.is_whitespace() => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        tokens.push(cur);
    }
    tokens
}

/// Parse a makefile-format depfile (`output: input input ...`).
///
/// Returns `None` (with a logged error) on malformed content; the
/// caller then keeps whatever record it already has rather than
/// storing garbage.
pub fn parse_mkfile_deps_str(s: &str) -> Option<FileDepsInfo> {
    let tokens = split_mkfile_tokens(s);
    let mut iter = tokens.into_iter();
    let Some(head) = iter.next() else {
        log::error!("Invalid deps listing: the depfile was empty. This is almost certainly a bug.");
        return None;
    };
    let Some(output) = head.strip_suffix(':') else {
        log::error!(
            "Invalid deps listing: leader item '{head}' is not colon-terminated. \
             This is probably a bug."
        );
        return None;
    };
    Some(FileDepsInfo {
        output: PathBuf::from(output),
        inputs: iter.map(PathBuf::from).collect(),
        ..Default::default()
    })
}

/// Read and parse a depfile from disk.
pub fn parse_mkfile_deps_file(path: &Path) -> Option<FileDepsInfo> {
    match fs::read_to_string(path) {
        Ok(content) => parse_mkfile_deps_str(&content),
        Err(e) => {
            log::error!("Failed to read depfile [{}]: {e}", path.display());
            None
        }
    }
}

/// Result of scanning MSVC `/showIncludes` output.
#[derive(Debug, Default)]
pub struct MsvcDeps {
    /// Included files, in note order.
    pub inputs: Vec<PathBuf>,
    /// The compiler output with the include notes removed.
    pub cleaned_output: String,
}

/// Extract `<leader> <path>` note lines from compiler output.
pub fn parse_msvc_output_for_deps(output: &str, leader: &str) -> MsvcDeps {
    let mut deps = MsvcDeps::default();
    for full_line in output.lines() {
        let trimmed = full_line.trim();
        match trimmed.strip_prefix(leader) {
            Some(rest) => deps.inputs.push(PathBuf::from(rest.trim())),
            None => {
                deps.cleaned_output.push_str(full_line);
                deps.cleaned_output.push('\n');
            }
        }
    }
    if !deps.cleaned_output.is_empty() {
        deps.cleaned_output.pop();
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_depfile() {
        let info = parse_mkfile_deps_str("obj/a.o: src/a.cpp src/a.hpp\n").unwrap();
        assert_eq!(info.output, PathBuf::from("obj/a.o"));
        assert_eq!(
            info.inputs,
            [PathBuf::from("src/a.cpp"), PathBuf::from("src/a.hpp")]
        );
    }

    #[test]
    fn test_parse_depfile_with_continuations() {
        let text = "obj/a.o: src/a.cpp \\\n  src/a.hpp \\\n  include/b.hpp\n";
        let info = parse_mkfile_deps_str(text).unwrap();
        assert_eq!(info.inputs.len(), 3);
        assert_eq!(info.inputs[2], PathBuf::from("include/b.hpp"));
    }

    #[test]
    fn test_parse_depfile_with_escaped_spaces() {
        let info = parse_mkfile_deps_str("a.o: my\\ file.cpp other.hpp").unwrap();
        assert_eq!(
            info.inputs,
            [PathBuf::from("my file.cpp"), PathBuf::from("other.hpp")]
        );
    }

    #[test]
    fn test_parse_depfile_malformed() {
        assert!(parse_mkfile_deps_str("").is_none());
        assert!(parse_mkfile_deps_str("no-colon-here a b").is_none());
    }

    #[test]
    fn test_parse_msvc_output() {
        let output = "a.cpp\n\
                      Note: including file: C:\\inc\\a.hpp\n\
                      Note: including file:  C:\\inc\\deep\\b.hpp\n\
                      a.cpp(10): warning C4100: unreferenced parameter\n";
        let deps = parse_msvc_output_for_deps(output, "Note: including file:");
        assert_eq!(
            deps.inputs,
            [
                PathBuf::from("C:\\inc\\a.hpp"),
                PathBuf::from("C:\\inc\\deep\\b.hpp")
            ]
        );
        assert_eq!(
            deps.cleaned_output,
            "a.cpp\na.cpp(10): warning C4100: unreferenced parameter"
        );
    }

    #[test]
    fn test_parse_msvc_output_custom_leader() {
        let output = "Hinweis: Einlesen der Datei: x.hpp\nrest\n";
        let deps = parse_msvc_output_for_deps(output, "Hinweis: Einlesen der Datei:");
        assert_eq!(deps.inputs, [PathBuf::from("x.hpp")]);
        assert_eq!(deps.cleaned_output, "rest");
    }

    #[test]
    fn test_parse_msvc_no_notes() {
        let deps = parse_msvc_output_for_deps("plain output\n", "Note: including file:");
        assert!(deps.inputs.is_empty());
        assert_eq!(deps.cleaned_output, "plain output");
    }
}
