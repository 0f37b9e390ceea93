//! # Toolchain Facade
//!
//! A [`Toolchain`] is pure data: argv templates and flag lists that
//! translate abstract compile/archive/link specs into concrete command
//! lines for one compiler family. Built-ins are selected with a
//! leading `:` (`:gcc`, `:clang`, `:msvc`, optionally version-suffixed
//! like `:gcc-9`); anything else names a JSON5 toolchain file.
//!
//! Templates use three placeholder tokens: `[flags]` splices the
//! computed flag list, while `[in]` and `[out]` substitute the input
//! and output paths (including inside larger tokens, e.g. MSVC's
//! `/Fo[out]`).

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::suggestions::{did_you_mean, sentence_suffix};

/// How header dependency information is discovered during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepsMode {
    /// No dependency discovery; every build is driven by mtimes of
    /// primary sources only.
    #[default]
    None,
    /// GNU style: `-MD -MF <depfile>` emits a makefile-format depfile.
    Gnu,
    /// MSVC style: `/showIncludes` notes parsed out of the compiler
    /// output.
    Msvc,
}

/// A description of how to drive one compiler family.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compile_template: Vec<String>,
    pub archive_template: Vec<String>,
    pub link_template: Vec<String>,
    pub compile_flags: Vec<String>,
    pub warning_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub include_template: Vec<String>,
    pub define_template: Vec<String>,
    pub deps_mode: DepsMode,
    pub archive_suffix: String,
    pub object_suffix: String,
    pub exe_suffix: String,
    /// The (localizable) `/showIncludes` note prefix for MSVC-mode
    /// dependency parsing.
    pub msvc_deps_prefix: String,
}

/// Input to [`Toolchain::create_compile_command`].
#[derive(Debug)]
pub struct CompileSpec<'a> {
    pub source_path: &'a Path,
    pub out_path: &'a Path,
    pub include_dirs: &'a [PathBuf],
    pub definitions: &'a [String],
    pub enable_warnings: bool,
}

/// A realized compiler invocation.
#[derive(Debug)]
pub struct CompileCommand {
    pub command: Vec<String>,
    /// Where the makefile-format depfile will appear (GNU mode only).
    pub gnu_depfile: Option<PathBuf>,
}

fn path_str(p: &Path) -> String {
    p.display().to_string()
}

/// Expand a template: `[flags]` tokens splice `flags`; `[in]`/`[out]`
/// substitute into every other token.
fn expand(template: &[String], flags: &[String], input: &str, output: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(template.len() + flags.len());
    for tok in template {
        if tok == "[flags]" {
            out.extend(flags.iter().cloned());
        } else {
            out.push(tok.replace("[in]", input).replace("[out]", output));
        }
    }
    out
}

impl Toolchain {
    /// Realize the argv (and depfile path, for GNU deps mode) for one
    /// compilation.
    pub fn create_compile_command(&self, spec: &CompileSpec) -> CompileCommand {
        let mut flags = self.compile_flags.clone();
        if spec.enable_warnings {
            flags.extend(self.warning_flags.iter().cloned());
        }
        for dir in spec.include_dirs {
            for tok in &self.include_template {
                flags.push(tok.replace("[path]", &path_str(dir)));
            }
        }
        for def in spec.definitions {
            for tok in &self.define_template {
                flags.push(tok.replace("[def]", def));
            }
        }

        let mut gnu_depfile = None;
        match self.deps_mode {
            DepsMode::Gnu => {
                let depfile = PathBuf::from(format!("{}.d", path_str(spec.out_path)));
                flags.push("-MD".to_string());
                flags.push("-MF".to_string());
                flags.push(path_str(&depfile));
                gnu_depfile = Some(depfile);
            }
            DepsMode::Msvc => flags.push("/showIncludes".to_string()),
            DepsMode::None => {}
        }

        let command = expand(
            &self.compile_template,
            &flags,
            &path_str(spec.source_path),
            &path_str(spec.out_path),
        );
        CompileCommand {
            command,
            gnu_depfile,
        }
    }

    /// Realize the argv for creating a static archive.
    pub fn create_archive_command(&self, inputs: &[PathBuf], out_path: &Path) -> Vec<String> {
        let inputs: Vec<String> = inputs.iter().map(|p| path_str(p)).collect();
        let mut out = Vec::new();
        for tok in &self.archive_template {
            if tok == "[in]" {
                out.extend(inputs.iter().cloned());
            } else {
                out.push(
                    tok.replace("[out]", &path_str(out_path))
                        .replace("[in]", &inputs.join(" ")),
                );
            }
        }
        out
    }

    /// Realize the argv for linking an executable.
    pub fn create_link_command(&self, inputs: &[PathBuf], out_path: &Path) -> Vec<String> {
        let inputs: Vec<String> = inputs.iter().map(|p| path_str(p)).collect();
        let mut out = Vec::new();
        for tok in &self.link_template {
            if tok == "[in]" {
                out.extend(inputs.iter().cloned());
            } else if tok == "[flags]" {
                out.extend(self.link_flags.iter().cloned());
            } else {
                out.push(
                    tok.replace("[out]", &path_str(out_path))
                        .replace("[in]", &inputs.join(" ")),
                );
            }
        }
        out
    }

    /// Look up a built-in toolchain by its name (without the leading
    /// `:`). Versioned names like `gcc-9` select the suffixed driver
    /// binaries.
    pub fn get_builtin(name: &str) -> Option<Toolchain> {
        let (base, suffix) = match name.split_once('-') {
            Some((base, ver)) => {
                if ver.is_empty() || !ver.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    return None;
                }
                (base, format!("-{ver}"))
            }
            None => (name, String::new()),
        };
        match base {
            "gcc" => Some(Self::gnu_family(&format!("g++{suffix}"))),
            "clang" => Some(Self::gnu_family(&format!("clang++{suffix}"))),
            "msvc" if suffix.is_empty() => Some(Self::msvc()),
            _ => None,
        }
    }

    fn gnu_family(cxx: &str) -> Toolchain {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        Toolchain {
            compile_template: s(&[cxx, "[flags]", "-c", "[in]", "-o", "[out]"]),
            archive_template: s(&["ar", "rcs", "[out]", "[in]"]),
            link_template: s(&[cxx, "[in]", "-o", "[out]", "[flags]"]),
            compile_flags: s(&["-fPIC", "-pthread"]),
            warning_flags: s(&["-Wall", "-Wextra", "-Wpedantic"]),
            link_flags: s(&["-pthread"]),
            include_template: s(&["-I", "[path]"]),
            define_template: s(&["-D", "[def]"]),
            deps_mode: DepsMode::Gnu,
            archive_suffix: ".a".to_string(),
            object_suffix: ".o".to_string(),
            exe_suffix: String::new(),
            msvc_deps_prefix: "Note: including file:".to_string(),
        }
    }

    fn msvc() -> Toolchain {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        Toolchain {
            compile_template: s(&["cl.exe", "/nologo", "/EHsc", "[flags]", "/c", "[in]", "/Fo[out]"]),
            archive_template: s(&["lib.exe", "/nologo", "/OUT:[out]", "[in]"]),
            link_template: s(&["cl.exe", "/nologo", "/EHsc", "[in]", "/Fe[out]", "[flags]"]),
            compile_flags: s(&["/MT"]),
            warning_flags: s(&["/W4"]),
            link_flags: vec![],
            include_template: s(&["/I", "[path]"]),
            define_template: s(&["/D", "[def]"]),
            deps_mode: DepsMode::Msvc,
            archive_suffix: ".lib".to_string(),
            object_suffix: ".obj".to_string(),
            exe_suffix: ".exe".to_string(),
            msvc_deps_prefix: "Note: including file:".to_string(),
        }
    }

    /// Resolve a `--toolchain` argument: a leading `:` selects a
    /// built-in, anything else is a toolchain file path.
    pub fn from_arg(arg: &str) -> Result<Toolchain> {
        if let Some(builtin) = arg.strip_prefix(':') {
            return Self::get_builtin(builtin).ok_or_else(|| Error::InvalidBuiltinToolchain {
                name: builtin.to_string(),
            });
        }
        Self::load_from_file(Path::new(arg))
    }

    /// Find a default toolchain: a `toolchain.json5|jsonc|json` file in
    /// the current directory or the user config directory.
    pub fn get_default() -> Result<Option<Toolchain>> {
        let mut candidates: Vec<PathBuf> = ["toolchain.json5", "toolchain.jsonc", "toolchain.json"]
            .iter()
            .map(PathBuf::from)
            .collect();
        if let Some(cfg) = dirs::config_dir() {
            for fname in ["toolchain.json5", "toolchain.jsonc", "toolchain.json"] {
                candidates.push(cfg.join("drover").join(fname));
            }
        }
        for cand in candidates {
            if cand.is_file() {
                return Ok(Some(Self::load_from_file(&cand)?));
            }
        }
        Ok(None)
    }

    /// Load a toolchain description from a JSON5 file.
    ///
    /// The file may set `base` to a built-in name (`":gcc"` by
    /// default) and then override any of the template/flag fields.
    pub fn load_from_file(fpath: &Path) -> Result<Toolchain> {
        let bad = |message: String| Error::InvalidToolchainFile {
            path: fpath.display().to_string(),
            message,
        };
        let content = fs::read_to_string(fpath)?;
        let data: Value =
            json5::from_str(&content).map_err(|e| bad(format!("parse error: {e}")))?;
        let root = data
            .as_object()
            .ok_or_else(|| bad("Root value must be an object".to_string()))?;

        const KEYS: [&str; 14] = [
            "base",
            "compile_template",
            "archive_template",
            "link_template",
            "compile_flags",
            "warning_flags",
            "link_flags",
            "include_template",
            "define_template",
            "deps_mode",
            "archive_suffix",
            "object_suffix",
            "exe_suffix",
            "msvc_deps_prefix",
        ];

        let mut tc = match root.get("base") {
            None => Self::gnu_family("g++"),
            Some(Value::String(s)) => {
                let name = s.strip_prefix(':').unwrap_or(s);
                Self::get_builtin(name).ok_or_else(|| Error::InvalidBuiltinToolchain {
                    name: name.to_string(),
                })?
            }
            Some(_) => return Err(bad("`base` must be a string".to_string())),
        };

        let string_list = |key: &str, v: &Value| -> Result<Vec<String>> {
            v.as_array()
                .map(|arr| {
                    arr.iter()
                        .map(|x| {
                            x.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| bad(format!("`{key}` must be a list of strings")))
                        })
                        .collect()
                })
                .unwrap_or_else(|| Err(bad(format!("`{key}` must be a list of strings"))))
        };
        let string_val = |key: &str, v: &Value| -> Result<String> {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| bad(format!("`{key}` must be a string")))
        };

        for (key, value) in root {
            match key.as_str() {
                "base" => {}
                "compile_template" => tc.compile_template = string_list(key, value)?,
                "archive_template" => tc.archive_template = string_list(key, value)?,
                "link_template" => tc.link_template = string_list(key, value)?,
                "compile_flags" => tc.compile_flags = string_list(key, value)?,
                "warning_flags" => tc.warning_flags = string_list(key, value)?,
                "link_flags" => tc.link_flags = string_list(key, value)?,
                "include_template" => tc.include_template = string_list(key, value)?,
                "define_template" => tc.define_template = string_list(key, value)?,
                "deps_mode" => {
                    tc.deps_mode = match string_val(key, value)?.to_lowercase().as_str() {
                        "none" => DepsMode::None,
                        "gnu" => DepsMode::Gnu,
                        "msvc" => DepsMode::Msvc,
                        other => {
                            return Err(bad(format!(
                                "`deps_mode` must be one of 'none', 'gnu', 'msvc'; got '{other}'"
                            )))
                        }
                    }
                }
                "archive_suffix" => tc.archive_suffix = string_val(key, value)?,
                "object_suffix" => tc.object_suffix = string_val(key, value)?,
                "exe_suffix" => tc.exe_suffix = string_val(key, value)?,
                "msvc_deps_prefix" => tc.msvc_deps_prefix = string_val(key, value)?,
                unknown => {
                    let hint = sentence_suffix(did_you_mean(unknown, KEYS));
                    return Err(bad(format!("Unknown key `{unknown}`{hint}")));
                }
            }
        }
        Ok(tc)
    }
}
