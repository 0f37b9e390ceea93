//! Fixtures used by the CLI tests: a handle on the compiled `drover`
//! binary, small on-disk C++ projects, and a canned catalog import
//! document.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;

/// A `drover` invocation against the compiled binary.
pub fn drover() -> Command {
    Command::cargo_bin("drover").expect("drover binary builds")
}

/// Whether a real g++ is available for end-to-end compile tests.
/// Build-oriented tests return early when it is not.
pub fn have_gxx() -> bool {
    std::process::Command::new("g++")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A catalog import document declaring `foo@1.2.3` with a git remote.
pub const FOO_CATALOG_JSON: &str = r#"{
    "version": 1,
    "packages": {
        "foo": {
            "1.2.3": {
                "git": {
                    "url": "https://example.com/foo.git",
                    "ref": "v1.2.3"
                },
                "description": "An example package"
            }
        }
    }
}"#;

/// Write a small C++ project: a library with one translation unit and
/// one header, plus one application entry point that does NOT include
/// the header (so a header edit recompiles exactly one unit).
pub fn write_cpp_project(dir: &Path, name: &str) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("package.jsonc"),
        format!(r#"{{ "name": "{name}", "version": "1.0.0" }}"#),
    )
    .unwrap();
    fs::write(
        dir.join("src").join(format!("{name}.hpp")),
        "#pragma once\nint hello_value();\n",
    )
    .unwrap();
    fs::write(
        dir.join("src").join(format!("{name}.cpp")),
        format!("#include \"{name}.hpp\"\nint hello_value() {{ return 42; }}\n"),
    )
    .unwrap();
    fs::write(
        dir.join("src/app.main.cpp"),
        "int hello_value();\nint main() { return hello_value() == 42 ? 0 : 1; }\n",
    )
    .unwrap();
}

/// Write a minimal manifest-only project (no sources).
pub fn write_minimal_project(dir: &Path, name: &str, version: &str) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("package.jsonc"),
        format!(r#"{{ "name": "{name}", "version": "{version}" }}"#),
    )
    .unwrap();
    fs::write(
        dir.join("src").join(format!("{name}.cpp")),
        "// translation unit\n",
    )
    .unwrap();
}
