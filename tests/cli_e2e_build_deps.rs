//! End-to-end tests for the `build-deps` command.

mod common;

use assert_fs::prelude::*;
use predicates::prelude::*;

use common::drover;

#[test]
fn test_build_deps_with_no_deps_emits_empty_index() {
    let temp = assert_fs::TempDir::new().unwrap();
    let lmi = temp.child("out/INDEX.lmi");

    drover()
        .arg("build-deps")
        .arg("--toolchain")
        .arg(":gcc")
        .arg("--catalog")
        .arg(temp.child("c.db").path())
        .arg("--repo-dir")
        .arg(temp.child("repo").path())
        .arg("--out")
        .arg(temp.child("out").path())
        .arg("--lmi-path")
        .arg(lmi.path())
        .assert()
        .success();

    lmi.assert(predicate::path::exists());
    lmi.assert(predicate::str::contains("Type: Index"));
    lmi.assert(predicate::str::contains("Version: 1"));
}

#[test]
fn test_build_deps_unresolvable_dependency_fails() {
    let temp = assert_fs::TempDir::new().unwrap();

    drover()
        .arg("build-deps")
        .arg("--toolchain")
        .arg(":gcc")
        .arg("--catalog")
        .arg(temp.child("c.db").path())
        .arg("--repo-dir")
        .arg(temp.child("repo").path())
        .arg("--out")
        .arg(temp.child("out").path())
        .arg("ghost@^1.0.0")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("dependency_resolve_failure"));
}

#[test]
fn test_build_deps_reads_deps_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    let deps_file = temp.child("deps.txt");
    deps_file
        .write_str("# nothing that exists\nghost@^2.0.0\n")
        .unwrap();

    drover()
        .arg("build-deps")
        .arg("--toolchain")
        .arg(":gcc")
        .arg("--catalog")
        .arg(temp.child("c.db").path())
        .arg("--repo-dir")
        .arg(temp.child("repo").path())
        .arg("--deps")
        .arg(deps_file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ghost"));
}
