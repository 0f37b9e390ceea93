//! End-to-end tests for the `repo` command family.

mod common;

use assert_fs::prelude::*;
use predicates::prelude::*;

use common::{drover, write_minimal_project};

#[test]
fn test_repo_init_creates_directory() {
    let temp = assert_fs::TempDir::new().unwrap();
    let repo = temp.child("repo");

    drover()
        .arg("repo")
        .arg("init")
        .arg("--repo-dir")
        .arg(repo.path())
        .assert()
        .success();

    repo.assert(predicate::path::is_dir());
}

#[test]
fn test_repo_ls_missing_directory_fails() {
    let temp = assert_fs::TempDir::new().unwrap();

    drover()
        .arg("repo")
        .arg("ls")
        .arg("--repo-dir")
        .arg(temp.child("nowhere").path())
        .assert()
        .failure();
}

#[test]
fn test_repo_ls_groups_versions_by_name() {
    let temp = assert_fs::TempDir::new().unwrap();
    let repo = temp.child("repo");

    for (name, version) in [("alpha", "1.0.0"), ("alpha", "1.1.0"), ("beta", "0.4.0")] {
        let proj = temp.child(format!("{name}-{version}"));
        write_minimal_project(proj.path(), name, version);
        drover()
            .arg("sdist")
            .arg("export")
            .arg("--project")
            .arg(proj.path())
            .arg("--repo-dir")
            .arg(repo.path())
            .assert()
            .success();
    }

    drover()
        .arg("repo")
        .arg("ls")
        .arg("--repo-dir")
        .arg(repo.path())
        .assert()
        .success()
        .stdout(predicate::eq(
            "alpha:\n  - 1.0.0\n  - 1.1.0\nbeta:\n  - 0.4.0\n",
        ));
}
