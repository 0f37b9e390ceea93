//! # Build Orchestration
//!
//! The [`Builder`] accumulates source distributions (the consumer
//! project plus its resolved dependencies, or just dependencies for
//! `build-deps`), plans the work-unit DAG, and drives the incremental
//! parallel executor against the output directory's file-deps
//! database. Optionally emits a libman index for downstream consumers
//! once all archives exist.

pub mod db;
pub mod deps;
pub mod exec;
pub mod plan;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::libman;
use crate::toolchain::Toolchain;

pub use exec::BuildSummary;
pub use plan::SdistBuildParams;

use crate::sdist::Sdist;

const DEPS_DB_NAME: &str = ".drover-deps.db";

/// The Catch test driver with a provided `main()`, generated into the
/// output tree when a manifest selects `Catch-Main`.
const CATCH_MAIN_SOURCE: &str = "#define CATCH_CONFIG_MAIN\n#include <catch2/catch.hpp>\n";

/// Whole-build parameters.
#[derive(Debug)]
pub struct BuildParams {
    pub out_root: PathBuf,
    pub toolchain: Toolchain,
    /// `<= 0` selects `hardware threads + 2`.
    pub parallel_jobs: i32,
    /// Emit a libman index at this path after a successful build.
    pub emit_lmi: Option<PathBuf>,
}

/// Accumulates sdists and drives one build.
#[derive(Default)]
pub struct Builder {
    entries: Vec<(Sdist, SdistBuildParams)>,
    externals: Vec<libman::Library>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Add an sdist to the build with its own parameters.
    pub fn add(&mut self, sdist: Sdist, params: SdistBuildParams) {
        self.entries.push((sdist, params));
    }

    /// Satisfy dependencies from an existing libman index instead of
    /// building them.
    pub fn load_lm_index(&mut self, path: &Path) -> Result<()> {
        let libs = libman::parse_index(path)?;
        log::info!(
            "Loaded {} pre-built librar{} from {}",
            libs.len(),
            if libs.len() == 1 { "y" } else { "ies" },
            path.display()
        );
        self.externals.extend(libs);
        Ok(())
    }

    /// Plan and execute the build.
    pub fn build(&self, params: &BuildParams) -> Result<BuildSummary> {
        fs::create_dir_all(&params.out_root)?;

        let plan = plan::create_plan(
            &self.entries,
            &self.externals,
            &params.toolchain,
            &params.out_root,
        )?;

        if let Some(driver_src) = &plan.catch_main_source {
            if !driver_src.is_file() {
                if let Some(parent) = driver_src.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(driver_src, CATCH_MAIN_SOURCE)?;
            }
        }

        let mut db = db::FileDepsDb::open(&params.out_root.join(DEPS_DB_NAME))?;
        let summary = exec::execute(
            &plan,
            &params.out_root,
            &params.toolchain,
            &mut db,
            params.parallel_jobs,
        )?;

        if let Some(lmi_path) = &params.emit_lmi {
            libman::write_index(lmi_path, &plan.libman)?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdist::{create_sdist, SdistParams};
    use crate::toolchain::DepsMode;
    use tempfile::TempDir;

    fn sh_toolchain() -> Toolchain {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        Toolchain {
            compile_template: s(&["/bin/sh", "-c", "cp [in] [out]"]),
            archive_template: s(&["/bin/sh", "-c", "cat [in] > [out]"]),
            link_template: s(&["/bin/sh", "-c", "cat [in] > [out]"]),
            compile_flags: vec![],
            warning_flags: vec![],
            link_flags: vec![],
            include_template: vec![],
            define_template: vec![],
            deps_mode: DepsMode::None,
            archive_suffix: ".a".to_string(),
            object_suffix: ".o".to_string(),
            exe_suffix: String::new(),
            msvc_deps_prefix: "Note: including file:".to_string(),
        }
    }

    #[test]
    fn test_builder_emits_lmi() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fs::create_dir_all(proj.join("src")).unwrap();
        fs::write(
            proj.join("package.jsonc"),
            r#"{ "name": "emitter", "version": "1.0.0", "namespace": "acme" }"#,
        )
        .unwrap();
        fs::write(proj.join("src/emitter.cpp"), "code\n").unwrap();
        let sd = create_sdist(&SdistParams {
            project_dir: proj,
            dest_path: tmp.path().join("emitter@1.0.0"),
            force: false,
        })
        .unwrap();

        let out = tmp.path().join("_build");
        let lmi = out.join("INDEX.lmi");
        let mut builder = Builder::new();
        builder.add(sd, SdistBuildParams::default());
        builder
            .build(&BuildParams {
                out_root: out.clone(),
                toolchain: sh_toolchain(),
                parallel_jobs: 1,
                emit_lmi: Some(lmi.clone()),
            })
            .unwrap();

        assert!(out.join("libemitter.a").is_file());
        let parsed = libman::parse_index(&lmi).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].qualified_name, "acme/emitter");
        assert!(parsed[0].path.ends_with("libemitter.a"));
    }

    #[test]
    fn test_catch_main_source_generated() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fs::create_dir_all(proj.join("src")).unwrap();
        fs::write(
            proj.join("package.jsonc"),
            r#"{ "name": "t", "version": "1.0.0", "test_driver": "Catch-Main" }"#,
        )
        .unwrap();
        fs::write(proj.join("src/t.cpp"), "code\n").unwrap();
        fs::write(proj.join("src/w.test.cpp"), "test\n").unwrap();
        let sd = create_sdist(&SdistParams {
            project_dir: proj,
            dest_path: tmp.path().join("t@1.0.0"),
            force: false,
        })
        .unwrap();

        let out = tmp.path().join("_build");
        let mut builder = Builder::new();
        builder.add(
            sd,
            SdistBuildParams {
                build_tests: true,
                ..Default::default()
            },
        );
        builder
            .build(&BuildParams {
                out_root: out.clone(),
                toolchain: sh_toolchain(),
                parallel_jobs: 1,
                emit_lmi: None,
            })
            .unwrap();

        let driver = out.join("_test_driver/catch_main.cpp");
        assert!(driver.is_file());
        assert!(fs::read_to_string(driver)
            .unwrap()
            .contains("CATCH_CONFIG_MAIN"));
        assert!(out.join("test/w").is_file());
    }
}
