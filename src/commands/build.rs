//! # Build Command Implementation
//!
//! `drover build` compiles a consumer project together with its
//! resolved dependencies. Dependencies are either solved against the
//! catalog and materialized into the local repository, or taken
//! pre-built from an existing libman index (`--lm-index`).

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use drover::build::{BuildParams, Builder, SdistBuildParams};
use drover::catalog::Catalog;
use drover::defaults;
use drover::ident::PackageId;
use drover::manifest::PackageManifest;
use drover::repository::{with_repository, RepoFlags};
use drover::sdist::Sdist;
use semver::Version;

use super::{absolutize, materialize_solution, resolve_toolchain};

/// Build a project together with its resolved dependencies
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the directory containing the project
    #[arg(short = 'p', long, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Path/identifier of the toolchain to use (`:gcc`, `:clang`,
    /// `:msvc`, or a toolchain file)
    #[arg(short = 't', long, value_name = "TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// The root build directory
    #[arg(long, value_name = "DIR", default_value = "_build")]
    pub out: PathBuf,

    /// Set the number of parallel jobs when compiling files (0 = auto)
    #[arg(short = 'j', long, value_name = "N", default_value_t = 0)]
    pub jobs: i32,

    /// Do not build tests
    #[arg(long)]
    pub no_tests: bool,

    /// Do not compile and link applications
    #[arg(long)]
    pub no_apps: bool,

    /// Disable build warnings
    #[arg(long)]
    pub no_warnings: bool,

    /// Path to an existing libman index from which to load deps
    /// (usually INDEX.lmi)
    #[arg(short = 'I', long, value_name = "PATH")]
    pub lm_index: Option<PathBuf>,

    /// Override the path to the catalog database
    #[arg(short = 'c', long, value_name = "FILE", env = "DROVER_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Path to the drover repository directory
    #[arg(long, value_name = "DIR", env = "DROVER_REPO_DIR")]
    pub repo_dir: Option<PathBuf>,
}

pub fn execute(args: BuildArgs) -> Result<()> {
    let toolchain = resolve_toolchain(&args.toolchain)?;
    let project_dir = absolutize(&args.project);

    // A project without a manifest still builds; it just has no
    // dependencies and takes its name from its directory.
    let manifest = match PackageManifest::load_from_directory(&project_dir)? {
        Some(man) => man,
        None => {
            let name = project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "anonymous".to_string());
            PackageManifest {
                ident: PackageId::new(name.clone(), Version::new(0, 0, 0)),
                namespace: name,
                dependencies: vec![],
                test_driver: None,
            }
        }
    };

    let mut builder = Builder::new();
    builder.add(
        Sdist {
            manifest: manifest.clone(),
            path: project_dir,
        },
        SdistBuildParams {
            subdir: PathBuf::new(),
            build_apps: !args.no_apps,
            build_tests: !args.no_tests,
            enable_warnings: !args.no_warnings,
        },
    );

    if let Some(index) = &args.lm_index {
        builder.load_lm_index(index)?;
    } else if !manifest.dependencies.is_empty() {
        let catalog_path = args
            .catalog
            .clone()
            .unwrap_or_else(defaults::default_catalog_path);
        let cat = Catalog::open(&catalog_path)?;
        let repo_dir = args.repo_dir.clone().unwrap_or_else(defaults::default_repo_dir);

        with_repository(
            &repo_dir,
            RepoFlags::write().create_if_absent(),
            |repo| {
                let solution = repo.solve(&manifest.dependencies, &cat)?;
                materialize_solution(repo, &cat, &solution, |sd| {
                    let subdir =
                        PathBuf::from("_deps").join(sd.manifest.ident.to_string());
                    builder.add(
                        sd,
                        SdistBuildParams {
                            subdir,
                            ..Default::default()
                        },
                    );
                })
            },
        )?;
    }

    let summary = builder.build(&BuildParams {
        out_root: absolutize(&args.out),
        toolchain,
        parallel_jobs: args.jobs,
        emit_lmi: None,
    })?;

    log::info!(
        "Build complete: {} compiled, {} archived, {} linked",
        summary.compiles_run,
        summary.archives_run,
        summary.links_run
    );
    Ok(())
}
