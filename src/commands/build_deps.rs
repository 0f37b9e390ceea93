//! # Build-Deps Command Implementation
//!
//! `drover build-deps` resolves and builds a set of dependencies
//! without a consumer project, emitting a libman index that other
//! build systems can consume.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use drover::build::{BuildParams, Builder, SdistBuildParams};
use drover::catalog::Catalog;
use drover::defaults;
use drover::ident::Dependency;
use drover::manifest::DependencyManifest;
use drover::repository::{with_repository, RepoFlags};

use super::{absolutize, materialize_solution, resolve_toolchain};

/// Build a set of dependencies and emit a libman index
#[derive(Args, Debug)]
pub struct BuildDepsArgs {
    /// Path/identifier of the toolchain to use
    #[arg(short = 't', long, value_name = "TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Install dependencies from the named files (one `name@range` per
    /// line)
    #[arg(short = 'd', long = "deps", value_name = "FILE")]
    pub deps_files: Vec<PathBuf>,

    /// Dependencies to install (`name@range`)
    #[arg(value_name = "DEPENDENCY")]
    pub deps: Vec<String>,

    /// Directory where build results should be placed
    #[arg(short = 'o', long, value_name = "DIR", default_value = "_deps")]
    pub out: PathBuf,

    /// Path of the emitted libman index file
    #[arg(long, value_name = "PATH", default_value = "INDEX.lmi")]
    pub lmi_path: PathBuf,

    /// Set the number of parallel jobs when compiling files (0 = auto)
    #[arg(short = 'j', long, value_name = "N", default_value_t = 0)]
    pub jobs: i32,

    /// Override the path to the catalog database
    #[arg(short = 'c', long, value_name = "FILE", env = "DROVER_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Path to the drover repository directory
    #[arg(long, value_name = "DIR", env = "DROVER_REPO_DIR")]
    pub repo_dir: Option<PathBuf>,
}

pub fn execute(args: BuildDepsArgs) -> Result<()> {
    let toolchain = resolve_toolchain(&args.toolchain)?;

    let mut all_deps: Vec<Dependency> = Vec::new();
    for fpath in &args.deps_files {
        log::info!("Reading deps from {}", fpath.display());
        all_deps.extend(DependencyManifest::from_file(fpath)?.dependencies);
    }
    for dep_str in &args.deps {
        all_deps.push(Dependency::parse_depends_string(dep_str)?);
    }

    let catalog_path = args
        .catalog
        .clone()
        .unwrap_or_else(defaults::default_catalog_path);
    let cat = Catalog::open(&catalog_path)?;
    let repo_dir = args.repo_dir.clone().unwrap_or_else(defaults::default_repo_dir);

    let mut builder = Builder::new();
    with_repository(
        &repo_dir,
        RepoFlags::write().create_if_absent(),
        |repo| {
            log::info!("Loading {} dependencies", all_deps.len());
            let solution = repo.solve(&all_deps, &cat)?;
            materialize_solution(repo, &cat, &solution, |sd| {
                let id = sd.manifest.ident.to_string();
                log::info!("Dependency: {id}");
                builder.add(
                    sd,
                    SdistBuildParams {
                        subdir: PathBuf::from(id),
                        ..Default::default()
                    },
                );
            })
        },
    )?;

    builder.build(&BuildParams {
        out_root: absolutize(&args.out),
        toolchain,
        parallel_jobs: args.jobs,
        emit_lmi: Some(absolutize(&args.lmi_path)),
    })?;
    Ok(())
}
