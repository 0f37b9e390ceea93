//! # Sdist Command Implementation
//!
//! `drover sdist` packages a project directory into a source
//! distribution, either at an explicit destination (`create`) or
//! straight into the local repository (`export`).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use drover::defaults;
use drover::repository::{with_repository, IfExists, RepoFlags};
use drover::sdist::{create_sdist, SdistParams};

use super::absolutize;

/// Work with source distributions
#[derive(Args, Debug)]
pub struct SdistArgs {
    #[command(subcommand)]
    command: SdistCommand,
}

#[derive(Subcommand, Debug)]
enum SdistCommand {
    /// Create a source distribution from a project directory
    Create {
        /// Path to the directory containing the project
        #[arg(short = 'p', long, value_name = "DIR", default_value = ".")]
        project: PathBuf,

        /// The destination of the source distribution
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,

        /// Forcibly replace an existing distribution
        #[arg(long)]
        replace: bool,
    },

    /// Export a source distribution into the local repository
    Export {
        /// Path to the directory containing the project
        #[arg(short = 'p', long, value_name = "DIR", default_value = ".")]
        project: PathBuf,

        /// Path to the drover repository directory
        #[arg(long, value_name = "DIR", env = "DROVER_REPO_DIR")]
        repo_dir: Option<PathBuf>,

        /// Replace an existing export in the repository
        #[arg(long)]
        replace: bool,
    },
}

pub fn execute(args: SdistArgs) -> Result<()> {
    match args.command {
        SdistCommand::Create {
            project,
            out,
            replace,
        } => {
            let dest = out.unwrap_or_else(|| PathBuf::from("project.sdist"));
            let sdist = create_sdist(&SdistParams {
                project_dir: absolutize(&project),
                dest_path: absolutize(&dest),
                force: replace,
            })?;
            log::info!(
                "Created source distribution for {} at {}",
                sdist.manifest.ident,
                sdist.path.display()
            );
            Ok(())
        }
        SdistCommand::Export {
            project,
            repo_dir,
            replace,
        } => {
            let staging = tempfile::TempDir::new()?;
            let sdist = create_sdist(&SdistParams {
                project_dir: absolutize(&project),
                dest_path: staging.path().join("sdist"),
                force: true,
            })?;

            let repo_dir = repo_dir.unwrap_or_else(defaults::default_repo_dir);
            with_repository(
                &repo_dir,
                RepoFlags::write().create_if_absent(),
                |repo| {
                    repo.add_sdist(
                        &sdist,
                        if replace {
                            IfExists::Replace
                        } else {
                            IfExists::Fail
                        },
                    )
                },
            )?;
            log::info!(
                "Exported {} to repository at {}",
                sdist.manifest.ident,
                repo_dir.display()
            );
            Ok(())
        }
    }
}
