//! # Repo Command Implementation
//!
//! `drover repo` manages the local repository of extracted source
//! distributions: initializing the directory and listing its contents
//! grouped by package name.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use drover::defaults;
use drover::repository::{with_repository, RepoFlags};

/// Manage the local package repository
#[derive(Args, Debug)]
pub struct RepoArgs {
    /// Path to the drover repository directory.
    #[arg(long, value_name = "DIR", env = "DROVER_REPO_DIR", global = true)]
    repo_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: RepoCommand,
}

#[derive(Subcommand, Debug)]
enum RepoCommand {
    /// List repository contents
    Ls,
    /// Initialize a directory as a repository
    Init,
}

impl RepoArgs {
    fn repo_dir(&self) -> PathBuf {
        self.repo_dir
            .clone()
            .unwrap_or_else(defaults::default_repo_dir)
    }

    /// A placeholder instance for CLI unit tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        RepoArgs {
            repo_dir: None,
            command: RepoCommand::Ls,
        }
    }
}

pub fn execute(args: RepoArgs) -> Result<()> {
    let dir = args.repo_dir();
    match args.command {
        RepoCommand::Ls => with_repository(&dir, RepoFlags::read(), |repo| {
            let all = repo.iter_sdists()?;
            let mut current_name: Option<&str> = None;
            for sd in &all {
                let name = sd.manifest.ident.name.as_str();
                if current_name != Some(name) {
                    println!("{name}:");
                    current_name = Some(name);
                }
                println!("  - {}", sd.manifest.ident.version);
            }
            Ok(())
        })
        .map_err(Into::into),
        RepoCommand::Init => {
            with_repository(&dir, RepoFlags::read().create_if_absent(), |_| Ok(()))?;
            log::info!("Initialized repository at {}", dir.display());
            Ok(())
        }
    }
}
