//! # Catalog Command Implementation
//!
//! `drover catalog` manages the package catalog database: creating it,
//! importing JSON documents, adding single entries from the command
//! line, listing and showing entries, and materializing sdists from
//! catalog remotes.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use drover::catalog::{AutoLib, Catalog, PackageInfo, RemoteListing};
use drover::defaults;
use drover::ident::{Dependency, PackageId};
use drover::sdist::{copy_tree, get_package_sdist};
use drover::Error;

use super::{absolutize, catalog_get};

/// Manage the package catalog
#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    command: CatalogCommand,
}

#[derive(Args, Debug)]
struct CatalogPathArg {
    /// Override the path to the catalog database.
    #[arg(
        short = 'c',
        long = "catalog",
        value_name = "FILE",
        env = "DROVER_CATALOG"
    )]
    catalog: Option<PathBuf>,
}

impl CatalogPathArg {
    fn open(&self) -> Result<Catalog> {
        let path = self
            .catalog
            .clone()
            .unwrap_or_else(defaults::default_catalog_path);
        Ok(Catalog::open(&path)?)
    }
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Create a catalog database
    Create {
        #[command(flatten)]
        cat: CatalogPathArg,
    },

    /// Import entries into the catalog from JSON documents
    Import {
        #[command(flatten)]
        cat: CatalogPathArg,

        /// Import catalog entries from the given JSON files
        #[arg(short = 'j', long = "json", value_name = "FILE")]
        json: Vec<PathBuf>,

        /// Import a JSON document from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Obtain an sdist from a catalog listing
    Get {
        #[command(flatten)]
        cat: CatalogPathArg,

        /// The directory where the source distributions will be placed
        #[arg(short = 'o', long = "out-dir", value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,

        /// The package IDs to obtain
        #[arg(value_name = "PKG_ID", required = true)]
        requirements: Vec<String>,
    },

    /// Manually add an entry to the catalog database
    Add {
        #[command(flatten)]
        cat: CatalogPathArg,

        /// The name@version ID of the package to add
        #[arg(value_name = "PKG_ID")]
        pkg_id: String,

        /// The dependencies of this package (`name@range`, repeatable)
        #[arg(short = 'd', long = "depends", value_name = "DEP")]
        depends: Vec<String>,

        /// The Git url for the package
        #[arg(long, value_name = "URL")]
        git_url: Option<String>,

        /// The Git ref from which the source distribution should be created
        #[arg(long, value_name = "REF")]
        git_ref: Option<String>,

        /// Set the auto-library information (`namespace/name`) for
        /// remotes that carry no manifest
        #[arg(long, value_name = "NS/NAME")]
        auto_lib: Option<String>,

        /// A description of the package
        #[arg(long = "desc", value_name = "TEXT", default_value = "")]
        description: String,
    },

    /// List the contents of the catalog
    List {
        #[command(flatten)]
        cat: CatalogPathArg,

        /// Only list packages with the given name
        #[arg(short = 'n', long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Show information about a single package in the catalog
    Show {
        #[command(flatten)]
        cat: CatalogPathArg,

        /// A package identifier to show
        #[arg(value_name = "PKG_ID")]
        ident: String,
    },
}

pub fn execute(args: CatalogArgs) -> Result<()> {
    match args.command {
        CatalogCommand::Create { cat } => {
            // Simply opening the DB initializes the catalog.
            cat.open()?;
            log::info!("Catalog initialized");
            Ok(())
        }
        CatalogCommand::Import { cat, json, stdin } => import(cat, json, stdin),
        CatalogCommand::Get {
            cat,
            out_dir,
            requirements,
        } => get(cat, out_dir, requirements),
        CatalogCommand::Add {
            cat,
            pkg_id,
            depends,
            git_url,
            git_ref,
            auto_lib,
            description,
        } => add(cat, pkg_id, depends, git_url, git_ref, auto_lib, description),
        CatalogCommand::List { cat, name } => list(cat, name),
        CatalogCommand::Show { cat, ident } => show(cat, ident),
    }
}

fn import(cat: CatalogPathArg, json: Vec<PathBuf>, stdin: bool) -> Result<()> {
    let mut catalog = cat.open()?;
    for fpath in &json {
        let content = fs::read_to_string(fpath)
            .with_context(|| format!("failed to read {}", fpath.display()))?;
        catalog.import_json(&content)?;
        log::info!("Imported {}", fpath.display());
    }
    if stdin {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        catalog.import_json(&content)?;
        log::info!("Imported entries from stdin");
    }
    Ok(())
}

fn get(cat: CatalogPathArg, out_dir: PathBuf, requirements: Vec<String>) -> Result<()> {
    let catalog = cat.open()?;
    for req in &requirements {
        let id = PackageId::parse(req)?;
        let info = catalog_get(&catalog, &id)?;
        let tsd = get_package_sdist(&info)?;

        let dest = absolutize(&out_dir).join(id.to_string());
        log::info!("Create sdist at {}", dest.display());
        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        copy_tree(&tsd.sdist.path, &dest)?;
    }
    Ok(())
}

fn add(
    cat: CatalogPathArg,
    pkg_id: String,
    depends: Vec<String>,
    git_url: Option<String>,
    git_ref: Option<String>,
    auto_lib: Option<String>,
    description: String,
) -> Result<()> {
    let ident = PackageId::parse(&pkg_id)?;

    let deps = depends
        .iter()
        .map(|d| Dependency::parse_depends_string(d))
        .collect::<drover::Result<Vec<_>>>()?;

    let remote = match (git_url, git_ref) {
        (Some(url), Some(gitref)) => {
            let auto_lib = match &auto_lib {
                Some(s) => Some(AutoLib::parse(s).ok_or_else(|| {
                    anyhow::anyhow!("--auto-lib must be a 'namespace/name' pair, got '{s}'")
                })?),
                None => None,
            };
            RemoteListing::Git {
                url,
                gitref,
                auto_lib,
            }
        }
        (None, None) => {
            return Err(Error::NoCatalogRemoteInfo {
                what: ident.to_string(),
            }
            .into())
        }
        _ => return Err(Error::GitUrlRefMutualReq.into()),
    };

    let mut catalog = cat.open()?;
    catalog.store(&PackageInfo {
        ident: ident.clone(),
        deps,
        description,
        remote,
    })?;
    log::info!("Added {ident} to the catalog");
    Ok(())
}

fn list(cat: CatalogPathArg, name: Option<String>) -> Result<()> {
    let catalog = cat.open()?;
    let pkgs = match &name {
        Some(n) => catalog.by_name(n)?,
        None => catalog.all()?,
    };
    for pk in pkgs {
        println!("{pk}");
    }
    Ok(())
}

fn show(cat: CatalogPathArg, ident: String) -> Result<()> {
    let pk_id = PackageId::parse(&ident)?;
    let catalog = cat.open()?;
    let pkg = catalog_get(&catalog, &pk_id)?;

    println!("Name:     {}", pkg.ident.name);
    println!("Version:  {}", pkg.ident.version);
    for dep in &pkg.deps {
        println!("Depends:  {dep}");
    }
    let RemoteListing::Git {
        url,
        gitref,
        auto_lib,
    } = &pkg.remote;
    println!("Git URL:  {url}");
    println!("Git Ref:  {gitref}");
    if let Some(auto) = auto_lib {
        println!("Auto-lib: {auto}");
    }
    println!("Description:\n    {}", pkg.description);
    Ok(())
}
