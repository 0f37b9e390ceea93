//! One module per `drover` subcommand (a clap `Args` struct plus an
//! `execute` function), and the handful of helpers the subcommands
//! share: toolchain resolution, catalog lookups with did-you-mean
//! hints, and materializing a resolver solution into the repository.

pub mod build;
pub mod build_deps;
pub mod catalog;
pub mod repo;
pub mod sdist;

use std::path::Path;

use anyhow::Result;

use drover::catalog::Catalog;
use drover::toolchain::Toolchain;
use drover::Error;

/// Resolve the `--toolchain` flag: an explicit argument, or the
/// default toolchain file, or `no_default_toolchain`.
pub(crate) fn resolve_toolchain(arg: &Option<String>) -> Result<Toolchain> {
    match arg {
        Some(s) => Ok(Toolchain::from_arg(s)?),
        None => Ok(Toolchain::get_default()?.ok_or(Error::NoDefaultToolchain)?),
    }
}

/// Fetch a package from the catalog, attaching a did-you-mean hint on
/// misses.
pub(crate) fn catalog_get(
    cat: &Catalog,
    id: &drover::ident::PackageId,
) -> drover::Result<drover::catalog::PackageInfo> {
    match cat.get(id)? {
        Some(info) => Ok(info),
        None => {
            let hint = drover::suggestions::sentence_suffix(cat.suggest(id));
            Err(Error::NoSuchCatalogPackage {
                ident: id.to_string(),
                hint,
            })
        }
    }
}

/// Materialize every package of `solution` into the repository (if
/// absent) and hand each installed sdist to `f`.
pub(crate) fn materialize_solution(
    repo: &mut drover::repository::Repository,
    cat: &Catalog,
    solution: &[drover::ident::PackageId],
    mut f: impl FnMut(drover::sdist::Sdist),
) -> drover::Result<()> {
    for pk in solution {
        if repo.find(pk)?.is_none() {
            log::info!("Download dependency: {pk}");
            let info = catalog_get(cat, pk)?;
            let tsd = drover::sdist::get_package_sdist(&info)?;
            repo.add_sdist(&tsd.sdist, drover::repository::IfExists::Fail)?;
        }
        if let Some(sd) = repo.find(pk)? {
            f(sd);
        }
    }
    Ok(())
}

/// Expand a possibly-relative directory into an absolute path without
/// requiring it to exist.
pub(crate) fn absolutize(path: &Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
