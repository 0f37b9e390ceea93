//! # Dependency Resolution
//!
//! Given a set of root dependency declarations and a catalog, produce
//! a concrete assignment: one version per package name in the
//! transitive closure, with every declared range satisfied.
//!
//! The algorithm is a backtracking search with newest-first candidate
//! ordering. For each unresolved declaration we either check it
//! against the version already chosen for that name (intersecting the
//! accumulated range) or branch over the catalog's satisfying
//! versions, newest first. A conflict unwinds to the most recent
//! decision with remaining candidates. The closure graph is required
//! to be acyclic; a cycle aborts the search outright rather than
//! backtracking. The resolver never mutates the catalog.

use std::collections::{BTreeMap, VecDeque};

use semver::Version;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::ident::{Dependency, PackageId};
use crate::version::VersionRange;

#[derive(Clone)]
struct Choice {
    version: Version,
    accumulated: VersionRange,
}

enum Fail {
    /// A dead end that backtracking may escape.
    Conflict(String),
    /// An error that aborts the whole search (cycle, database failure).
    Fatal(Error),
}

type Pending = VecDeque<(Dependency, Vec<String>)>;

/// Resolve `roots` against `catalog`, returning the chosen package IDs
/// sorted by name.
pub fn solve(roots: &[Dependency], catalog: &Catalog) -> Result<Vec<PackageId>> {
    let queue: Pending = roots.iter().map(|d| (d.clone(), Vec::new())).collect();
    match step(queue, BTreeMap::new(), catalog) {
        Ok(chosen) => Ok(chosen
            .into_iter()
            .map(|(name, choice)| PackageId::new(name, choice.version))
            .collect()),
        Err(Fail::Conflict(message)) => Err(Error::DependencyResolveFailure { message }),
        Err(Fail::Fatal(e)) => Err(e),
    }
}

fn step(
    mut queue: Pending,
    mut chosen: BTreeMap<String, Choice>,
    catalog: &Catalog,
) -> std::result::Result<BTreeMap<String, Choice>, Fail> {
    while let Some((dep, path)) = queue.pop_front() {
        if let Some(pos) = path.iter().position(|n| *n == dep.name) {
            let mut names: Vec<&str> = path[pos..].iter().map(String::as_str).collect();
            names.push(&dep.name);
            return Err(Fail::Fatal(Error::DependencyCycle {
                cycle: names.join(" -> "),
            }));
        }

        if let Some(choice) = chosen.get_mut(&dep.name) {
            let merged = choice.accumulated.intersection(&dep.versions);
            if !merged.contains(&choice.version) {
                return Err(Fail::Conflict(format!(
                    "no version of '{}' satisfies the combined requirements \
                     (requirement '{}' conflicts with the already-chosen {}@{})",
                    dep.name, dep, dep.name, choice.version
                )));
            }
            choice.accumulated = merged;
            continue;
        }

        // A fresh name: branch over satisfying catalog versions,
        // newest first.
        let mut candidates: Vec<Version> = catalog
            .by_name(&dep.name)
            .map_err(Fail::Fatal)?
            .into_iter()
            .map(|id| id.version)
            .filter(|v| dep.versions.contains(v))
            .collect();
        candidates.sort();
        candidates.reverse();

        for cand in candidates {
            let cand_id = PackageId::new(dep.name.clone(), cand.clone());
            let cand_deps = catalog.dependencies_of(&cand_id).map_err(Fail::Fatal)?;

            let mut next_chosen = chosen.clone();
            next_chosen.insert(
                dep.name.clone(),
                Choice {
                    version: cand,
                    accumulated: dep.versions.clone(),
                },
            );

            let mut next_queue = queue.clone();
            let mut child_path = path.clone();
            child_path.push(dep.name.clone());
            for d in cand_deps {
                next_queue.push_back((d, child_path.clone()));
            }

            match step(next_queue, next_chosen, catalog) {
                Ok(done) => return Ok(done),
                Err(Fail::Conflict(_)) => continue,
                Err(fatal @ Fail::Fatal(_)) => return Err(fatal),
            }
        }

        return Err(Fail::Conflict(format!(
            "no version in the catalog satisfies the requirement '{dep}'"
        )));
    }
    Ok(chosen)
}
