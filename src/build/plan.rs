//! # Build Planning
//!
//! Translates a set of source distributions plus per-sdist build
//! parameters into a DAG of compile, archive, and link work units.
//! Nodes live in flat arenas on [`BuildPlan`] and reference each other
//! by index; the only edges are artifact edges (an archive consumes
//! the objects of its compiles, a link consumes objects and archives).
//!
//! The planner computes everything the executor will need - object
//! paths, include closures, link order - but never runs anything and
//! never touches the output tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::libman;
use crate::manifest::TestDriver;
use crate::sdist::Sdist;
use crate::source::{self, SourceKind};
use crate::toolchain::{CompileCommand, CompileSpec, Toolchain};

/// Per-sdist build parameters.
#[derive(Debug, Clone, Default)]
pub struct SdistBuildParams {
    /// Subdirectory of the output root this sdist's artifacts land in
    /// (empty for the consumer project, `_deps/<id>` for dependencies).
    pub subdir: PathBuf,
    pub build_apps: bool,
    pub build_tests: bool,
    pub enable_warnings: bool,
}

/// One compilation work unit.
#[derive(Debug, Clone)]
pub struct CompilePlan {
    /// Absolute path of the translation unit.
    pub source_path: PathBuf,
    /// Short path shown in logs.
    pub rel_display: String,
    /// Library name used as the `[qualifier]` log prefix.
    pub qualifier: String,
    pub include_dirs: Vec<PathBuf>,
    pub definitions: Vec<String>,
    pub enable_warnings: bool,
    /// Object path relative to the output root.
    pub obj_rel: PathBuf,
}

impl CompilePlan {
    pub fn object_path(&self, out_root: &Path) -> PathBuf {
        out_root.join(&self.obj_rel)
    }

    pub fn command(&self, tc: &Toolchain, out_root: &Path) -> CompileCommand {
        tc.create_compile_command(&CompileSpec {
            source_path: &self.source_path,
            out_path: &self.object_path(out_root),
            include_dirs: &self.include_dirs,
            definitions: &self.definitions,
            enable_warnings: self.enable_warnings,
        })
    }
}

/// One static-archive work unit, consuming the objects of its compile
/// nodes.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    pub name: String,
    pub subdir: PathBuf,
    /// Indices into [`BuildPlan::compiles`].
    pub compile_idxs: Vec<usize>,
}

impl ArchivePlan {
    pub fn archive_path(&self, out_root: &Path, tc: &Toolchain) -> PathBuf {
        out_root
            .join(&self.subdir)
            .join(format!("lib{}{}", self.name, tc.archive_suffix))
    }
}

/// One executable-link work unit.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    /// Executable name (the entry-point stem without `.main`/`.test`).
    pub name: String,
    /// Library the executable belongs to; used as the log qualifier.
    pub qualifier: String,
    pub subdir: PathBuf,
    /// Index of the entry point's compile node.
    pub compile_idx: usize,
    /// Archives to link, topologically ordered: each library appears
    /// after every library that depends on it.
    pub archive_idxs: Vec<usize>,
    /// Pre-built archives from an external libman index.
    pub extra_inputs: Vec<PathBuf>,
}

impl LinkPlan {
    pub fn exe_path(&self, out_root: &Path, tc: &Toolchain) -> PathBuf {
        out_root
            .join(&self.subdir)
            .join(format!("{}{}", self.name, tc.exe_suffix))
    }
}

/// The complete work-unit DAG for one build.
#[derive(Debug, Default)]
pub struct BuildPlan {
    pub compiles: Vec<CompilePlan>,
    pub archives: Vec<ArchivePlan>,
    pub links: Vec<LinkPlan>,
    /// Library records for libman index emission, one per archived
    /// library, in topological order.
    pub libman: Vec<libman::Library>,
    /// When set, the planner expects a generated Catch `main()` source
    /// at this path; the build driver writes it before execution.
    pub catch_main_source: Option<PathBuf>,
}

const CATCH_MAIN_SUBDIR: &str = "_test_driver";
const CATCH_MAIN_LIB: &str = "drover-catch-main";

/// Hash suffix that keeps same-stem sources from colliding in the flat
/// object directory.
fn path_hash(rel: &Path) -> String {
    let digest = Sha256::digest(rel.to_string_lossy().as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

fn exe_stem(source: &Path) -> String {
    // `tool.main.cpp` -> stem `tool.main` -> stem `tool`
    let stem = source.file_stem().map(Path::new).unwrap_or(source);
    stem.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| stem.to_string_lossy().into_owned())
}

fn push_unique(into: &mut Vec<PathBuf>, item: PathBuf) {
    if !into.contains(&item) {
        into.push(item);
    }
}

struct EntryCtx<'a> {
    sdist: &'a Sdist,
    params: &'a SdistBuildParams,
    dep_idxs: Vec<usize>,
    /// Deps satisfied by the external index (qualified names).
    external_uses: Vec<String>,
}

/// Build the work-unit DAG for `entries` (each an sdist plus its build
/// parameters), with `externals` naming pre-built libraries from an
/// existing libman index.
pub fn create_plan(
    entries: &[(Sdist, SdistBuildParams)],
    externals: &[libman::Library],
    tc: &Toolchain,
    out_root: &Path,
) -> Result<BuildPlan> {
    let by_name: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, (sd, _))| (sd.manifest.ident.name.as_str(), i))
        .collect();

    // Resolve dependency edges between the entries; anything not in
    // the build must be covered by the external index.
    let mut ctxs: Vec<EntryCtx> = Vec::with_capacity(entries.len());
    for (sd, params) in entries {
        let mut dep_idxs = Vec::new();
        let mut external_uses = Vec::new();
        for dep in &sd.manifest.dependencies {
            if let Some(&idx) = by_name.get(dep.name.as_str()) {
                dep_idxs.push(idx);
                continue;
            }
            let external = externals.iter().find(|e| {
                e.qualified_name == dep.name
                    || e.qualified_name
                        .rsplit_once('/')
                        .is_some_and(|(_, n)| n == dep.name)
            });
            match external {
                Some(e) => external_uses.push(e.qualified_name.clone()),
                None => {
                    return Err(Error::DependencyResolveFailure {
                        message: format!(
                            "'{}' depends on '{}', which is not part of this build",
                            sd.manifest.ident, dep.name
                        ),
                    })
                }
            }
        }
        ctxs.push(EntryCtx {
            sdist: sd,
            params,
            dep_idxs,
            external_uses,
        });
    }

    let topo = topo_order(&ctxs)?;

    // Export include dirs: the public include/ tree when present,
    // otherwise src/.
    let exports: Vec<PathBuf> = ctxs
        .iter()
        .map(|c| {
            let inc = c.sdist.path.join("include");
            if inc.is_dir() {
                inc
            } else {
                c.sdist.path.join("src")
            }
        })
        .collect();

    // Transitive export closure, computed dependencies-first.
    let mut trans_exports: Vec<Vec<PathBuf>> = vec![Vec::new(); ctxs.len()];
    for &i in &topo {
        let mut acc = vec![exports[i].clone()];
        for &d in &ctxs[i].dep_idxs {
            for p in &trans_exports[d] {
                push_unique(&mut acc, p.clone());
            }
        }
        trans_exports[i] = acc;
    }

    let external_includes: Vec<PathBuf> = externals
        .iter()
        .flat_map(|e| e.include_paths.iter().cloned())
        .collect();

    let mut plan = BuildPlan::default();
    let mut archive_of: Vec<Option<usize>> = vec![None; ctxs.len()];
    let mut needs_catch_main = false;
    // Link nodes that must also consume the generated driver archive.
    let mut driver_links: Vec<usize> = Vec::new();

    for &i in &topo {
        let ctx = &ctxs[i];
        let name = ctx.sdist.manifest.ident.name.clone();
        let src_root = ctx.sdist.path.join("src");

        let mut include_dirs: Vec<PathBuf> = Vec::new();
        if src_root.is_dir() {
            push_unique(&mut include_dirs, src_root.clone());
        }
        for p in &trans_exports[i] {
            push_unique(&mut include_dirs, p.clone());
        }
        for p in &external_includes {
            push_unique(&mut include_dirs, p.clone());
        }

        let sources = source::collect_sources(&src_root)?;

        let compile_for = |plan: &mut BuildPlan, source_path: &Path| -> usize {
            let rel = source_path
                .strip_prefix(&ctx.sdist.path)
                .unwrap_or(source_path);
            let stem = source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let obj_rel = ctx.params.subdir.join("obj").join(format!(
                "{stem}.{}{}",
                path_hash(rel),
                tc.object_suffix
            ));
            plan.compiles.push(CompilePlan {
                source_path: source_path.to_path_buf(),
                rel_display: rel.display().to_string(),
                qualifier: name.clone(),
                include_dirs: include_dirs.clone(),
                definitions: Vec::new(),
                enable_warnings: ctx.params.enable_warnings,
                obj_rel,
            });
            plan.compiles.len() - 1
        };

        // Library objects and archive.
        let lib_compiles: Vec<usize> = sources
            .iter()
            .filter(|f| f.kind == SourceKind::Source)
            .map(|f| compile_for(&mut plan, &f.path))
            .collect();
        if !lib_compiles.is_empty() {
            plan.archives.push(ArchivePlan {
                name: name.clone(),
                subdir: ctx.params.subdir.clone(),
                compile_idxs: lib_compiles,
            });
            archive_of[i] = Some(plan.archives.len() - 1);
        }

        // Archives for a link: own library plus the transitive dep
        // closure, dependents before dependencies.
        let link_archives = |archive_of: &[Option<usize>]| -> Vec<usize> {
            let mut closure = vec![false; ctxs.len()];
            let mut stack = vec![i];
            while let Some(n) = stack.pop() {
                if closure[n] {
                    continue;
                }
                closure[n] = true;
                stack.extend(ctxs[n].dep_idxs.iter().copied());
            }
            topo.iter()
                .rev()
                .filter(|&&n| closure[n])
                .filter_map(|&n| archive_of[n])
                .collect()
        };

        let external_archives: Vec<PathBuf> =
            externals.iter().map(|e| e.path.clone()).collect();

        if ctx.params.build_apps {
            for f in sources.iter().filter(|f| f.kind == SourceKind::App) {
                let compile_idx = compile_for(&mut plan, &f.path);
                plan.links.push(LinkPlan {
                    name: exe_stem(&f.path),
                    qualifier: name.clone(),
                    subdir: ctx.params.subdir.clone(),
                    compile_idx,
                    archive_idxs: link_archives(&archive_of),
                    extra_inputs: external_archives.clone(),
                });
            }
        }

        if ctx.params.build_tests {
            for f in sources.iter().filter(|f| f.kind == SourceKind::Test) {
                let compile_idx = compile_for(&mut plan, &f.path);
                plan.links.push(LinkPlan {
                    name: exe_stem(&f.path),
                    qualifier: name.clone(),
                    subdir: ctx.params.subdir.join("test"),
                    compile_idx,
                    archive_idxs: link_archives(&archive_of),
                    extra_inputs: external_archives.clone(),
                });
                if ctx.sdist.manifest.test_driver == Some(TestDriver::CatchMain) {
                    needs_catch_main = true;
                    driver_links.push(plan.links.len() - 1);
                }
            }
        }

        // libman record for downstream consumers.
        if let Some(aidx) = archive_of[i] {
            let mut uses: Vec<String> = ctx
                .dep_idxs
                .iter()
                .map(|&d| {
                    format!(
                        "{}/{}",
                        ctxs[d].sdist.manifest.namespace, ctxs[d].sdist.manifest.ident.name
                    )
                })
                .collect();
            uses.extend(ctx.external_uses.iter().cloned());
            plan.libman.push(libman::Library {
                qualified_name: format!("{}/{}", ctx.sdist.manifest.namespace, name),
                path: plan.archives[aidx].archive_path(out_root, tc),
                include_paths: vec![exports[i].clone()],
                uses,
            });
        }
    }

    // The generated Catch main() driver: one compile + one archive,
    // consumed by every Catch-Main test link.
    if needs_catch_main {
        let driver_source = out_root.join(CATCH_MAIN_SUBDIR).join("catch_main.cpp");
        let obj_rel = Path::new(CATCH_MAIN_SUBDIR).join("obj").join(format!(
            "catch_main.{}{}",
            path_hash(Path::new("catch_main.cpp")),
            tc.object_suffix
        ));
        let mut driver_includes: Vec<PathBuf> = Vec::new();
        for exps in &trans_exports {
            for p in exps {
                push_unique(&mut driver_includes, p.clone());
            }
        }
        for p in &external_includes {
            push_unique(&mut driver_includes, p.clone());
        }
        plan.compiles.push(CompilePlan {
            source_path: driver_source.clone(),
            rel_display: "catch_main.cpp".to_string(),
            qualifier: CATCH_MAIN_LIB.to_string(),
            include_dirs: driver_includes,
            definitions: Vec::new(),
            enable_warnings: false,
            obj_rel,
        });
        plan.archives.push(ArchivePlan {
            name: CATCH_MAIN_LIB.to_string(),
            subdir: PathBuf::from(CATCH_MAIN_SUBDIR),
            compile_idxs: vec![plan.compiles.len() - 1],
        });
        let driver_archive = plan.archives.len() - 1;
        for lidx in driver_links {
            plan.links[lidx].archive_idxs.push(driver_archive);
        }
        plan.catch_main_source = Some(driver_source);
    }

    Ok(plan)
}

/// Dependencies-first topological order over the entries.
fn topo_order(ctxs: &[EntryCtx]) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Gray,
        Black,
    }
    fn visit(
        n: usize,
        ctxs: &[EntryCtx],
        marks: &mut [Mark],
        order: &mut Vec<usize>,
        path: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[n] {
            Mark::Black => return Ok(()),
            Mark::Gray => {
                let pos = path.iter().position(|&p| p == n).unwrap_or(0);
                let mut names: Vec<&str> = path[pos..]
                    .iter()
                    .map(|&p| ctxs[p].sdist.manifest.ident.name.as_str())
                    .collect();
                names.push(ctxs[n].sdist.manifest.ident.name.as_str());
                return Err(Error::DependencyCycle {
                    cycle: names.join(" -> "),
                });
            }
            Mark::White => {}
        }
        marks[n] = Mark::Gray;
        path.push(n);
        for &d in &ctxs[n].dep_idxs {
            visit(d, ctxs, marks, order, path)?;
        }
        path.pop();
        marks[n] = Mark::Black;
        order.push(n);
        Ok(())
    }

    let mut marks = vec![Mark::White; ctxs.len()];
    let mut order = Vec::with_capacity(ctxs.len());
    let mut path = Vec::new();
    for n in 0..ctxs.len() {
        visit(n, ctxs, &mut marks, &mut order, &mut path)?;
    }
    Ok(order)
}
