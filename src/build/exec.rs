//! # Incremental Parallel Execution
//!
//! Runs a [`BuildPlan`] against the file-deps database. Compilations
//! form the parallel phase: a pool of OS worker threads pulls from a
//! mutex-guarded ready list, with up-to-date units filtered out first
//! by [`should_compile`]. The first failure in any worker stops the
//! dispatch; workers finish their in-flight task and exit. Discovered
//! header dependencies are buffered and committed in one transaction
//! after the phase. Archives and links then run sequentially per
//! library (they are fast, and an archive depends on many compiles),
//! each skipped when its output is already newer than every input.
//!
//! Cancellation is polled at task pick and between sequential steps;
//! it surfaces as `user_cancelled`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use crate::build::db::{mtime_nanos, FileDepsDb};
use crate::build::deps::{self, FileDepsInfo};
use crate::build::plan::{ArchivePlan, BuildPlan, CompilePlan, LinkPlan};
use crate::error::{Error, Result};
use crate::proc::{quote_command, run_proc};
use crate::signal;
use crate::toolchain::{DepsMode, Toolchain};

/// Counts of work units that actually ran (up-to-date units are not
/// included).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub compiles_run: usize,
    pub archives_run: usize,
    pub links_run: usize,
}

/// A compile plan with its concrete invocation computed.
struct RealizedCompile<'a> {
    plan: &'a CompilePlan,
    object_path: PathBuf,
    command: Vec<String>,
    command_str: String,
    depfile: Option<PathBuf>,
}

fn realize<'a>(plan: &'a CompilePlan, tc: &Toolchain, out_root: &Path) -> RealizedCompile<'a> {
    let cmd = plan.command(tc, out_root);
    RealizedCompile {
        plan,
        object_path: plan.object_path(out_root),
        command_str: quote_command(&cmd.command),
        command: cmd.command,
        depfile: cmd.gnu_depfile,
    }
}

/// Whether a compile unit must run: missing output, missing record,
/// changed inputs, or changed command.
fn should_compile(db: &FileDepsDb, rc: &RealizedCompile) -> Result<bool> {
    if !rc.object_path.exists() {
        return Ok(true);
    }
    let Some(info) = db.get_rebuild_info(&rc.object_path)? else {
        // No prior record for this output. Assume it is new.
        return Ok(true);
    };
    if !info.newer_inputs.is_empty() {
        log::debug!(
            "Recompiling {}: {} input(s) changed",
            rc.plan.rel_display,
            info.newer_inputs.len()
        );
        return Ok(true);
    }
    if info.previous_command != rc.command_str {
        log::debug!("Recompiling {}: the command changed", rc.plan.rel_display);
        return Ok(true);
    }
    Ok(false)
}

/// Run one compilation and collect its dependency information.
fn do_compile(
    rc: &RealizedCompile,
    tc: &Toolchain,
    counter: &AtomicUsize,
    total: usize,
) -> Result<Option<FileDepsInfo>> {
    if let Some(parent) = rc.object_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let msg = format!("[{}] Compile: {}", rc.plan.qualifier, rc.plan.rel_display);
    log::info!("{msg}");
    let start = Instant::now();
    let res = run_proc(&rc.command)?;
    let dur_ms = start.elapsed().as_millis();
    let nth = counter.fetch_add(1, Ordering::SeqCst);
    log::info!("{msg:<60} - {dur_ms:>7}ms [{nth}/{total}]");

    let res_okay = res.okay();
    let res_retc = res.retc;
    let mut compiler_output = res.output;
    let mut deps_info = None;

    match tc.deps_mode {
        DepsMode::Gnu => {
            let depfile = rc
                .depfile
                .as_ref()
                .expect("GNU deps mode always produces a depfile path");
            if !depfile.is_file() {
                log::error!(
                    "The expected Makefile deps were not generated on disk \
                     (expected file to exist: [{}])",
                    depfile.display()
                );
            } else if let Some(mut info) = deps::parse_mkfile_deps_file(depfile) {
                info.output = rc.object_path.clone();
                info.command = rc.command_str.clone();
                info.command_output = compiler_output.clone();
                deps_info = Some(info);
            }
        }
        DepsMode::Msvc => {
            let parsed = deps::parse_msvc_output_for_deps(&compiler_output, &tc.msvc_deps_prefix);
            compiler_output = parsed.cleaned_output;
            // Only store deps we actually parsed; an empty list would
            // silently break rebuilds of this output.
            if !parsed.inputs.is_empty() {
                let mut inputs = parsed.inputs;
                inputs.push(rc.plan.source_path.clone());
                deps_info = Some(FileDepsInfo {
                    output: rc.object_path.clone(),
                    command: rc.command_str.clone(),
                    command_output: compiler_output.clone(),
                    inputs,
                });
            }
        }
        DepsMode::None => {
            // No discovery; record the primary source so that edits to
            // it still invalidate the object.
            deps_info = Some(FileDepsInfo {
                output: rc.object_path.clone(),
                command: rc.command_str.clone(),
                command_output: compiler_output.clone(),
                inputs: vec![rc.plan.source_path.clone()],
            });
        }
    }

    // MSVC echoes the source file name as the first output line.
    if let Some(fname) = rc.plan.source_path.file_name().and_then(|f| f.to_str()) {
        if compiler_output.starts_with(fname) {
            compiler_output.drain(..fname.len());
            if compiler_output.starts_with('\r') {
                compiler_output.remove(0);
            }
            if compiler_output.starts_with('\n') {
                compiler_output.remove(0);
            }
        }
    }

    if !res_okay {
        log::error!("Compilation failed: {}", rc.plan.source_path.display());
        log::error!(
            "Subcommand FAILED [Exited {:?}]: {}\n{}",
            res_retc,
            rc.command_str,
            compiler_output
        );
        return Err(Error::CompileFailure {
            what: rc.plan.rel_display.clone(),
        });
    }

    if !compiler_output.trim().is_empty() {
        log::warn!(
            "While compiling file {} [{}]:\n{}",
            rc.plan.source_path.display(),
            rc.command_str,
            compiler_output
        );
    }

    Ok(deps_info)
}

fn compile_phase(
    plan: &BuildPlan,
    out_root: &Path,
    tc: &Toolchain,
    db: &mut FileDepsDb,
    jobs: i32,
) -> Result<usize> {
    let realized: Vec<RealizedCompile> = plan
        .compiles
        .iter()
        .map(|c| realize(c, tc, out_root))
        .collect();

    let mut todo = Vec::new();
    for rc in &realized {
        if should_compile(db, rc)? {
            todo.push(rc);
        }
    }

    let total = todo.len();
    if total == 0 {
        log::info!("All {} object files are up to date", realized.len());
        return Ok(0);
    }

    let n_jobs = if jobs < 1 {
        num_cpus::get() + 2
    } else {
        jobs as usize
    }
    .min(total);

    let counter = AtomicUsize::new(1);
    let next = Mutex::new(0usize);
    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());
    let new_deps: Mutex<Vec<FileDepsInfo>> = Mutex::new(Vec::new());

    thread::scope(|s| {
        for _ in 0..n_jobs {
            s.spawn(|| loop {
                let idx = {
                    let mut next = next.lock().expect("task queue lock poisoned");
                    if !errors.lock().expect("error list lock poisoned").is_empty() {
                        break;
                    }
                    if signal::is_cancelled() {
                        errors
                            .lock()
                            .expect("error list lock poisoned")
                            .push(Error::UserCancelled);
                        break;
                    }
                    if *next >= todo.len() {
                        break;
                    }
                    let idx = *next;
                    *next += 1;
                    idx
                };
                match do_compile(todo[idx], tc, &counter, total) {
                    Ok(Some(info)) => new_deps
                        .lock()
                        .expect("deps list lock poisoned")
                        .push(info),
                    Ok(None) => {}
                    Err(e) => {
                        errors.lock().expect("error list lock poisoned").push(e);
                        break;
                    }
                }
            });
        }
    });

    let errors = errors.into_inner().expect("error list lock poisoned");
    if !errors.is_empty() {
        for e in &errors {
            log::error!("{e}");
        }
        let cancelled = errors.iter().any(|e| matches!(e, Error::UserCancelled));
        let mut iter = errors.into_iter();
        return Err(if cancelled {
            Error::UserCancelled
        } else {
            iter.next().expect("at least one error was collected")
        });
    }

    if signal::is_cancelled() {
        return Err(Error::UserCancelled);
    }

    // All dependency updates land in one transaction; a failed compile
    // never reaches this point, so partial records cannot appear.
    let new_deps = new_deps.into_inner().expect("deps list lock poisoned");
    db.update_deps_batch(&new_deps)?;

    Ok(total)
}

fn up_to_date(output: &Path, inputs: &[PathBuf]) -> bool {
    let Some(out_mtime) = mtime_nanos(output) else {
        return false;
    };
    inputs
        .iter()
        .all(|inp| matches!(mtime_nanos(inp), Some(m) if m <= out_mtime))
}

fn run_archive(
    ar: &ArchivePlan,
    plan: &BuildPlan,
    out_root: &Path,
    tc: &Toolchain,
) -> Result<bool> {
    let objects: Vec<PathBuf> = ar
        .compile_idxs
        .iter()
        .map(|&i| plan.compiles[i].object_path(out_root))
        .collect();
    let out_path = ar.archive_path(out_root, tc);
    if up_to_date(&out_path, &objects) {
        return Ok(false);
    }

    let out_relpath = out_path
        .strip_prefix(out_root)
        .unwrap_or(&out_path)
        .display()
        .to_string();

    // Archiving tools disagree about pre-existing archives; uniform
    // pre-removal avoids partial updates.
    if out_path.exists() {
        fs::remove_file(&out_path)?;
    }
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let cmd = tc.create_archive_command(&objects, &out_path);
    log::info!("[{}] Archive: {}", ar.name, out_relpath);
    let start = Instant::now();
    let res = run_proc(&cmd)?;
    log::info!(
        "[{}] Archive: {} - {}ms",
        ar.name,
        out_relpath,
        start.elapsed().as_millis()
    );

    if !res.okay() {
        log::error!("Creating static library archive failed: {out_relpath}");
        log::error!("Subcommand FAILED: {}\n{}", quote_command(&cmd), res.output);
        return Err(Error::ArchiveFailure {
            what: out_relpath,
        });
    }
    Ok(true)
}

fn run_link(link: &LinkPlan, plan: &BuildPlan, out_root: &Path, tc: &Toolchain) -> Result<bool> {
    let mut inputs = vec![plan.compiles[link.compile_idx].object_path(out_root)];
    for &a in &link.archive_idxs {
        inputs.push(plan.archives[a].archive_path(out_root, tc));
    }
    inputs.extend(link.extra_inputs.iter().cloned());

    let out_path = link.exe_path(out_root, tc);
    if up_to_date(&out_path, &inputs) {
        return Ok(false);
    }

    let out_relpath = out_path
        .strip_prefix(out_root)
        .unwrap_or(&out_path)
        .display()
        .to_string();
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let cmd = tc.create_link_command(&inputs, &out_path);
    log::info!("[{}] Link: {}", link.qualifier, out_relpath);
    let start = Instant::now();
    let res = run_proc(&cmd)?;
    log::info!(
        "[{}] Link: {} - {}ms",
        link.qualifier,
        out_relpath,
        start.elapsed().as_millis()
    );

    if !res.okay() {
        log::error!("Linking executable failed: {out_relpath}");
        log::error!("Subcommand FAILED: {}\n{}", quote_command(&cmd), res.output);
        return Err(Error::LinkFailure {
            what: out_relpath,
        });
    }
    Ok(true)
}

/// Execute the plan: parallel compiles, then archives, then links.
pub fn execute(
    plan: &BuildPlan,
    out_root: &Path,
    tc: &Toolchain,
    db: &mut FileDepsDb,
    jobs: i32,
) -> Result<BuildSummary> {
    let mut summary = BuildSummary {
        compiles_run: compile_phase(plan, out_root, tc, db, jobs)?,
        ..Default::default()
    };

    for ar in &plan.archives {
        if signal::is_cancelled() {
            return Err(Error::UserCancelled);
        }
        if run_archive(ar, plan, out_root, tc)? {
            summary.archives_run += 1;
        }
    }

    for link in &plan.links {
        if signal::is_cancelled() {
            return Err(Error::UserCancelled);
        }
        if run_link(link, plan, out_root, tc)? {
            summary.links_run += 1;
        }
    }

    Ok(summary)
}
