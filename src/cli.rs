//! Top-level CLI definition and dispatch for the `drover` binary.
//!
//! Everything user-facing funnels through here: clap parses the
//! argument tree, the logger is configured from the global output
//! flags, and each subcommand's result is translated into a process
//! exit code (0 success, 1 user error, 2 cancelled/internal).
//!
//! Log output doubles as drover's build progress display (the
//! `[lib] Compile: ...` lines come through `log::info!`), so the
//! verbosity flags are defined in terms of what a build shows:
//! `--quiet` reduces a build to its failures, the default shows
//! progress, `-v` adds the executor's staleness decisions, and `-vv`
//! turns on full tracing.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use drover::exit_codes;

use crate::commands;

/// Drover - source-based package management and incremental native builds
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(
    version,
    about,
    long_about = "Drover - fetch native library sources, resolve versions, and drive \
                  incremental parallel builds"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// When to colorize output
    #[arg(long, global = true, value_enum, value_name = "WHEN", default_value = "auto")]
    color: ColorWhen,

    /// Least severe log level to print
    #[arg(long, global = true, value_enum, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Show more detail (-v: rebuild decisions, -vv: full tracing)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only print failures
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

/// Valid answers to `--color`; clap rejects anything else at parse
/// time.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ColorWhen {
    Auto,
    Always,
    Never,
}

/// Valid answers to `--log-level`. There is deliberately no `off`:
/// even scripted callers should see failures, and `--quiet` already
/// narrows output to exactly those.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a project together with its resolved dependencies
    Build(commands::build::BuildArgs),

    /// Build a set of dependencies and emit a libman index
    BuildDeps(commands::build_deps::BuildDepsArgs),

    /// Work with source distributions
    Sdist(commands::sdist::SdistArgs),

    /// Manage the local package repository
    Repo(commands::repo::RepoArgs),

    /// Manage the package catalog
    Catalog(commands::catalog::CatalogArgs),
}

impl Cli {
    /// Run the parsed CLI command and produce the process exit code.
    pub fn run(self) -> i32 {
        self.init_logger();
        drover::signal::install();

        match self.execute() {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => exit_code_for(&e),
        }
    }

    fn execute(self) -> Result<()> {
        match self.command {
            Commands::Build(args) => commands::build::execute(args),
            Commands::BuildDeps(args) => commands::build_deps::execute(args),
            Commands::Sdist(args) => commands::sdist::execute(args),
            Commands::Repo(args) => commands::repo::execute(args),
            Commands::Catalog(args) => commands::catalog::execute(args),
        }
    }

    /// Configure the logger that carries both diagnostics and build
    /// progress. Progress lines stay bare: no timestamps, no module
    /// paths, just the message. The output flags are authoritative;
    /// `RUST_LOG` is intentionally not consulted.
    fn init_logger(&self) {
        env_logger::Builder::new()
            .filter_level(self.log_filter())
            .write_style(self.write_style())
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    /// The effective filter once `--quiet`/`-v` are folded into
    /// `--log-level`. Quietness always wins; otherwise each `-v` step
    /// widens the filter, never narrowing what `--log-level` asked
    /// for.
    fn log_filter(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        let base: LevelFilter = self.log_level.into();
        let stepped = match self.verbose {
            0 => base,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        base.max(stepped)
    }

    fn write_style(&self) -> env_logger::WriteStyle {
        match self.color {
            ColorWhen::Always => env_logger::WriteStyle::Always,
            ColorWhen::Never => env_logger::WriteStyle::Never,
            // Logs (and compile progress) go to stderr, so probe that
            // stream rather than stdout.
            ColorWhen::Auto => {
                if console::Term::stderr().features().colors_supported() {
                    env_logger::WriteStyle::Auto
                } else {
                    env_logger::WriteStyle::Never
                }
            }
        }
    }
}

/// Map an error onto the process exit code, printing the summary, the
/// explanation, and the stable reference for drover's own error kinds.
fn exit_code_for(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<drover::Error>() {
        Some(drover::Error::UserCancelled) => {
            log::error!("Operation cancelled by user");
            exit_codes::INTERNAL
        }
        Some(err) => {
            log::error!("{err}");
            log::error!("{}", err.explanation());
            log::error!("refer: {}", err.id());
            exit_codes::USER_ERROR
        }
        None => {
            log::error!("{e:#}");
            exit_codes::INTERNAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(log_level: LogLevel, verbose: u8, quiet: bool) -> Cli {
        Cli {
            command: Commands::Repo(commands::repo::RepoArgs::for_tests()),
            color: ColorWhen::Auto,
            log_level,
            verbose,
            quiet,
        }
    }

    #[test]
    fn test_log_filter_follows_log_level() {
        assert_eq!(
            cli_with(LogLevel::Warn, 0, false).log_filter(),
            LevelFilter::Warn
        );
        assert_eq!(
            cli_with(LogLevel::Trace, 0, false).log_filter(),
            LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_filter_verbose_steps() {
        assert_eq!(
            cli_with(LogLevel::Info, 1, false).log_filter(),
            LevelFilter::Debug
        );
        assert_eq!(
            cli_with(LogLevel::Info, 2, false).log_filter(),
            LevelFilter::Trace
        );
        // A single -v never narrows an already-wide --log-level.
        assert_eq!(
            cli_with(LogLevel::Trace, 1, false).log_filter(),
            LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_filter_quiet_wins() {
        assert_eq!(
            cli_with(LogLevel::Debug, 0, true).log_filter(),
            LevelFilter::Error
        );
    }

    #[test]
    fn test_explicit_color_choices() {
        let mut cli = cli_with(LogLevel::Info, 0, false);
        cli.color = ColorWhen::Always;
        assert!(matches!(cli.write_style(), env_logger::WriteStyle::Always));
        cli.color = ColorWhen::Never;
        assert!(matches!(cli.write_style(), env_logger::WriteStyle::Never));
    }

    #[test]
    fn test_exit_code_mapping() {
        let cancelled = anyhow::Error::from(drover::Error::UserCancelled);
        assert_eq!(exit_code_for(&cancelled), exit_codes::INTERNAL);

        let user = anyhow::Error::from(drover::Error::CatalogTooNew);
        assert_eq!(exit_code_for(&user), exit_codes::USER_ERROR);

        let unexpected = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&unexpected), exit_codes::INTERNAL);
    }
}
