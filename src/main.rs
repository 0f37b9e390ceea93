//! Binary entry point. All real behavior lives in the `drover`
//! library; this file only parses the CLI and forwards the exit code
//! that [`cli::Cli::run`] computed.

mod cli;
mod commands;

use clap::Parser;

fn main() {
    let code = cli::Cli::parse().run();
    std::process::exit(code);
}
