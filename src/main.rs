//! `glyphc` entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    glyphc::cli::run_cli()
}
