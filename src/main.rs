#![forbid(unsafe_code)]

//! mai-data — PR corpus data utilities CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("mai-data: {e}");
        std::process::exit(e.exit_code());
    }
}
