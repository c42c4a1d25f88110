//! sqlgate CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors go to stderr
//! and exit non-zero.

use sqlgate::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
