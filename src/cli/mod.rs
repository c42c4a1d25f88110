//! CLI module for sqlgate
//!
//! Diagnostic front end over the validator:
//! - validate: one request from stdin
//! - validate-batch: one request per stdin line
//! - explain: rewrite report for one request
//! - check-config: load and validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, explain, load_config, run, run_command, validate, validate_batch};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, read_requests, write_error, write_response};
