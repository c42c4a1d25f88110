//! CLI command implementations
//!
//! Commands read requests from a reader and write one JSON response per
//! request to a writer. A rejected statement is a normal response, not a
//! CLI failure.

use std::io::{self, BufRead, Write};
use std::path::Path;

use serde_json::json;

use crate::config::GateConfig;
use crate::observability::Logger;
use crate::validator::QueryValidator;

use super::args::{Cli, Command};
use super::errors::CliResult;
use super::io::{read_request, read_requests, write_error, write_response};

/// Parse arguments and run the selected command against stdin/stdout
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Dispatch a parsed command over stdin and stdout
pub fn run_command(cmd: Command) -> CliResult<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    match cmd {
        Command::Validate { config } => {
            validate(&load_config(config.as_deref())?, &mut input, &mut output)
        }
        Command::ValidateBatch { config } => {
            validate_batch(&load_config(config.as_deref())?, input, &mut output)
        }
        Command::Explain { config, text } => {
            explain(&load_config(config.as_deref())?, text, &mut input, &mut output)
        }
        Command::CheckConfig { config } => check_config(&config, &mut output),
    }
}

/// Load the config file, or defaults when no path was given
pub fn load_config(path: Option<&Path>) -> CliResult<GateConfig> {
    match path {
        Some(path) => {
            let config = GateConfig::load(path)?;
            let shown = path.display().to_string();
            Logger::info("CONFIG_LOADED", &[("path", shown.as_str())]);
            Ok(config)
        }
        None => Ok(GateConfig::default()),
    }
}

/// Validate one JSON request from `input` and write the approved query or
/// the rejection to `output`
pub fn validate<R: BufRead, W: Write>(
    config: &GateConfig,
    input: &mut R,
    output: &mut W,
) -> CliResult<()> {
    let validator = QueryValidator::new(config.grammar.clone())?;
    let request = read_request(input)?;

    match validator.validate_request(&request) {
        Ok(approved) => write_response(output, serde_json::to_value(&approved)?),
        Err(err) => write_error(output, err.code().code(), &err.to_string()),
    }
}

/// Validate one request per line. Unparseable lines get an error response
/// and processing continues.
pub fn validate_batch<R: BufRead, W: Write>(
    config: &GateConfig,
    input: R,
    output: &mut W,
) -> CliResult<()> {
    let validator = QueryValidator::new(config.grammar.clone())?;
    let mut total = 0usize;
    let mut accepted = 0usize;

    for request in read_requests(input) {
        total += 1;
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_error(output, err.code_str(), err.message())?;
                continue;
            }
        };
        match validator.validate_request(&request) {
            Ok(approved) => {
                accepted += 1;
                write_response(output, serde_json::to_value(&approved)?)?;
            }
            Err(err) => write_error(output, err.code().code(), &err.to_string())?,
        }
    }

    let accepted = accepted.to_string();
    let total = total.to_string();
    Logger::info(
        "BATCH_COMPLETE",
        &[("accepted", accepted.as_str()), ("total", total.as_str())],
    );
    Ok(())
}

/// Explain one request, as JSON or as the text report
pub fn explain<R: BufRead, W: Write>(
    config: &GateConfig,
    text: bool,
    input: &mut R,
    output: &mut W,
) -> CliResult<()> {
    let validator = QueryValidator::new(config.grammar.clone())?;
    let request = read_request(input)?;
    let explanation = validator.explain(&request.text, &request.tenant_id);

    if text {
        write!(output, "{}", explanation)?;
        output.flush()?;
        Ok(())
    } else {
        write_response(output, serde_json::to_value(&explanation)?)
    }
}

/// Load and validate a config file, echoing the effective configuration
pub fn check_config<W: Write>(path: &Path, output: &mut W) -> CliResult<()> {
    let config = GateConfig::load(path)?;
    write_response(
        output,
        json!({
            "path": path.display().to_string(),
            "config": serde_json::to_value(&config)?,
        }),
    )
}
