//! JSON I/O handling for the CLI
//!
//! - Input: one JSON request object per line
//! - Output: one JSON response object per line
//! - UTF-8 only

use std::io::{BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::validator::RawQueryRequest;

/// Read one request line
pub fn read_request<R: BufRead>(reader: &mut R) -> CliResult<RawQueryRequest> {
    let mut line = String::new();
    reader.read_line(&mut line)?;

    if line.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    parse_request(&line)
}

/// Parse every non-blank line; each item is the parse outcome for that line
pub fn read_requests<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<RawQueryRequest>> {
    reader
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| parse_request(&line?))
}

fn parse_request(line: &str) -> CliResult<RawQueryRequest> {
    serde_json::from_str(line).map_err(CliError::from)
}

/// Write `data` as one JSON line
pub fn write_response<W: Write>(writer: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_line(writer, &response)
}

/// Write an error object (`status`, `code`, `message`) as one JSON line
pub fn write_error<W: Write>(writer: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_line(writer, &response)
}

fn write_line<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
