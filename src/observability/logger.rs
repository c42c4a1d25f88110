//! Structured JSON logger
//!
//! - One line per event
//! - `event` and `severity` first, remaining keys sorted
//! - Synchronous, unbuffered, written to stderr so stdout stays free for
//!   command output

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde_json::Value;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace = 0,
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct Logger;

impl Logger {
    /// Write one JSON line to stderr. `event` and `severity` lead; the
    /// remaining keys are sorted.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Shorthand for [`Logger::log`] at `ERROR`
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let line = render(severity, event, fields);
        // Logging never fails the caller
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

/// Render one log line, newline included.
///
/// Later duplicates of a key win. `event` and `severity` cannot be
/// overridden by fields.
pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<&str, &str> = fields
        .iter()
        .filter(|(k, _)| *k != "event" && *k != "severity")
        .copied()
        .collect();

    let mut out = String::with_capacity(128);
    out.push_str("{\"event\":");
    out.push_str(&quote(event));
    out.push_str(",\"severity\":");
    out.push_str(&quote(severity.as_str()));
    for (key, value) in sorted {
        out.push(',');
        out.push_str(&quote(key));
        out.push(':');
        out.push_str(&quote(value));
    }
    out.push_str("}\n");
    out
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
