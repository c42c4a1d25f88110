//! ObservationScope for paired start/finish logging
//!
//! - `{NAME}_BEGIN` on creation
//! - `{NAME}_COMPLETE` or `{NAME}_FAILED` when finished explicitly
//! - `{NAME}_INCOMPLETE` when dropped unfinished (e.g. a cancelled future)

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs its own lifecycle.
///
/// Fields given at creation are repeated on every event of the scope, and
/// every finishing event carries `elapsed_ms`.
///
/// ```ignore
/// let scope = ObservationScope::new("EXECUTION", &[("execution_id", &id)]);
/// // ... do work ...
/// scope.complete(&[("rows", "12")]);
/// ```
pub struct ObservationScope {
    name: String,
    fields: Vec<(String, String)>,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    /// Start a scope and emit `<NAME>_BEGIN`
    pub fn new(name: &str, fields: &[(&str, &str)]) -> Self {
        let scope = Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
            finished: false,
        };
        Logger::info(&format!("{}_BEGIN", scope.name), &scope.field_refs(&[]));
        scope
    }

    /// Milliseconds since the scope was opened
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Emit `<NAME>_COMPLETE` with the elapsed time
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields = self.field_refs(extra);
        fields.push(("elapsed_ms", elapsed.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Emit `<NAME>_FAILED` with `reason` and the elapsed time
    pub fn fail(mut self, reason: &str, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields = self.field_refs(extra);
        fields.push(("elapsed_ms", elapsed.as_str()));
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn field_refs<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(extra.iter().copied())
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            let elapsed = self.elapsed_ms().to_string();
            let mut fields = self.field_refs(&[]);
            fields.push(("elapsed_ms", elapsed.as_str()));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
