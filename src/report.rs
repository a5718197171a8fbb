//! Per-invocation log and the Markdown report handed back to the host.

use crate::error::NodeError;

/// Ordered log lines for one invocation.
///
/// Every line is mirrored to `tracing` so hosts that capture stdout/stderr
/// still see progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "nanobanana", "{message}");
        self.lines.push(message);
    }

    /// Appends a line reporting a failure.
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "nanobanana", "{message}");
        self.lines.push(message);
    }

    /// Lines recorded so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns true if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Joins all lines with newlines.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// Renders the report for a successful run.
pub fn success_report(log: &RunLog) -> String {
    format!("## Success\n{}", log.joined())
}

/// Renders the report for a failed run: error heading, optional hint, log.
pub fn failure_report(error: &NodeError, log: &RunLog) -> String {
    let mut report = format!("## Error\n{}", error_message(error));
    if let Some((heading, body)) = error.hint() {
        report.push_str(&format!("\n\n## {heading}\n{body}"));
    }
    report.push_str(&format!("\n\n## Log\n{}", log.joined()));
    report
}

/// Human-facing description of an error, capitalized for the report.
pub fn error_message(error: &NodeError) -> String {
    let text = error.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_log_accumulates_in_order() {
        let mut log = RunLog::new();
        assert!(log.is_empty());
        log.push("one");
        log.push_error("two");
        assert_eq!(log.lines(), ["one", "two"]);
        assert_eq!(log.joined(), "one\ntwo");
    }

    #[test]
    fn test_success_report() {
        let mut log = RunLog::new();
        log.push("done");
        assert_eq!(success_report(&log), "## Success\ndone");
    }

    #[test]
    fn test_failure_report_with_hint() {
        let mut log = RunLog::new();
        log.push("sending");
        let report = failure_report(&NodeError::Timeout(Duration::from_secs(180)), &log);
        assert_eq!(
            report,
            "## Error\nRequest timed out (exceeded 180 seconds)\n\n## Suggestion\nTry a lower resolution (1K or 2K)\n\n## Log\nsending"
        );
    }

    #[test]
    fn test_failure_report_without_hint() {
        let report = failure_report(&NodeError::Decode("bad bytes".into()), &RunLog::new());
        assert!(report.starts_with("## Error\nFailed to decode image: bad bytes"));
        assert!(!report.contains("## Suggestion"));
        assert!(report.ends_with("## Log\n"));
    }
}
