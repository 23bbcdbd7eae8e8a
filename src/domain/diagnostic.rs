//! Findings and the scoped emitter that hands them to a sink.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::domain::span::SourceSpan;
use crate::ports::DiagnosticSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Suggestion,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Suggestion => write!(f, "suggestion"),
        }
    }
}

/// One reported result, already carrying its rendered location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// `file:line:column`
    pub location: String,
    pub message: String,
}

/// `<file>:<line>:<column>: <severity>: <message>`
impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Render a span's location record and strip it down to bare
/// `file:line:column`: the `loc(...)` wrapper and the quotes go.
pub fn location_text(span: &SourceSpan) -> String {
    let record = span.to_string();
    let inner = record
        .strip_prefix("loc(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(&record);
    inner.replace('"', "")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FindingSummary {
    pub warnings: usize,
    pub suggestions: usize,
}

impl FindingSummary {
    pub fn total(&self) -> usize {
        self.warnings + self.suggestions
    }
}

/// Holds the diagnostic sink for the duration of the safety scans. The sink
/// is acquired on construction and released when the emitter is dropped.
pub struct DiagnosticEmitter<'s> {
    sink: &'s mut dyn DiagnosticSink,
    summary: FindingSummary,
}

impl<'s> DiagnosticEmitter<'s> {
    pub fn acquire(sink: &'s mut dyn DiagnosticSink) -> Self {
        sink.acquire();
        debug!("diagnostic sink acquired");
        Self {
            sink,
            summary: FindingSummary::default(),
        }
    }

    pub fn emit(&mut self, severity: Severity, span: &SourceSpan, message: impl Into<String>) {
        match severity {
            Severity::Warning => self.summary.warnings += 1,
            Severity::Suggestion => self.summary.suggestions += 1,
        }
        let finding = Finding {
            severity,
            location: location_text(span),
            message: message.into(),
        };
        self.sink.emit(&finding);
    }

    pub fn summary(&self) -> FindingSummary {
        self.summary
    }
}

impl Drop for DiagnosticEmitter<'_> {
    fn drop(&mut self) {
        self.sink.release();
        debug!(
            warnings = self.summary.warnings,
            suggestions = self.summary.suggestions,
            "diagnostic sink released"
        );
    }
}
