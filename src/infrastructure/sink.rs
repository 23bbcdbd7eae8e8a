use std::io::{self, StderrLock, Write};

use crate::domain::diagnostic::Finding;
use crate::ports::DiagnosticSink;

/// Writes one line per finding to standard error. Holds the stderr lock
/// between `acquire` and `release` so findings are not interleaved.
#[derive(Default)]
pub struct StderrSink {
    lock: Option<StderrLock<'static>>,
}

impl DiagnosticSink for StderrSink {
    fn acquire(&mut self) {
        self.lock = Some(io::stderr().lock());
    }

    fn emit(&mut self, finding: &Finding) {
        // Diagnostics have nowhere else to go if stderr is closed.
        let _ = match self.lock.as_mut() {
            Some(lock) => writeln!(lock, "{finding}"),
            None => writeln!(io::stderr(), "{finding}"),
        };
    }

    fn release(&mut self) {
        if let Some(mut lock) = self.lock.take() {
            let _ = lock.flush();
        }
    }
}

/// Keeps findings in memory, for library callers and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub findings: Vec<Finding>,
    pub released: bool,
}

impl DiagnosticSink for MemorySink {
    fn acquire(&mut self) {
        self.released = false;
    }

    fn emit(&mut self, finding: &Finding) {
        self.findings.push(finding.clone());
    }

    fn release(&mut self) {
        self.released = true;
    }
}
