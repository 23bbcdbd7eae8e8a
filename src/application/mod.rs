// Use case orchestration for Kernelize.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::ast::AstNode;
use crate::domain::diagnostic::{DiagnosticEmitter, FindingSummary};
use crate::domain::matchers::MatcherSet;
use crate::domain::rewrite::{rewrite, RewriteStats};
use crate::domain::safety::{self, CheckOptions};
use crate::ports::{DiagnosticSink, TreePrinter, TreeSource};

/// Outcome of one run over one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rewrite: RewriteStats,
    pub findings: FindingSummary,
    pub nodes_before: usize,
    pub nodes_after: usize,
}

pub struct KernelizeUsecase<'a> {
    pub source: &'a dyn TreeSource,
    /// `None` prints nothing on the primary output.
    pub printer: Option<&'a dyn TreePrinter>,
    pub matchers: &'a MatcherSet,
    pub checks: CheckOptions,
}

impl<'a> KernelizeUsecase<'a> {
    /// Ingest `input`, rewrite it, check it, then print it to `out`.
    /// Only ingestion and output failures are errors.
    pub fn run(
        &self,
        input: &Path,
        out: &mut dyn Write,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<RunSummary> {
        let mut tree = self
            .source
            .load(input)
            .with_context(|| format!("failed to ingest {}", input.display()))?;
        let summary = self.process(&mut tree, sink);
        if let Some(printer) = self.printer {
            printer
                .print(&tree, out)
                .context("failed to write the rewritten tree")?;
        }
        Ok(summary)
    }

    /// Rewrite and check an already ingested tree in place.
    pub fn process(&self, tree: &mut AstNode, sink: &mut dyn DiagnosticSink) -> RunSummary {
        let nodes_before = tree.count();
        let rewrite = rewrite(tree, self.matchers);
        let findings = {
            let mut emitter = DiagnosticEmitter::acquire(sink);
            safety::check(tree, &self.checks, &mut emitter);
            emitter.summary()
        };
        let summary = RunSummary {
            rewrite,
            findings,
            nodes_before,
            nodes_after: tree.count(),
        };
        info!(
            rewritten = summary.rewrite.rewritten(),
            sections = summary.rewrite.sections,
            warnings = summary.findings.warnings,
            suggestions = summary.findings.suggestions,
            "translation unit processed"
        );
        summary
    }
}
