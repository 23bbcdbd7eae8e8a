// Seams to the collaborators around the rewrite engine.

use std::io::Write;
use std::path::Path;

use crate::domain::ast::AstNode;
use crate::domain::diagnostic::Finding;
use crate::error::Result;

/// Produces the generic tree for one translation unit.
pub trait TreeSource {
    fn load(&self, path: &Path) -> Result<AstNode>;
}

/// Writes the rewritten tree to the primary output.
pub trait TreePrinter {
    fn print(&self, tree: &AstNode, out: &mut dyn Write) -> std::io::Result<()>;
}

/// Receives findings while the safety scans run. `acquire` and `release`
/// bracket one checking phase.
pub trait DiagnosticSink {
    fn acquire(&mut self) {}
    fn emit(&mut self, finding: &Finding);
    fn release(&mut self) {}
}
