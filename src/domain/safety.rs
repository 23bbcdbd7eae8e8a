//! RCU safety checker.
//!
//! Two read-only scans over the rewritten tree. The first reports pointer
//! operations that are not enclosed by any critical section. The second
//! suggests the protected dereference for unprotected accesses made inside
//! one.

use tracing::info;

use crate::domain::ast::AstNode;
use crate::domain::diagnostic::{DiagnosticEmitter, Severity};
use crate::domain::idiom::Idiom;
use crate::domain::walk::{walk_pre_order, WalkResult};

pub const ACCESS_IN_SECTION_MESSAGE: &str =
    "Use rcu_dereference() instead of rcu_access_pointer() inside RCU critical section";

/// Which scans run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    pub outside_section: bool,
    pub access_in_section: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            outside_section: true,
            access_in_section: true,
        }
    }
}

/// `kernel.rcu_dereference` -> `rcu_dereference`
fn strip_dialect(op_name: &str) -> &str {
    op_name.split_once('.').map_or(op_name, |(_, name)| name)
}

pub fn outside_section_message(idiom: &Idiom) -> String {
    let op_name = idiom.op_name();
    format!(
        "Invocation of {}() outside of RCU critical section",
        strip_dialect(&op_name)
    )
}

/// Warn about every RCU pointer operation outside a critical section.
/// Sections are skipped whole, nested ones included.
pub fn scan_outside_sections(tree: &AstNode, emitter: &mut DiagnosticEmitter<'_>) -> usize {
    let mut reported = 0;
    walk_pre_order(tree, &mut |node| {
        if node.as_critical_section().is_some() {
            return WalkResult::Skip;
        }
        if let Some(idiom) = node.as_idiom().filter(|i| i.is_rcu_pointer_op()) {
            emitter.emit(Severity::Warning, &node.span, outside_section_message(idiom));
            reported += 1;
        }
        WalkResult::Advance
    });
    reported
}

/// Suggest `rcu_dereference` for each `rcu_access_pointer` inside a section.
/// Only outermost sections are entered, and their bodies are walked whole,
/// so each access is reported once and in source order.
pub fn scan_access_in_sections(tree: &AstNode, emitter: &mut DiagnosticEmitter<'_>) -> usize {
    let mut reported = 0;
    walk_pre_order(tree, &mut |node| {
        let Some(section) = node.as_critical_section() else {
            return WalkResult::Advance;
        };
        for item in &section.body {
            walk_pre_order(item, &mut |inner| {
                if let Some(Idiom::RcuAccessPointer { .. }) = inner.as_idiom() {
                    emitter.emit(Severity::Suggestion, &inner.span, ACCESS_IN_SECTION_MESSAGE);
                    reported += 1;
                }
                WalkResult::Advance
            });
        }
        WalkResult::Skip
    });
    reported
}

/// Run the enabled scans in order.
pub fn check(tree: &AstNode, options: &CheckOptions, emitter: &mut DiagnosticEmitter<'_>) {
    if options.outside_section {
        let warnings = scan_outside_sections(tree, emitter);
        info!(warnings, "outside-section scan finished");
    }
    if options.access_in_section {
        let suggestions = scan_access_in_sections(tree, emitter);
        info!(suggestions, "access-in-section scan finished");
    }
}
