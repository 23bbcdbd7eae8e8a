//! Read-only pre-order traversal with explicit control.

use crate::domain::ast::AstNode;

/// What the visitor wants the walk to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    /// Descend into the node's children.
    Advance,
    /// Do not descend into this node; continue with its next sibling.
    Skip,
    /// Abandon the whole walk.
    Stop,
}

/// Visit `node` and its descendants in pre-order. The visitor sees a node
/// before any of its children, so `Skip` takes effect before descending.
/// Returns `Stop` if the walk was abandoned, `Advance` otherwise.
pub fn walk_pre_order<'a, F>(node: &'a AstNode, visit: &mut F) -> WalkResult
where
    F: FnMut(&'a AstNode) -> WalkResult,
{
    match visit(node) {
        WalkResult::Stop => return WalkResult::Stop,
        WalkResult::Skip => return WalkResult::Advance,
        WalkResult::Advance => {}
    }
    for child in node.children() {
        if walk_pre_order(child, visit) == WalkResult::Stop {
            return WalkResult::Stop;
        }
    }
    WalkResult::Advance
}
