//! Read-side critical section recognition.
//!
//! Runs over the already-rewritten siblings of one lexical scope, in source
//! order. Lock and unlock markers are still generic invocations here: no
//! matcher claims them, so a marker that never pairs stays exactly as it was
//! ingested. A lock opens a pending section, every following sibling is
//! collected into the innermost pending section, and an unlock of the same
//! flavor closes it into a single `CriticalSection` node that consumes both
//! markers. Pending sections left open when the scope ends are put back flat.

use tracing::debug;

use crate::domain::ast::{AstNode, AstNodeKind, CriticalSection};
use crate::domain::idiom::RcuFlavor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Start(RcuFlavor),
    End(RcuFlavor),
}

/// Zero-operand `rcu_read_lock*` / `rcu_read_unlock*` invocations.
fn marker(node: &AstNode) -> Option<Marker> {
    let (name, 0) = node.invocation()? else {
        return None;
    };
    RcuFlavor::ALL.into_iter().find_map(|flavor| {
        if flavor.read_lock() == name {
            Some(Marker::Start(flavor))
        } else if flavor.read_unlock() == name {
            Some(Marker::End(flavor))
        } else {
            None
        }
    })
}

struct Pending {
    start: AstNode,
    flavor: RcuFlavor,
    body: Vec<AstNode>,
}

/// Scanner state. Idle while `pending` is empty, in a section otherwise.
#[derive(Default)]
struct SectionScanner {
    pending: Vec<Pending>,
    out: Vec<AstNode>,
    closed: usize,
}

impl SectionScanner {
    fn emit(&mut self, node: AstNode) {
        match self.pending.last_mut() {
            Some(innermost) => innermost.body.push(node),
            None => self.out.push(node),
        }
    }

    fn open(&mut self, start: AstNode, flavor: RcuFlavor) {
        self.pending.push(Pending {
            start,
            flavor,
            body: Vec::new(),
        });
    }

    /// Close the innermost section if `end` matches its flavor.
    fn close(&mut self, end: AstNode, flavor: RcuFlavor) {
        let closes_innermost = self.pending.last().is_some_and(|p| p.flavor == flavor);
        if !closes_innermost {
            self.emit(end);
            return;
        }
        if let Some(Pending { start, flavor, body }) = self.pending.pop() {
            let span = start.span.through(&end.span);
            self.closed += 1;
            self.emit(AstNode::new(
                AstNodeKind::CriticalSection(CriticalSection { flavor, body }),
                span,
            ));
        }
    }

    fn step(&mut self, node: AstNode) {
        match marker(&node) {
            Some(Marker::Start(flavor)) => self.open(node, flavor),
            Some(Marker::End(flavor)) => self.close(node, flavor),
            None => self.emit(node),
        }
    }

    /// Scope exhausted: unmatched starts and whatever followed them go back
    /// flat, in source order.
    fn finish(mut self) -> (Vec<AstNode>, usize) {
        if !self.pending.is_empty() {
            debug!(
                unmatched = self.pending.len(),
                "leaving unmatched read-side lock markers unrewritten"
            );
        }
        for Pending { start, body, .. } in std::mem::take(&mut self.pending) {
            self.out.push(start);
            self.out.extend(body);
        }
        (self.out, self.closed)
    }
}

/// Fold matched lock/unlock pairs among `items` into critical section
/// nodes. Returns the new sibling list and the number of sections built.
pub fn recognize(items: Vec<AstNode>) -> (Vec<AstNode>, usize) {
    let mut scanner = SectionScanner::default();
    for item in items {
        scanner.step(item);
    }
    scanner.finish()
}
