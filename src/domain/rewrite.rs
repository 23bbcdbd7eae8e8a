//! Rewrite driver.
//!
//! One bottom-up sweep over the tree. Children are finalized before their
//! parent is offered to the matchers, so a loop or call sees already
//! recognized operands. Each lexical scope is then folded by the critical
//! section recognizer in source order. Specific nodes are never rewrite
//! candidates, which makes a second sweep a no-op.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::ast::AstNode;
use crate::domain::critical_section;
use crate::domain::matchers::{detach_labeled_statement, MatcherSet};

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Rewritten node count per matcher family.
    pub by_family: BTreeMap<&'static str, usize>,
    pub sections: usize,
}

impl RewriteStats {
    pub fn rewritten(&self) -> usize {
        self.by_family.values().sum()
    }

    pub fn is_noop(&self) -> bool {
        self.rewritten() == 0 && self.sections == 0
    }
}

pub struct RewriteDriver<'m> {
    matchers: &'m MatcherSet,
    stats: RewriteStats,
}

impl<'m> RewriteDriver<'m> {
    pub fn new(matchers: &'m MatcherSet) -> Self {
        Self {
            matchers,
            stats: RewriteStats::default(),
        }
    }

    /// Rewrite `tree` in place.
    pub fn rewrite(mut self, tree: &mut AstNode) -> RewriteStats {
        self.visit(tree);
        debug!(
            rewritten = self.stats.rewritten(),
            sections = self.stats.sections,
            "rewrite sweep finished"
        );
        self.stats
    }

    fn visit(&mut self, node: &mut AstNode) {
        if let Some(items) = node.scope_items_mut() {
            self.rewrite_scope(items);
        } else {
            for child in node.children_mut() {
                self.visit(child);
            }
        }
        if node.is_rewrite_candidate() {
            self.offer(node);
        }
    }

    fn offer(&mut self, node: &mut AstNode) {
        match self.matchers.apply(std::mem::take(node)) {
            Ok((rewritten, family)) => {
                *self.stats.by_family.entry(family).or_default() += 1;
                *node = rewritten;
            }
            Err(original) => *node = original,
        }
    }

    fn rewrite_scope(&mut self, items: &mut Vec<AstNode>) {
        let mut flat = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            let (item, detached) = detach_labeled_statement(item);
            flat.push(item);
            flat.extend(detached);
        }
        for item in &mut flat {
            self.visit(item);
        }
        let (folded, sections) = critical_section::recognize(flat);
        self.stats.sections += sections;
        *items = folded;
    }
}

/// Rewrite `tree` in place with the given matchers.
pub fn rewrite(tree: &mut AstNode, matchers: &MatcherSet) -> RewriteStats {
    RewriteDriver::new(matchers).rewrite(tree)
}
