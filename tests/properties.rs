//! Whole-tree properties of the rewrite and the checker over a mixed
//! translation unit.

use std::collections::HashMap;

use kernelize::domain::ast::{AstNode, AstNodeKind, ExpansionFlavor, MacroInvocation};
use kernelize::domain::diagnostic::{location_text, DiagnosticEmitter, Severity};
use kernelize::domain::idiom::Idiom;
use kernelize::domain::matchers::MatcherSet;
use kernelize::domain::rewrite::rewrite;
use kernelize::domain::safety::{check, CheckOptions};
use kernelize::domain::span::SourceSpan;
use kernelize::domain::walk::{walk_pre_order, WalkResult};
use kernelize::infrastructure::MemorySink;

fn at(line: u32) -> SourceSpan {
    SourceSpan::new("kernel/sched/core.c", line, 5).with_end(line, 60)
}

fn m(name: &str, args: Vec<AstNode>, line: u32) -> AstNode {
    AstNode::macro_call(name, args, at(line))
}

fn id(name: &str, line: u32) -> AstNode {
    AstNode::identifier(name, at(line))
}

fn ty(text: &str, line: u32) -> AstNode {
    AstNode::new(AstNodeKind::TypeName { text: text.to_string() }, at(line))
}

/// A function exercising most idiom families, malformed shapes included.
fn sample() -> AstNode {
    let list_loop = AstNode::new(
        AstNodeKind::Loop {
            init: None,
            condition: None,
            step: None,
            body: Box::new(AstNode::block(
                vec![m("rcu_access_pointer", vec![id("pos", 13)], 13)],
                at(12),
            )),
            expansion: Some(MacroInvocation {
                name: "list_for_each_entry_rcu".to_string(),
                args: vec![id("pos", 12), id("head", 12), id("list", 12)],
                flavor: ExpansionFlavor::FunctionLike,
            }),
        },
        at(12),
    );
    let labeled = AstNode::new(
        AstNodeKind::Label {
            name: "out".to_string(),
            statement: Some(Box::new(m("rcu_read_unlock", vec![], 16))),
        },
        at(16),
    );
    let body = vec![
        m("smp_mb", vec![], 2),
        m("rcu_dereference", vec![], 3),
        m("container_of", vec![id("p", 4), ty("struct task", 4), id("node", 4)], 4),
        m("offsetof", vec![ty("struct task", 5), id("node", 5)], 5),
        m("get_user", vec![id("v", 6), id("uptr", 6)], 6),
        m("rcu_read_lock", vec![], 7),
        m("rcu_dereference", vec![id("gp", 8)], 8),
        m("rcu_read_lock_bh", vec![], 9),
        m("rcu_access_pointer", vec![id("gp", 10)], 10),
        m("rcu_read_unlock_bh", vec![], 11),
        list_loop,
        m("rcu_dereference_check", vec![id("gp", 14), id("cond", 14)], 14),
        m("rcu_read_unlock_sched", vec![], 15),
        labeled,
        m("rcu_assign_pointer", vec![id("gp", 17), id("np", 17)], 17),
        m("rcu_read_lock", vec![], 18),
        m("rcu_replace_pointer", vec![id("gp", 19), id("np", 19), id("c", 19)], 19),
    ];
    AstNode::new(
        AstNodeKind::TranslationUnit {
            items: vec![AstNode::new(
                AstNodeKind::Function {
                    name: "sample".to_string(),
                    body: Box::new(AstNode::block(body, at(1))),
                },
                at(1),
            )],
        },
        at(1),
    )
}

fn generic_names(tree: &AstNode) -> HashMap<String, usize> {
    let mut names = HashMap::new();
    walk_pre_order(tree, &mut |node| {
        match &node.kind {
            AstNodeKind::Macro(invocation) => *names.entry(invocation.name.clone()).or_insert(0) += 1,
            AstNodeKind::Loop {
                expansion: Some(invocation),
                ..
            } => *names.entry(invocation.name.clone()).or_insert(0) += 1,
            _ => {}
        }
        WalkResult::Advance
    });
    names
}

fn idiom_names(tree: &AstNode) -> HashMap<String, usize> {
    let mut names = HashMap::new();
    walk_pre_order(tree, &mut |node| {
        if let Some(idiom) = node.as_idiom().filter(|i| !matches!(i, Idiom::Label { .. })) {
            *names.entry(idiom.macro_name().to_string()).or_insert(0) += 1;
        }
        WalkResult::Advance
    });
    names
}

fn section_spans(tree: &AstNode) -> Vec<SourceSpan> {
    let mut spans = Vec::new();
    walk_pre_order(tree, &mut |node| {
        if node.as_critical_section().is_some() {
            spans.push(node.span.clone());
        }
        WalkResult::Advance
    });
    spans
}

#[test]
fn conservation() {
    let before_tree = sample();
    let before = generic_names(&before_tree);
    let mut tree = before_tree.clone();
    rewrite(&mut tree, &MatcherSet::kernel());

    for (name, count) in idiom_names(&tree) {
        let generic = before.get(&name).copied().unwrap_or(0);
        assert!(count <= generic, "{name}: {count} idioms from {generic} macros");
    }
    assert!(tree.count() <= before_tree.count());
}

#[test]
fn idempotence() {
    let matchers = MatcherSet::kernel();
    let mut once = sample();
    rewrite(&mut once, &matchers);
    let mut twice = once.clone();
    let stats = rewrite(&mut twice, &matchers);
    assert!(stats.is_noop());
    assert_eq!(twice, once);
}

#[test]
fn malformed_shapes_stay_generic() {
    let mut tree = sample();
    rewrite(&mut tree, &MatcherSet::kernel());
    let remaining = generic_names(&tree);
    // Zero-argument dereference at line 3.
    assert_eq!(remaining.get("rcu_dereference"), Some(&1));
}

#[test]
fn sections_are_well_nested() {
    let mut tree = sample();
    let stats = rewrite(&mut tree, &MatcherSet::kernel());
    let spans = section_spans(&tree);
    assert_eq!(spans.len(), stats.sections);
    assert!(spans.len() >= 2);
    for (i, a) in spans.iter().enumerate() {
        for b in &spans[i + 1..] {
            assert!(
                a.is_disjoint(b) || a.contains(b) || b.contains(a),
                "{a} and {b} partially overlap"
            );
        }
    }
}

#[test]
fn no_double_reporting() {
    let mut tree = sample();
    rewrite(&mut tree, &MatcherSet::kernel());

    let mut sink = MemorySink::default();
    {
        let mut emitter = DiagnosticEmitter::acquire(&mut sink);
        check(&tree, &CheckOptions::default(), &mut emitter);
    }

    let mut inside = Vec::new();
    walk_pre_order(&tree, &mut |node| {
        if let Some(section) = node.as_critical_section() {
            for item in &section.body {
                walk_pre_order(item, &mut |inner| {
                    inside.push(location_text(&inner.span));
                    WalkResult::Advance
                });
            }
        }
        WalkResult::Advance
    });

    let warnings: Vec<_> = sink
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Warning)
        .collect();
    assert!(!warnings.is_empty());
    for warning in &warnings {
        assert!(
            !inside.contains(&warning.location),
            "warning inside a section: {warning}"
        );
    }

    let mut locations: Vec<_> = sink.findings.iter().map(|f| f.to_string()).collect();
    let total = locations.len();
    locations.sort();
    locations.dedup();
    assert_eq!(locations.len(), total);
}
