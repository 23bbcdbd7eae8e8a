//! Benchmarks for the rewrite and safety-check phases.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kernelize::domain::ast::{AstNode, AstNodeKind};
use kernelize::domain::diagnostic::DiagnosticEmitter;
use kernelize::domain::matchers::MatcherSet;
use kernelize::domain::rewrite::rewrite;
use kernelize::domain::safety::{check, CheckOptions};
use kernelize::domain::span::SourceSpan;
use kernelize::infrastructure::MemorySink;

/// A translation unit of `functions` readers, each with one section, a
/// nested section and a few pointer operations outside of them.
fn synthetic_unit(functions: usize) -> AstNode {
    let mut items = Vec::with_capacity(functions);
    for f in 0..functions {
        let base = (f * 12) as u32;
        let at = |offset: u32| SourceSpan::new("bench.c", base + offset, 5);
        let m = |name: &str, args: Vec<AstNode>, offset: u32| AstNode::macro_call(name, args, at(offset));
        let gp = |offset: u32| AstNode::identifier("gp", at(offset));
        let body = vec![
            m("rcu_read_lock", vec![], 1),
            m("rcu_dereference", vec![gp(2)], 2),
            m("rcu_read_lock_bh", vec![], 3),
            m("rcu_access_pointer", vec![gp(4)], 4),
            m("rcu_read_unlock_bh", vec![], 5),
            m("smp_wmb", vec![], 6),
            m("rcu_read_unlock", vec![], 7),
            m("rcu_assign_pointer", vec![gp(8), gp(8)], 8),
            m("WARN_ON", vec![gp(9)], 9),
            m("rcu_dereference", vec![m("READ_ONCE", vec![gp(10)], 10)], 10),
        ];
        items.push(AstNode::new(
            AstNodeKind::Function {
                name: format!("reader_{f}"),
                body: Box::new(AstNode::block(body, at(0))),
            },
            at(0),
        ));
    }
    AstNode::new(AstNodeKind::TranslationUnit { items }, SourceSpan::new("bench.c", 1, 1))
}

fn bench_rewrite(c: &mut Criterion) {
    let matchers = MatcherSet::kernel();
    let mut group = c.benchmark_group("rewrite");
    for functions in [10, 100, 1000] {
        let unit = synthetic_unit(functions);
        group.throughput(Throughput::Elements(unit.count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &unit, |b, unit| {
            b.iter(|| {
                let mut tree = unit.clone();
                black_box(rewrite(&mut tree, &matchers))
            })
        });
    }
    group.finish();
}

fn bench_check(c: &mut Criterion) {
    let matchers = MatcherSet::kernel();
    let mut group = c.benchmark_group("check");
    for functions in [10, 100, 1000] {
        let mut unit = synthetic_unit(functions);
        rewrite(&mut unit, &matchers);
        group.bench_with_input(BenchmarkId::from_parameter(functions), &unit, |b, unit| {
            b.iter(|| {
                let mut sink = MemorySink::default();
                let mut emitter = DiagnosticEmitter::acquire(&mut sink);
                check(black_box(unit), &CheckOptions::default(), &mut emitter);
                emitter.summary()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rewrite, bench_check);
criterion_main!(benches);
