use std::io::Write;

use kernelize::application::KernelizeUsecase;
use kernelize::domain::ast::AstNode;
use kernelize::domain::diagnostic::Severity;
use kernelize::domain::matchers::MatcherSet;
use kernelize::domain::safety::CheckOptions;
use kernelize::infrastructure::{
    source_for, CFrontend, InputFormat, IrPrinter, JsonPrinter, JsonTreeSource, MemorySink,
};

const READER_JSON: &str = r#"{
  "kind": { "translation_unit": { "items": [
    { "kind": { "function": { "name": "reader", "body":
      { "kind": { "block": { "items": [
        { "kind": { "macro": { "name": "rcu_read_lock" } },
          "span": { "file": "drivers/net/tun.c", "line": 10, "column": 2 } },
        { "kind": { "macro": { "name": "rcu_access_pointer", "args": [
            { "kind": { "identifier": { "name": "tun" } },
              "span": { "file": "drivers/net/tun.c", "line": 11, "column": 27 } } ] } },
          "span": { "file": "drivers/net/tun.c", "line": 11, "column": 8 } },
        { "kind": { "macro": { "name": "rcu_read_unlock" } },
          "span": { "file": "drivers/net/tun.c", "line": 12, "column": 2 } },
        { "kind": { "macro": { "name": "rcu_dereference", "args": [
            { "kind": { "identifier": { "name": "tun" } },
              "span": { "file": "drivers/net/tun.c", "line": 13, "column": 24 } } ] } },
          "span": { "file": "drivers/net/tun.c", "line": 13, "column": 8 } }
      ] } } } } },
      "span": { "file": "drivers/net/tun.c", "line": 8, "column": 1 } }
  ] } }
}"#;

const READER_C: &str = "\
struct tun { int flags; };
struct tun *gtun;

int reader(void)
{
    int flags = 0;
    rcu_read_lock();
    flags = rcu_dereference(gtun)->flags;
    if (rcu_access_pointer(gtun))
        flags++;
    rcu_read_unlock();
    return flags + rcu_dereference(gtun)->flags;
}
";

fn usecase<'a>(
    source: &'a dyn kernelize::ports::TreeSource,
    printer: Option<&'a dyn kernelize::ports::TreePrinter>,
    matchers: &'a MatcherSet,
) -> KernelizeUsecase<'a> {
    KernelizeUsecase {
        source,
        printer,
        matchers,
        checks: CheckOptions::default(),
    }
}

#[test]
fn json_input_through_the_usecase() {
    let mut input = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    input.write_all(READER_JSON.as_bytes()).unwrap();

    let matchers = MatcherSet::kernel();
    let mut out: Vec<u8> = Vec::new();
    let mut sink = MemorySink::default();
    let summary = usecase(&JsonTreeSource, Some(&IrPrinter), &matchers)
        .run(input.path(), &mut out, &mut sink)
        .unwrap();

    assert_eq!(summary.rewrite.sections, 1);
    assert_eq!(summary.findings.warnings, 1);
    assert_eq!(summary.findings.suggestions, 1);
    assert!(summary.nodes_after <= summary.nodes_before);

    let lines: Vec<_> = sink.findings.iter().map(|f| f.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "drivers/net/tun.c:13:8: warning: Invocation of rcu_dereference() outside of RCU critical section",
            "drivers/net/tun.c:11:8: suggestion: Use rcu_dereference() instead of rcu_access_pointer() inside RCU critical section",
        ]
    );

    let ir = String::from_utf8(out).unwrap();
    assert!(ir.starts_with("builtin.module"));
    assert!(ir.contains("kernel.rcu_critical_section plain loc(\"drivers/net/tun.c\":10:2)"));
    assert!(ir.contains("kernel.rcu_access_pointer loc(\"drivers/net/tun.c\":11:8)"));
    assert!(!ir.contains("macroni.expansion"));
}

#[test]
fn json_output_feeds_back_as_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let first_input = dir.path().join("reader.json");
    std::fs::write(&first_input, READER_JSON).unwrap();

    let matchers = MatcherSet::kernel();
    let mut rewritten: Vec<u8> = Vec::new();
    usecase(&JsonTreeSource, Some(&JsonPrinter), &matchers)
        .run(&first_input, &mut rewritten, &mut MemorySink::default())
        .unwrap();

    let second_input = dir.path().join("rewritten.json");
    std::fs::write(&second_input, &rewritten).unwrap();
    let mut again: Vec<u8> = Vec::new();
    let mut sink = MemorySink::default();
    let summary = usecase(&JsonTreeSource, Some(&JsonPrinter), &matchers)
        .run(&second_input, &mut again, &mut sink)
        .unwrap();

    assert!(summary.rewrite.is_noop());
    assert_eq!(sink.findings.len(), 2);
    let first: AstNode = serde_json::from_slice(&rewritten).unwrap();
    let second: AstNode = serde_json::from_slice(&again).unwrap();
    assert_eq!(first, second);
}

#[test]
fn c_source_end_to_end() {
    let mut input = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
    input.write_all(READER_C.as_bytes()).unwrap();

    let source = source_for(InputFormat::Auto, input.path()).unwrap();
    let matchers = MatcherSet::kernel();
    let mut sink = MemorySink::default();
    let summary = usecase(source.as_ref(), None, &matchers)
        .run(input.path(), &mut std::io::sink(), &mut sink)
        .unwrap();

    assert_eq!(summary.rewrite.sections, 1);
    assert_eq!(summary.findings.warnings, 1);
    assert_eq!(summary.findings.suggestions, 1);

    let warning = sink
        .findings
        .iter()
        .find(|f| f.severity == Severity::Warning)
        .unwrap();
    assert!(warning.location.ends_with(":12:20"), "{warning}");
    let suggestion = sink
        .findings
        .iter()
        .find(|f| f.severity == Severity::Suggestion)
        .unwrap();
    assert!(suggestion.location.ends_with(":9:9"), "{suggestion}");
}

#[test]
fn ingestion_failures_are_errors() {
    let mut input = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
    input.write_all(b"int f( {").unwrap();

    let matchers = MatcherSet::kernel();
    let mut sink = MemorySink::default();
    let err = usecase(&CFrontend, None, &matchers)
        .run(input.path(), &mut std::io::sink(), &mut sink)
        .unwrap_err();

    assert!(format!("{err:#}").contains("syntax error"));
    assert!(sink.findings.is_empty());
    assert!(!sink.released);
}

#[test]
fn unpaired_lock_prints_as_a_plain_expansion() {
    let span = |line| kernelize::domain::span::SourceSpan::new("a.c", line, 2);
    let mut tree = AstNode::block(
        vec![
            AstNode::macro_call("rcu_read_lock", vec![], span(2)),
            AstNode::macro_call("do_work", vec![], span(3)),
        ],
        span(1),
    );
    let matchers = MatcherSet::kernel();
    let summary = usecase(&JsonTreeSource, None, &matchers).process(&mut tree, &mut MemorySink::default());
    assert!(summary.rewrite.is_noop());

    let mut out: Vec<u8> = Vec::new();
    kernelize::ports::TreePrinter::print(&IrPrinter, &tree, &mut out).unwrap();
    let ir = String::from_utf8(out).unwrap();
    assert!(ir.contains("macroni.expansion \"rcu_read_lock\" loc(\"a.c\":2:2)"), "{ir}");
    assert!(!ir.contains("kernel.rcu_read_lock"));
}
