use std::io::{self, Write};

use crate::domain::ast::{AstNode, AstNodeKind, ExpansionFlavor};
use crate::domain::idiom::{Idiom, KERNEL_DIALECT};
use crate::ports::TreePrinter;

/// Indented IR text: one op per line, children in braces.
pub struct IrPrinter;

impl TreePrinter for IrPrinter {
    fn print(&self, tree: &AstNode, out: &mut dyn Write) -> io::Result<()> {
        write_op(out, tree, 0)
    }
}

fn write_op(out: &mut dyn Write, node: &AstNode, depth: usize) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    write!(out, "{indent}{} {}", op_header(node), node.span)?;
    let children = node.children();
    if children.is_empty() {
        return writeln!(out);
    }
    writeln!(out, " {{")?;
    for child in children {
        write_op(out, child, depth + 1)?;
    }
    writeln!(out, "{indent}}}")
}

/// `<dialect>.<op> [attributes]`
pub fn op_header(node: &AstNode) -> String {
    match &node.kind {
        AstNodeKind::TranslationUnit { .. } => "builtin.module".to_string(),
        AstNodeKind::Function { name, .. } => format!("hl.func @{name}"),
        AstNodeKind::Declaration { name, .. } => format!("hl.var @{name}"),
        AstNodeKind::Block { .. } => "core.scope".to_string(),
        AstNodeKind::Label { name, .. } => format!("hl.label @{name}"),
        AstNodeKind::If { .. } => "hl.if".to_string(),
        AstNodeKind::Loop {
            expansion: Some(m), ..
        } => format!("hl.for expanded_from = {:?}", m.name),
        AstNodeKind::Loop { .. } => "hl.for".to_string(),
        AstNodeKind::Return { .. } => "hl.return".to_string(),
        AstNodeKind::Call { callee, .. } => format!("hl.call @{callee}"),
        AstNodeKind::Macro(m) => match m.flavor {
            ExpansionFlavor::FunctionLike => format!("macroni.expansion {:?}", m.name),
            ExpansionFlavor::ObjectLike => format!("macroni.expansion {:?} object_like", m.name),
        },
        AstNodeKind::Identifier { name } => format!("hl.ref @{name}"),
        AstNodeKind::Literal { text } => format!("hl.const {text:?}"),
        AstNodeKind::TypeName { text } => format!("hl.type {text:?}"),
        AstNodeKind::Operation { op, .. } => format!("hl.{op}"),
        AstNodeKind::Idiom(idiom) => idiom_header(idiom),
        AstNodeKind::CriticalSection(section) => format!(
            "{KERNEL_DIALECT}.rcu_critical_section {}",
            section.flavor.name()
        ),
    }
}

fn idiom_header(idiom: &Idiom) -> String {
    match idiom {
        Idiom::Label { name } => format!("{} @{name}", idiom.op_name()),
        _ => idiom.op_name(),
    }
}

/// The rewritten tree in the same JSON schema the tree source reads.
pub struct JsonPrinter;

impl TreePrinter for JsonPrinter {
    fn print(&self, tree: &AstNode, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, tree)?;
        writeln!(out)
    }
}
