//! Best-effort C frontend.
//!
//! Parses unpreprocessed C with `lang-c` and lowers it into the generic tree.
//! Function-like macro uses that are valid C expressions arrive as calls and
//! are recognized like captured expansions. Constructs the tree does not
//! model become `Operation` nodes, or `Literal` nodes carrying source text.
//!
//! The common kernel typedefs are declared ahead of the source. Macro uses
//! that are not C expressions (a type as an operand, a `list_for_each*`
//! header followed by a body) are still syntax errors; those units have to
//! come in through the JSON tree.

use std::fs;
use std::path::{Path, PathBuf};

use lang_c::ast::{
    BlockItem, Declaration, Declarator, DeclaratorKind, Expression, ExternalDeclaration,
    ForInitializer, FunctionDefinition, Initializer, Label, MemberOperator, Statement,
    TranslationUnit,
};
use lang_c::driver::{parse_preprocessed, Config as ParserConfig};
use lang_c::span::{Node, Span};
use tracing::debug;

use crate::domain::ast::{AstNode, AstNodeKind};
use crate::domain::span::SourceSpan;
use crate::error::{KernelizeError, Result};
use crate::ports::TreeSource;

/// Kernel type names, kept on one line so source lines only shift by one.
const KERNEL_TYPEDEFS: &str = "typedef unsigned char u8; typedef unsigned short u16; \
typedef unsigned int u32; typedef unsigned long long u64; typedef signed char s8; \
typedef short s16; typedef int s32; typedef long long s64; typedef u8 __u8; \
typedef u16 __u16; typedef u32 __u32; typedef u64 __u64; typedef s32 __s32; \
typedef s64 __s64; typedef _Bool bool; typedef unsigned long size_t; \
typedef long ssize_t; typedef unsigned long uintptr_t; typedef int pid_t; \
typedef long long loff_t; typedef unsigned int gfp_t; \
typedef struct { int counter; } atomic_t;\n";

pub struct CFrontend;

impl CFrontend {
    /// Parse `source` as if it were read from `path`.
    pub fn parse(&self, source: String, path: &Path) -> Result<AstNode> {
        let config = ParserConfig::default();
        let parse = parse_preprocessed(&config, format!("{KERNEL_TYPEDEFS}{source}")).map_err(|err| {
            let mut expected: Vec<&str> = err.expected.iter().copied().collect();
            expected.sort_unstable();
            KernelizeError::Syntax {
                path: path.to_path_buf(),
                line: err.line.saturating_sub(1).max(1),
                column: err.column,
                expected: expected.join(", "),
            }
        })?;
        let file = path.display().to_string();
        let base = KERNEL_TYPEDEFS.len();
        let lowering = Lowering {
            file: &file,
            source: &parse.source,
            base,
            lines: LineIndex::new(parse.source.get(base..).unwrap_or_default()),
        };
        let tree = lowering.translation_unit(&parse.unit);
        debug!(nodes = tree.count(), file = %file, "c source lowered");
        Ok(tree)
    }
}

impl TreeSource for CFrontend {
    fn load(&self, path: &Path) -> Result<AstNode> {
        let source = fs::read_to_string(path).map_err(|source| KernelizeError::Read {
            path: PathBuf::from(path),
            source,
        })?;
        self.parse(source, path)
    }
}

/// Byte offset to 1-based line and column.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(at, _)| at + 1));
        Self { starts }
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&start| start <= offset);
        let column = offset - self.starts[line - 1] + 1;
        (line as u32, column as u32)
    }
}

struct Lowering<'s> {
    file: &'s str,
    source: &'s str,
    /// Where the user's source starts in `source`.
    base: usize,
    lines: LineIndex,
}

impl Lowering<'_> {
    fn span(&self, span: &Span) -> SourceSpan {
        let start = span.start.saturating_sub(self.base);
        let end = span.end.saturating_sub(self.base + 1).max(start);
        let (line, column) = self.lines.position(start);
        let (end_line, end_column) = self.lines.position(end);
        SourceSpan::new(self.file, line, column).with_end(end_line, end_column)
    }

    fn text(&self, span: &Span) -> String {
        self.source
            .get(span.start..span.end)
            .unwrap_or_default()
            .to_string()
    }

    fn operation(&self, op: &str, operands: Vec<AstNode>, span: &Span) -> AstNode {
        AstNode::new(
            AstNodeKind::Operation {
                op: op.to_string(),
                operands,
            },
            self.span(span),
        )
    }

    fn literal(&self, span: &Span) -> AstNode {
        AstNode::new(
            AstNodeKind::Literal {
                text: self.text(span),
            },
            self.span(span),
        )
    }

    fn translation_unit(&self, unit: &TranslationUnit) -> AstNode {
        let mut items = Vec::new();
        for external in unit.0.iter().filter(|e| e.span.start >= self.base) {
            match &external.node {
                ExternalDeclaration::FunctionDefinition(def) => items.push(self.function(def)),
                ExternalDeclaration::Declaration(decl) => items.extend(self.declaration(decl)),
                ExternalDeclaration::StaticAssert(_) => {}
            }
        }
        let whole = Span {
            start: self.base,
            end: self.source.len(),
        };
        AstNode::new(AstNodeKind::TranslationUnit { items }, self.span(&whole))
    }

    fn function(&self, def: &Node<FunctionDefinition>) -> AstNode {
        let name = declarator_name(&def.node.declarator.node).unwrap_or_default();
        AstNode::new(
            AstNodeKind::Function {
                name,
                body: Box::new(self.statement(&def.node.statement)),
            },
            self.span(&def.span),
        )
    }

    /// One node per declared name.
    fn declaration(&self, decl: &Node<Declaration>) -> Vec<AstNode> {
        decl.node
            .declarators
            .iter()
            .filter_map(|init| {
                let name = declarator_name(&init.node.declarator.node)?;
                let value = init
                    .node
                    .initializer
                    .as_ref()
                    .map(|value| Box::new(self.initializer(value)));
                Some(AstNode::new(
                    AstNodeKind::Declaration { name, init: value },
                    self.span(&init.span),
                ))
            })
            .collect()
    }

    fn initializer(&self, init: &Node<Initializer>) -> AstNode {
        match &init.node {
            Initializer::Expression(expr) => self.expression(expr),
            Initializer::List(_) => self.literal(&init.span),
        }
    }

    fn block_item(&self, item: &Node<BlockItem>) -> Vec<AstNode> {
        match &item.node {
            BlockItem::Declaration(decl) => self.declaration(decl),
            BlockItem::StaticAssert(_) => Vec::new(),
            BlockItem::Statement(stmt) => vec![self.statement(stmt)],
        }
    }

    fn statement(&self, stmt: &Node<Statement>) -> AstNode {
        let kind = match &stmt.node {
            Statement::Compound(items) => AstNodeKind::Block {
                items: items.iter().flat_map(|item| self.block_item(item)).collect(),
            },
            Statement::Expression(Some(expr)) => return self.expression(expr),
            Statement::Expression(None) => return self.operation("null", Vec::new(), &stmt.span),
            Statement::Labeled(labeled) => match &labeled.node.label.node {
                Label::Identifier(id) => AstNodeKind::Label {
                    name: id.node.name.clone(),
                    statement: Some(Box::new(self.statement(&labeled.node.statement))),
                },
                _ => {
                    let body = self.statement(&labeled.node.statement);
                    return self.operation("case", vec![body], &stmt.span);
                }
            },
            Statement::If(branch) => AstNodeKind::If {
                condition: Box::new(self.expression(&branch.node.condition)),
                then_branch: Box::new(self.statement(&branch.node.then_statement)),
                else_branch: branch
                    .node
                    .else_statement
                    .as_ref()
                    .map(|other| Box::new(self.statement(other))),
            },
            Statement::While(w) => AstNodeKind::Loop {
                init: None,
                condition: Some(Box::new(self.expression(&w.node.expression))),
                step: None,
                body: Box::new(self.statement(&w.node.statement)),
                expansion: None,
            },
            Statement::DoWhile(w) => AstNodeKind::Loop {
                init: None,
                condition: Some(Box::new(self.expression(&w.node.expression))),
                step: None,
                body: Box::new(self.statement(&w.node.statement)),
                expansion: None,
            },
            Statement::For(f) => AstNodeKind::Loop {
                init: self.for_initializer(&f.node.initializer),
                condition: f
                    .node
                    .condition
                    .as_ref()
                    .map(|c| Box::new(self.expression(c))),
                step: f.node.step.as_ref().map(|s| Box::new(self.expression(s))),
                body: Box::new(self.statement(&f.node.statement)),
                expansion: None,
            },
            Statement::Switch(s) => {
                let operands = vec![
                    self.expression(&s.node.expression),
                    self.statement(&s.node.statement),
                ];
                return self.operation("switch", operands, &stmt.span);
            }
            Statement::Return(value) => AstNodeKind::Return {
                value: value.as_ref().map(|v| Box::new(self.expression(v))),
            },
            Statement::Goto(label) => {
                let target = AstNode::identifier(label.node.name.clone(), self.span(&label.span));
                return self.operation("goto", vec![target], &stmt.span);
            }
            Statement::Continue => return self.operation("continue", Vec::new(), &stmt.span),
            Statement::Break => return self.operation("break", Vec::new(), &stmt.span),
            _ => return self.literal(&stmt.span),
        };
        AstNode::new(kind, self.span(&stmt.span))
    }

    fn for_initializer(&self, init: &Node<ForInitializer>) -> Option<Box<AstNode>> {
        match &init.node {
            ForInitializer::Empty | ForInitializer::StaticAssert(_) => None,
            ForInitializer::Expression(expr) => Some(Box::new(self.expression(expr))),
            ForInitializer::Declaration(decl) => Some(Box::new(self.operation(
                "declarations",
                self.declaration(decl),
                &init.span,
            ))),
        }
    }

    fn expression(&self, expr: &Node<Expression>) -> AstNode {
        let span = &expr.span;
        match &expr.node {
            Expression::Identifier(id) => AstNode::identifier(id.node.name.clone(), self.span(span)),
            Expression::Call(call) => {
                let args: Vec<AstNode> = call
                    .node
                    .arguments
                    .iter()
                    .map(|arg| self.expression(arg))
                    .collect();
                match &call.node.callee.node {
                    Expression::Identifier(callee) => {
                        AstNode::call(callee.node.name.clone(), args, self.span(span))
                    }
                    _ => {
                        let mut operands = vec![self.expression(&call.node.callee)];
                        operands.extend(args);
                        self.operation("indirect_call", operands, span)
                    }
                }
            }
            Expression::OffsetOf(offset) => {
                let record = AstNode::new(
                    AstNodeKind::TypeName {
                        text: self.text(&offset.node.type_name.span),
                    },
                    self.span(&offset.node.type_name.span),
                );
                let member = self.literal(&offset.node.designator.span);
                AstNode::call("offsetof", vec![record, member], self.span(span))
            }
            Expression::Member(member) => {
                let op = match member.node.operator.node {
                    MemberOperator::Direct => "member",
                    MemberOperator::Indirect => "arrow",
                };
                let field = AstNode::identifier(
                    member.node.identifier.node.name.clone(),
                    self.span(&member.node.identifier.span),
                );
                self.operation(op, vec![self.expression(&member.node.expression), field], span)
            }
            Expression::UnaryOperator(unary) => {
                let op = format!("{:?}", unary.node.operator.node).to_lowercase();
                self.operation(&op, vec![self.expression(&unary.node.operand)], span)
            }
            Expression::BinaryOperator(binary) => {
                let op = format!("{:?}", binary.node.operator.node).to_lowercase();
                let operands = vec![
                    self.expression(&binary.node.lhs),
                    self.expression(&binary.node.rhs),
                ];
                self.operation(&op, operands, span)
            }
            Expression::Cast(cast) => {
                let target = AstNode::new(
                    AstNodeKind::TypeName {
                        text: self.text(&cast.node.type_name.span),
                    },
                    self.span(&cast.node.type_name.span),
                );
                let operands = vec![target, self.expression(&cast.node.expression)];
                self.operation("cast", operands, span)
            }
            Expression::Conditional(cond) => {
                let operands = vec![
                    self.expression(&cond.node.condition),
                    self.expression(&cond.node.then_expression),
                    self.expression(&cond.node.else_expression),
                ];
                self.operation("select", operands, span)
            }
            Expression::Comma(exprs) => {
                let operands = exprs.iter().map(|e| self.expression(e)).collect();
                self.operation("comma", operands, span)
            }
            Expression::Statement(stmt) => {
                self.operation("stmt_expr", vec![self.statement(stmt)], span)
            }
            _ => self.literal(span),
        }
    }
}

fn declarator_name(declarator: &Declarator) -> Option<String> {
    match &declarator.kind.node {
        DeclaratorKind::Identifier(id) => Some(id.node.name.clone()),
        DeclaratorKind::Declarator(inner) => declarator_name(&inner.node),
        DeclaratorKind::Abstract => None,
    }
}
