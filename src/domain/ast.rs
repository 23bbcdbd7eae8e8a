// Tree data structures for Kernelize.
// These types represent one translation unit after macro expansions have been
// captured as generic nodes, and the same tree after idiom rewriting.

use serde::{Deserialize, Serialize};

use crate::domain::idiom::{Idiom, RcuFlavor};
use crate::domain::span::SourceSpan;

/// A node in the tree. Every node exclusively owns its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: AstNodeKind,
    #[serde(default)]
    pub span: SourceSpan,
}

/// Node kinds. Generic kinds come from ingestion; `Idiom` and
/// `CriticalSection` only ever appear after rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstNodeKind {
    TranslationUnit {
        items: Vec<AstNode>,
    },
    Function {
        name: String,
        body: Box<AstNode>,
    },
    Declaration {
        name: String,
        #[serde(default)]
        init: Option<Box<AstNode>>,
    },
    /// A lexical scope: `{ ... }`.
    Block {
        items: Vec<AstNode>,
    },
    /// A generic label statement, optionally still attached to the statement
    /// it labels.
    Label {
        name: String,
        #[serde(default)]
        statement: Option<Box<AstNode>>,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        #[serde(default)]
        else_branch: Option<Box<AstNode>>,
    },
    /// A loop construct. `expansion` records the macro invocation the loop
    /// header was expanded from, when the frontend captured one.
    Loop {
        #[serde(default)]
        init: Option<Box<AstNode>>,
        #[serde(default)]
        condition: Option<Box<AstNode>>,
        #[serde(default)]
        step: Option<Box<AstNode>>,
        body: Box<AstNode>,
        #[serde(default)]
        expansion: Option<MacroInvocation>,
    },
    Return {
        #[serde(default)]
        value: Option<Box<AstNode>>,
    },
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<AstNode>,
    },
    /// A generic macro node: one macro invocation prior to recognition.
    Macro(MacroInvocation),
    Identifier {
        name: String,
    },
    Literal {
        text: String,
    },
    /// A type designator passed as a macro operand (`struct foo`).
    TypeName {
        text: String,
    },
    /// Any other expression or statement the frontend does not model.
    Operation {
        op: String,
        #[serde(default)]
        operands: Vec<AstNode>,
    },
    Idiom(Idiom),
    CriticalSection(CriticalSection),
}

impl Default for AstNodeKind {
    fn default() -> Self {
        AstNodeKind::Block { items: Vec::new() }
    }
}

/// Object-like (`FOO`) vs function-like (`FOO(x)`) expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionFlavor {
    ObjectLike,
    #[default]
    FunctionLike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroInvocation {
    pub name: String,
    #[serde(default)]
    pub args: Vec<AstNode>,
    #[serde(default)]
    pub flavor: ExpansionFlavor,
}

/// Statements enclosed by a matched read-side lock/unlock pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalSection {
    pub flavor: RcuFlavor,
    pub body: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: AstNodeKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn idiom(idiom: Idiom, span: SourceSpan) -> Self {
        Self::new(AstNodeKind::Idiom(idiom), span)
    }

    pub fn call(callee: impl Into<String>, args: Vec<AstNode>, span: SourceSpan) -> Self {
        Self::new(
            AstNodeKind::Call {
                callee: callee.into(),
                args,
            },
            span,
        )
    }

    pub fn macro_call(name: impl Into<String>, args: Vec<AstNode>, span: SourceSpan) -> Self {
        Self::new(
            AstNodeKind::Macro(MacroInvocation {
                name: name.into(),
                args,
                flavor: ExpansionFlavor::FunctionLike,
            }),
            span,
        )
    }

    pub fn identifier(name: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(AstNodeKind::Identifier { name: name.into() }, span)
    }

    pub fn block(items: Vec<AstNode>, span: SourceSpan) -> Self {
        Self::new(AstNodeKind::Block { items }, span)
    }

    /// Name and arity of a function-like invocation, whether it arrived as a
    /// captured macro expansion or as a plain call.
    pub fn invocation(&self) -> Option<(&str, usize)> {
        match &self.kind {
            AstNodeKind::Macro(m) if m.flavor == ExpansionFlavor::FunctionLike => {
                Some((m.name.as_str(), m.args.len()))
            }
            AstNodeKind::Call { callee, args } => Some((callee.as_str(), args.len())),
            _ => None,
        }
    }

    pub fn as_idiom(&self) -> Option<&Idiom> {
        match &self.kind {
            AstNodeKind::Idiom(idiom) => Some(idiom),
            _ => None,
        }
    }

    pub fn as_critical_section(&self) -> Option<&CriticalSection> {
        match &self.kind {
            AstNodeKind::CriticalSection(section) => Some(section),
            _ => None,
        }
    }

    /// Kinds a recognized idiom can originate from. Nothing else is ever
    /// offered to the matchers.
    pub fn is_rewrite_candidate(&self) -> bool {
        matches!(
            self.kind,
            AstNodeKind::Macro(_)
                | AstNodeKind::Loop { .. }
                | AstNodeKind::Call { .. }
                | AstNodeKind::Label { .. }
        )
    }

    /// Siblings of a lexical scope, for nodes that open one.
    pub fn scope_items_mut(&mut self) -> Option<&mut Vec<AstNode>> {
        match &mut self.kind {
            AstNodeKind::TranslationUnit { items } | AstNodeKind::Block { items } => Some(items),
            AstNodeKind::CriticalSection(section) => Some(&mut section.body),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<&AstNode> {
        let mut out = Vec::new();
        match &self.kind {
            AstNodeKind::TranslationUnit { items } | AstNodeKind::Block { items } => {
                out.extend(items.iter())
            }
            AstNodeKind::Function { body, .. } => out.push(body.as_ref()),
            AstNodeKind::Declaration { init, .. } => out.extend(init.as_deref()),
            AstNodeKind::Label { statement, .. } => out.extend(statement.as_deref()),
            AstNodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push(condition.as_ref());
                out.push(then_branch.as_ref());
                out.extend(else_branch.as_deref());
            }
            AstNodeKind::Loop {
                init,
                condition,
                step,
                body,
                expansion,
            } => {
                if let Some(expansion) = expansion {
                    out.extend(expansion.args.iter());
                }
                out.extend(init.as_deref());
                out.extend(condition.as_deref());
                out.extend(step.as_deref());
                out.push(body.as_ref());
            }
            AstNodeKind::Return { value } => out.extend(value.as_deref()),
            AstNodeKind::Call { args, .. } => out.extend(args.iter()),
            AstNodeKind::Macro(m) => out.extend(m.args.iter()),
            AstNodeKind::Operation { operands, .. } => out.extend(operands.iter()),
            AstNodeKind::Idiom(idiom) => out.extend(idiom.operands()),
            AstNodeKind::CriticalSection(section) => out.extend(section.body.iter()),
            AstNodeKind::Identifier { .. }
            | AstNodeKind::Literal { .. }
            | AstNodeKind::TypeName { .. } => {}
        }
        out
    }

    pub fn children_mut(&mut self) -> Vec<&mut AstNode> {
        let mut out = Vec::new();
        match &mut self.kind {
            AstNodeKind::TranslationUnit { items } | AstNodeKind::Block { items } => {
                out.extend(items.iter_mut())
            }
            AstNodeKind::Function { body, .. } => out.push(body.as_mut()),
            AstNodeKind::Declaration { init, .. } => out.extend(init.as_deref_mut()),
            AstNodeKind::Label { statement, .. } => out.extend(statement.as_deref_mut()),
            AstNodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push(condition.as_mut());
                out.push(then_branch.as_mut());
                out.extend(else_branch.as_deref_mut());
            }
            AstNodeKind::Loop {
                init,
                condition,
                step,
                body,
                expansion,
            } => {
                if let Some(expansion) = expansion {
                    out.extend(expansion.args.iter_mut());
                }
                out.extend(init.as_deref_mut());
                out.extend(condition.as_deref_mut());
                out.extend(step.as_deref_mut());
                out.push(body.as_mut());
            }
            AstNodeKind::Return { value } => out.extend(value.as_deref_mut()),
            AstNodeKind::Call { args, .. } => out.extend(args.iter_mut()),
            AstNodeKind::Macro(m) => out.extend(m.args.iter_mut()),
            AstNodeKind::Operation { operands, .. } => out.extend(operands.iter_mut()),
            AstNodeKind::Idiom(idiom) => out.extend(idiom.operands_mut()),
            AstNodeKind::CriticalSection(section) => out.extend(section.body.iter_mut()),
            AstNodeKind::Identifier { .. }
            | AstNodeKind::Literal { .. }
            | AstNodeKind::TypeName { .. } => {}
        }
        out
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children().into_iter().map(AstNode::count).sum::<usize>()
    }
}
