//! Idiom matchers.
//!
//! A matcher takes ownership of a candidate node and either hands back a
//! specific idiom node built from the original operand subtrees, or returns
//! the candidate untouched. Matchers never look outside the node they are
//! given and never fail in any other way.

use std::collections::HashSet;

use crate::domain::ast::{AstNode, AstNodeKind, ExpansionFlavor, MacroInvocation};
use crate::domain::idiom::{Barrier, Idiom, ListTraversal, RcuFlavor};
use crate::domain::span::SourceSpan;

/// `Ok` is the rewritten node, `Err` gives the candidate back unchanged.
pub type MatchFn = fn(AstNode) -> Result<AstNode, AstNode>;

/// One registered idiom family.
#[derive(Clone, Copy)]
pub struct Matcher {
    pub family: &'static str,
    /// Macro names this matcher recognizes.
    pub claims: fn() -> Vec<&'static str>,
    pub apply: MatchFn,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher").field("family", &self.family).finish()
    }
}

/// Matchers in priority order. The first success wins.
#[derive(Debug, Clone)]
pub struct MatcherSet {
    matchers: Vec<Matcher>,
    /// Every claimed macro name, in registration order.
    claimed: Vec<&'static str>,
}

impl MatcherSet {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        let claimed = matchers
            .iter()
            .flat_map(|m| (m.claims)())
            .collect();
        let set = Self { matchers, claimed };
        debug_assert!(
            set.first_conflict().is_none(),
            "macro `{}` claimed by two matchers",
            set.first_conflict().unwrap_or_default()
        );
        set
    }

    /// The kernel idiom families, in their fixed registration order.
    pub fn kernel() -> Self {
        Self::new(vec![
            Matcher {
                family: "label",
                claims: Vec::new,
                apply: match_label,
            },
            Matcher {
                family: "get_user",
                claims: || vec!["get_user", "__get_user"],
                apply: match_get_user,
            },
            Matcher {
                family: "offsetof",
                claims: || vec!["offsetof"],
                apply: match_offsetof,
            },
            Matcher {
                family: "container_of",
                claims: || vec!["container_of"],
                apply: match_container_of,
            },
            Matcher {
                family: "rcu_pointer",
                claims: PointerOp::names,
                apply: match_rcu_pointer_op,
            },
            Matcher {
                family: "memory_barrier",
                claims: || Barrier::ALL.iter().map(Barrier::name).collect(),
                apply: match_memory_barrier,
            },
            Matcher {
                family: "list_for_each",
                claims: || ListTraversal::ALL.iter().map(ListTraversal::name).collect(),
                apply: match_list_for_each,
            },
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matcher> {
        self.matchers.iter()
    }

    /// A macro name claimed by more than one matcher, if any.
    pub fn first_conflict(&self) -> Option<&'static str> {
        let mut seen = HashSet::new();
        self.claimed.iter().copied().find(|name| !seen.insert(*name))
    }

    #[cfg(test)]
    fn claims(&self, name: &str) -> bool {
        self.claimed.contains(&name)
    }

    /// Try each matcher in order. On success also returns the family that
    /// matched.
    pub fn apply(&self, node: AstNode) -> Result<(AstNode, &'static str), AstNode> {
        let mut candidate = node;
        for matcher in &self.matchers {
            match (matcher.apply)(candidate) {
                Ok(rewritten) => return Ok((rewritten, matcher.family)),
                Err(original) => candidate = original,
            }
        }
        Err(candidate)
    }
}

impl Default for MatcherSet {
    fn default() -> Self {
        Self::kernel()
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Invocation plumbing
// ─────────────────────────────────────────────────────────────────────────

/// A function-like invocation taken apart, remembering whether it was a
/// macro node or a call so it can be put back.
struct Invocation {
    name: String,
    args: Vec<AstNode>,
    from_macro: bool,
    span: SourceSpan,
}

impl Invocation {
    fn take(node: AstNode) -> Result<Self, AstNode> {
        let AstNode { kind, span } = node;
        match kind {
            AstNodeKind::Macro(m) if m.flavor == ExpansionFlavor::FunctionLike => Ok(Self {
                name: m.name,
                args: m.args,
                from_macro: true,
                span,
            }),
            AstNodeKind::Call { callee, args } => Ok(Self {
                name: callee,
                args,
                from_macro: false,
                span,
            }),
            kind => Err(AstNode { kind, span }),
        }
    }

    fn restore(self) -> AstNode {
        if self.from_macro {
            AstNode::new(
                AstNodeKind::Macro(MacroInvocation {
                    name: self.name,
                    args: self.args,
                    flavor: ExpansionFlavor::FunctionLike,
                }),
                self.span,
            )
        } else {
            AstNode::call(self.name, self.args, self.span)
        }
    }
}

/// Take `node` apart if it invokes an accepted name with exactly `N`
/// operands.
fn claim<const N: usize>(
    node: AstNode,
    accepts: impl Fn(&str) -> bool,
) -> Result<(String, SourceSpan, [AstNode; N]), AstNode> {
    let fits = matches!(node.invocation(), Some((name, arity)) if arity == N && accepts(name));
    if !fits {
        return Err(node);
    }
    let Invocation {
        name,
        args,
        from_macro,
        span,
    } = Invocation::take(node)?;
    match <[AstNode; N]>::try_from(args) {
        Ok(operands) => Ok((name, span, operands)),
        Err(args) => Err(Invocation {
            name,
            args,
            from_macro,
            span,
        }
        .restore()),
    }
}

fn invoked_name(node: &AstNode) -> Option<&str> {
    node.invocation().map(|(name, _)| name)
}

// ─────────────────────────────────────────────────────────────────────────
// Matchers
// ─────────────────────────────────────────────────────────────────────────

/// A bare generic label becomes a label statement idiom. Labels still
/// attached to their statement are split by the driver first.
pub fn match_label(node: AstNode) -> Result<AstNode, AstNode> {
    match node.kind {
        AstNodeKind::Label {
            name,
            statement: None,
        } => Ok(AstNode::idiom(Idiom::Label { name }, node.span)),
        kind => Err(AstNode {
            kind,
            span: node.span,
        }),
    }
}

/// Detach the statement a generic label is attached to, so the label and
/// the statement become consecutive siblings.
pub fn detach_labeled_statement(node: AstNode) -> (AstNode, Option<AstNode>) {
    match node.kind {
        AstNodeKind::Label {
            name,
            statement: Some(statement),
        } => (
            AstNode::new(
                AstNodeKind::Label {
                    name,
                    statement: None,
                },
                node.span,
            ),
            Some(*statement),
        ),
        kind => (
            AstNode {
                kind,
                span: node.span,
            },
            None,
        ),
    }
}

pub fn match_get_user(node: AstNode) -> Result<AstNode, AstNode> {
    let (name, span, [destination, source]) =
        claim::<2>(node, |n| n == "get_user" || n == "__get_user")?;
    Ok(AstNode::idiom(
        Idiom::GetUser {
            checked: name == "get_user",
            destination: Box::new(destination),
            source: Box::new(source),
        },
        span,
    ))
}

pub fn match_offsetof(node: AstNode) -> Result<AstNode, AstNode> {
    let (_, span, [record, member]) = claim::<2>(node, |n| n == "offsetof")?;
    Ok(AstNode::idiom(
        Idiom::OffsetOf {
            record: Box::new(record),
            member: Box::new(member),
        },
        span,
    ))
}

pub fn match_container_of(node: AstNode) -> Result<AstNode, AstNode> {
    let (_, span, [pointer, record, member]) = claim::<3>(node, |n| n == "container_of")?;
    Ok(AstNode::idiom(
        Idiom::ContainerOf {
            pointer: Box::new(pointer),
            record: Box::new(record),
            member: Box::new(member),
        },
        span,
    ))
}

#[derive(Debug, Clone, Copy)]
enum PointerOp {
    Dereference(RcuFlavor),
    DereferenceCheck(RcuFlavor),
    DereferenceProtected,
    Access,
    Assign,
    Replace,
}

impl PointerOp {
    fn all() -> Vec<PointerOp> {
        let mut ops: Vec<PointerOp> = RcuFlavor::ALL.into_iter().map(PointerOp::Dereference).collect();
        ops.extend(RcuFlavor::ALL.into_iter().map(PointerOp::DereferenceCheck));
        ops.extend([
            PointerOp::DereferenceProtected,
            PointerOp::Access,
            PointerOp::Assign,
            PointerOp::Replace,
        ]);
        ops
    }

    fn name(&self) -> &'static str {
        match self {
            PointerOp::Dereference(flavor) => flavor.dereference(),
            PointerOp::DereferenceCheck(flavor) => flavor.dereference_check(),
            PointerOp::DereferenceProtected => "rcu_dereference_protected",
            PointerOp::Access => "rcu_access_pointer",
            PointerOp::Assign => "rcu_assign_pointer",
            PointerOp::Replace => "rcu_replace_pointer",
        }
    }

    fn names() -> Vec<&'static str> {
        Self::all().iter().map(PointerOp::name).collect()
    }

    fn lookup(name: &str) -> Option<PointerOp> {
        Self::all().into_iter().find(|op| op.name() == name)
    }
}

/// Dereference (plain/bh/sched, with or without a lockdep check, and the
/// update-side protected form), access, assign and replace.
pub fn match_rcu_pointer_op(node: AstNode) -> Result<AstNode, AstNode> {
    let Some(op) = invoked_name(&node).and_then(PointerOp::lookup) else {
        return Err(node);
    };
    let any = |_: &str| true;
    let (idiom, span) = match op {
        PointerOp::Dereference(flavor) => {
            let (_, span, [pointer]) = claim::<1>(node, any)?;
            let pointer = Box::new(pointer);
            (Idiom::RcuDereference { flavor, pointer }, span)
        }
        PointerOp::DereferenceCheck(flavor) => {
            let (_, span, [pointer, condition]) = claim::<2>(node, any)?;
            (
                Idiom::RcuDereferenceCheck {
                    flavor,
                    pointer: Box::new(pointer),
                    condition: Box::new(condition),
                },
                span,
            )
        }
        PointerOp::DereferenceProtected => {
            let (_, span, [pointer, condition]) = claim::<2>(node, any)?;
            (
                Idiom::RcuDereferenceProtected {
                    pointer: Box::new(pointer),
                    condition: Box::new(condition),
                },
                span,
            )
        }
        PointerOp::Access => {
            let (_, span, [pointer]) = claim::<1>(node, any)?;
            let pointer = Box::new(pointer);
            (Idiom::RcuAccessPointer { pointer }, span)
        }
        PointerOp::Assign => {
            let (_, span, [pointer, value]) = claim::<2>(node, any)?;
            (
                Idiom::RcuAssignPointer {
                    pointer: Box::new(pointer),
                    value: Box::new(value),
                },
                span,
            )
        }
        PointerOp::Replace => {
            let (_, span, [pointer, value, condition]) = claim::<3>(node, any)?;
            (
                Idiom::RcuReplacePointer {
                    pointer: Box::new(pointer),
                    value: Box::new(value),
                    condition: Box::new(condition),
                },
                span,
            )
        }
    };
    Ok(AstNode::idiom(idiom, span))
}

pub fn match_memory_barrier(node: AstNode) -> Result<AstNode, AstNode> {
    let Some(barrier) =
        invoked_name(&node).and_then(|name| Barrier::ALL.into_iter().find(|b| b.name() == name))
    else {
        return Err(node);
    };
    let (_, span, []) = claim::<0>(node, |_| true)?;
    Ok(AstNode::idiom(Idiom::MemoryBarrier { barrier }, span))
}

/// The traversal a loop was expanded from, if its captured invocation has a
/// valid `list_for_each*` shape.
fn loop_traversal(node: &AstNode) -> Option<ListTraversal> {
    let AstNodeKind::Loop {
        expansion: Some(expansion),
        ..
    } = &node.kind
    else {
        return None;
    };
    if expansion.flavor != ExpansionFlavor::FunctionLike {
        return None;
    }
    let traversal = ListTraversal::ALL
        .into_iter()
        .find(|t| t.name() == expansion.name)?;
    let arity = expansion.args.len();
    let fits = arity == traversal.arity()
        || (traversal.accepts_condition() && arity == traversal.arity() + 1);
    fits.then_some(traversal)
}

struct ListOperands {
    cursor: AstNode,
    scratch: Option<AstNode>,
    head: AstNode,
    member: Option<AstNode>,
    condition: Option<AstNode>,
}

fn take<const N: usize>(args: Vec<AstNode>) -> Result<[AstNode; N], Vec<AstNode>> {
    <[AstNode; N]>::try_from(args)
}

fn list_operands(traversal: ListTraversal, args: Vec<AstNode>) -> Result<ListOperands, Vec<AstNode>> {
    let operands = match traversal {
        ListTraversal::Plain => {
            let [cursor, head] = take::<2>(args)?;
            ListOperands {
                cursor,
                scratch: None,
                head,
                member: None,
                condition: None,
            }
        }
        ListTraversal::Safe => {
            let [cursor, scratch, head] = take::<3>(args)?;
            ListOperands {
                cursor,
                scratch: Some(scratch),
                head,
                member: None,
                condition: None,
            }
        }
        ListTraversal::Entry => {
            let [cursor, head, member] = take::<3>(args)?;
            ListOperands {
                cursor,
                scratch: None,
                head,
                member: Some(member),
                condition: None,
            }
        }
        ListTraversal::EntrySafe => {
            let [cursor, scratch, head, member] = take::<4>(args)?;
            ListOperands {
                cursor,
                scratch: Some(scratch),
                head,
                member: Some(member),
                condition: None,
            }
        }
        ListTraversal::EntryRcu if args.len() == 4 => {
            let [cursor, head, member, condition] = take::<4>(args)?;
            ListOperands {
                cursor,
                scratch: None,
                head,
                member: Some(member),
                condition: Some(condition),
            }
        }
        ListTraversal::EntryRcu => {
            let [cursor, head, member] = take::<3>(args)?;
            ListOperands {
                cursor,
                scratch: None,
                head,
                member: Some(member),
                condition: None,
            }
        }
    };
    Ok(operands)
}

/// A loop whose header came from a `list_for_each*` expansion. The expanded
/// header is dropped; the invocation operands and the loop body are kept.
pub fn match_list_for_each(node: AstNode) -> Result<AstNode, AstNode> {
    let Some(traversal) = loop_traversal(&node) else {
        return Err(node);
    };
    let AstNode { kind, span } = node;
    let (init, condition, step, body, expansion) = match kind {
        AstNodeKind::Loop {
            init,
            condition,
            step,
            body,
            expansion: Some(expansion),
        } => (init, condition, step, body, expansion),
        kind => return Err(AstNode { kind, span }),
    };
    let MacroInvocation { name, args, flavor } = expansion;
    match list_operands(traversal, args) {
        Ok(operands) => Ok(AstNode::idiom(
            Idiom::ListForEach {
                traversal,
                cursor: Box::new(operands.cursor),
                scratch: operands.scratch.map(Box::new),
                head: Box::new(operands.head),
                member: operands.member.map(Box::new),
                condition: operands.condition.map(Box::new),
                body,
            },
            span,
        )),
        Err(args) => Err(AstNode::new(
            AstNodeKind::Loop {
                init,
                condition,
                step,
                body,
                expansion: Some(MacroInvocation { name, args, flavor }),
            },
            span,
        )),
    }
}
