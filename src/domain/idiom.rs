//! Recognized kernel idioms.
//!
//! Each variant carries only the operands relevant to its kind. Operand
//! subtrees are moved over from the generic node unchanged, so they may still
//! hold unrecognized generic nodes.

use serde::{Deserialize, Serialize};

use crate::domain::ast::AstNode;

/// Namespace of the dialect recognized idioms are printed in.
pub const KERNEL_DIALECT: &str = "kernel";

/// Read-side flavor shared by the dereference helpers and the lock markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RcuFlavor {
    #[default]
    Plain,
    Bh,
    Sched,
}

impl RcuFlavor {
    pub const ALL: [RcuFlavor; 3] = [RcuFlavor::Plain, RcuFlavor::Bh, RcuFlavor::Sched];

    pub fn name(&self) -> &'static str {
        match self {
            RcuFlavor::Plain => "plain",
            RcuFlavor::Bh => "bh",
            RcuFlavor::Sched => "sched",
        }
    }

    pub fn dereference(&self) -> &'static str {
        match self {
            RcuFlavor::Plain => "rcu_dereference",
            RcuFlavor::Bh => "rcu_dereference_bh",
            RcuFlavor::Sched => "rcu_dereference_sched",
        }
    }

    pub fn dereference_check(&self) -> &'static str {
        match self {
            RcuFlavor::Plain => "rcu_dereference_check",
            RcuFlavor::Bh => "rcu_dereference_bh_check",
            RcuFlavor::Sched => "rcu_dereference_sched_check",
        }
    }

    pub fn read_lock(&self) -> &'static str {
        match self {
            RcuFlavor::Plain => "rcu_read_lock",
            RcuFlavor::Bh => "rcu_read_lock_bh",
            RcuFlavor::Sched => "rcu_read_lock_sched",
        }
    }

    pub fn read_unlock(&self) -> &'static str {
        match self {
            RcuFlavor::Plain => "rcu_read_unlock",
            RcuFlavor::Bh => "rcu_read_unlock_bh",
            RcuFlavor::Sched => "rcu_read_unlock_sched",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Barrier {
    Full,
    Read,
    Write,
    BeforeAtomic,
    AfterAtomic,
}

impl Barrier {
    pub const ALL: [Barrier; 5] = [
        Barrier::Full,
        Barrier::Read,
        Barrier::Write,
        Barrier::BeforeAtomic,
        Barrier::AfterAtomic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Barrier::Full => "smp_mb",
            Barrier::Read => "smp_rmb",
            Barrier::Write => "smp_wmb",
            Barrier::BeforeAtomic => "smp_mb__before_atomic",
            Barrier::AfterAtomic => "smp_mb__after_atomic",
        }
    }
}

/// `list_for_each*` traversal shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListTraversal {
    /// `list_for_each(pos, head)`
    Plain,
    /// `list_for_each_safe(pos, n, head)`
    Safe,
    /// `list_for_each_entry(pos, head, member)`
    Entry,
    /// `list_for_each_entry_safe(pos, n, head, member)`
    EntrySafe,
    /// `list_for_each_entry_rcu(pos, head, member[, cond])`
    EntryRcu,
}

impl ListTraversal {
    pub const ALL: [ListTraversal; 5] = [
        ListTraversal::Plain,
        ListTraversal::Safe,
        ListTraversal::Entry,
        ListTraversal::EntrySafe,
        ListTraversal::EntryRcu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ListTraversal::Plain => "list_for_each",
            ListTraversal::Safe => "list_for_each_safe",
            ListTraversal::Entry => "list_for_each_entry",
            ListTraversal::EntrySafe => "list_for_each_entry_safe",
            ListTraversal::EntryRcu => "list_for_each_entry_rcu",
        }
    }

    pub fn has_scratch(&self) -> bool {
        matches!(self, ListTraversal::Safe | ListTraversal::EntrySafe)
    }

    pub fn has_member(&self) -> bool {
        matches!(
            self,
            ListTraversal::Entry | ListTraversal::EntrySafe | ListTraversal::EntryRcu
        )
    }

    /// Operand count without the optional lockdep condition.
    pub fn arity(&self) -> usize {
        2 + usize::from(self.has_scratch()) + usize::from(self.has_member())
    }

    pub fn accepts_condition(&self) -> bool {
        matches!(self, ListTraversal::EntryRcu)
    }
}

/// Tagged variant over every recognized idiom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Idiom {
    RcuDereference {
        flavor: RcuFlavor,
        pointer: Box<AstNode>,
    },
    RcuDereferenceCheck {
        flavor: RcuFlavor,
        pointer: Box<AstNode>,
        condition: Box<AstNode>,
    },
    RcuDereferenceProtected {
        pointer: Box<AstNode>,
        condition: Box<AstNode>,
    },
    RcuAccessPointer {
        pointer: Box<AstNode>,
    },
    RcuAssignPointer {
        pointer: Box<AstNode>,
        value: Box<AstNode>,
    },
    RcuReplacePointer {
        pointer: Box<AstNode>,
        value: Box<AstNode>,
        condition: Box<AstNode>,
    },
    MemoryBarrier {
        barrier: Barrier,
    },
    ListForEach {
        traversal: ListTraversal,
        cursor: Box<AstNode>,
        #[serde(default)]
        scratch: Option<Box<AstNode>>,
        head: Box<AstNode>,
        #[serde(default)]
        member: Option<Box<AstNode>>,
        #[serde(default)]
        condition: Option<Box<AstNode>>,
        body: Box<AstNode>,
    },
    OffsetOf {
        record: Box<AstNode>,
        member: Box<AstNode>,
    },
    ContainerOf {
        pointer: Box<AstNode>,
        record: Box<AstNode>,
        member: Box<AstNode>,
    },
    GetUser {
        /// `get_user` checks the user pointer, `__get_user` does not.
        checked: bool,
        destination: Box<AstNode>,
        source: Box<AstNode>,
    },
    /// A label with its statement hoisted out into the enclosing scope.
    Label {
        name: String,
    },
}

impl Idiom {
    /// The macro spelling this idiom was recognized from.
    pub fn macro_name(&self) -> &'static str {
        match self {
            Idiom::RcuDereference { flavor, .. } => flavor.dereference(),
            Idiom::RcuDereferenceCheck { flavor, .. } => flavor.dereference_check(),
            Idiom::RcuDereferenceProtected { .. } => "rcu_dereference_protected",
            Idiom::RcuAccessPointer { .. } => "rcu_access_pointer",
            Idiom::RcuAssignPointer { .. } => "rcu_assign_pointer",
            Idiom::RcuReplacePointer { .. } => "rcu_replace_pointer",
            Idiom::MemoryBarrier { barrier } => barrier.name(),
            Idiom::ListForEach { traversal, .. } => traversal.name(),
            Idiom::OffsetOf { .. } => "offsetof",
            Idiom::ContainerOf { .. } => "container_of",
            Idiom::GetUser { checked: true, .. } => "get_user",
            Idiom::GetUser { checked: false, .. } => "__get_user",
            Idiom::Label { .. } => "label",
        }
    }

    /// Fully qualified op name, e.g. `kernel.rcu_dereference`.
    pub fn op_name(&self) -> String {
        match self {
            Idiom::Label { .. } => "hl.label_stmt".to_string(),
            other => format!("{KERNEL_DIALECT}.{}", other.macro_name()),
        }
    }

    /// Dereference, access, assign and replace helpers: the operations that
    /// are only safe inside a read-side critical section.
    pub fn is_rcu_pointer_op(&self) -> bool {
        matches!(
            self,
            Idiom::RcuDereference { .. }
                | Idiom::RcuDereferenceCheck { .. }
                | Idiom::RcuDereferenceProtected { .. }
                | Idiom::RcuAccessPointer { .. }
                | Idiom::RcuAssignPointer { .. }
                | Idiom::RcuReplacePointer { .. }
        )
    }

    pub fn operands(&self) -> Vec<&AstNode> {
        match self {
            Idiom::RcuDereference { pointer, .. } | Idiom::RcuAccessPointer { pointer } => {
                vec![pointer.as_ref()]
            }
            Idiom::RcuDereferenceCheck {
                pointer, condition, ..
            }
            | Idiom::RcuDereferenceProtected { pointer, condition } => {
                vec![pointer.as_ref(), condition.as_ref()]
            }
            Idiom::RcuAssignPointer { pointer, value } => vec![pointer.as_ref(), value.as_ref()],
            Idiom::RcuReplacePointer {
                pointer,
                value,
                condition,
            } => vec![pointer.as_ref(), value.as_ref(), condition.as_ref()],
            Idiom::ListForEach {
                cursor,
                scratch,
                head,
                member,
                condition,
                body,
                ..
            } => {
                let mut out = vec![cursor.as_ref()];
                out.extend(scratch.as_deref());
                out.push(head.as_ref());
                out.extend(member.as_deref());
                out.extend(condition.as_deref());
                out.push(body.as_ref());
                out
            }
            Idiom::OffsetOf { record, member } => vec![record.as_ref(), member.as_ref()],
            Idiom::ContainerOf {
                pointer,
                record,
                member,
            } => vec![pointer.as_ref(), record.as_ref(), member.as_ref()],
            Idiom::GetUser {
                destination,
                source,
                ..
            } => vec![destination.as_ref(), source.as_ref()],
            Idiom::MemoryBarrier { .. } | Idiom::Label { .. } => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut AstNode> {
        match self {
            Idiom::RcuDereference { pointer, .. } | Idiom::RcuAccessPointer { pointer } => {
                vec![pointer.as_mut()]
            }
            Idiom::RcuDereferenceCheck {
                pointer, condition, ..
            }
            | Idiom::RcuDereferenceProtected { pointer, condition } => {
                vec![pointer.as_mut(), condition.as_mut()]
            }
            Idiom::RcuAssignPointer { pointer, value } => vec![pointer.as_mut(), value.as_mut()],
            Idiom::RcuReplacePointer {
                pointer,
                value,
                condition,
            } => vec![pointer.as_mut(), value.as_mut(), condition.as_mut()],
            Idiom::ListForEach {
                cursor,
                scratch,
                head,
                member,
                condition,
                body,
                ..
            } => {
                let mut out = vec![cursor.as_mut()];
                out.extend(scratch.as_deref_mut());
                out.push(head.as_mut());
                out.extend(member.as_deref_mut());
                out.extend(condition.as_deref_mut());
                out.push(body.as_mut());
                out
            }
            Idiom::OffsetOf { record, member } => vec![record.as_mut(), member.as_mut()],
            Idiom::ContainerOf {
                pointer,
                record,
                member,
            } => vec![pointer.as_mut(), record.as_mut(), member.as_mut()],
            Idiom::GetUser {
                destination,
                source,
                ..
            } => vec![destination.as_mut(), source.as_mut()],
            Idiom::MemoryBarrier { .. } | Idiom::Label { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::span::SourceSpan;

    fn operand() -> Box<AstNode> {
        Box::new(AstNode::identifier("p", SourceSpan::new("t.c", 1, 1)))
    }

    #[test]
    fn test_op_names_follow_flavor() {
        let bh = Idiom::RcuDereference {
            flavor: RcuFlavor::Bh,
            pointer: operand(),
        };
        assert_eq!(bh.op_name(), "kernel.rcu_dereference_bh");

        let check = Idiom::RcuDereferenceCheck {
            flavor: RcuFlavor::Sched,
            pointer: operand(),
            condition: operand(),
        };
        assert_eq!(check.macro_name(), "rcu_dereference_sched_check");
        assert_eq!(RcuFlavor::Bh.read_unlock(), "rcu_read_unlock_bh");
    }

    #[test]
    fn test_pointer_op_classification() {
        assert!(Idiom::RcuAccessPointer { pointer: operand() }.is_rcu_pointer_op());
        assert!(!Idiom::MemoryBarrier { barrier: Barrier::Full }.is_rcu_pointer_op());
        assert!(!Idiom::Label { name: "out".to_string() }.is_rcu_pointer_op());
    }

    #[test]
    fn test_list_traversal_arity() {
        assert_eq!(ListTraversal::Plain.arity(), 2);
        assert_eq!(ListTraversal::Safe.arity(), 3);
        assert_eq!(ListTraversal::Entry.arity(), 3);
        assert_eq!(ListTraversal::EntrySafe.arity(), 4);
        assert_eq!(ListTraversal::EntryRcu.arity(), 3);
        assert!(ListTraversal::EntryRcu.accepts_condition());
    }

    #[test]
    fn test_list_operands_in_source_order() {
        let idiom = Idiom::ListForEach {
            traversal: ListTraversal::EntrySafe,
            cursor: operand(),
            scratch: Some(operand()),
            head: operand(),
            member: Some(operand()),
            condition: None,
            body: Box::new(AstNode::block(vec![], SourceSpan::new("t.c", 2, 1))),
        };
        assert_eq!(idiom.operands().len(), 5);
    }
}
