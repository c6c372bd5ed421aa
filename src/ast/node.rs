//! The predicate AST. Nodes are immutable and children are shared via `Rc`
//! so that rewrites can graft in new subtrees without deep-copying the
//! parts that did not change, and so the merger can let many predicates
//! share one physical subtree.

use std::rc::Rc;
use std::sync::Arc;

use regex::Regex;

use crate::ast::PredicateHandle;

pub type NodeRef = Rc<Node>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Is,
    IsNot,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::NotEq | CompareOp::Is | CompareOp::IsNot)
    }

    pub fn is_negated(self) -> bool {
        matches!(self, CompareOp::NotEq | CompareOp::IsNot)
    }

    pub fn negate(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::NotEq,
            CompareOp::NotEq => CompareOp::Eq,
            CompareOp::Is => CompareOp::IsNot,
            CompareOp::IsNot => CompareOp::Is,
            CompareOp::Lt => CompareOp::GtEq,
            CompareOp::LtEq => CompareOp::Gt,
            CompareOp::Gt => CompareOp::LtEq,
            CompareOp::GtEq => CompareOp::Lt,
        }
    }

    /// Flip the operand order (a op b  <=>  b flipped(op) a).
    pub fn flip(self) -> CompareOp {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

/// A compiled regular expression literal. Carries its source so two
/// structurally-identical patterns compare equal for CSE/canonicalization.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    pub source: String,
    pub regex: Arc<Regex>,
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A predicate AST node.
///
/// This mirrors the node taxonomy of a classic expression tree (literal
/// identifier references, constants, comparison/logical/contains/match
/// operators, negation) plus two node kinds that only appear in a *merged*
/// tree built by the refactorer: [`Node::Both`], which evaluates two
/// subtrees in sequence so several predicates can share a common prefix,
/// and [`Node::PushResult`], the leaf that reports a predicate as matched.
#[derive(Debug, Clone)]
pub enum Node {
    /// A dotted-path reference into the document, e.g. `request.user.age`.
    Literal(String),
    Number(f64),
    ConstantStr(String),
    ConstantBool(bool),
    ConstantNull,
    /// A `{1 2 3}` literal set, used on the right of `contains`.
    LiteralSet(Vec<LiteralSetItem>),
    RegexLit(CompiledRegex),
    Undefined,
    Empty,

    Negate(NodeRef),
    Compare {
        op: CompareOp,
        left: NodeRef,
        right: NodeRef,
    },
    Logical {
        op: LogicalOp,
        left: NodeRef,
        right: NodeRef,
    },
    Contains {
        left: NodeRef,
        right: NodeRef,
    },
    Matches {
        left: NodeRef,
        right: NodeRef,
    },

    /// Wraps a subtree so that a duplicate occurrence elsewhere in the
    /// merged forest can reuse its already-computed result instead of
    /// re-evaluating (4.G: CSE cache).
    Cached { id: usize, inner: NodeRef },

    /// Evaluates `left` then `right` regardless of `left`'s result; used by
    /// the merger to chain subtrees that share a common prefix.
    Both(NodeRef, NodeRef),

    /// Evaluates `expr` exactly once, then dispatches to exactly one of
    /// `when_true`/`when_false` depending on its truthiness. A missing
    /// branch is treated as `false`. This is the vehicle for branch
    /// expansion (4.F): the refactorer picks a pivot expression, rewrites
    /// each side assuming its truth value, and grafts the results back
    /// together as a single `Branch`.
    Branch {
        expr: NodeRef,
        when_true: Option<NodeRef>,
        when_false: Option<NodeRef>,
    },

    /// Leaf of a merged tree: if `inner` evaluates true, report `handle` as
    /// a match.
    PushResult { inner: NodeRef, handle: PredicateHandle },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralSetItem {
    Num(f64),
    Str(String),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Node::Literal(_)
                | Node::Number(_)
                | Node::ConstantStr(_)
                | Node::ConstantBool(_)
                | Node::ConstantNull
                | Node::LiteralSet(_)
                | Node::RegexLit(_)
                | Node::Undefined
                | Node::Empty
        )
    }

    /// A value that does not depend on the document (a compile-time
    /// constant). Used by the canonicalizer to decide operand ordering and
    /// by the static resolver to fold constant subexpressions.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            Node::Number(_)
                | Node::ConstantStr(_)
                | Node::ConstantBool(_)
                | Node::ConstantNull
                | Node::LiteralSet(_)
                | Node::RegexLit(_)
                | Node::Undefined
                | Node::Empty
        )
    }

    /// Direct children, left-to-right, for generic tree walks (tiler,
    /// compactor, optimizer).
    pub fn children(&self) -> Vec<NodeRef> {
        match self {
            Node::Negate(n) => vec![n.clone()],
            Node::Compare { left, right, .. }
            | Node::Logical { left, right, .. }
            | Node::Contains { left, right }
            | Node::Matches { left, right } => vec![left.clone(), right.clone()],
            Node::Cached { inner, .. } => vec![inner.clone()],
            Node::Both(a, b) => vec![a.clone(), b.clone()],
            Node::PushResult { inner, .. } => vec![inner.clone()],
            Node::Branch { expr, when_true, when_false } => {
                let mut out = vec![expr.clone()];
                if let Some(t) = when_true {
                    out.push(t.clone());
                }
                if let Some(f) = when_false {
                    out.push(f.clone());
                }
                out
            }
            _ => vec![],
        }
    }

    /// Rebuild this node with new children, preserving operator/metadata.
    /// `children` must have the same length `self.children()` would return.
    pub fn with_children(&self, mut children: Vec<NodeRef>) -> Node {
        match self {
            Node::Negate(_) => Node::Negate(children.remove(0)),
            Node::Compare { op, .. } => Node::Compare {
                op: *op,
                left: children.remove(0),
                right: children.remove(0),
            },
            Node::Logical { op, .. } => Node::Logical {
                op: *op,
                left: children.remove(0),
                right: children.remove(0),
            },
            Node::Contains { .. } => Node::Contains {
                left: children.remove(0),
                right: children.remove(0),
            },
            Node::Matches { .. } => Node::Matches {
                left: children.remove(0),
                right: children.remove(0),
            },
            Node::Cached { id, .. } => Node::Cached {
                id: *id,
                inner: children.remove(0),
            },
            Node::Both(_, _) => Node::Both(children.remove(0), children.remove(0)),
            Node::PushResult { handle, .. } => Node::PushResult {
                inner: children.remove(0),
                handle: handle.clone(),
            },
            Node::Branch { when_true, when_false, .. } => {
                let expr = children.remove(0);
                let when_true = if when_true.is_some() { Some(children.remove(0)) } else { None };
                let when_false = if when_false.is_some() { Some(children.remove(0)) } else { None };
                Node::Branch { expr, when_true, when_false }
            }
            other => other.clone(),
        }
    }
}
