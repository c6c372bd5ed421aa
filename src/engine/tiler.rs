//! Generic tree-pattern-matching-and-rewrite mechanism. Every rewrite pass
//! in this crate (the peephole optimizer, the canonicalizer, the compare
//! and contains rewriters, the CSE compactor, the cache inserter) is built
//! on top of [`tile`]: walk the tree, and at each node that a [`Pattern`]
//! matches, ask a replacement callback whether to substitute it.

use std::rc::Rc;

use crate::ast::{Node, NodeRef};

/// Something that can test whether it matches a given node. Patterns are
/// ordinary predicates over a node's shape (type, operator, static-ness);
/// see [`op_is`], [`any`], and the `And`/`Or` combinators for composing
/// them.
pub trait Pattern {
    fn matches(&self, node: &NodeRef) -> bool;
}

impl<F: Fn(&NodeRef) -> bool> Pattern for F {
    fn matches(&self, node: &NodeRef) -> bool {
        self(node)
    }
}

pub struct AnyPattern;
impl Pattern for AnyPattern {
    fn matches(&self, _node: &NodeRef) -> bool {
        true
    }
}

pub fn any() -> AnyPattern {
    AnyPattern
}

/// A pattern built from a boxed predicate closure, for call sites that
/// need to store a heterogeneous list of patterns.
pub struct BoxPattern(pub Box<dyn Fn(&NodeRef) -> bool>);
impl Pattern for BoxPattern {
    fn matches(&self, node: &NodeRef) -> bool {
        (self.0)(node)
    }
}

pub fn pred(f: impl Fn(&NodeRef) -> bool + 'static) -> BoxPattern {
    BoxPattern(Box::new(f))
}

/// Walk `node`, and at every position where some pattern in `patterns`
/// matches, call `repl`. If `repl` returns `Some(replacement)`, the
/// replacement is tiled again from scratch (so a single rewrite can expose
/// another one directly below it); otherwise the walk recurses into the
/// node's children and rebuilds the node only if a child actually changed,
/// preserving `Rc` sharing for untouched subtrees.
pub fn tile(
    node: &NodeRef,
    patterns: &[&dyn Pattern],
    repl: &mut dyn FnMut(&NodeRef) -> Option<NodeRef>,
) -> NodeRef {
    for pattern in patterns {
        if pattern.matches(node) {
            if let Some(replacement) = repl(node) {
                return tile(&replacement, patterns, repl);
            }
        }
    }

    let children = node.children();
    if children.is_empty() {
        return node.clone();
    }

    let new_children: Vec<NodeRef> = children.iter().map(|c| tile(c, patterns, repl)).collect();
    let unchanged = new_children
        .iter()
        .zip(children.iter())
        .all(|(a, b)| Rc::ptr_eq(a, b));

    if unchanged {
        node.clone()
    } else {
        Rc::new(node.with_children(new_children))
    }
}

/// Convenience: tile with a single pattern, the common case.
pub fn tile_one(
    node: &NodeRef,
    pattern: &dyn Pattern,
    repl: &mut dyn FnMut(&NodeRef) -> Option<NodeRef>,
) -> NodeRef {
    tile(node, &[pattern], repl)
}

pub fn is_logical(node: &NodeRef) -> bool {
    matches!(node.as_ref(), Node::Logical { .. })
}

pub fn is_compare(node: &NodeRef) -> bool {
    matches!(node.as_ref(), Node::Compare { .. })
}

pub fn is_negate(node: &NodeRef) -> bool {
    matches!(node.as_ref(), Node::Negate(_))
}

pub fn is_contains(node: &NodeRef) -> bool {
    matches!(node.as_ref(), Node::Contains { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, LogicalOp};

    #[test]
    fn tile_replaces_matching_nodes_bottom_up() {
        let tree: NodeRef = Rc::new(Node::Logical {
            op: LogicalOp::And,
            left: Rc::new(Node::ConstantBool(true)),
            right: Rc::new(Node::Compare {
                op: CompareOp::Eq,
                left: Rc::new(Node::Number(1.0)),
                right: Rc::new(Node::Number(1.0)),
            }),
        });

        let result = tile_one(
            &tree,
            &pred(|n| matches!(n.as_ref(), Node::ConstantBool(true))),
            &mut |_| Some(Rc::new(Node::ConstantBool(false))),
        );

        match result.as_ref() {
            Node::Logical { left, .. } => {
                assert!(matches!(left.as_ref(), Node::ConstantBool(false)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tile_preserves_sharing_when_nothing_matches() {
        let leaf: NodeRef = Rc::new(Node::Number(4.0));
        let tree: NodeRef = Rc::new(Node::Negate(leaf.clone()));
        let result = tile_one(&tree, &pred(|_| false), &mut |_| None);
        match result.as_ref() {
            Node::Negate(inner) => assert!(Rc::ptr_eq(inner, &leaf)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
