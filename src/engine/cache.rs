//! Wraps subtrees that the CSE compactor left referenced from more than one
//! place in a `CachedNode`, so the second (and later) reference reuses the
//! first evaluation's result instead of recomputing it (4.G).

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ast::{Node, NodeRef};

static NEXT_CACHE_ID: AtomicUsize = AtomicUsize::new(1);

/// Wrap `node` in a fresh `Cached` id. Call this once per logically-shared
/// subtree, then clone the returned `NodeRef` everywhere it is reused —
/// every clone shares the same cache id and therefore the same
/// once-per-evaluation result.
pub fn wrap_cached(node: NodeRef) -> NodeRef {
    if matches!(node.as_ref(), Node::Cached { .. }) {
        return node;
    }
    let id = NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed);
    Rc::new(Node::Cached { id, inner: node })
}

/// Nodes that exist purely to wire the merged forest together, and so gain
/// nothing from being memoized (`Both`/`PushResult` must run every time to
/// fan out to every predicate; `Cached` is already a cache).
fn is_cacheable_operator(node: &NodeRef) -> bool {
    !node.is_leaf() && !matches!(node.as_ref(), Node::Both(..) | Node::PushResult { .. } | Node::Cached { .. })
}

/// Counts, by `Rc` pointer identity, how many times each subtree is
/// reached while walking `node` — after [`crate::engine::compact::compact`]
/// has run, a count greater than one means two or more parents share the
/// exact same physical subtree.
fn count_by_identity(node: &NodeRef, counts: &mut HashMap<usize, usize>) {
    let ptr = Rc::as_ptr(node) as usize;
    let entry = counts.entry(ptr).or_insert(0);
    *entry += 1;
    if *entry == 1 {
        for child in node.children() {
            count_by_identity(&child, counts);
        }
    }
}

/// Walks the post-compaction tree and wraps every shared operator subtree
/// (reached from more than one parent) in a single `CachedNode`, so its
/// first evaluation under a document fills the cache and every later
/// reference to the same shared subtree within that evaluation hits it.
pub fn insert_caches(node: &NodeRef) -> NodeRef {
    let mut counts = HashMap::new();
    count_by_identity(node, &mut counts);

    let mut rewritten: HashMap<usize, NodeRef> = HashMap::new();
    rewrite(node, &counts, &mut rewritten)
}

fn rewrite(node: &NodeRef, counts: &HashMap<usize, usize>, rewritten: &mut HashMap<usize, NodeRef>) -> NodeRef {
    let ptr = Rc::as_ptr(node) as usize;
    if let Some(existing) = rewritten.get(&ptr) {
        return existing.clone();
    }

    let children = node.children();
    let new_children: Vec<NodeRef> = children.iter().map(|c| rewrite(c, counts, rewritten)).collect();
    let rebuilt = if new_children.iter().zip(children.iter()).all(|(a, b)| Rc::ptr_eq(a, b)) {
        node.clone()
    } else {
        Rc::new(node.with_children(new_children))
    };

    let shared = counts.get(&ptr).copied().unwrap_or(0) > 1;
    let result = if shared && is_cacheable_operator(node) { wrap_cached(rebuilt) } else { rebuilt };

    rewritten.insert(ptr, result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, EvalContext};
    use crate::document::Document;
    use crate::resolver::DocumentResolver;

    #[test]
    fn cached_node_only_evaluates_once() {
        let guard = wrap_cached(Rc::new(Node::Compare {
            op: CompareOp::Gt,
            left: Rc::new(Node::Literal("age".into())),
            right: Rc::new(Node::Number(30.0)),
        }));
        let tree = Rc::new(Node::Both(guard.clone(), guard.clone()));

        let doc = Document::from_str(r#"{"age": 40}"#).unwrap();
        let resolver = DocumentResolver::new();
        let mut ctx = EvalContext::new(&doc, &resolver);
        crate::ast::eval_value(&tree, &mut ctx);

        // The guard is reached twice (once per `Both` branch) but only
        // computed once — that's the point of wrapping it in a cache id.
        let Node::Cached { id, .. } = guard.as_ref() else { unreachable!() };
        assert_eq!(ctx.reach_count(*id), 2);
    }

    #[test]
    fn insert_caches_wraps_a_subtree_shared_by_two_parents() {
        let shared = Rc::new(Node::Compare {
            op: CompareOp::Gt,
            left: Rc::new(Node::Literal("age".into())),
            right: Rc::new(Node::Number(30.0)),
        });
        let tree = Rc::new(Node::Logical {
            op: crate::ast::LogicalOp::Or,
            left: shared.clone(),
            right: Rc::new(Node::Negate(shared.clone())),
        });

        let cached = insert_caches(&tree);
        match cached.as_ref() {
            Node::Logical { left, right, .. } => {
                assert!(matches!(left.as_ref(), Node::Cached { .. }));
                match right.as_ref() {
                    Node::Negate(inner) => assert!(matches!(inner.as_ref(), Node::Cached { .. })),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn insert_caches_leaves_unshared_subtrees_alone() {
        let tree = Rc::new(Node::Compare {
            op: CompareOp::Gt,
            left: Rc::new(Node::Literal("age".into())),
            right: Rc::new(Node::Number(30.0)),
        });
        let result = insert_caches(&tree);
        assert!(matches!(result.as_ref(), Node::Compare { .. }));
    }
}
