//! Contains-rewrite: given `LiteralSet S contains X` assumed true, simplify
//! a sibling `LiteralSet T contains X` on the same `X` using set algebra:
//! subset implies true, disjoint implies false, otherwise either
//! negate-and-shrink or intersect, whichever yields the smaller set.

use std::collections::HashMap;

use crate::ast::LiteralSetItem;

fn key(item: &LiteralSetItem) -> String {
    match item {
        LiteralSetItem::Num(n) => format!("n:{n}"),
        LiteralSetItem::Str(s) => format!("s:{s}"),
    }
}

/// What a sibling `contains` collapses to once the pivot set is assumed to
/// contain `X`.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainsRewrite {
    AlwaysTrue,
    AlwaysFalse,
    /// Replace the sibling's set with this one, then negate the result
    /// (`¬(remainder contains X)`); used when the complement is smaller
    /// than the intersection would be.
    NegatedRemainder(Vec<LiteralSetItem>),
    /// Replace the sibling's set with the intersection of the two.
    Intersected(Vec<LiteralSetItem>),
}

pub fn contains_rewrite(pivot: &[LiteralSetItem], sibling: &[LiteralSetItem]) -> ContainsRewrite {
    let pivot_keys: std::collections::HashSet<String> = pivot.iter().map(key).collect();
    let sibling_keys: std::collections::HashSet<String> = sibling.iter().map(key).collect();

    if pivot_keys.is_subset(&sibling_keys) {
        return ContainsRewrite::AlwaysTrue;
    }
    if pivot_keys.is_disjoint(&sibling_keys) {
        return ContainsRewrite::AlwaysFalse;
    }

    let intersection: Vec<LiteralSetItem> = sibling
        .iter()
        .filter(|item| pivot_keys.contains(&key(item)))
        .cloned()
        .collect();
    let remainder: Vec<LiteralSetItem> = sibling
        .iter()
        .filter(|item| !pivot_keys.contains(&key(item)))
        .cloned()
        .collect();

    if remainder.len() < intersection.len() {
        ContainsRewrite::NegatedRemainder(remainder)
    } else {
        ContainsRewrite::Intersected(intersection)
    }
}

/// The assumed-false counterpart of [`contains_rewrite`]: `X` is known *not*
/// to be in the pivot set `S`. A sibling `T contains X` is false outright
/// when every element of `T` is also in `S` (none of them can be `X`
/// either); otherwise the elements `T` shares with `S` can be dropped, since
/// none of them can be the `X` that made `T` match.
pub fn contains_rewrite_assumed_false(pivot: &[LiteralSetItem], sibling: &[LiteralSetItem]) -> ContainsRewrite {
    let pivot_keys: std::collections::HashSet<String> = pivot.iter().map(key).collect();
    let sibling_keys: std::collections::HashSet<String> = sibling.iter().map(key).collect();

    if sibling_keys.is_subset(&pivot_keys) {
        return ContainsRewrite::AlwaysFalse;
    }

    let remainder: Vec<LiteralSetItem> = sibling
        .iter()
        .filter(|item| !pivot_keys.contains(&key(item)))
        .cloned()
        .collect();
    ContainsRewrite::Intersected(remainder)
}

/// Picks the sibling set most worth assuming a pivot, by the harmonic mean
/// of each of its elements' frequency across every set in the group — a
/// set whose elements are rare elsewhere is a poor pivot even if it is
/// itself large, because few siblings share its elements.
pub fn select_rewrite_expression(
    sets: &[Vec<LiteralSetItem>],
    min_density: f64,
) -> Option<usize> {
    if sets.is_empty() {
        return None;
    }

    let mut frequency: HashMap<String, usize> = HashMap::new();
    for set in sets {
        for item in set {
            *frequency.entry(key(item)).or_insert(0) += 1;
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for (idx, set) in sets.iter().enumerate() {
        if set.is_empty() {
            continue;
        }
        let score = harmonic_mean(set.iter().map(|item| frequency[&key(item)] as f64));
        if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
            best = Some((idx, score));
        }
    }

    best.filter(|(_, score)| *score >= min_density).map(|(idx, _)| idx)
}

fn harmonic_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0usize;
    let mut sum_of_reciprocals = 0.0;
    for v in values {
        count += 1;
        sum_of_reciprocals += 1.0 / v;
    }
    if count == 0 || sum_of_reciprocals == 0.0 {
        0.0
    } else {
        count as f64 / sum_of_reciprocals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LiteralSetItem::Num;

    #[test]
    fn subset_pivot_is_always_true() {
        let pivot = vec![Num(1.0), Num(2.0)];
        let sibling = vec![Num(1.0), Num(2.0), Num(3.0)];
        assert_eq!(contains_rewrite(&pivot, &sibling), ContainsRewrite::AlwaysTrue);
    }

    #[test]
    fn disjoint_sets_are_always_false() {
        let pivot = vec![Num(1.0), Num(2.0)];
        let sibling = vec![Num(9.0)];
        assert_eq!(contains_rewrite(&pivot, &sibling), ContainsRewrite::AlwaysFalse);
    }

    #[test]
    fn overlapping_sets_shrink_by_intersection_or_negation() {
        // {2 3 4} vs pivot {1 2 3}: intersection {2,3} (len 2), remainder {4} (len 1)
        let pivot = vec![Num(1.0), Num(2.0), Num(3.0)];
        let sibling = vec![Num(2.0), Num(3.0), Num(4.0)];
        assert_eq!(
            contains_rewrite(&pivot, &sibling),
            ContainsRewrite::NegatedRemainder(vec![Num(4.0)])
        );
    }

    #[test]
    fn assumed_false_excludes_sibling_that_is_a_subset_of_pivot() {
        let pivot = vec![Num(1.0), Num(2.0), Num(3.0)];
        let sibling = vec![Num(2.0), Num(3.0)];
        assert_eq!(contains_rewrite_assumed_false(&pivot, &sibling), ContainsRewrite::AlwaysFalse);
    }

    #[test]
    fn assumed_false_drops_shared_elements_from_sibling() {
        let pivot = vec![Num(1.0), Num(2.0), Num(3.0)];
        let sibling = vec![Num(2.0), Num(3.0), Num(4.0)];
        assert_eq!(
            contains_rewrite_assumed_false(&pivot, &sibling),
            ContainsRewrite::Intersected(vec![Num(4.0)])
        );
    }

    #[test]
    fn highest_harmonic_mean_set_is_selected() {
        let sets = vec![vec![Num(1.0), Num(2.0), Num(3.0)], vec![Num(2.0), Num(3.0), Num(4.0)], vec![
            Num(3.0),
            Num(4.0),
            Num(5.0),
        ]];
        assert!(select_rewrite_expression(&sets, 0.0).is_some());
    }
}
