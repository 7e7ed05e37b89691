//! Target index: `(node identity, key)` → diffs touching that slot.
//!
//! Rendering collaborators look diffs up by the node they decorate. The
//! index is rebuilt on demand from a diff list and must never be deep
//! copied alongside a document clone, because it is a derived structure and
//! a stale copy would silently point at the wrong generation of diffs.
//! [`TargetIndex::deep_copy`] therefore reports an internal invariant
//! violation instead of copying.

use std::collections::BTreeMap;

use crate::error::{SchemError, internal_invariant};
use crate::sexp::NodeId;

use super::types::{ApplyMode, DiffId, DiffKey, DiffSet};

/// Lookup from `(target, key)` to the flattened diffs touching that slot.
#[derive(Debug, Default)]
pub struct TargetIndex {
    map: BTreeMap<(NodeId, DiffKey), Vec<DiffId>>,
}

impl TargetIndex {
    /// Build the index from a diff list, flattening nested groups.
    #[must_use]
    pub fn build(set: &DiffSet, roots: &[DiffId]) -> Self {
        let mut map: BTreeMap<(NodeId, DiffKey), Vec<DiffId>> = BTreeMap::new();
        for leaf in set.flatten_roots(roots, ApplyMode::ALL) {
            map.entry((set.target(leaf), set.key(leaf).clone()))
                .or_default()
                .push(leaf);
        }
        Self { map }
    }

    /// Diffs touching the given slot, in discovery order.
    #[must_use]
    pub fn get(&self, target: NodeId, key: &DiffKey) -> &[DiffId] {
        self.map
            .get(&(target, key.clone()))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of indexed slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no diffs are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Deep-copying the index is forbidden; rebuild it from the cloned diff
    /// list instead.
    ///
    /// # Errors
    ///
    /// Always returns [`SchemError::InternalInvariant`].
    pub fn deep_copy(&self) -> Result<Self, SchemError> {
        Err(internal_invariant(
            "target index must be rebuilt from the diff list, not deep copied",
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compare::diff_trees;
    use crate::sexp::parse;

    #[test]
    fn indexes_leaf_diffs_by_slot() {
        let base = parse("(x (v 0) (w 5))").expect("parse");
        let other = parse("(x (v 1) (w 6))").expect("parse");
        let (set, roots) = diff_trees(&base, &other).expect("comparable");
        let index = TargetIndex::build(&set, &roots);
        assert_eq!(index.len(), 2);
        let v = base.children_of(base.root(), "v")[0];
        let hits = index.get(v, &DiffKey::Value(0));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn missing_slot_is_empty() {
        let base = parse("(x (v 0))").expect("parse");
        let other = parse("(x (v 1))").expect("parse");
        let (set, roots) = diff_trees(&base, &other).expect("comparable");
        let index = TargetIndex::build(&set, &roots);
        assert!(index.get(base.root(), &DiffKey::Value(7)).is_empty());
    }

    #[test]
    fn deep_copy_is_rejected() {
        let index = TargetIndex::default();
        let err = index.deep_copy().expect_err("deep copy must fail");
        assert!(matches!(err, SchemError::InternalInvariant { .. }));
    }

    #[test]
    fn rebuild_after_clone_finds_same_slots() {
        let base = parse("(x (v 0))").expect("parse");
        let other = parse("(x (v 1))").expect("parse");
        let (set, roots) = diff_trees(&base, &other).expect("comparable");
        let cloned_set = set.clone();
        let a = TargetIndex::build(&set, &roots);
        let b = TargetIndex::build(&cloned_set, &roots);
        assert_eq!(a.len(), b.len());
    }
}
