//! Comparable contract over node trees: structural diff, distance, and
//! diff application.
//!
//! [`diff_trees`] emits a recursive difference tree such that applying every
//! diff to the base makes it structurally equal to the other tree. Matching
//! within sub-node groups goes through the list matcher, so reordered
//! children still pair up.
//!
//! Application reports one of three outcomes per leaf: applied, redundant
//! (the effect was already achieved), or conflict (a prior apply left the
//! target incompatible). The three-way merger sorts those outcomes into
//! safe and conflicting buckets.

use crate::model::class::NodeClass;
use crate::sexp::{Atom, NodeId, Tree, Value};

use super::matcher::match_lists;
use super::types::{ApplyMode, DiffId, DiffItem, DiffKey, DiffPayload, DiffRec, DiffSet};

/// Child-node groups whose changes are cosmetic bookkeeping: they merge
/// silently and never surface as conflicts on their own.
const UNIMPORTANT_TYPES: &[&str] = &[
    "embedded_fonts",
    "fields_autoplaced",
    "generator",
    "generator_version",
    "sheet_instances",
    "symbol_instances",
    "uuid",
    "version",
];

/// Group key for untyped sub-nodes.
fn untyped_group() -> Atom {
    Atom::from("")
}

// ---------------------------------------------------------------------------
// Diffing
// ---------------------------------------------------------------------------

/// Compare two whole trees. Returns the diff set and its roots, or `None`
/// when the roots are disparate (different kinds; no structural merge is
/// meaningful).
#[must_use]
pub fn diff_trees(base: &Tree, other: &Tree) -> Option<(DiffSet, Vec<DiffId>)> {
    let mut set = DiffSet::new();
    let roots = diff_nodes(base, base.root(), other, other.root(), &mut set, false)?;
    set.set_roots(roots.clone());
    Some((set, roots))
}

/// Compare two nodes; returns the list of child diffs, or `None` when the
/// nodes are disparate.
pub fn diff_nodes(
    base: &Tree,
    a: NodeId,
    other: &Tree,
    b: NodeId,
    set: &mut DiffSet,
    unimportant: bool,
) -> Option<Vec<DiffId>> {
    if base.node_type(a) != other.node_type(b) || base.class(a) != other.class(b) {
        return None;
    }
    // Fields whose name and value both changed are different fields, not a
    // modification of one.
    if base.class(a) == NodeClass::Field {
        let name_differs = base.value_at(a, 0) != other.value_at(b, 0);
        let value_differs = base.value_at(a, 1) != other.value_at(b, 1);
        if name_differs && value_differs {
            return None;
        }
    }

    let mut out = Vec::new();

    // Positional value comparison. Removals are emitted highest-index
    // first so applying them never shifts a lower slot out from under a
    // later diff.
    let a_vals: Vec<&Value> = base.values(a).collect();
    let b_vals: Vec<&Value> = other.values(b).collect();
    let mut removals = Vec::new();
    for i in 0..a_vals.len().max(b_vals.len()) {
        let payload = match (a_vals.get(i), b_vals.get(i)) {
            (Some(x), Some(y)) if x != y => DiffPayload::Modify((*x).clone(), (*y).clone()),
            (None, Some(y)) => DiffPayload::Add(DiffItem::Value((*y).clone())),
            (Some(x), None) => {
                removals.push((i, DiffPayload::Remove(DiffItem::Value((*x).clone()))));
                continue;
            }
            _ => continue,
        };
        out.push(set.push(DiffRec {
            target: a,
            key: DiffKey::Value(i),
            payload,
            parent: None,
            unimportant,
            redundant: false,
            rendered: false,
        }));
    }
    for (i, payload) in removals.into_iter().rev() {
        out.push(set.push(DiffRec {
            target: a,
            key: DiffKey::Value(i),
            payload,
            parent: None,
            unimportant,
            redundant: false,
            rendered: false,
        }));
    }

    // Sub-node groups, keyed by child type.
    let mut groups: Vec<Atom> = base.sub_types(a).cloned().collect();
    for t in other.sub_types(b) {
        if !groups.contains(t) {
            groups.push(t.clone());
        }
    }
    for t in groups {
        let ga: Vec<NodeId> = base.children_of(a, t.as_str()).to_vec();
        let gb: Vec<NodeId> = other.children_of(b, t.as_str()).to_vec();
        let group_unimportant = unimportant || UNIMPORTANT_TYPES.contains(&t.as_str());
        diff_group(base, a, other, &ga, &gb, &t, set, group_unimportant, &mut out);
    }

    // Untyped sub-nodes form one positionless group of their own.
    let ua: Vec<NodeId> = base
        .child_nodes(a)
        .filter(|n| base.node_type(*n).is_none())
        .collect();
    let ub: Vec<NodeId> = other
        .child_nodes(b)
        .filter(|n| other.node_type(*n).is_none())
        .collect();
    if !ua.is_empty() || !ub.is_empty() {
        diff_group(base, a, other, &ua, &ub, &untyped_group(), set, unimportant, &mut out);
    }

    Some(out)
}

#[allow(clippy::too_many_arguments)]
fn diff_group(
    base: &Tree,
    parent: NodeId,
    other: &Tree,
    ga: &[NodeId],
    gb: &[NodeId],
    key: &Atom,
    set: &mut DiffSet,
    unimportant: bool,
    out: &mut Vec<DiffId>,
) {
    let m = match_lists(ga.len(), gb.len(), |i, j, fast| {
        node_distance(base, ga[i], other, gb[j], fast)
    });
    // Additions first, then removals and modifications in base order.
    for j in &m.added {
        out.push(set.push(DiffRec {
            target: parent,
            key: DiffKey::Child(key.clone()),
            payload: DiffPayload::Add(DiffItem::Node(other.detach(gb[*j]))),
            parent: None,
            unimportant,
            redundant: false,
            rendered: false,
        }));
    }
    for (i, slot) in m.base.iter().enumerate() {
        match slot {
            None => out.push(set.push(DiffRec {
                target: parent,
                key: DiffKey::Child(key.clone()),
                payload: DiffPayload::Remove(DiffItem::Node(base.detach(ga[i]))),
                parent: None,
                unimportant,
                redundant: false,
                rendered: false,
            })),
            Some(j) => {
                // A matched-but-disparate pair reads as unchanged.
                let Some(sub) = diff_nodes(base, ga[i], other, gb[*j], set, unimportant) else {
                    continue;
                };
                if sub.is_empty() {
                    continue;
                }
                let group = set.push(DiffRec {
                    target: parent,
                    key: DiffKey::Child(key.clone()),
                    payload: DiffPayload::Children(sub.clone()),
                    parent: None,
                    unimportant: false,
                    redundant: false,
                    rendered: false,
                });
                for child in sub {
                    set.rec_mut(child).parent = Some(group);
                }
                out.push(group);
            }
        }
    }
}

/// Distance metric for the list matcher.
///
/// `0` means a definite match (which may still carry changes); larger means
/// less similar; `None` means disparate. The fast form only distinguishes
/// equal from unequal. Matching explicit identities short-circuit to `0`.
#[must_use]
pub fn node_distance(base: &Tree, a: NodeId, other: &Tree, b: NodeId, fast: bool) -> Option<u64> {
    if fast {
        return Some(u64::from(!base.structural_eq(a, other, b)));
    }
    if let (Some(ia), Some(ib)) = (base.explicit_identity(a), other.explicit_identity(b)) {
        if ia == ib {
            return Some(0);
        }
    }
    let mut scratch = DiffSet::new();
    diff_nodes(base, a, other, b, &mut scratch, false)
        .map(|diffs| u64::try_from(diffs.len()).unwrap_or(u64::MAX))
}

/// Structural equality across trees.
#[must_use]
pub fn nodes_equal(base: &Tree, a: NodeId, other: &Tree, b: NodeId) -> bool {
    base.structural_eq(a, other, b)
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Result of applying one leaf diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The mutation was performed.
    Applied,
    /// The target already had the intended state.
    Redundant,
    /// A prior applied diff left the target incompatible.
    Conflict,
}

/// Mutate `target` according to one leaf payload.
pub fn apply_payload(
    tree: &mut Tree,
    target: NodeId,
    key: &DiffKey,
    payload: &DiffPayload,
) -> ApplyOutcome {
    match (key, payload) {
        (DiffKey::Value(i), DiffPayload::Modify(old, new)) => {
            match tree.value_at(target, *i) {
                Some(cur) if cur == new => ApplyOutcome::Redundant,
                Some(cur) if cur == old => {
                    tree.set_value_at(target, *i, new.clone());
                    ApplyOutcome::Applied
                }
                _ => ApplyOutcome::Conflict,
            }
        }
        (DiffKey::Value(i), DiffPayload::Add(DiffItem::Value(v))) => {
            if tree.value_at(target, *i) == Some(v) {
                ApplyOutcome::Redundant
            } else {
                tree.insert_value_at(target, *i, v.clone());
                ApplyOutcome::Applied
            }
        }
        (DiffKey::Value(i), DiffPayload::Remove(DiffItem::Value(v))) => {
            if tree.value_at(target, *i) == Some(v) {
                tree.remove_value_at(target, *i);
                ApplyOutcome::Applied
            } else if tree.values(target).any(|x| x == v) || tree.value_at(target, *i).is_some() {
                // The value migrated or the slot was modified: a prior diff
                // left this position incompatible.
                ApplyOutcome::Conflict
            } else {
                ApplyOutcome::Redundant
            }
        }
        (DiffKey::Child(t), DiffPayload::Add(DiffItem::Node(n))) => {
            // Redundancy keys on identity: without one, identical siblings
            // are legitimate duplicates and the add must insert.
            if let Some(ident) = n.identity() {
                let kids: Vec<NodeId> = tree.children_of(target, t.as_str()).to_vec();
                if let Some(hit) = kids
                    .iter()
                    .find(|c| tree.explicit_identity(**c).as_deref() == Some(ident.as_str()))
                {
                    return if tree.matches_detached(*hit, n) {
                        ApplyOutcome::Redundant
                    } else {
                        ApplyOutcome::Conflict
                    };
                }
            }
            let at = insertion_slot(tree, target, t.as_str());
            tree.graft(target, n, at);
            ApplyOutcome::Applied
        }
        (DiffKey::Child(t), DiffPayload::Remove(DiffItem::Node(n))) => {
            let kids: Vec<NodeId> = tree.children_of(target, t.as_str()).to_vec();
            if let Some(ident) = n.identity() {
                if let Some(hit) = kids
                    .iter()
                    .find(|c| tree.explicit_identity(**c).as_deref() == Some(ident.as_str()))
                {
                    // Same element still present: a clean match deletes it, a
                    // modified one is a delete-vs-modify conflict.
                    if tree.matches_detached(*hit, n) {
                        tree.remove_child_node(target, *hit);
                        return ApplyOutcome::Applied;
                    }
                    return ApplyOutcome::Conflict;
                }
            }
            if let Some(hit) = kids.iter().find(|c| tree.matches_detached(**c, n)) {
                tree.remove_child_node(target, *hit);
                ApplyOutcome::Applied
            } else {
                ApplyOutcome::Redundant
            }
        }
        _ => ApplyOutcome::Conflict,
    }
}

/// Keep additions adjacent to their group: insert after the last existing
/// sub-node of the same type, or append at the end.
fn insertion_slot(tree: &Tree, parent: NodeId, group: &str) -> Option<usize> {
    let children = tree.children(parent);
    let mut slot = None;
    for (i, child) in children.iter().enumerate() {
        if let Some(id) = child.as_node() {
            if tree.node_type(id).is_some_and(|t| t == group) {
                slot = Some(i + 1);
            }
        }
    }
    slot
}

/// Apply one diff (recursively for groups) under the given mode.
///
/// Returns the leaf diffs that conflicted. Redundant outcomes are recorded
/// on the diff set; conflicting unimportant diffs degrade to redundant
/// unless the mode forces importance.
pub fn apply_diff(tree: &mut Tree, set: &mut DiffSet, id: DiffId, mode: ApplyMode) -> Vec<DiffId> {
    if let DiffPayload::Children(children) = set.payload(id) {
        let children = children.clone();
        let mut conflicts = Vec::new();
        for sub in children {
            // A deletion that already consumed the sub-target promotes the
            // nested change to redundant-or-conflict.
            if tree.is_deleted(set.target(sub)) {
                if set.should_be_applied(sub, mode) && set.is_unimportant(sub, mode) {
                    set.set_redundant(sub, true);
                } else {
                    conflicts.extend(set.flatten(sub, mode));
                }
            } else {
                conflicts.extend(apply_diff(tree, set, sub, mode));
            }
        }
        return conflicts;
    }
    if !set.should_be_applied(id, mode) {
        return Vec::new();
    }
    let target = set.target(id);
    let key = set.key(id).clone();
    let payload = set.payload(id).clone();
    match apply_payload(tree, target, &key, &payload) {
        ApplyOutcome::Applied => Vec::new(),
        ApplyOutcome::Redundant => {
            set.set_redundant(id, true);
            Vec::new()
        }
        ApplyOutcome::Conflict => {
            if set.is_unimportant(id, mode) {
                set.set_redundant(id, true);
                Vec::new()
            } else {
                vec![id]
            }
        }
    }
}

/// Apply a list of diffs, collecting conflicts.
pub fn apply_list(
    tree: &mut Tree,
    set: &mut DiffSet,
    ids: &[DiffId],
    mode: ApplyMode,
) -> Vec<DiffId> {
    let mut conflicts = Vec::new();
    for id in ids {
        conflicts.extend(apply_diff(tree, set, *id, mode));
    }
    conflicts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
