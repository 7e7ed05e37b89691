//! Core types for the diff/merge engine.
//!
//! A [`DiffSet`] is an arena of difference records produced by one
//! comparison. Records reference their targets by [`NodeId`], so cloning a
//! document and its diff set together preserves every target, which is the property
//! the three-way trial merge depends on.

use std::fmt;

use crate::sexp::{Atom, DetachedNode, NodeId, Tree, Value};

// ---------------------------------------------------------------------------
// ApplyMode
// ---------------------------------------------------------------------------

/// Bit-OR'd application mode flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyMode(u8);

impl ApplyMode {
    /// Apply important diffs.
    pub const IMPORTANT: Self = Self(1);
    /// Apply unimportant diffs.
    pub const UNIMPORTANT: Self = Self(1 << 1);
    /// Treat unimportant diffs as important when classifying conflicts.
    pub const FORCE_IMPORTANT: Self = Self(1 << 2);
    /// Apply everything.
    pub const ALL: Self = Self(Self::IMPORTANT.0 | Self::UNIMPORTANT.0);
    /// Apply everything, with conflicts surfaced even for unimportant diffs.
    pub const FORCE_ALL: Self = Self(Self::ALL.0 | Self::FORCE_IMPORTANT.0);

    /// True when every flag of `other` is set.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ApplyMode {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Diff keys and payloads
// ---------------------------------------------------------------------------

/// Identifies the field or sub-container of the target a diff mutates.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiffKey {
    /// The `i`-th value child of the target.
    Value(usize),
    /// The target's sub-node group of the given type. Untyped sub-nodes
    /// group under the empty atom.
    Child(Atom),
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(i) => write!(f, "#{i}"),
            Self::Child(a) => write!(f, "{a}"),
        }
    }
}

/// An added or removed item: either an atomic value or a detached subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffItem {
    Value(Value),
    Node(DetachedNode),
}

impl DiffItem {
    fn describe(&self) -> String {
        match self {
            Self::Value(v) => v.text(),
            Self::Node(n) => n
                .node_type()
                .map_or_else(|| "(...)".to_owned(), |t| format!("({t} ...)")),
        }
    }
}

/// The actual change a diff records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffPayload {
    /// `(None, new)`: addition of a value or subtree.
    Add(DiffItem),
    /// `(old, None)`: removal of a value or subtree. The old item is a deep
    /// copy, so delete-vs-modify conflicts are detected by equality.
    Remove(DiffItem),
    /// `(old, new)`: change of a value.
    Modify(Value, Value),
    /// A recursive group of changes to a matched sub-node.
    Children(Vec<DiffId>),
}

// ---------------------------------------------------------------------------
// DiffSet
// ---------------------------------------------------------------------------

/// Index of a diff within its [`DiffSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiffId(pub(crate) u32);

#[derive(Clone, Debug)]
pub(crate) struct DiffRec {
    pub target: NodeId,
    pub key: DiffKey,
    pub payload: DiffPayload,
    pub parent: Option<DiffId>,
    pub unimportant: bool,
    pub redundant: bool,
    pub rendered: bool,
}

/// Arena of diffs from one tree comparison.
///
/// Cloning the set clones every record including redundancy flags; a trial
/// merge clones the base tree and both diff sets together so ids line up
/// across the copies.
#[derive(Clone, Debug, Default)]
pub struct DiffSet {
    recs: Vec<DiffRec>,
    roots: Vec<DiffId>,
}

impl DiffSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, rec: DiffRec) -> DiffId {
        let id = DiffId(u32::try_from(self.recs.len()).unwrap_or(u32::MAX));
        self.recs.push(rec);
        id
    }

    pub(crate) fn rec(&self, id: DiffId) -> &DiffRec {
        &self.recs[id.0 as usize]
    }

    pub(crate) fn rec_mut(&mut self, id: DiffId) -> &mut DiffRec {
        &mut self.recs[id.0 as usize]
    }

    /// Top-level diffs of the comparison.
    #[must_use]
    pub fn roots(&self) -> &[DiffId] {
        &self.roots
    }

    pub(crate) fn set_roots(&mut self, roots: Vec<DiffId>) {
        self.roots = roots;
    }

    /// Number of records (leaves and groups).
    #[must_use]
    pub fn len(&self) -> usize {
        self.recs.len()
    }

    /// True when the comparison found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Target node of a diff.
    #[must_use]
    pub fn target(&self, id: DiffId) -> NodeId {
        self.rec(id).target
    }

    /// Key of a diff.
    #[must_use]
    pub fn key(&self, id: DiffId) -> &DiffKey {
        &self.rec(id).key
    }

    /// Payload of a diff.
    #[must_use]
    pub fn payload(&self, id: DiffId) -> &DiffPayload {
        &self.rec(id).payload
    }

    /// Stable identifier used by rendering collaborators to map document
    /// elements back to diffs. Derived from the diff's arena address.
    #[must_use]
    pub fn class_tag(&self, id: DiffId) -> String {
        format!("diff{:X}", id.0)
    }

    // -- importance --------------------------------------------------------

    /// Flag a diff (usually cosmetic bookkeeping) as unimportant.
    pub fn set_unimportant(&mut self, id: DiffId, unimportant: bool) {
        self.rec_mut(id).unimportant = unimportant;
    }

    /// True if the diff, or every leaf under it, is unimportant.
    ///
    /// With [`ApplyMode::FORCE_IMPORTANT`] set this always reports `false`,
    /// which is how trial merges group unimportant diffs with the real
    /// conflicts they ride along with.
    #[must_use]
    pub fn is_unimportant(&self, id: DiffId, mode: ApplyMode) -> bool {
        if mode.contains(ApplyMode::FORCE_IMPORTANT) {
            return false;
        }
        self.is_unimportant_plain(id)
    }

    fn is_unimportant_plain(&self, id: DiffId) -> bool {
        let rec = self.rec(id);
        if rec.unimportant {
            return true;
        }
        match &rec.payload {
            DiffPayload::Children(children) => children
                .iter()
                .all(|c| self.is_unimportant_plain(*c)),
            _ => false,
        }
    }

    /// Whether this diff participates in an apply pass of the given mode.
    #[must_use]
    pub fn should_be_applied(&self, id: DiffId, mode: ApplyMode) -> bool {
        if self.is_unimportant_plain(id) {
            mode.contains(ApplyMode::UNIMPORTANT)
        } else {
            mode.contains(ApplyMode::IMPORTANT)
        }
    }

    // -- redundancy --------------------------------------------------------

    /// Flag a diff whose effect was already achieved by a prior apply.
    pub fn set_redundant(&mut self, id: DiffId, redundant: bool) {
        self.rec_mut(id).redundant = redundant;
    }

    /// True if the diff, or every leaf under it, became redundant.
    #[must_use]
    pub fn is_redundant(&self, id: DiffId) -> bool {
        let rec = self.rec(id);
        if rec.redundant {
            return true;
        }
        match &rec.payload {
            DiffPayload::Children(children) => {
                children.iter().all(|c| self.is_redundant(*c))
            }
            _ => false,
        }
    }

    /// True when this diff is definitely redundant with another set's diff:
    /// same target slot, same shape, same data. Even when this returns
    /// `false` the diff may still turn out redundant (delete-vs-modify).
    #[must_use]
    pub fn redundant_with(&self, id: DiffId, other: &Self, other_id: DiffId) -> bool {
        let a = self.rec(id);
        let b = other.rec(other_id);
        if matches!(a.payload, DiffPayload::Children(_)) {
            return false;
        }
        a.target == b.target && a.key == b.key && a.payload == b.payload
    }

    // -- rendered flag -----------------------------------------------------

    /// Whether a rendering collaborator has consumed this diff. Passing
    /// `Some` overrides the stored value (useful when a render got pruned).
    pub fn rendered(&mut self, id: DiffId, set: Option<bool>) -> bool {
        if let Some(v) = set {
            self.rec_mut(id).rendered = v;
        }
        self.rec(id).rendered
    }

    // -- flattening --------------------------------------------------------

    /// Flat list of leaf diffs under `id`, filtered by apply mode.
    #[must_use]
    pub fn flatten(&self, id: DiffId, mode: ApplyMode) -> Vec<DiffId> {
        let mut out = Vec::new();
        self.flatten_into(id, mode, &mut out);
        out
    }

    fn flatten_into(&self, id: DiffId, mode: ApplyMode, out: &mut Vec<DiffId>) {
        match &self.rec(id).payload {
            DiffPayload::Children(children) => {
                for c in children {
                    self.flatten_into(*c, mode, out);
                }
            }
            _ => {
                if self.should_be_applied(id, mode) {
                    out.push(id);
                }
            }
        }
    }

    /// Flat list of every leaf under the given roots.
    #[must_use]
    pub fn flatten_roots(&self, roots: &[DiffId], mode: ApplyMode) -> Vec<DiffId> {
        let mut out = Vec::new();
        for r in roots {
            self.flatten_into(*r, mode, &mut out);
        }
        out
    }

    // -- description -------------------------------------------------------

    /// Human-readable one-line description of a diff, for conflict reports.
    #[must_use]
    pub fn describe(&self, id: DiffId, tree: &Tree) -> String {
        let rec = self.rec(id);
        let mut prefix = String::new();
        let mut parent = rec.parent;
        while let Some(p) = parent {
            let prec = self.rec(p);
            let ptype = tree
                .node_type(prec.target)
                .map_or_else(|| "node".to_owned(), ToString::to_string);
            prefix = format!("{ptype}.{prefix}");
            parent = prec.parent;
        }
        let target = tree
            .node_type(rec.target)
            .map_or_else(|| "node".to_owned(), ToString::to_string);
        let (verb, change) = match &rec.payload {
            DiffPayload::Add(item) => ("add", item.describe()),
            DiffPayload::Remove(item) => ("rm", item.describe()),
            DiffPayload::Modify(old, new) => ("mod", format!("{} => {}", old.text(), new.text())),
            DiffPayload::Children(c) => ("changed", format!("{} nested", c.len())),
        };
        format!("{prefix}{target}: {verb} {} {change}", rec.key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::parse;

    fn leaf(set: &mut DiffSet, target: NodeId, unimportant: bool) -> DiffId {
        let id = set.push(DiffRec {
            target,
            key: DiffKey::Value(0),
            payload: DiffPayload::Modify(Value::Int(0), Value::Int(1)),
            parent: None,
            unimportant,
            redundant: false,
            rendered: false,
        });
        id
    }

    #[test]
    fn apply_mode_bits() {
        assert!(ApplyMode::ALL.contains(ApplyMode::IMPORTANT));
        assert!(ApplyMode::ALL.contains(ApplyMode::UNIMPORTANT));
        assert!(!ApplyMode::ALL.contains(ApplyMode::FORCE_IMPORTANT));
        assert!(ApplyMode::FORCE_ALL.contains(ApplyMode::FORCE_IMPORTANT));
    }

    #[test]
    fn force_important_masks_unimportance() {
        let t = parse("(a 1)").expect("parse");
        let mut set = DiffSet::new();
        let d = leaf(&mut set, t.root(), true);
        assert!(set.is_unimportant(d, ApplyMode::ALL));
        assert!(!set.is_unimportant(d, ApplyMode::FORCE_ALL));
    }

    #[test]
    fn group_unimportance_is_all_children() {
        let t = parse("(a 1)").expect("parse");
        let mut set = DiffSet::new();
        let c1 = leaf(&mut set, t.root(), true);
        let c2 = leaf(&mut set, t.root(), true);
        let group = set.push(DiffRec {
            target: t.root(),
            key: DiffKey::Child(Atom::from("b")),
            payload: DiffPayload::Children(vec![c1, c2]),
            parent: None,
            unimportant: false,
            redundant: false,
            rendered: false,
        });
        assert!(set.is_unimportant(group, ApplyMode::ALL));
        set.set_unimportant(c2, false);
        assert!(!set.is_unimportant(group, ApplyMode::ALL));
    }

    #[test]
    fn should_be_applied_selects_by_importance() {
        let t = parse("(a 1)").expect("parse");
        let mut set = DiffSet::new();
        let imp = leaf(&mut set, t.root(), false);
        let unimp = leaf(&mut set, t.root(), true);
        assert!(set.should_be_applied(imp, ApplyMode::IMPORTANT));
        assert!(!set.should_be_applied(imp, ApplyMode::UNIMPORTANT));
        assert!(set.should_be_applied(unimp, ApplyMode::UNIMPORTANT));
        assert!(!set.should_be_applied(unimp, ApplyMode::IMPORTANT));
    }

    #[test]
    fn flatten_respects_mode() {
        let t = parse("(a 1)").expect("parse");
        let mut set = DiffSet::new();
        let imp = leaf(&mut set, t.root(), false);
        let unimp = leaf(&mut set, t.root(), true);
        let group = set.push(DiffRec {
            target: t.root(),
            key: DiffKey::Child(Atom::from("b")),
            payload: DiffPayload::Children(vec![imp, unimp]),
            parent: None,
            unimportant: false,
            redundant: false,
            rendered: false,
        });
        assert_eq!(set.flatten(group, ApplyMode::ALL), vec![imp, unimp]);
        assert_eq!(set.flatten(group, ApplyMode::IMPORTANT), vec![imp]);
        assert_eq!(set.flatten(group, ApplyMode::UNIMPORTANT), vec![unimp]);
    }

    #[test]
    fn redundant_with_requires_same_slot_and_data() {
        let t = parse("(a 1)").expect("parse");
        let mut a = DiffSet::new();
        let mut b = DiffSet::new();
        let da = leaf(&mut a, t.root(), false);
        let db = leaf(&mut b, t.root(), false);
        assert!(a.redundant_with(da, &b, db));
        b.rec_mut(db).payload = DiffPayload::Modify(Value::Int(0), Value::Int(2));
        assert!(!a.redundant_with(da, &b, db));
    }

    #[test]
    fn class_tags_are_stable_and_distinct() {
        let t = parse("(a 1)").expect("parse");
        let mut set = DiffSet::new();
        let d1 = leaf(&mut set, t.root(), false);
        let d2 = leaf(&mut set, t.root(), false);
        assert_ne!(set.class_tag(d1), set.class_tag(d2));
        assert_eq!(set.class_tag(d1), set.class_tag(d1));
    }

    #[test]
    fn describe_mentions_change() {
        let t = parse("(v 0)").expect("parse");
        let mut set = DiffSet::new();
        let d = leaf(&mut set, t.root(), false);
        let desc = set.describe(d, &t);
        assert!(desc.contains("v"), "{desc}");
        assert!(desc.contains("0 => 1"), "{desc}");
    }
}
