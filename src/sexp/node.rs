//! Arena-backed node model.
//!
//! A [`Tree`] owns every node of one parsed file; nodes reference each other
//! through dense [`NodeId`] indices. Cloning a tree clones the arena, so ids
//! recorded elsewhere (diff targets, netlist walks) remain valid in the
//! clone, which is what makes trial merges cheap and correct.
//!
//! Each node keeps two derived indexes alongside its ordered child sequence:
//! a map from child-node type to the ordered sub-node list, and a multiset of
//! atom children. Every mutation goes through [`Tree::add_child`] /
//! [`Tree::remove_child_node`] / [`Tree::remove_children`] so the indexes
//! never drift from the sequence.

use std::collections::BTreeMap;

use crate::model::class::{self, NodeClass};

use super::value::{Atom, Value};

// ---------------------------------------------------------------------------
// NodeId / Child
// ---------------------------------------------------------------------------

/// Dense index of a node within its owning [`Tree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw index, for diagnostics and stable class tags.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One entry in a node's ordered child sequence.
#[derive(Clone, Debug)]
pub enum Child {
    /// An atomic value.
    Value(Value),
    /// A sub-node, by arena id.
    Node(NodeId),
}

impl Child {
    /// Value view.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Node(_) => None,
        }
    }

    /// Node-id view.
    #[must_use]
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Value(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Detached subtrees
// ---------------------------------------------------------------------------

/// An owned subtree detached from any arena.
///
/// Diff payloads carry detached subtrees so a difference list stays valid
/// after its source tree is released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetachedNode {
    /// Semantic class carried over from promotion.
    pub class: NodeClass,
    /// Ordered children.
    pub children: Vec<DetachedChild>,
}

/// One child of a [`DetachedNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetachedChild {
    /// An atomic value.
    Value(Value),
    /// A nested subtree.
    Node(DetachedNode),
}

impl DetachedNode {
    /// The leading atom, if any.
    #[must_use]
    pub fn node_type(&self) -> Option<&Atom> {
        match self.children.first() {
            Some(DetachedChild::Value(Value::Atom(a))) => Some(a),
            _ => None,
        }
    }

    /// The explicit identity (`uuid` child), if present.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        for child in &self.children {
            if let DetachedChild::Node(n) = child {
                if n.node_type().is_some_and(|t| t == "uuid") {
                    for sub in &n.children[1..] {
                        if let DetachedChild::Value(v) = sub {
                            return Some(v.text());
                        }
                    }
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct NodeRec {
    class: NodeClass,
    children: Vec<Child>,
    subs: BTreeMap<Atom, Vec<NodeId>>,
    atoms: BTreeMap<Atom, u32>,
    /// Lazily generated identity, cached so repeated walks (and clones) see
    /// the same value.
    identity: Option<String>,
    /// Set when a deletion diff consumed this node.
    deleted: bool,
}

/// An arena of nodes plus the root id.
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<NodeRec>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Empty arena; the root must be set after allocation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(u32::MAX),
        }
    }

    /// Allocate a node from its ordered children, promoting it to a semantic
    /// class via the registry.
    pub fn alloc(&mut self, children: Vec<Child>) -> NodeId {
        let class = class::promote(self, &children);
        self.alloc_with_class(class, children)
    }

    fn alloc_with_class(&mut self, class: NodeClass, children: Vec<Child>) -> NodeId {
        let mut subs: BTreeMap<Atom, Vec<NodeId>> = BTreeMap::new();
        let mut atoms: BTreeMap<Atom, u32> = BTreeMap::new();
        for (i, child) in children.iter().enumerate() {
            match child {
                Child::Node(id) => {
                    if let Some(t) = self.node_type(*id) {
                        subs.entry(t.clone()).or_default().push(*id);
                    }
                }
                Child::Value(Value::Atom(a)) => {
                    // The leading atom is the node's type, not an atom child.
                    if i > 0 {
                        *atoms.entry(a.clone()).or_insert(0) += 1;
                    }
                }
                Child::Value(_) => {}
            }
        }
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeRec {
            class,
            children,
            subs,
            atoms,
            identity: None,
            deleted: false,
        });
        id
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Set the root node (parser / builders only).
    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    /// Number of allocated nodes (including detached ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes have been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn rec(&self, id: NodeId) -> &NodeRec {
        &self.nodes[id.index()]
    }

    fn rec_mut(&mut self, id: NodeId) -> &mut NodeRec {
        &mut self.nodes[id.index()]
    }

    // -- read accessors ----------------------------------------------------

    /// Semantic class assigned at promotion.
    #[must_use]
    pub fn class(&self, id: NodeId) -> NodeClass {
        self.rec(id).class
    }

    /// The leading atom, or `None` for untyped nodes.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> Option<&Atom> {
        match self.rec(id).children.first() {
            Some(Child::Value(Value::Atom(a))) => Some(a),
            _ => None,
        }
    }

    /// Full ordered child sequence, including the leading atom.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[Child] {
        &self.rec(id).children
    }

    /// Children after the leading atom (all children for untyped nodes).
    #[must_use]
    pub fn data(&self, id: NodeId) -> &[Child] {
        let children = &self.rec(id).children;
        if matches!(children.first(), Some(Child::Value(Value::Atom(_)))) {
            &children[1..]
        } else {
            children
        }
    }

    /// Values among [`Tree::data`], in order.
    pub fn values(&self, id: NodeId) -> impl Iterator<Item = &Value> {
        self.data(id).iter().filter_map(Child::as_value)
    }

    /// The `i`-th value among [`Tree::data`].
    #[must_use]
    pub fn value_at(&self, id: NodeId, i: usize) -> Option<&Value> {
        self.values(id).nth(i)
    }

    /// Sub-node ids among [`Tree::data`], in order.
    pub fn child_nodes(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.data(id).iter().filter_map(Child::as_node)
    }

    /// True if any atom child equals `name` or any sub-node has that type.
    #[must_use]
    pub fn contains(&self, id: NodeId, name: &str) -> bool {
        let rec = self.rec(id);
        rec.atoms.contains_key(name) || rec.subs.contains_key(name)
    }

    /// True if an atom child equals `name`.
    #[must_use]
    pub fn has_atom(&self, id: NodeId, name: &str) -> bool {
        self.rec(id).atoms.contains_key(name)
    }

    /// First sub-node of the given type.
    #[must_use]
    pub fn get_node(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.rec(id).subs.get(name).and_then(|v| v.first().copied())
    }

    /// All sub-nodes of the given type, in sequence order.
    #[must_use]
    pub fn children_of(&self, id: NodeId, name: &str) -> &[NodeId] {
        self.rec(id).subs.get(name).map_or(&[], Vec::as_slice)
    }

    /// Child-node types present on this node, in sorted order.
    pub fn sub_types(&self, id: NodeId) -> impl Iterator<Item = &Atom> {
        self.rec(id).subs.keys()
    }

    /// First value of the first sub-node of the given type. The common
    /// `(name value)` accessor shape.
    #[must_use]
    pub fn get_value(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.get_node(id, name).and_then(|n| self.value_at(n, 0))
    }

    // -- identity ----------------------------------------------------------

    /// Explicit identity from a `uuid` child, if present.
    #[must_use]
    pub fn explicit_identity(&self, id: NodeId) -> Option<String> {
        self.get_value(id, "uuid").map(Value::text)
    }

    /// Cached-or-absent identity: explicit uuid, else a previously generated
    /// one, else `None`.
    #[must_use]
    pub fn identity(&self, id: NodeId) -> Option<String> {
        self.explicit_identity(id)
            .or_else(|| self.rec(id).identity.clone())
    }

    /// Identity, generating and caching a fresh uuid when the source omitted
    /// one. Generated identities are stable for the lifetime of the tree and
    /// survive clones.
    pub fn ensure_identity(&mut self, id: NodeId) -> String {
        if let Some(explicit) = self.explicit_identity(id) {
            return explicit;
        }
        if let Some(cached) = &self.rec(id).identity {
            return cached.clone();
        }
        let fresh = uuid::Uuid::new_v4().to_string();
        self.rec_mut(id).identity = Some(fresh.clone());
        fresh
    }

    // -- mutation ----------------------------------------------------------

    /// Insert a child at `at` (or append), keeping both indexes consistent
    /// with the sequence.
    pub fn add_child(&mut self, parent: NodeId, child: Child, at: Option<usize>) {
        let len = self.rec(parent).children.len();
        let at = at.unwrap_or(len).min(len);
        match &child {
            Child::Node(id) => {
                if let Some(t) = self.node_type(*id).cloned() {
                    // Position within the per-type list mirrors the relative
                    // order in the child sequence.
                    let before = self.rec(parent).children[..at]
                        .iter()
                        .filter_map(Child::as_node)
                        .filter(|n| self.node_type(*n) == Some(&t))
                        .count();
                    self.rec_mut(parent)
                        .subs
                        .entry(t)
                        .or_default()
                        .insert(before, *id);
                }
            }
            Child::Value(Value::Atom(a)) => {
                if at > 0 {
                    *self.rec_mut(parent).atoms.entry(a.clone()).or_insert(0) += 1;
                }
            }
            Child::Value(_) => {}
        }
        self.rec_mut(parent).children.insert(at, child);
    }

    /// Remove one sub-node, marking it deleted for later
    /// `child_is_deleted` checks.
    pub fn remove_child_node(&mut self, parent: NodeId, child: NodeId) {
        let Some(t) = self.node_type(child).cloned() else {
            self.rec_mut(parent)
                .children
                .retain(|c| c.as_node() != Some(child));
            self.rec_mut(child).deleted = true;
            return;
        };
        let rec = self.rec_mut(parent);
        rec.children.retain(|c| c.as_node() != Some(child));
        if let Some(subs) = rec.subs.get_mut(&t) {
            subs.retain(|n| *n != child);
            if subs.is_empty() {
                rec.subs.remove(&t);
            }
        }
        self.rec_mut(child).deleted = true;
    }

    /// Remove every child matching the predicate.
    pub fn remove_children<F>(&mut self, parent: NodeId, mut pred: F)
    where
        F: FnMut(&Self, &Child) -> bool,
    {
        let snapshot = self.rec(parent).children.clone();
        let mut survivors = Vec::with_capacity(snapshot.len());
        let mut removed_nodes = Vec::new();
        for (i, child) in snapshot.into_iter().enumerate() {
            if pred(self, &child) {
                match &child {
                    Child::Node(id) => removed_nodes.push(*id),
                    Child::Value(Value::Atom(a)) if i > 0 => {
                        let rec = self.rec_mut(parent);
                        if let Some(count) = rec.atoms.get_mut(a) {
                            *count -= 1;
                            if *count == 0 {
                                rec.atoms.remove(a);
                            }
                        }
                    }
                    Child::Value(_) => {}
                }
            } else {
                survivors.push(child);
            }
        }
        self.rec_mut(parent).children = survivors;
        for id in removed_nodes {
            if let Some(t) = self.node_type(id).cloned() {
                let rec = self.rec_mut(parent);
                if let Some(subs) = rec.subs.get_mut(&t) {
                    subs.retain(|n| *n != id);
                    if subs.is_empty() {
                        rec.subs.remove(&t);
                    }
                }
            }
            self.rec_mut(id).deleted = true;
        }
    }

    /// Replace the `i`-th value among [`Tree::data`].
    ///
    /// Returns `false` when no such value position exists.
    pub fn set_value_at(&mut self, id: NodeId, i: usize, value: Value) -> bool {
        let lead = usize::from(matches!(
            self.rec(id).children.first(),
            Some(Child::Value(Value::Atom(_)))
        ));
        let Some(slot) = Self::nth_value_slot(&self.rec(id).children, lead, i) else {
            return false;
        };
        let rec = self.rec_mut(id);
        let old = std::mem::replace(&mut rec.children[slot], Child::Value(value));
        // The atom multiset must track atom value swaps.
        if let Child::Value(Value::Atom(a)) = &old {
            if let Some(count) = rec.atoms.get_mut(a) {
                *count -= 1;
                if *count == 0 {
                    rec.atoms.remove(a);
                }
            }
        }
        if let Child::Value(Value::Atom(a)) = &rec.children[slot] {
            let a = a.clone();
            *rec.atoms.entry(a).or_insert(0) += 1;
        }
        true
    }

    fn nth_value_slot(children: &[Child], lead: usize, i: usize) -> Option<usize> {
        children
            .iter()
            .enumerate()
            .skip(lead)
            .filter(|(_, c)| matches!(c, Child::Value(_)))
            .nth(i)
            .map(|(slot, _)| slot)
    }

    /// Insert a value at the `i`-th value position among [`Tree::data`].
    pub fn insert_value_at(&mut self, id: NodeId, i: usize, value: Value) {
        let lead = usize::from(matches!(
            self.rec(id).children.first(),
            Some(Child::Value(Value::Atom(_)))
        ));
        let slot = Self::nth_value_slot(&self.rec(id).children, lead, i)
            .unwrap_or(self.rec(id).children.len());
        self.add_child(id, Child::Value(value), Some(slot));
    }

    /// Remove the `i`-th value among [`Tree::data`].
    pub fn remove_value_at(&mut self, id: NodeId, i: usize) -> Option<Value> {
        let lead = usize::from(matches!(
            self.rec(id).children.first(),
            Some(Child::Value(Value::Atom(_)))
        ));
        let slot = Self::nth_value_slot(&self.rec(id).children, lead, i)?;
        let rec = self.rec_mut(id);
        let child = rec.children.remove(slot);
        if let Child::Value(Value::Atom(a)) = &child {
            if let Some(count) = rec.atoms.get_mut(a) {
                *count -= 1;
                if *count == 0 {
                    rec.atoms.remove(a);
                }
            }
        }
        match child {
            Child::Value(v) => Some(v),
            Child::Node(_) => None,
        }
    }

    /// True once a deletion consumed this node.
    #[must_use]
    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.rec(id).deleted
    }

    // -- structural equality ----------------------------------------------

    /// Recursive sequence equality of children. Identity is deliberately not
    /// considered.
    #[must_use]
    pub fn structural_eq(&self, a: NodeId, other: &Self, b: NodeId) -> bool {
        let ca = &self.rec(a).children;
        let cb = &other.rec(b).children;
        if ca.len() != cb.len() {
            return false;
        }
        ca.iter().zip(cb.iter()).all(|(x, y)| match (x, y) {
            (Child::Value(vx), Child::Value(vy)) => vx == vy,
            (Child::Node(nx), Child::Node(ny)) => self.structural_eq(*nx, other, *ny),
            _ => false,
        })
    }

    // -- detach / graft ----------------------------------------------------

    /// Deep-copy a subtree out of the arena.
    #[must_use]
    pub fn detach(&self, id: NodeId) -> DetachedNode {
        let rec = self.rec(id);
        DetachedNode {
            class: rec.class,
            children: rec
                .children
                .iter()
                .map(|c| match c {
                    Child::Value(v) => DetachedChild::Value(v.clone()),
                    Child::Node(n) => DetachedChild::Node(self.detach(*n)),
                })
                .collect(),
        }
    }

    /// Allocate a detached subtree into this arena and attach it under
    /// `parent` at the given child index (or append).
    pub fn graft(&mut self, parent: NodeId, node: &DetachedNode, at: Option<usize>) -> NodeId {
        let id = self.alloc_detached(node);
        self.add_child(parent, Child::Node(id), at);
        id
    }

    /// Allocate a detached subtree without attaching it.
    pub fn alloc_detached(&mut self, node: &DetachedNode) -> NodeId {
        let children = node
            .children
            .iter()
            .map(|c| match c {
                DetachedChild::Value(v) => Child::Value(v.clone()),
                DetachedChild::Node(n) => {
                    let id = self.alloc_detached(n);
                    Child::Node(id)
                }
            })
            .collect();
        self.alloc_with_class(node.class, children)
    }

    /// Structural equality between an in-arena node and a detached subtree.
    #[must_use]
    pub fn matches_detached(&self, id: NodeId, other: &DetachedNode) -> bool {
        let ca = &self.rec(id).children;
        if ca.len() != other.children.len() {
            return false;
        }
        ca.iter().zip(other.children.iter()).all(|(x, y)| match (x, y) {
            (Child::Value(vx), DetachedChild::Value(vy)) => vx == vy,
            (Child::Node(nx), DetachedChild::Node(ny)) => self.matches_detached(*nx, ny),
            _ => false,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
