//! Union-find arena for net/bus components.
//!
//! Classic path-compressed union over dense integer ids. The sidecar data a
//! component carries (candidate names, no-connect markers, bus members and
//! pending sheet-pin bindings) lives on the find-root and merges on union.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{InstLabel, MemberKey, NetName};

/// Index of a component in the [`NetArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetId(pub(crate) u32);

/// Whether a component is a single net or a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetKind {
    Net,
    Bus,
}

/// Bus-only sidecar data.
#[derive(Clone, Debug, Default)]
pub struct BusData {
    /// Member name → member net component.
    pub members: BTreeMap<MemberKey, NetId>,
    /// Pending sheet-pin bindings: `(pin name, member labels)`.
    pub sheetpins: Vec<(String, Vec<(InstLabel, MemberKey)>)>,
    /// Buses on child sheets awaiting member-wise resolution.
    pub subsheet_buses: Vec<NetId>,
}

#[derive(Clone, Debug)]
struct NetRec {
    parent: Option<NetId>,
    kind: NetKind,
    names: BTreeSet<NetName>,
    ncs: BTreeSet<String>,
    bus: BusData,
}

/// Arena of net/bus components.
#[derive(Clone, Debug, Default)]
pub struct NetArena {
    recs: Vec<NetRec>,
}

impl NetArena {
    /// Allocate a fresh component.
    pub fn alloc(&mut self, kind: NetKind) -> NetId {
        let id = NetId(u32::try_from(self.recs.len()).unwrap_or(u32::MAX));
        self.recs.push(NetRec {
            parent: None,
            kind,
            names: BTreeSet::new(),
            ncs: BTreeSet::new(),
            bus: BusData::default(),
        });
        id
    }

    /// Find the root of a component, compressing the path on the way.
    pub fn find(&mut self, id: NetId) -> NetId {
        let mut root = id;
        while let Some(p) = self.recs[root.0 as usize].parent {
            root = p;
        }
        let mut cur = id;
        while let Some(p) = self.recs[cur.0 as usize].parent {
            self.recs[cur.0 as usize].parent = Some(root);
            cur = p;
        }
        root
    }

    /// Find without compression (read-only contexts).
    #[must_use]
    pub fn find_ro(&self, id: NetId) -> NetId {
        let mut root = id;
        while let Some(p) = self.recs[root.0 as usize].parent {
            root = p;
        }
        root
    }

    /// Kind of a component (of its root).
    #[must_use]
    pub fn kind(&self, id: NetId) -> NetKind {
        self.recs[self.find_ro(id).0 as usize].kind
    }

    /// Merge `from` into `into`; the root of `into` wins and inherits every
    /// name, no-connect marker, member, and pending binding.
    pub fn merge_into(&mut self, from: NetId, into: NetId) -> NetId {
        let from_root = self.find(from);
        let into_root = self.find(into);
        if from_root == into_root {
            return into_root;
        }
        let donor = std::mem::replace(
            &mut self.recs[from_root.0 as usize],
            NetRec {
                parent: Some(into_root),
                kind: NetKind::Net,
                names: BTreeSet::new(),
                ncs: BTreeSet::new(),
                bus: BusData::default(),
            },
        );
        self.recs[from_root.0 as usize].kind = donor.kind;
        let target = &mut self.recs[into_root.0 as usize];
        target.names.extend(donor.names);
        target.ncs.extend(donor.ncs);
        target.bus.sheetpins.extend(donor.bus.sheetpins);
        target.bus.subsheet_buses.extend(donor.bus.subsheet_buses);
        let members: Vec<(MemberKey, NetId)> = donor.bus.members.into_iter().collect();
        for (member, net) in members {
            self.add_member(into_root, member, net);
        }
        into_root
    }

    /// Record a candidate name on a component.
    pub fn add_name(&mut self, id: NetId, name: NetName) {
        let root = self.find(id);
        self.recs[root.0 as usize].names.insert(name);
    }

    /// Candidate names of a component.
    #[must_use]
    pub fn names(&self, id: NetId) -> &BTreeSet<NetName> {
        &self.recs[self.find_ro(id).0 as usize].names
    }

    /// Record an explicit no-connect marker.
    pub fn add_nc(&mut self, id: NetId, instance: String) {
        let root = self.find(id);
        self.recs[root.0 as usize].ncs.insert(instance);
    }

    /// No-connect markers of a component.
    #[must_use]
    pub fn ncs(&self, id: NetId) -> &BTreeSet<String> {
        &self.recs[self.find_ro(id).0 as usize].ncs
    }

    /// Bind `member` of a bus to a net component, merging with any existing
    /// binding. Returns the member's current root.
    pub fn add_member(&mut self, bus: NetId, member: MemberKey, net: NetId) -> NetId {
        let bus_root = self.find(bus);
        let existing = self.recs[bus_root.0 as usize].bus.members.get(&member).copied();
        let bound = match existing {
            Some(cur) => self.merge_into(cur, net),
            None => self.find(net),
        };
        self.recs[bus_root.0 as usize].bus.members.insert(member, bound);
        bound
    }

    /// Member map of a bus (keys only; values may need re-finding).
    #[must_use]
    pub fn members(&self, id: NetId) -> &BTreeMap<MemberKey, NetId> {
        &self.recs[self.find_ro(id).0 as usize].bus.members
    }

    /// Record a pending sheet-pin binding on a bus.
    pub fn add_sheetpin(
        &mut self,
        bus: NetId,
        subsheet_bus: NetId,
        pin_name: String,
        local_labels: Vec<(InstLabel, MemberKey)>,
    ) {
        let root = self.find(bus);
        let rec = &mut self.recs[root.0 as usize].bus;
        rec.subsheet_buses.push(subsheet_bus);
        rec.sheetpins.push((pin_name, local_labels));
    }

    /// Take the pending sheet-pin bindings off a bus.
    pub fn take_sheetpins(&mut self, bus: NetId) -> Vec<(String, Vec<(InstLabel, MemberKey)>)> {
        let root = self.find(bus);
        std::mem::take(&mut self.recs[root.0 as usize].bus.sheetpins)
    }

    /// Take the pending subsheet buses off a bus.
    pub fn take_subsheet_buses(&mut self, bus: NetId) -> Vec<NetId> {
        let root = self.find(bus);
        std::mem::take(&mut self.recs[root.0 as usize].bus.subsheet_buses)
    }

    /// Number of allocated components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recs.len()
    }

    /// True when nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
