//! Hierarchical netlister.
//!
//! Every drawing element that carries connectivity (wires, buses, labels,
//! symbol pins, sheet pins, bus entries, junctions, no-connect markers) is
//! assigned to exactly one connected component per page instance, and each
//! component gets a canonical name.
//!
//! The walk feeds prepared inputs (positions already transformed into page
//! space, coordinates in exact fixed-point) into `add_*` methods that create
//! or merge components through the union-find arena. [`Netlister::resolve`]
//! then stitches bus hierarchies through sheet pins, and
//! [`Netlister::generate`] renders one of the output formats.
//!
//! # Determinism guarantee
//!
//! Identical traversal order produces identical net names: maps are ordered,
//! name candidates sort by (category, depth, case-folded text), and output
//! lines sort by name.

pub mod types;
pub mod unionfind;

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::vars::{Variables, special};

pub use types::{
    Busness, Fixed, InstCoord, InstLabel, MemberKey, NameKind, NetCategory, NetFormat, NetName,
    NetObj, strip_unit,
};
pub use unionfind::{NetArena, NetId, NetKind};

// ---------------------------------------------------------------------------
// Walk inputs
// ---------------------------------------------------------------------------

/// A bus member produced by label expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMemberInput {
    /// Member key within the bus (`D0`).
    pub member: String,
    /// Full member net name (`DATA.D0` or `D0`).
    pub net: String,
}

/// A wire or bus segment.
#[derive(Clone, Debug)]
pub struct WireInput {
    pub instance: String,
    pub pts: Vec<(Fixed, Fixed)>,
    pub bus: bool,
}

/// A local, global, or hierarchical label.
#[derive(Clone, Debug)]
pub struct LabelInput {
    pub instance: String,
    /// Variable scope of the label node, for net-variable backfill.
    pub scope: Option<String>,
    pub pos: (Fixed, Fixed),
    pub text: String,
    pub global: bool,
    /// Non-empty when the label names a bus.
    pub members: Vec<BusMemberInput>,
}

/// A pin on a sheet symbol, stitching the parent signal into a sub-sheet.
#[derive(Clone, Debug)]
pub struct SheetPinInput {
    pub instance: String,
    /// The sub-sheet's page instance (`parent-instance/sheet-uuid`).
    pub subsheet_key: String,
    pub pos: (Fixed, Fixed),
    pub name: String,
    pub members: Vec<BusMemberInput>,
}

/// A pin of a placed symbol, in page coordinates.
#[derive(Clone, Debug)]
pub struct SymPinInput {
    pub instance: String,
    /// Reference scope for `${ref:…}` variable backfill.
    pub refdes_scope: Option<String>,
    pub pos: (Fixed, Fixed),
    pub refdes: String,
    pub name: String,
    pub number: String,
    /// Hidden power-input pins connect by name, process-wide.
    pub power: bool,
    pub no_connect: bool,
}

/// A point-like element (junction, no-connect marker, bus entry end).
#[derive(Clone, Debug)]
pub struct PointInput {
    pub instance: String,
    pub pos: (Fixed, Fixed),
}

// ---------------------------------------------------------------------------
// Netlister
// ---------------------------------------------------------------------------

/// Accumulates connectivity across page instances and resolves canonical
/// net names.
#[derive(Clone, Debug, Default)]
pub struct Netlister {
    arena: NetArena,
    by_instcoord: BTreeMap<InstCoord, NetId>,
    by_instlabel: BTreeMap<InstLabel, NetId>,
    unresolved_buses: Vec<NetId>,
    nodes_by_inst: BTreeMap<String, Vec<NetObj>>,
    wires_by_inst: BTreeMap<String, Vec<NetObj>>,
    /// Local net-name prefix, updated by the caller per page instance.
    prefix: String,
    label_scopes: Vec<(String, NetId)>,
    pin_scopes: Vec<(String, String, String, NetId)>,
}

impl Netlister {
    /// Fresh netlister with the root prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: "/".to_owned(),
            ..Self::default()
        }
    }

    /// Set the local net-name prefix for subsequent labels.
    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_owned();
    }

    // -- map helpers -------------------------------------------------------

    fn coord_get(&mut self, key: &InstCoord) -> Option<NetId> {
        let id = self.by_instcoord.get(key).copied()?;
        let root = self.arena.find(id);
        self.by_instcoord.insert(key.clone(), root);
        Some(root)
    }

    fn coord_get_or(&mut self, key: InstCoord, kind: NetKind) -> NetId {
        if let Some(root) = self.coord_get(&key) {
            return root;
        }
        let fresh = self.arena.alloc(kind);
        self.by_instcoord.insert(key, fresh);
        fresh
    }

    fn coord_merge(&mut self, key: InstCoord, item: NetId) -> NetId {
        let root = match self.coord_get(&key) {
            Some(cur) => self.arena.merge_into(cur, item),
            None => self.arena.find(item),
        };
        self.by_instcoord.insert(key, root);
        root
    }

    fn label_get_or(&mut self, key: InstLabel, fallback: NetId) -> NetId {
        if let Some(id) = self.by_instlabel.get(&key).copied() {
            let root = self.arena.find(id);
            self.by_instlabel.insert(key, root);
            return root;
        }
        let root = self.arena.find(fallback);
        self.by_instlabel.insert(key, root);
        root
    }

    fn label_merge(&mut self, key: InstLabel, item: NetId) -> NetId {
        let root = match self.by_instlabel.get(&key).copied() {
            Some(cur) => {
                let cur = self.arena.find(cur);
                self.arena.merge_into(cur, item)
            }
            None => self.arena.find(item),
        };
        self.by_instlabel.insert(key, root);
        root
    }

    /// Bind a point-like element: reuse the component at its coordinate, or
    /// scan this instance's wires for a segment passing through it.
    fn add_node_at(&mut self, key: InstCoord, obj: &NetObj) -> NetId {
        if let Some(root) = self.coord_get(&key) {
            return root;
        }
        let mut hit: Option<InstCoord> = None;
        if let Some(wires) = self.wires_by_inst.get(&key.instance) {
            for wire in wires {
                if wire.touches(obj) {
                    hit = Some(InstCoord {
                        instance: key.instance.clone(),
                        x: wire.xys[0].0,
                        y: wire.xys[0].1,
                        is_bus: key.is_bus,
                    });
                    break;
                }
            }
        }
        let netbus = match hit {
            Some(wire_key) => self.coord_get_or(
                wire_key,
                if key.is_bus { NetKind::Bus } else { NetKind::Net },
            ),
            None => self
                .arena
                .alloc(if key.is_bus { NetKind::Bus } else { NetKind::Net }),
        };
        self.by_instcoord.insert(key.clone(), netbus);
        self.nodes_by_inst
            .entry(key.instance)
            .or_default()
            .push(obj.clone());
        netbus
    }

    // -- element entry points ---------------------------------------------

    /// Register a wire or bus segment.
    pub fn add_wire(&mut self, wire: &WireInput) -> NetId {
        let kind = if wire.bus { NetKind::Bus } else { NetKind::Net };
        let obj = NetObj {
            xys: wire.pts.clone(),
            is_bus: if wire.bus { Busness::Bus } else { Busness::Net },
        };
        // Sweep up point elements the segment passes through.
        let mut netbus: Option<NetId> = None;
        let nodes = self
            .nodes_by_inst
            .get(&wire.instance)
            .cloned()
            .unwrap_or_default();
        let mut surviving = Vec::with_capacity(nodes.len());
        for node in nodes.into_iter().rev() {
            if obj.touches(&node) {
                let key = InstCoord {
                    instance: wire.instance.clone(),
                    x: node.xys[0].0,
                    y: node.xys[0].1,
                    is_bus: node.is_bus == Busness::Bus,
                };
                netbus = Some(match netbus {
                    None => self.coord_get_or(key, kind),
                    Some(nb) => self.coord_merge(key, nb),
                });
            } else {
                surviving.push(node);
            }
        }
        surviving.reverse();
        self.nodes_by_inst.insert(wire.instance.clone(), surviving);
        self.wires_by_inst
            .entry(wire.instance.clone())
            .or_default()
            .push(obj);
        // Tie the endpoints together.
        for (x, y) in &wire.pts {
            let key = InstCoord {
                instance: wire.instance.clone(),
                x: *x,
                y: *y,
                is_bus: wire.bus,
            };
            netbus = Some(match netbus {
                None => self.coord_get_or(key, kind),
                Some(nb) => self.coord_merge(key, nb),
            });
        }
        netbus.unwrap_or_else(|| self.arena.alloc(kind))
    }

    /// Register a label and, when it names a bus, its member nets.
    pub fn add_label(&mut self, label: &LabelInput) -> NetId {
        let is_bus = !label.members.is_empty();
        let key = InstCoord {
            instance: label.instance.clone(),
            x: label.pos.0,
            y: label.pos.1,
            is_bus,
        };
        let obj = NetObj {
            xys: vec![label.pos],
            is_bus: if is_bus { Busness::Bus } else { Busness::Net },
        };
        let bound = self.add_node_at(key, &obj);
        let il = InstLabel {
            instance: (!label.global).then(|| label.instance.clone()),
            text: label.text.clone(),
        };
        let netbus = self.label_merge(il, bound);
        let name = if label.global {
            label.text.clone()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), label.text)
        };
        self.arena
            .add_name(netbus, NetName::text(NetCategory::Label, name));
        if let Some(scope) = &label.scope {
            self.label_scopes.push((scope.clone(), netbus));
        }
        for m in &label.members {
            let il = InstLabel {
                instance: (!label.global).then(|| label.instance.clone()),
                text: m.net.clone(),
            };
            let fresh = self.arena.alloc(NetKind::Net);
            let member_net = self.label_get_or(il.clone(), fresh);
            let member_net = self
                .arena
                .add_member(netbus, Some(m.member.clone()), member_net);
            self.by_instlabel.insert(il, member_net);
            let member_name = if label.global {
                m.member.clone()
            } else {
                format!("{}/{}", self.prefix.trim_end_matches('/'), m.net)
            };
            self.arena
                .add_name(member_net, NetName::text(NetCategory::Label, member_name));
        }
        netbus
    }

    /// Register a sheet pin. Sheet pins inherit the local name; bus pins
    /// defer stitching to [`Netlister::resolve`].
    pub fn add_sheetpin(&mut self, pin: &SheetPinInput) -> NetId {
        let is_bus = !pin.members.is_empty();
        let key = InstCoord {
            instance: pin.instance.clone(),
            x: pin.pos.0,
            y: pin.pos.1,
            is_bus,
        };
        let obj = NetObj {
            xys: vec![pin.pos],
            is_bus: if is_bus { Busness::Bus } else { Busness::Net },
        };
        // Sheet pins do not break wires, so bind through the wire scan.
        let netbus = self.add_node_at(key, &obj);
        let il = InstLabel {
            instance: Some(pin.subsheet_key.clone()),
            text: pin.name.clone(),
        };
        if is_bus {
            self.unresolved_buses.push(netbus);
            let fresh = self.arena.alloc(NetKind::Bus);
            let subsheet_bus = self.label_get_or(il, fresh);
            let local_labels = pin
                .members
                .iter()
                .map(|m| {
                    (
                        InstLabel {
                            instance: Some(pin.instance.clone()),
                            text: m.net.clone(),
                        },
                        Some(m.member.clone()),
                    )
                })
                .collect();
            self.arena
                .add_sheetpin(netbus, subsheet_bus, pin.name.clone(), local_labels);
            netbus
        } else {
            self.label_merge(il, netbus)
        }
    }

    /// Register a symbol pin. Pins break wires in the editor, so a plain
    /// coordinate merge suffices.
    pub fn add_sympin(&mut self, pin: &SymPinInput) -> NetId {
        let mut netbus = self.arena.alloc(NetKind::Net);
        let key = InstCoord {
            instance: pin.instance.clone(),
            x: pin.pos.0,
            y: pin.pos.1,
            is_bus: false,
        };
        if pin.power {
            let il = InstLabel {
                instance: None,
                text: pin.name.clone(),
            };
            netbus = self.label_get_or(il, netbus);
        } else if pin.no_connect {
            self.arena.add_nc(netbus, pin.instance.clone());
        }
        let netbus = self.coord_merge(key, netbus);
        let name = if pin.power {
            NetName::text(NetCategory::Power, pin.name.clone())
        } else {
            let category = if pin.refdes.starts_with('#') {
                NetCategory::SymPinPwr
            } else {
                NetCategory::SymPin
            };
            NetName::pin(category, pin.refdes.clone(), pin.name.clone(), pin.number.clone())
        };
        self.arena.add_name(netbus, name);
        if let Some(scope) = &pin.refdes_scope {
            self.pin_scopes
                .push((scope.clone(), pin.number.clone(), pin.name.clone(), netbus));
        }
        netbus
    }

    /// Register a no-connect marker. Bus-ness is unknown, so both layers
    /// get the marker.
    pub fn add_nc(&mut self, point: &PointInput) -> Vec<NetId> {
        let mut out = Vec::with_capacity(2);
        for is_bus in [false, true] {
            let key = InstCoord {
                instance: point.instance.clone(),
                x: point.pos.0,
                y: point.pos.1,
                is_bus,
            };
            let obj = NetObj {
                xys: vec![point.pos],
                is_bus: Busness::Unknown,
            };
            let netbus = self.add_node_at(key, &obj);
            self.arena.add_nc(netbus, point.instance.clone());
            out.push(netbus);
        }
        out
    }

    /// Register a junction. Junctions never change connectivity (wires
    /// already terminate there); they only claim the coordinate on both
    /// layers.
    pub fn add_junction(&mut self, point: &PointInput) -> Vec<NetId> {
        let mut out = Vec::with_capacity(2);
        for is_bus in [false, true] {
            let key = InstCoord {
                instance: point.instance.clone(),
                x: point.pos.0,
                y: point.pos.1,
                is_bus,
            };
            let kind = if is_bus { NetKind::Bus } else { NetKind::Net };
            out.push(self.coord_get_or(key, kind));
        }
        out
    }

    /// Register a bus entry: both ends claim both layers.
    pub fn add_busentry(&mut self, instance: &str, pts: &[(Fixed, Fixed)]) -> Vec<NetId> {
        let mut out = Vec::new();
        for is_bus in [false, true] {
            for (x, y) in pts {
                let key = InstCoord {
                    instance: instance.to_owned(),
                    x: *x,
                    y: *y,
                    is_bus,
                };
                let kind = if is_bus { NetKind::Bus } else { NetKind::Net };
                out.push(self.coord_get_or(key, kind));
            }
        }
        out
    }

    // -- resolution --------------------------------------------------------

    /// Process accumulated bus stitching. Call after every page instance has
    /// been added and before querying names.
    pub fn resolve(&mut self) {
        let unresolved = std::mem::take(&mut self.unresolved_buses);
        // First pass: unnamed buses synthesize local labels from the union
        // of their sheet-pin member names.
        for bus in &unresolved {
            for (il, net) in self.gen_local_labels(*bus) {
                self.label_merge(il, net);
            }
        }
        // Second pass: merge with child-sheet buses, whole when the member
        // sets coincide exactly, member-wise otherwise.
        for bus in &unresolved {
            self.resolve_sheetpins(*bus);
        }
        debug!(components = self.arena.len(), "netlist resolved");
    }

    fn gen_local_labels(&mut self, bus: NetId) -> Vec<(InstLabel, NetId)> {
        let sheetpins = self.arena.take_sheetpins(bus);
        if sheetpins.is_empty() || self.component_name(bus).is_some() {
            return Vec::new();
        }
        // The lexicographically-least pin name donates its member list.
        let donor = sheetpins
            .into_iter()
            .min_by_key(|(name, _)| (name.to_uppercase(), name.clone()));
        let Some((_, members)) = donor else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (il, member) in members {
            let fresh = self.arena.alloc(NetKind::Net);
            let net = self.arena.add_member(bus, member, fresh);
            out.push((il, net));
        }
        out
    }

    fn resolve_sheetpins(&mut self, bus: NetId) {
        let subsheet_buses = self.arena.take_subsheet_buses(bus);
        for sub in subsheet_buses {
            let sub = self.arena.find(sub);
            let root = self.arena.find(bus);
            if sub == root {
                continue;
            }
            let sub_keys: BTreeSet<MemberKey> = self.arena.members(sub).keys().cloned().collect();
            let own_keys: BTreeSet<MemberKey> = self.arena.members(root).keys().cloned().collect();
            if sub_keys == own_keys {
                self.arena.merge_into(sub, root);
                continue;
            }
            for member in own_keys {
                if !sub_keys.contains(&member) {
                    continue;
                }
                let bound = self.arena.members(root).get(&member).copied();
                if let Some(net) = bound {
                    let net = self.arena.find(net);
                    self.arena.add_member(sub, member, net);
                }
            }
        }
    }

    // -- naming and output -------------------------------------------------

    /// Canonical name of a component, or `None` when unnamed.
    #[must_use]
    pub fn component_name(&self, id: NetId) -> Option<String> {
        let names = self.arena.names(id);
        let best = names.iter().next()?;
        if matches!(best.category, NetCategory::SymPin | NetCategory::SymPinPwr) {
            if let NameKind::Pin {
                refdes,
                name,
                number,
            } = &best.kind
            {
                let sympins = names
                    .iter()
                    .filter(|n| n.category == NetCategory::SymPin)
                    .count();
                let pre = if sympins > 1 { "Net" } else { "unconnected" };
                let pad = format!("Pad{number}");
                let joined: Vec<&str> = [refdes.as_str(), name.as_str(), pad.as_str()]
                    .into_iter()
                    .filter(|p| !p.is_empty() && *p != "~")
                    .collect();
                return Some(format!("{pre}-({})", joined.join("-")));
            }
        }
        match &best.kind {
            NameKind::Text(t) => Some(t.clone()),
            NameKind::Pin {
                refdes, number, ..
            } => Some(format!("{refdes}.{number}")),
        }
    }

    /// Pin nodes of a component: `(unit-stripped refdes, pin name, number)`,
    /// sorted by (refdes, number, name).
    fn component_pins(&self, id: NetId) -> Vec<(String, String, String)> {
        let mut pins: BTreeSet<(String, String, String)> = BTreeSet::new();
        for n in self.arena.names(id) {
            if n.category != NetCategory::SymPin {
                continue;
            }
            if let NameKind::Pin {
                refdes,
                name,
                number,
            } = &n.kind
            {
                pins.insert((
                    strip_unit(refdes).to_owned(),
                    number.clone(),
                    name.clone(),
                ));
            }
        }
        let mut out: Vec<(String, String, String)> = pins
            .into_iter()
            .map(|(r, num, name)| (r, name, num))
            .collect();
        out.sort_by(|a, b| (&a.0, &a.2, &a.1).cmp(&(&b.0, &b.2, &b.1)));
        out
    }

    /// Format one net, or `None` when it has nothing to report.
    #[must_use]
    pub fn format_net(&self, id: NetId, fmt: NetFormat) -> Option<String> {
        let name = self.component_name(id)?;
        let pins = self.component_pins(id);
        if pins.is_empty() {
            return None;
        }
        // Single-node nets with an explicit no-connect marker are dropped.
        if pins.len() == 1 && !self.arena.ncs(id).is_empty() {
            return None;
        }
        match fmt {
            NetFormat::Compact => {
                let nodes: Vec<String> = pins
                    .iter()
                    .filter(|(r, _, _)| !r.starts_with('#'))
                    .map(|(r, _, num)| format!("{r}.{num}"))
                    .collect();
                Some(format!("{name}: {}", nodes.join(" ")))
            }
            NetFormat::WithPinNames => {
                let nodes: Vec<String> = pins
                    .iter()
                    .filter(|(r, _, _)| !r.starts_with('#'))
                    .map(|(r, pname, num)| {
                        let label = if pname.is_empty() { "~" } else { pname };
                        if label == "~" || label == num {
                            format!("{r}.{num}")
                        } else {
                            format!("{r}.{num}({label})")
                        }
                    })
                    .collect();
                Some(format!("{name}: {}", nodes.join(" ")))
            }
            NetFormat::NamedBlock => {
                let quoted = if name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/')
                {
                    name.to_uppercase()
                } else {
                    format!("'{}'", name.to_uppercase())
                };
                let nodes: Vec<String> = pins
                    .iter()
                    .filter(|(r, _, _)| !r.starts_with('#'))
                    .map(|(r, _, num)| format!("{r}.{num}"))
                    .collect();
                Some(format!("{quoted};,\n\t{}", nodes.join(",\n\t")))
            }
        }
    }

    /// Generate the full netlist in the chosen format.
    #[must_use]
    pub fn generate(&self, fmt: NetFormat) -> String {
        let mut roots: BTreeSet<NetId> = BTreeSet::new();
        for id in self.by_instcoord.values() {
            let root = self.arena.find_ro(*id);
            if self.arena.kind(root) == NetKind::Net {
                roots.insert(root);
            }
        }
        let mut lines: Vec<String> = roots
            .iter()
            .filter_map(|id| self.format_net(*id, fmt))
            .collect();
        lines.sort_by(|a, b| {
            a.trim_start_matches('\'')
                .cmp(b.trim_start_matches('\''))
        });
        let prefix = if fmt == NetFormat::NamedBlock {
            "$NETS\n"
        } else {
            ""
        };
        format!("{prefix}{}", lines.join("\n"))
    }

    /// Canonical name for the component at a coordinate, if any.
    #[must_use]
    pub fn net_at(&self, key: &InstCoord) -> Option<String> {
        let id = self.by_instcoord.get(key)?;
        self.component_name(self.arena.find_ro(*id))
    }

    /// Backfill net-related special variables for labels and symbol pins.
    ///
    /// Must run after [`Netlister::resolve`]; pin-related variable
    /// expansion queries the netlister through these slots.
    pub fn fill_net_vars(&self, vars: &mut Variables) {
        for (scope, net) in &self.label_scopes {
            let root = self.arena.find_ro(*net);
            let name = self.component_name(root).unwrap_or_default();
            let short = name.rsplit('/').next().unwrap_or_default().to_owned();
            vars.define(scope, special::NET_NAME, name.clone());
            vars.define(scope, special::SHORT_NET_NAME, short);
            vars.define(scope, special::NET_CLASS, "Default");
        }
        for (scope, number, pin_name, net) in &self.pin_scopes {
            let root = self.arena.find_ro(*net);
            let name = self.component_name(root).unwrap_or_default();
            let short = name.rsplit('/').next().unwrap_or_default().to_owned();
            vars.define(scope, &format!("PIN_NAME({number})"), pin_name.clone());
            vars.define(scope, &format!("NET_NAME({number})"), name);
            vars.define(scope, &format!("SHORT_NET_NAME({number})"), short);
            vars.define(scope, &format!("NET_CLASS({number})"), "Default");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(n: i64) -> Fixed {
        Fixed::from_value(&crate::sexp::Value::Int(n))
    }

    fn wire(inst: &str, a: (i64, i64), b: (i64, i64)) -> WireInput {
        WireInput {
            instance: inst.to_owned(),
            pts: vec![(fx(a.0), fx(a.1)), (fx(b.0), fx(b.1))],
            bus: false,
        }
    }

    fn sympin(inst: &str, pos: (i64, i64), refdes: &str, name: &str, number: &str) -> SymPinInput {
        SymPinInput {
            instance: inst.to_owned(),
            refdes_scope: None,
            pos: (fx(pos.0), fx(pos.1)),
            refdes: refdes.to_owned(),
            name: name.to_owned(),
            number: number.to_owned(),
            power: false,
            no_connect: false,
        }
    }

    #[test]
    fn wired_pins_share_a_net() {
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        let a = n.add_sympin(&sympin("/p", (0, 0), "R1", "~", "1"));
        let b = n.add_sympin(&sympin("/p", (10, 0), "U2", "IN", "3"));
        n.resolve();
        let mut arena = n.arena.clone();
        assert_eq!(arena.find(a), arena.find(b));
    }

    #[test]
    fn scenario_unlabeled_two_pin_net() {
        // S7: two pins R1.1 and U2.3 wired together, no label.
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        let a = n.add_sympin(&sympin("/p", (0, 0), "R1", "~", "1"));
        n.add_sympin(&sympin("/p", (10, 0), "U2", "IN", "3"));
        n.resolve();
        let root = n.arena.find_ro(a);
        assert_eq!(n.component_name(root), Some("Net-(R1-Pad1)".to_owned()));
        let compact = n.generate(NetFormat::Compact);
        assert_eq!(compact, "Net-(R1-Pad1): R1.1 U2.3");
    }

    #[test]
    fn single_pin_net_is_unconnected() {
        let mut n = Netlister::new();
        let a = n.add_sympin(&sympin("/p", (0, 0), "U9", "CLK", "7"));
        n.resolve();
        assert_eq!(
            n.component_name(n.arena.find_ro(a)),
            Some("unconnected-(U9-CLK-Pad7)".to_owned())
        );
    }

    #[test]
    fn label_wins_over_pins() {
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        n.add_sympin(&sympin("/p", (0, 0), "R1", "~", "1"));
        let l = n.add_label(&LabelInput {
            instance: "/p".to_owned(),
            scope: None,
            pos: (fx(5), fx(0)),
            text: "CLK".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.resolve();
        assert_eq!(n.component_name(n.arena.find_ro(l)), Some("/CLK".to_owned()));
    }

    #[test]
    fn global_labels_connect_across_instances() {
        let mut n = Netlister::new();
        let a = n.add_label(&LabelInput {
            instance: "/page1".to_owned(),
            scope: None,
            pos: (fx(0), fx(0)),
            text: "NRST".to_owned(),
            global: true,
            members: Vec::new(),
        });
        let b = n.add_label(&LabelInput {
            instance: "/page2".to_owned(),
            scope: None,
            pos: (fx(7), fx(7)),
            text: "NRST".to_owned(),
            global: true,
            members: Vec::new(),
        });
        n.resolve();
        assert_eq!(n.arena.find_ro(a), n.arena.find_ro(b));
        assert_eq!(n.component_name(n.arena.find_ro(a)), Some("NRST".to_owned()));
    }

    #[test]
    fn local_labels_stay_per_instance() {
        let mut n = Netlister::new();
        let a = n.add_label(&LabelInput {
            instance: "/page1".to_owned(),
            scope: None,
            pos: (fx(0), fx(0)),
            text: "SIG".to_owned(),
            global: false,
            members: Vec::new(),
        });
        let b = n.add_label(&LabelInput {
            instance: "/page2".to_owned(),
            scope: None,
            pos: (fx(0), fx(0)),
            text: "SIG".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.resolve();
        assert_ne!(n.arena.find_ro(a), n.arena.find_ro(b));
    }

    #[test]
    fn power_pins_connect_by_name() {
        let mut n = Netlister::new();
        let a = n.add_sympin(&SymPinInput {
            power: true,
            ..sympin("/p1", (0, 0), "U1", "VDD", "8")
        });
        let b = n.add_sympin(&SymPinInput {
            power: true,
            ..sympin("/p2", (5, 5), "U7", "VDD", "4")
        });
        n.resolve();
        assert_eq!(n.arena.find_ro(a), n.arena.find_ro(b));
        // Power nets take the power-pin name verbatim.
        assert_eq!(n.component_name(n.arena.find_ro(a)), Some("VDD".to_owned()));
    }

    #[test]
    fn explicit_nc_suppresses_single_pin_output() {
        let mut n = Netlister::new();
        let id = n.add_sympin(&sympin("/p", (0, 0), "U3", "NC", "9"));
        n.add_nc(&PointInput {
            instance: "/p".to_owned(),
            pos: (fx(0), fx(0)),
        });
        n.resolve();
        assert_eq!(n.format_net(n.arena.find_ro(id), NetFormat::Compact), None);
    }

    #[test]
    fn label_on_wire_midspan_connects() {
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        let pin = n.add_sympin(&sympin("/p", (0, 0), "R1", "~", "1"));
        let l = n.add_label(&LabelInput {
            instance: "/p".to_owned(),
            scope: None,
            pos: (fx(4), fx(0)),
            text: "MID".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.resolve();
        assert_eq!(n.arena.find_ro(pin), n.arena.find_ro(l));
    }

    #[test]
    fn node_before_wire_still_connects() {
        let mut n = Netlister::new();
        // Label placed before the wire exists, mid-span.
        let l = n.add_label(&LabelInput {
            instance: "/p".to_owned(),
            scope: None,
            pos: (fx(4), fx(0)),
            text: "MID".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        let pin = n.add_sympin(&sympin("/p", (0, 0), "R1", "~", "1"));
        n.resolve();
        assert_eq!(n.arena.find_ro(pin), n.arena.find_ro(l));
    }

    #[test]
    fn sheet_pin_stitches_into_subsheet() {
        let mut n = Netlister::new();
        // Parent page: wire from a pin to the sheet pin at (10,0).
        n.add_wire(&wire("/root", (0, 0), (10, 0)));
        let parent_pin = n.add_sympin(&sympin("/root", (0, 0), "R1", "~", "1"));
        n.add_sheetpin(&SheetPinInput {
            instance: "/root".to_owned(),
            subsheet_key: "/root/sheet1".to_owned(),
            pos: (fx(10), fx(0)),
            name: "DATA".to_owned(),
            members: Vec::new(),
        });
        // Child page instance: hierarchical label of the same name.
        n.set_prefix("/child");
        let child = n.add_label(&LabelInput {
            instance: "/root/sheet1".to_owned(),
            scope: None,
            pos: (fx(3), fx(3)),
            text: "DATA".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.resolve();
        assert_eq!(n.arena.find_ro(parent_pin), n.arena.find_ro(child));
    }

    #[test]
    fn bus_members_resolve_through_sheet_pins() {
        let mut n = Netlister::new();
        n.set_prefix("/");
        // Parent: bus label D{A B} at a bus sheet pin.
        let bus = n.add_label(&LabelInput {
            instance: "/root".to_owned(),
            scope: None,
            pos: (fx(0), fx(0)),
            text: "D{A B}".to_owned(),
            global: false,
            members: vec![
                BusMemberInput {
                    member: "A".to_owned(),
                    net: "D.A".to_owned(),
                },
                BusMemberInput {
                    member: "B".to_owned(),
                    net: "D.B".to_owned(),
                },
            ],
        });
        n.add_wire(&WireInput {
            instance: "/root".to_owned(),
            pts: vec![(fx(0), fx(0)), (fx(10), fx(0))],
            bus: true,
        });
        n.add_sheetpin(&SheetPinInput {
            instance: "/root".to_owned(),
            subsheet_key: "/root/sheet1".to_owned(),
            pos: (fx(10), fx(0)),
            name: "D{A B}".to_owned(),
            members: vec![
                BusMemberInput {
                    member: "A".to_owned(),
                    net: "D.A".to_owned(),
                },
                BusMemberInput {
                    member: "B".to_owned(),
                    net: "D.B".to_owned(),
                },
            ],
        });
        // Child: same-membered bus label.
        let child_bus = n.add_label(&LabelInput {
            instance: "/root/sheet1".to_owned(),
            scope: None,
            pos: (fx(1), fx(1)),
            text: "D{A B}".to_owned(),
            global: false,
            members: vec![
                BusMemberInput {
                    member: "A".to_owned(),
                    net: "D.A".to_owned(),
                },
                BusMemberInput {
                    member: "B".to_owned(),
                    net: "D.B".to_owned(),
                },
            ],
        });
        n.resolve();
        assert_eq!(n.arena.find_ro(bus), n.arena.find_ro(child_bus));
    }

    #[test]
    fn netlist_output_is_sorted_and_deterministic() {
        let build = || {
            let mut n = Netlister::new();
            n.add_wire(&wire("/p", (0, 0), (10, 0)));
            n.add_sympin(&sympin("/p", (0, 0), "R2", "~", "1"));
            n.add_sympin(&sympin("/p", (10, 0), "R3", "~", "2"));
            n.add_wire(&wire("/p", (0, 5), (10, 5)));
            n.add_sympin(&sympin("/p", (0, 5), "R1", "~", "1"));
            n.add_label(&LabelInput {
                instance: "/p".to_owned(),
                scope: None,
                pos: (fx(5), fx(5)),
                text: "ACLK".to_owned(),
                global: false,
                members: Vec::new(),
            });
            n.add_sympin(&sympin("/p", (10, 5), "R4", "~", "2"));
            n.resolve();
            n.generate(NetFormat::Compact)
        };
        let a = build();
        let b = build();
        assert_eq!(a, b, "netlister output must be deterministic");
        let lines: Vec<&str> = a.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("/ACLK: "));
        assert!(lines[1].starts_with("Net-("));
    }

    #[test]
    fn named_block_format_quotes_and_uppercases() {
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        n.add_sympin(&sympin("/p", (0, 0), "R1", "~", "1"));
        n.add_sympin(&sympin("/p", (10, 0), "R2", "~", "2"));
        n.add_label(&LabelInput {
            instance: "/p".to_owned(),
            scope: None,
            pos: (fx(5), fx(0)),
            text: "clk".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.resolve();
        let out = n.generate(NetFormat::NamedBlock);
        assert!(out.starts_with("$NETS\n"));
        assert!(out.contains("/CLK;,\n\tR1.1,\n\tR2.2"));
    }

    #[test]
    fn with_pin_names_format() {
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        n.add_sympin(&sympin("/p", (0, 0), "U1", "VOUT", "2"));
        n.add_sympin(&sympin("/p", (10, 0), "R1", "~", "1"));
        n.resolve();
        let out = n.generate(NetFormat::WithPinNames);
        assert!(out.contains("R1.1 U1.2(VOUT)"), "{out}");
    }

    #[test]
    fn fill_net_vars_defines_slots() {
        let mut n = Netlister::new();
        n.add_wire(&wire("/p", (0, 0), (10, 0)));
        n.add_sympin(&SymPinInput {
            refdes_scope: Some("R1".to_owned()),
            ..sympin("/p", (0, 0), "R1", "~", "1")
        });
        n.add_label(&LabelInput {
            instance: "/p".to_owned(),
            scope: Some("/p/label1".to_owned()),
            pos: (fx(5), fx(0)),
            text: "CLK".to_owned(),
            global: false,
            members: Vec::new(),
        });
        n.resolve();
        let mut vars = Variables::new();
        n.fill_net_vars(&mut vars);
        assert_eq!(vars.resolve("/p/label1", "NET_NAME"), Some("/CLK".to_owned()));
        assert_eq!(
            vars.resolve("/p/label1", "SHORT_NET_NAME"),
            Some("CLK".to_owned())
        );
        assert_eq!(vars.resolve("R1", "NET_NAME(1)"), Some("/CLK".to_owned()));
        assert_eq!(vars.resolve("R1", "PIN_NAME(1)"), Some("~".to_owned()));
    }
}
