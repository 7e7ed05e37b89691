//! Symbol library accessors: library lookup, `extends` resolution, pin
//! enumeration, and the deduplicating content hash.
//!
//! A library is either a standalone symbol file or the `lib_symbols` cache
//! embedded in a schematic page. Symbol definitions contain one body per
//! `(unit, variant)` pair, named `<name>_<unit>_<variant>`; unit 0 bodies
//! are common to all units.

use sha2::{Digest, Sha256};

use crate::sexp::{NodeId, Tree, Value, print_node};

use super::class::NodeClass;

// ---------------------------------------------------------------------------
// Library lookup
// ---------------------------------------------------------------------------

/// The symbol library embedded in a schematic page, if any.
#[must_use]
pub fn page_library(tree: &Tree, page: NodeId) -> Option<NodeId> {
    tree.get_node(page, "lib_symbols")
}

/// Find a symbol definition by name within a library.
#[must_use]
pub fn library_symbol(tree: &Tree, lib: NodeId, name: &str) -> Option<NodeId> {
    tree.children_of(lib, "symbol")
        .iter()
        .copied()
        .find(|s| tree.value_at(*s, 0).map(Value::text).as_deref() == Some(name))
}

/// All symbol definitions of a library, `(name, node)`.
#[must_use]
pub fn library_symbols(tree: &Tree, lib: NodeId) -> Vec<(String, NodeId)> {
    tree.children_of(lib, "symbol")
        .iter()
        .map(|s| {
            (
                tree.value_at(*s, 0).map(Value::text).unwrap_or_default(),
                *s,
            )
        })
        .collect()
}

/// Content hash of a symbol, for deduplicating library caches. Stable
/// across processes (unlike pointer-based identities) because it hashes the
/// printed form.
#[must_use]
pub fn symbol_hash(tree: &Tree, symbol: NodeId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(print_node(tree, symbol).as_bytes());
    let digest = hasher.finalize();
    // 64 bits of digest are plenty for a per-project cache key.
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Resolve `extends` indirection: a derived symbol borrows the body of the
/// named parent in the same library.
#[must_use]
pub fn resolve_extends(tree: &Tree, lib: NodeId, symbol: NodeId) -> NodeId {
    if let Some(parent) = tree.get_value(symbol, "extends").map(Value::text) {
        if let Some(base) = library_symbol(tree, lib, &parent) {
            return base;
        }
    }
    symbol
}

// ---------------------------------------------------------------------------
// Bodies and units
// ---------------------------------------------------------------------------

/// Unit ordinal encoded in a body's name (`R_2_1` → 2).
#[must_use]
pub fn body_unit(tree: &Tree, body: NodeId) -> i64 {
    body_name_field(tree, body, 2)
}

/// Variant ordinal encoded in a body's name (`R_2_1` → 1).
#[must_use]
pub fn body_variant(tree: &Tree, body: NodeId) -> i64 {
    body_name_field(tree, body, 1)
}

fn body_name_field(tree: &Tree, body: NodeId, from_end: usize) -> i64 {
    let name = tree.value_at(body, 0).map(Value::text).unwrap_or_default();
    let mut parts = name.rsplit('_');
    for _ in 1..from_end {
        parts.next();
    }
    parts.next().and_then(|p| p.parse().ok()).unwrap_or(0)
}

/// Bodies of a symbol relevant to one placed `(unit, variant)` pair: the
/// common bodies plus the exact ones.
#[must_use]
pub fn bodies_for(tree: &Tree, symbol: NodeId, unit: i64, variant: i64) -> Vec<NodeId> {
    tree.children_of(symbol, "symbol")
        .iter()
        .copied()
        .filter(|b| {
            let (bu, bv) = (body_unit(tree, *b), body_variant(tree, *b));
            (bu == 0 || bu == unit) && (bv == 0 || bv == variant)
        })
        .collect()
}

/// A symbol is multi-unit when any body names a unit above one.
#[must_use]
pub fn show_unit(tree: &Tree, symbol: NodeId) -> bool {
    tree.children_of(symbol, "symbol")
        .iter()
        .map(|b| body_unit(tree, *b))
        .max()
        .unwrap_or(0)
        > 1
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

/// Pin name and number, honoring an alternate selection when present.
#[must_use]
pub fn pin_name_num(tree: &Tree, pin: NodeId, alternate: Option<&str>) -> (String, String) {
    let name = alternate.map_or_else(
        || {
            tree.get_value(pin, "name")
                .map(Value::text)
                .unwrap_or_default()
        },
        ToOwned::to_owned,
    );
    let number = tree
        .get_value(pin, "number")
        .map(Value::text)
        .unwrap_or_default();
    (name, number)
}

/// Electrical type and graphic style of a pin, honoring alternates.
#[must_use]
pub fn pin_type_style(tree: &Tree, pin: NodeId, alternate: Option<&str>) -> (String, String) {
    if let Some(alt) = alternate {
        for a in tree.children_of(pin, "alternate") {
            if tree.value_at(*a, 0).map(Value::text).as_deref() == Some(alt) {
                return (
                    tree.value_at(*a, 1).map(Value::text).unwrap_or_default(),
                    tree.value_at(*a, 2).map(Value::text).unwrap_or_default(),
                );
            }
        }
    }
    (
        tree.value_at(pin, 0).map(Value::text).unwrap_or_default(),
        tree.value_at(pin, 1).map(Value::text).unwrap_or_default(),
    )
}

/// Hidden pins do not render; hidden power-input pins become global power
/// connections.
#[must_use]
pub fn pin_hidden(tree: &Tree, pin: NodeId) -> bool {
    if tree.has_atom(pin, "hide") {
        return true;
    }
    // Newer grammar: (hide yes)
    tree.get_value(pin, "hide")
        .map(Value::text)
        .is_some_and(|v| v == "yes")
}

/// Raw pin anchor position in symbol-body space.
#[must_use]
pub fn pin_pos(tree: &Tree, pin: NodeId) -> (f64, f64) {
    tree.get_node(pin, "at")
        .map_or((0.0, 0.0), |at| super::coord::pos_f64(tree, at))
}

/// Pin definitions of one body.
#[must_use]
pub fn body_pins(tree: &Tree, body: NodeId) -> Vec<NodeId> {
    tree.children_of(body, "pin")
        .iter()
        .copied()
        .filter(|p| tree.class(*p) == NodeClass::PinDef)
        .collect()
}

/// `name → [numbers]` for every pin visible on a symbol at a variant.
#[must_use]
pub fn symbol_pins(tree: &Tree, symbol: NodeId, variant: i64) -> Vec<(String, Vec<String>)> {
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for body in tree.children_of(symbol, "symbol") {
        let bv = body_variant(tree, *body);
        if bv != 0 && bv != variant {
            continue;
        }
        for pin in body_pins(tree, *body) {
            let (name, num) = pin_name_num(tree, pin, None);
            match out.iter_mut().find(|(n, _)| *n == name) {
                Some((_, nums)) => nums.push(num),
                None => out.push((name, vec![num])),
            }
        }
    }
    out
}

/// Name-offset/visibility configuration for pin text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinConfig {
    pub name_offset: f64,
    pub name_hidden: bool,
    pub number_hidden: bool,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            name_offset: 0.508,
            name_hidden: false,
            number_hidden: false,
        }
    }
}

/// Read a symbol's `pin_names`/`pin_numbers` configuration.
#[must_use]
pub fn pin_config(tree: &Tree, symbol: NodeId) -> PinConfig {
    let mut cfg = PinConfig::default();
    if let Some(names) = tree.get_node(symbol, "pin_names") {
        if let Some(offset) = tree.get_value(names, "offset").and_then(Value::as_f64) {
            cfg.name_offset = offset;
        }
        cfg.name_hidden = tree.has_atom(names, "hide");
    }
    if let Some(numbers) = tree.get_node(symbol, "pin_numbers") {
        cfg.number_hidden = tree.has_atom(numbers, "hide");
    }
    cfg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
