//! Schematic page accessors and the variable/netlist fill walks.
//!
//! A page is the `kicad_sch` root of one file. Operations here are
//! context-parametric: the same page reached through two sheet paths yields
//! two variable scopes, two netlist instances, and two sets of resolved
//! property values. Context is threaded as an instance-path string
//! (`/root-uuid/sheet-uuid/…`) rather than a node stack; nodes that carry
//! identity extend the scope as the walk descends.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SchemError;
use crate::netlist::{
    BusMemberInput, Fixed, LabelInput, Netlister, PointInput, SheetPinInput, SymPinInput,
    WireInput,
};
use crate::sexp::{NodeId, Tree, Value};
use crate::vars::{Variables, special};

use super::class::NodeClass;
use super::coord;
use super::symbol as sym;
use super::unit_to_alpha;
use super::worksheet::ALL_WKS_VARS;

// ---------------------------------------------------------------------------
// Version gate
// ---------------------------------------------------------------------------

/// Oldest supported file version.
pub const MIN_VERSION: i64 = 20220000;
/// Newest supported file version.
pub const MAX_VERSION: i64 = 20250114;

/// The file's `version` value, when present.
#[must_use]
pub fn version_value(tree: &Tree) -> Option<i64> {
    tree.get_value(tree.root(), "version").and_then(Value::as_int)
}

/// Reject files outside the supported version range.
///
/// # Errors
///
/// [`SchemError::UnsupportedVersion`] with the offending value (zero when
/// the version child is missing entirely).
pub fn check_version(tree: &Tree) -> Result<i64, SchemError> {
    let found = version_value(tree).unwrap_or(0);
    if (MIN_VERSION..=MAX_VERSION).contains(&found) {
        Ok(found)
    } else {
        Err(SchemError::UnsupportedVersion {
            found,
            min: MIN_VERSION,
            max: MAX_VERSION,
        })
    }
}

// ---------------------------------------------------------------------------
// Page accessors
// ---------------------------------------------------------------------------

/// Paper size name, defaulting to A4.
#[must_use]
pub fn paper(tree: &Tree, page: NodeId) -> String {
    tree.get_value(page, "paper")
        .map_or_else(|| "A4".to_owned(), Value::text)
}

/// Title from the title block, if any.
#[must_use]
pub fn page_title(tree: &Tree, page: NodeId) -> Option<String> {
    let tb = tree.get_node(page, "title_block")?;
    tree.get_value(tb, "title").map(Value::text)
}

/// The root `path` element when this page is a project root (its
/// `sheet_instances` starts at `/`).
#[must_use]
pub fn root_path(tree: &Tree, page: NodeId) -> Option<NodeId> {
    let si = tree.get_node(page, "sheet_instances")?;
    let first = tree.children_of(si, "path").first().copied()?;
    (tree.value_at(first, 0).map(Value::text).as_deref() == Some("/")).then_some(first)
}

/// First property child with the given name; returns its value.
#[must_use]
pub fn field_value(tree: &Tree, node: NodeId, name: &str) -> Option<String> {
    tree.children_of(node, "property")
        .iter()
        .find(|p| tree.value_at(**p, 0).map(Value::text).as_deref() == Some(name))
        .and_then(|p| tree.value_at(*p, 1).map(Value::text))
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// Instance path entries of an `instances` block, `(path string, path node)`.
///
/// When `project` is `None` the first project listed is taken; entries of
/// other projects are skipped.
#[must_use]
pub fn instance_paths(
    tree: &Tree,
    instances: NodeId,
    project: Option<&str>,
) -> Vec<(String, NodeId)> {
    let mut chosen = project.map(ToOwned::to_owned);
    let mut out = Vec::new();
    for proj in tree.children_of(instances, "project") {
        let pname = tree.value_at(*proj, 0).map(Value::text).unwrap_or_default();
        if chosen.is_none() {
            chosen = Some(pname.clone());
        }
        if !pname.is_empty() && chosen.as_deref() != Some(pname.as_str()) {
            continue;
        }
        for path in tree.children_of(*proj, "path") {
            let p = tree.value_at(*path, 0).map(Value::text).unwrap_or_default();
            out.push((p, *path));
        }
    }
    out
}

/// Per-instance datum (`reference`, `unit`, `page`) for a symbol or sheet,
/// looked up by the page-instance path.
#[must_use]
pub fn instance_data(
    tree: &Tree,
    node: NodeId,
    project: Option<&str>,
    instance: &str,
    field: &str,
) -> Option<Value> {
    let instances = tree.get_node(node, "instances")?;
    for (path, path_node) in instance_paths(tree, instances, project) {
        if path == instance {
            return tree.get_value(path_node, field).cloned();
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

/// Display name of a sheet (its `Sheetname` field).
#[must_use]
pub fn sheet_name(tree: &Tree, sheet: NodeId) -> Option<String> {
    field_value(tree, sheet, "Sheetname")
}

/// Referenced file of a sheet (its `Sheetfile` field).
#[must_use]
pub fn sheet_file(tree: &Tree, sheet: NodeId) -> Option<String> {
    field_value(tree, sheet, "Sheetfile")
}

/// Every sheet reference on a page with its declared parent instance paths:
/// `(parent path, sheet node)`.
#[must_use]
pub fn page_sheets(tree: &Tree, page: NodeId, project: Option<&str>) -> Vec<(String, NodeId)> {
    let mut out = Vec::new();
    for sheet in tree.children_of(page, "sheet") {
        let Some(instances) = tree.get_node(*sheet, "instances") else {
            continue;
        };
        for (path, _) in instance_paths(tree, instances, project) {
            out.push((path, *sheet));
        }
    }
    out
}

/// Instance views inferred from embedded bookkeeping, for standalone pages
/// with no project context: `(parent path, leaf identity)`.
#[must_use]
pub fn inferred_instances(tree: &Tree, page: NodeId, project: Option<&str>) -> Vec<(String, String)> {
    let mut paths: BTreeSet<String> = BTreeSet::new();
    for group in ["sheet", "symbol"] {
        for node in tree.children_of(page, group) {
            if let Some(instances) = tree.get_node(*node, "instances") {
                for (path, _) in instance_paths(tree, instances, project) {
                    paths.insert(path);
                }
            }
        }
    }
    paths
        .into_iter()
        .map(|p| match p.rfind('/') {
            Some(i) => (p[..i].to_owned(), p[i + 1..].to_owned()),
            None => (String::new(), p),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Symbol instances
// ---------------------------------------------------------------------------

/// Resolved reference designator of a placed symbol at one instance.
#[must_use]
pub fn symbol_refdes(tree: &Tree, symbol: NodeId, project: Option<&str>, instance: &str) -> String {
    instance_data(tree, symbol, project, instance, "reference")
        .map(|v| v.text())
        .or_else(|| field_value(tree, symbol, "Reference"))
        .unwrap_or_else(|| "?".to_owned())
}

/// Resolved unit ordinal of a placed symbol at one instance.
#[must_use]
pub fn symbol_unit(tree: &Tree, symbol: NodeId, project: Option<&str>, instance: &str) -> i64 {
    instance_data(tree, symbol, project, instance, "unit")
        .and_then(|v| v.as_int())
        .or_else(|| tree.get_value(symbol, "unit").and_then(Value::as_int))
        .unwrap_or(1)
}

/// Mirror axis of a placed symbol (`x`, `y`, or none).
#[must_use]
pub fn symbol_mirror(tree: &Tree, symbol: NodeId) -> Option<String> {
    tree.get_value(symbol, "mirror").map(Value::text)
}

/// Rotation of a placed symbol.
#[must_use]
pub fn symbol_rot(tree: &Tree, symbol: NodeId) -> f64 {
    tree.get_node(symbol, "at").map_or(0.0, |at| coord::rot(tree, at))
}

/// Simplified rotation plus mirror where the mirror is never `y`.
#[must_use]
pub fn symbol_rot_mirror(tree: &Tree, symbol: NodeId) -> (f64, Option<String>) {
    let mut rot = symbol_rot(tree, symbol);
    let mut mirror = symbol_mirror(tree, symbol);
    if mirror.as_deref() == Some("y") {
        rot = (rot + 180.0) % 360.0;
        mirror = Some("x".to_owned());
    }
    (rot, mirror)
}

/// Alternate pin-function selections on a placed symbol: number → name.
#[must_use]
pub fn symbol_alternates(tree: &Tree, symbol: NodeId) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for pin in tree.children_of(symbol, "pin") {
        if tree.class(*pin) != NodeClass::PinInst {
            continue;
        }
        let Some(number) = tree.value_at(*pin, 0).map(Value::text) else {
            continue;
        };
        if let Some(alt) = tree.get_value(*pin, "alternate").map(Value::text) {
            out.insert(number, alt);
        }
    }
    out
}

/// Map a pin position from symbol-body space into page space.
///
/// Symbol bodies are Y-up while pages are Y-down; the placement then
/// mirrors, rotates clockwise, and translates.
#[must_use]
pub fn transform_pin(
    at: (f64, f64),
    rot_deg: f64,
    mirror: Option<&str>,
    pin: (f64, f64),
) -> (f64, f64) {
    let mut p = (pin.0, -pin.1);
    match mirror {
        Some("x") => p.1 = -p.1,
        Some("y") => p.0 = -p.0,
        _ => {}
    }
    let r = coord::rotated(p, -rot_deg);
    (at.0 + r.0, at.1 + r.1)
}

// ---------------------------------------------------------------------------
// Labels and buses
// ---------------------------------------------------------------------------

static BUS_VECTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+)\.\.(\d+)\]").unwrap_or_else(|e| panic!("bus vector regex: {e}"))
});
static BUS_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^_~^$])\{(.+)\}").unwrap_or_else(|e| panic!("bus group regex: {e}"))
});

/// Text of a label (its first value).
#[must_use]
pub fn label_text(tree: &Tree, label: NodeId) -> String {
    tree.value_at(label, 0).map(Value::text).unwrap_or_default()
}

/// Connection shape of a label or sheet pin (`input`, `output`, …).
#[must_use]
pub fn label_shape(tree: &Tree, label: NodeId) -> Option<String> {
    if tree.class(label) == NodeClass::SheetPin {
        return tree.value_at(label, 1).map(Value::text);
    }
    tree.get_value(label, "shape").map(Value::text)
}

/// True when the label text denotes a bus.
#[must_use]
pub fn is_bus_label(text: &str) -> bool {
    BUS_VECTOR_RE.is_match(text) || BUS_GROUP_RE.is_match(text)
}

/// Expand a bus label into its members. Returns an empty list for plain
/// nets.
///
/// Vector buses `D[3..0]` enumerate `D3`, `D2`, …; group buses
/// `DATA{A B C}` enumerate members `A`, `B`, `C` with net names
/// `DATA.A`, …, (or the bare member when the group is unnamed).
#[must_use]
pub fn expand_bus(text: &str) -> Vec<BusMemberInput> {
    if let Some(caps) = BUS_VECTOR_RE.captures(text) {
        let (Some(whole), Some(from), Some(to)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            return Vec::new();
        };
        let prefix = &text[..whole.start()];
        let (Ok(from), Ok(to)) = (from.as_str().parse::<i64>(), to.as_str().parse::<i64>()) else {
            return Vec::new();
        };
        let indices: Vec<i64> = if from <= to {
            (from..=to).collect()
        } else {
            (to..=from).rev().collect()
        };
        return indices
            .into_iter()
            .map(|i| {
                let name = format!("{prefix}{i}");
                BusMemberInput {
                    member: name.clone(),
                    net: name,
                }
            })
            .collect();
    }
    if let Some(caps) = BUS_GROUP_RE.captures(text) {
        let Some(inner) = caps.get(1) else {
            return Vec::new();
        };
        let brace = text[..inner.start()].rfind('{').unwrap_or(0);
        let prefix = &text[..brace];
        return inner
            .as_str()
            .split_whitespace()
            .map(|member| BusMemberInput {
                member: member.to_owned(),
                net: if prefix.is_empty() {
                    member.to_owned()
                } else {
                    format!("{prefix}.{member}")
                },
            })
            .collect();
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// Variable fill
// ---------------------------------------------------------------------------

/// Classes that extend the variable scope with their identity as the walk
/// descends.
fn class_has_identity(class: NodeClass) -> bool {
    matches!(
        class,
        NodeClass::Wire
            | NodeClass::Bus
            | NodeClass::Junction
            | NodeClass::NoConnect
            | NodeClass::BusEntry
            | NodeClass::Label
            | NodeClass::GlobalLabel
            | NodeClass::HierLabel
            | NodeClass::SheetPin
            | NodeClass::Sheet
            | NodeClass::SymbolInst
            | NodeClass::PinInst
            | NodeClass::Text
            | NodeClass::TextBox
            | NodeClass::Polyline
            | NodeClass::Arc
            | NodeClass::Circle
            | NodeClass::Rectangle
            | NodeClass::Image
    )
}

/// Declare a page's variable bindings into `vars` at the given instance
/// scope.
pub fn fill_page_vars(
    tree: &mut Tree,
    vars: &mut Variables,
    scope: &str,
    fname: &str,
    is_root: bool,
    project: Option<&str>,
) {
    if is_root || root_path(tree, tree.root()).is_some() {
        let base = fname.rsplit('/').next().unwrap_or(fname);
        vars.define(scope, special::FILENAME, base);
        vars.define(scope, special::FILEPATH, fname);
        vars.define(scope, special::SHEETPATH, "/");
    }
    fillvars_walk(tree, tree.root(), vars, scope, project, scope, None);
}

#[allow(clippy::too_many_arguments)]
fn fillvars_walk(
    tree: &mut Tree,
    node: NodeId,
    vars: &mut Variables,
    scope: &str,
    project: Option<&str>,
    page_instance: &str,
    extra_scope: Option<&str>,
) {
    let children: Vec<NodeId> = tree.child_nodes(node).collect();
    for child in children {
        let class = tree.class(child);
        let child_scope = if class_has_identity(class) {
            format!("{scope}/{}", tree.ensure_identity(child))
        } else {
            scope.to_owned()
        };
        match class {
            NodeClass::Field => {
                let name = tree.value_at(child, 0).map(Value::text).unwrap_or_default();
                let value = tree.value_at(child, 1).map(Value::text).unwrap_or_default();
                if !name.is_empty() {
                    vars.define(scope, &name, value.clone());
                    if let Some(extra) = extra_scope {
                        vars.define(extra, &name, value);
                    }
                }
                fillvars_walk(tree, child, vars, &child_scope, project, page_instance, None);
            }
            NodeClass::TitleBlock => {
                fill_title_block_vars(tree, child, vars, &child_scope);
            }
            NodeClass::Sheet => {
                // Properties (Sheetname, Sheetfile) first, so the path
                // expansion below can see them.
                fillvars_walk(tree, child, vars, &child_scope, project, page_instance, None);
                let file = sheet_file(tree, child).unwrap_or_default();
                let base = file.rsplit('/').next().unwrap_or(&file).to_owned();
                vars.define(&child_scope, special::FILENAME, base);
                vars.define(&child_scope, special::FILEPATH, file);
                let path = vars.expand(&child_scope, "${SHEETPATH}${SHEETNAME}/");
                vars.define(&child_scope, special::SHEETPATH, path);
            }
            NodeClass::SymbolInst => {
                let refdes = symbol_refdes(tree, child, project, page_instance);
                fill_symbol_vars(tree, child, vars, &child_scope, &refdes, project, page_instance);
                fillvars_walk(
                    tree,
                    child,
                    vars,
                    &child_scope,
                    project,
                    page_instance,
                    Some(&refdes),
                );
            }
            NodeClass::Label | NodeClass::GlobalLabel | NodeClass::HierLabel
            | NodeClass::SheetPin => {
                if let Some(shape) = label_shape(tree, child) {
                    let pretty: Vec<String> = shape
                        .split('-')
                        .map(|s| {
                            let mut c = s.chars();
                            c.next().map_or_else(String::new, |f| {
                                f.to_uppercase().collect::<String>() + c.as_str()
                            })
                        })
                        .collect();
                    vars.define(&child_scope, special::CONNECTION_TYPE, pretty.join("-"));
                }
                vars.define(&child_scope, special::OP, "--");
                fillvars_walk(tree, child, vars, &child_scope, project, page_instance, None);
            }
            _ => {
                fillvars_walk(
                    tree,
                    child,
                    vars,
                    &child_scope,
                    project,
                    page_instance,
                    extra_scope,
                );
            }
        }
    }
}

/// Symbol-instance special variables, defined at both the symbol scope and
/// the reference scope (for `${ref:…}` lookups).
fn fill_symbol_vars(
    tree: &Tree,
    symbol: NodeId,
    vars: &mut Variables,
    scope: &str,
    refdes: &str,
    project: Option<&str>,
    page_instance: &str,
) {
    let unit = symbol_unit(tree, symbol, project, page_instance);
    let mut define = |name: &str, value: String| {
        vars.define(scope, name, value.clone());
        vars.define(refdes, name, value);
    };
    define("UNIT", unit_to_alpha(unit));
    define(special::OP, "--".to_owned());

    let flag = |tree: &Tree, name: &str, expect_yes: bool| {
        let v = tree.get_value(symbol, name).map(Value::text);
        match v.as_deref() {
            Some("yes") => expect_yes,
            Some("no") => !expect_yes,
            _ => false,
        }
    };
    define(
        "DNP",
        if flag(tree, "dnp", true) { "DNP" } else { "" }.to_owned(),
    );
    define(
        "EXCLUDE_FROM_BOARD",
        if flag(tree, "on_board", false) {
            "Excluded from board"
        } else {
            ""
        }
        .to_owned(),
    );
    define(
        "EXCLUDE_FROM_BOM",
        if flag(tree, "in_bom", false) {
            "Excluded from BOM"
        } else {
            ""
        }
        .to_owned(),
    );
    define(
        "EXCLUDE_FROM_SIM",
        if flag(tree, "exclude_from_sim", true) {
            "Excluded from simulation"
        } else {
            ""
        }
        .to_owned(),
    );

    if let Some(footprint) = field_value(tree, symbol, "Footprint") {
        let (lib, name) = footprint
            .split_once(':')
            .map_or((footprint.as_str(), ""), |(l, n)| (l, n));
        define("FOOTPRINT_LIBRARY", lib.to_owned());
        define("FOOTPRINT_NAME", name.to_owned());
    }
    if let Some(lib_id) = tree.get_value(symbol, "lib_id").map(Value::text) {
        let (lib, name) = lib_id
            .split_once(':')
            .map_or(("", lib_id.as_str()), |(l, n)| (l, n));
        define("SYMBOL_LIBRARY", lib.to_owned());
        define("SYMBOL_NAME", name.to_owned());
        // Description and keywords come from the library cache.
        let from_lib = tree
            .get_node(tree.root(), "lib_symbols")
            .and_then(|lib| sym::library_symbol(tree, lib, &lib_id));
        if let Some(def) = from_lib {
            define(
                "SYMBOL_DESCRIPTION",
                field_value(tree, def, "Description").unwrap_or_default(),
            );
            define(
                "SYMBOL_KEYWORDS",
                field_value(tree, def, "ki_keywords").unwrap_or_default(),
            );
        }
    }
}

/// Title-block variable defaults.
fn fill_title_block_vars(tree: &mut Tree, tb: NodeId, vars: &mut Variables, scope: &str) {
    let mut missing: BTreeSet<String> = ALL_WKS_VARS.iter().map(|s| (*s).to_owned()).collect();
    let entries: Vec<NodeId> = tree.child_nodes(tb).collect();
    for entry in entries {
        let Some(t) = tree.node_type(entry).map(ToString::to_string) else {
            continue;
        };
        let mut name = if t == "date" { "ISSUE_DATE".to_owned() } else { t };
        let values: Vec<String> = tree.values(entry).map(Value::text).collect();
        if values.len() > 1 {
            for v in &values[..values.len() - 1] {
                name.push_str(v);
            }
        }
        let name = name.to_uppercase();
        missing.remove(&name);
        vars.define(scope, &name, values.last().cloned().unwrap_or_default());
    }
    let page = tree.root();
    for name in missing {
        let text = match name.as_str() {
            "PAPER" => paper(tree, page),
            "KICAD_VERSION" => {
                let generator = tree
                    .get_value(page, "generator")
                    .map_or_else(|| "unknown".to_owned(), Value::text);
                let genver = tree.get_value(page, "generator_version").map_or_else(
                    || {
                        tree.get_value(page, "version")
                            .map_or_else(|| "version unknown".to_owned(), Value::text)
                    },
                    Value::text,
                );
                format!("{generator} {genver}")
            }
            _ => String::new(),
        };
        vars.define(scope, &name, text);
    }
    // The worksheet grammar references REVISION but pages define REV.
    if vars.resolve(scope, "REVISION").is_none() {
        vars.define(scope, "REVISION", "${REV}");
    }
}

// ---------------------------------------------------------------------------
// Netlist fill
// ---------------------------------------------------------------------------

fn node_pos_fixed(tree: &Tree, node: NodeId) -> (Fixed, Fixed) {
    tree.get_node(node, "at").map_or_else(
        || (Fixed::default(), Fixed::default()),
        |at| {
            let (x, y) = coord::pos_values(tree, at);
            (Fixed::from_value(&x), Fixed::from_value(&y))
        },
    )
}

fn wire_pts_fixed(tree: &Tree, wire: NodeId) -> Vec<(Fixed, Fixed)> {
    let Some(pts) = tree.get_node(wire, "pts") else {
        return Vec::new();
    };
    tree.children_of(pts, "xy")
        .iter()
        .map(|xy| {
            let (x, y) = coord::pos_values(tree, *xy);
            (Fixed::from_value(&x), Fixed::from_value(&y))
        })
        .collect()
}

fn fixed_from_f64(v: f64) -> Fixed {
    Fixed::from_value(&Value::Decimal(
        crate::sexp::Decimal::new(&format!("{v:.6}")).unwrap_or_else(|| {
            crate::sexp::Decimal::new("0").unwrap_or_else(|| unreachable!("zero is numeric"))
        }),
    ))
}

/// Register one page instance's connectivity with the netlister.
///
/// `instance` is the page's instance path; `prefix` the human sheet path
/// used for local net names. Call once per `(page, instance)` pair, then
/// [`Netlister::resolve`] once every page is in.
pub fn fill_page_netlist(
    tree: &mut Tree,
    netlister: &mut Netlister,
    instance: &str,
    prefix: &str,
    project: Option<&str>,
) {
    netlister.set_prefix(prefix);
    let page = tree.root();

    for group in ["wire", "bus"] {
        for wire in tree.children_of(page, group).to_vec() {
            netlister.add_wire(&WireInput {
                instance: instance.to_owned(),
                pts: wire_pts_fixed(tree, wire),
                bus: group == "bus",
            });
        }
    }

    for group in ["label", "global_label", "hierarchical_label"] {
        for label in tree.children_of(page, group).to_vec() {
            let text = label_text(tree, label);
            let scope = format!("{instance}/{}", tree.ensure_identity(label));
            netlister.add_label(&LabelInput {
                instance: instance.to_owned(),
                scope: Some(scope),
                pos: node_pos_fixed(tree, label),
                text: text.clone(),
                global: group == "global_label",
                members: expand_bus(&text),
            });
        }
    }

    for junction in tree.children_of(page, "junction").to_vec() {
        netlister.add_junction(&PointInput {
            instance: instance.to_owned(),
            pos: node_pos_fixed(tree, junction),
        });
    }
    for nc in tree.children_of(page, "no_connect").to_vec() {
        netlister.add_nc(&PointInput {
            instance: instance.to_owned(),
            pos: node_pos_fixed(tree, nc),
        });
    }
    for entry in tree.children_of(page, "bus_entry").to_vec() {
        let (x, y) = node_pos_fixed(tree, entry);
        let size = tree.get_node(entry, "size").map_or((0.0, 0.0), |s| coord::pos_f64(tree, s));
        let pos = tree
            .get_node(entry, "at")
            .map_or((0.0, 0.0), |at| coord::pos_f64(tree, at));
        let far = (
            fixed_from_f64(pos.0 + size.0),
            fixed_from_f64(pos.1 + size.1),
        );
        netlister.add_busentry(instance, &[(x, y), far]);
    }

    for sheet in tree.children_of(page, "sheet").to_vec() {
        let sheet_uuid = tree.ensure_identity(sheet);
        for pin in tree.children_of(sheet, "pin").to_vec() {
            if tree.class(pin) != NodeClass::SheetPin {
                continue;
            }
            let name = label_text(tree, pin);
            netlister.add_sheetpin(&SheetPinInput {
                instance: instance.to_owned(),
                subsheet_key: format!("{instance}/{sheet_uuid}"),
                pos: node_pos_fixed(tree, pin),
                name: name.clone(),
                members: expand_bus(&name),
            });
        }
    }

    for symbol in tree.children_of(page, "symbol").to_vec() {
        if tree.class(symbol) != NodeClass::SymbolInst {
            continue;
        }
        fill_symbol_netlist(tree, netlister, symbol, instance, project);
    }
}

fn fill_symbol_netlist(
    tree: &mut Tree,
    netlister: &mut Netlister,
    symbol: NodeId,
    instance: &str,
    project: Option<&str>,
) {
    let Some(lib) = tree.get_node(tree.root(), "lib_symbols") else {
        return;
    };
    let Some(lib_id) = tree.get_value(symbol, "lib_id").map(Value::text) else {
        return;
    };
    let Some(def) = sym::library_symbol(tree, lib, &lib_id) else {
        return;
    };
    let def = sym::resolve_extends(tree, lib, def);
    let unit = symbol_unit(tree, symbol, project, instance);
    let variant = tree
        .get_value(symbol, "convert")
        .and_then(Value::as_int)
        .unwrap_or(1);
    let refdes = symbol_refdes(tree, symbol, project, instance);
    let show_unit = sym::show_unit(tree, def);
    let alternates = symbol_alternates(tree, symbol);
    let at = tree
        .get_node(symbol, "at")
        .map_or((0.0, 0.0), |at| coord::pos_f64(tree, at));
    let (rot, mirror) = symbol_rot_mirror(tree, symbol);

    for body in sym::bodies_for(tree, def, unit, variant) {
        for pin in sym::body_pins(tree, body) {
            let number = tree
                .get_value(pin, "number")
                .map(Value::text)
                .unwrap_or_default();
            let alt = alternates.get(&number).map(String::as_str);
            let (name, number) = sym::pin_name_num(tree, pin, alt);
            let (ptype, _) = sym::pin_type_style(tree, pin, alt);
            let hidden = sym::pin_hidden(tree, pin);
            let power = hidden && ptype == "power_in";
            let no_connect = ptype == "no_connect";
            let mut refdes = refdes.clone();
            if show_unit && !name.is_empty() && name != "~" {
                refdes.push_str(&unit_to_alpha(unit));
            }
            let page_pos = transform_pin(at, rot, mirror.as_deref(), sym::pin_pos(tree, pin));
            netlister.add_sympin(&SymPinInput {
                instance: instance.to_owned(),
                refdes_scope: Some(refdes.clone()),
                pos: (fixed_from_f64(page_pos.0), fixed_from_f64(page_pos.1)),
                refdes,
                name,
                number,
                power,
                no_connect,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Component and net queries
// ---------------------------------------------------------------------------

/// Marker key carrying a component's local identity in its property map.
pub const COMPONENT_UUID_KEY: &str = "\u{1}";

/// Per-page component table: refdes → property maps (one per matching
/// symbol), with variables expanded at the symbol's scope.
#[must_use]
pub fn page_components(
    tree: &mut Tree,
    vars: &Variables,
    instance: &str,
    project: Option<&str>,
) -> BTreeMap<String, Vec<BTreeMap<String, String>>> {
    let mut out: BTreeMap<String, Vec<BTreeMap<String, String>>> = BTreeMap::new();
    for symbol in tree.children_of(tree.root(), "symbol").to_vec() {
        if tree.class(symbol) != NodeClass::SymbolInst {
            continue;
        }
        let refdes = symbol_refdes(tree, symbol, project, instance);
        if refdes.starts_with('#') {
            continue;
        }
        let scope = format!("{instance}/{}", tree.ensure_identity(symbol));
        let mut props: BTreeMap<String, String> = BTreeMap::new();
        props.insert(COMPONENT_UUID_KEY.to_owned(), tree.ensure_identity(symbol));
        for prop in tree.children_of(symbol, "property").to_vec() {
            let name = tree.value_at(prop, 0).map(Value::text).unwrap_or_default();
            if name.is_empty() || name.to_lowercase().starts_with("sim.") {
                continue;
            }
            let value = tree.value_at(prop, 1).map(Value::text).unwrap_or_default();
            let value = vars.expand(&scope, &value);
            if value.is_empty() || value == "~" {
                continue;
            }
            props.insert(name, value);
        }
        out.entry(refdes).or_default().push(props);
    }
    out
}

/// Local net names declared on a page (label texts of all three kinds).
#[must_use]
pub fn page_nets(tree: &Tree) -> BTreeSet<String> {
    let mut nets = BTreeSet::new();
    for group in ["global_label", "hierarchical_label", "label"] {
        for label in tree.children_of(tree.root(), group) {
            nets.insert(label_text(tree, *label));
        }
    }
    nets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
