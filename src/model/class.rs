//! Semantic class registry.
//!
//! Maps a node's leading atom to its semantic class, exactly once, at parse
//! time. Overloaded atoms (`pin`, `symbol`) go through disambiguators that
//! inspect the child shape. The registry also enumerates which atoms the
//! crate handles (promotion) and which it uses (typed accessors), so the
//! dictionary self-test in [`crate::keywords`] can report grammar atoms that
//! no code consumes.

use crate::sexp::{Child, Tree, Value};

// ---------------------------------------------------------------------------
// NodeClass
// ---------------------------------------------------------------------------

/// Semantic overlay chosen for a node at promotion time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeClass {
    /// No special semantics (unrecognized or untyped node).
    Generic,
    /// Position/offset node (`at`, `xy`, `start`, …).
    Coord,
    /// File format version.
    Version,
    /// Font/justification effects.
    Effects,
    /// Stroke definition.
    Stroke,
    /// Fill definition.
    Fill,
    Polyline,
    Arc,
    Circle,
    Rectangle,
    Text,
    TextBox,
    /// Property/field (`property` nodes on symbols, sheets, labels).
    Field,
    Image,
    TitleBlock,
    Junction,
    NoConnect,
    Wire,
    Bus,
    BusEntry,
    /// Local label.
    Label,
    GlobalLabel,
    HierLabel,
    /// A labeled connection point on a sheet symbol.
    SheetPin,
    /// Pin inside a symbol body definition.
    PinDef,
    /// Pin reference inside a placed symbol instance.
    PinInst,
    /// Placed symbol on a page.
    SymbolInst,
    /// Library symbol entity (has properties).
    SymbolDef,
    /// Unit/variant body inside a symbol definition.
    SymbolBody,
    /// Symbol library file or embedded `lib_symbols` cache.
    SymbolLib,
    /// Sub-sheet reference on a page.
    Sheet,
    /// Instance bookkeeping (`instances`).
    Instances,
    /// Instance path entry (`path`).
    InstancePath,
    /// Schematic page root.
    SchematicPage,
    /// Worksheet (page border) root.
    Worksheet,
    WksSetup,
    WksLine,
    WksRect,
    WksText,
    WksBitmap,
}

// ---------------------------------------------------------------------------
// Promotion
// ---------------------------------------------------------------------------

/// Choose the semantic class for a node under construction.
///
/// Called exactly once per node by the parser (and when grafting detached
/// subtrees from another arena the recorded class is carried instead).
#[must_use]
pub fn promote(tree: &Tree, children: &[Child]) -> NodeClass {
    let Some(Child::Value(Value::Atom(head))) = children.first() else {
        return NodeClass::Generic;
    };
    match head.as_str() {
        "at" | "center" | "end" | "mid" | "offset" | "pos" | "start" | "xy" => NodeClass::Coord,
        "version" => NodeClass::Version,
        "effects" => NodeClass::Effects,
        "stroke" | "default" => NodeClass::Stroke,
        "fill" => NodeClass::Fill,
        "polyline" => NodeClass::Polyline,
        "arc" => NodeClass::Arc,
        "circle" => NodeClass::Circle,
        "rectangle" => NodeClass::Rectangle,
        "text" => NodeClass::Text,
        "text_box" => NodeClass::TextBox,
        "property" => NodeClass::Field,
        "image" => NodeClass::Image,
        "title_block" => NodeClass::TitleBlock,
        "junction" => NodeClass::Junction,
        "no_connect" => NodeClass::NoConnect,
        "wire" => NodeClass::Wire,
        "bus" => NodeClass::Bus,
        "bus_entry" => NodeClass::BusEntry,
        "label" => NodeClass::Label,
        "global_label" => NodeClass::GlobalLabel,
        "hierarchical_label" => NodeClass::HierLabel,
        "sheet" => NodeClass::Sheet,
        "instances" => NodeClass::Instances,
        "path" => NodeClass::InstancePath,
        "kicad_sch" => NodeClass::SchematicPage,
        "kicad_symbol_lib" | "lib_symbols" => NodeClass::SymbolLib,
        "kicad_wks" => NodeClass::Worksheet,
        "setup" => NodeClass::WksSetup,
        "line" => NodeClass::WksLine,
        "rect" => NodeClass::WksRect,
        "tbtext" => NodeClass::WksText,
        "bitmap" => NodeClass::WksBitmap,
        "pin" => disambiguate_pin(children),
        "symbol" => disambiguate_symbol(tree, children),
        _ => NodeClass::Generic,
    }
}

/// The `pin` atom has three uses, disambiguated in order:
/// 1. a pin definition, whose first datum is an atom (electrical type);
/// 2. a sheet pin, whose second datum is an atom (direction);
/// 3. a pin instance.
fn disambiguate_pin(children: &[Child]) -> NodeClass {
    if matches!(children.get(1), Some(Child::Value(Value::Atom(_)))) {
        return NodeClass::PinDef;
    }
    if matches!(children.get(2), Some(Child::Value(Value::Atom(_)))) {
        return NodeClass::SheetPin;
    }
    NodeClass::PinInst
}

/// The `symbol` atom has three uses, disambiguated in order:
/// 1. a symbol instance, which carries a library reference (`lib_id`);
/// 2. a symbol definition, which carries properties (`property`);
/// 3. a symbol body.
///
/// Ordering of sub-expressions is not assumed, so the whole child list is
/// searched for `lib_id` before `property` is considered.
fn disambiguate_symbol(tree: &Tree, children: &[Child]) -> NodeClass {
    let has = |name: &str| {
        children.iter().any(|c| {
            c.as_node()
                .is_some_and(|id| tree.node_type(id).is_some_and(|t| t == name))
        })
    };
    if has("lib_id") {
        NodeClass::SymbolInst
    } else if has("property") {
        NodeClass::SymbolDef
    } else {
        NodeClass::SymbolBody
    }
}

// ---------------------------------------------------------------------------
// Consumption bookkeeping for the dictionary self-test
// ---------------------------------------------------------------------------

/// Grammar scope a dictionary file describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Schematic pages (includes the symbol and worksheet grammars).
    Schematic,
    /// Symbol libraries.
    Symbol,
    /// Worksheet / page-border files.
    Worksheet,
}

const SCH: u8 = 1;
const SYM: u8 = 2;
const WKS: u8 = 4;
const ALL: u8 = SCH | SYM | WKS;

impl Scope {
    fn mask(self) -> u8 {
        match self {
            // The schematic grammar embeds symbols and instantiates the
            // worksheet, so its scope covers both.
            Self::Schematic => ALL,
            Self::Symbol => SYM,
            Self::Worksheet => WKS,
        }
    }
}

/// Atoms the registry promotes to a class, with the scopes they occur in.
const HANDLED_ATOMS: &[(&str, u8)] = &[
    ("at", SCH | SYM),
    ("bitmap", WKS),
    ("bus", SCH),
    ("bus_entry", SCH),
    ("center", SCH | SYM),
    ("circle", SCH | SYM),
    ("default", WKS),
    ("effects", ALL),
    ("end", SCH | SYM),
    ("fill", SCH | SYM),
    ("global_label", SCH),
    ("hierarchical_label", SCH),
    ("image", SCH),
    ("instances", SCH),
    ("junction", SCH),
    ("kicad_sch", SCH),
    ("kicad_symbol_lib", SYM),
    ("kicad_wks", WKS),
    ("label", SCH),
    ("lib_symbols", SCH),
    ("line", WKS),
    ("mid", SCH | SYM),
    ("no_connect", SCH),
    ("offset", SCH | SYM),
    ("path", SCH),
    ("pin", SCH | SYM),
    ("polyline", SCH | SYM),
    ("pos", WKS),
    ("property", SCH | SYM),
    ("rect", WKS),
    ("rectangle", SCH | SYM),
    ("setup", WKS),
    ("sheet", SCH),
    ("start", SCH | SYM),
    ("stroke", SCH | SYM),
    ("symbol", SCH | SYM),
    ("tbtext", WKS),
    ("text", SCH | SYM),
    ("text_box", SCH | SYM),
    ("title_block", SCH),
    ("version", ALL),
    ("wire", SCH),
    ("xy", SCH | SYM),
];

/// Atoms consumed by typed accessors without owning a class.
const USED_ATOMS: &[(&str, u8)] = &[
    ("alternate", SCH | SYM),
    ("background", SCH | SYM),
    ("bidirectional", SCH),
    ("bold", ALL),
    ("bottom", ALL),
    ("bottom_margin", WKS),
    ("clock", SCH | SYM),
    ("clock_low", SCH | SYM),
    ("color", SCH | SYM | WKS),
    ("comment", SCH | WKS),
    ("company", SCH | WKS),
    ("convert", SCH),
    ("data", SCH | WKS),
    ("date", SCH),
    ("diameter", SCH),
    ("dnp", SCH),
    ("edge_clock_high", SCH | SYM),
    ("exclude_from_sim", SCH | SYM),
    ("extends", SCH | SYM),
    ("font", ALL),
    ("generator", ALL),
    ("generator_version", ALL),
    ("hide", SCH | SYM | WKS),
    ("href", SCH),
    ("in_bom", SCH),
    ("incrlabel", WKS),
    ("incrx", WKS),
    ("incry", WKS),
    ("input", SCH),
    ("input_low", SCH | SYM),
    ("inverted", SCH | SYM),
    ("italic", ALL),
    ("justify", ALL),
    ("lbcorner", WKS),
    ("left", ALL),
    ("left_margin", WKS),
    ("length", SCH | SYM),
    ("lib_id", SCH),
    ("linewidth", WKS),
    ("ltcorner", WKS),
    ("margins", SCH),
    ("middle", WKS),
    ("mirror", SCH),
    ("name", SCH | SYM | WKS),
    ("non_logic", SCH | SYM),
    ("notonpage1", WKS),
    ("number", SCH | SYM),
    ("on_board", SCH),
    ("option", WKS),
    ("output", SCH),
    ("output_low", SCH | SYM),
    ("page", SCH),
    ("page1only", WKS),
    ("page_layout", WKS),
    ("paper", SCH | WKS),
    ("passive", SCH),
    ("pin_names", SCH | SYM),
    ("pin_numbers", SCH | SYM),
    ("portrait", WKS),
    ("project", SCH),
    ("pts", SCH | SYM),
    ("radius", SCH | SYM),
    ("rbcorner", WKS),
    ("reference", SCH),
    ("repeat", WKS),
    ("rev", SCH | WKS),
    ("right", ALL),
    ("right_margin", WKS),
    ("rotate", WKS),
    ("rtcorner", WKS),
    ("scale", SCH | WKS),
    ("shape", SCH),
    ("sheet_instances", SCH),
    ("show_name", SCH),
    ("size", ALL),
    ("textlinewidth", WKS),
    ("textsize", WKS),
    ("title", SCH | WKS),
    ("top", ALL),
    ("top_margin", WKS),
    ("tri_state", SCH),
    ("type", SCH | SYM),
    ("unit", SCH),
    ("uuid", SCH | SYM),
    ("width", SCH | SYM),
];

/// True when the atom is consumed (handled or used) in the given scope.
#[must_use]
pub fn is_consumed(atom: &str, scope: Scope) -> bool {
    let mask = scope.mask();
    let hit = |table: &[(&str, u8)]| {
        table
            .binary_search_by(|(name, _)| (*name).cmp(atom))
            .is_ok_and(|i| table[i].1 & mask != 0)
    };
    hit(HANDLED_ATOMS) || hit(USED_ATOMS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
