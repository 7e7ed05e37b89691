//! Worksheet (page border) accessors.
//!
//! Worksheets describe the frame, title block text, and repeatable border
//! items of every page. Geometry resolves against the paper rectangle with
//! gravity-anchored coordinates; rendering itself is a collaborator's job;
//! this module supplies the typed accessors it consumes.
//!
//! Legacy `page_layout` files upgrade by token substitution before parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SchemError;
use crate::sexp::{NodeId, Tree, Value, parse};
use crate::vars::Variables;

use super::coord::{self, Gravity};

/// Variables every worksheet may reference; pages must define them all
/// (empty when absent).
pub const ALL_WKS_VARS: &[&str] = &[
    "TITLE",
    "ISSUE_DATE",
    "REV",
    "COMPANY",
    "LAYER",
    "PAPER",
    "KICAD_VERSION",
    "COMMENT0",
    "COMMENT1",
    "COMMENT2",
    "COMMENT3",
    "COMMENT4",
    "COMMENT5",
    "COMMENT6",
    "COMMENT7",
    "COMMENT8",
    "COMMENT9",
];

/// The built-in empty worksheet.
pub const DEFAULT_WORKSHEET: &str = "(kicad_wks)";

/// Ancient-rune → variable-reference upgrades for legacy `page_layout`
/// files, applied textually before parsing.
const UPGRADE_TOKENS: &[(&str, &str)] = &[
    ("%%", "%"),
    ("%C0", "${COMMENT1}"),
    ("%C1", "${COMMENT2}"),
    ("%C2", "${COMMENT3}"),
    ("%C3", "${COMMENT4}"),
    ("%C4", "${COMMENT5}"),
    ("%C5", "${COMMENT6}"),
    ("%C6", "${COMMENT7}"),
    ("%C7", "${COMMENT8}"),
    ("%C8", "${COMMENT9}"),
    ("%D", "${ISSUE_DATE}"),
    ("%F", "${FILENAME}"),
    ("%K", "${KICAD_VERSION}"),
    ("%L", "${LAYER}"),
    ("%N", "${##}"),
    ("%P", "${SHEETPATH}"),
    ("%R", "${REVISION}"),
    ("%S", "${#}"),
    ("%T", "${TITLE}"),
    ("%Y", "${COMPANY}"),
    ("%Z", "${PAPER}"),
    ("page_layout", "kicad_wks"),
];

static UPGRADE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = UPGRADE_TOKENS
        .iter()
        .map(|(from, _)| regex::escape(from))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).unwrap_or_else(|e| panic!("worksheet upgrade regex: {e}"))
});

/// Rewrite legacy tokens into modern variable references.
#[must_use]
pub fn upgrade_legacy(source: &str) -> String {
    UPGRADE_RE
        .replace_all(source, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            UPGRADE_TOKENS
                .iter()
                .find(|(from, _)| *from == token)
                .map_or_else(|| token.to_owned(), |(_, to)| (*to).to_owned())
        })
        .into_owned()
}

/// Parse a worksheet, upgrading the legacy format when detected. `None`
/// input yields the built-in default.
///
/// # Errors
///
/// Propagates parse errors from malformed worksheet sources.
pub fn load_worksheet(source: Option<&str>) -> Result<Tree, SchemError> {
    let Some(source) = source else {
        return Ok(parse(DEFAULT_WORKSHEET)?);
    };
    let tree = parse(source)?;
    if tree.node_type(tree.root()).is_some_and(|t| t == "page_layout") {
        return Ok(parse(&upgrade_legacy(source))?);
    }
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Paper geometry
// ---------------------------------------------------------------------------

fn inches_to_mm(w: f64, h: f64) -> (f64, f64) {
    (w * 25.4, h * 25.4)
}

/// Landscape dimensions of a named paper size, in millimetres.
#[must_use]
pub fn paper_size(name: &str) -> Option<(f64, f64)> {
    Some(match name {
        "A0" => (1189.0, 841.0),
        "A1" => (841.0, 594.0),
        "A2" => (594.0, 420.0),
        "A3" => (420.0, 297.0),
        "A4" => (297.0, 210.0),
        "A5" => (210.0, 148.0),
        "A" => inches_to_mm(11.0, 8.5),
        "B" => inches_to_mm(17.0, 11.0),
        "C" => inches_to_mm(22.0, 17.0),
        "D" => inches_to_mm(34.0, 22.0),
        "E" => inches_to_mm(44.0, 34.0),
        "USLedger" => inches_to_mm(17.0, 11.0),
        "USLegal" => inches_to_mm(14.0, 8.5),
        "USLetter" => inches_to_mm(11.0, 8.5),
        _ => return None,
    })
}

/// Dimensions of a page's `paper` declaration, honoring `User w h` sizes
/// and the `portrait` flip. Unknown names fall back to A4.
#[must_use]
pub fn page_paper_size(tree: &Tree, page: NodeId) -> (f64, f64) {
    let Some(paper) = tree.get_node(page, "paper") else {
        return paper_size("A4").unwrap_or((297.0, 210.0));
    };
    let values: Vec<Value> = tree.values(paper).cloned().collect();
    let name = values.first().map(Value::text).unwrap_or_default();
    if name == "User" && values.len() == 3 {
        let w = values[1].as_f64().unwrap_or(297.0);
        let h = values[2].as_f64().unwrap_or(210.0);
        return (w, h);
    }
    let mut size = paper_size(&name).unwrap_or((297.0, 210.0));
    if values.iter().any(|v| v.as_atom().is_some_and(|a| a == "portrait")) {
        size = (size.1, size.0);
    }
    size
}

// ---------------------------------------------------------------------------
// Setup accessors
// ---------------------------------------------------------------------------

/// The worksheet's `setup` node, when present.
#[must_use]
pub fn setup_node(tree: &Tree, wks: NodeId) -> Option<NodeId> {
    tree.get_node(wks, "setup")
}

fn setup_f64(tree: &Tree, setup: Option<NodeId>, name: &str, default: f64) -> f64 {
    setup
        .and_then(|s| tree.get_value(s, name))
        .and_then(Value::as_f64)
        .unwrap_or(default)
}

/// The drawable page rectangle `[left, top, right, bottom]`: paper minus
/// margins.
#[must_use]
pub fn page_corners(tree: &Tree, setup: Option<NodeId>, paper: (f64, f64)) -> [f64; 4] {
    [
        setup_f64(tree, setup, "left_margin", 0.0),
        setup_f64(tree, setup, "top_margin", 0.0),
        paper.0 - setup_f64(tree, setup, "right_margin", 0.0),
        paper.1 - setup_f64(tree, setup, "bottom_margin", 0.0),
    ]
}

/// Whether the current context renders as page one: an explicit page-number
/// variable wins, else root pages count as page one.
#[must_use]
pub fn is_page_one(vars: &Variables, scope: &str, page_is_root: bool) -> bool {
    match vars
        .resolve(scope, crate::vars::special::PAGENO)
        .and_then(|v| v.parse::<i64>().ok())
    {
        Some(pn) if pn != 0 => pn == 1,
        _ => page_is_root,
    }
}

/// Default text size of worksheet items.
#[must_use]
pub fn text_size(tree: &Tree, setup: Option<NodeId>) -> f64 {
    setup_f64(tree, setup, "textsize", 1.0)
}

/// Line width of worksheet strokes.
#[must_use]
pub fn line_width(tree: &Tree, setup: Option<NodeId>) -> f64 {
    setup_f64(tree, setup, "linewidth", 0.0)
}

/// Line width of worksheet text strokes.
#[must_use]
pub fn text_line_width(tree: &Tree, setup: Option<NodeId>) -> f64 {
    setup_f64(tree, setup, "textlinewidth", 0.0)
}

// ---------------------------------------------------------------------------
// Repeatable items
// ---------------------------------------------------------------------------

/// Page restriction of a repeatable worksheet item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOption {
    All,
    PageOneOnly,
    NotOnPageOne,
}

/// Repeat/increment parameters of a border item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepeatSpec {
    pub option: PageOption,
    pub repeat: i64,
    pub incrx: f64,
    pub incry: f64,
    pub incrlabel: i64,
}

/// Read the repeat specification of a worksheet item.
#[must_use]
pub fn repeat_spec(tree: &Tree, item: NodeId) -> RepeatSpec {
    let option = match tree.get_value(item, "option").map(Value::text).as_deref() {
        Some("page1only") => PageOption::PageOneOnly,
        Some("notonpage1") => PageOption::NotOnPageOne,
        _ => PageOption::All,
    };
    RepeatSpec {
        option,
        repeat: tree
            .get_value(item, "repeat")
            .and_then(Value::as_int)
            .unwrap_or(1),
        incrx: tree
            .get_value(item, "incrx")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        incry: tree
            .get_value(item, "incry")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        incrlabel: tree
            .get_value(item, "incrlabel")
            .and_then(Value::as_int)
            .unwrap_or(1),
    }
}

/// Whether an item renders on the given page, per its option.
#[must_use]
pub fn renders_on_page(spec: &RepeatSpec, is_page_one: bool) -> bool {
    match spec.option {
        PageOption::All => true,
        PageOption::PageOneOnly => is_page_one,
        PageOption::NotOnPageOne => !is_page_one,
    }
}

/// Resolve an item's anchored position against the page rectangle, using
/// the worksheet's bottom-right default gravity.
#[must_use]
pub fn item_pos(tree: &Tree, item: NodeId, which: &str, rel: [f64; 4]) -> Option<(f64, f64)> {
    let node = tree.get_node(item, which)?;
    let pos = coord::pos_f64(tree, node);
    let gravity = coord::gravity(tree, node, Gravity::right_bottom());
    Some(gravity.resolve_pos(rel, pos))
}

/// Advance a position by the repeat increment under the item's gravity.
#[must_use]
pub fn advance(
    tree: &Tree,
    item: NodeId,
    which: &str,
    pos: (f64, f64),
    spec: &RepeatSpec,
) -> (f64, f64) {
    let gravity = tree
        .get_node(item, which)
        .map_or(Gravity::right_bottom(), |n| {
            coord::gravity(tree, n, Gravity::right_bottom())
        });
    let vec = gravity.resolve_vect((spec.incrx, spec.incry));
    (pos.0 + vec.0, pos.1 + vec.1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::parse;

    #[test]
    fn upgrade_rewrites_legacy_tokens() {
        let src = "(page_layout (tbtext \"%T rev %R page %S/%N\" (pos 10 10)))";
        let upgraded = upgrade_legacy(src);
        assert!(upgraded.starts_with("(kicad_wks"));
        assert!(upgraded.contains("${TITLE} rev ${REVISION} page ${#}/${##}"));
    }

    #[test]
    fn upgrade_handles_comments_and_escapes() {
        assert_eq!(upgrade_legacy("%C0 %C8 %%"), "${COMMENT1} ${COMMENT9} %");
    }

    #[test]
    fn load_modern_worksheet_untouched() {
        let t = load_worksheet(Some("(kicad_wks (setup (textsize 1.5 1.5)))")).expect("load");
        assert!(t.node_type(t.root()).is_some_and(|a| a == "kicad_wks"));
    }

    #[test]
    fn load_legacy_worksheet_upgrades() {
        let t = load_worksheet(Some("(page_layout (tbtext \"%T\" (pos 1 1)))")).expect("load");
        assert!(t.node_type(t.root()).is_some_and(|a| a == "kicad_wks"));
    }

    #[test]
    fn load_default_when_missing() {
        let t = load_worksheet(None).expect("load");
        assert!(t.node_type(t.root()).is_some_and(|a| a == "kicad_wks"));
    }

    #[test]
    fn paper_sizes() {
        assert_eq!(paper_size("A4"), Some((297.0, 210.0)));
        assert_eq!(paper_size("USLetter"), Some((279.4, 215.9)));
        assert_eq!(paper_size("bogus"), None);
    }

    #[test]
    fn page_paper_with_portrait_and_user() {
        let t = parse("(kicad_sch (paper \"A4\" portrait))").expect("parse");
        assert_eq!(page_paper_size(&t, t.root()), (210.0, 297.0));
        let u = parse("(kicad_sch (paper \"User\" 400 300))").expect("parse");
        assert_eq!(page_paper_size(&u, u.root()), (400.0, 300.0));
        let d = parse("(kicad_sch)").expect("parse");
        assert_eq!(page_paper_size(&d, d.root()), (297.0, 210.0));
    }

    #[test]
    fn corners_subtract_margins() {
        let t = parse(
            "(kicad_wks (setup (left_margin 10) (top_margin 5) (right_margin 10) (bottom_margin 5)))",
        )
        .expect("parse");
        let setup = setup_node(&t, t.root());
        assert_eq!(
            page_corners(&t, setup, (297.0, 210.0)),
            [10.0, 5.0, 287.0, 205.0]
        );
    }

    #[test]
    fn corners_without_setup() {
        let t = parse("(kicad_wks)").expect("parse");
        assert_eq!(
            page_corners(&t, setup_node(&t, t.root()), (297.0, 210.0)),
            [0.0, 0.0, 297.0, 210.0]
        );
    }

    #[test]
    fn page_one_detection() {
        let mut vars = Variables::new();
        assert!(is_page_one(&vars, "/x", true));
        assert!(!is_page_one(&vars, "/x", false));
        vars.define("/x", crate::vars::special::PAGENO, "1");
        assert!(is_page_one(&vars, "/x", false));
        vars.define("/y", crate::vars::special::PAGENO, "3");
        assert!(!is_page_one(&vars, "/y", true));
    }

    #[test]
    fn repeat_spec_defaults_and_options() {
        let t = parse("(line (start 0 0) (end 1 0))").expect("parse");
        let spec = repeat_spec(&t, t.root());
        assert_eq!(spec.repeat, 1);
        assert_eq!(spec.option, PageOption::All);
        assert!(renders_on_page(&spec, true));

        let t = parse("(tbtext \"x\" (pos 1 1) (option page1only) (repeat 5) (incrx 2) (incrlabel 10))")
            .expect("parse");
        let spec = repeat_spec(&t, t.root());
        assert_eq!(spec.repeat, 5);
        assert_eq!(spec.incrx, 2.0);
        assert_eq!(spec.incrlabel, 10);
        assert!(renders_on_page(&spec, true));
        assert!(!renders_on_page(&spec, false));
    }

    #[test]
    fn item_positions_anchor_bottom_right_by_default() {
        let t = parse("(tbtext \"x\" (pos 10 5))").expect("parse");
        let rel = [0.0, 0.0, 297.0, 210.0];
        assert_eq!(item_pos(&t, t.root(), "pos", rel), Some((287.0, 205.0)));
    }

    #[test]
    fn advance_respects_gravity_flip() {
        let t = parse("(tbtext \"x\" (pos 10 5) (incrx 2) (incry 3))").expect("parse");
        let spec = repeat_spec(&t, t.root());
        // Bottom-right gravity: increments move up-left in page space.
        assert_eq!(advance(&t, t.root(), "pos", (100.0, 100.0), &spec), (98.0, 97.0));
    }
}
