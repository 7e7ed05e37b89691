//! Rendering interface consumed by drawing collaborators.
//!
//! The core does not rasterize anything. It exposes a staged traversal:
//! a collaborator implements [`Canvas`], asks for a stage bitmask, and the
//! tree walks itself in stage order handing over drawing primitives with
//! their diff tags. Geometry beyond the typed accessors (text metrics,
//! label outlines, symbol transforms) is the collaborator's business.

use crate::diff::{DiffKey, DiffSet, TargetIndex};
use crate::model::class::NodeClass;
use crate::model::coord;
use crate::model::schematic::label_text;
use crate::sexp::{NodeId, Tree, Value};
use crate::vars::Variables;

// ---------------------------------------------------------------------------
// DrawStage
// ---------------------------------------------------------------------------

/// Bit-OR'd draw stage mask. Stages render in ascending bit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawStage(u16);

impl DrawStage {
    pub const WORKSHEET: Self = Self(1);
    pub const WORKSHEET_PAGE: Self = Self(1 << 1);
    pub const IMAGE: Self = Self(1 << 2);
    pub const BACKGROUND: Self = Self(1 << 3);
    pub const SYMBOL_BACKGROUND: Self = Self(1 << 4);
    pub const PINS: Self = Self(1 << 5);
    pub const TEXT_PAGE: Self = Self(1 << 6);
    pub const PROPS_PAGE: Self = Self(1 << 7);
    pub const FG_PAGE: Self = Self(1 << 8);
    pub const TEXT: Self = Self(1 << 9);
    pub const PROPS: Self = Self(1 << 10);
    pub const FOREGROUND: Self = Self(1 << 11);
    /// Number of defined stages.
    pub const COUNT: u16 = 12;
    /// Every stage.
    pub const ALL: Self = Self((1 << Self::COUNT) - 1);

    /// True when every bit of `other` is set.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Iterate the selected stages in render order.
    pub fn sequence(self) -> impl Iterator<Item = Self> {
        (0..Self::COUNT)
            .map(|i| Self(1 << i))
            .filter(move |s| self.contains(*s))
    }
}

impl std::ops::BitOr for DrawStage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// Style hints attached to every primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paint {
    /// Theme color slot (`wire`, `bus`, `notes`, `device`, …).
    pub color: String,
    /// Fill slot, when the shape is filled.
    pub fill: Option<String>,
    /// Diff class tags for elements this primitive participates in.
    pub diff_tags: Vec<String>,
}

/// Drawing primitives a rendering collaborator receives.
pub trait Canvas {
    fn polyline(&mut self, xys: &[(f64, f64)], paint: &Paint);
    fn rect(&mut self, pos: (f64, f64), end: (f64, f64), paint: &Paint);
    fn circle(&mut self, center: (f64, f64), radius: f64, paint: &Paint);
    fn arc(&mut self, start: (f64, f64), mid: (f64, f64), end: (f64, f64), paint: &Paint);
    fn text(&mut self, text: &str, pos: (f64, f64), rotate: f64, paint: &Paint);
    fn image(&mut self, data: &str, pos: (f64, f64), scale: f64);
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Walk a page in stage order, handing primitives to the canvas.
///
/// `diffs` (with its prebuilt [`TargetIndex`]) supplies the class tags that
/// let the collaborator map rendered elements back to differences.
pub fn fill_page_canvas(
    tree: &mut Tree,
    canvas: &mut dyn Canvas,
    stages: DrawStage,
    diffs: Option<(&DiffSet, &TargetIndex)>,
    vars: &Variables,
    scope: &str,
) {
    for stage in stages.sequence() {
        let children: Vec<NodeId> = tree.child_nodes(tree.root()).collect();
        for child in children {
            fill_node(tree, child, canvas, stage, diffs, vars, scope);
        }
    }
}

fn diff_tags(
    tree: &Tree,
    node: NodeId,
    diffs: Option<(&DiffSet, &TargetIndex)>,
) -> Vec<String> {
    let Some((set, index)) = diffs else {
        return Vec::new();
    };
    // Any diff touching a slot of this node or its subtree decorates it.
    let mut tags = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        for t in tree.sub_types(n) {
            for id in index.get(n, &DiffKey::Child(t.clone())) {
                tags.push(set.class_tag(*id));
            }
        }
        for i in 0..tree.values(n).count() {
            for id in index.get(n, &DiffKey::Value(i)) {
                tags.push(set.class_tag(*id));
            }
        }
        stack.extend(tree.child_nodes(n));
    }
    tags.sort();
    tags.dedup();
    tags
}

fn paint(tree: &Tree, node: NodeId, color: &str, diffs: Option<(&DiffSet, &TargetIndex)>) -> Paint {
    Paint {
        color: color.to_owned(),
        fill: None,
        diff_tags: diff_tags(tree, node, diffs),
    }
}

fn wire_points(tree: &Tree, node: NodeId) -> Vec<(f64, f64)> {
    tree.get_node(node, "pts").map_or_else(Vec::new, |pts| {
        tree.children_of(pts, "xy")
            .iter()
            .map(|xy| coord::pos_f64(tree, *xy))
            .collect()
    })
}

fn node_at(tree: &Tree, node: NodeId) -> (f64, f64) {
    tree.get_node(node, "at")
        .map_or((0.0, 0.0), |at| coord::pos_f64(tree, at))
}

#[allow(clippy::too_many_arguments)]
fn fill_node(
    tree: &mut Tree,
    node: NodeId,
    canvas: &mut dyn Canvas,
    stage: DrawStage,
    diffs: Option<(&DiffSet, &TargetIndex)>,
    vars: &Variables,
    scope: &str,
) {
    match tree.class(node) {
        NodeClass::Wire if stage == DrawStage::FOREGROUND => {
            canvas.polyline(&wire_points(tree, node), &paint(tree, node, "wire", diffs));
        }
        NodeClass::Bus if stage == DrawStage::FOREGROUND => {
            canvas.polyline(&wire_points(tree, node), &paint(tree, node, "bus", diffs));
        }
        NodeClass::Polyline if stage == DrawStage::FOREGROUND => {
            canvas.polyline(&wire_points(tree, node), &paint(tree, node, "notes", diffs));
        }
        NodeClass::Junction if stage == DrawStage::FOREGROUND => {
            let diameter = tree
                .get_value(node, "diameter")
                .and_then(Value::as_f64)
                .filter(|d| *d > 0.0)
                .unwrap_or(0.915);
            let mut p = paint(tree, node, "none", diffs);
            p.fill = Some("junction".to_owned());
            canvas.circle(node_at(tree, node), diameter / 2.0, &p);
        }
        NodeClass::NoConnect if stage == DrawStage::FOREGROUND => {
            let (x, y) = node_at(tree, node);
            let sz = 0.635;
            canvas.polyline(
                &[
                    (x - sz, y - sz),
                    (x + sz, y + sz),
                    (x, y),
                    (x + sz, y - sz),
                    (x - sz, y + sz),
                ],
                &paint(tree, node, "noconnect", diffs),
            );
        }
        NodeClass::BusEntry if stage == DrawStage::FOREGROUND => {
            let (x, y) = node_at(tree, node);
            let size = tree
                .get_node(node, "size")
                .map_or((0.0, 0.0), |s| coord::pos_f64(tree, s));
            canvas.polyline(
                &[(x, y), (x + size.0, y + size.1)],
                &paint(tree, node, "wire", diffs),
            );
        }
        NodeClass::Rectangle if stage == DrawStage::FOREGROUND => {
            let start = tree
                .get_node(node, "start")
                .map_or((0.0, 0.0), |s| coord::pos_f64(tree, s));
            let end = tree
                .get_node(node, "end")
                .map_or((0.0, 0.0), |e| coord::pos_f64(tree, e));
            canvas.rect(start, end, &paint(tree, node, "notes", diffs));
        }
        NodeClass::Circle if stage == DrawStage::FOREGROUND => {
            let center = tree
                .get_node(node, "center")
                .map_or((0.0, 0.0), |c| coord::pos_f64(tree, c));
            let radius = tree
                .get_value(node, "radius")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            canvas.circle(center, radius, &paint(tree, node, "notes", diffs));
        }
        NodeClass::Arc if stage == DrawStage::FOREGROUND => {
            let get = |name: &str| {
                tree.get_node(node, name)
                    .map_or((0.0, 0.0), |n| coord::pos_f64(tree, n))
            };
            canvas.arc(
                get("start"),
                get("mid"),
                get("end"),
                &paint(tree, node, "notes", diffs),
            );
        }
        NodeClass::Text => {
            let raw = tree.value_at(node, 0).map(Value::text).unwrap_or_default();
            // Variable-bearing text is page-specific.
            let wanted = if raw.contains("${") {
                DrawStage::TEXT_PAGE
            } else {
                DrawStage::TEXT
            };
            if stage == wanted {
                let expanded = vars.expand(scope, &raw);
                let at = tree.get_node(node, "at");
                let rotate = at.map_or(0.0, |a| coord::rot(tree, a));
                canvas.text(
                    &expanded,
                    node_at(tree, node),
                    rotate,
                    &paint(tree, node, "notes", diffs),
                );
            }
        }
        NodeClass::Label | NodeClass::GlobalLabel | NodeClass::HierLabel
            if stage == DrawStage::FOREGROUND =>
        {
            let color = match tree.class(node) {
                NodeClass::GlobalLabel => "globlabel",
                NodeClass::HierLabel => "hierlabel",
                _ => "loclabel",
            };
            canvas.text(
                &label_text(tree, node),
                node_at(tree, node),
                0.0,
                &paint(tree, node, color, diffs),
            );
        }
        NodeClass::Image if stage == DrawStage::IMAGE => {
            let data = tree
                .get_node(node, "data")
                .map(|d| tree.values(d).map(Value::text).collect::<String>())
                .unwrap_or_default();
            let scale = tree
                .get_value(node, "scale")
                .and_then(Value::as_f64)
                .unwrap_or(1.0);
            canvas.image(&data, node_at(tree, node), scale);
        }
        NodeClass::Sheet if stage == DrawStage::FOREGROUND => {
            let pos = node_at(tree, node);
            let size = tree
                .get_node(node, "size")
                .map_or((0.0, 0.0), |s| coord::pos_f64(tree, s));
            let mut p = paint(tree, node, "sheet", diffs);
            p.fill = Some("sheet_background".to_owned());
            canvas.rect(pos, (pos.0 + size.0, pos.1 + size.1), &p);
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::parse;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Canvas for Recorder {
        fn polyline(&mut self, xys: &[(f64, f64)], paint: &Paint) {
            self.events
                .push(format!("polyline[{}] {}", xys.len(), paint.color));
        }
        fn rect(&mut self, _pos: (f64, f64), _end: (f64, f64), paint: &Paint) {
            self.events.push(format!("rect {}", paint.color));
        }
        fn circle(&mut self, _c: (f64, f64), radius: f64, paint: &Paint) {
            self.events.push(format!("circle r={radius} {}", paint.color));
        }
        fn arc(&mut self, _s: (f64, f64), _m: (f64, f64), _e: (f64, f64), paint: &Paint) {
            self.events.push(format!("arc {}", paint.color));
        }
        fn text(&mut self, text: &str, _pos: (f64, f64), _rot: f64, _paint: &Paint) {
            self.events.push(format!("text {text}"));
        }
        fn image(&mut self, _data: &str, _pos: (f64, f64), scale: f64) {
            self.events.push(format!("image x{scale}"));
        }
    }

    #[test]
    fn stage_sequence_is_ordered() {
        let stages: Vec<DrawStage> = DrawStage::ALL.sequence().collect();
        assert_eq!(stages.len(), DrawStage::COUNT as usize);
        assert_eq!(stages[0], DrawStage::WORKSHEET);
        assert_eq!(stages[11], DrawStage::FOREGROUND);
    }

    #[test]
    fn wires_and_junctions_emit_foreground() {
        let mut t = parse(
            "(kicad_sch (wire (pts (xy 0 0) (xy 5 0))) (junction (at 5 0)) (no_connect (at 9 9)))",
        )
        .expect("parse");
        let mut canvas = Recorder::default();
        let vars = Variables::new();
        fill_page_canvas(&mut t, &mut canvas, DrawStage::FOREGROUND, None, &vars, "/");
        assert_eq!(canvas.events.len(), 3);
        assert!(canvas.events[0].starts_with("polyline[2] wire"));
        assert!(canvas.events[1].starts_with("circle"));
        assert!(canvas.events[2].starts_with("polyline[5] noconnect"));
    }

    #[test]
    fn variable_text_renders_on_page_stage() {
        let mut t = parse("(kicad_sch (text \"page ${#}\" (at 0 0 0)) (text \"plain\" (at 1 1 0)))")
            .expect("parse");
        let mut vars = Variables::new();
        vars.define("/p", "#", "4");
        let mut canvas = Recorder::default();
        fill_page_canvas(&mut t, &mut canvas, DrawStage::TEXT_PAGE, None, &vars, "/p");
        assert_eq!(canvas.events, vec!["text page 4"]);
        let mut canvas = Recorder::default();
        fill_page_canvas(&mut t, &mut canvas, DrawStage::TEXT, None, &vars, "/p");
        assert_eq!(canvas.events, vec!["text plain"]);
    }

    #[test]
    fn images_only_on_image_stage() {
        let mut t = parse("(kicad_sch (image (at 0 0) (scale 2) (data \"AAAA\" \"BBBB\")))")
            .expect("parse");
        let vars = Variables::new();
        let mut canvas = Recorder::default();
        fill_page_canvas(&mut t, &mut canvas, DrawStage::FOREGROUND, None, &vars, "/");
        assert!(canvas.events.is_empty());
        let mut canvas = Recorder::default();
        fill_page_canvas(&mut t, &mut canvas, DrawStage::IMAGE, None, &vars, "/");
        assert_eq!(canvas.events, vec!["image x2"]);
    }

    #[test]
    fn diff_tags_flow_to_paint() {
        let base = parse("(kicad_sch (wire (pts (xy 0 0) (xy 5 0)) (uuid \"w1\")))").expect("parse");
        let other = parse("(kicad_sch (wire (pts (xy 0 0) (xy 9 0)) (uuid \"w1\")))").expect("parse");
        let (set, roots) = crate::diff::diff_trees(&base, &other).expect("comparable");
        let index = TargetIndex::build(&set, &roots);
        let mut t = base.clone();
        let vars = Variables::new();

        struct TagGrabber {
            tags: Vec<String>,
        }
        impl Canvas for TagGrabber {
            fn polyline(&mut self, _xys: &[(f64, f64)], paint: &Paint) {
                self.tags.extend(paint.diff_tags.clone());
            }
            fn rect(&mut self, _p: (f64, f64), _e: (f64, f64), _paint: &Paint) {}
            fn circle(&mut self, _c: (f64, f64), _r: f64, _paint: &Paint) {}
            fn arc(&mut self, _s: (f64, f64), _m: (f64, f64), _e: (f64, f64), _paint: &Paint) {}
            fn text(&mut self, _t: &str, _p: (f64, f64), _r: f64, _paint: &Paint) {}
            fn image(&mut self, _d: &str, _p: (f64, f64), _s: f64) {}
        }
        let mut canvas = TagGrabber { tags: Vec::new() };
        fill_page_canvas(
            &mut t,
            &mut canvas,
            DrawStage::FOREGROUND,
            Some((&set, &index)),
            &vars,
            "/",
        );
        // The modified xy slot lives under the wire's pts node; the wire
        // itself carries the pts group diff tag.
        assert!(!canvas.tags.is_empty());
    }
}
