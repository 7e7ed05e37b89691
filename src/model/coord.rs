//! Coordinate accessors and gravity math.
//!
//! A coordinate node (`at`, `xy`, `start`, …) holds two numeric children,
//! optionally followed by a rotation and/or a gravity marker. Gravity anchors
//! a position to one corner of a rectangle (`ltcorner`, `lbcorner`,
//! `rbcorner`, `rtcorner`) and is used by worksheet items.

use crate::sexp::{NodeId, Tree, Value};

// ---------------------------------------------------------------------------
// Gravity
// ---------------------------------------------------------------------------

/// Corner anchor for a relative coordinate.
///
/// Parsed from either the two-letter form (`"lt"`) or the corner atoms
/// (`"ltcorner"`); only the first two characters matter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gravity {
    h: char,
    v: char,
}

impl Gravity {
    /// Parse from marker text, falling back to `default` when malformed.
    #[must_use]
    pub fn parse(text: &str, default: Self) -> Self {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(h @ ('l' | 'r')), Some(v @ ('t' | 'b'))) => Self { h, v },
            _ => default,
        }
    }

    /// Top-left anchor, the schematic default.
    #[must_use]
    pub const fn left_top() -> Self {
        Self { h: 'l', v: 't' }
    }

    /// Bottom-right anchor, the worksheet default.
    #[must_use]
    pub const fn right_bottom() -> Self {
        Self { h: 'r', v: 'b' }
    }

    /// Resolve an anchored position against a `[left, top, right, bottom]`
    /// rectangle.
    #[must_use]
    pub fn resolve_pos(self, rel: [f64; 4], pos: (f64, f64)) -> (f64, f64) {
        let x = match self.h {
            'l' => rel[0] + pos.0,
            'r' => rel[2] - pos.0,
            _ => pos.0,
        };
        let y = match self.v {
            't' => rel[1] + pos.1,
            'b' => rel[3] - pos.1,
            _ => pos.1,
        };
        (x, y)
    }

    /// Resolve a direction vector: right/bottom gravity flips the axis so
    /// increments always advance into the page.
    #[must_use]
    pub fn resolve_vect(self, vect: (f64, f64)) -> (f64, f64) {
        let x = if self.h == 'r' { -vect.0 } else { vect.0 };
        let y = if self.v == 'b' { -vect.1 } else { vect.1 };
        (x, y)
    }
}

// ---------------------------------------------------------------------------
// Coordinate accessors
// ---------------------------------------------------------------------------

/// The two positional values of a coordinate node. A missing second value
/// reads as integer zero.
#[must_use]
pub fn pos_values(tree: &Tree, id: NodeId) -> (Value, Value) {
    let x = tree.value_at(id, 0).cloned().unwrap_or(Value::Int(0));
    let y = tree.value_at(id, 1).cloned().unwrap_or(Value::Int(0));
    (x, y)
}

/// Float view of a coordinate node.
#[must_use]
pub fn pos_f64(tree: &Tree, id: NodeId) -> (f64, f64) {
    let (x, y) = pos_values(tree, id);
    (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0))
}

/// Gravity marker, when the third value is an anchor atom.
#[must_use]
pub fn gravity(tree: &Tree, id: NodeId, default: Gravity) -> Gravity {
    match tree.value_at(id, 2) {
        Some(Value::Atom(a)) => Gravity::parse(a.as_str(), default),
        _ => default,
    }
}

/// Rotation in degrees. Legacy files store tenths of a degree for values at
/// or above 360.
#[must_use]
pub fn rot(tree: &Tree, id: NodeId) -> f64 {
    let Some(value) = tree.value_at(id, 2) else {
        return 0.0;
    };
    let Some(deg) = value.as_f64() else {
        return 0.0;
    };
    if deg < 360.0 { deg } else { deg / 10.0 }
}

// ---------------------------------------------------------------------------
// Plane helpers
// ---------------------------------------------------------------------------

/// Translate a position by an offset.
#[must_use]
pub fn translated(pos: (f64, f64), offset: (f64, f64)) -> (f64, f64) {
    (pos.0 + offset.0, pos.1 + offset.1)
}

/// Rotate a vector by degrees (mathematical orientation).
#[must_use]
pub fn rotated(pos: (f64, f64), deg: f64) -> (f64, f64) {
    let rad = deg.to_radians();
    let (sin, cos) = rad.sin_cos();
    (
        pos.0 * cos - pos.1 * sin,
        pos.1 * cos + pos.0 * sin,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::parse;

    #[test]
    fn pos_defaults_missing_y_to_zero() {
        let t = parse("(at 5)").expect("parse");
        assert_eq!(pos_f64(&t, t.root()), (5.0, 0.0));
    }

    #[test]
    fn pos_reads_decimals() {
        let t = parse("(at 1.27 -2.54)").expect("parse");
        assert_eq!(pos_f64(&t, t.root()), (1.27, -2.54));
    }

    #[test]
    fn rot_reads_third_number() {
        let t = parse("(at 0 0 90)").expect("parse");
        assert_eq!(rot(&t, t.root()), 90.0);
    }

    #[test]
    fn rot_missing_is_zero() {
        let t = parse("(at 0 0)").expect("parse");
        assert_eq!(rot(&t, t.root()), 0.0);
    }

    #[test]
    fn legacy_tenths_rotation_is_scaled() {
        let t = parse("(at 0 0 2700)").expect("parse");
        assert_eq!(rot(&t, t.root()), 270.0);
    }

    #[test]
    fn gravity_from_corner_atom() {
        let t = parse("(pos 10 10 ltcorner)").expect("parse");
        assert_eq!(
            gravity(&t, t.root(), Gravity::right_bottom()),
            Gravity::left_top()
        );
    }

    #[test]
    fn gravity_defaults_when_absent() {
        let t = parse("(pos 10 10)").expect("parse");
        assert_eq!(
            gravity(&t, t.root(), Gravity::right_bottom()),
            Gravity::right_bottom()
        );
    }

    #[test]
    fn gravity_resolves_positions_against_corners() {
        let rel = [10.0, 20.0, 110.0, 220.0];
        assert_eq!(
            Gravity::left_top().resolve_pos(rel, (5.0, 7.0)),
            (15.0, 27.0)
        );
        assert_eq!(
            Gravity::right_bottom().resolve_pos(rel, (5.0, 7.0)),
            (105.0, 213.0)
        );
        assert_eq!(
            Gravity::parse("rtcorner", Gravity::left_top()).resolve_pos(rel, (5.0, 7.0)),
            (105.0, 27.0)
        );
    }

    #[test]
    fn gravity_flips_vectors() {
        assert_eq!(
            Gravity::right_bottom().resolve_vect((2.0, 3.0)),
            (-2.0, -3.0)
        );
        assert_eq!(Gravity::left_top().resolve_vect((2.0, 3.0)), (2.0, 3.0));
    }

    #[test]
    fn rotation_math() {
        let (x, y) = rotated((1.0, 0.0), 90.0);
        assert!(x.abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
        assert_eq!(translated((1.0, 2.0), (0.5, -0.5)), (1.5, 1.5));
    }
}
