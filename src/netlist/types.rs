//! Netlister value types: exact coordinates, instance-scoped keys,
//! collision objects, and net-name candidates.

use crate::sexp::Value;

// ---------------------------------------------------------------------------
// Fixed: exact coordinate arithmetic
// ---------------------------------------------------------------------------

/// A coordinate in micro-units (10⁻⁶ of the drawing unit).
///
/// Spatial keys must collide exactly when the source wrote the same point
/// two ways (`2.50` vs `2.5`), and the collinearity test must be exact, so
/// floats are out. Six fractional digits cover everything the file format
/// emits; deeper fractions truncate deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed(i128);

impl Fixed {
    const SCALE: i32 = 6;

    /// Convert a numeric value; non-numbers read as zero.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some((mantissa, scale)) = value.num() else {
            return Self(0);
        };
        let shift = Self::SCALE - scale;
        if shift >= 0 {
            let factor = 10_i128.checked_pow(u32::try_from(shift).unwrap_or(0));
            Self(factor.and_then(|f| mantissa.checked_mul(f)).unwrap_or(i128::MAX))
        } else {
            let factor = 10_i128.checked_pow(u32::try_from(-shift).unwrap_or(0));
            Self(factor.map_or(0, |f| mantissa / f))
        }
    }

    /// Raw micro-units.
    #[must_use]
    pub fn raw(self) -> i128 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Instance-scoped keys
// ---------------------------------------------------------------------------

/// A spatial key scoped to one page instance.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstCoord {
    /// Instance path of the page the point sits on.
    pub instance: String,
    pub x: Fixed,
    pub y: Fixed,
    /// Buses and nets never share a key even at the same point.
    pub is_bus: bool,
}

/// A text key scoped to one page instance, or process-wide for global
/// labels (`instance` is `None`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstLabel {
    pub instance: Option<String>,
    pub text: String,
}

/// Bus member key. The `None` sentinel stands for the unnamed member slot
/// some consumers render as `-1`.
pub type MemberKey = Option<String>;

// ---------------------------------------------------------------------------
// Collision objects
// ---------------------------------------------------------------------------

/// Whether a drawing element belongs to the bus layer, the net layer, or
/// either (junctions, bus entries, no-connects).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Busness {
    Net,
    Bus,
    Unknown,
}

/// Coordinate list used for collision detection.
#[derive(Clone, Debug)]
pub struct NetObj {
    pub xys: Vec<(Fixed, Fixed)>,
    pub is_bus: Busness,
}

impl NetObj {
    /// True when the two objects touch: line-line by shared endpoints,
    /// line-point by a bounding-box plus collinearity test. Bus-ness must
    /// agree unless one side is unknown.
    #[must_use]
    pub fn touches(&self, other: &Self) -> bool {
        if other.xys.len() > self.xys.len() {
            return other.touches(self);
        }
        if self.is_bus != other.is_bus
            && self.is_bus != Busness::Unknown
            && other.is_bus != Busness::Unknown
        {
            return false;
        }
        let p = &self.xys;
        if p.is_empty() || other.xys.is_empty() {
            return false;
        }
        // Line-line: endpoint comparisons only.
        if other.xys.len() > 1 {
            return other.xys.iter().any(|xy| p.contains(xy));
        }
        let (x, y) = other.xys[0];
        if p.len() == 1 {
            return p[0] == (x, y);
        }
        let (x0, y0) = p[0];
        let (x1, y1) = p[1];
        // Box test.
        if !(x0 <= x && x <= x1 || x1 <= x && x <= x0) {
            return false;
        }
        if !(y0 <= y && y <= y1 || y1 <= y && y <= y0) {
            return false;
        }
        // Collinearity, exact.
        (x1.raw() - x0.raw()) * (y.raw() - y0.raw())
            == (x.raw() - x0.raw()) * (y1.raw() - y0.raw())
    }
}

// ---------------------------------------------------------------------------
// Net name candidates
// ---------------------------------------------------------------------------

/// Category priority for canonical naming; lower wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetCategory {
    NetTie,
    Power,
    Label,
    SymPin,
    /// A pin of a power symbol (reference starts with `#`).
    SymPinPwr,
    SheetPin,
    NoConnect,
}

/// The textual identity of a name candidate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NameKind {
    /// A label or power-pin name.
    Text(String),
    /// A symbol pin: `(refdes, pin name, pin number)`.
    Pin {
        refdes: String,
        name: String,
        number: String,
    },
}

/// One candidate name of a component. Ordering is the naming priority:
/// category, then hierarchy depth, then case-folded text, then exact text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NetName {
    pub category: NetCategory,
    pub depth: usize,
    pub kind: NameKind,
}

impl NetName {
    /// A textual candidate; depth counts hierarchy separators.
    #[must_use]
    pub fn text(category: NetCategory, name: String) -> Self {
        let depth = name.matches('/').count();
        Self {
            category,
            depth,
            kind: NameKind::Text(name),
        }
    }

    /// A symbol-pin candidate.
    #[must_use]
    pub fn pin(category: NetCategory, refdes: String, name: String, number: String) -> Self {
        Self {
            category,
            depth: 0,
            kind: NameKind::Pin {
                refdes,
                name,
                number,
            },
        }
    }

    fn fold_key(&self) -> Vec<String> {
        match &self.kind {
            NameKind::Text(t) => vec![t.to_uppercase()],
            NameKind::Pin {
                refdes,
                name,
                number,
            } => vec![
                refdes.to_uppercase(),
                name.to_uppercase(),
                number.to_uppercase(),
            ],
        }
    }
}

impl PartialOrd for NetName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NetName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.category, self.depth, self.fold_key(), &self.kind).cmp(&(
            other.category,
            other.depth,
            other.fold_key(),
            &other.kind,
        ))
    }
}

/// Output form of a generated netlist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetFormat {
    /// `NAME: R1.1 U2.3`
    Compact,
    /// `NAME: R1.1(VDD) U2.3(VOUT)`
    WithPinNames,
    /// Telesis-style named blocks with comma-separated nodes.
    NamedBlock,
}

/// Strip the trailing unit letters off a reference (`U1A` → `U1`).
#[must_use]
pub fn strip_unit(refdes: &str) -> &str {
    refdes.trim_end_matches(|c: char| c.is_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::Decimal;

    fn fx(text: &str) -> Fixed {
        Fixed::from_value(&Value::Decimal(Decimal::new(text).expect("decimal")))
    }

    #[test]
    fn fixed_collides_across_written_forms() {
        assert_eq!(fx("2.50"), fx("2.5"));
        assert_eq!(Fixed::from_value(&Value::Int(2)), fx("2.0"));
        assert_ne!(fx("2.5"), fx("2.51"));
    }

    #[test]
    fn fixed_scales_exactly() {
        assert_eq!(fx("1.27").raw(), 1_270_000);
        assert_eq!(fx("-0.635").raw(), -635_000);
    }

    #[test]
    fn line_point_collision() {
        let line = NetObj {
            xys: vec![(fx("0"), fx("0")), (fx("10"), fx("10"))],
            is_bus: Busness::Net,
        };
        let on = NetObj {
            xys: vec![(fx("5"), fx("5"))],
            is_bus: Busness::Net,
        };
        let off = NetObj {
            xys: vec![(fx("5"), fx("6"))],
            is_bus: Busness::Net,
        };
        let outside = NetObj {
            xys: vec![(fx("11"), fx("11"))],
            is_bus: Busness::Net,
        };
        assert!(line.touches(&on));
        assert!(on.touches(&line), "symmetric");
        assert!(!line.touches(&off));
        assert!(!line.touches(&outside));
    }

    #[test]
    fn line_line_touches_at_endpoint_only() {
        let a = NetObj {
            xys: vec![(fx("0"), fx("0")), (fx("10"), fx("0"))],
            is_bus: Busness::Net,
        };
        let b = NetObj {
            xys: vec![(fx("10"), fx("0")), (fx("10"), fx("5"))],
            is_bus: Busness::Net,
        };
        let crossing = NetObj {
            xys: vec![(fx("5"), fx("-5")), (fx("5"), fx("5"))],
            is_bus: Busness::Net,
        };
        assert!(a.touches(&b));
        // Mid-segment crossings are not connections.
        assert!(!a.touches(&crossing));
    }

    #[test]
    fn busness_must_agree_unless_unknown() {
        let net = NetObj {
            xys: vec![(fx("0"), fx("0")), (fx("1"), fx("0"))],
            is_bus: Busness::Net,
        };
        let bus = NetObj {
            xys: vec![(fx("0"), fx("0"))],
            is_bus: Busness::Bus,
        };
        let unknown = NetObj {
            xys: vec![(fx("0"), fx("0"))],
            is_bus: Busness::Unknown,
        };
        assert!(!net.touches(&bus));
        assert!(net.touches(&unknown));
    }

    #[test]
    fn category_priority_orders_names() {
        let power = NetName::text(NetCategory::Power, "VDD".to_owned());
        let label = NetName::text(NetCategory::Label, "/CLK".to_owned());
        let pin = NetName::pin(
            NetCategory::SymPin,
            "R1".to_owned(),
            "~".to_owned(),
            "1".to_owned(),
        );
        let mut names = vec![pin.clone(), label.clone(), power.clone()];
        names.sort();
        assert_eq!(names, vec![power, label, pin]);
    }

    #[test]
    fn shallower_labels_win_within_category() {
        let deep = NetName::text(NetCategory::Label, "/a/b/SIG".to_owned());
        let shallow = NetName::text(NetCategory::Label, "/z/SIG".to_owned());
        assert!(shallow < deep);
    }

    #[test]
    fn case_folded_ordering_breaks_ties() {
        let a = NetName::text(NetCategory::Label, "/alpha".to_owned());
        let b = NetName::text(NetCategory::Label, "/BETA".to_owned());
        assert!(a < b, "ALPHA sorts before BETA regardless of case");
    }

    #[test]
    fn strip_unit_behaviour() {
        assert_eq!(strip_unit("U1A"), "U1");
        assert_eq!(strip_unit("U1"), "U1");
        assert_eq!(strip_unit("R12AB"), "R12");
        assert_eq!(strip_unit("#PWR01"), "#PWR01");
    }
}
