//! Atomic values of the s-expression data model.
//!
//! A [`Value`] is exactly one of: atom (unquoted identifier), signed integer,
//! fixed-precision decimal, or unicode string. Decimals preserve the written
//! source text: `2.50` and `2.5` are numerically equal but print
//! differently, and that distinction is load-bearing for byte-exact
//! round-trips.

use std::fmt;

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// An unquoted identifier token drawn from the grammar's keyword set.
///
/// Atoms compare case-sensitively and are distinct from strings: `(hide)` and
/// `("hide")` are different expressions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Atom(String);

impl Atom {
    /// Create an atom from its token text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq<str> for Atom {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Atom {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::borrow::Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Decimal
// ---------------------------------------------------------------------------

/// A fixed-precision decimal that remembers its written form.
///
/// Numeric comparison is exact, over the normalized `(mantissa, scale)`
/// representation: `2.50 == 2.5 == 25e-1`. Printing always reproduces the
/// source text.
#[derive(Clone, Debug)]
pub struct Decimal {
    text: String,
}

impl Decimal {
    /// Build a decimal from its source text.
    ///
    /// Accepts `[+-]digits[.digits][(e|E)[+-]digits]`. Returns `None` for
    /// anything else (such tokens are atoms, not numbers).
    #[must_use]
    pub fn new(text: &str) -> Option<Self> {
        split_numeric(text).map(|_| Self {
            text: text.to_owned(),
        })
    }

    /// The source text, reproduced verbatim by the printer.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Exact `(mantissa, scale)` form: the value is `mantissa * 10^-scale`,
    /// reduced so the mantissa has no trailing zeros.
    ///
    /// Schematic coordinates fit comfortably in an `i128` mantissa; inputs
    /// beyond 38 significant digits saturate deterministically.
    #[must_use]
    pub fn normalized(&self) -> (i128, i32) {
        let (neg, int_digits, frac_digits, exp) = match split_numeric(&self.text) {
            Some(parts) => parts,
            None => return (0, 0),
        };
        let mut mantissa: i128 = 0;
        let mut dropped: i32 = 0;
        for d in int_digits.bytes().chain(frac_digits.bytes()) {
            if dropped > 0 {
                dropped += 1;
                continue;
            }
            match mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(d - b'0')))
            {
                Some(m) => mantissa = m,
                None => dropped = 1,
            }
        }
        if neg {
            mantissa = -mantissa;
        }
        let mut scale = i32::try_from(frac_digits.len()).unwrap_or(i32::MAX) - exp - dropped;
        while mantissa != 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        if mantissa == 0 {
            scale = 0;
        }
        (mantissa, scale)
    }

    /// Lossy float view, for geometry consumers.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.text.parse().unwrap_or(0.0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Decimal {}

/// Split numeric text into `(negative, integer digits, fraction digits,
/// exponent)`. Returns `None` when the text is not a number token.
fn split_numeric(text: &str) -> Option<(bool, &str, &str, i32)> {
    let (neg, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let int_end = rest.bytes().take_while(u8::is_ascii_digit).count();
    if int_end == 0 {
        return None;
    }
    let (int_digits, mut rest) = rest.split_at(int_end);
    let mut frac_digits = "";
    if let Some(tail) = rest.strip_prefix('.') {
        let frac_end = tail.bytes().take_while(u8::is_ascii_digit).count();
        if frac_end == 0 {
            return None;
        }
        (frac_digits, rest) = tail.split_at(frac_end);
    }
    let mut exp = 0_i32;
    if !rest.is_empty() {
        let tail = rest.strip_prefix(['e', 'E'])?;
        let (exp_neg, digits) = match tail.as_bytes().first()? {
            b'-' => (true, &tail[1..]),
            b'+' => (false, &tail[1..]),
            _ => (false, tail),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        exp = digits.parse().unwrap_or(i32::MAX);
        if exp_neg {
            exp = -exp;
        }
    }
    Some((neg, int_digits, frac_digits, exp))
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// One atomic child of a node.
#[derive(Clone, Debug)]
pub enum Value {
    /// Unquoted identifier.
    Atom(Atom),
    /// Signed integer, printed verbatim.
    Int(i64),
    /// Fixed-precision decimal, printed in its written form.
    Decimal(Decimal),
    /// Unicode string (unescaped content; the printer re-escapes).
    Str(String),
}

impl Value {
    /// Atom view, if this value is an atom.
    #[must_use]
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// String view, if this value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, if this value is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The loosest text view: atom text, string content, or numeric text.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Atom(a) => a.as_str().to_owned(),
            Self::Int(i) => i.to_string(),
            Self::Decimal(d) => d.as_str().to_owned(),
            Self::Str(s) => s.clone(),
        }
    }

    /// Exact numeric form for integers and decimals.
    #[must_use]
    pub fn num(&self) -> Option<(i128, i32)> {
        match self {
            Self::Int(i) => {
                let mut mantissa = i128::from(*i);
                let mut scale = 0;
                while mantissa != 0 && mantissa % 10 == 0 {
                    mantissa /= 10;
                    scale -= 1;
                }
                Some((mantissa, scale))
            }
            Self::Decimal(d) => Some(d.normalized()),
            _ => None,
        }
    }

    /// Lossy float view for geometry consumers; `None` for non-numbers.
    ///
    /// Schematic coordinates sit far below 2^52, so the integer cast is
    /// exact in practice.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Decimal(d) => Some(d.as_f64()),
            _ => None,
        }
    }

    /// True for integers and decimals.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Decimal(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Atom(a), Self::Atom(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            // Integers and decimals compare numerically across kinds:
            // (at 0 0) and (at 0.0 0.0) describe the same position.
            (a, b) if a.is_number() && b.is_number() => a.num() == b.num(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<Atom> for Value {
    fn from(a: Atom) -> Self {
        Self::Atom(a)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::new(s).expect("valid decimal")
    }

    // -- Decimal parsing --

    #[test]
    fn decimal_accepts_fraction_and_exponent() {
        assert!(Decimal::new("2.50").is_some());
        assert!(Decimal::new("-0.1").is_some());
        assert!(Decimal::new("1e3").is_some());
        assert!(Decimal::new("+1.5E-2").is_some());
        assert!(Decimal::new("42").is_some());
    }

    #[test]
    fn decimal_rejects_non_numbers() {
        assert!(Decimal::new("abc").is_none());
        assert!(Decimal::new("1.").is_none());
        assert!(Decimal::new(".5").is_none());
        assert!(Decimal::new("1e").is_none());
        assert!(Decimal::new("-").is_none());
        assert!(Decimal::new("1.2.3").is_none());
    }

    #[test]
    fn decimal_preserves_written_form() {
        assert_eq!(dec("2.50").as_str(), "2.50");
        assert_eq!(format!("{}", dec("0.100")), "0.100");
    }

    // -- Normalization and numeric equality --

    #[test]
    fn trailing_zeros_are_numerically_equal() {
        assert_eq!(dec("2.50"), dec("2.5"));
        assert_eq!(dec("2.50"), dec("25e-1"));
        assert_ne!(dec("2.50"), dec("2.51"));
    }

    #[test]
    fn zero_normalizes_regardless_of_form() {
        assert_eq!(dec("0.000").normalized(), (0, 0));
        assert_eq!(dec("0e5"), dec("0.0"));
    }

    #[test]
    fn negative_normalization() {
        assert_eq!(dec("-1.270").normalized(), (-127, 2));
    }

    #[test]
    fn exponent_shifts_scale() {
        assert_eq!(dec("1.5e3").normalized(), (15, -2)); // 1500
        assert_eq!(dec("1.5e-3").normalized(), (15, 4)); // 0.0015
    }

    // -- Value cross-kind equality --

    #[test]
    fn int_equals_whole_decimal() {
        assert_eq!(Value::Int(2), Value::Decimal(dec("2.0")));
        assert_ne!(Value::Int(2), Value::Decimal(dec("2.1")));
    }

    #[test]
    fn atom_is_not_string() {
        assert_ne!(
            Value::Atom(Atom::from("hide")),
            Value::Str("hide".to_owned())
        );
    }

    #[test]
    fn value_text_views() {
        assert_eq!(Value::Int(-3).text(), "-3");
        assert_eq!(Value::Decimal(dec("2.50")).text(), "2.50");
        assert_eq!(Value::Atom(Atom::from("xy")).text(), "xy");
        assert_eq!(Value::from("hello").text(), "hello");
    }

    #[test]
    fn value_f64_views() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Decimal(dec("1.5")).as_f64(), Some(1.5));
        assert_eq!(Value::from("x").as_f64(), None);
    }
}
