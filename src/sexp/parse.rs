//! S-expression lexer and parse driver.
//!
//! Tokens are decided by the first non-whitespace character: parens open and
//! close nodes, `"` opens a string literal (escapes `\\`, `\"`, `\n`; a raw
//! newline is a hard error), and anything else starts a numeric-or-atom run.
//! A run parses as an integer, then as a decimal (written form preserved),
//! and falls back to an atom.
//!
//! The driver keeps a stack of partial child lists; every `)` pops the top
//! list, promotes the node through the class registry, and appends it to the
//! new top. Input must contain exactly one top-level expression.

use crate::error::ParseError;

use super::node::{Child, Tree};
use super::value::{Atom, Decimal, Value};

/// Parse a complete source file into a [`Tree`].
///
/// # Errors
///
/// Returns [`ParseError`] for unbalanced parens, unterminated strings, or
/// raw newlines inside string literals. All parse errors are fatal for the
/// file.
pub fn parse(input: &str) -> Result<Tree, ParseError> {
    let bytes = input.as_bytes();
    let mut tree = Tree::new();
    let mut stack: Vec<Vec<Child>> = vec![Vec::new()];
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                stack.push(Vec::new());
                i += 1;
            }
            b')' => {
                if stack.len() < 2 {
                    return Err(ParseError::UnbalancedParens { offset: i });
                }
                let children = stack.pop().unwrap_or_default();
                let id = tree.alloc(children);
                if let Some(top) = stack.last_mut() {
                    top.push(Child::Node(id));
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            b'"' => {
                let (text, end) = scan_string(input, i)?;
                if let Some(top) = stack.last_mut() {
                    top.push(Child::Value(Value::Str(text)));
                }
                i = end;
            }
            _ => {
                let start = i;
                while i < bytes.len() && !is_token_end(bytes[i]) {
                    i += 1;
                }
                if let Some(top) = stack.last_mut() {
                    top.push(Child::Value(classify(&input[start..i])));
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::UnbalancedParens {
            offset: input.len(),
        });
    }
    let top = stack.pop().unwrap_or_default();
    match top.as_slice() {
        [Child::Node(root)] => {
            tree.set_root(*root);
            Ok(tree)
        }
        _ => Err(ParseError::UnbalancedParens {
            offset: input.len(),
        }),
    }
}

fn is_token_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"')
}

/// Classify one numeric-or-atom run.
fn classify(token: &str) -> Value {
    let digits = match token.as_bytes().first() {
        Some(b'+' | b'-') => &token[1..],
        _ => token,
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        // Integers wider than i64 keep their written form as decimals.
        if let Ok(i) = token.parse::<i64>() {
            return Value::Int(i);
        }
    }
    if let Some(d) = Decimal::new(token) {
        return Value::Decimal(d);
    }
    Value::Atom(Atom::from(token))
}

/// Scan a string literal starting at the opening quote. Returns the
/// unescaped content and the byte offset just past the closing quote.
fn scan_string(input: &str, start: usize) -> Result<(String, usize), ParseError> {
    let bytes = input.as_bytes();
    let mut j = start + 1;
    loop {
        if j >= bytes.len() {
            return Err(ParseError::UnterminatedString { offset: start });
        }
        match bytes[j] {
            b'\\' => {
                if j + 1 >= bytes.len() {
                    return Err(ParseError::UnterminatedString { offset: start });
                }
                j += 2;
            }
            b'"' => break,
            b'\n' => return Err(ParseError::UnescapedNewline { offset: j }),
            _ => j += 1,
        }
    }
    let raw = &input[start + 1..j];
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => text.push('\n'),
                Some(other) => text.push(other),
                None => break,
            }
        } else {
            text.push(c);
        }
    }
    Ok((text, j + 1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
