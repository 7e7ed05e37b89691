//! S-expression printer.
//!
//! Reproduces the source ecosystem's layout policy byte-for-byte:
//!
//! - one tab of indent per nesting level, nested nodes on their own line;
//! - atomic children space-separated on the current line, wrapping past 72
//!   columns, except runs of consecutive `xy` nodes, which share lines up
//!   to 99 columns;
//! - the closing paren stays on the last child's line unless the node
//!   wrapped or ended with a nested child;
//! - strings re-escape `\`, `"`, and newline; integers print verbatim;
//!   decimals print their preserved written form.
//!
//! The printer never reorders children.

use super::node::{Child, NodeId, Tree};
use super::value::Value;

const INDENT: &str = "\t";
const TOKEN_WRAP_LIMIT: usize = 72;
const XY_COLUMN_LIMIT: usize = 99;

/// Render one node (and its subtree) without a trailing newline.
#[must_use]
pub fn print_node(tree: &Tree, id: NodeId) -> String {
    let mut out: Vec<String> = vec!["(".to_owned()];
    let mut in_multiline_list = false;
    let mut in_xy = false;
    // (node, next child position): an explicit iterator stack.
    let mut stack: Vec<(NodeId, usize)> = vec![(id, 0)];

    while let Some((node, pos)) = stack.last().copied() {
        let children = tree.children(node);
        if pos >= children.len() {
            // End of block.
            stack.pop();
            let closes_nested = out.last().is_some_and(|l| l.ends_with(')'));
            if in_multiline_list || closes_nested {
                out.push(format!("{})", INDENT.repeat(stack.len())));
            } else if let Some(last) = out.last_mut() {
                last.push(')');
            }
            in_multiline_list = false;
            continue;
        }
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }
        match &children[pos] {
            Child::Node(sub) => {
                // Start of block: a nested node opens on its own line.
                out.push(format!("{}(", INDENT.repeat(stack.len())));
                stack.push((*sub, 0));
            }
            Child::Value(value) => {
                let txt = format_value(value);
                if let Value::Atom(a) = value {
                    // Chains of consecutive xy nodes merge onto one line.
                    let was_xy = in_xy;
                    in_xy = a == "xy";
                    if in_xy
                        && was_xy
                        && out.len() >= 2
                        && out[out.len() - 2].len() < XY_COLUMN_LIMIT
                    {
                        out.pop();
                        if let Some(last) = out.last_mut() {
                            last.push_str(" (");
                        }
                    }
                }
                let fits = in_xy || out.last().is_some_and(|l| l.len() < TOKEN_WRAP_LIMIT);
                if fits {
                    if let Some(last) = out.last_mut() {
                        if last.ends_with('(') {
                            last.push_str(&txt);
                        } else {
                            last.push(' ');
                            last.push_str(&txt);
                        }
                    }
                } else {
                    out.push(format!("{}{}", INDENT.repeat(stack.len()), txt));
                    in_multiline_list = true;
                }
            }
        }
    }
    out.join("\n")
}

/// Render a node as a complete file (with the trailing newline).
#[must_use]
pub fn print_file(tree: &Tree, id: NodeId) -> String {
    let mut s = print_node(tree, id);
    s.push('\n');
    s
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Atom(a) => a.as_str().to_owned(),
        Value::Int(i) => i.to_string(),
        Value::Decimal(d) => d.as_str().to_owned(),
        Value::Str(s) => {
            let mut escaped = String::with_capacity(s.len() + 2);
            escaped.push('"');
            for c in s.chars() {
                match c {
                    '\\' => escaped.push_str("\\\\"),
                    '"' => escaped.push_str("\\\""),
                    '\n' => escaped.push_str("\\n"),
                    other => escaped.push(other),
                }
            }
            escaped.push('"');
            escaped
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::parse;

    fn roundtrip(src: &str) -> String {
        let t = parse(src).expect("parse");
        print_file(&t, t.root())
    }

    #[test]
    fn flat_node_roundtrips_byte_exact() {
        let src = "(a 1 2.50 \"x\\n\")\n";
        assert_eq!(roundtrip(src), src);
    }

    #[test]
    fn nested_nodes_get_own_lines() {
        let out = roundtrip("(a (b 1) (c 2))\n");
        assert_eq!(out, "(a\n\t(b 1)\n\t(c 2)\n)\n");
    }

    #[test]
    fn nested_roundtrip_is_stable() {
        let once = roundtrip("(a (b 1) (c 2))\n");
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn deep_nesting_indents_with_tabs() {
        let out = roundtrip("(a (b (c (d 1))))");
        assert_eq!(out, "(a\n\t(b\n\t\t(c\n\t\t\t(d 1)\n\t\t)\n\t)\n)\n");
    }

    #[test]
    fn string_escapes_reemitted() {
        let src = "(s \"a\\\"b\" \"c\\\\d\" \"e\\nf\")\n";
        assert_eq!(roundtrip(src), src);
    }

    #[test]
    fn long_token_runs_wrap_at_72() {
        let mut src = String::from("(data");
        for i in 0..40 {
            src.push_str(&format!(" {i:03}"));
        }
        src.push(')');
        let out = roundtrip(&src);
        for line in out.lines() {
            // Indent tabs count as one column each in the wrap budget.
            assert!(line.len() <= TOKEN_WRAP_LIMIT + 4, "line too long: {line:?}");
        }
        // Wrapped → closing paren on its own line.
        assert!(out.ends_with("\n)\n"));
        // Content is preserved in order.
        let t = parse(&out).expect("reparse");
        assert_eq!(t.values(t.root()).count(), 40);
    }

    #[test]
    fn xy_chains_share_lines_up_to_99_columns() {
        // Scenario S2 shape: a node with many xy children.
        let mut src = String::from("(pts");
        for i in 0..60 {
            src.push_str(&format!(" (xy {i} {i})"));
        }
        src.push(')');
        let out = roundtrip(&src);
        let lines: Vec<&str> = out.lines().collect();
        // Far fewer lines than one per xy node.
        assert!(lines.len() < 30, "xy chain did not merge: {} lines", lines.len());
        for line in &lines[1..lines.len() - 1] {
            assert!(line.starts_with('\t'), "body lines are tab indented");
            assert!(line.len() < XY_COLUMN_LIMIT + 16, "line too long: {line:?}");
        }
        assert_eq!(*lines.last().expect("last line"), ")");
        let t = parse(&out).expect("reparse");
        assert_eq!(t.children_of(t.root(), "xy").len(), 60);
    }

    #[test]
    fn closing_paren_follows_last_atomic_child() {
        assert_eq!(roundtrip("(a 1 2)"), "(a 1 2)\n");
    }

    #[test]
    fn closing_paren_own_line_after_nested_child() {
        assert_eq!(roundtrip("(a 1 (b 2))"), "(a 1\n\t(b 2)\n)\n");
    }

    #[test]
    fn untyped_nested_list() {
        assert_eq!(roundtrip("(a (1 2))"), "(a\n\t(1 2)\n)\n");
    }

    #[test]
    fn decimal_written_form_survives() {
        assert_eq!(roundtrip("(n 0.100 2.50 1e3)"), "(n 0.100 2.50 1e3)\n");
    }
}
