//! Round-trip scenarios: parse → print must be byte-exact under the layout
//! policy for every accepted file.

use schemdiff::error::ParseError;
use schemdiff::sexp::{parse, print_file};

fn roundtrip(src: &str) -> String {
    let tree = parse(src).expect("source parses");
    print_file(&tree, tree.root())
}

#[test]
fn s1_flat_node_is_byte_exact() {
    let src = "(a 1 2.50 \"x\\n\")\n";
    assert_eq!(roundtrip(src), src);
}

#[test]
fn s2_xy_runs_group_up_to_99_columns() {
    let mut src = String::from("(pts");
    for i in 0..60 {
        src.push_str(&format!(" (xy {i}.5 -{i})"));
    }
    src.push(')');
    let out = roundtrip(&src);
    let lines: Vec<&str> = out.lines().collect();
    // Grouped lines, tab indented, closing paren on its own line.
    assert!(lines.len() > 2 && lines.len() < 25, "{} lines", lines.len());
    for line in &lines[1..lines.len() - 1] {
        assert!(line.starts_with('\t'));
    }
    assert_eq!(*lines.last().expect("last"), ")");
    // A second pass is a fixed point.
    assert_eq!(roundtrip(&out), out);
}

#[test]
fn representative_page_roundtrips() {
    let src = concat!(
        "(kicad_sch\n",
        "\t(version 20231120)\n",
        "\t(generator \"eeschema\")\n",
        "\t(uuid \"f2a4ddd8-9377-4b8e-9b69-1e4a6b24a2cf\")\n",
        "\t(paper \"A4\")\n",
        "\t(wire\n",
        "\t\t(pts\n",
        "\t\t\t(xy 132.08 80.01) (xy 147.32 80.01)\n",
        "\t\t)\n",
        "\t\t(stroke\n",
        "\t\t\t(width 0)\n",
        "\t\t\t(type default)\n",
        "\t\t)\n",
        "\t\t(uuid \"1f73c6f0-b861-4d1a-b78a-b2768eb8c473\")\n",
        "\t)\n",
        "\t(label \"VBUS\"\n",
        "\t\t(at 139.7 78.74 0)\n",
        "\t\t(uuid \"2b19efa8-21b3-4012-b195-8d2e08dd4d20\")\n",
        "\t)\n",
        ")\n",
    );
    assert_eq!(roundtrip(src), src);
}

#[test]
fn decimal_precision_is_preserved() {
    let src = "(at 132.080 80.010 0.0)\n";
    assert_eq!(roundtrip(src), src);
}

#[test]
fn string_escapes_survive() {
    let src = "(text \"line\\nbreak \\\"quoted\\\" back\\\\slash\")\n";
    assert_eq!(roundtrip(src), src);
}

#[test]
fn roundtrip_is_idempotent_on_arbitrary_layout() {
    // Input with nonstandard whitespace normalizes once, then stays fixed.
    let src = "(a   (b 1)(c  2)\n  (d 3))";
    let once = roundtrip(src);
    assert_eq!(roundtrip(&once), once);
}

#[test]
fn parse_error_offsets() {
    assert_eq!(
        parse("(s \"ab\ncd\")").expect_err("newline"),
        ParseError::UnescapedNewline { offset: 6 }
    );
    assert_eq!(
        parse("(a (b)").expect_err("unclosed"),
        ParseError::UnbalancedParens { offset: 6 }
    );
    assert_eq!(
        parse("(s \"never closed").expect_err("unterminated"),
        ParseError::UnterminatedString { offset: 3 }
    );
}
