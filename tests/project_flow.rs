//! Project-level flows: traversal, variables, and netlisting over a small
//! two-page hierarchy, plus the filesystem-backed store.

use schemdiff::netlist::{NetFormat, Netlister};
use schemdiff::project::{MemoryStore, WorkingTree, load_project};
use schemdiff::vars::{GLOBAL, Variables, special};

const ROOT_UUID: &str = "11111111-1111-1111-1111-111111111111";
const SUB_UUID: &str = "22222222-2222-2222-2222-222222222222";

fn descriptor() -> String {
    r#"{
	"meta": { "filename": "amp.kicad_pro" },
	"sheets": [["r", ""], ["s", "filter"]],
	"text_variables": { "ASSEMBLY": "REV-C" }
}"#
    .to_owned()
}

fn root_page() -> String {
    format!(
        r#"(kicad_sch
	(version 20231120)
	(generator "eeschema")
	(uuid "{ROOT_UUID}")
	(paper "A4")
	(title_block (title "Amplifier") (rev "C"))
	(lib_symbols
		(symbol "Device:R"
			(property "Reference" "R")
			(symbol "R_1_1"
				(pin passive line (at 0 3.81 270) (length 1.27)
					(name "~") (number "1"))
				(pin passive line (at 0 -3.81 90) (length 1.27)
					(name "~") (number "2"))
			)
		)
	)
	(wire (pts (xy 50 50) (xy 50 53.81)) (uuid "w-out"))
	(wire (pts (xy 50 50) (xy 100 110)) (uuid "w-link"))
	(label "OUT" (at 50 50 0) (uuid "l-out"))
	(symbol (lib_id "Device:R") (at 50 57.62 0) (uuid "sym-r1")
		(property "Reference" "R1")
		(property "Value" "10k")
		(instances (project "amp" (path "/{ROOT_UUID}" (reference "R1") (unit 1))))
	)
	(sheet (at 100 100) (size 30 20) (uuid "sheet-filter")
		(property "Sheetname" "filter")
		(property "Sheetfile" "filter.kicad_sch")
		(pin "OUT" input (at 100 110 0) (uuid "pin-out"))
		(instances (project "amp" (path "/{ROOT_UUID}" (page "2"))))
	)
	(sheet_instances (path "/" (page "1")))
)
"#
    )
}

fn sub_page() -> String {
    format!(
        r#"(kicad_sch
	(version 20231120)
	(generator "eeschema")
	(uuid "{SUB_UUID}")
	(paper "A4")
	(lib_symbols
		(symbol "Device:C"
			(property "Reference" "C")
			(symbol "C_1_1"
				(pin passive line (at 0 3.81 270) (length 1.27)
					(name "~") (number "1"))
				(pin passive line (at 0 -3.81 90) (length 1.27)
					(name "~") (number "2"))
			)
		)
	)
	(hierarchical_label "OUT" (shape input) (at 20 16.19 0) (uuid "hl-out"))
	(wire (pts (xy 20 16.19) (xy 20 20)) (uuid "w-c"))
	(symbol (lib_id "Device:C") (at 20 23.81 0) (uuid "sym-c1")
		(property "Reference" "C1")
		(property "Value" "100n")
		(instances (project "amp" (path "/{ROOT_UUID}/sheet-filter" (reference "C1") (unit 1))))
	)
)
"#
    )
}

fn store() -> MemoryStore {
    let mut s = MemoryStore::new();
    s.insert("amp.kicad_pro", None, descriptor().into_bytes());
    s.insert("amp.kicad_sch", None, root_page().into_bytes());
    s.insert("filter.kicad_sch", None, sub_page().into_bytes());
    s
}

#[test]
fn hierarchy_traversal_and_toc() {
    let loaded = load_project(&store(), "amp.kicad_pro", None, true).expect("load");
    assert_eq!(loaded.pages.len(), 2);
    assert_eq!(loaded.instance_count(), 2);
    let toc = loaded.toc();
    assert_eq!(toc.len(), 1);
    assert_eq!(toc[0].children[0].name, "/filter");
    assert_eq!(toc[0].children[0].page, 2);
}

#[test]
fn variables_span_the_hierarchy() {
    let mut loaded = load_project(&store(), "amp.kicad_pro", None, true).expect("load");
    let mut vars = Variables::new();
    loaded.fill_vars(&mut vars);
    assert_eq!(vars.resolve(GLOBAL, special::PROJECTNAME), Some("amp".to_owned()));
    assert_eq!(vars.resolve(GLOBAL, "ASSEMBLY"), Some("REV-C".to_owned()));
    assert_eq!(vars.resolve(GLOBAL, special::PAGECOUNT), Some("2".to_owned()));
    // Title block visible from the root instance scope.
    let root_scope = format!("/{ROOT_UUID}");
    assert_eq!(vars.resolve(&root_scope, "TITLE"), Some("Amplifier".to_owned()));
    // Sub-page scope inherits the global project name.
    let sub_scope = format!("/{ROOT_UUID}/sheet-filter");
    assert_eq!(
        vars.expand(&sub_scope, "${PROJECTNAME} p${#}"),
        "amp p2".to_owned()
    );
    // Reference-scoped symbol variables.
    assert_eq!(vars.expand(GLOBAL, "${C1:Value}"), "100n");
}

#[test]
fn netlist_resolves_across_sheet_pin() {
    // S7 flavor: the OUT net spans the root page and the filter sub-sheet
    // through the sheet pin, picking the label name.
    let mut loaded = load_project(&store(), "amp.kicad_pro", None, true).expect("load");
    let mut netlister = Netlister::new();
    loaded.fill_netlist(&mut netlister);
    let compact = netlister.generate(NetFormat::Compact);
    let out_line = compact
        .lines()
        .find(|l| l.starts_with("/OUT: "))
        .unwrap_or_else(|| panic!("no OUT net in:\n{compact}"));
    assert!(out_line.contains("R1.1"), "{out_line}");
    assert!(out_line.contains("C1.1"), "{out_line}");
    // Determinism: a fresh run produces identical output.
    let mut loaded2 = load_project(&store(), "amp.kicad_pro", None, true).expect("load");
    let mut netlister2 = Netlister::new();
    loaded2.fill_netlist(&mut netlister2);
    assert_eq!(netlister2.generate(NetFormat::Compact), compact);
}

#[test]
fn net_vars_feed_back_into_expansion() {
    let mut loaded = load_project(&store(), "amp.kicad_pro", None, true).expect("load");
    let mut vars = Variables::new();
    loaded.fill_vars(&mut vars);
    let mut netlister = Netlister::new();
    loaded.fill_netlist(&mut netlister);
    netlister.fill_net_vars(&mut vars);
    assert_eq!(vars.expand(GLOBAL, "${R1:NET_NAME(1)}"), "/OUT");
    let label_scope = format!("/{ROOT_UUID}/l-out");
    assert_eq!(vars.resolve(&label_scope, special::NET_NAME), Some("/OUT".to_owned()));
    assert_eq!(
        vars.resolve(&label_scope, special::SHORT_NET_NAME),
        Some("OUT".to_owned())
    );
}

#[test]
fn working_tree_store_loads_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("amp.kicad_pro"), descriptor()).expect("write pro");
    std::fs::write(dir.path().join("amp.kicad_sch"), root_page()).expect("write root");
    std::fs::write(dir.path().join("filter.kicad_sch"), sub_page()).expect("write sub");
    let store = WorkingTree::new(dir.path());
    let loaded = load_project(&store, "amp.kicad_pro", None, true).expect("load");
    assert_eq!(loaded.pages.len(), 2);
}
