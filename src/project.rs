//! Project loading: descriptor parsing, sheet-graph traversal, and the
//! orchestration of variable and netlist fills across page instances.
//!
//! A project descriptor is a JSON file naming the root schematic; pages are
//! fetched through a [`VersionStore`], so the same loader serves working
//! trees, archives, and version-control backends without knowing their
//! protocol.
//!
//! Traversal starts at the project's root schematic and follows every sheet
//! child's referenced file. Each reached page instance carries a sheet path
//! built from ancestor sheet identities; declared instances that cannot be
//! followed back to the project root are pruned as stale.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::diff::{nodes_equal, threeway};
use crate::error::SchemError;
use crate::model::schematic::{
    self, check_version, fill_page_netlist, fill_page_vars, page_sheets, root_path, sheet_file,
    sheet_name,
};
use crate::netlist::Netlister;
use crate::sexp::{Tree, parse, print_file};
use crate::vars::{GLOBAL, Variables, special};

// ---------------------------------------------------------------------------
// Version store
// ---------------------------------------------------------------------------

/// Abstract "load a named version of a named file" contract. The core never
/// embeds a source-control protocol.
pub trait VersionStore {
    /// Fetch the bytes of `path` at `version` (`None` = current).
    ///
    /// # Errors
    ///
    /// I/O errors bubble to the loader, which treats them per its strict
    /// mode.
    fn open(&self, path: &str, version: Option<&str>) -> std::io::Result<Vec<u8>>;
}

/// Version store over the plain filesystem. Version tokens are not
/// supported here; a version-control front-end supplies its own store.
#[derive(Clone, Debug)]
pub struct WorkingTree {
    root: PathBuf,
}

impl WorkingTree {
    /// Store rooted at a directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl VersionStore for WorkingTree {
    fn open(&self, path: &str, version: Option<&str>) -> std::io::Result<Vec<u8>> {
        if version.is_some() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "working-tree store cannot resolve version tokens",
            ));
        }
        std::fs::read(self.root.join(path))
    }
}

/// In-memory store, keyed by `(version, path)` with a versionless fallback.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    files: BTreeMap<(Option<String>, String), Vec<u8>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert file bytes at a version.
    pub fn insert(&mut self, path: &str, version: Option<&str>, bytes: impl Into<Vec<u8>>) {
        self.files
            .insert((version.map(ToOwned::to_owned), path.to_owned()), bytes.into());
    }
}

impl VersionStore for MemoryStore {
    fn open(&self, path: &str, version: Option<&str>) -> std::io::Result<Vec<u8>> {
        let exact = (version.map(ToOwned::to_owned), path.to_owned());
        self.files
            .get(&exact)
            .or_else(|| self.files.get(&(None, path.to_owned())))
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Project descriptor
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
struct DescriptorMeta {
    filename: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct SchematicSettings {
    #[serde(default)]
    page_layout_descr_file: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct Descriptor {
    meta: DescriptorMeta,
    #[serde(default)]
    sheets: Vec<serde_json::Value>,
    #[serde(default)]
    text_variables: BTreeMap<String, String>,
    #[serde(default)]
    schematic: SchematicSettings,
}

/// A parsed project descriptor.
#[derive(Clone, Debug)]
pub struct Project {
    descriptor: Descriptor,
    fname: String,
}

impl Project {
    /// Decode the JSON descriptor.
    ///
    /// # Errors
    ///
    /// [`SchemError::Descriptor`] on malformed JSON or a missing `meta`.
    pub fn from_json(bytes: &[u8], fname: &str) -> Result<Self, SchemError> {
        let descriptor: Descriptor =
            serde_json::from_slice(bytes).map_err(|e| SchemError::Descriptor {
                path: Some(PathBuf::from(fname)),
                detail: e.to_string(),
            })?;
        Ok(Self {
            descriptor,
            fname: fname.to_owned(),
        })
    }

    /// Project name: descriptor filename without its extension.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor
            .meta
            .filename
            .strip_suffix(".kicad_pro")
            .unwrap_or(&self.descriptor.meta.filename)
    }

    /// Page count declared in the descriptor's sheet list.
    #[must_use]
    pub fn declared_sheet_count(&self) -> usize {
        self.descriptor.sheets.len()
    }

    /// Project-level text variables.
    #[must_use]
    pub fn text_variables(&self) -> &BTreeMap<String, String> {
        &self.descriptor.text_variables
    }

    /// Configured worksheet path, when any.
    #[must_use]
    pub fn worksheet_path(&self) -> Option<&str> {
        self.descriptor
            .schematic
            .page_layout_descr_file
            .as_deref()
            .filter(|p| !p.is_empty())
    }

    /// Directory of the descriptor, project-relative.
    #[must_use]
    pub fn dir(&self) -> &str {
        self.fname.rfind('/').map_or("", |i| &self.fname[..i])
    }
}

// ---------------------------------------------------------------------------
// Documents and page records
// ---------------------------------------------------------------------------

/// One parsed page file.
#[derive(Clone, Debug)]
pub struct Document {
    pub tree: Tree,
    pub fname: String,
    pub version: i64,
}

/// Parse page bytes, gating on the supported version range.
///
/// # Errors
///
/// Parse errors, version errors, or a root that is not a schematic page.
pub fn load_page(bytes: &[u8], fname: &str) -> Result<Document, SchemError> {
    let text = String::from_utf8_lossy(bytes);
    let tree = parse(&text)?;
    if tree.node_type(tree.root()).is_none_or(|t| t != "kicad_sch") {
        return Err(SchemError::Descriptor {
            path: Some(PathBuf::from(fname)),
            detail: "root expression is not a schematic page".to_owned(),
        });
    }
    let version = check_version(&tree)?;
    Ok(Document {
        tree,
        fname: fname.to_owned(),
        version,
    })
}

/// Serialize a page back to its on-disk form.
#[must_use]
pub fn save_page(doc: &Document) -> String {
    print_file(&doc.tree, doc.tree.root())
}

/// Refresh the date slot to the write time. Call when serializing merge
/// results so downstream rendering reflects the write, not the load.
pub fn record_write_time(vars: &mut Variables) {
    vars.define(
        GLOBAL,
        special::CURRENT_DATE,
        chrono::Local::now().date_naive().to_string(),
    );
}

/// One visitation of a page through the sheet hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetInstance {
    /// `/`-separated chain of sheet identities.
    pub path: String,
    /// Page number from the instance bookkeeping.
    pub page: i64,
    /// Human sheet path (`/` for the root, `/sub/inner` below).
    pub display: String,
    /// Identity of the sheet element (or the page itself for the root).
    pub sheet_uuid: String,
}

/// A page file with every instance it appears as.
#[derive(Debug)]
pub struct PageRecord {
    /// Project-relative file path.
    pub file: String,
    /// Instances, in discovery order.
    pub instances: Vec<SheetInstance>,
    /// The parsed tree, or `None` when the page failed to load (non-strict
    /// mode).
    pub doc: Option<Document>,
}

/// A fully traversed project.
#[derive(Debug)]
pub struct LoadedProject {
    pub project: Project,
    /// Pages in discovery order (root first).
    pub pages: Vec<PageRecord>,
    pub root_file: String,
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

struct RawSheetRef {
    parent_path: String,
    sheet_uuid: String,
    name: String,
    page: i64,
    file: String,
}

/// Load a project and traverse its sheet graph.
///
/// In non-strict mode a page that fails to fetch or parse is recorded with
/// no tree and reported in the log; strict mode propagates the failure.
///
/// # Errors
///
/// Descriptor decode failures always propagate; page failures propagate
/// only under `strict`.
pub fn load_project(
    store: &dyn VersionStore,
    project_path: &str,
    version: Option<&str>,
    strict: bool,
) -> Result<LoadedProject, SchemError> {
    let bytes = store.open(project_path, version)?;
    let project = Project::from_json(&bytes, project_path)?;
    let dir = project.dir().to_owned();
    let join = |dir: &str, f: &str| {
        if dir.is_empty() {
            f.to_owned()
        } else {
            format!("{dir}/{f}")
        }
    };
    let root_file = join(&dir, &format!("{}.kicad_sch", project.name()));

    let mut pages: Vec<PageRecord> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut raw_refs: Vec<RawSheetRef> = Vec::new();
    let mut to_load = vec![root_file.clone()];
    let mut root_instance: Option<SheetInstance> = None;

    while let Some(file) = to_load.pop() {
        if index.contains_key(&file) {
            continue;
        }
        debug!(file = %file, "loading page");
        let doc = match store
            .open(&file, version)
            .map_err(SchemError::from)
            .and_then(|bytes| load_page(&bytes, &file))
        {
            Ok(doc) => Some(doc),
            Err(err) if strict => return Err(err),
            Err(err) => {
                warn!(file = %file, error = %err, "unable to load page");
                None
            }
        };
        if let Some(doc) = &doc {
            let tree = &doc.tree;
            if file == root_file {
                let uuid = tree
                    .explicit_identity(tree.root())
                    .unwrap_or_else(|| "root".to_owned());
                let page_no = root_path(tree, tree.root())
                    .and_then(|p| tree.get_value(p, "page"))
                    .map_or(0, |v| v.text().parse().unwrap_or(0));
                root_instance = Some(SheetInstance {
                    path: format!("/{uuid}"),
                    page: page_no,
                    display: "/".to_owned(),
                    sheet_uuid: uuid,
                });
            }
            let page_dir = file.rfind('/').map_or("", |i| &file[..i]).to_owned();
            for (parent_path, sheet) in page_sheets(tree, tree.root(), Some(project.name())) {
                let Some(sheet_filename) = sheet_file(tree, sheet) else {
                    continue;
                };
                let target = join(&page_dir, &sheet_filename);
                let sheet_uuid = tree
                    .explicit_identity(sheet)
                    .unwrap_or_else(|| sheet_filename.clone());
                let page_no =
                    schematic::instance_data(tree, sheet, Some(project.name()), &parent_path, "page")
                        .map_or(0, |v| v.text().parse().unwrap_or(0));
                raw_refs.push(RawSheetRef {
                    parent_path,
                    sheet_uuid,
                    name: sheet_name(tree, sheet).unwrap_or_default(),
                    page: page_no,
                    file: target.clone(),
                });
                if !index.contains_key(&target) && !to_load.contains(&target) {
                    to_load.push(target);
                }
            }
        }
        index.insert(file.clone(), pages.len());
        pages.push(PageRecord {
            file,
            instances: Vec::new(),
            doc,
        });
    }

    // Attach the root instance.
    let root_instance = root_instance.unwrap_or(SheetInstance {
        path: "/root".to_owned(),
        page: 0,
        display: "/".to_owned(),
        sheet_uuid: "root".to_owned(),
    });
    if let Some(i) = index.get(&root_file) {
        pages[*i].instances.push(root_instance.clone());
    }

    // Resolve declared instances to the root, pruning stale paths. Each
    // pass places the refs whose parent became reachable.
    let mut known: BTreeMap<String, String> = BTreeMap::new();
    known.insert(root_instance.path.clone(), String::new());
    let mut placed = vec![false; raw_refs.len()];
    let mut pruned = 0_usize;
    loop {
        let mut progress = false;
        for (i, raw) in raw_refs.iter().enumerate() {
            if placed[i] || !known.contains_key(&raw.parent_path) {
                continue;
            }
            placed[i] = true;
            progress = true;
            let path = format!("{}/{}", raw.parent_path, raw.sheet_uuid);
            let parent_display = known
                .get(&raw.parent_path)
                .cloned()
                .unwrap_or_default();
            let display = format!("{parent_display}/{}", raw.name);
            known.insert(path.clone(), display.clone());
            if let Some(idx) = index.get(&raw.file) {
                pages[*idx].instances.push(SheetInstance {
                    path,
                    page: raw.page,
                    display,
                    sheet_uuid: raw.sheet_uuid.clone(),
                });
            }
        }
        if !progress {
            break;
        }
    }
    for (i, raw) in raw_refs.iter().enumerate() {
        if !placed[i] {
            pruned += 1;
            warn!(
                parent = %raw.parent_path,
                sheet = %raw.sheet_uuid,
                "pruning instance not reachable from the project root"
            );
        }
    }
    debug!(
        pages = pages.len(),
        instances = pages.iter().map(|p| p.instances.len()).sum::<usize>(),
        pruned,
        "project traversal done"
    );

    Ok(LoadedProject {
        project,
        pages,
        root_file,
    })
}

impl LoadedProject {
    /// Total page-instance count.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.pages.iter().map(|p| p.instances.len()).sum()
    }

    /// Populate project, page, and instance variables.
    pub fn fill_vars(&mut self, vars: &mut Variables) {
        vars.define(
            GLOBAL,
            special::CURRENT_DATE,
            chrono::Local::now().date_naive().to_string(),
        );
        vars.define(GLOBAL, special::PROJECTNAME, self.project.name());
        for (key, value) in self.project.text_variables().clone() {
            vars.define(GLOBAL, &key, value);
        }
        vars.define(GLOBAL, special::PAGECOUNT, self.instance_count().to_string());
        let project_name = self.project.name().to_owned();
        let root_file = self.root_file.clone();
        for record in &mut self.pages {
            let Some(doc) = record.doc.as_mut() else {
                continue;
            };
            for inst in &record.instances {
                vars.define(&inst.path, special::PAGENO, inst.page.to_string());
                fill_page_vars(
                    &mut doc.tree,
                    vars,
                    &inst.path,
                    &doc.fname,
                    record.file == root_file,
                    Some(&project_name),
                );
            }
        }
    }

    /// Register every page instance's connectivity and resolve the netlist.
    pub fn fill_netlist(&mut self, netlister: &mut Netlister) {
        let project_name = self.project.name().to_owned();
        for record in &mut self.pages {
            let Some(doc) = record.doc.as_mut() else {
                continue;
            };
            for inst in &record.instances {
                fill_page_netlist(
                    &mut doc.tree,
                    netlister,
                    &inst.path,
                    &inst.display,
                    Some(&project_name),
                );
            }
        }
        netlister.resolve();
    }

    /// Table of contents: instance tree sorted by (page, name) per level.
    #[must_use]
    pub fn toc(&self) -> Vec<TocEntry> {
        let mut all: Vec<(String, TocEntry)> = Vec::new();
        for record in &self.pages {
            for inst in &record.instances {
                all.push((
                    inst.path.clone(),
                    TocEntry {
                        page: inst.page,
                        name: inst.display.clone(),
                        path: inst.path.clone(),
                        file: record.file.clone(),
                        children: Vec::new(),
                    },
                ));
            }
        }
        let mut by_path: BTreeMap<String, TocEntry> = BTreeMap::new();
        for (path, entry) in all {
            by_path.insert(path, entry);
        }
        // Descending path order visits children before their parents, so
        // subtrees are complete when they attach.
        let paths: Vec<String> = by_path.keys().rev().cloned().collect();
        for path in paths {
            let Some(parent) = path.rfind('/').map(|i| path[..i].to_owned()) else {
                continue;
            };
            if parent.is_empty() || !by_path.contains_key(&parent) {
                continue;
            }
            if let Some(entry) = by_path.remove(&path) {
                if let Some(p) = by_path.get_mut(&parent) {
                    p.children.push(entry);
                }
            }
        }
        let mut roots: Vec<TocEntry> = by_path.into_values().collect();
        sort_toc(&mut roots);
        roots
    }
}

/// One table-of-contents entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub page: i64,
    pub name: String,
    pub path: String,
    pub file: String,
    pub children: Vec<TocEntry>,
}

fn sort_toc(entries: &mut Vec<TocEntry>) {
    entries.sort_by(|a, b| (a.page, &a.name).cmp(&(b.page, &b.name)));
    for e in entries {
        sort_toc(&mut e.children);
    }
}

// ---------------------------------------------------------------------------
// Three-way triage
// ---------------------------------------------------------------------------

/// Resolution class of a file triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriageState {
    /// Nobody diverged (or both sides made the same change); any side works.
    OutOfDate,
    /// Only ours changed; pick ours.
    Ours,
    /// Only theirs changed; pick theirs.
    Theirs,
    /// Both changed but the merge is automatic. `base` now holds the merge.
    Both,
    /// Both changed with true conflicts.
    Conflict,
}

/// Classify a base/ours/theirs triple, merging into `base` when possible.
///
/// # Errors
///
/// Propagates merge invariant violations from the three-way engine.
pub fn classify_three_way(
    base: &mut Tree,
    ours: &Tree,
    theirs: &Tree,
) -> Result<TriageState, SchemError> {
    let base_is_ours = nodes_equal(base, base.root(), ours, ours.root());
    let base_is_theirs = nodes_equal(base, base.root(), theirs, theirs.root());
    if base_is_ours {
        return Ok(if base_is_theirs {
            TriageState::OutOfDate
        } else {
            TriageState::Theirs
        });
    }
    if nodes_equal(ours, ours.root(), theirs, theirs.root()) {
        return Ok(TriageState::OutOfDate);
    }
    if base_is_theirs {
        return Ok(TriageState::Ours);
    }
    let out = threeway(base, ours, theirs, false)?;
    Ok(if out.conflicts.is_empty() {
        TriageState::Both
    } else {
        TriageState::Conflict
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_UUID: &str = "aaaaaaaa-0000-0000-0000-000000000000";
    const SUB_UUID: &str = "bbbbbbbb-0000-0000-0000-000000000000";

    fn descriptor() -> &'static str {
        r#"{
			"meta": { "filename": "demo.kicad_pro" },
			"sheets": [["a", ""], ["b", "sub"]],
			"text_variables": { "BOARD": "X1" },
			"schematic": { "page_layout_descr_file": "" }
		}"#
    }

    fn root_page() -> String {
        format!(
            r#"(kicad_sch
	(version 20231120)
	(generator "eeschema")
	(uuid "{ROOT_UUID}")
	(label "TOP" (at 0 0 0) (uuid "l1"))
	(sheet (at 10 10) (size 20 10) (uuid "sheet-1")
		(property "Sheetname" "sub")
		(property "Sheetfile" "sub.kicad_sch")
		(instances (project "demo" (path "/{ROOT_UUID}" (page "2"))))
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
	(hierarchical_label "IN" (shape input) (at 0 0 0) (uuid "h1"))
)
"#
        )
    }

    fn store() -> MemoryStore {
        let mut s = MemoryStore::new();
        s.insert("demo.kicad_pro", None, descriptor().as_bytes().to_vec());
        s.insert("demo.kicad_sch", None, root_page().into_bytes());
        s.insert("sub.kicad_sch", None, sub_page().into_bytes());
        s
    }

    #[test]
    fn descriptor_parses() {
        let p = Project::from_json(descriptor().as_bytes(), "demo.kicad_pro").expect("json");
        assert_eq!(p.name(), "demo");
        assert_eq!(p.declared_sheet_count(), 2);
        assert_eq!(p.text_variables().get("BOARD").map(String::as_str), Some("X1"));
        assert_eq!(p.worksheet_path(), None);
    }

    #[test]
    fn bad_descriptor_is_error() {
        let err = Project::from_json(b"{]", "x.kicad_pro").expect_err("must fail");
        assert!(matches!(err, SchemError::Descriptor { .. }));
    }

    #[test]
    fn traversal_reaches_subsheet() {
        let loaded = load_project(&store(), "demo.kicad_pro", None, true).expect("load");
        assert_eq!(loaded.pages.len(), 2);
        assert_eq!(loaded.pages[0].file, "demo.kicad_sch");
        assert_eq!(loaded.pages[1].file, "sub.kicad_sch");
        assert_eq!(loaded.instance_count(), 2);
        let sub = &loaded.pages[1].instances[0];
        assert_eq!(sub.path, format!("/{ROOT_UUID}/sheet-1"));
        assert_eq!(sub.display, "/sub");
        assert_eq!(sub.page, 2);
    }

    #[test]
    fn stale_instances_are_pruned() {
        let mut s = store();
        // A sheet declaring a parent path that cannot be reached.
        let stale = format!(
            r#"(kicad_sch
	(version 20231120)
	(uuid "{ROOT_UUID}")
	(sheet (at 0 0) (size 1 1) (uuid "sheet-1")
		(property "Sheetname" "sub")
		(property "Sheetfile" "sub.kicad_sch")
		(instances (project "demo" (path "/dddddddd-9999-0000-0000-000000000000" (page "7"))))
	)
	(sheet_instances (path "/" (page "1")))
)
"#
        );
        s.insert("demo.kicad_sch", None, stale.into_bytes());
        let loaded = load_project(&s, "demo.kicad_pro", None, true).expect("load");
        // The sub page file loads, but its stale instance is dropped.
        assert_eq!(loaded.pages.len(), 2);
        assert!(loaded.pages[1].instances.is_empty());
    }

    #[test]
    fn missing_page_nonstrict_records_hole() {
        let mut s = MemoryStore::new();
        s.insert("demo.kicad_pro", None, descriptor().as_bytes().to_vec());
        s.insert("demo.kicad_sch", None, root_page().into_bytes());
        // sub.kicad_sch is absent.
        let loaded = load_project(&s, "demo.kicad_pro", None, false).expect("load");
        assert_eq!(loaded.pages.len(), 2);
        assert!(loaded.pages[1].doc.is_none());
        // Strict mode refuses.
        assert!(load_project(&s, "demo.kicad_pro", None, true).is_err());
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut s = store();
        s.insert(
            "sub.kicad_sch",
            None,
            format!("(kicad_sch (version 19990000) (uuid \"{SUB_UUID}\"))\n").into_bytes(),
        );
        let err = load_project(&s, "demo.kicad_pro", None, true).expect_err("must fail");
        assert!(matches!(err, SchemError::UnsupportedVersion { .. }));
    }

    #[test]
    fn fill_vars_defines_project_slots() {
        let mut loaded = load_project(&store(), "demo.kicad_pro", None, true).expect("load");
        let mut vars = Variables::new();
        loaded.fill_vars(&mut vars);
        assert_eq!(vars.resolve(GLOBAL, special::PROJECTNAME), Some("demo".to_owned()));
        assert_eq!(vars.resolve(GLOBAL, "BOARD"), Some("X1".to_owned()));
        assert_eq!(vars.resolve(GLOBAL, special::PAGECOUNT), Some("2".to_owned()));
        assert!(vars.resolve(GLOBAL, special::CURRENT_DATE).is_some());
        let sub_scope = format!("/{ROOT_UUID}/sheet-1");
        assert_eq!(vars.resolve(&sub_scope, special::PAGENO), Some("2".to_owned()));
    }

    #[test]
    fn netlist_runs_over_all_instances() {
        let mut loaded = load_project(&store(), "demo.kicad_pro", None, true).expect("load");
        let mut netlister = Netlister::new();
        loaded.fill_netlist(&mut netlister);
        // No pins anywhere: empty netlist, but resolution must not panic.
        assert_eq!(netlister.generate(crate::netlist::NetFormat::Compact), "");
    }

    #[test]
    fn toc_is_sorted_hierarchy() {
        let loaded = load_project(&store(), "demo.kicad_pro", None, true).expect("load");
        let toc = loaded.toc();
        assert_eq!(toc.len(), 1, "one root entry");
        assert_eq!(toc[0].name, "/");
        assert_eq!(toc[0].children.len(), 1);
        assert_eq!(toc[0].children[0].name, "/sub");
        assert_eq!(toc[0].children[0].page, 2);
    }

    #[test]
    fn save_roundtrips_loaded_page() {
        let loaded = load_project(&store(), "demo.kicad_pro", None, true).expect("load");
        let doc = loaded.pages[0].doc.as_ref().expect("root doc");
        let out = save_page(doc);
        let reparsed = parse(&out).expect("printed page parses");
        assert!(nodes_equal(&doc.tree, doc.tree.root(), &reparsed, reparsed.root()));
        // The printed form is a fixed point of the layout policy.
        assert_eq!(print_file(&reparsed, reparsed.root()), out);
    }

    #[test]
    fn triage_states() {
        let t = |src: &str| parse(src).expect("parse");
        let mut base = t("(x (v 0))");
        assert_eq!(
            classify_three_way(&mut base, &t("(x (v 0))"), &t("(x (v 0))")).expect("ok"),
            TriageState::OutOfDate
        );
        let mut base = t("(x (v 0))");
        assert_eq!(
            classify_three_way(&mut base, &t("(x (v 1))"), &t("(x (v 0))")).expect("ok"),
            TriageState::Ours
        );
        let mut base = t("(x (v 0))");
        assert_eq!(
            classify_three_way(&mut base, &t("(x (v 0))"), &t("(x (v 2))")).expect("ok"),
            TriageState::Theirs
        );
        let mut base = t("(x (v 0))");
        assert_eq!(
            classify_three_way(&mut base, &t("(x (v 1))"), &t("(x (v 1))")).expect("ok"),
            TriageState::OutOfDate
        );
        let mut base = t("(x (v 0) (w 0))");
        assert_eq!(
            classify_three_way(&mut base, &t("(x (v 1) (w 0))"), &t("(x (v 0) (w 2))"))
                .expect("ok"),
            TriageState::Both
        );
        let expected = t("(x (v 1) (w 2))");
        assert!(nodes_equal(&base, base.root(), &expected, expected.root()));
        let mut base = t("(x (v 0))");
        assert_eq!(
            classify_three_way(&mut base, &t("(x (v 1))"), &t("(x (v 2))")).expect("ok"),
            TriageState::Conflict
        );
    }
}
