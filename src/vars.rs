//! Hierarchical named-value lookup with cycle detection.
//!
//! A variable is a `name → text` binding stored in a *scope*. Scopes are
//! identified by a `/`-joined identity path (`""` is global); lookup walks
//! from the deepest scope toward the root until a binding is found.
//!
//! Text expansion substitutes `${name}` and `${scope:name}` references
//! recursively. A `(scope, name)` pair visited twice within one resolution
//! climbs to the parent scope instead of recursing forever; references that
//! never resolve expand to themselves, preserving the original text.
//!
//! Names match case-sensitively first; every definition also records an
//! upper-cased fallback key.
//!
//! The engine does not compute the reserved special variables (page
//! numbers, net names, project metadata, and so on). The project loader and the
//! netlister populate those slots before any expansion runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Reserved slot names populated by collaborating subsystems.
pub mod special {
    /// Current page number (project loader).
    pub const PAGENO: &str = "#";
    /// Total page count (project loader).
    pub const PAGECOUNT: &str = "##";
    /// Date of rendering/writing (project loader).
    pub const CURRENT_DATE: &str = "CURRENT_DATE";
    /// Project name (project loader).
    pub const PROJECTNAME: &str = "PROJECTNAME";
    /// Page file name (page walk).
    pub const FILENAME: &str = "FILENAME";
    /// Page file path (page walk).
    pub const FILEPATH: &str = "FILEPATH";
    /// Current sheet path, ending in a slash (page walk).
    pub const SHEETPATH: &str = "SHEETPATH";
    /// Label connection type (label walk).
    pub const CONNECTION_TYPE: &str = "CONNECTION_TYPE";
    /// Canonical net name of the connected net (netlister).
    pub const NET_NAME: &str = "NET_NAME";
    /// Net class of the connected net (netlister).
    pub const NET_CLASS: &str = "NET_CLASS";
    /// Local net name of the connected net (netlister).
    pub const SHORT_NET_NAME: &str = "SHORT_NET_NAME";
    /// Operating point placeholder.
    pub const OP: &str = "OP";
}

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+:)?([^}]+)\}").unwrap_or_else(|e| panic!("variable regex: {e}"))
});

/// The global scope.
pub const GLOBAL: &str = "";

/// Scoped variable table.
#[derive(Clone, Debug, Default)]
pub struct Variables {
    /// Scope path → binding table. Missing names defer up the hierarchy.
    contexts: BTreeMap<String, BTreeMap<String, String>>,
}

impl Variables {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name` in `scope`. Also records an upper-cased fallback key
    /// (first definition wins for the fallback).
    pub fn define(&mut self, scope: &str, name: &str, value: impl Into<String>) {
        let value = value.into();
        let table = self.contexts.entry(scope.to_owned()).or_default();
        table.insert(name.to_owned(), value.clone());
        table.entry(name.to_uppercase()).or_insert(value);
    }

    /// Expand every `${[scope:]name}` reference in `text`, recursively.
    /// Unresolved references stay verbatim.
    #[must_use]
    pub fn expand(&self, scope: &str, text: &str) -> String {
        self.expand_inner(scope, text, None)
    }

    /// Resolve one variable from `scope`, walking toward the global scope.
    /// Returns `None` when no binding is found anywhere on the path.
    #[must_use]
    pub fn resolve(&self, scope: &str, variable: &str) -> Option<String> {
        let mut hist = HashSet::new();
        let (scope, variable) = match variable.split_once(':') {
            Some((s, v)) => (s, v),
            None => (scope, variable),
        };
        self.resolve_inner(scope, variable, &mut hist)
    }

    /// Substitute the references in `text`. With `hist` present (a nested
    /// expansion inside one resolution chain) the history is shared so
    /// intra-chain cycles are caught; at the top level every reference gets
    /// a fresh history, so `${A} ${A}` resolves both times instead of the
    /// second sibling reading as a cycle.
    fn expand_inner(
        &self,
        scope: &str,
        text: &str,
        hist: Option<&mut HashSet<(String, String)>>,
    ) -> String {
        let mut chain = hist;
        VAR_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let scope = caps
                    .get(1)
                    .map_or(scope, |m| m.as_str().trim_end_matches(':'));
                let name = &caps[2];
                let resolved = match chain.as_deref_mut() {
                    Some(h) => self.resolve_inner(scope, name, h),
                    None => {
                        let mut fresh = HashSet::new();
                        self.resolve_inner(scope, name, &mut fresh)
                    }
                };
                resolved.unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }

    fn resolve_inner(
        &self,
        scope: &str,
        variable: &str,
        hist: &mut HashSet<(String, String)>,
    ) -> Option<String> {
        let mut context = self.canonical_scope(scope);
        loop {
            let entry = (context.clone(), variable.to_owned());
            // A repeat visit means a cycle: climb instead of recursing.
            if hist.insert(entry) {
                if let Some(table) = self.contexts.get(&context) {
                    let resolved = table
                        .get(variable)
                        .or_else(|| table.get(&variable.to_uppercase()));
                    if let Some(value) = resolved {
                        let expanded = self.expand_inner(&context, value, Some(hist));
                        if variable == "INTERSHEET_REFS" {
                            return Some(normalize_page_list(&expanded));
                        }
                        return Some(expanded);
                    }
                }
            }
            if context.is_empty() {
                return None;
            }
            context = parent_scope(&context);
        }
    }

    /// A bare 36-character scope is a single identity; find the deepest
    /// known scope path ending in it.
    fn canonical_scope(&self, scope: &str) -> String {
        if scope.len() == 36 && !self.contexts.contains_key(scope) {
            if let Some(hit) = self
                .contexts
                .keys()
                .filter(|k| k.ends_with(scope))
                .min()
                .cloned()
            {
                return hit;
            }
        }
        scope.to_owned()
    }
}

fn parent_scope(scope: &str) -> String {
    scope.rfind('/').map_or(String::new(), |i| scope[..i].to_owned())
}

/// Page lists must come out unique and numerically sorted; anything
/// non-numeric collapses to empty. Deduplication is on the written form,
/// so distinct spellings of the same number both survive.
fn normalize_page_list(expanded: &str) -> String {
    let mut pages: Vec<&str> = Vec::new();
    for part in expanded.split(',') {
        if part.parse::<i64>().is_err() {
            return String::new();
        }
        if !pages.contains(&part) {
            pages.push(part);
        }
    }
    pages.sort_by_key(|p| (p.parse::<i64>().unwrap_or(0), *p));
    pages.join(",")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
