//! Grammar-dictionary self-test harness.
//!
//! External plaintext files enumerate the grammar's recognized atoms (one
//! per line) for the schematic, symbol, and worksheet file kinds. The
//! harness reports every dictionary atom that neither the class registry
//! nor any typed accessor consumes: a release gate against silently
//! ignored grammar.

use std::path::Path;

use crate::model::{Scope, is_consumed};

/// Atoms present in a dictionary that no code consumes, sorted.
#[must_use]
pub fn unconsumed(dictionary: &str, scope: Scope) -> Vec<String> {
    let mut atoms: Vec<String> = dictionary
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect();
    atoms.sort();
    atoms.dedup();
    atoms
        .into_iter()
        .filter(|a| !is_consumed(a, scope))
        .collect()
}

/// Load a dictionary file and report unconsumed atoms.
///
/// # Errors
///
/// Propagates I/O errors from reading the dictionary.
pub fn check_dictionary_file(path: &Path, scope: Scope) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(unconsumed(&text, scope))
}

/// Pick the dictionary scope from a file name
/// (`schematic.keywords` / `symbol.keywords` / `worksheet.keywords`).
#[must_use]
pub fn scope_for_file(path: &Path) -> Scope {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if name.contains("sym") {
        Scope::Symbol
    } else if name.contains("wks") || name.contains("worksheet") || name.contains("drawing") {
        Scope::Worksheet
    } else {
        Scope::Schematic
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
