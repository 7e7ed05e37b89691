//! Three-way merge with conflict isolation.
//!
//! Given base, ours, and theirs trees of the same root kind, the merger:
//!
//! 1. diffs base→ours and base→theirs and flattens both to leaf lists;
//! 2. runs a trial merge on a clone of the state (tree + both diff sets
//!    clone together, so diff targets stay valid);
//! 3. classifies every theirs conflict into a pair by re-running the trial
//!    with that single theirs diff applied first and collecting the ours
//!    diffs that now conflict (unimportant diffs are forced important during
//!    association so they group with the conflicts they ride along with);
//! 4. merges pairs that share ours diffs, splits out pairs where one side is
//!    entirely unimportant (safe pairs), and either returns the safe diffs
//!    for a caller-driven resolution or applies them to base in place.
//!
//! # Determinism guarantee
//!
//! The same input triple always produces the same buckets: flattening order
//! follows the diff tree, association iterates conflicts in discovery
//! order, and pair merging scans pairs first-to-last.
//!
//! # Invariants
//!
//! - A leaf diff appears in exactly one output bucket.
//! - Applying every returned safe diff to base never conflicts.
//! - Applying at most one side of each conflict pair never conflicts.
//! - Unimportant diffs never surface alone as true conflicts.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::{SchemError, merge_invariant};
use crate::sexp::Tree;

use super::compare::{apply_diff, apply_list, diff_trees};
use super::types::{ApplyMode, DiffId, DiffSet};

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

/// A matched group of diffs from both sides.
///
/// For conflict pairs the caller may keep at most one side. For safe pairs
/// and safe singles both sides (at most one of which is non-empty or
/// redundant) can apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffPair {
    /// Member leaf diffs from the ours set.
    pub ours: Vec<DiffId>,
    /// Member leaf diffs from the theirs set.
    pub theirs: Vec<DiffId>,
}

/// Result of a three-way merge.
#[derive(Debug)]
pub struct Threeway {
    /// Diffs from base to ours (flags updated by any applies performed).
    pub ours: DiffSet,
    /// Diffs from base to theirs.
    pub theirs: DiffSet,
    /// Flattened ours leaves, in diff-tree order.
    pub ours_flat: Vec<DiffId>,
    /// Flattened theirs leaves.
    pub theirs_flat: Vec<DiffId>,
    /// Safe diffs (singles first, mutually-redundant pairs last). `None`
    /// when the merge applied them to base instead.
    pub safe: Option<Vec<DiffPair>>,
    /// True conflict pairs; resolution picks at most one side per pair.
    pub conflicts: Vec<DiffPair>,
}

/// Clone-together state for trial merges.
#[derive(Clone)]
struct State {
    tree: Tree,
    ours: DiffSet,
    theirs: DiffSet,
}

// ---------------------------------------------------------------------------
// threeway
// ---------------------------------------------------------------------------

/// Three-way merge of `base`, `ours`, and `theirs`.
///
/// With `return_safe` set, safe diffs are classified and returned instead of
/// applied, enabling an interactive resolution flow; otherwise every safe
/// diff is applied to `base` in place and only conflict pairs come back.
///
/// # Errors
///
/// [`SchemError::MergeInvariant`] when the trees are disparate or a trial
/// merge reaches a state that indicates a logic bug (ours conflicting with
/// itself, unimportant diffs conflicting on a fresh base).
pub fn threeway(
    base: &mut Tree,
    ours_tree: &Tree,
    theirs_tree: &Tree,
    return_safe: bool,
) -> Result<Threeway, SchemError> {
    let Some((mut ours_set, _)) = diff_trees(base, ours_tree) else {
        return Err(merge_invariant("base and ours trees are disparate"));
    };
    let Some((mut theirs_set, _)) = diff_trees(base, theirs_tree) else {
        return Err(merge_invariant("base and theirs trees are disparate"));
    };
    let ours_flat = ours_set.flatten_roots(&ours_set.roots().to_vec(), ApplyMode::ALL);
    let theirs_flat = theirs_set.flatten_roots(&theirs_set.roots().to_vec(), ApplyMode::ALL);
    debug!(
        ours = ours_flat.len(),
        theirs = theirs_flat.len(),
        "three-way merge"
    );

    let pristine = State {
        tree: base.clone(),
        ours: ours_set.clone(),
        theirs: theirs_set.clone(),
    };

    // Trial run: capture every theirs conflict. Unimportant theirs diffs are
    // forced important here so conflict groups come out complete; the
    // artificial ones are pulled back out below.
    let mut trial = pristine.clone();
    let ours_roots = trial.ours.roots().to_vec();
    let theirs_roots = trial.theirs.roots().to_vec();
    if !apply_list(&mut trial.tree, &mut trial.ours, &ours_roots, ApplyMode::IMPORTANT).is_empty() {
        return Err(merge_invariant("ours diffs conflicted on a fresh base"));
    }
    let mut conflict_ids = apply_list(
        &mut trial.tree,
        &mut trial.theirs,
        &theirs_roots,
        ApplyMode::IMPORTANT,
    );
    if !apply_list(&mut trial.tree, &mut trial.ours, &ours_roots, ApplyMode::UNIMPORTANT)
        .is_empty()
    {
        return Err(merge_invariant("unimportant ours diffs conflicted"));
    }
    conflict_ids.extend(apply_list(
        &mut trial.tree,
        &mut trial.theirs,
        &theirs_roots,
        ApplyMode::UNIMPORTANT | ApplyMode::FORCE_IMPORTANT,
    ));

    let theirs_index: HashMap<DiffId, usize> = theirs_flat
        .iter()
        .enumerate()
        .map(|(i, d)| (*d, i))
        .collect();
    let seeds: Vec<Pair> = conflict_ids
        .iter()
        .filter_map(|d| theirs_index.get(d))
        .map(|i| (BTreeSet::new(), BTreeSet::from([*i])))
        .collect();
    let pairs = determine_association(&pristine, &ours_flat, &theirs_flat, seeds, false)?;

    // Safe diffs are the leaves not captured by any pair.
    let dours_safe: Vec<usize> = (0..ours_flat.len())
        .filter(|i| pairs.iter().all(|p| !p.0.contains(i)))
        .collect();
    let dtheirs_safe: Vec<usize> = (0..theirs_flat.len())
        .filter(|i| pairs.iter().all(|p| !p.1.contains(i)))
        .collect();

    // Pairs where one whole side is unimportant are safe to take.
    let (mut safe_pairs, conflict_pairs): (Vec<Pair>, Vec<Pair>) =
        pairs.into_iter().partition(|p| {
            p.0.iter()
                .all(|i| ours_set.is_unimportant(ours_flat[*i], ApplyMode::ALL))
                || p.1
                    .iter()
                    .all(|i| theirs_set.is_unimportant(theirs_flat[*i], ApplyMode::ALL))
        });

    let to_pair = |p: &Pair| DiffPair {
        ours: p.0.iter().map(|i| ours_flat[*i]).collect(),
        theirs: p.1.iter().map(|i| theirs_flat[*i]).collect(),
    };
    let conflicts: Vec<DiffPair> = conflict_pairs.iter().map(|p| to_pair(p)).collect();
    debug!(
        conflicts = conflicts.len(),
        safe_pairs = safe_pairs.len(),
        "three-way classification done"
    );

    if return_safe {
        // Pair up mutually-redundant safe diffs so a resolution UI can
        // present the two sides together.
        let redundant_seeds: Vec<Pair> = (0..theirs_flat.len())
            .filter(|i| {
                trial.theirs.is_redundant(theirs_flat[*i]) && dtheirs_safe.contains(i)
            })
            .map(|i| (BTreeSet::new(), BTreeSet::from([i])))
            .collect();
        safe_pairs.extend(determine_association(
            &pristine,
            &ours_flat,
            &theirs_flat,
            redundant_seeds,
            true,
        )?);

        let mut safe: Vec<DiffPair> = Vec::new();
        for i in &dours_safe {
            if safe_pairs.iter().all(|p| !p.0.contains(i)) {
                safe.push(DiffPair {
                    ours: vec![ours_flat[*i]],
                    theirs: Vec::new(),
                });
            }
        }
        for i in &dtheirs_safe {
            if safe_pairs.iter().all(|p| !p.1.contains(i)) {
                safe.push(DiffPair {
                    ours: Vec::new(),
                    theirs: vec![theirs_flat[*i]],
                });
            }
        }
        // Redundant pairs come last; resolution flows read better that way.
        safe.extend(safe_pairs.iter().map(|p| to_pair(p)));
        return Ok(Threeway {
            ours: ours_set,
            theirs: theirs_set,
            ours_flat,
            theirs_flat,
            safe: Some(safe),
            conflicts,
        });
    }

    // Apply every safe diff to base: important leaves first across all
    // lists, then the unimportant remainder. Neither pass may conflict.
    let mut ordered: Vec<(Side, DiffId)> = Vec::new();
    for p in &safe_pairs {
        ordered.extend(p.0.iter().map(|i| (Side::Ours, ours_flat[*i])));
        ordered.extend(p.1.iter().map(|i| (Side::Theirs, theirs_flat[*i])));
    }
    ordered.extend(dours_safe.iter().map(|i| (Side::Ours, ours_flat[*i])));
    ordered.extend(dtheirs_safe.iter().map(|i| (Side::Theirs, theirs_flat[*i])));
    for mode in [ApplyMode::IMPORTANT, ApplyMode::UNIMPORTANT] {
        for (side, id) in &ordered {
            let set = match side {
                Side::Ours => &mut ours_set,
                Side::Theirs => &mut theirs_set,
            };
            if !apply_diff(base, set, *id, mode).is_empty() {
                return Err(merge_invariant("safe diffs conflicted while applying"));
            }
        }
    }

    Ok(Threeway {
        ours: ours_set,
        theirs: theirs_set,
        ours_flat,
        theirs_flat,
        safe: None,
        conflicts,
    })
}

type Pair = (BTreeSet<usize>, BTreeSet<usize>);

/// Test-apply seeded pairs to find the ours diffs associated with each
/// theirs diff.
///
/// Every seed holds exactly one theirs index. For each, the pristine state
/// is cloned, the theirs diff applied alone, and all ours diffs applied
/// force-important; the ours diffs that now conflict (or, when
/// `associate_redundant` is set, turn redundant) belong to the pair. Pairs
/// sharing ours indices merge into the earliest such pair.
fn determine_association(
    pristine: &State,
    ours_flat: &[DiffId],
    theirs_flat: &[DiffId],
    mut pairs: Vec<Pair>,
    associate_redundant: bool,
) -> Result<Vec<Pair>, SchemError> {
    for idx in 0..pairs.len() {
        let Some(theirs_idx) = pairs[idx].1.pop_first() else {
            continue;
        };
        let mut ours_indices = std::mem::take(&mut pairs[idx].0);
        if associate_redundant {
            // Equivalence is much cheaper than a trial apply; try it first.
            for (i, ours_id) in ours_flat.iter().enumerate() {
                if pristine
                    .theirs
                    .redundant_with(theirs_flat[theirs_idx], &pristine.ours, *ours_id)
                {
                    ours_indices.insert(i);
                }
            }
        }
        if ours_indices.is_empty() {
            let mut copy = pristine.clone();
            if !apply_diff(
                &mut copy.tree,
                &mut copy.theirs,
                theirs_flat[theirs_idx],
                ApplyMode::ALL,
            )
            .is_empty()
            {
                return Err(merge_invariant("theirs diff conflicted on a fresh base"));
            }
            let ours_roots = copy.ours.roots().to_vec();
            let conflicts = apply_list(
                &mut copy.tree,
                &mut copy.ours,
                &ours_roots,
                ApplyMode::FORCE_ALL,
            );
            if associate_redundant {
                for (i, ours_id) in ours_flat.iter().enumerate() {
                    if copy.ours.is_redundant(*ours_id) {
                        ours_indices.insert(i);
                    }
                }
                if ours_indices.is_empty() && conflicts.is_empty() {
                    // Nothing on our side relates: a theirs-only redundancy.
                    pairs[idx].1.insert(theirs_idx);
                    continue;
                }
            } else if conflicts.is_empty() {
                return Err(merge_invariant(
                    "no ours diffs associated with a theirs conflict",
                ));
            } else {
                let ours_index: HashMap<DiffId, usize> = ours_flat
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (*d, i))
                    .collect();
                for c in &conflicts {
                    if let Some(i) = ours_index.get(c) {
                        ours_indices.insert(*i);
                    }
                }
            }
        }
        // Merge into the first pair sharing any ours index (self included).
        pairs[idx].0 = ours_indices.clone();
        let mut merged = false;
        for pair in &mut pairs {
            if pair.0.is_disjoint(&ours_indices) {
                continue;
            }
            pair.0.extend(ours_indices.iter().copied());
            pair.1.insert(theirs_idx);
            merged = true;
            break;
        }
        if !merged {
            return Err(merge_invariant(
                "conflict association produced an orphan pair",
            ));
        }
    }
    Ok(pairs.into_iter().filter(|p| !p.1.is_empty()).collect())
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Which diff set a pair member came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Side {
    Ours,
    Theirs,
}

/// Apply a user's resolution: every safe and conflict diff except the
/// rejected ones.
///
/// The caller must reject at least one whole side of each true conflict
/// pair; keeping both sides makes the apply conflict, which reports as an
/// error rather than corrupting the tree.
///
/// # Errors
///
/// [`SchemError::MergeInvariant`] when the selection still conflicts.
pub fn apply_selected(
    base: &mut Tree,
    out: &mut Threeway,
    rejected_ours: &BTreeSet<DiffId>,
    rejected_theirs: &BTreeSet<DiffId>,
) -> Result<(), SchemError> {
    let mut ordered: Vec<(Side, DiffId)> = Vec::new();
    let mut push_pair = |ordered: &mut Vec<(Side, DiffId)>, pair: &DiffPair| {
        for d in &pair.ours {
            if !rejected_ours.contains(d) {
                ordered.push((Side::Ours, *d));
            }
        }
        for d in &pair.theirs {
            if !rejected_theirs.contains(d) {
                ordered.push((Side::Theirs, *d));
            }
        }
    };
    if let Some(safe) = &out.safe {
        for pair in safe {
            push_pair(&mut ordered, pair);
        }
    }
    for pair in &out.conflicts {
        push_pair(&mut ordered, pair);
    }
    for mode in [ApplyMode::IMPORTANT, ApplyMode::UNIMPORTANT] {
        for (side, id) in &ordered {
            let set = match side {
                Side::Ours => &mut out.ours,
                Side::Theirs => &mut out.theirs,
            };
            if !apply_diff(base, set, *id, mode).is_empty() {
                return Err(merge_invariant("conflicting diffs selected"));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Conflict report
// ---------------------------------------------------------------------------

/// Human-readable dump of conflict pairs for non-interactive flows.
#[must_use]
pub fn conflict_report(tree: &Tree, out: &Threeway) -> String {
    if out.conflicts.is_empty() {
        return String::new();
    }
    let bar = "=".repeat(35);
    let mut blocks = Vec::new();
    for pair in &out.conflicts {
        let mut lines = vec![format!("{bar} CONFLICT {bar}")];
        for d in &pair.ours {
            lines.push(format!("  OURS: {}", out.ours.describe(*d, tree)));
        }
        for d in &pair.theirs {
            lines.push(format!("THEIRS: {}", out.theirs.describe(*d, tree)));
        }
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
