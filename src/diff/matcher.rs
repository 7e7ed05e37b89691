//! List matcher: pairs up entries of two ordered sequences under a distance
//! metric, tolerating reordering.
//!
//! Best case linear when the lists are near-identical (exact matches are
//! swept out on a cheap pass before any expensive distance is computed);
//! worst case quadratic. Output order is deterministic: ties in the
//! smallest-distance sweep break by lowest base index, then lowest other
//! index.

/// Result of matching `base` against `other`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListMatch {
    /// For each base position: the matched other-index, or `None` when the
    /// base entry was removed.
    pub base: Vec<Option<usize>>,
    /// Other positions with no base partner, in ascending order (additions).
    pub added: Vec<usize>,
}

/// Match two lists through a distance callback.
///
/// `dist(i, j, fast)` compares `base[i]` with `other[j]`; `0` means an exact
/// match, larger means less similar, `None` means the two are disparate and
/// must not pair. When `fast` is set the callback may return `1` for any
/// inequality and skip expensive analysis.
pub fn match_lists<D>(base_len: usize, other_len: usize, mut dist: D) -> ListMatch
where
    D: FnMut(usize, usize, bool) -> Option<u64>,
{
    let mut base_matches: Vec<Option<usize>> = vec![None; base_len];
    let mut other_matched = vec![false; other_len];
    let mut matrix: Vec<Option<Vec<Option<u64>>>> = Vec::with_capacity(base_len);

    // Pass 1: cheap distances; sweep out exact matches as they appear so
    // they never participate in the expensive pass.
    for i in 0..base_len {
        let mut row: Option<Vec<Option<u64>>> = Some(vec![None; other_len]);
        for j in 0..other_len {
            if other_matched[j] {
                continue;
            }
            let d = dist(i, j, true);
            if let Some(cells) = row.as_mut() {
                cells[j] = d;
            }
            if d == Some(0) {
                base_matches[i] = Some(j);
                other_matched[j] = true;
                row = None;
                for prev in matrix.iter_mut().flatten() {
                    prev[j] = None;
                }
                break;
            }
        }
        matrix.push(row);
    }

    // Pass 2: recompute surviving cells with the full metric, sweeping
    // fresh exact matches the same way.
    for i in 0..base_len {
        if matrix[i].is_none() {
            continue;
        }
        for j in 0..other_len {
            let live = matrix[i].as_ref().is_some_and(|row| row[j].is_some());
            if live {
                let d = dist(i, j, false);
                if let Some(row) = matrix[i].as_mut() {
                    row[j] = d;
                }
                if d == Some(0) {
                    base_matches[i] = Some(j);
                    other_matched[j] = true;
                    matrix[i] = None;
                    for (k, row) in matrix.iter_mut().enumerate() {
                        if k != i {
                            if let Some(cells) = row.as_mut() {
                                cells[j] = None;
                            }
                        }
                    }
                    break;
                }
            }
        }
    }

    // Pass 3: repeatedly take the smallest live cell (ties: lowest row,
    // then lowest column) until nothing is left.
    loop {
        let mut best: Option<(usize, usize, u64)> = None;
        for (i, row) in matrix.iter().enumerate() {
            let Some(cells) = row else { continue };
            for (j, cell) in cells.iter().enumerate() {
                let Some(d) = cell else { continue };
                if best.is_none_or(|(_, _, bd)| *d < bd) {
                    best = Some((i, j, *d));
                }
            }
        }
        let Some((i, j, _)) = best else { break };
        base_matches[i] = Some(j);
        other_matched[j] = true;
        matrix[i] = None;
        for row in matrix.iter_mut().flatten() {
            row[j] = None;
        }
    }

    let added = (0..other_len).filter(|j| !other_matched[*j]).collect();
    ListMatch {
        base: base_matches,
        added,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Distance between integers: absolute difference; negatives are
    /// disparate with non-negatives (stand-in for incompatible kinds).
    fn int_dist<'a>(base: &'a [i64], other: &'a [i64]) -> impl FnMut(usize, usize, bool) -> Option<u64> + 'a {
        move |i, j, fast| {
            let (a, b) = (base[i], other[j]);
            if (a < 0) != (b < 0) {
                return None;
            }
            if fast {
                return Some(u64::from(a != b));
            }
            Some(a.abs_diff(b))
        }
    }

    #[test]
    fn identical_lists_match_exactly() {
        let base = [1, 2, 3];
        let m = match_lists(3, 3, int_dist(&base, &base));
        assert_eq!(m.base, vec![Some(0), Some(1), Some(2)]);
        assert!(m.added.is_empty());
    }

    #[test]
    fn reordered_lists_still_pair() {
        let base = [1, 2, 3];
        let other = [3, 1, 2];
        let m = match_lists(3, 3, int_dist(&base, &other));
        assert_eq!(m.base, vec![Some(1), Some(2), Some(0)]);
        assert!(m.added.is_empty());
    }

    #[test]
    fn removals_leave_none() {
        let base = [1, 2, 3];
        let other = [1, 3];
        let m = match_lists(3, 2, int_dist(&base, &other));
        assert_eq!(m.base[0], Some(0));
        assert_eq!(m.base[2], Some(1));
        assert_eq!(m.base[1], None);
        assert!(m.added.is_empty());
    }

    #[test]
    fn additions_are_reported_ascending() {
        let base = [5];
        let other = [9, 5, 7];
        let m = match_lists(1, 3, int_dist(&base, &other));
        assert_eq!(m.base, vec![Some(1)]);
        assert_eq!(m.added, vec![0, 2]);
    }

    #[test]
    fn nearest_neighbours_pair_up() {
        let base = [10, 20];
        let other = [21, 11];
        let m = match_lists(2, 2, int_dist(&base, &other));
        assert_eq!(m.base, vec![Some(1), Some(0)]);
    }

    #[test]
    fn disparate_entries_never_pair() {
        let base = [1, -5];
        let other = [-5, 1];
        let m = match_lists(2, 2, int_dist(&base, &other));
        assert_eq!(m.base, vec![Some(1), Some(0)]);
    }

    #[test]
    fn all_disparate_means_remove_and_add() {
        let base = [1, 2];
        let other = [-1, -2];
        let m = match_lists(2, 2, int_dist(&base, &other));
        assert_eq!(m.base, vec![None, None]);
        assert_eq!(m.added, vec![0, 1]);
    }

    #[test]
    fn tie_breaks_by_lowest_row_then_column() {
        // Every pair is distance 1: expect (0,0) and (1,1).
        let m = match_lists(2, 2, |_, _, _| Some(1));
        assert_eq!(m.base, vec![Some(0), Some(1)]);
    }

    #[test]
    fn empty_lists() {
        let m = match_lists(0, 0, |_, _, _| Some(0));
        assert!(m.base.is_empty());
        assert!(m.added.is_empty());
    }

    #[test]
    fn stability_on_repeat_runs() {
        let base = [3, 1, 4, 1, 5];
        let other = [1, 5, 9, 2, 6];
        let a = match_lists(5, 5, int_dist(&base, &other));
        let b = match_lists(5, 5, int_dist(&base, &other));
        assert_eq!(a, b);
    }
}
