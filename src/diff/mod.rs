//! Structural diff engine: difference records, the comparable contract,
//! list matching, target indexing, and the three-way merger.
//!
//! # Determinism guarantee
//!
//! Every algorithm in this module is deterministic given identical inputs:
//! matcher ties break by position, diff emission follows sorted group order,
//! and the merger's association scans conflicts in discovery order.

pub mod compare;
pub mod matcher;
pub mod target_index;
pub mod threeway;
pub mod types;

pub use compare::{ApplyOutcome, apply_diff, apply_list, apply_payload, diff_trees, nodes_equal};
pub use matcher::{ListMatch, match_lists};
pub use target_index::TargetIndex;
pub use threeway::{DiffPair, Side, Threeway, apply_selected, conflict_report, threeway};
pub use types::{ApplyMode, DiffId, DiffItem, DiffKey, DiffPayload, DiffSet};
