//! schemdiff library crate: structural diff, three-way merge, and netlisting
//! for s-expression schematic projects.
//!
//! The crate is organized leaves-first:
//!
//! - [`sexp`]: value/node model (arena-backed), parser, printer.
//! - [`model`]: semantic class registry and typed accessors over raw nodes.
//! - [`diff`]: difference records, the comparable contract, the list
//!   matcher, and the three-way merger.
//! - [`vars`]: hierarchical named-value lookup with cycle detection.
//! - [`netlist`]: union-find connectivity resolution and net naming.
//! - [`project`]: project descriptor loading and sheet-graph traversal.
//! - [`render`]: the draw-stage interface consumed by rendering collaborators.
//! - [`keywords`]: grammar-dictionary self-test harness.
//!
//! The primary interface is the `schemdiff` CLI binary; the library surface
//! exists so integration tests and external front-ends can drive the engine
//! directly.

pub mod diff;
pub mod error;
pub mod keywords;
pub mod model;
pub mod netlist;
pub mod project;
pub mod render;
pub mod sexp;
pub mod vars;
