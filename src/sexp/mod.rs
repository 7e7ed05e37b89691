//! S-expression data model, parser, and printer.
//!
//! [`parse`] turns source bytes into an arena-backed [`Tree`]; [`print_file`]
//! reproduces them under the layout policy. The round-trip is byte-exact for
//! well-formed inputs (see the printer module for the policy details).

pub mod node;
pub mod parse;
pub mod print;
pub mod value;

pub use node::{Child, DetachedChild, DetachedNode, NodeId, Tree};
pub use parse::parse;
pub use print::{print_file, print_node};
pub use value::{Atom, Decimal, Value};
