//! Mutable arena DOM with live ranges and a native selection.
//!
//! This is the document model text annotations anchor against: a tree of
//! element/text/comment nodes that can be mutated at any time, ranges that
//! can go stale when it is, and a mutation journal standing in for
//! `MutationObserver`.

mod document;
mod entities;
mod parser;
mod range;
mod selection;
pub mod text;
mod tokenizer;
pub mod traverse;
mod types;

pub use crate::document::Document;
pub use crate::parser::parse_html_into;
pub use crate::range::{BoundaryPoint, DomRange, compare_points};
pub use crate::selection::Selection;
pub use crate::tokenizer::{Token, tokenize};
pub use crate::types::{DomError, MutationKind, MutationRecord, NodeId, NodeKind};
