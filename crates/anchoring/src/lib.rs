//! Anchoring annotations to text: selectors, the range <-> selector codec
//! and the range helpers both directions rely on.

mod codec;
mod error;
pub mod range_utils;
mod selector;

pub use crate::codec::{
    AnchorOptions, PAGE_NUMBER_ATTR, anchor_selector, range_to_selector, range_to_selector_entry,
    reanchor_by_quote, revive_selector, revive_selectors, try_revive_selector,
};
pub use crate::error::AnchorError;
pub use crate::range_utils::{
    NOT_ANNOTATABLE_CLASS, annotatable_text, is_not_annotatable, is_whitespace_or_empty,
    merge_client_rects, split_annotatable_ranges, trim_range_to_container,
};
pub use crate::selector::{
    PagedSelector, Selector, TextQuote, TextSelector, has_live_ranges, is_revived, same_anchors,
};
