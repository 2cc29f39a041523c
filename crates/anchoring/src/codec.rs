//! Converting between live DOM ranges and serialisable selectors.
//!
//! Offsets count chars of annotatable text (text outside any
//! `not-annotatable` element) under the offset reference. The reference is
//! the container unless a closer ancestor carries the configured class, or
//! the range sits on a page (`data-page-number`).

use crate::error::AnchorError;
use crate::range_utils::NOT_ANNOTATABLE_CLASS;
use crate::selector::{PagedSelector, Selector, TextQuote, TextSelector};
use html::text::{char_len, char_slice};
use html::traverse::FilteredTextNodes;
use html::{BoundaryPoint, Document, DomRange, NodeId, compare_points};
use std::cmp::Ordering;

pub const PAGE_NUMBER_ATTR: &str = "data-page-number";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnchorOptions {
    /// Class of the element offsets are counted from, instead of the container.
    pub offset_reference_class: Option<String>,
    /// Chars of prefix/suffix context stored with the quote. 0 stores none.
    pub context_len: usize,
    /// Relocate by quote when offsets no longer point at the quoted text.
    pub quote_fallback: bool,
}

struct TextEntry {
    node: NodeId,
    base: usize,
    len: usize,
}

/// Annotatable text under one reference node, flattened.
struct TextIndex {
    entries: Vec<TextEntry>,
    text: String,
    total: usize,
}

impl TextIndex {
    fn build(doc: &Document, reference: NodeId) -> Self {
        let mut entries = Vec::new();
        let mut text = String::new();
        let mut total = 0;
        let skip = |d: &Document, n: NodeId| d.has_class(n, NOT_ANNOTATABLE_CLASS);
        for node in FilteredTextNodes::new(doc, reference, skip) {
            let s = doc.text(node).unwrap_or_default();
            let len = char_len(s);
            entries.push(TextEntry {
                node,
                base: total,
                len,
            });
            text.push_str(s);
            total += len;
        }
        Self {
            entries,
            text,
            total,
        }
    }

    /// Annotatable chars between the reference start and `point`.
    fn offset_of(&self, doc: &Document, point: BoundaryPoint) -> usize {
        let mut offset = 0;
        for entry in &self.entries {
            if entry.node == point.node {
                return entry.base + point.offset.min(entry.len);
            }
            if compare_points(doc, BoundaryPoint::new(entry.node, 0), point) != Ordering::Less {
                break;
            }
            offset = entry.base + entry.len;
        }
        offset
    }

    /// Boundary point for a global offset. `prefer_next` picks the start of
    /// the following node when `offset` falls exactly between two nodes.
    fn point_at(&self, offset: usize, prefer_next: bool) -> Option<BoundaryPoint> {
        let hit = if prefer_next {
            self.entries
                .iter()
                .find(|e| offset >= e.base && offset < e.base + e.len)
        } else {
            self.entries
                .iter()
                .find(|e| offset > e.base && offset <= e.base + e.len)
        };
        hit.or_else(|| {
            self.entries
                .iter()
                .rev()
                .find(|e| offset == e.base + e.len)
        })
        .map(|e| BoundaryPoint::new(e.node, offset - e.base))
    }

    fn range(&self, start: usize, end: usize) -> Option<DomRange> {
        Some(DomRange::new(
            self.point_at(start, true)?,
            self.point_at(end, false)?,
        ))
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        char_slice(&self.text, start, end)
    }
}

fn page_of(doc: &Document, node: NodeId, container: NodeId) -> Option<(NodeId, u32)> {
    let page = doc.closest(node, |d, n| d.attribute(n, PAGE_NUMBER_ATTR).is_some())?;
    if !doc.contains(container, page) {
        return None;
    }
    let number = doc.attribute(page, PAGE_NUMBER_ATTR)?.trim().parse().ok()?;
    Some((page, number))
}

fn offset_reference(
    doc: &Document,
    range: &DomRange,
    container: NodeId,
    opts: &AnchorOptions,
) -> NodeId {
    opts.offset_reference_class
        .as_deref()
        .and_then(|class| doc.closest_with_class(range.start.node, class))
        .filter(|r| doc.contains(container, *r))
        .unwrap_or(container)
}

fn selector_relative_to(
    doc: &Document,
    range: &DomRange,
    reference: NodeId,
    context_len: usize,
) -> TextSelector {
    let index = TextIndex::build(doc, reference);
    let start = index.offset_of(doc, range.start);
    let end = index.offset_of(doc, range.end).max(start);
    let exact = index.slice(start, end).to_string();

    let context = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let (prefix, suffix) = if context_len == 0 {
        (None, None)
    } else {
        (
            context(index.slice(start.saturating_sub(context_len), start)),
            context(index.slice(end, (end + context_len).min(index.total))),
        )
    };

    TextSelector {
        quote: TextQuote {
            exact,
            prefix,
            suffix,
        },
        start,
        end,
        range: Some(*range),
        offset_reference: Some(reference),
    }
}

/// Encode `range` as a text selector relative to its offset reference.
pub fn range_to_selector(
    doc: &Document,
    range: &DomRange,
    container: NodeId,
    opts: &AnchorOptions,
) -> TextSelector {
    let reference = offset_reference(doc, range, container, opts);
    selector_relative_to(doc, range, reference, opts.context_len)
}

/// Like [`range_to_selector`], but produces a paged selector when the range
/// starts inside a page element.
pub fn range_to_selector_entry(
    doc: &Document,
    range: &DomRange,
    container: NodeId,
    opts: &AnchorOptions,
) -> Selector {
    match page_of(doc, range.start.node, container) {
        Some((page, page_number)) => Selector::Paged(PagedSelector {
            page_number,
            selector: selector_relative_to(doc, range, page, opts.context_len),
        }),
        None => Selector::Text(range_to_selector(doc, range, container, opts)),
    }
}

fn resolve_reference(
    doc: &Document,
    selector: &TextSelector,
    container: NodeId,
) -> NodeId {
    selector
        .offset_reference
        .filter(|r| doc.is_connected(*r) && doc.contains(container, *r))
        .unwrap_or(container)
}

fn locate(
    doc: &Document,
    selector: &TextSelector,
    reference: NodeId,
    opts: &AnchorOptions,
) -> Result<(DomRange, usize, usize), AnchorError> {
    let TextSelector { start, end, .. } = *selector;
    if start > end {
        return Err(AnchorError::InvalidOffsets { start, end });
    }
    let index = TextIndex::build(doc, reference);
    if index.entries.is_empty() {
        return Err(AnchorError::NoText(reference));
    }

    let exact = selector.quote.exact.as_str();
    if end <= index.total {
        let found = index.slice(start, end);
        if found == exact || exact.is_empty() {
            let range = index
                .range(start, end)
                .ok_or(AnchorError::OutOfBounds { end, length: index.total })?;
            return Ok((range, start, end));
        }
        if !opts.quote_fallback {
            log::warn!(
                target: "anchoring",
                "quote mismatch at {start}..{end}: expected {exact:?}, found {found:?}"
            );
            let range = index
                .range(start, end)
                .ok_or(AnchorError::OutOfBounds { end, length: index.total })?;
            return Ok((range, start, end));
        }
    } else if !opts.quote_fallback {
        return Err(AnchorError::OutOfBounds {
            end,
            length: index.total,
        });
    }

    let (s, e) = find_quote(&index, &selector.quote, start)
        .ok_or_else(|| AnchorError::QuoteNotFound(exact.to_string()))?;
    log::debug!(target: "anchoring", "re-anchored {exact:?} from {start} to {s} by quote");
    let range = index
        .range(s, e)
        .ok_or(AnchorError::OutOfBounds { end: e, length: index.total })?;
    Ok((range, s, e))
}

/// Best occurrence of `quote` in the index: context matches first, then
/// closeness to `hint`.
fn find_quote(index: &TextIndex, quote: &TextQuote, hint: usize) -> Option<(usize, usize)> {
    if quote.exact.is_empty() {
        return None;
    }
    let len = char_len(&quote.exact);
    index
        .text
        .match_indices(quote.exact.as_str())
        .map(|(byte, _)| {
            let s = char_len(&index.text[..byte]);
            (s, s + len)
        })
        .max_by_key(|&(s, e)| {
            let prefix_ok = quote
                .prefix
                .as_deref()
                .is_some_and(|p| index.slice(s.saturating_sub(char_len(p)), s) == p);
            let suffix_ok = quote
                .suffix
                .as_deref()
                .is_some_and(|p| index.slice(e, (e + char_len(p)).min(index.total)) == p);
            let context = u8::from(prefix_ok) + u8::from(suffix_ok);
            (context, std::cmp::Reverse(s.abs_diff(hint)))
        })
}

fn reference_for(
    doc: &Document,
    selector: &Selector,
    container: NodeId,
) -> Result<NodeId, AnchorError> {
    match selector {
        Selector::Text(s) => Ok(resolve_reference(doc, s, container)),
        Selector::Paged(p) => doc
            .find_by_attribute(container, PAGE_NUMBER_ATTR, &p.page_number.to_string())
            .ok_or(AnchorError::PageNotFound(p.page_number)),
    }
}

/// Resolve a selector to a live range.
pub fn try_revive_selector(
    doc: &Document,
    selector: &Selector,
    container: NodeId,
    opts: &AnchorOptions,
) -> Result<DomRange, AnchorError> {
    let reference = reference_for(doc, selector, container)?;
    locate(doc, selector.text(), reference, opts).map(|(range, _, _)| range)
}

/// Attach a live range to `selector`, or say why it cannot be anchored.
///
/// Selectors whose live range still covers the quote come back unchanged.
/// Offsets are rewritten when the quote fallback relocated the text.
pub fn anchor_selector(
    doc: &Document,
    selector: &Selector,
    container: NodeId,
    opts: &AnchorOptions,
) -> Result<Selector, AnchorError> {
    if selector.is_revived(doc) {
        return Ok(selector.clone());
    }
    let reference = reference_for(doc, selector, container)?;
    let (range, start, end) = locate(doc, selector.text(), reference, opts)?;
    let mut revived = selector.clone();
    let text = revived.text_mut();
    text.range = Some(range);
    text.offset_reference = Some(reference);
    text.start = start;
    text.end = end;
    Ok(revived)
}

/// Like [`anchor_selector`], but a failure is logged and the selector comes
/// back unchanged and unrevived.
pub fn revive_selector(
    doc: &Document,
    selector: &Selector,
    container: NodeId,
    opts: &AnchorOptions,
) -> Selector {
    anchor_selector(doc, selector, container, opts).unwrap_or_else(|err| {
        log::warn!(target: "anchoring", "could not revive selector {:?}: {err}", selector.quote());
        selector.clone()
    })
}

pub fn revive_selectors(
    doc: &Document,
    selectors: &[Selector],
    container: NodeId,
    opts: &AnchorOptions,
) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| revive_selector(doc, s, container, opts))
        .collect()
}

/// Find the quoted text again after the DOM changed under the offsets.
pub fn reanchor_by_quote(
    doc: &Document,
    selector: &Selector,
    container: NodeId,
) -> Result<DomRange, AnchorError> {
    let reference = reference_for(doc, selector, container)?;
    let index = TextIndex::build(doc, reference);
    let text = selector.text();
    let (s, e) = find_quote(&index, &text.quote, text.start)
        .ok_or_else(|| AnchorError::QuoteNotFound(text.quote.exact.clone()))?;
    index.range(s, e).ok_or(AnchorError::OutOfBounds {
        end: e,
        length: index.total,
    })
}
