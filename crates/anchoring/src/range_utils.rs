//! Helpers for turning a raw user selection into annotatable ranges and for
//! cleaning up the rectangles the layout reports for them.

use core_types::Rect;
use html::{BoundaryPoint, Document, DomRange, NodeId, compare_points};
use std::cmp::Ordering;

/// Elements carrying this class (and their subtrees) never get annotated.
pub const NOT_ANNOTATABLE_CLASS: &str = "not-annotatable";

pub fn is_not_annotatable(doc: &Document, node: NodeId) -> bool {
    doc.closest_with_class(node, NOT_ANNOTATABLE_CLASS)
        .is_some()
}

/// Text of `range` outside `not-annotatable` elements.
pub fn annotatable_text(doc: &Document, range: &DomRange) -> String {
    let mut out = String::new();
    for (t, s, e) in range.text_segments(doc) {
        if is_not_annotatable(doc, t) {
            continue;
        }
        if let Some(text) = doc.text(t) {
            out.push_str(html::text::char_slice(text, s, e));
        }
    }
    out
}

pub fn is_whitespace_or_empty(doc: &Document, range: &DomRange) -> bool {
    html::text::is_blank(&range.text(doc))
}

/// Clamp `range` to the contents of `container`.
///
/// An endpoint outside the container moves to the container's start or end.
pub fn trim_range_to_container(doc: &Document, range: &DomRange, container: NodeId) -> DomRange {
    let mut trimmed = *range;
    if !doc.contains(container, trimmed.start.node) {
        trimmed.start = BoundaryPoint::new(container, 0);
    }
    if !doc.contains(container, trimmed.end.node) {
        trimmed.end = BoundaryPoint::new(container, doc.node_length(container));
    }
    if compare_points(doc, trimmed.start, trimmed.end) == Ordering::Greater {
        trimmed.start = trimmed.end;
    }
    trimmed
}

/// Split `range` into one sub-range per maximal run of annotatable text.
///
/// Sub-ranges start and end on text nodes. Pieces that are only whitespace
/// are dropped, so the result may be empty.
pub fn split_annotatable_ranges(
    doc: &Document,
    range: &DomRange,
    container: NodeId,
) -> Vec<DomRange> {
    let range = trim_range_to_container(doc, range, container);
    let mut out = Vec::new();
    let mut current: Option<DomRange> = None;

    for (t, s, e) in range.text_segments(doc) {
        if is_not_annotatable(doc, t) {
            if let Some(piece) = current.take() {
                out.push(piece);
            }
            continue;
        }
        let end = BoundaryPoint::new(t, e);
        match current.as_mut() {
            Some(piece) => piece.end = end,
            None => current = Some(DomRange::new(BoundaryPoint::new(t, s), end)),
        }
    }
    out.extend(current);
    out.retain(|r| !is_whitespace_or_empty(doc, r));
    out
}

const LINE_TOLERANCE: f32 = 1.0;

fn contains_within(outer: &Rect, inner: &Rect) -> bool {
    inner.x >= outer.x - LINE_TOLERANCE
        && inner.y >= outer.y - LINE_TOLERANCE
        && inner.right() <= outer.right() + LINE_TOLERANCE
        && inner.bottom() <= outer.bottom() + LINE_TOLERANCE
}

fn same_line(a: &Rect, b: &Rect) -> bool {
    (a.y - b.y).abs() <= LINE_TOLERANCE && (a.bottom() - b.bottom()).abs() <= LINE_TOLERANCE
}

fn touches_horizontally(a: &Rect, b: &Rect) -> bool {
    a.x <= b.right() + LINE_TOLERANCE && b.x <= a.right() + LINE_TOLERANCE
}

fn merge_pair(a: &Rect, b: &Rect) -> Option<Rect> {
    if contains_within(a, b) {
        Some(*a)
    } else if contains_within(b, a) {
        Some(*b)
    } else if same_line(a, b) && touches_horizontally(a, b) {
        Some(a.union(b))
    } else {
        None
    }
}

/// Collapse per-node client rects into as few rects as possible.
///
/// Empty rects are dropped, rects inside another are absorbed, and rects on
/// the same line that overlap or touch are unioned. Repeats until stable.
pub fn merge_client_rects(rects: &[Rect]) -> Vec<Rect> {
    let mut merged: Vec<Rect> = rects.iter().copied().filter(|r| !r.is_empty()).collect();
    loop {
        let mut changed = false;
        'scan: for i in 0..merged.len() {
            for j in (i + 1)..merged.len() {
                if let Some(m) = merge_pair(&merged[i], &merged[j]) {
                    merged[i] = m;
                    merged.remove(j);
                    changed = true;
                    break 'scan;
                }
            }
        }
        if !changed {
            return merged;
        }
    }
}
