//! Live ranges over a [`Document`].
//!
//! A [`DomRange`] is a pair of boundary points. It does not track mutations:
//! callers check [`DomRange::is_live`] before trusting a stored range, which
//! is how annotation anchors decide whether they need re-anchoring.

use crate::text::char_slice;
use crate::traverse::TextNodes;
use crate::{Document, NodeId};
use std::cmp::Ordering;

/// `(node, offset)`; `offset` counts chars in text nodes and children in containers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub const fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Document-order comparison of two boundary points.
pub fn compare_points(doc: &Document, a: BoundaryPoint, b: BoundaryPoint) -> Ordering {
    if a.node == b.node {
        return a.offset.cmp(&b.offset);
    }
    if doc.contains(a.node, b.node) {
        // child of a.node that contains b.node
        let child_index = child_towards(doc, a.node, b.node);
        return if child_index < a.offset {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if doc.contains(b.node, a.node) {
        return compare_points(doc, b, a).reverse();
    }
    doc.tree_path(a.node).cmp(&doc.tree_path(b.node))
}

fn child_towards(doc: &Document, ancestor: NodeId, descendant: NodeId) -> usize {
    let mut cur = descendant;
    while let Some(parent) = doc.parent(cur) {
        if parent == ancestor {
            return doc.child_index(cur).unwrap_or(0);
        }
        cur = parent;
    }
    0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DomRange {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl DomRange {
    pub fn new(start: BoundaryPoint, end: BoundaryPoint) -> Self {
        Self { start, end }
    }

    pub fn collapsed_at(point: BoundaryPoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    /// Range covering all of `node`'s contents.
    pub fn select_node_contents(doc: &Document, node: NodeId) -> Self {
        Self {
            start: BoundaryPoint::new(node, 0),
            end: BoundaryPoint::new(node, doc.node_length(node)),
        }
    }

    /// Range around `node` itself, expressed in its parent.
    pub fn select_node(doc: &Document, node: NodeId) -> Option<Self> {
        let parent = doc.parent(node)?;
        let index = doc.child_index(node)?;
        Some(Self {
            start: BoundaryPoint::new(parent, index),
            end: BoundaryPoint::new(parent, index + 1),
        })
    }

    /// Range spanning two boundary points in whichever order they come.
    pub fn ordered(doc: &Document, a: BoundaryPoint, b: BoundaryPoint) -> Self {
        if compare_points(doc, a, b) == Ordering::Greater {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    #[inline]
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Both endpoints attached to the document and within their node's length.
    pub fn is_live(&self, doc: &Document) -> bool {
        [self.start, self.end].iter().all(|p| {
            doc.is_connected(p.node) && p.offset <= doc.node_length(p.node)
        }) && compare_points(doc, self.start, self.end) != Ordering::Greater
    }

    pub fn common_ancestor(&self, doc: &Document) -> NodeId {
        let end_chain = doc.ancestors(self.end.node);
        doc.ancestors(self.start.node)
            .into_iter()
            .find(|n| end_chain.contains(n))
            .unwrap_or_else(|| doc.root())
    }

    /// `true` if `point` lies within the range (inclusive ends).
    pub fn contains_point(&self, doc: &Document, point: BoundaryPoint) -> bool {
        compare_points(doc, self.start, point) != Ordering::Greater
            && compare_points(doc, point, self.end) != Ordering::Greater
    }

    /// `true` if any part of `node` is inside the range.
    pub fn intersects_node(&self, doc: &Document, node: NodeId) -> bool {
        let Some(parent) = doc.parent(node) else {
            return true;
        };
        let Some(index) = doc.child_index(node) else {
            return false;
        };
        compare_points(doc, BoundaryPoint::new(parent, index), self.end) == Ordering::Less
            && compare_points(doc, BoundaryPoint::new(parent, index + 1), self.start)
                == Ordering::Greater
    }

    /// Partially selected text: `(text node, start char, end char)` in document order.
    ///
    /// Empty intersections are omitted.
    pub fn text_segments(&self, doc: &Document) -> Vec<(NodeId, usize, usize)> {
        let mut out = Vec::new();
        if self.is_collapsed() {
            return out;
        }
        let scope = self.common_ancestor(doc);
        for t in TextNodes::new(doc, scope) {
            if let Some((s, e)) = self.text_overlap(doc, t) {
                out.push((t, s, e));
            }
        }
        out
    }

    /// The char interval of text node `t` covered by this range.
    pub fn text_overlap(&self, doc: &Document, t: NodeId) -> Option<(usize, usize)> {
        let len = doc.node_length(t);
        let s = if t == self.start.node {
            self.start.offset.min(len)
        } else if compare_points(doc, BoundaryPoint::new(t, 0), self.start) != Ordering::Less {
            0
        } else {
            return None;
        };
        let e = if t == self.end.node {
            self.end.offset.min(len)
        } else if compare_points(doc, BoundaryPoint::new(t, len), self.end) != Ordering::Greater {
            len
        } else {
            return None;
        };
        (s < e).then_some((s, e))
    }

    /// Text covered by the range (the `Range.toString()` analogue).
    pub fn text(&self, doc: &Document) -> String {
        let mut out = String::new();
        for (t, s, e) in self.text_segments(doc) {
            if let Some(text) = doc.text(t) {
                out.push_str(char_slice(text, s, e));
            }
        }
        out
    }
}
