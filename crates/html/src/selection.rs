//! The document's native text selection.

use crate::range::{BoundaryPoint, DomRange};
use crate::Document;

/// Anchor is where the selection started (pointer down), focus is where it
/// currently ends (updated while dragging). Either may precede the other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    anchor: Option<BoundaryPoint>,
    focus: Option<BoundaryPoint>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<BoundaryPoint> {
        self.anchor
    }

    pub fn focus(&self) -> Option<BoundaryPoint> {
        self.focus
    }

    /// No selection at all counts as collapsed.
    pub fn is_collapsed(&self) -> bool {
        match (self.anchor, self.focus) {
            (Some(a), Some(f)) => a == f,
            _ => true,
        }
    }

    pub fn range_count(&self) -> usize {
        usize::from(self.anchor.is_some() && self.focus.is_some())
    }

    pub fn collapse(&mut self, point: BoundaryPoint) {
        self.anchor = Some(point);
        self.focus = Some(point);
    }

    /// Move the focus, keeping the anchor. Without an anchor this collapses.
    pub fn extend(&mut self, point: BoundaryPoint) {
        if self.anchor.is_none() {
            self.anchor = Some(point);
        }
        self.focus = Some(point);
    }

    pub fn set_base_and_extent(&mut self, anchor: BoundaryPoint, focus: BoundaryPoint) {
        self.anchor = Some(anchor);
        self.focus = Some(focus);
    }

    pub fn select_range(&mut self, range: DomRange) {
        self.set_base_and_extent(range.start, range.end);
    }

    pub fn remove_all_ranges(&mut self) {
        self.anchor = None;
        self.focus = None;
    }

    /// The selection as a forward range.
    pub fn range(&self, doc: &Document) -> Option<DomRange> {
        match (self.anchor, self.focus) {
            (Some(a), Some(f)) => Some(DomRange::ordered(doc, a, f)),
            _ => None,
        }
    }

    pub fn text(&self, doc: &Document) -> String {
        self.range(doc).map(|r| r.text(doc)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_is_collapsed() {
        let sel = Selection::new();
        assert!(sel.is_collapsed());
        assert_eq!(sel.range_count(), 0);
    }

    #[test]
    fn backward_drag_produces_forward_range() {
        let doc = Document::from_html("<p>hello world</p>");
        let p = doc.children(doc.root())[0];
        let t = doc.children(p)[0];
        let mut sel = Selection::new();
        sel.collapse(BoundaryPoint::new(t, 11));
        sel.extend(BoundaryPoint::new(t, 6));
        assert!(!sel.is_collapsed());
        assert_eq!(sel.text(&doc), "world");
        assert_eq!(sel.anchor().map(|a| a.offset), Some(11));
    }
}
