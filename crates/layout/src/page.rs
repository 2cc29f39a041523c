use crate::TextMeasurer;
use crate::flow::LayoutTree;
use crate::hit_test::caret_at;
use core_types::{Point, Rect};
use html::{BoundaryPoint, Document, DomRange, NodeId, Selection};
use std::cell::RefCell;
use std::rc::Rc;

/// The window: its size and how far the document is scrolled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

struct CachedLayout {
    version: u64,
    width: f32,
    tree: Rc<LayoutTree>,
}

/// A document shown in a window.
///
/// Geometry queries answer in client coordinates (relative to the viewport's
/// top-left), like `getBoundingClientRect`. Layout is recomputed lazily when
/// the document version or the viewport width changes.
pub struct Page {
    document: Document,
    selection: Selection,
    measurer: Box<dyn TextMeasurer>,
    viewport: Viewport,
    cache: RefCell<Option<CachedLayout>>,
}

impl Page {
    pub fn new(
        document: Document,
        measurer: impl TextMeasurer + 'static,
        width: f32,
        height: f32,
    ) -> Self {
        Self {
            document,
            selection: Selection::new(),
            measurer: Box::new(measurer),
            viewport: Viewport {
                width,
                height,
                ..Viewport::default()
            },
            cache: RefCell::new(None),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport.width = width;
        self.viewport.height = height;
        self.clamp_scroll();
    }

    /// Scroll the window, clamped to the scrollable area.
    pub fn scroll_to(&mut self, x: f32, y: f32) {
        self.viewport.scroll_x = x;
        self.viewport.scroll_y = y;
        self.clamp_scroll();
    }

    pub fn scroll_by(&mut self, dx: f32, dy: f32) {
        self.scroll_to(self.viewport.scroll_x + dx, self.viewport.scroll_y + dy);
    }

    fn clamp_scroll(&mut self) {
        let tree = self.layout();
        let max_x = (tree.width() - self.viewport.width).max(0.0);
        let max_y = (tree.content_height() - self.viewport.height).max(0.0);
        self.viewport.scroll_x = self.viewport.scroll_x.clamp(0.0, max_x);
        self.viewport.scroll_y = self.viewport.scroll_y.clamp(0.0, max_y);
    }

    pub fn layout(&self) -> Rc<LayoutTree> {
        let version = self.document.version();
        let width = self.viewport.width;
        let mut cache = self.cache.borrow_mut();
        if let Some(cached) = cache.as_ref()
            && cached.version == version
            && cached.width == width
        {
            return Rc::clone(&cached.tree);
        }
        let tree = Rc::new(LayoutTree::build(&self.document, self.measurer.as_ref(), width));
        *cache = Some(CachedLayout {
            version,
            width,
            tree: Rc::clone(&tree),
        });
        tree
    }

    pub fn content_height(&self) -> f32 {
        self.layout().content_height()
    }

    fn to_client(&self, rect: Rect) -> Rect {
        rect.translate(-self.viewport.scroll_x, -self.viewport.scroll_y)
    }

    /// One rect per line fragment of the range's text, in client coordinates.
    pub fn client_rects(&self, range: &DomRange) -> Vec<Rect> {
        let tree = self.layout();
        range
            .text_segments(&self.document)
            .into_iter()
            .flat_map(|(t, s, e)| tree.text_rects(t, s, e))
            .map(|r| self.to_client(r))
            .collect()
    }

    /// A zero rect at the scroll origin when `node` has no box.
    pub fn bounding_client_rect(&self, node: NodeId) -> Rect {
        let tree = self.layout();
        let rect = tree
            .node_rect(&self.document, node)
            .unwrap_or_default();
        self.to_client(rect)
    }

    pub fn caret_from_client_point(&self, x: f32, y: f32) -> Option<BoundaryPoint> {
        let tree = self.layout();
        caret_at(
            &tree,
            Point::new(x + self.viewport.scroll_x, y + self.viewport.scroll_y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedWidthMeasurer;

    fn page(markup: &str) -> Page {
        Page::new(
            Document::from_html(markup),
            FixedWidthMeasurer::new(10.0, 20.0),
            200.0,
            40.0,
        )
    }

    #[test]
    fn client_rects_follow_scroll() {
        let mut page = page("<p>a</p><p>b</p><p>c</p><p>d</p>");
        let t = page.document().children(page.document().children(page.document().root())[2])[0];
        let range = DomRange::select_node_contents(page.document(), t);
        assert_eq!(page.client_rects(&range), vec![Rect::new(0.0, 40.0, 10.0, 20.0)]);
        page.scroll_to(0.0, 30.0);
        assert_eq!(page.client_rects(&range), vec![Rect::new(0.0, 10.0, 10.0, 20.0)]);
    }

    #[test]
    fn scroll_is_clamped() {
        let mut page = page("<p>a</p><p>b</p><p>c</p>");
        page.scroll_to(0.0, 500.0);
        assert_eq!(page.viewport().scroll_y, 20.0);
        page.scroll_by(0.0, -100.0);
        assert_eq!(page.viewport().scroll_y, 0.0);
    }

    #[test]
    fn layout_is_cached_until_the_document_changes() {
        let mut page = page("<p>abc</p>");
        let first = page.layout();
        assert!(Rc::ptr_eq(&first, &page.layout()));
        let p = page.document().children(page.document().root())[0];
        page.document_mut().set_text_content(p, "abcdef").unwrap();
        assert!(!Rc::ptr_eq(&first, &page.layout()));
    }

    #[test]
    fn resize_rewraps() {
        let mut page = page("<p>aaaa bbbb</p>");
        assert_eq!(page.content_height(), 20.0);
        page.resize(60.0, 40.0);
        assert_eq!(page.content_height(), 40.0);
    }

    #[test]
    fn caret_accounts_for_scroll() {
        let mut page = page("<p>a</p><p>b</p><p>c</p>");
        page.scroll_to(0.0, 20.0);
        let root = page.document().root();
        let t = page.document().children(page.document().children(root)[1])[0];
        assert_eq!(page.caret_from_client_point(0.0, 5.0), Some(BoundaryPoint::new(t, 0)));
    }
}
