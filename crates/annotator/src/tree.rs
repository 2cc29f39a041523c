use crate::SharedPage;
use anchoring::{AnchorOptions, anchor_selector, merge_client_rects};
use core_types::{Bounds, Rect};
use html::NodeId;
use layout::Page;
use spatial::{AnnotationRects, SpatialIndex};
use std::rc::Rc;
use store::AnnotationTarget;

/// Highlight geometry of the stored targets, relative to the container's
/// top-left corner so it survives window scrolling.
pub struct SpatialTree {
    index: SpatialIndex,
    page: SharedPage,
    container: NodeId,
    options: AnchorOptions,
}

impl SpatialTree {
    pub fn new(page: SharedPage, container: NodeId, options: AnchorOptions) -> Self {
        Self {
            index: SpatialIndex::new(),
            page,
            container,
            options,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.index.ids().map(str::to_string).collect()
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Merged rects of `target`, container-relative.
    ///
    /// Selectors whose range went stale are revived on the fly; those that
    /// cannot be contribute nothing.
    pub fn rects_for(&self, target: &AnnotationTarget) -> Vec<Rect> {
        let page = self.page.borrow();
        target_rects(&page, self.container, &self.options, target)
    }

    pub fn insert(&mut self, target: &AnnotationTarget) {
        let rects = self.rects_for(target);
        self.index.insert(&target.annotation, rects);
    }

    pub fn update(&mut self, target: &AnnotationTarget) {
        let rects = self.rects_for(target);
        self.index.update(&target.annotation, rects);
    }

    pub fn remove(&mut self, target: &AnnotationTarget) -> bool {
        self.remove_id(&target.annotation)
    }

    pub fn remove_id(&mut self, id: &str) -> bool {
        self.index.remove(id)
    }

    pub fn set<'a>(&mut self, targets: impl IntoIterator<Item = &'a AnnotationTarget>, replace: bool) {
        let entries: Vec<(String, Vec<Rect>)> = {
            let page = self.page.borrow();
            targets
                .into_iter()
                .map(|t| {
                    let rects = target_rects(&page, self.container, &self.options, t);
                    (t.annotation.clone(), rects)
                })
                .collect()
        };
        self.index.set(entries, replace);
    }

    /// Recompute every rect from scratch, e.g. after the layout changed.
    pub fn recalculate<'a>(&mut self, targets: impl IntoIterator<Item = &'a AnnotationTarget>) {
        self.set(targets, true);
        log::debug!(target: "annotator.tree", "recalculated {} annotations", self.index.len());
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }

    pub fn get_at(&self, x: f32, y: f32) -> Option<String> {
        self.index.get_at(x, y)
    }

    pub fn get_at_all(&self, x: f32, y: f32) -> Vec<String> {
        self.index.get_at_all(x, y)
    }

    pub fn get_intersecting(&self, bounds: &Bounds) -> Vec<Rc<AnnotationRects>> {
        self.index.get_intersecting(bounds)
    }

    pub fn get_annotation_rects(&self, id: &str) -> Option<Vec<Rect>> {
        self.index.get_annotation_rects(id).map(<[Rect]>::to_vec)
    }

    pub fn get_annotation_bounds(&self, id: &str) -> Option<Bounds> {
        self.index.get_annotation_bounds(id)
    }
}

pub(crate) fn target_rects(
    page: &Page,
    container: NodeId,
    options: &AnchorOptions,
    target: &AnnotationTarget,
) -> Vec<Rect> {
    let doc = page.document();
    let origin = page.bounding_client_rect(container);
    let mut client = Vec::new();
    for selector in &target.selector {
        match anchor_selector(doc, selector, container, options) {
            Ok(revived) => {
                if let Some(range) = revived.range() {
                    client.extend(page.client_rects(&range));
                }
            }
            Err(err) => {
                log::debug!(
                    target: "annotator.tree",
                    "no geometry for {} ({:?}): {err}",
                    target.annotation,
                    selector.quote()
                );
            }
        }
    }
    merge_client_rects(&client)
        .into_iter()
        .map(|r| r.translate(-origin.x, -origin.y))
        .collect()
}
