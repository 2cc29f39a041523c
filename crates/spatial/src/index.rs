use crate::rtree::{Indexed, RTree};
use core_types::{Bounds, Rect};
use std::collections::HashMap;
use std::rc::Rc;

/// All rects of one annotation, shared by its index entries.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationRects {
    pub id: String,
    pub rects: Vec<Rect>,
}

impl AnnotationRects {
    /// Sum of the rect areas; used to prefer the smaller of overlapping hits.
    pub fn total_area(&self) -> f32 {
        self.rects.iter().map(Rect::area).sum()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_rects(&self.rects)
    }
}

/// One R-tree entry: a single rect plus the annotation it belongs to.
#[derive(Clone, Debug)]
pub struct IndexedHighlightRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub annotation: Rc<AnnotationRects>,
}

impl Indexed for IndexedHighlightRect {
    fn bounds(&self) -> Bounds {
        Bounds::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Highlight geometry keyed by annotation id.
///
/// Coordinates are whatever the caller uses consistently; the annotator
/// stores rects relative to its container.
#[derive(Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedHighlightRect>,
    by_id: HashMap<String, Rc<AnnotationRects>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of annotations (not rects).
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of rect entries in the tree.
    pub fn entry_count(&self) -> usize {
        self.tree.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.by_id.clear();
    }

    /// Index `rects` under `id`, replacing anything already indexed for it.
    pub fn insert(&mut self, id: &str, rects: Vec<Rect>) {
        if self.by_id.contains_key(id) {
            self.remove_entries(id);
        }
        let shared = Rc::new(AnnotationRects {
            id: id.to_string(),
            rects,
        });
        for r in shared.rects.iter().filter(|r| !r.is_empty()) {
            self.tree.insert(IndexedHighlightRect {
                min_x: r.x,
                min_y: r.y,
                max_x: r.right(),
                max_y: r.bottom(),
                annotation: Rc::clone(&shared),
            });
        }
        self.by_id.insert(id.to_string(), shared);
    }

    fn remove_entries(&mut self, id: &str) -> bool {
        let Some(existing) = self.by_id.remove(id) else {
            return false;
        };
        let hint = existing.bounds();
        let hint = (!hint.is_empty()).then_some(hint);
        self.tree
            .remove_where(hint, |e| Rc::ptr_eq(&e.annotation, &existing));
        true
    }

    /// Returns `false` (and logs) if `id` was not indexed.
    pub fn remove(&mut self, id: &str) -> bool {
        let found = self.remove_entries(id);
        if !found {
            log::warn!(target: "spatial", "index drift: removing {id}, which is not indexed");
        }
        found
    }

    pub fn update(&mut self, id: &str, rects: Vec<Rect>) {
        if !self.by_id.contains_key(id) {
            log::debug!(target: "spatial", "update of unindexed {id}, inserting");
        }
        self.insert(id, rects);
    }

    /// Bulk insert. With `replace`, everything else is dropped first.
    pub fn set(&mut self, entries: impl IntoIterator<Item = (String, Vec<Rect>)>, replace: bool) {
        if replace {
            self.clear();
        }
        for (id, rects) in entries {
            self.insert(&id, rects);
        }
    }

    fn hits_at(&self, x: f32, y: f32) -> Vec<Rc<AnnotationRects>> {
        let mut hits: Vec<Rc<AnnotationRects>> = Vec::new();
        for entry in self.tree.search(&Bounds::point(x, y)) {
            if !hits.iter().any(|h| Rc::ptr_eq(h, &entry.annotation)) {
                hits.push(Rc::clone(&entry.annotation));
            }
        }
        sort_by_area(&mut hits);
        hits
    }

    /// The annotation under the point; with overlaps, the smallest by total area.
    pub fn get_at(&self, x: f32, y: f32) -> Option<String> {
        self.hits_at(x, y).first().map(|a| a.id.clone())
    }

    /// Every annotation under the point, smallest first.
    pub fn get_at_all(&self, x: f32, y: f32) -> Vec<String> {
        self.hits_at(x, y).into_iter().map(|a| a.id.clone()).collect()
    }

    /// Annotations with at least one rect intersecting `bounds`, smallest first.
    pub fn get_intersecting(&self, bounds: &Bounds) -> Vec<Rc<AnnotationRects>> {
        let mut hits: Vec<Rc<AnnotationRects>> = Vec::new();
        for entry in self.tree.search(bounds) {
            if !hits.iter().any(|h| Rc::ptr_eq(h, &entry.annotation)) {
                hits.push(Rc::clone(&entry.annotation));
            }
        }
        sort_by_area(&mut hits);
        hits
    }

    pub fn get_annotation_rects(&self, id: &str) -> Option<&[Rect]> {
        self.by_id.get(id).map(|a| a.rects.as_slice())
    }

    pub fn get_annotation_bounds(&self, id: &str) -> Option<Bounds> {
        self.by_id
            .get(id)
            .map(|a| a.bounds())
            .filter(|b| !b.is_empty())
    }
}

fn sort_by_area(hits: &mut [Rc<AnnotationRects>]) {
    hits.sort_by(|a, b| {
        a.total_area()
            .total_cmp(&b.total_area())
            .then_with(|| a.id.cmp(&b.id))
    });
}
