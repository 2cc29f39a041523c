//! Spatial lookup of highlight rectangles.

mod index;
mod rtree;

pub use crate::index::{AnnotationRects, IndexedHighlightRect, SpatialIndex};
pub use crate::rtree::{Indexed, MAX_ENTRIES, MIN_ENTRIES, RTree};
