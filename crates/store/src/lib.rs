//! Annotation records, the store contract and the reactive selection/hover
//! state around them.

mod error;
mod model;
mod selection;
mod store;

pub use crate::error::StoreError;
pub use crate::model::{Annotation, AnnotationBody, AnnotationTarget, User};
pub use crate::selection::{HoverState, SelectedItem, SelectionState, UserSelectAction};
pub use crate::store::{
    AnnotationStore, ChangeSet, MemoryStore, ObserveOptions, Origin, StoreChangeEvent,
    StoreObserver, Update,
};
