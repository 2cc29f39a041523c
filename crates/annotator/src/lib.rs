//! Text annotation for a container element: turning user selections into
//! annotations, keeping their on-screen geometry in an R-tree, and painting
//! highlights as the store, the selection, the viewport and the DOM change.
//!
//! [`TextAnnotator`] is the entry point. It layers the pieces:
//! - `state`: the store wrapped in a revival layer plus the spatial index.
//! - `selection_handler`: pointer and selection events to annotations.
//! - `renderer`: debounced repaints through a [`renderer::Painter`].

mod annotator;
pub mod config;
pub mod driver;
pub mod highlight;
pub mod lazy_load;
pub mod renderer;
pub mod selection_handler;
pub mod state;
mod tree;

use layout::Page;
use std::cell::RefCell;
use std::rc::Rc;

pub use crate::annotator::TextAnnotator;
pub use crate::config::{AnnotatorConfig, ConfigError, RendererKind, SelectionMode};
pub use crate::driver::HostDriver;
pub use crate::highlight::{
    Color, Filter, Highlight, HighlightState, HighlightStyle, StyleExpression,
};
pub use crate::lazy_load::RetryTask;
pub use crate::renderer::{RedrawInfo, Renderer};
pub use crate::selection_handler::{HandlerPhase, SelectionHandler};
pub use crate::state::{AnnotatorState, RevivalLayer, revive_target};
pub use crate::tree::SpatialTree;

/// The page an annotator works on, shared with the host.
pub type SharedPage = Rc<RefCell<Page>>;
