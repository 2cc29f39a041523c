//! The host event loop: a virtual-clock scheduler, debouncing, pub/sub
//! channels and the DOM events the annotator listens to.

mod channel;
mod debounce;
mod scheduler;

pub use crate::channel::{Channel, Signal, Subscription};
pub use crate::debounce::Debouncer;
pub use crate::scheduler::{FrameHandle, Scheduler, TimerHandle};

use html::MutationRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// Events delivered by the host. Coordinates are client coordinates.
///
/// `Scroll` and `Resize` are notifications: the page has already been
/// scrolled or resized when they arrive.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    // Pointer
    PointerDown {
        button: PointerButton,
        x: f32,
        y: f32,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp {
        button: PointerButton,
        x: f32,
        y: f32,
    },

    // Selection
    SelectStart,
    SelectionChange,

    // Keyboard
    KeyDown {
        key: String,
    },

    // Window
    Scroll,
    Resize {
        width: f32,
        height: f32,
    },

    // DOM
    Mutation(Vec<MutationRecord>),
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::PointerDown { .. } => "pointerdown",
            HostEvent::PointerMove { .. } => "pointermove",
            HostEvent::PointerUp { .. } => "pointerup",
            HostEvent::SelectStart => "selectstart",
            HostEvent::SelectionChange => "selectionchange",
            HostEvent::KeyDown { .. } => "keydown",
            HostEvent::Scroll => "scroll",
            HostEvent::Resize { .. } => "resize",
            HostEvent::Mutation(_) => "mutation",
        }
    }
}
