//! Scripted user input for running an annotator without a host.
//!
//! The driver plays the part of the browser: it moves the native selection
//! the way a mouse gesture would and delivers the events in the order a
//! browser fires them.

use crate::annotator::TextAnnotator;
use bus::{HostEvent, PointerButton};
use core_types::Millis;
use html::Document;

/// Step used by [`HostDriver::settle`]; one frame at 60 Hz.
pub const FRAME_MS: Millis = 16;
const SETTLE_MAX_STEPS: usize = 10_000;

pub struct HostDriver<'a> {
    annotator: &'a TextAnnotator,
    pressed: bool,
    dragging: bool,
}

impl<'a> HostDriver<'a> {
    pub fn new(annotator: &'a TextAnnotator) -> Self {
        Self {
            annotator,
            pressed: false,
            dragging: false,
        }
    }

    pub fn annotator(&self) -> &'a TextAnnotator {
        self.annotator
    }

    /// Primary button down at a client point. Collapses the native
    /// selection at the caret under it.
    pub fn press(&mut self, x: f32, y: f32) {
        {
            let mut page = self.annotator.page().borrow_mut();
            match page.caret_from_client_point(x, y) {
                Some(caret) => page.selection_mut().collapse(caret),
                None => page.selection_mut().remove_all_ranges(),
            }
        }
        self.pressed = true;
        self.dragging = false;
        self.annotator.handle_event(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x,
            y,
        });
    }

    /// Move the pointer. While pressed this extends the native selection;
    /// the first such move starts a selection.
    pub fn drag_to(&mut self, x: f32, y: f32) {
        self.annotator.handle_event(&HostEvent::PointerMove { x, y });
        if !self.pressed {
            return;
        }
        let extended = {
            let mut page = self.annotator.page().borrow_mut();
            match page.caret_from_client_point(x, y) {
                Some(caret) if page.selection().anchor().is_some() => {
                    page.selection_mut().extend(caret);
                    true
                }
                _ => false,
            }
        };
        if !extended {
            return;
        }
        if !self.dragging {
            self.dragging = true;
            self.annotator.handle_event(&HostEvent::SelectStart);
        }
        self.annotator.handle_event(&HostEvent::SelectionChange);
    }

    /// Hover without a button pressed.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.annotator.handle_event(&HostEvent::PointerMove { x, y });
    }

    /// Primary button up, then one zero-length tick so work deferred past
    /// `pointerup` runs.
    pub fn release(&mut self, x: f32, y: f32) {
        self.pressed = false;
        self.dragging = false;
        self.annotator.handle_event(&HostEvent::PointerUp {
            button: PointerButton::Primary,
            x,
            y,
        });
        self.annotator.scheduler().advance(0);
    }

    pub fn click(&mut self, x: f32, y: f32) {
        self.press(x, y);
        self.release(x, y);
    }

    /// Press, drag and release in one go.
    pub fn select(&mut self, from: (f32, f32), to: (f32, f32)) {
        self.press(from.0, from.1);
        self.drag_to(to.0, to.1);
        self.release(to.0, to.1);
    }

    pub fn key(&mut self, key: &str) {
        self.annotator.handle_event(&HostEvent::KeyDown {
            key: key.to_string(),
        });
    }

    pub fn scroll_to(&mut self, x: f32, y: f32) {
        self.annotator.page().borrow_mut().scroll_to(x, y);
        self.annotator.handle_event(&HostEvent::Scroll);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.annotator.page().borrow_mut().resize(width, height);
        self.annotator
            .handle_event(&HostEvent::Resize { width, height });
    }

    /// Change the DOM and deliver the mutation records.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        self.annotator.mutate_dom(f)
    }

    pub fn advance(&mut self, ms: Millis) {
        self.annotator.scheduler().advance(ms);
    }

    /// Run timers and frames until nothing is pending. Returns `false` if
    /// work was still queued after the step limit.
    pub fn settle(&mut self) -> bool {
        let idle = self
            .annotator
            .scheduler()
            .run_until_idle(FRAME_MS, SETTLE_MAX_STEPS);
        if !idle {
            log::warn!(target: "annotator.driver", "scheduler did not go idle");
        }
        idle
    }
}
