//! Line layout and geometry queries over an `html::Document`.

mod flow;
mod hit_test;
mod page;

pub use crate::flow::{LayoutTree, TextRun, is_out_of_flow};
pub use crate::hit_test::caret_at;
pub use crate::page::{Page, Viewport};

/// Layout can depend on this without knowing how text is actually drawn.
pub trait TextMeasurer {
    /// Advance width of `ch` in CSS px.
    fn char_width(&self, ch: char) -> f32;

    /// Width of `text` in CSS px.
    fn measure(&self, text: &str) -> f32 {
        text.chars().map(|c| self.char_width(c)).sum()
    }

    fn line_height(&self) -> f32;
}

/// Every char is the same width. Good enough for tests and headless hosts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedWidthMeasurer {
    pub char_width: f32,
    pub line_height: f32,
}

impl FixedWidthMeasurer {
    pub const fn new(char_width: f32, line_height: f32) -> Self {
        Self {
            char_width,
            line_height,
        }
    }
}

impl Default for FixedWidthMeasurer {
    fn default() -> Self {
        Self::new(8.0, 16.0)
    }
}

impl TextMeasurer for FixedWidthMeasurer {
    fn char_width(&self, _ch: char) -> f32 {
        self.char_width
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}
