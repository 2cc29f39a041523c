use core_types::Rect;
use std::fmt;
use std::rc::Rc;
use store::Annotation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_css(self, alpha: f32) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha.clamp(0.0, 1.0))
    }
}

/// How one highlight is painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightStyle {
    pub fill: Color,
    pub fill_opacity: f32,
    pub underline: Option<Color>,
    pub underline_thickness: f32,
}

pub const DEFAULT_FILL: Color = Color::rgb(0, 128, 255);

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            fill: DEFAULT_FILL,
            fill_opacity: 0.18,
            underline: None,
            underline_thickness: 0.0,
        }
    }
}

impl HighlightStyle {
    pub fn selected() -> Self {
        Self {
            fill_opacity: 0.45,
            ..Self::default()
        }
    }

    /// Fill as 8-bit RGBA.
    pub fn rgba(&self) -> [u8; 4] {
        let a = (self.fill_opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        [self.fill.r, self.fill.g, self.fill.b, a]
    }

    /// Declarations for a span or a `::highlight()` rule.
    pub fn to_css(&self) -> String {
        let mut css = format!("background-color: {};", self.fill.to_css(self.fill_opacity));
        if let Some(color) = self.underline {
            css.push_str(&format!(
                " text-decoration: underline; text-decoration-color: {}; text-decoration-thickness: {}px;",
                color.to_css(1.0),
                self.underline_thickness
            ));
        }
        css
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HighlightState {
    pub selected: bool,
    pub hovered: bool,
}

/// Style as a fixed value or computed per highlight.
///
/// The function gets the annotation, its state and its z-index (position
/// in creation order) and may return `None` for the default look.
#[derive(Clone)]
pub enum StyleExpression {
    Fixed(HighlightStyle),
    Dynamic(Rc<dyn Fn(&Annotation, HighlightState, usize) -> Option<HighlightStyle>>),
}

impl fmt::Debug for StyleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleExpression::Fixed(style) => f.debug_tuple("Fixed").field(style).finish(),
            StyleExpression::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl StyleExpression {
    pub fn dynamic(
        f: impl Fn(&Annotation, HighlightState, usize) -> Option<HighlightStyle> + 'static,
    ) -> Self {
        StyleExpression::Dynamic(Rc::new(f))
    }

    pub fn resolve(&self, annotation: &Annotation, state: HighlightState, z_index: usize) -> HighlightStyle {
        match self {
            StyleExpression::Fixed(style) => *style,
            StyleExpression::Dynamic(f) => {
                f(annotation, state, z_index).unwrap_or_else(|| default_style(state))
            }
        }
    }
}

impl Default for StyleExpression {
    fn default() -> Self {
        StyleExpression::dynamic(|_, state, _| Some(default_style(state)))
    }
}

impl From<HighlightStyle> for StyleExpression {
    fn from(style: HighlightStyle) -> Self {
        StyleExpression::Fixed(style)
    }
}

pub fn default_style(state: HighlightState) -> HighlightStyle {
    if state.selected {
        HighlightStyle::selected()
    } else {
        HighlightStyle::default()
    }
}

pub type Filter = Rc<dyn Fn(&Annotation) -> bool>;

/// An annotation ready to paint: its container-relative rects and state.
#[derive(Clone, Debug, PartialEq)]
pub struct Highlight {
    pub annotation: Annotation,
    pub rects: Vec<Rect>,
    pub state: HighlightState,
    /// Position in store (creation) order; later annotations paint on top.
    pub z_index: usize,
}

impl Highlight {
    pub fn id(&self) -> &str {
        &self.annotation.id
    }
}
