use super::{Painter, RedrawArgs, is_paintable};
use crate::highlight::HighlightState;
use core_types::{Point, Rect};
use egui::{Color32, CornerRadius, Shape, Stroke, pos2, vec2};
use layout::Page;
use std::any::Any;

/// Paints into a canvas fixed to the viewport.
///
/// Output is a list of `egui` shapes in client coordinates, ready for a
/// `Painter::extend` on the host side. Because the canvas does not scroll
/// with the content, scrolling alone repaints it.
#[derive(Default)]
pub struct CanvasPainter {
    size: egui::Vec2,
    shapes: Vec<Shape>,
    last: Option<(Vec<(String, HighlightState)>, Point)>,
    hidden: bool,
}

impl CanvasPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shapes(&self) -> &[Shape] {
        if self.hidden { &[] } else { &self.shapes }
    }

    /// Canvas size; follows the viewport.
    pub fn size(&self) -> egui::Vec2 {
        self.size
    }
}

fn to_egui(rect: &Rect) -> egui::Rect {
    egui::Rect::from_min_size(pos2(rect.x, rect.y), vec2(rect.width, rect.height))
}

impl Painter for CanvasPainter {
    fn redraw(&mut self, _page: &mut Page, args: &RedrawArgs<'_>) {
        let key = (args.visible_key(), args.origin);
        if !args.force && self.last.as_ref() == Some(&key) {
            return;
        }
        self.size = vec2(args.viewport.width(), args.viewport.height());
        let canvas = egui::Rect::from_min_size(egui::Pos2::ZERO, self.size);

        self.shapes.clear();
        for highlight in args.highlights {
            let style = args.style_for(highlight);
            let [r, g, b, a] = style.rgba();
            let fill = Color32::from_rgba_unmultiplied(r, g, b, a);
            for rect in highlight.rects.iter().filter(|r| is_paintable(r)) {
                let client = to_egui(&rect.translate(args.origin.x, args.origin.y));
                if !canvas.intersects(client) {
                    continue;
                }
                self.shapes
                    .push(Shape::rect_filled(client, CornerRadius::ZERO, fill));
                if let Some(color) = style.underline {
                    let y = client.max.y;
                    self.shapes.push(Shape::line_segment(
                        [pos2(client.min.x, y), pos2(client.max.x, y)],
                        Stroke::new(
                            style.underline_thickness.max(1.0),
                            Color32::from_rgb(color.r, color.g, color.b),
                        ),
                    ));
                }
            }
        }
        self.last = Some(key);
    }

    fn set_visible(&mut self, _page: &mut Page, visible: bool) {
        self.hidden = !visible;
    }

    fn destroy(&mut self, _page: &mut Page) {
        self.shapes.clear();
        self.last = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{Color, Highlight, HighlightStyle, StyleExpression};
    use core_types::Bounds;
    use html::Document;
    use layout::FixedWidthMeasurer;
    use std::collections::HashMap;
    use store::Annotation;

    fn page() -> Page {
        Page::new(
            Document::from_html("<p>x</p>"),
            FixedWidthMeasurer::default(),
            800.0,
            600.0,
        )
    }

    fn highlight(id: &str, rects: Vec<Rect>) -> Highlight {
        let mut annotation = Annotation::new(Vec::new());
        annotation.id = id.to_string();
        Highlight {
            annotation,
            rects,
            state: HighlightState::default(),
            z_index: 0,
        }
    }

    fn redraw(painter: &mut CanvasPainter, highlights: &[Highlight], origin: Point, style: StyleExpression, force: bool) {
        let overrides = HashMap::new();
        painter.redraw(
            &mut page(),
            &RedrawArgs {
                highlights,
                viewport: Bounds::new(-origin.x, -origin.y, 800.0 - origin.x, 600.0 - origin.y),
                origin,
                style: &style,
                overrides: &overrides,
                force,
            },
        );
    }

    #[test]
    fn shapes_are_in_client_coordinates() {
        let mut painter = CanvasPainter::new();
        let h = highlight("a", vec![Rect::new(80.0, 0.0, 40.0, 16.0)]);
        redraw(&mut painter, &[h], Point::new(0.0, 50.0), StyleExpression::default(), true);
        assert_eq!(painter.size(), vec2(800.0, 600.0));
        assert_eq!(painter.shapes().len(), 1);
        let Shape::Rect(rect) = &painter.shapes()[0] else {
            panic!("expected a rect");
        };
        assert_eq!(rect.rect.min, pos2(80.0, 50.0));
        assert_eq!(rect.fill, Color32::from_rgba_unmultiplied(0, 128, 255, 46));
    }

    #[test]
    fn scrolling_repaints_and_culls() {
        let mut painter = CanvasPainter::new();
        let h = highlight(
            "a",
            vec![Rect::new(0.0, 0.0, 40.0, 16.0), Rect::new(0.0, 900.0, 40.0, 16.0)],
        );
        redraw(&mut painter, &[h.clone()], Point::new(0.0, 0.0), StyleExpression::default(), true);
        assert_eq!(painter.shapes().len(), 1);
        redraw(&mut painter, &[h], Point::new(0.0, -890.0), StyleExpression::default(), false);
        let Shape::Rect(rect) = &painter.shapes()[0] else {
            panic!("expected a rect");
        };
        assert_eq!(rect.rect.min, pos2(0.0, 10.0));
    }

    #[test]
    fn underline_adds_a_stroke() {
        let mut painter = CanvasPainter::new();
        let style = HighlightStyle {
            underline: Some(Color::rgb(255, 0, 0)),
            underline_thickness: 2.0,
            ..HighlightStyle::default()
        };
        let h = highlight("a", vec![Rect::new(0.0, 0.0, 40.0, 16.0)]);
        redraw(&mut painter, &[h], Point::default(), style.into(), true);
        assert_eq!(painter.shapes().len(), 2);
        assert!(matches!(painter.shapes()[1], Shape::LineSegment { .. }));
        painter.set_visible(&mut page(), false);
        assert!(painter.shapes().is_empty());
    }
}
