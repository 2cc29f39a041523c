use crate::flow::{LayoutTree, TextRun};
use core_types::Point;
use html::BoundaryPoint;

fn vertical_distance(run: &TextRun, y: f32) -> f32 {
    if y < run.y {
        run.y - y
    } else if y >= run.y + run.height {
        y - (run.y + run.height)
    } else {
        0.0
    }
}

fn horizontal_distance(run: &TextRun, x: f32) -> f32 {
    let right = run.x + run.width();
    if x < run.x {
        run.x - x
    } else if x > right {
        x - right
    } else {
        0.0
    }
}

/// Caret position nearest to `point` (page coordinates).
///
/// Picks the closest line first, then the closest run on it, then the char
/// boundary nearest to `point.x`. Points past the end of a line land at the
/// end of its last run. `None` only when nothing is laid out.
pub fn caret_at(tree: &LayoutTree, point: Point) -> Option<BoundaryPoint> {
    let line_y = tree
        .runs()
        .iter()
        .min_by(|a, b| vertical_distance(a, point.y).total_cmp(&vertical_distance(b, point.y)))?
        .y;

    let run = tree
        .runs()
        .iter()
        .filter(|r| r.y == line_y)
        .min_by(|a, b| {
            horizontal_distance(a, point.x).total_cmp(&horizontal_distance(b, point.x))
        })?;

    let local = point.x - run.x;
    let mut offset = run.end;
    for k in 0..run.advances.len().saturating_sub(1) {
        let mid = (run.advances[k] + run.advances[k + 1]) / 2.0;
        if local < mid {
            offset = run.start + k;
            break;
        }
    }
    Some(BoundaryPoint::new(run.node, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedWidthMeasurer;
    use html::Document;

    fn setup(markup: &str, width: f32) -> (Document, LayoutTree) {
        let doc = Document::from_html(markup);
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), width);
        (doc, tree)
    }

    #[test]
    fn rounds_to_nearest_boundary() {
        let (doc, tree) = setup("<p>hello</p>", 500.0);
        let t = doc.children(doc.children(doc.root())[0])[0];
        assert_eq!(caret_at(&tree, Point::new(14.0, 5.0)), Some(BoundaryPoint::new(t, 1)));
        assert_eq!(caret_at(&tree, Point::new(16.0, 5.0)), Some(BoundaryPoint::new(t, 2)));
    }

    #[test]
    fn past_line_end_clamps() {
        let (doc, tree) = setup("<p>hello</p><p>x</p>", 500.0);
        let t = doc.children(doc.children(doc.root())[0])[0];
        assert_eq!(caret_at(&tree, Point::new(400.0, 10.0)), Some(BoundaryPoint::new(t, 5)));
    }

    #[test]
    fn below_content_snaps_to_last_line() {
        let (doc, tree) = setup("<p>ab</p><p>cd</p>", 500.0);
        let t2 = doc.children(doc.children(doc.root())[1])[0];
        assert_eq!(caret_at(&tree, Point::new(0.0, 400.0)), Some(BoundaryPoint::new(t2, 0)));
    }

    #[test]
    fn picks_the_run_under_the_pointer() {
        let (doc, tree) = setup("<p>ab <b>cd</b></p>", 500.0);
        let p = doc.children(doc.root())[0];
        let inner = doc.children(doc.children(p)[1])[0];
        assert_eq!(caret_at(&tree, Point::new(41.0, 5.0)), Some(BoundaryPoint::new(inner, 1)));
    }

    #[test]
    fn empty_layout_has_no_caret() {
        let (_, tree) = setup("", 500.0);
        assert_eq!(caret_at(&tree, Point::new(0.0, 0.0)), None);
    }
}
