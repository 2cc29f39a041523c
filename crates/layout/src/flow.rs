//! Line-box flow: block elements stack, inline text wraps at spaces.
//!
//! Every text node becomes zero or more [`TextRun`]s, one per line it
//! touches. Runs carry per-char advance offsets so that sub-ranges map to
//! exact rectangles without re-measuring.

use crate::TextMeasurer;
use core_types::Rect;
use html::{Document, NodeId, NodeKind};
use std::collections::HashMap;

/// A slice `[start, end)` (char offsets) of one text node placed on one line.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub line: usize,
    /// `advances[i]` is the x offset of char `start + i`; one extra entry for the end.
    pub advances: Vec<f32>,
}

impl TextRun {
    pub fn width(&self) -> f32 {
        self.advances.last().copied().unwrap_or(0.0)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width(), self.height)
    }

    /// Rect covering chars `[s, e)` of the node, clipped to this run.
    pub fn sub_rect(&self, s: usize, e: usize) -> Option<Rect> {
        let s = s.max(self.start);
        let e = e.min(self.end);
        if s >= e {
            return None;
        }
        let x0 = self.advances[s - self.start];
        let x1 = self.advances[e - self.start];
        Some(Rect::new(self.x + x0, self.y, x1 - x0, self.height))
    }
}

/// The laid-out document in page coordinates (origin at the document's top-left).
#[derive(Debug, Default)]
pub struct LayoutTree {
    runs: Vec<TextRun>,
    runs_by_node: HashMap<NodeId, Vec<usize>>,
    blocks: HashMap<NodeId, Rect>,
    width: f32,
    height: f32,
}

impl LayoutTree {
    pub fn build(doc: &Document, measurer: &dyn TextMeasurer, width: f32) -> Self {
        let mut flow = Flow {
            doc,
            measurer,
            width: width.max(0.0),
            x: 0.0,
            y: 0.0,
            line: 0,
            line_has_content: false,
            tree: LayoutTree {
                width,
                ..Default::default()
            },
        };
        flow.layout_children(doc.root());
        flow.finish_line();
        let mut tree = flow.tree;
        tree.height = flow.y;
        log::trace!(
            target: "layout",
            "laid out {} runs, {} blocks, height {}",
            tree.runs.len(),
            tree.blocks.len(),
            tree.height
        );
        tree
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn content_height(&self) -> f32 {
        self.height
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn runs_for(&self, node: NodeId) -> impl Iterator<Item = &TextRun> {
        self.runs_by_node
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&i| &self.runs[i])
    }

    /// Border box of a block element.
    pub fn block_rect(&self, node: NodeId) -> Option<Rect> {
        self.blocks.get(&node).copied()
    }

    /// Line fragments of chars `[s, e)` of text node `node`.
    pub fn text_rects(&self, node: NodeId, s: usize, e: usize) -> Vec<Rect> {
        self.runs_for(node)
            .filter_map(|run| run.sub_rect(s, e))
            .collect()
    }

    /// Bounding rect of a node: its block box, else the union of its text runs.
    pub fn node_rect(&self, doc: &Document, node: NodeId) -> Option<Rect> {
        if let Some(rect) = self.block_rect(node) {
            return Some(rect);
        }
        html::traverse::TextNodes::new(doc, node)
            .flat_map(|t| self.runs_for(t))
            .map(TextRun::rect)
            .reduce(|a, b| a.union(&b))
    }
}

struct Flow<'a> {
    doc: &'a Document,
    measurer: &'a dyn TextMeasurer,
    width: f32,
    x: f32,
    y: f32,
    line: usize,
    line_has_content: bool,
    tree: LayoutTree,
}

impl Flow<'_> {
    fn line_height(&self) -> f32 {
        self.measurer.line_height()
    }

    fn finish_line(&mut self) {
        if self.line_has_content {
            self.y += self.line_height();
            self.line += 1;
        }
        self.x = 0.0;
        self.line_has_content = false;
    }

    fn layout_children(&mut self, parent: NodeId) {
        for &child in self.doc.children(parent) {
            self.layout_node(child);
        }
    }

    fn layout_node(&mut self, node: NodeId) {
        match self.doc.kind(node) {
            Some(NodeKind::Text { text }) => self.layout_text(node, text),
            Some(NodeKind::Element { name, .. }) => {
                if is_out_of_flow(self.doc, node) {
                    return;
                }
                if name == "br" {
                    if !self.line_has_content {
                        // empty line still takes up space
                        self.line_has_content = true;
                    }
                    self.finish_line();
                    return;
                }
                if is_block(name) {
                    self.finish_line();
                    let top = self.y;
                    self.layout_children(node);
                    self.finish_line();
                    self.tree
                        .blocks
                        .insert(node, Rect::new(0.0, top, self.width, self.y - top));
                } else {
                    self.layout_children(node);
                }
            }
            Some(NodeKind::Document) => self.layout_children(node),
            Some(NodeKind::Comment { .. }) | None => {}
        }
    }

    fn layout_text(&mut self, node: NodeId, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        let mut run: Option<TextRun> = None;

        while i < chars.len() {
            let is_space = chars[i].is_whitespace();
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() == is_space {
                j += 1;
            }

            if is_space && !self.line_has_content {
                // collapsed at line start
                self.flush_run(&mut run);
                i = j;
                continue;
            }

            let widths: Vec<f32> = chars[i..j]
                .iter()
                .map(|c| self.measurer.char_width(if is_space { ' ' } else { *c }))
                .collect();
            let word_width: f32 = widths.iter().sum();

            if !is_space && self.line_has_content && self.x + word_width > self.width {
                self.flush_run(&mut run);
                self.finish_line();
            }

            let current = run.get_or_insert_with(|| TextRun {
                node,
                start: i,
                end: i,
                x: self.x,
                y: self.y,
                height: self.measurer.line_height(),
                line: self.line,
                advances: vec![0.0],
            });
            for w in widths {
                let last = current.advances.last().copied().unwrap_or(0.0);
                current.advances.push(last + w);
            }
            current.end = j;
            self.x += word_width;
            self.line_has_content = true;
            i = j;
        }
        self.flush_run(&mut run);
    }

    fn flush_run(&mut self, run: &mut Option<TextRun>) {
        if let Some(run) = run.take()
            && run.end > run.start
        {
            let idx = self.tree.runs.len();
            self.tree.runs_by_node.entry(run.node).or_default().push(idx);
            self.tree.runs.push(run);
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "html"
            | "body"
            | "div"
            | "p"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "nav"
            | "aside"
            | "blockquote"
            | "pre"
            | "figure"
            | "figcaption"
            | "hr"
            | "table"
            | "tr"
            | "dl"
            | "dt"
            | "dd"
    )
}

/// Elements that take no part in line layout.
pub fn is_out_of_flow(doc: &Document, node: NodeId) -> bool {
    if matches!(
        doc.tag_name(node),
        Some("head" | "script" | "style" | "title" | "meta" | "link" | "template")
    ) {
        return true;
    }
    let Some(style) = doc.attribute(node, "style") else {
        return false;
    };
    style.split(';').any(|decl| {
        let Some((prop, value)) = decl.split_once(':') else {
            return false;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        (prop == "display" && value == "none")
            || (prop == "position" && (value == "absolute" || value == "fixed"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedWidthMeasurer;

    fn approx(got: f32, want: f32) {
        assert!((got - want).abs() <= 0.01, "expected {want:.2}, got {got:.2}");
    }

    #[test]
    fn blocks_stack_and_text_flows() {
        let doc = Document::from_html("<p>hello world</p><p>second</p>");
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 500.0);
        let p1 = doc.children(doc.root())[0];
        let p2 = doc.children(doc.root())[1];
        assert_eq!(tree.block_rect(p1), Some(Rect::new(0.0, 0.0, 500.0, 20.0)));
        assert_eq!(tree.block_rect(p2), Some(Rect::new(0.0, 20.0, 500.0, 20.0)));
        approx(tree.content_height(), 40.0);
    }

    #[test]
    fn wraps_at_spaces() {
        let doc = Document::from_html("<p>aaaa bbbb cccc</p>");
        // 10 chars per line
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 100.0);
        let p = doc.children(doc.root())[0];
        let t = doc.children(p)[0];
        let runs: Vec<_> = tree.runs_for(t).collect();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start, runs[0].end), (0, 10));
        assert_eq!((runs[1].start, runs[1].end), (10, 14));
        approx(runs[1].y, 20.0);
        approx(runs[1].x, 0.0);
    }

    #[test]
    fn sub_rect_maps_char_offsets() {
        let doc = Document::from_html("<p>The quick brown fox</p>");
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 1000.0);
        let t = doc.children(doc.children(doc.root())[0])[0];
        let rects = tree.text_rects(t, 4, 9);
        assert_eq!(rects, vec![Rect::new(40.0, 0.0, 50.0, 20.0)]);
    }

    #[test]
    fn inline_elements_continue_the_line() {
        let doc = Document::from_html("<p>ab <b>cd</b> ef</p>");
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 1000.0);
        let p = doc.children(doc.root())[0];
        let b = doc.children(p)[1];
        let inner = doc.children(b)[0];
        let run = tree.runs_for(inner).next().unwrap();
        approx(run.x, 30.0);
        assert_eq!(tree.node_rect(&doc, b), Some(Rect::new(30.0, 0.0, 20.0, 20.0)));
    }

    #[test]
    fn leading_whitespace_collapses() {
        let doc = Document::from_html("<div>\n  <p>x</p>\n</div>");
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 100.0);
        assert_eq!(tree.runs().len(), 1);
        approx(tree.runs()[0].x, 0.0);
        approx(tree.content_height(), 20.0);
    }

    #[test]
    fn absolute_and_hidden_elements_are_skipped() {
        let doc = Document::from_html(
            r#"<p>a<span style="position: absolute">zz</span><span style="display:none">yy</span>b</p>"#,
        );
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 100.0);
        let p = doc.children(doc.root())[0];
        let last = doc.children(p)[3];
        approx(tree.runs_for(last).next().unwrap().x, 10.0);
        assert_eq!(tree.runs().len(), 2);
    }

    #[test]
    fn br_breaks_the_line() {
        let doc = Document::from_html("<p>a<br>b</p>");
        let tree = LayoutTree::build(&doc, &FixedWidthMeasurer::new(10.0, 20.0), 100.0);
        approx(tree.runs()[1].y, 20.0);
    }
}
