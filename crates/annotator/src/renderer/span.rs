use super::{Painter, RedrawArgs, is_paintable};
use crate::highlight::{Highlight, HighlightStyle};
use anchoring::NOT_ANNOTATABLE_CLASS;
use core_types::Rect;
use html::{DomError, NodeId};
use layout::Page;
use std::any::Any;
use std::collections::HashMap;

pub const HIGHLIGHT_LAYER_CLASS: &str = "highlight-layer";
const SPAN_CLASS: &str = "highlight";
const LAYER_STYLE: &str = "position:absolute; left:0px; top:0px; pointer-events:none;";

#[derive(Clone, Debug, PartialEq)]
struct SpanKey {
    rects: Vec<Rect>,
    style: HighlightStyle,
    z_index: usize,
    selected: bool,
}

struct Painted {
    key: SpanKey,
    spans: Vec<NodeId>,
}

/// Paints highlights as absolutely positioned `<span>`s in a layer element
/// inside the container.
///
/// The layer is out of flow and not annotatable, so it neither moves the
/// text nor shows up in selections.
pub struct SpanPainter {
    layer: Option<NodeId>,
    painted: HashMap<String, Painted>,
    visible: bool,
}

impl SpanPainter {
    pub fn new(page: &mut Page, container: NodeId) -> Self {
        let layer = match create_layer(page, container) {
            Ok(layer) => Some(layer),
            Err(err) => {
                log::warn!(target: "annotator.renderer", "no highlight layer: {err}");
                None
            }
        };
        Self {
            layer,
            painted: HashMap::new(),
            visible: true,
        }
    }

    /// Span elements currently painted for `id`.
    pub fn spans_for(&self, id: &str) -> &[NodeId] {
        self.painted
            .get(id)
            .map(|p| p.spans.as_slice())
            .unwrap_or_default()
    }

    pub fn painted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.painted.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn unpaint(&mut self, page: &mut Page, id: &str) {
        if let Some(painted) = self.painted.remove(id) {
            for span in painted.spans {
                if let Err(err) = page.document_mut().remove(span) {
                    log::debug!(target: "annotator.renderer", "stale span: {err}");
                }
            }
        }
    }

    fn paint(&mut self, page: &mut Page, layer: NodeId, highlight: &Highlight, key: SpanKey) {
        let mut spans = Vec::with_capacity(key.rects.len());
        let css = key.style.to_css();
        for rect in key.rects.iter().filter(|r| is_paintable(r)) {
            match create_span(page, layer, highlight, rect, &css, key.selected) {
                Ok(span) => spans.push(span),
                Err(err) => {
                    log::warn!(target: "annotator.renderer", "skipping rect of {}: {err}", highlight.id());
                }
            }
        }
        self.painted
            .insert(highlight.id().to_string(), Painted { key, spans });
    }
}

fn create_layer(page: &mut Page, container: NodeId) -> Result<NodeId, DomError> {
    let doc = page.document_mut();
    let layer = doc.create_element("div");
    doc.set_attribute(
        layer,
        "class",
        &format!("{HIGHLIGHT_LAYER_CLASS} {NOT_ANNOTATABLE_CLASS}"),
    )?;
    doc.set_attribute(layer, "style", LAYER_STYLE)?;
    doc.append_child(container, layer)?;
    Ok(layer)
}

fn create_span(
    page: &mut Page,
    layer: NodeId,
    highlight: &Highlight,
    rect: &Rect,
    css: &str,
    selected: bool,
) -> Result<NodeId, DomError> {
    let doc = page.document_mut();
    let span = doc.create_element("span");
    let class = if selected {
        format!("{SPAN_CLASS} selected")
    } else {
        SPAN_CLASS.to_string()
    };
    doc.set_attribute(span, "class", &class)?;
    doc.set_attribute(span, "data-id", highlight.id())?;
    doc.set_attribute(
        span,
        "style",
        &format!(
            "position:absolute; left:{}px; top:{}px; width:{}px; height:{}px; z-index:{}; {css}",
            rect.x, rect.y, rect.width, rect.height, highlight.z_index
        ),
    )?;
    doc.append_child(layer, span)?;
    Ok(span)
}

impl Painter for SpanPainter {
    fn redraw(&mut self, page: &mut Page, args: &RedrawArgs<'_>) {
        let Some(layer) = self.layer else {
            return;
        };
        let unchanged = self.painted.len() == args.highlights.len()
            && args
                .highlights
                .iter()
                .all(|h| self.painted.contains_key(h.id()));
        if !args.force && unchanged {
            return;
        }

        let stale: Vec<String> = self
            .painted
            .keys()
            .filter(|id| !args.highlights.iter().any(|h| h.id() == id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.unpaint(page, &id);
        }

        for highlight in args.highlights {
            let key = SpanKey {
                rects: highlight.rects.clone(),
                style: args.style_for(highlight),
                z_index: highlight.z_index,
                selected: highlight.state.selected,
            };
            if self
                .painted
                .get(highlight.id())
                .is_some_and(|p| p.key == key)
            {
                continue;
            }
            self.unpaint(page, highlight.id());
            self.paint(page, layer, highlight, key);
        }
    }

    fn set_visible(&mut self, page: &mut Page, visible: bool) {
        self.visible = visible;
        let Some(layer) = self.layer else {
            return;
        };
        let style = if visible {
            LAYER_STYLE.to_string()
        } else {
            format!("{LAYER_STYLE} display:none;")
        };
        if let Err(err) = page.document_mut().set_attribute(layer, "style", &style) {
            log::warn!(target: "annotator.renderer", "cannot toggle layer: {err}");
        }
    }

    fn destroy(&mut self, page: &mut Page) {
        self.painted.clear();
        if let Some(layer) = self.layer.take()
            && let Err(err) = page.document_mut().remove(layer)
        {
            log::debug!(target: "annotator.renderer", "layer already gone: {err}");
        }
    }

    fn layer(&self) -> Option<NodeId> {
        self.layer
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
