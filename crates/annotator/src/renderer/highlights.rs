use super::{Painter, RedrawArgs};
use crate::highlight::{HighlightState, HighlightStyle};
use html::DomRange;
use layout::Page;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// One named highlight: every range painted with one style.
#[derive(Clone, Debug, PartialEq)]
pub struct HighlightGroup {
    pub style: HighlightStyle,
    pub ranges: Vec<DomRange>,
    /// Highest z-index among members; later groups win where they overlap.
    pub priority: usize,
}

/// Paints through named highlight groups plus a generated stylesheet, the
/// way the CSS Custom Highlight API does, without touching the DOM.
///
/// The registry belongs to this painter; two painters on one page never
/// share names.
pub struct HighlightsPainter {
    prefix: String,
    registry: BTreeMap<String, HighlightGroup>,
    stylesheet: String,
    last: Option<Vec<(String, HighlightState)>>,
    visible: bool,
}

impl Default for HighlightsPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightsPainter {
    pub fn new() -> Self {
        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        Self {
            prefix: format!("marginalia-{instance}"),
            registry: BTreeMap::new(),
            stylesheet: String::new(),
            last: None,
            visible: true,
        }
    }

    pub fn registry(&self) -> &BTreeMap<String, HighlightGroup> {
        &self.registry
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn rebuild_stylesheet(&mut self) {
        self.stylesheet.clear();
        if !self.visible {
            return;
        }
        for (name, group) in &self.registry {
            let _ = writeln!(self.stylesheet, "::highlight({name}) {{ {} }}", group.style.to_css());
        }
    }
}

impl Painter for HighlightsPainter {
    fn redraw(&mut self, page: &mut Page, args: &RedrawArgs<'_>) {
        let key = args.visible_key();
        if !args.force && self.last.as_ref() == Some(&key) {
            return;
        }
        let doc = page.document();
        let mut groups: Vec<HighlightGroup> = Vec::new();
        for highlight in args.highlights {
            let style = args.style_for(highlight);
            let ranges = highlight
                .annotation
                .target
                .selector
                .iter()
                .filter_map(|s| s.range())
                .filter(|r| r.is_live(doc) && !r.is_collapsed());
            match groups.iter_mut().find(|g| g.style == style) {
                Some(group) => {
                    group.ranges.extend(ranges);
                    group.priority = group.priority.max(highlight.z_index);
                }
                None => groups.push(HighlightGroup {
                    style,
                    ranges: ranges.collect(),
                    priority: highlight.z_index,
                }),
            }
        }
        self.registry = groups
            .into_iter()
            .enumerate()
            .filter(|(_, g)| !g.ranges.is_empty())
            .map(|(i, g)| (format!("{}-{i}", self.prefix), g))
            .collect();
        self.rebuild_stylesheet();
        self.last = Some(key);
    }

    fn set_visible(&mut self, _page: &mut Page, visible: bool) {
        self.visible = visible;
        self.rebuild_stylesheet();
    }

    fn destroy(&mut self, _page: &mut Page) {
        self.registry.clear();
        self.stylesheet.clear();
        self.last = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
