//! Keeping painted highlights in step with the store, the selection, hover,
//! scrolling and the layout.
//!
//! Every trigger funnels into one debounced tick that is deferred to the
//! next animation frame. A tick asks the index for what intersects the
//! viewport and hands the result to the painter in one call.

mod canvas;
mod highlights;
mod span;

pub use canvas::CanvasPainter;
pub use highlights::HighlightsPainter;
pub use span::{HIGHLIGHT_LAYER_CLASS, SpanPainter};

use crate::highlight::{Filter, Highlight, HighlightState, HighlightStyle, StyleExpression};
use crate::state::AnnotatorState;
use bus::{Channel, Debouncer, FrameHandle, HostEvent, Scheduler, Subscription};
use core_types::{Bounds, Point, Rect};
use html::{MutationKind, MutationRecord, NodeId};
use layout::Page;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use store::{ObserveOptions, StoreChangeEvent, UserSelectAction};

/// Class toggled on the container while an annotation is hovered.
pub const HOVERED_CLASS: &str = "hovered";

/// Everything a painter needs for one tick.
pub struct RedrawArgs<'a> {
    /// Visible highlights in paint order, bottom first.
    pub highlights: &'a [Highlight],
    /// The visible area, container-relative.
    pub viewport: Bounds,
    /// The container's top-left in client coordinates.
    pub origin: Point,
    pub style: &'a StyleExpression,
    /// Per-annotation styles that replace `style`.
    pub overrides: &'a HashMap<String, StyleExpression>,
    /// `false` for ticks caused by scrolling alone.
    pub force: bool,
}

impl RedrawArgs<'_> {
    pub fn style_for(&self, highlight: &Highlight) -> HighlightStyle {
        self.overrides
            .get(highlight.id())
            .unwrap_or(self.style)
            .resolve(&highlight.annotation, highlight.state, highlight.z_index)
    }

    /// Ids and states of the highlights, for cheap change detection.
    pub fn visible_key(&self) -> Vec<(String, HighlightState)> {
        self.highlights
            .iter()
            .map(|h| (h.id().to_string(), h.state))
            .collect()
    }
}

pub trait Painter {
    fn redraw(&mut self, page: &mut Page, args: &RedrawArgs<'_>);

    fn set_visible(&mut self, page: &mut Page, visible: bool);

    fn destroy(&mut self, page: &mut Page);

    /// Element the painter draws into. Mutations inside it are its own.
    fn layer(&self) -> Option<NodeId> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A rect a painter can draw: finite with positive size.
pub(crate) fn is_paintable(rect: &Rect) -> bool {
    [rect.x, rect.y, rect.width, rect.height]
        .iter()
        .all(|v| v.is_finite())
        && !rect.is_empty()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Destroyed,
}

/// What the last tick painted.
#[derive(Clone, Debug, PartialEq)]
pub struct RedrawInfo {
    pub ids: Vec<String>,
    pub forced: bool,
}

pub struct Renderer {
    state: Rc<AnnotatorState>,
    scheduler: Scheduler,
    painter: RefCell<Box<dyn Painter>>,
    style: RefCell<StyleExpression>,
    overrides: RefCell<HashMap<String, StyleExpression>>,
    filter: Rc<RefCell<Option<Filter>>>,
    visible: Cell<bool>,
    redraw: Debouncer,
    recalculate: Debouncer,
    frame: Cell<Option<FrameHandle>>,
    pending_force: Cell<bool>,
    lifecycle: Cell<Lifecycle>,
    redrawn: Channel<RedrawInfo>,
    subscriptions: RefCell<Vec<Subscription>>,
    this: Weak<Renderer>,
}

impl Renderer {
    pub fn new(
        state: Rc<AnnotatorState>,
        scheduler: Scheduler,
        painter: Box<dyn Painter>,
        filter: Rc<RefCell<Option<Filter>>>,
        redraw_debounce_ms: core_types::Millis,
        recalculate_debounce_ms: core_types::Millis,
    ) -> Rc<Self> {
        let renderer = Rc::new_cyclic(|this| Self {
            redraw: Debouncer::new(scheduler.clone(), redraw_debounce_ms),
            recalculate: Debouncer::new(scheduler.clone(), recalculate_debounce_ms),
            state,
            scheduler,
            painter: RefCell::new(painter),
            style: RefCell::new(StyleExpression::default()),
            overrides: RefCell::new(HashMap::new()),
            filter,
            visible: Cell::new(true),
            frame: Cell::new(None),
            pending_force: Cell::new(false),
            lifecycle: Cell::new(Lifecycle::Active),
            redrawn: Channel::new(),
            subscriptions: RefCell::new(Vec::new()),
            this: this.clone(),
        });
        renderer.subscribe();
        renderer.schedule_redraw(true);
        renderer
    }

    fn subscribe(&self) {
        let mut subs = Vec::new();

        let this = self.this.clone();
        subs.push(self.state.store().observe(
            Rc::new(move |_: &StoreChangeEvent| {
                if let Some(r) = this.upgrade() {
                    r.schedule_redraw(true);
                }
            }),
            ObserveOptions::default(),
        ));

        let this = self.this.clone();
        subs.push(self.state.selection().subscribe(move |_| {
            if let Some(r) = this.upgrade() {
                r.schedule_redraw(true);
            }
        }));

        let this = self.this.clone();
        subs.push(self.state.hover().subscribe(move |_| {
            if let Some(r) = this.upgrade() {
                r.schedule_redraw(true);
            }
        }));

        let this = self.this.clone();
        subs.push(self.state.on_recalculate_positions(move || {
            if let Some(r) = this.upgrade() {
                r.schedule_redraw(true);
            }
        }));

        *self.subscriptions.borrow_mut() = subs;
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    fn is_destroyed(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Destroyed
    }

    pub fn handle(&self, event: &HostEvent) {
        if self.is_destroyed() {
            return;
        }
        match event {
            HostEvent::Scroll => self.schedule_redraw(false),
            HostEvent::Resize { .. } => self.schedule_recalculate(),
            HostEvent::Mutation(records) => {
                if self.affects_layout(records) {
                    self.schedule_recalculate();
                }
            }
            HostEvent::PointerMove { x, y } => self.update_hover(*x, *y),
            _ => {}
        }
    }

    fn affects_layout(&self, records: &[MutationRecord]) -> bool {
        let layer = self.painter.borrow().layer();
        let container = self.state.container();
        let page = self.state.page().borrow();
        let doc = page.document();
        records.iter().any(|r| {
            if !doc.is_connected(r.target) {
                return false;
            }
            let own_layer = layer.is_some_and(|l| doc.contains(l, r.target));
            let own_class = r.target == container
                && matches!(&r.kind, MutationKind::Attributes { name } if name == "class");
            !own_layer && !own_class
        })
    }

    fn schedule_recalculate(&self) {
        let this = self.this.clone();
        self.recalculate.call(move || {
            if let Some(r) = this.upgrade()
                && !r.is_destroyed()
            {
                r.state.recalculate_positions();
            }
        });
    }

    fn update_hover(&self, x: f32, y: f32) {
        let hit = if self.state.selection().user_select_action() == UserSelectAction::None {
            None
        } else {
            let (cx, cy) = {
                let page = self.state.page().borrow();
                let origin = page.bounding_client_rect(self.state.container());
                (x - origin.x, y - origin.y)
            };
            let filter = self.filter.borrow().clone();
            self.state
                .get_at(cx, cy, false, filter.as_ref())
                .into_iter()
                .next()
                .map(|a| a.id)
        };
        if self.state.hover().set(hit) {
            self.sync_hover_class();
        }
    }

    fn sync_hover_class(&self) {
        let hovered = self.state.hover().current().is_some();
        let container = self.state.container();
        let mut page = self.state.page().borrow_mut();
        if let Err(err) = page
            .document_mut()
            .toggle_class(container, HOVERED_CLASS, hovered)
        {
            log::warn!(target: "annotator.renderer", "cannot mark hover: {err}");
        }
    }

    /// Queue a tick. `force` ticks repaint even if nothing visible changed.
    pub fn schedule_redraw(&self, force: bool) {
        if self.is_destroyed() {
            return;
        }
        if force {
            self.pending_force.set(true);
        }
        let this = self.this.clone();
        self.redraw.call(move || {
            if let Some(r) = this.upgrade() {
                r.request_frame();
            }
        });
    }

    fn request_frame(&self) {
        if self.is_destroyed() || self.frame.get().is_some() {
            return;
        }
        let this = self.this.clone();
        let handle = self.scheduler.request_animation_frame(move || {
            if let Some(r) = this.upgrade() {
                r.frame.set(None);
                let force = r.pending_force.replace(false);
                r.paint(force);
            }
        });
        self.frame.set(Some(handle));
    }

    fn visible_highlights(&self, viewport: &Bounds) -> Vec<Highlight> {
        let order: HashMap<String, usize> = self
            .state
            .store()
            .all()
            .into_iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();
        let filter = self.filter.borrow().clone();
        let selection = self.state.selection();
        let hover = self.state.hover();
        let mut highlights: Vec<Highlight> = self
            .state
            .get_intersecting(viewport)
            .into_iter()
            .filter(|(a, _)| filter.as_ref().is_none_or(|f| f(a)))
            .map(|(annotation, rects)| {
                let state = HighlightState {
                    selected: selection.is_selected(&annotation.id),
                    hovered: hover.is_hovered(&annotation.id),
                };
                let z_index = order.get(&annotation.id).copied().unwrap_or(usize::MAX);
                Highlight {
                    annotation,
                    rects,
                    state,
                    z_index,
                }
            })
            .collect();
        highlights.sort_by_key(|h| h.z_index);
        highlights
    }

    fn paint(&self, force: bool) {
        if self.is_destroyed() {
            return;
        }
        let (viewport, origin) = {
            let page = self.state.page().borrow();
            let origin = page.bounding_client_rect(self.state.container());
            let vp = page.viewport();
            (
                Bounds::new(-origin.x, -origin.y, vp.width - origin.x, vp.height - origin.y),
                Point::new(origin.x, origin.y),
            )
        };
        let highlights = self.visible_highlights(&viewport);
        if self.visible.get() {
            let style = self.style.borrow().clone();
            let overrides = self.overrides.borrow().clone();
            let args = RedrawArgs {
                highlights: &highlights,
                viewport,
                origin,
                style: &style,
                overrides: &overrides,
                force,
            };
            let mut page = self.state.page().borrow_mut();
            self.painter.borrow_mut().redraw(&mut page, &args);
        }
        self.sync_hover_class();
        log::trace!(target: "annotator.renderer", "painted {} highlights (force: {force})", highlights.len());
        self.redrawn.emit(&RedrawInfo {
            ids: highlights.iter().map(|h| h.id().to_string()).collect(),
            forced: force,
        });
    }

    /// Called after every tick with what was painted.
    pub fn on_redraw(&self, f: impl Fn(&RedrawInfo) + 'static) -> Subscription {
        self.redrawn.subscribe(f)
    }

    /// Replace the style of every annotation, or of `id` only.
    ///
    /// `None` restores the default look (or drops the override for `id`).
    pub fn set_style(&self, style: Option<StyleExpression>, id: Option<&str>) {
        match id {
            Some(id) => {
                let mut overrides = self.overrides.borrow_mut();
                match style {
                    Some(style) => overrides.insert(id.to_string(), style),
                    None => overrides.remove(id),
                };
            }
            None => *self.style.borrow_mut() = style.unwrap_or_default(),
        }
        self.schedule_redraw(true);
    }

    pub fn set_filter(&self, filter: Option<Filter>) {
        *self.filter.borrow_mut() = filter;
        self.schedule_redraw(true);
    }

    pub fn set_visible(&self, visible: bool) {
        if self.is_destroyed() || self.visible.replace(visible) == visible {
            return;
        }
        {
            let mut page = self.state.page().borrow_mut();
            self.painter.borrow_mut().set_visible(&mut page, visible);
        }
        self.schedule_redraw(true);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Run `f` against the painter, e.g. to read what it drew.
    pub fn with_painter<R>(&self, f: impl FnOnce(&dyn Painter) -> R) -> R {
        f(self.painter.borrow().as_ref())
    }

    pub fn destroy(&self) {
        if self.lifecycle.replace(Lifecycle::Destroyed) == Lifecycle::Destroyed {
            return;
        }
        self.redraw.cancel();
        self.recalculate.cancel();
        if let Some(frame) = self.frame.take() {
            self.scheduler.cancel_animation_frame(frame);
        }
        self.subscriptions.borrow_mut().clear();
        self.redrawn.clear();
        let container = self.state.container();
        let mut page = self.state.page().borrow_mut();
        self.painter.borrow_mut().destroy(&mut page);
        if let Err(err) = page.document_mut().remove_class(container, HOVERED_CLASS) {
            log::debug!(target: "annotator.renderer", "container gone: {err}");
        }
        log::debug!(target: "annotator.renderer", "destroyed");
    }
}
