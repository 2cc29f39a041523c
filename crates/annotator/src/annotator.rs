use crate::SharedPage;
use crate::config::{AnnotatorConfig, RendererKind};
use crate::highlight::{Filter, StyleExpression};
use crate::lazy_load::RetryTask;
use crate::renderer::{
    CanvasPainter, HighlightsPainter, Painter, RedrawInfo, Renderer, SpanPainter,
};
use crate::selection_handler::SelectionHandler;
use crate::state::AnnotatorState;
use bus::{HostEvent, Scheduler, Subscription};
use core_types::{Bounds, Rect};
use html::{Document, NodeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use store::{
    Annotation, AnnotationStore, AnnotationTarget, MemoryStore, Origin, StoreError, User,
};

/// Text annotation on one container element of a page.
///
/// Wires the store, the selection handler and the renderer together. Host
/// events go in through [`TextAnnotator::handle_event`]; DOM changes made
/// through [`TextAnnotator::mutate_dom`] are observed like any other
/// mutation.
pub struct TextAnnotator {
    page: SharedPage,
    scheduler: Scheduler,
    config: AnnotatorConfig,
    state: Rc<AnnotatorState>,
    handler: Rc<SelectionHandler>,
    renderer: Rc<Renderer>,
    user: Rc<RefCell<User>>,
    filter: Rc<RefCell<Option<Filter>>>,
    lazy: RefCell<Vec<RetryTask>>,
    destroyed: Cell<bool>,
}

impl TextAnnotator {
    pub fn new(
        page: SharedPage,
        container: NodeId,
        scheduler: Scheduler,
        config: AnnotatorConfig,
    ) -> Self {
        Self::with_store(MemoryStore::new(), page, container, scheduler, config)
    }

    /// Annotate on top of `store`, which gets wrapped in a revival layer.
    pub fn with_store<S: AnnotationStore + 'static>(
        store: S,
        page: SharedPage,
        container: NodeId,
        scheduler: Scheduler,
        config: AnnotatorConfig,
    ) -> Self {
        let state = Rc::new(AnnotatorState::new(store, Rc::clone(&page), container, &config));
        let user = Rc::new(RefCell::new(User::anonymous()));
        let filter: Rc<RefCell<Option<Filter>>> = Rc::new(RefCell::new(None));

        let painter: Box<dyn Painter> = match config.renderer {
            RendererKind::Spans => Box::new(SpanPainter::new(&mut page.borrow_mut(), container)),
            RendererKind::Highlights => Box::new(HighlightsPainter::new()),
            RendererKind::Canvas => Box::new(CanvasPainter::new()),
        };
        // setup writes (the span layer) are not content changes
        page.borrow_mut().document_mut().take_mutations();

        let handler = SelectionHandler::new(
            Rc::clone(&state),
            scheduler.clone(),
            config.clone(),
            Rc::clone(&user),
            Rc::clone(&filter),
        );
        let renderer = Renderer::new(
            Rc::clone(&state),
            scheduler.clone(),
            painter,
            Rc::clone(&filter),
            config.redraw_debounce_ms,
            config.recalculate_debounce_ms,
        );
        log::debug!(target: "annotator", "attached to {container} ({:?} renderer)", config.renderer);

        Self {
            page,
            scheduler,
            config,
            state,
            handler,
            renderer,
            user,
            filter,
            lazy: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        }
    }

    pub fn page(&self) -> &SharedPage {
        &self.page
    }

    pub fn container(&self) -> NodeId {
        self.state.container()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn state(&self) -> &AnnotatorState {
        &self.state
    }

    pub fn store(&self) -> &Rc<dyn AnnotationStore> {
        self.state.store()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn selection_handler(&self) -> &SelectionHandler {
        &self.handler
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    // ---- store ----

    /// Returns `false` (and logs) if the annotation cannot be anchored or exists.
    pub fn add_annotation(&self, annotation: Annotation) -> bool {
        match self.store().add_annotation(annotation, Origin::Remote) {
            Ok(()) => true,
            Err(err) => {
                log::warn!(target: "annotator", "add_annotation: {err}");
                false
            }
        }
    }

    /// Returns the annotations that were not added.
    pub fn bulk_add_annotations(
        &self,
        annotations: Vec<Annotation>,
        replace: bool,
        origin: Origin,
    ) -> Vec<Annotation> {
        self.store().bulk_add_annotations(annotations, replace, origin)
    }

    pub fn update_annotation(&self, annotation: Annotation) -> Result<(), StoreError> {
        self.store().update_annotation(annotation, Origin::Remote)
    }

    pub fn update_target(&self, target: AnnotationTarget) -> Result<(), StoreError> {
        self.store().update_target(target, Origin::Remote)
    }

    pub fn delete_annotation(&self, id: &str) -> Option<Annotation> {
        self.store().delete_annotation(id, Origin::Remote)
    }

    pub fn get_annotation(&self, id: &str) -> Option<Annotation> {
        self.store().get_annotation(id)
    }

    pub fn get_annotations(&self) -> Vec<Annotation> {
        self.store().all()
    }

    pub fn clear_annotations(&self) {
        self.store().clear(Origin::Remote);
    }

    /// Add annotations, retrying those whose text is not in the DOM yet.
    pub fn load_lazily(&self, annotations: Vec<Annotation>) -> RetryTask {
        let task = RetryTask::start(
            Rc::clone(self.store()),
            self.scheduler.clone(),
            annotations,
            self.config.lazy_max_attempts,
            self.config.lazy_retry_delay_ms,
            |failed| {
                if !failed.is_empty() {
                    let ids: Vec<&str> = failed.iter().map(|a| a.id.as_str()).collect();
                    log::warn!(target: "annotator", "could not anchor {ids:?}");
                }
            },
        );
        let mut lazy = self.lazy.borrow_mut();
        lazy.retain(|t| !t.is_done());
        lazy.push(task.clone());
        task
    }

    // ---- geometry ----

    /// Annotations under a container-relative point, honouring the filter.
    pub fn get_at(&self, x: f32, y: f32, all: bool) -> Vec<Annotation> {
        let filter = self.filter.borrow().clone();
        self.state.get_at(x, y, all, filter.as_ref())
    }

    pub fn get_intersecting(&self, bounds: &Bounds) -> Vec<(Annotation, Vec<Rect>)> {
        self.state.get_intersecting(bounds)
    }

    pub fn get_annotation_bounds(&self, id: &str) -> Option<Bounds> {
        self.state.get_annotation_bounds(id)
    }

    pub fn get_annotation_rects(&self, id: &str) -> Option<Vec<Rect>> {
        self.state.get_annotation_rects(id)
    }

    pub fn recalculate_positions(&self) {
        self.state.recalculate_positions();
    }

    pub fn on_recalculate_positions(&self, f: impl Fn() + 'static) -> Subscription {
        self.state.on_recalculate_positions(f)
    }

    /// Scroll the window so the annotation is centred in `scroll_parent`
    /// (or the viewport). Returns `false` if it has no geometry.
    pub fn scroll_into_view(&self, id: &str, scroll_parent: Option<NodeId>) -> bool {
        if self.store().get_annotation(id).is_none() {
            return false;
        }
        let Some(bounds) = self.state.get_annotation_bounds(id) else {
            log::debug!(target: "annotator", "scroll_into_view: {id} has no geometry");
            return false;
        };
        {
            let mut page = self.page.borrow_mut();
            let origin = page.bounding_client_rect(self.container());
            let target = bounds.to_rect().translate(origin.x, origin.y);
            let area = match scroll_parent {
                Some(parent) => page.bounding_client_rect(parent),
                None => {
                    let vp = page.viewport();
                    Rect::new(0.0, 0.0, vp.width, vp.height)
                }
            };
            let dx = (target.x + target.width / 2.0) - (area.x + area.width / 2.0);
            let dy = (target.y + target.height / 2.0) - (area.y + area.height / 2.0);
            page.scroll_by(dx, dy);
        }
        self.renderer.handle(&HostEvent::Scroll);
        true
    }

    // ---- rendering ----

    pub fn set_style(&self, style: Option<StyleExpression>, id: Option<&str>) {
        self.renderer.set_style(style, id);
    }

    pub fn set_filter(&self, filter: Option<Filter>) {
        self.renderer.set_filter(filter);
    }

    pub fn set_visible(&self, visible: bool) {
        self.renderer.set_visible(visible);
    }

    pub fn on_redraw(&self, f: impl Fn(&RedrawInfo) + 'static) -> Subscription {
        self.renderer.on_redraw(f)
    }

    // ---- user & selection ----

    pub fn set_user(&self, user: User) {
        *self.user.borrow_mut() = user;
    }

    pub fn get_user(&self) -> User {
        self.user.borrow().clone()
    }

    /// Select annotations programmatically. Unknown ids are ignored.
    pub fn set_selected(&self, ids: &[String], editable: bool) {
        let known: Vec<String> = ids
            .iter()
            .filter(|id| self.store().get_annotation(id).is_some())
            .cloned()
            .collect();
        self.state.selection().set_selected(&known, editable);
    }

    pub fn cancel_selected(&self) {
        self.handler.cancel_selected();
    }

    // ---- host ----

    pub fn handle_event(&self, event: &HostEvent) {
        if self.destroyed.get() {
            return;
        }
        log::trace!(target: "annotator", "event {}", event.name());
        self.handler.handle(event);
        self.renderer.handle(event);
    }

    /// Change the DOM, then deliver the resulting mutation records.
    pub fn mutate_dom<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(self.page.borrow_mut().document_mut());
        self.flush_mutations();
        result
    }

    /// Deliver pending mutation records, like a `MutationObserver` callback.
    pub fn flush_mutations(&self) {
        let records = self.page.borrow_mut().document_mut().take_mutations();
        if !records.is_empty() {
            self.handle_event(&HostEvent::Mutation(records));
        }
    }

    /// Detach: pending timers and frames are cancelled and the painter
    /// removes what it drew. Later calls are no-ops.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for task in self.lazy.borrow_mut().drain(..) {
            task.cancel();
        }
        self.handler.destroy();
        self.renderer.destroy();
        log::debug!(target: "annotator", "destroyed");
    }
}
