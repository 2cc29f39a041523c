//! Turns pointer and selection events into annotations.
//!
//! A press starts a gesture. If the native selection grows while the press
//! is down, the selected text becomes a target that is written to the store
//! as soon as it is non-empty and kept up to date while the drag continues.
//! A quick press-release that leaves no selection is a click instead and
//! selects whatever annotation is under the pointer.

use crate::config::{AnnotatorConfig, SelectionMode};
use crate::highlight::Filter;
use crate::state::AnnotatorState;
use anchoring::{
    is_not_annotatable, is_whitespace_or_empty, range_to_selector_entry, same_anchors,
    split_annotatable_ranges, trim_range_to_container,
};
use bus::{HostEvent, PointerButton, Scheduler, TimerHandle};
use chrono::Utc;
use core_types::Millis;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use store::{Annotation, AnnotationTarget, Origin, User};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandlerPhase {
    #[default]
    Idle,
    /// Button down, nothing selected yet.
    Pending,
    /// A target exists and follows the native selection.
    Selecting,
    /// The last gesture produced or updated an annotation.
    Committed,
}

#[derive(Clone, Copy, Debug)]
struct PointerDown {
    at: Millis,
    primary: bool,
    annotatable: bool,
}

#[derive(Default)]
struct HandlerInner {
    phase: HandlerPhase,
    last_down: Option<PointerDown>,
    current: Option<AnnotationTarget>,
    pending_up: Option<TimerHandle>,
    destroyed: bool,
}

pub struct SelectionHandler {
    state: Rc<AnnotatorState>,
    scheduler: Scheduler,
    config: AnnotatorConfig,
    user: Rc<RefCell<User>>,
    filter: Rc<RefCell<Option<Filter>>>,
    inner: RefCell<HandlerInner>,
    this: Weak<SelectionHandler>,
}

impl SelectionHandler {
    pub fn new(
        state: Rc<AnnotatorState>,
        scheduler: Scheduler,
        config: AnnotatorConfig,
        user: Rc<RefCell<User>>,
        filter: Rc<RefCell<Option<Filter>>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            state,
            scheduler,
            config,
            user,
            filter,
            inner: RefCell::new(HandlerInner::default()),
            this: this.clone(),
        })
    }

    pub fn phase(&self) -> HandlerPhase {
        self.inner.borrow().phase
    }

    /// The target being selected, if a gesture is in progress.
    pub fn current_target(&self) -> Option<AnnotationTarget> {
        self.inner.borrow().current.clone()
    }

    pub fn handle(&self, event: &HostEvent) {
        if self.inner.borrow().destroyed {
            return;
        }
        match event {
            HostEvent::PointerDown { button, x, y } => self.pointer_down(*button, *x, *y),
            HostEvent::PointerUp { button, x, y } => self.pointer_up(*button, *x, *y),
            HostEvent::SelectStart => self.select_start(),
            HostEvent::SelectionChange => self.selection_change(),
            HostEvent::KeyDown { key } if key == "Escape" => self.cancel(),
            _ => {}
        }
    }

    /// Clear the user selection and the native one.
    pub fn cancel_selected(&self) {
        self.state.selection().clear();
        self.state.page().borrow_mut().selection_mut().remove_all_ranges();
    }

    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.destroyed = true;
        inner.current = None;
        if let Some(handle) = inner.pending_up.take() {
            self.scheduler.clear_timeout(handle);
        }
    }

    fn annotatable_at(&self, x: f32, y: f32) -> bool {
        let page = self.state.page().borrow();
        let doc = page.document();
        let container = self.state.container();
        page.caret_from_client_point(x, y)
            .is_some_and(|p| doc.contains(container, p.node) && !is_not_annotatable(doc, p.node))
    }

    fn pointer_down(&self, button: PointerButton, x: f32, y: f32) {
        let down = PointerDown {
            at: self.scheduler.now(),
            primary: button == PointerButton::Primary,
            annotatable: self.annotatable_at(x, y),
        };
        let mut inner = self.inner.borrow_mut();
        inner.last_down = Some(down);
        if !down.primary {
            return;
        }
        if down.annotatable {
            inner.phase = HandlerPhase::Pending;
        } else {
            inner.current = None;
            inner.phase = HandlerPhase::Idle;
        }
    }

    fn skeleton(&self) -> AnnotationTarget {
        AnnotationTarget {
            annotation: Uuid::new_v4().to_string(),
            selector: Vec::new(),
            creator: Some(self.user.borrow().clone()),
            created: Some(Utc::now()),
            updated: None,
        }
    }

    fn select_start(&self) {
        let mut inner = self.inner.borrow_mut();
        let down = inner.last_down;
        if down.is_some_and(|d| !d.primary) {
            return;
        }
        if down.is_none_or(|d| d.annotatable) {
            inner.current = Some(self.skeleton());
            inner.phase = HandlerPhase::Selecting;
        } else {
            inner.current = None;
        }
    }

    fn selection_change(&self) {
        let container = self.state.container();

        // only selections anchored in annotatable container text count
        let anchor_ok = {
            let page = self.state.page().borrow();
            let doc = page.document();
            page.selection().anchor().is_some_and(|a| {
                doc.contains(container, a.node) && !is_not_annotatable(doc, a.node)
            })
        };
        if !anchor_ok {
            self.inner.borrow_mut().current = None;
            return;
        }

        // selectstart is not guaranteed to fire before the first change
        let (recent, has_target) = {
            let inner = self.inner.borrow();
            let now = self.scheduler.now();
            let recent = inner
                .last_down
                .is_none_or(|d| now.saturating_sub(d.at) < self.config.selection_start_window_ms);
            (recent, inner.current.is_some())
        };
        if recent && !has_target {
            self.select_start();
        }
        let Some(mut target) = self.inner.borrow().current.clone() else {
            return;
        };

        let collapsed = self.state.page().borrow().selection().is_collapsed();
        if collapsed {
            self.discard_collapsed(&mut target);
            return;
        }

        let selectors = {
            let page = self.state.page().borrow();
            let doc = page.document();
            let Some(range) = page.selection().range(doc) else {
                return;
            };
            let contained = trim_range_to_container(doc, &range, container);
            if is_whitespace_or_empty(doc, &contained) {
                return;
            }
            split_annotatable_ranges(doc, &contained, container)
                .iter()
                .map(|r| range_to_selector_entry(doc, r, container, self.state.anchor_options()))
                .collect::<Vec<_>>()
        };
        if selectors.is_empty() {
            return;
        }
        let changed = selectors.len() != target.selector.len()
            || selectors
                .iter()
                .zip(&target.selector)
                .any(|(a, b)| a.quote() != b.quote());
        if !changed {
            return;
        }

        target.selector = selectors;
        target.updated = Some(Utc::now());
        self.inner.borrow_mut().current = Some(target.clone());

        let store = self.state.store();
        if store.get_annotation(&target.annotation).is_some() {
            if let Err(err) = store.update_target(target.clone(), Origin::Local) {
                log::warn!(target: "annotator.selection", "dropping selection: {err}");
                self.inner.borrow_mut().current = None;
            }
            return;
        }
        self.state.selection().clear();
        let id = target.annotation.clone();
        match store.add_annotation(Annotation::from_target(target), Origin::Local) {
            Ok(()) => {
                log::debug!(target: "annotator.selection", "created {id}");
                self.state.selection().user_select(&id);
            }
            Err(err) => {
                log::warn!(target: "annotator.selection", "dropping selection: {err}");
                self.inner.borrow_mut().current = None;
            }
        }
    }

    /// The selection collapsed mid-gesture: the annotation it produced goes.
    fn discard_collapsed(&self, target: &mut AnnotationTarget) {
        if target.selector.is_empty() {
            return;
        }
        let store = self.state.store();
        if store.get_annotation(&target.annotation).is_some() {
            self.state.selection().clear();
            store.delete_annotation(&target.annotation, Origin::Local);
            log::debug!(target: "annotator.selection", "discarded collapsed {}", target.annotation);
        }
        target.selector.clear();
        self.inner.borrow_mut().current = Some(target.clone());
    }

    fn pointer_up(&self, button: PointerButton, x: f32, y: f32) {
        let Some(down) = self.inner.borrow().last_down else {
            return;
        };
        if !down.primary || button != PointerButton::Primary || !self.annotatable_at(x, y) {
            return;
        }
        let elapsed = self.scheduler.now().saturating_sub(down.at);

        // the native selection settles after pointerup; look at it next tick
        let this = self.this.clone();
        let handle = self.scheduler.set_timeout(0, move || {
            if let Some(handler) = this.upgrade() {
                handler.inner.borrow_mut().pending_up = None;
                handler.finish_pointer_up(x, y, elapsed);
            }
        });
        if let Some(previous) = self.inner.borrow_mut().pending_up.replace(handle) {
            self.scheduler.clear_timeout(previous);
        }
    }

    fn finish_pointer_up(&self, x: f32, y: f32, elapsed: Millis) {
        if self.inner.borrow().destroyed {
            return;
        }
        let collapsed = self.state.page().borrow().selection().is_collapsed();
        if collapsed && elapsed < self.config.click_timeout_ms {
            {
                let mut inner = self.inner.borrow_mut();
                inner.current = None;
                inner.phase = HandlerPhase::Idle;
            }
            self.click_select(x, y);
            return;
        }

        let target = self.inner.borrow_mut().current.take();
        match target {
            Some(target) if !target.selector.is_empty() => {
                self.upsert(&target);
                self.state.selection().user_select(&target.annotation);
                self.inner.borrow_mut().phase = HandlerPhase::Committed;
            }
            _ => self.inner.borrow_mut().phase = HandlerPhase::Idle,
        }
    }

    fn upsert(&self, target: &AnnotationTarget) {
        let store = self.state.store();
        let result = match store.get_annotation(&target.annotation) {
            Some(existing) if same_anchors(&existing.target.selector, &target.selector) => Ok(()),
            Some(_) => store.update_target(target.clone(), Origin::Local),
            None => store.add_annotation(Annotation::from_target(target.clone()), Origin::Local),
        };
        if let Err(err) = result {
            log::warn!(target: "annotator.selection", "could not commit {}: {err}", target.annotation);
        }
    }

    fn click_select(&self, x: f32, y: f32) {
        let (cx, cy) = {
            let page = self.state.page().borrow();
            let origin = page.bounding_client_rect(self.state.container());
            (x - origin.x, y - origin.y)
        };
        let all = self.config.selection_mode == SelectionMode::All;
        let filter = self.filter.borrow().clone();
        let hits = self.state.get_at(cx, cy, all, filter.as_ref());
        let selection = self.state.selection();
        if hits.is_empty() {
            if !selection.is_empty() {
                selection.clear();
            }
            return;
        }
        let ids: Vec<String> = hits.into_iter().map(|a| a.id).collect();
        let current = selection.ids();
        let same = current.len() == ids.len() && current.iter().all(|id| ids.contains(id));
        if !same {
            selection.user_select_all(&ids);
        }
    }

    fn cancel(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.current = None;
            inner.phase = HandlerPhase::Idle;
        }
        self.cancel_selected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::{BoundaryPoint, Document};
    use layout::{FixedWidthMeasurer, Page};
    use std::cell::RefCell;
    use store::MemoryStore;

    struct Fixture {
        handler: Rc<SelectionHandler>,
        state: Rc<AnnotatorState>,
        scheduler: Scheduler,
    }

    fn fixture(markup: &str) -> Fixture {
        let doc = Document::from_html(markup);
        let c = doc.get_element_by_id("c").unwrap();
        let page = Rc::new(RefCell::new(Page::new(
            doc,
            FixedWidthMeasurer::default(),
            800.0,
            600.0,
        )));
        let config = AnnotatorConfig::default();
        let state = Rc::new(AnnotatorState::new(MemoryStore::new(), page, c, &config));
        let scheduler = Scheduler::new();
        let handler = SelectionHandler::new(
            Rc::clone(&state),
            scheduler.clone(),
            config,
            Rc::new(RefCell::new(User::new("tester"))),
            Rc::new(RefCell::new(None)),
        );
        Fixture {
            handler,
            state,
            scheduler,
        }
    }

    fn first_text(state: &AnnotatorState) -> html::NodeId {
        let page = state.page().borrow();
        html::traverse::TextNodes::new(page.document(), state.container())
            .next()
            .unwrap()
    }

    fn select(state: &AnnotatorState, s: usize, e: usize) {
        let t = first_text(state);
        state
            .page()
            .borrow_mut()
            .selection_mut()
            .set_base_and_extent(BoundaryPoint::new(t, s), BoundaryPoint::new(t, e));
    }

    #[test]
    fn drag_creates_then_updates_one_annotation() {
        let f = fixture(r#"<div id="c"><p>The quick brown fox</p></div>"#);
        f.handler.handle(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x: 82.0,
            y: 8.0,
        });
        assert_eq!(f.handler.phase(), HandlerPhase::Pending);
        f.handler.handle(&HostEvent::SelectStart);
        assert_eq!(f.handler.phase(), HandlerPhase::Selecting);

        f.scheduler.advance(50);
        select(&f.state, 10, 13);
        f.handler.handle(&HostEvent::SelectionChange);
        let all = f.state.store().all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].target.quote(), "bro");
        assert_eq!(all[0].target.creator.as_ref().unwrap().id, "tester");

        f.scheduler.advance(50);
        select(&f.state, 10, 15);
        f.handler.handle(&HostEvent::SelectionChange);
        let all = f.state.store().all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].target.quote(), "brown");

        f.scheduler.advance(400);
        f.handler.handle(&HostEvent::PointerUp {
            button: PointerButton::Primary,
            x: 118.0,
            y: 8.0,
        });
        f.scheduler.advance(0);
        assert_eq!(f.handler.phase(), HandlerPhase::Committed);
        assert_eq!(f.state.selection().ids(), vec![all[0].id.clone()]);
        assert!(f.handler.current_target().is_none());
    }

    #[test]
    fn collapsing_mid_drag_discards() {
        let f = fixture(r#"<div id="c"><p>The quick brown fox</p></div>"#);
        f.handler.handle(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x: 82.0,
            y: 8.0,
        });
        select(&f.state, 10, 15);
        f.handler.handle(&HostEvent::SelectionChange);
        assert_eq!(f.state.store().all().len(), 1);

        select(&f.state, 10, 10);
        f.handler.handle(&HostEvent::SelectionChange);
        assert!(f.state.store().all().is_empty());
        assert!(f.state.selection().is_empty());
    }

    #[test]
    fn late_selection_change_without_selectstart_is_ignored() {
        let f = fixture(r#"<div id="c"><p>The quick brown fox</p></div>"#);
        f.handler.handle(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x: 82.0,
            y: 8.0,
        });
        f.scheduler.advance(1500);
        select(&f.state, 10, 15);
        f.handler.handle(&HostEvent::SelectionChange);
        assert!(f.state.store().all().is_empty());
    }

    #[test]
    fn whitespace_selection_creates_nothing() {
        let f = fixture(r#"<div id="c"><p>The quick brown fox</p></div>"#);
        f.handler.handle(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x: 82.0,
            y: 8.0,
        });
        select(&f.state, 9, 10);
        f.handler.handle(&HostEvent::SelectionChange);
        assert!(f.state.store().all().is_empty());
    }

    #[test]
    fn press_outside_container_is_not_annotatable() {
        let f = fixture(
            r#"<div id="c"><p>The quick brown fox</p></div><p class="not-annotatable">menu</p>"#,
        );
        f.handler.handle(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x: 10.0,
            y: 20.0,
        });
        assert_eq!(f.handler.phase(), HandlerPhase::Idle);
        f.handler.handle(&HostEvent::SelectStart);
        assert!(f.handler.current_target().is_none());
    }

    #[test]
    fn selection_anchored_outside_the_container_is_ignored() {
        let f = fixture(r#"<p id="o">Outside text</p><div id="c"><p>The quick brown fox</p></div>"#);
        let inside = first_text(&f.state);
        let outside = {
            let page = f.state.page().borrow();
            let o = page.document().get_element_by_id("o").unwrap();
            page.document().children(o)[0]
        };
        f.state
            .page()
            .borrow_mut()
            .selection_mut()
            .set_base_and_extent(BoundaryPoint::new(outside, 0), BoundaryPoint::new(inside, 9));
        f.handler.handle(&HostEvent::SelectionChange);
        assert!(f.state.store().all().is_empty());
        assert!(f.handler.current_target().is_none());

        // keyboard selection inside the container still annotates
        select(&f.state, 4, 9);
        f.handler.handle(&HostEvent::SelectionChange);
        let all = f.state.store().all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].target.quote(), "quick");
    }

    #[test]
    fn escape_clears_pending_target_and_selection() {
        let f = fixture(r#"<div id="c"><p>The quick brown fox</p></div>"#);
        f.handler.handle(&HostEvent::PointerDown {
            button: PointerButton::Primary,
            x: 82.0,
            y: 8.0,
        });
        f.handler.handle(&HostEvent::SelectStart);
        select(&f.state, 10, 15);
        f.handler.handle(&HostEvent::KeyDown {
            key: "Escape".into(),
        });
        assert!(f.handler.current_target().is_none());
        assert!(f.state.page().borrow().selection().is_collapsed());
    }
}
