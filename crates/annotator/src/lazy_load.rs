//! Adding annotations whose text may not be in the DOM yet.

use bus::{Scheduler, TimerHandle};
use core_types::Millis;
use std::cell::RefCell;
use std::rc::Rc;
use store::{Annotation, AnnotationStore, Origin};

type Completion = Box<dyn FnOnce(Vec<Annotation>)>;

struct RetryInner {
    store: Rc<dyn AnnotationStore>,
    scheduler: Scheduler,
    pending: Vec<Annotation>,
    attempts: u32,
    max_attempts: u32,
    delay: Millis,
    timer: Option<TimerHandle>,
    on_done: Option<Completion>,
}

/// Bulk-adds annotations, retrying the ones that fail to anchor.
///
/// Each attempt re-submits only what is still missing. After
/// `max_attempts` the rest is given up on and reported to the completion
/// callback, which also runs (with an empty list) on full success.
#[derive(Clone)]
pub struct RetryTask {
    inner: Rc<RefCell<RetryInner>>,
}

impl RetryTask {
    /// The first attempt runs immediately.
    pub fn start(
        store: Rc<dyn AnnotationStore>,
        scheduler: Scheduler,
        annotations: Vec<Annotation>,
        max_attempts: u32,
        delay: Millis,
        on_done: impl FnOnce(Vec<Annotation>) + 'static,
    ) -> Self {
        let task = Self {
            inner: Rc::new(RefCell::new(RetryInner {
                store,
                scheduler,
                pending: annotations,
                attempts: 0,
                max_attempts: max_attempts.max(1),
                delay,
                timer: None,
                on_done: Some(Box::new(on_done)),
            })),
        };
        attempt(&task.inner);
        task
    }

    pub fn attempts(&self) -> u32 {
        self.inner.borrow().attempts
    }

    /// Annotations not added yet.
    pub fn remaining(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn is_done(&self) -> bool {
        self.inner.borrow().on_done.is_none()
    }

    /// Stop retrying. The completion callback does not run.
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(timer) = inner.timer.take() {
            inner.scheduler.clear_timeout(timer);
        }
        inner.on_done = None;
    }
}

fn attempt(inner: &Rc<RefCell<RetryInner>>) {
    let (store, pending) = {
        let mut state = inner.borrow_mut();
        state.timer = None;
        if state.on_done.is_none() {
            return;
        }
        state.attempts += 1;
        (Rc::clone(&state.store), std::mem::take(&mut state.pending))
    };
    let total = pending.len();
    let failed = store.bulk_add_annotations(pending, false, Origin::Remote);

    let mut state = inner.borrow_mut();
    log::debug!(
        target: "annotator.lazy",
        "attempt {}: {} of {total} added",
        state.attempts,
        total - failed.len()
    );
    if failed.is_empty() || state.attempts >= state.max_attempts {
        if !failed.is_empty() {
            log::warn!(
                target: "annotator.lazy",
                "giving up on {} annotations after {} attempts",
                failed.len(),
                state.attempts
            );
        }
        let on_done = state.on_done.take();
        drop(state);
        if let Some(on_done) = on_done {
            on_done(failed);
        }
        return;
    }

    state.pending = failed;
    let weak = Rc::downgrade(inner);
    let timer = state.scheduler.set_timeout(state.delay, move || {
        if let Some(inner) = weak.upgrade() {
            attempt(&inner);
        }
    });
    state.timer = Some(timer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotatorConfig;
    use crate::state::AnnotatorState;
    use anchoring::TextSelector;
    use html::Document;
    use layout::{FixedWidthMeasurer, Page};
    use std::cell::Cell;
    use store::{AnnotationTarget, MemoryStore};

    fn annotation(id: &str, exact: &str, start: usize, end: usize) -> Annotation {
        Annotation::from_target(AnnotationTarget::new(
            id,
            vec![TextSelector::new(exact, start, end).into()],
        ))
    }

    #[test]
    fn retries_until_text_arrives() {
        let doc = Document::from_html(r#"<div id="c"><p id="p">The quick</p></div>"#);
        let c = doc.get_element_by_id("c").unwrap();
        let page = Rc::new(RefCell::new(Page::new(doc, FixedWidthMeasurer::default(), 800.0, 600.0)));
        let state = AnnotatorState::new(MemoryStore::new(), Rc::clone(&page), c, &AnnotatorConfig::default());
        let scheduler = Scheduler::new();
        let report = Rc::new(RefCell::new(None));
        let r = Rc::clone(&report);
        let task = RetryTask::start(
            Rc::clone(state.store()),
            scheduler.clone(),
            vec![annotation("now", "quick", 4, 9), annotation("later", "brown", 10, 15)],
            5,
            100,
            move |failed| *r.borrow_mut() = Some(failed),
        );
        assert_eq!(task.attempts(), 1);
        assert_eq!(task.remaining(), 1);
        assert!(state.store().get_annotation("now").is_some());

        scheduler.advance(100);
        assert_eq!(task.attempts(), 2);

        {
            let mut page = page.borrow_mut();
            let doc = page.document_mut();
            let p = doc.get_element_by_id("p").unwrap();
            doc.set_text_content(p, "The quick brown fox").unwrap();
        }
        scheduler.advance(100);
        assert!(task.is_done());
        assert_eq!(report.borrow().as_deref(), Some(&[][..]));
        assert!(state.store().get_annotation("later").is_some());
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let doc = Document::from_html(r#"<div id="c"><p>short</p></div>"#);
        let c = doc.get_element_by_id("c").unwrap();
        let page = Rc::new(RefCell::new(Page::new(doc, FixedWidthMeasurer::default(), 800.0, 600.0)));
        let state = AnnotatorState::new(MemoryStore::new(), page, c, &AnnotatorConfig::default());
        let scheduler = Scheduler::new();
        let gave_up = Rc::new(Cell::new(0));
        let g = Rc::clone(&gave_up);
        let task = RetryTask::start(
            Rc::clone(state.store()),
            scheduler.clone(),
            vec![annotation("x", "missing", 40, 47)],
            3,
            10,
            move |failed| g.set(failed.len()),
        );
        scheduler.run_until_idle(10, 100);
        assert_eq!(task.attempts(), 3);
        assert_eq!(gave_up.get(), 1);
    }

    #[test]
    fn cancel_stops_retrying() {
        let doc = Document::from_html(r#"<div id="c"><p>short</p></div>"#);
        let c = doc.get_element_by_id("c").unwrap();
        let page = Rc::new(RefCell::new(Page::new(doc, FixedWidthMeasurer::default(), 800.0, 600.0)));
        let state = AnnotatorState::new(MemoryStore::new(), page, c, &AnnotatorConfig::default());
        let scheduler = Scheduler::new();
        let task = RetryTask::start(
            Rc::clone(state.store()),
            scheduler.clone(),
            vec![annotation("x", "missing", 40, 47)],
            3,
            10,
            |_| panic!("cancelled task completed"),
        );
        task.cancel();
        assert!(scheduler.is_idle());
        scheduler.advance(100);
        assert_eq!(task.attempts(), 1);
    }
}
