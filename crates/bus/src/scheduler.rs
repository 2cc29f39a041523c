//! Virtual-clock event loop: timers and animation frames.
//!
//! Nothing runs until [`Scheduler::advance`] is called. Callbacks are taken
//! out of the queue before they run, so they may freely schedule or cancel
//! other work.

use core_types::Millis;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    due: Millis,
    id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

#[derive(Default)]
struct SchedulerInner {
    now: Millis,
    next_id: u64,
    timers: BTreeMap<(Millis, u64), Task>,
    frames: Vec<(u64, Task)>,
}

/// Cheap to clone; clones share one queue and one clock.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        self.inner.borrow().now
    }

    pub fn set_timeout(&self, delay: Millis, f: impl FnOnce() + 'static) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let due = inner.now + delay;
        inner.timers.insert((due, id), Box::new(f));
        TimerHandle { due, id }
    }

    /// Returns `false` if the timer already ran or was cancelled.
    pub fn clear_timeout(&self, handle: TimerHandle) -> bool {
        self.inner
            .borrow_mut()
            .timers
            .remove(&(handle.due, handle.id))
            .is_some()
    }

    pub fn request_animation_frame(&self, f: impl FnOnce() + 'static) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.frames.push((id, Box::new(f)));
        FrameHandle(id)
    }

    pub fn cancel_animation_frame(&self, handle: FrameHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.frames.len();
        inner.frames.retain(|(id, _)| *id != handle.0);
        inner.frames.len() != before
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.timers.is_empty() && inner.frames.is_empty()
    }

    fn pop_due(&self, until: Millis) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        let (&(due, id), _) = inner.timers.first_key_value()?;
        if due > until {
            return None;
        }
        inner.now = inner.now.max(due);
        inner.timers.remove(&(due, id))
    }

    /// Move the clock forward by `ms`, running every timer that falls due
    /// (including ones scheduled along the way), then one frame.
    pub fn advance(&self, ms: Millis) {
        let until = self.now() + ms;
        while let Some(task) = self.pop_due(until) {
            task();
        }
        self.inner.borrow_mut().now = until;
        self.run_frame();
    }

    /// Run the callbacks queued for the next animation frame.
    ///
    /// Frames requested while this one runs wait for the next pass.
    pub fn run_frame(&self) {
        let frames = std::mem::take(&mut self.inner.borrow_mut().frames);
        if !frames.is_empty() {
            log::trace!(target: "bus.scheduler", "frame with {} callbacks", frames.len());
        }
        for (_, task) in frames {
            task();
        }
    }

    /// Advance in `step` increments until nothing is queued or `max_steps`
    /// passes have run. Returns `true` if the queue drained.
    pub fn run_until_idle(&self, step: Millis, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if self.is_idle() {
                return true;
            }
            self.advance(step);
        }
        self.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn log_into(log: &Rc<RefCell<Vec<&'static str>>>, what: &'static str) -> impl FnOnce() + 'static {
        let log = Rc::clone(log);
        move || log.borrow_mut().push(what)
    }

    #[test]
    fn timers_fire_in_due_order() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        s.set_timeout(20, log_into(&log, "b"));
        s.set_timeout(10, log_into(&log, "a"));
        s.set_timeout(20, log_into(&log, "c"));
        s.advance(15);
        assert_eq!(*log.borrow(), vec!["a"]);
        s.advance(5);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(s.now(), 20);
    }

    #[test]
    fn cancelled_timers_do_not_fire() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let h = s.set_timeout(5, log_into(&log, "x"));
        assert!(s.clear_timeout(h));
        assert!(!s.clear_timeout(h));
        s.advance(10);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn nested_timers_run_within_the_same_advance() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = s.clone();
        let l = Rc::clone(&log);
        s.set_timeout(10, move || {
            l.borrow_mut().push("outer");
            inner.set_timeout(0, log_into(&l, "inner"));
        });
        s.advance(10);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn frames_run_after_timers_and_requeue_for_next_pass() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let again = s.clone();
        let l = Rc::clone(&log);
        s.request_animation_frame(move || {
            l.borrow_mut().push("frame1");
            again.request_animation_frame(log_into(&l, "frame2"));
        });
        s.set_timeout(0, log_into(&log, "timer"));
        s.advance(0);
        assert_eq!(*log.borrow(), vec!["timer", "frame1"]);
        assert_eq!(s.pending_frames(), 1);
        s.advance(16);
        assert_eq!(*log.borrow(), vec!["timer", "frame1", "frame2"]);
    }

    #[test]
    fn cancel_animation_frame() {
        let s = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let h = s.request_animation_frame(log_into(&log, "x"));
        assert!(s.cancel_animation_frame(h));
        s.run_frame();
        assert!(log.borrow().is_empty());
        assert!(s.run_until_idle(16, 4));
    }
}
