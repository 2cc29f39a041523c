use crate::scheduler::{Scheduler, TimerHandle};
use core_types::Millis;
use std::cell::Cell;
use std::rc::Rc;

/// Trailing-edge debounce: each call restarts the delay and only the last
/// callback runs once things go quiet.
pub struct Debouncer {
    scheduler: Scheduler,
    delay: Millis,
    pending: Rc<Cell<Option<TimerHandle>>>,
}

impl Debouncer {
    pub fn new(scheduler: Scheduler, delay: Millis) -> Self {
        Self {
            scheduler,
            delay,
            pending: Rc::new(Cell::new(None)),
        }
    }

    pub fn delay(&self) -> Millis {
        self.delay
    }

    pub fn call(&self, f: impl FnOnce() + 'static) {
        self.cancel();
        let pending = Rc::clone(&self.pending);
        let handle = self.scheduler.set_timeout(self.delay, move || {
            pending.set(None);
            f();
        });
        self.pending.set(Some(handle));
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.clear_timeout(handle);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
