//! Synchronous publish/subscribe.
//!
//! Delivery is in subscription order on the emitting thread. The listener
//! list is snapshotted before delivery, so a listener may subscribe,
//! unsubscribe or emit again while being called. A listener removed during
//! delivery is not called afterwards.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

impl<T> Listeners<T> {
    fn remove(&mut self, id: u64) {
        self.entries.retain(|(i, _)| *i != id);
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(i, _)| *i == id)
    }
}

/// Unsubscribes when dropped. Use [`Subscription::detach`] to keep the
/// listener for the lifetime of the channel.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that does nothing.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub struct Channel<T> {
    listeners: Rc<RefCell<Listeners<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut l = self.listeners.borrow_mut();
            let id = l.next_id;
            l.next_id += 1;
            l.entries.push((id, Rc::new(f)));
            id
        };
        let weak: Weak<RefCell<Listeners<T>>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().remove(id);
            }
        })
    }

    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = self.listeners.borrow().entries.clone();
        for (id, listener) in snapshot {
            if !self.listeners.borrow().contains(id) {
                continue;
            }
            listener(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().entries.clear();
    }
}

/// A current value plus change notifications.
///
/// `set` only notifies when the value actually changes.
pub struct Signal<T> {
    value: Rc<RefCell<T>>,
    changed: Channel<T>,
    version: Rc<Cell<u64>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            changed: self.changed.clone(),
            version: Rc::clone(&self.version),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            changed: Channel::new(),
            version: Rc::new(Cell::new(0)),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Read without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Bumped on every change; lets observers detect staleness cheaply.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    pub fn set(&self, value: T) -> bool {
        if *self.value.borrow() == value {
            return false;
        }
        *self.value.borrow_mut() = value.clone();
        self.version.set(self.version.get() + 1);
        self.changed.emit(&value);
        true
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.changed.subscribe(f)
    }
}
