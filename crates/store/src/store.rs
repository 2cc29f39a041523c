use crate::error::StoreError;
use crate::model::{Annotation, AnnotationTarget};
use bus::{Channel, Subscription};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Who caused a change.
///
/// `Silent` changes reach only observers that ask for that origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Remote,
    Silent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub old_value: Annotation,
    pub new_value: Annotation,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub created: Vec<Annotation>,
    pub updated: Vec<Update>,
    pub deleted: Vec<Annotation>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoreChangeEvent {
    pub origin: Origin,
    pub changes: ChangeSet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Only deliver changes from this origin. `None` means every origin
    /// except [`Origin::Silent`].
    pub origin: Option<Origin>,
}

pub type StoreObserver = Rc<dyn Fn(&StoreChangeEvent)>;

/// The store contract the annotator consumes.
///
/// Writes take `&self`: stores are shared handles. Observers are called after
/// the write completes and may write back.
pub trait AnnotationStore {
    fn add_annotation(&self, annotation: Annotation, origin: Origin) -> Result<(), StoreError>;

    /// Returns the annotations that could not be added.
    fn bulk_add_annotations(
        &self,
        annotations: Vec<Annotation>,
        replace: bool,
        origin: Origin,
    ) -> Vec<Annotation>;

    fn update_annotation(&self, annotation: Annotation, origin: Origin) -> Result<(), StoreError>;

    fn update_target(&self, target: AnnotationTarget, origin: Origin) -> Result<(), StoreError>;

    /// Returns the targets that could not be applied.
    fn bulk_update_targets(
        &self,
        targets: Vec<AnnotationTarget>,
        origin: Origin,
    ) -> Vec<AnnotationTarget>;

    fn delete_annotation(&self, id: &str, origin: Origin) -> Option<Annotation>;

    fn bulk_delete_annotations(&self, ids: &[String], origin: Origin) -> Vec<Annotation>;

    fn get_annotation(&self, id: &str) -> Option<Annotation>;

    fn all(&self) -> Vec<Annotation>;

    fn clear(&self, origin: Origin);

    fn observe(&self, observer: StoreObserver, options: ObserveOptions) -> Subscription;
}

#[derive(Default)]
struct Records {
    order: Vec<String>,
    by_id: HashMap<String, Annotation>,
}

impl Records {
    fn insert(&mut self, annotation: Annotation) -> Option<Annotation> {
        let id = annotation.id.clone();
        let previous = self.by_id.insert(id.clone(), annotation);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    fn remove(&mut self, id: &str) -> Option<Annotation> {
        let removed = self.by_id.remove(id)?;
        self.order.retain(|i| i != id);
        Some(removed)
    }

    fn all(&self) -> Vec<Annotation> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

/// Reference in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Rc<RefCell<Records>>,
    changes: Channel<StoreChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, origin: Origin, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        log::trace!(
            target: "store",
            "{origin:?}: {} created, {} updated, {} deleted",
            changes.created.len(),
            changes.updated.len(),
            changes.deleted.len()
        );
        self.changes.emit(&StoreChangeEvent { origin, changes });
    }
}

impl AnnotationStore for MemoryStore {
    fn add_annotation(&self, annotation: Annotation, origin: Origin) -> Result<(), StoreError> {
        {
            let mut records = self.records.borrow_mut();
            if records.by_id.contains_key(&annotation.id) {
                return Err(StoreError::Duplicate(annotation.id));
            }
            records.insert(annotation.clone());
        }
        self.notify(
            origin,
            ChangeSet {
                created: vec![annotation],
                ..Default::default()
            },
        );
        Ok(())
    }

    fn bulk_add_annotations(
        &self,
        annotations: Vec<Annotation>,
        replace: bool,
        origin: Origin,
    ) -> Vec<Annotation> {
        let mut changes = ChangeSet::default();
        let mut failed = Vec::new();
        {
            let mut records = self.records.borrow_mut();
            if replace {
                changes.deleted = records.all();
                *records = Records::default();
            }
            for a in annotations {
                if records.by_id.contains_key(&a.id) {
                    log::warn!(target: "store", "skipping duplicate annotation {}", a.id);
                    failed.push(a);
                } else {
                    records.insert(a.clone());
                    changes.created.push(a);
                }
            }
        }
        self.notify(origin, changes);
        failed
    }

    fn update_annotation(&self, annotation: Annotation, origin: Origin) -> Result<(), StoreError> {
        let old_value = {
            let mut records = self.records.borrow_mut();
            if !records.by_id.contains_key(&annotation.id) {
                return Err(StoreError::NotFound(annotation.id));
            }
            records.insert(annotation.clone())
        };
        if let Some(old_value) = old_value {
            self.notify(
                origin,
                ChangeSet {
                    updated: vec![Update {
                        old_value,
                        new_value: annotation,
                    }],
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    fn update_target(&self, target: AnnotationTarget, origin: Origin) -> Result<(), StoreError> {
        let update = {
            let mut records = self.records.borrow_mut();
            let Some(existing) = records.by_id.get_mut(&target.annotation) else {
                return Err(StoreError::NotFound(target.annotation));
            };
            let old_value = existing.clone();
            existing.target = target;
            Update {
                old_value,
                new_value: existing.clone(),
            }
        };
        self.notify(
            origin,
            ChangeSet {
                updated: vec![update],
                ..Default::default()
            },
        );
        Ok(())
    }

    fn bulk_update_targets(
        &self,
        targets: Vec<AnnotationTarget>,
        origin: Origin,
    ) -> Vec<AnnotationTarget> {
        let mut changes = ChangeSet::default();
        let mut failed = Vec::new();
        {
            let mut records = self.records.borrow_mut();
            for target in targets {
                match records.by_id.get_mut(&target.annotation) {
                    Some(existing) => {
                        let old_value = existing.clone();
                        existing.target = target;
                        changes.updated.push(Update {
                            old_value,
                            new_value: existing.clone(),
                        });
                    }
                    None => failed.push(target),
                }
            }
        }
        self.notify(origin, changes);
        failed
    }

    fn delete_annotation(&self, id: &str, origin: Origin) -> Option<Annotation> {
        let removed = self.records.borrow_mut().remove(id)?;
        self.notify(
            origin,
            ChangeSet {
                deleted: vec![removed.clone()],
                ..Default::default()
            },
        );
        Some(removed)
    }

    fn bulk_delete_annotations(&self, ids: &[String], origin: Origin) -> Vec<Annotation> {
        let removed: Vec<Annotation> = {
            let mut records = self.records.borrow_mut();
            ids.iter().filter_map(|id| records.remove(id)).collect()
        };
        self.notify(
            origin,
            ChangeSet {
                deleted: removed.clone(),
                ..Default::default()
            },
        );
        removed
    }

    fn get_annotation(&self, id: &str) -> Option<Annotation> {
        self.records.borrow().by_id.get(id).cloned()
    }

    fn all(&self) -> Vec<Annotation> {
        self.records.borrow().all()
    }

    fn clear(&self, origin: Origin) {
        let deleted = std::mem::take(&mut *self.records.borrow_mut()).all();
        self.notify(
            origin,
            ChangeSet {
                deleted,
                ..Default::default()
            },
        );
    }

    fn observe(&self, observer: StoreObserver, options: ObserveOptions) -> Subscription {
        self.changes.subscribe(move |event: &StoreChangeEvent| {
            let wanted = match options.origin {
                Some(origin) => origin == event.origin,
                None => event.origin != Origin::Silent,
            };
            if wanted {
                observer(event);
            }
        })
    }
}
