//! Store composition and the state shared by the handler and the renderer.

use crate::SharedPage;
use crate::config::AnnotatorConfig;
use crate::highlight::Filter;
use crate::tree::SpatialTree;
use anchoring::{AnchorError, AnchorOptions, anchor_selector};
use bus::{Channel, Subscription};
use core_types::{Bounds, Rect};
use html::{Document, NodeId};
use std::cell::RefCell;
use std::rc::Rc;
use store::{
    Annotation, AnnotationStore, AnnotationTarget, HoverState, ObserveOptions, Origin,
    SelectionState, StoreChangeEvent, StoreError, StoreObserver,
};

/// Attach live ranges to every selector of `target`.
pub fn revive_target(
    doc: &Document,
    target: &AnnotationTarget,
    container: NodeId,
    options: &AnchorOptions,
) -> Result<AnnotationTarget, AnchorError> {
    if target.selector.is_empty() {
        return Err(AnchorError::NoSelectors);
    }
    let selector = target
        .selector
        .iter()
        .map(|s| anchor_selector(doc, s, container, options))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AnnotationTarget {
        selector,
        ..target.clone()
    })
}

/// Store decorator that anchors targets on the way in.
///
/// Annotations that cannot be anchored are rejected, never stored.
pub struct RevivalLayer<S> {
    inner: S,
    page: SharedPage,
    container: NodeId,
    options: AnchorOptions,
}

impl<S: AnnotationStore> RevivalLayer<S> {
    pub fn new(inner: S, page: SharedPage, container: NodeId, options: AnchorOptions) -> Self {
        Self {
            inner,
            page,
            container,
            options,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn revive(&self, target: &AnnotationTarget) -> Result<AnnotationTarget, StoreError> {
        // page borrow ends before the inner store notifies anyone
        let page = self.page.borrow();
        revive_target(page.document(), target, self.container, &self.options).map_err(|source| {
            log::warn!(target: "annotator.state", "rejecting {}: {source}", target.annotation);
            StoreError::Unanchored {
                id: target.annotation.clone(),
                source,
            }
        })
    }

    fn revive_annotation(&self, annotation: Annotation) -> Result<Annotation, StoreError> {
        let target = self.revive(&annotation.target)?;
        Ok(Annotation {
            target,
            ..annotation
        })
    }
}

impl<S: AnnotationStore> AnnotationStore for RevivalLayer<S> {
    fn add_annotation(&self, annotation: Annotation, origin: Origin) -> Result<(), StoreError> {
        let revived = self.revive_annotation(annotation)?;
        self.inner.add_annotation(revived, origin)
    }

    fn bulk_add_annotations(
        &self,
        annotations: Vec<Annotation>,
        replace: bool,
        origin: Origin,
    ) -> Vec<Annotation> {
        let mut failed = Vec::new();
        let mut revived = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            match self.revive(&annotation.target) {
                Ok(target) => revived.push(Annotation {
                    target,
                    ..annotation
                }),
                Err(_) => failed.push(annotation),
            }
        }
        failed.extend(self.inner.bulk_add_annotations(revived, replace, origin));
        failed
    }

    fn update_annotation(&self, annotation: Annotation, origin: Origin) -> Result<(), StoreError> {
        let revived = self.revive_annotation(annotation)?;
        self.inner.update_annotation(revived, origin)
    }

    fn update_target(&self, target: AnnotationTarget, origin: Origin) -> Result<(), StoreError> {
        let revived = self.revive(&target)?;
        self.inner.update_target(revived, origin)
    }

    fn bulk_update_targets(
        &self,
        targets: Vec<AnnotationTarget>,
        origin: Origin,
    ) -> Vec<AnnotationTarget> {
        let mut failed = Vec::new();
        let mut revived = Vec::with_capacity(targets.len());
        for target in targets {
            match self.revive(&target) {
                Ok(t) => revived.push(t),
                Err(_) => failed.push(target),
            }
        }
        failed.extend(self.inner.bulk_update_targets(revived, origin));
        failed
    }

    fn delete_annotation(&self, id: &str, origin: Origin) -> Option<Annotation> {
        self.inner.delete_annotation(id, origin)
    }

    fn bulk_delete_annotations(&self, ids: &[String], origin: Origin) -> Vec<Annotation> {
        self.inner.bulk_delete_annotations(ids, origin)
    }

    fn get_annotation(&self, id: &str) -> Option<Annotation> {
        self.inner.get_annotation(id)
    }

    fn all(&self) -> Vec<Annotation> {
        self.inner.all()
    }

    fn clear(&self, origin: Origin) {
        self.inner.clear(origin)
    }

    fn observe(&self, observer: StoreObserver, options: ObserveOptions) -> Subscription {
        self.inner.observe(observer, options)
    }
}

/// Store, spatial index, selection and hover of one annotator.
///
/// The index follows the store through a store observer.
pub struct AnnotatorState {
    store: Rc<dyn AnnotationStore>,
    tree: Rc<RefCell<SpatialTree>>,
    selection: SelectionState,
    hover: HoverState,
    page: SharedPage,
    container: NodeId,
    options: AnchorOptions,
    recalculated: Channel<()>,
    _store_sub: Subscription,
}

impl AnnotatorState {
    /// Wrap `base` in a [`RevivalLayer`] and start indexing it.
    pub fn new<S: AnnotationStore + 'static>(
        base: S,
        page: SharedPage,
        container: NodeId,
        config: &AnnotatorConfig,
    ) -> Self {
        let options = config.anchor_options();
        let store: Rc<dyn AnnotationStore> = Rc::new(RevivalLayer::new(
            base,
            Rc::clone(&page),
            container,
            options.clone(),
        ));
        let tree = Rc::new(RefCell::new(SpatialTree::new(
            Rc::clone(&page),
            container,
            options.clone(),
        )));
        let selection = SelectionState::new(config.user_select_action);
        let hover = HoverState::new();

        // Anything already in the base store.
        tree.borrow_mut()
            .set(store.all().iter().map(|a| &a.target), true);

        let store_sub = {
            let tree = Rc::clone(&tree);
            let page = Rc::clone(&page);
            let selection = selection.clone();
            let hover = hover.clone();
            let observer: StoreObserver = Rc::new(move |event: &StoreChangeEvent| {
                sync_tree(&tree, &page, event);
                let deleted: Vec<String> = event.changes.deleted.iter().map(|a| a.id.clone()).collect();
                if !deleted.is_empty() {
                    selection.remove_ids(&deleted);
                    if hover.current().is_some_and(|h| deleted.contains(&h)) {
                        hover.set(None);
                    }
                }
            });
            store.observe(observer, ObserveOptions::default())
        };

        Self {
            store,
            tree,
            selection,
            hover,
            page,
            container,
            options,
            recalculated: Channel::new(),
            _store_sub: store_sub,
        }
    }

    pub fn store(&self) -> &Rc<dyn AnnotationStore> {
        &self.store
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn hover(&self) -> &HoverState {
        &self.hover
    }

    pub fn page(&self) -> &SharedPage {
        &self.page
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn anchor_options(&self) -> &AnchorOptions {
        &self.options
    }

    /// Number of annotations with geometry in the index.
    pub fn indexed_len(&self) -> usize {
        self.tree.borrow().len()
    }

    pub fn indexed_ids(&self) -> Vec<String> {
        self.tree.borrow().ids()
    }

    /// Annotations under a container-relative point, smallest first.
    ///
    /// Without `all` at most one (the smallest passing `filter`) is returned.
    pub fn get_at(&self, x: f32, y: f32, all: bool, filter: Option<&Filter>) -> Vec<Annotation> {
        let ids = self.tree.borrow().get_at_all(x, y);
        let hits = ids
            .iter()
            .filter_map(|id| self.store.get_annotation(id))
            .filter(|a| filter.is_none_or(|f| f(a)));
        if all {
            hits.collect()
        } else {
            hits.take(1).collect()
        }
    }

    /// Annotations intersecting container-relative `bounds`, with their rects.
    pub fn get_intersecting(&self, bounds: &Bounds) -> Vec<(Annotation, Vec<Rect>)> {
        let hits = self.tree.borrow().get_intersecting(bounds);
        hits.into_iter()
            .filter_map(|hit| {
                self.store
                    .get_annotation(&hit.id)
                    .map(|a| (a, hit.rects.clone()))
            })
            .collect()
    }

    pub fn get_annotation_rects(&self, id: &str) -> Option<Vec<Rect>> {
        self.tree.borrow().get_annotation_rects(id)
    }

    pub fn get_annotation_bounds(&self, id: &str) -> Option<Bounds> {
        self.tree.borrow().get_annotation_bounds(id)
    }

    /// Re-anchor stale targets, rebuild the index from the store, then tell
    /// subscribers.
    ///
    /// Targets whose ranges no longer cover their quote (text edited under
    /// them) are written back silently with fresh ranges and offsets.
    pub fn recalculate_positions(&self) {
        self.refresh_stale_targets();
        let annotations = self.store.all();
        self.tree
            .borrow_mut()
            .recalculate(annotations.iter().map(|a| &a.target));
        self.recalculated.emit(&());
    }

    fn refresh_stale_targets(&self) {
        let stale: Vec<AnnotationTarget> = {
            let page = self.page.borrow();
            self.store
                .all()
                .into_iter()
                .filter(|a| !anchoring::is_revived(page.document(), &a.target.selector))
                .map(|a| a.target)
                .collect()
        };
        if stale.is_empty() {
            return;
        }
        log::debug!(target: "annotator.state", "re-anchoring {} stale target(s)", stale.len());
        for target in self.store.bulk_update_targets(stale, Origin::Silent) {
            log::warn!(
                target: "annotator.state",
                "{} no longer anchors; keeping its previous target",
                target.annotation
            );
        }
    }

    pub fn on_recalculate_positions(&self, f: impl Fn() + 'static) -> Subscription {
        self.recalculated.subscribe(move |_: &()| f())
    }
}

fn sync_tree(tree: &RefCell<SpatialTree>, page: &SharedPage, event: &StoreChangeEvent) {
    let revived =
        |t: &AnnotationTarget| anchoring::has_live_ranges(page.borrow().document(), &t.selector);
    let mut tree = tree.borrow_mut();
    for a in &event.changes.created {
        if revived(&a.target) {
            tree.insert(&a.target);
        } else {
            log::debug!(target: "annotator.state", "not indexing unrevived {}", a.id);
        }
    }
    for update in &event.changes.updated {
        let target = &update.new_value.target;
        if revived(target) {
            tree.update(target);
        } else if tree.contains(&target.annotation) {
            tree.remove(target);
        }
    }
    for a in &event.changes.deleted {
        if tree.contains(&a.id) {
            tree.remove_id(&a.id);
        }
    }
}
