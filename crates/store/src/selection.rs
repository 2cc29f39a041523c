//! Reactive selection and hover state.

use bus::{Signal, Subscription};
use serde::Deserialize;
use std::cell::Cell;
use std::rc::Rc;

/// What a user click on an annotation does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserSelectAction {
    /// Select it and open it for editing.
    #[default]
    Edit,
    /// Select it read-only.
    Select,
    /// Ignore it; it is also skipped by hover detection.
    None,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedItem {
    pub id: String,
    pub editable: bool,
}

/// The currently selected annotations.
#[derive(Clone)]
pub struct SelectionState {
    selected: Signal<Vec<SelectedItem>>,
    action: Rc<Cell<UserSelectAction>>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(UserSelectAction::default())
    }
}

impl SelectionState {
    pub fn new(action: UserSelectAction) -> Self {
        Self {
            selected: Signal::new(Vec::new()),
            action: Rc::new(Cell::new(action)),
        }
    }

    pub fn user_select_action(&self) -> UserSelectAction {
        self.action.get()
    }

    pub fn set_user_select_action(&self, action: UserSelectAction) {
        self.action.set(action);
    }

    pub fn selected(&self) -> Vec<SelectedItem> {
        self.selected.get()
    }

    pub fn ids(&self) -> Vec<String> {
        self.selected.with(|s| s.iter().map(|i| i.id.clone()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.selected.with(Vec::is_empty)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.with(|s| s.iter().any(|i| i.id == id))
    }

    /// Select as a result of user interaction, honouring the select action.
    pub fn user_select(&self, id: &str) {
        self.user_select_all(&[id.to_string()]);
    }

    pub fn user_select_all(&self, ids: &[String]) {
        let editable = match self.action.get() {
            UserSelectAction::None => {
                log::debug!(target: "store.selection", "select action is none, ignoring click");
                return;
            }
            UserSelectAction::Edit => true,
            UserSelectAction::Select => false,
        };
        self.selected.set(
            ids.iter()
                .map(|id| SelectedItem {
                    id: id.clone(),
                    editable,
                })
                .collect(),
        );
    }

    /// Programmatic selection; bypasses the select action.
    pub fn set_selected(&self, ids: &[String], editable: bool) {
        self.selected.set(
            ids.iter()
                .map(|id| SelectedItem {
                    id: id.clone(),
                    editable,
                })
                .collect(),
        );
    }

    pub fn clear(&self) {
        self.selected.set(Vec::new());
    }

    /// Drop ids that no longer exist.
    pub fn remove_ids(&self, ids: &[String]) {
        self.selected.update(|s| s.retain(|i| !ids.contains(&i.id)));
    }

    pub fn subscribe(&self, f: impl Fn(&[SelectedItem]) + 'static) -> Subscription {
        self.selected.subscribe(move |items: &Vec<SelectedItem>| f(items))
    }
}

/// The annotation under the pointer, if any.
#[derive(Clone)]
pub struct HoverState {
    hovered: Signal<Option<String>>,
}

impl Default for HoverState {
    fn default() -> Self {
        Self::new()
    }
}

impl HoverState {
    pub fn new() -> Self {
        Self {
            hovered: Signal::new(None),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.hovered.get()
    }

    pub fn is_hovered(&self, id: &str) -> bool {
        self.hovered.with(|h| h.as_deref() == Some(id))
    }

    /// Returns `true` if the hovered annotation changed.
    pub fn set(&self, id: Option<String>) -> bool {
        self.hovered.set(id)
    }

    pub fn subscribe(&self, f: impl Fn(Option<&str>) + 'static) -> Subscription {
        self.hovered
            .subscribe(move |h: &Option<String>| f(h.as_deref()))
    }
}
