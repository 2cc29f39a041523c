//! Arena-backed mutable document.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Every
//! structural, text or attribute change bumps [`Document::version`] and appends
//! a [`MutationRecord`] to the journal drained by [`Document::take_mutations`].

use crate::text::char_len;
use crate::types::{DomError, MutationKind, MutationRecord, NodeId, NodeKind};

struct NodeRecord {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

pub struct Document {
    nodes: Vec<NodeRecord>,
    version: u64,
    mutations: Vec<MutationRecord>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeRecord {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            version: 0,
            mutations: Vec::new(),
        }
    }

    /// Parse `markup` into a fresh document.
    pub fn from_html(markup: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root();
        // The document node always accepts children.
        let _ = crate::parser::parse_html_into(&mut doc, root, markup);
        doc.take_mutations();
        doc
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Monotonic counter bumped by every mutation.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    fn record(&mut self, kind: MutationKind, target: NodeId) {
        self.version = self.version.wrapping_add(1);
        self.mutations.push(MutationRecord { kind, target });
    }

    fn get(&self, id: NodeId) -> Result<&NodeRecord, DomError> {
        self.nodes.get(id.index()).ok_or(DomError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, DomError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(DomError::UnknownNode(id))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // =========================================================================
    // Creation
    // =========================================================================

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element {
            name: name.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text {
            text: text.to_string(),
        })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment {
            text: text.to_string(),
        })
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `before` (or at the end).
    ///
    /// A child that is already attached elsewhere is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.get(parent)?.kind.allows_children() {
            return Err(DomError::InvalidParent(parent));
        }
        self.get(child)?;
        if child == self.root() {
            return Err(DomError::InvalidParent(child));
        }
        if self.contains(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        if let Some(before) = before
            && self.get(before)?.parent != Some(parent)
        {
            return Err(DomError::InvalidSibling { parent, before });
        }

        self.detach(child);

        let siblings = &mut self.get_mut(parent)?.children;
        let pos = before
            .and_then(|b| siblings.iter().position(|k| *k == b))
            .unwrap_or(siblings.len());
        siblings.insert(pos, child);
        self.get_mut(child)?.parent = Some(parent);
        self.record(MutationKind::ChildList, parent);
        Ok(())
    }

    /// Detach `node` (and its subtree) from its parent.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        if node == self.root() {
            return Err(DomError::RootRemoval);
        }
        self.get(node)?;
        self.detach(node);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes[node.index()].parent.take() else {
            return;
        };
        self.nodes[parent.index()].children.retain(|k| *k != node);
        self.record(MutationKind::ChildList, parent);
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.get_mut(node)?.kind {
            NodeKind::Text { text: existing } | NodeKind::Comment { text: existing } => {
                existing.clear();
                existing.push_str(text);
            }
            _ => return Err(DomError::NotText(node)),
        }
        self.record(MutationKind::CharacterData, node);
        Ok(())
    }

    /// Replace all children of `parent` with a single text node.
    pub fn set_text_content(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let children = self.get(parent)?.children.clone();
        for c in children {
            self.detach(c);
        }
        let t = self.create_text(text);
        self.append_child(parent, t)?;
        Ok(t)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        match &mut self.get_mut(node)?.kind {
            NodeKind::Element { attributes, .. } => {
                if let Some(slot) = attributes.iter_mut().find(|(k, _)| *k == name) {
                    if slot.1 == value {
                        return Ok(());
                    }
                    slot.1 = value.to_string();
                } else {
                    attributes.push((name.clone(), value.to_string()));
                }
            }
            _ => return Err(DomError::NotElement(node)),
        }
        self.record(MutationKind::Attributes { name }, node);
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let removed = match &mut self.get_mut(node)?.kind {
            NodeKind::Element { attributes, .. } => {
                let before = attributes.len();
                attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
                before != attributes.len()
            }
            _ => return Err(DomError::NotElement(node)),
        };
        if removed {
            self.record(
                MutationKind::Attributes {
                    name: name.to_ascii_lowercase(),
                },
                node,
            );
        }
        Ok(())
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let mut value = self.attribute(node, "class").unwrap_or("").to_string();
        if !value.is_empty() {
            value.push(' ');
        }
        value.push_str(class);
        self.set_attribute(node, "class", &value)
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        if !self.has_class(node, class) {
            return Ok(());
        }
        let value = self
            .attribute(node, "class")
            .unwrap_or("")
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &value)
    }

    pub fn toggle_class(&mut self, node: NodeId, class: &str, on: bool) -> Result<(), DomError> {
        if on {
            self.add_class(node, class)
        } else {
            self.remove_class(node, class)
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node.index()).map(|n| &n.kind)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index()).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.index())
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|c| *c == node)
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Element { .. }))
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Text { .. }))
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class))
    }

    /// Boundary-point length: chars for character data, child count otherwise.
    pub fn node_length(&self, node: NodeId) -> usize {
        match self.kind(node) {
            Some(NodeKind::Text { text }) | Some(NodeKind::Comment { text }) => char_len(text),
            Some(_) => self.children(node).len(),
            None => 0,
        }
    }

    /// Inclusive descendant test.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.kind(node).is_some() && self.contains(self.root(), node)
    }

    /// Closest inclusive ancestor element matching `pred`.
    pub fn closest(&self, node: NodeId, pred: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if self.is_element(n) && pred(self, n) {
                return Some(n);
            }
            cur = self.parent(n);
        }
        None
    }

    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        self.closest(node, |d, n| d.has_class(n, class))
    }

    /// Ancestors from `node` (inclusive) up to the document node.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(node);
        while let Some(n) = cur {
            out.push(n);
            cur = self.parent(n);
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for t in crate::traverse::TextNodes::new(self, node) {
            if let Some(text) = self.text(t) {
                out.push_str(text);
            }
        }
        out
    }

    /// First element under `root` (inclusive) whose `name` attribute equals `value`.
    pub fn find_by_attribute(&self, root: NodeId, name: &str, value: &str) -> Option<NodeId> {
        crate::traverse::Descendants::new(self, root)
            .find(|n| self.attribute(*n, name) == Some(value))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute(self.root(), "id", id)
    }

    pub fn first_element_by_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        crate::traverse::Descendants::new(self, root)
            .find(|n| self.tag_name(*n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// Child indices from the document node down to `node`.
    ///
    /// Lexicographic order over these paths is document order.
    pub fn tree_path(&self, node: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cur = node;
        while let Some(parent) = self.parent(cur) {
            path.push(self.child_index(cur).unwrap_or(0));
            cur = parent;
        }
        path.reverse();
        path
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
