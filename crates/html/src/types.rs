use std::fmt;

/// Handle to a node in a [`Document`](crate::Document) arena.
///
/// Handles stay valid after the node is removed from the tree; a removed node
/// is simply disconnected (see [`Document::is_connected`](crate::Document::is_connected)).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl NodeKind {
    pub fn allows_children(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attributes { name: String },
}

/// One entry of the document's mutation journal.
///
/// `target` is the node whose children, text or attributes changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} cannot have children")]
    InvalidParent(NodeId),
    #[error("inserting {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },
    #[error("node {before} is not a child of {parent}")]
    InvalidSibling { parent: NodeId, before: NodeId },
    #[error("node {0} is not a text node")]
    NotText(NodeId),
    #[error("node {0} is not an element")]
    NotElement(NodeId),
    #[error("the document node cannot be removed")]
    RootRemoval,
}
