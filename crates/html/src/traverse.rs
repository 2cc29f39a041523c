use crate::{Document, NodeId};

/// Pre-order walk of `root` and its descendants.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Descendants<'a> {
    pub fn new(doc: &'a Document, root: NodeId) -> Self {
        Self {
            doc,
            stack: vec![root],
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        // push in reverse so the first child is visited first
        self.stack
            .extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}

/// Text nodes under `root`, in document order.
pub struct TextNodes<'a> {
    inner: Descendants<'a>,
}

impl<'a> TextNodes<'a> {
    pub fn new(doc: &'a Document, root: NodeId) -> Self {
        Self {
            inner: Descendants::new(doc, root),
        }
    }
}

impl Iterator for TextNodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let doc = self.inner.doc;
        self.inner.by_ref().find(|n| doc.is_text(*n))
    }
}

/// Text nodes under `root` whose subtree is not rejected by `skip`.
///
/// `skip` is asked about elements; a rejected element prunes its whole
/// subtree, the way a `NodeFilter` returning `FILTER_REJECT` does.
pub struct FilteredTextNodes<'a, F> {
    doc: &'a Document,
    stack: Vec<NodeId>,
    skip: F,
}

impl<'a, F> FilteredTextNodes<'a, F>
where
    F: Fn(&Document, NodeId) -> bool,
{
    pub fn new(doc: &'a Document, root: NodeId, skip: F) -> Self {
        Self {
            doc,
            stack: vec![root],
            skip,
        }
    }
}

impl<F> Iterator for FilteredTextNodes<'_, F>
where
    F: Fn(&Document, NodeId) -> bool,
{
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            if self.doc.is_text(node) {
                return Some(node);
            }
            if self.doc.is_element(node) && (self.skip)(self.doc, node) {
                continue;
            }
            self.stack
                .extend(self.doc.children(node).iter().rev().copied());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_nodes_in_document_order() {
        let doc = Document::from_html("<p>a<b>b</b>c</p><p>d</p>");
        let texts: String = TextNodes::new(&doc, doc.root())
            .filter_map(|t| doc.text(t))
            .collect();
        assert_eq!(texts, "abcd");
    }

    #[test]
    fn filter_prunes_whole_subtree() {
        let doc = Document::from_html(r#"<p>a<span class="skip">b<i>c</i></span>d</p>"#);
        let texts: String = FilteredTextNodes::new(&doc, doc.root(), |d, n| d.has_class(n, "skip"))
            .filter_map(|t| doc.text(t))
            .collect();
        assert_eq!(texts, "ad");
    }
}
