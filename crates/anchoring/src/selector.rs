use crate::range_utils::annotatable_text;
use html::{Document, DomRange, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuote {
    pub exact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl TextQuote {
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            exact: text.into(),
            prefix: None,
            suffix: None,
        }
    }
}

/// A text-position anchor with a quote for verification.
///
/// `start`/`end` count chars of annotatable text from the start of the
/// offset reference (the container unless set). `range` is the live DOM
/// range once revived; it and `offset_reference` never leave the process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSelector {
    pub quote: TextQuote,
    pub start: usize,
    pub end: usize,
    #[serde(skip)]
    pub range: Option<DomRange>,
    #[serde(skip)]
    pub offset_reference: Option<NodeId>,
}

impl TextSelector {
    pub fn new(exact: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            quote: TextQuote::exact(exact),
            start,
            end,
            range: None,
            offset_reference: None,
        }
    }

    /// Has a live, non-collapsed range, whatever text it covers now.
    pub fn has_live_range(&self, doc: &Document) -> bool {
        self.range
            .is_some_and(|r| !r.is_collapsed() && r.is_live(doc))
    }

    /// Revived: has a live range that still covers the quoted text.
    ///
    /// Ranges do not follow text edits, so a range that outlived a change to
    /// its text nodes fails this check and has to be anchored again.
    pub fn is_revived(&self, doc: &Document) -> bool {
        self.has_live_range(doc)
            && self.range.is_some_and(|r| {
                self.quote.exact.is_empty() || annotatable_text(doc, &r) == self.quote.exact
            })
    }

    /// Same anchor, ignoring the ephemeral DOM state.
    pub fn same_anchor(&self, other: &TextSelector) -> bool {
        self.start == other.start && self.end == other.end && self.quote == other.quote
    }

    /// Drop the live range, e.g. before handing the selector to storage.
    pub fn detached(&self) -> Self {
        Self {
            range: None,
            offset_reference: None,
            ..self.clone()
        }
    }
}

/// A text selector scoped to one page of a paginated document.
///
/// Offsets are relative to the element whose `data-page-number` equals
/// `page_number`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PagedSelector {
    pub page_number: u32,
    #[serde(flatten)]
    pub selector: TextSelector,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Selector {
    #[serde(rename = "TextSelector")]
    Text(TextSelector),
    #[serde(rename = "PagedTextSelector")]
    Paged(PagedSelector),
}

impl Selector {
    pub fn text(&self) -> &TextSelector {
        match self {
            Selector::Text(s) => s,
            Selector::Paged(p) => &p.selector,
        }
    }

    pub fn text_mut(&mut self) -> &mut TextSelector {
        match self {
            Selector::Text(s) => s,
            Selector::Paged(p) => &mut p.selector,
        }
    }

    pub fn page_number(&self) -> Option<u32> {
        match self {
            Selector::Text(_) => None,
            Selector::Paged(p) => Some(p.page_number),
        }
    }

    pub fn range(&self) -> Option<DomRange> {
        self.text().range
    }

    pub fn quote(&self) -> &str {
        &self.text().quote.exact
    }

    pub fn is_revived(&self, doc: &Document) -> bool {
        self.text().is_revived(doc)
    }

    pub fn has_live_range(&self, doc: &Document) -> bool {
        self.text().has_live_range(doc)
    }

    pub fn same_anchor(&self, other: &Selector) -> bool {
        self.page_number() == other.page_number() && self.text().same_anchor(other.text())
    }
}

impl From<TextSelector> for Selector {
    fn from(s: TextSelector) -> Self {
        Selector::Text(s)
    }
}

/// `true` if every selector is revived. An empty list is not.
pub fn is_revived(doc: &Document, selectors: &[Selector]) -> bool {
    !selectors.is_empty() && selectors.iter().all(|s| s.is_revived(doc))
}

/// `true` if every selector holds a live range. An empty list does not.
pub fn has_live_ranges(doc: &Document, selectors: &[Selector]) -> bool {
    !selectors.is_empty() && selectors.iter().all(|s| s.has_live_range(doc))
}

/// Pairwise [`Selector::same_anchor`].
pub fn same_anchors(a: &[Selector], b: &[Selector]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_anchor(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_dom_state() {
        let doc = Document::from_html("<p>brown</p>");
        let t = doc.children(doc.children(doc.root())[0])[0];
        let mut sel = TextSelector::new("brown", 10, 15);
        sel.range = Some(DomRange::select_node_contents(&doc, t));
        let json = serde_json::to_value(Selector::Text(sel)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "TextSelector",
                "quote": { "exact": "brown" },
                "start": 10,
                "end": 15
            })
        );
    }

    #[test]
    fn paged_selector_round_trips() {
        let sel = Selector::Paged(PagedSelector {
            page_number: 3,
            selector: TextSelector::new("fox", 1, 4),
        });
        let json = serde_json::to_string(&sel).unwrap();
        assert!(json.contains("\"page_number\":3"));
        let back: Selector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sel);
    }

    #[test]
    fn empty_list_is_not_revived() {
        let doc = Document::new();
        assert!(!is_revived(&doc, &[]));
        assert!(!is_revived(&doc, &[TextSelector::new("x", 0, 1).into()]));
    }

    #[test]
    fn edited_text_unrevives_the_range() {
        let mut doc = Document::from_html("<p>The quick brown fox</p>");
        let t = doc.children(doc.children(doc.root())[0])[0];
        let mut sel = TextSelector::new("brown", 10, 15);
        sel.range = Some(DomRange::new(
            html::BoundaryPoint::new(t, 10),
            html::BoundaryPoint::new(t, 15),
        ));
        assert!(sel.is_revived(&doc));

        doc.set_text(t, "A quick brown fox").unwrap();
        assert!(sel.has_live_range(&doc));
        assert!(!sel.is_revived(&doc));
    }
}
