use html::NodeId;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("selector offsets {start}..{end} are reversed")]
    InvalidOffsets { start: usize, end: usize },
    #[error("offset {end} is past the end of the annotatable text ({length} chars)")]
    OutOfBounds { end: usize, length: usize },
    #[error("no annotatable text under {0}")]
    NoText(NodeId),
    #[error("page {0} is not in the document")]
    PageNotFound(u32),
    #[error("target has no selectors")]
    NoSelectors,
    #[error("quote {0:?} not found")]
    QuoteNotFound(String),
}
