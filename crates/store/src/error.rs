use anchoring::AnchorError;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("annotation {0} already exists")]
    Duplicate(String),
    #[error("annotation {0} not found")]
    NotFound(String),
    #[error("annotation {id} could not be anchored: {source}")]
    Unanchored {
        id: String,
        #[source]
        source: AnchorError,
    },
}
