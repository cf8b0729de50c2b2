use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    /// The writer factory failed; no work ran against the index.
    #[error("Writer acquisition failed: {0}")]
    Acquisition(String),

    /// A term factory or engine call failed while indexing or deleting.
    #[error("Index operation failed: {0}")]
    Operation(String),

    #[error("Index compaction failed: {0}")]
    Compaction(String),

    #[error("Writer release failed: {0}")]
    Release(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raw failure reported by the index engine, before it is attributed to a phase.
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Attribute an error to writer acquisition.
    #[must_use]
    pub fn into_acquisition(self) -> Self {
        match self {
            err @ Self::Acquisition(_) => err,
            other => Self::Acquisition(other.detail()),
        }
    }

    /// Attribute an error to an indexing operation, prefixed with `context`.
    #[must_use]
    pub fn into_operation(self, context: &str) -> Self {
        match self {
            Self::Operation(detail) => Self::Operation(format!("{context}: {detail}")),
            other => Self::Operation(format!("{context}: {}", other.detail())),
        }
    }

    #[must_use]
    pub fn into_compaction(self) -> Self {
        match self {
            err @ Self::Compaction(_) => err,
            other => Self::Compaction(other.detail()),
        }
    }

    #[must_use]
    pub fn into_release(self) -> Self {
        match self {
            err @ Self::Release(_) => err,
            other => Self::Release(other.detail()),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Engine(detail) | Self::Other(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}
