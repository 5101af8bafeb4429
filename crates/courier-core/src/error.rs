use thiserror::Error;

/// Errors that can cross the collaborator boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Loading or merging the configuration failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An outbound delivery (send or edit) failed.
    #[error("outbound error: {0}")]
    Outbound(String),

    /// Editing a message that the outbound collaborator never produced.
    ///
    /// Edits must target a [`MessageRef`](crate::types::MessageRef) returned
    /// by an earlier send.
    #[error("unknown message ref: {0}")]
    UnknownMessage(String),

    /// A data-store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// The referenced document does not exist in the collection.
    #[error("document not found in {collection}: {id}")]
    DocumentNotFound { collection: String, id: String },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
