//! Error types for model and store operations.

use thiserror::Error;

use crate::layer::{ImageState, LayerEvent};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Shape not found in the scene.
    #[error("Shape not found: {0}")]
    ShapeNotFound(String),

    /// Layer not found in the store.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// A layer with this ID is already stored.
    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),

    /// The requested state transition is not allowed.
    #[error("Invalid transition from {from} on {event:?}")]
    InvalidTransition {
        /// State the layer was in.
        from: ImageState,
        /// Event that was rejected.
        event: LayerEvent,
    },

    /// The state cannot be backed by the given source.
    #[error("State {0} does not match the layer source")]
    SourceMismatch(ImageState),

    /// Too many reference-eligible images.
    #[error("At most {limit} reference images can be selected at once")]
    ReferenceLimit {
        /// The configured limit.
        limit: usize,
    },

    /// A busy flag refused the operation.
    #[error("Another {0} is already in progress")]
    Busy(&'static str),

    /// The product already carries the maximum number of live images.
    #[error("A product can have at most {limit} live images")]
    LiveLimit {
        /// The configured limit.
        limit: usize,
    },

    /// A layer lacks what publishing needs.
    #[error("Layer {id} cannot be published: {reason}")]
    NotPublishable {
        /// Layer ID.
        id: String,
        /// What is missing.
        reason: &'static str,
    },

    /// Upload exceeds the size limit.
    #[error("File is {size} bytes, the limit is {limit} bytes")]
    UploadTooLarge {
        /// Size of the rejected file.
        size: u64,
        /// The configured limit.
        limit: u64,
    },

    /// Upload has an extension that is not accepted.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// An aspect ratio string could not be parsed.
    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(String),

    /// Serialization of persisted state failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
