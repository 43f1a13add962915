//! Engine error taxonomy.

use studio_core::{CoreError, LayerId};
use studio_renderer::RenderError;
use thiserror::Error;

use crate::client::ApiError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Broad class of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The image could not be prepared (decode, canvas, export).
    Preparation,
    /// The request was refused before anything changed.
    Validation,
    /// The service answered with a failure.
    Remote,
    /// The request never got a usable answer.
    Network,
}

/// Errors surfaced by the orchestrator and the publication controller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Canvas not initialized, decode failure or export failure.
    #[error("Preparation failed: {0}")]
    Preparation(#[from] RenderError),

    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A model rule refused the operation (limits, transitions, missing fields).
    #[error(transparent)]
    Model(CoreError),

    /// Other precondition failures.
    #[error("{0}")]
    Validation(String),

    /// Another operation holds the same busy flag.
    #[error("Another {0} is already in progress")]
    Busy(&'static str),

    /// The service reported a failed generation.
    #[error("Generation failed: {message}")]
    Remote {
        /// Detail from the service.
        message: String,
        /// Whether the safety filter rejected the content.
        moderated: bool,
    },

    /// Transport failure or an unusable response.
    #[error("Network error: {0}")]
    Network(ApiError),

    /// The layer was removed while its request was in flight.
    #[error("Layer {0} was removed before the response arrived")]
    Discarded(LayerId),
}

impl From<CoreError> for EngineError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Busy(what) => Self::Busy(what),
            other => Self::Model(other),
        }
    }
}

impl From<ApiError> for EngineError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Status { status, body } if (400..500).contains(&status) && status != 429 => {
                let moderated = crate::client::mentions_moderation(&body);
                Self::Remote {
                    message: format!("service returned {status}: {body}"),
                    moderated,
                }
            }
            other => Self::Network(other),
        }
    }
}

impl EngineError {
    /// Taxonomy class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Preparation(_) | Self::Io(_) => ErrorKind::Preparation,
            Self::Model(_) | Self::Validation(_) | Self::Busy(_) | Self::Discarded(_) => {
                ErrorKind::Validation
            }
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Network(_) => ErrorKind::Network,
        }
    }

    /// Whether this is a content-moderation rejection.
    #[must_use]
    pub fn is_moderated(&self) -> bool {
        matches!(self, Self::Remote { moderated: true, .. })
    }

    /// Text for a transient user notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Preparation(RenderError::NotInitialized(_)) => {
                "The canvas is not ready yet. Load an image first.".to_string()
            }
            Self::Preparation(_) | Self::Io(_) => {
                "We couldn't prepare this image. Please try another file.".to_string()
            }
            Self::Model(CoreError::ReferenceLimit { limit }) => {
                format!("You can select up to {limit} images at a time.")
            }
            Self::Model(CoreError::LiveLimit { limit }) => {
                format!("A product can have at most {limit} live images. Remove one first.")
            }
            Self::Model(CoreError::UploadTooLarge { limit, .. }) => {
                format!("Files must be {} MB or smaller.", limit / (1024 * 1024))
            }
            Self::Model(CoreError::UnsupportedFormat(_)) => {
                "Only JPEG, PNG and WebP images are supported.".to_string()
            }
            Self::Model(e) => e.to_string(),
            Self::Validation(message) => message.clone(),
            Self::Busy(what) => format!("Please wait for the current {what} to finish."),
            Self::Remote {
                moderated: true, ..
            } => "This image was flagged by our content safety filter. Try a different image or prompt."
                .to_string(),
            Self::Remote { .. } => "Image generation failed. Please try again.".to_string(),
            Self::Network(_) => {
                "We couldn't reach the image service. Check your connection and try again."
                    .to_string()
            }
            Self::Discarded(_) => "The image was removed before generation finished.".to_string(),
        }
    }
}
