//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while preparing, rasterizing or exporting.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The canvas has no base image loaded.
    #[error("Canvas not initialized: {0}")]
    NotInitialized(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Resource loading failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Rasterization failed.
    #[error("Frame render failed: {0}")]
    Frame(String),

    /// Encoding the exported frame failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// A scene operation failed.
    #[error("Scene error: {0}")]
    Scene(#[from] studio_core::CoreError),
}
