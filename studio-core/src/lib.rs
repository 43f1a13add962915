//! # Catalog Studio Core
//!
//! Pure model for the product photo studio: everything that can be decided
//! without touching pixels or the network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 studio-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Scene Graph     │  Layer Lifecycle         │
//! │  - Shapes        │  - ImageState machine    │
//! │  - Transforms    │  - LayerStore            │
//! │  - Export math   │  - Review-ask gate       │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod element;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod layer;
pub mod scene;
pub mod store;

pub use element::{Shape, ShapeId, ShapeKind, ShapeTransform};
pub use error::{CoreError, CoreResult};
pub use feedback::{FeedbackGate, ReviewStage};
pub use geometry::{AspectRatio, ExportMapping, ExportRequest, Size};
pub use layer::{
    validate_upload, GenerationMeta, ImageState, Layer, LayerEvent, LayerId, LayerSource,
    LocalFile,
};
pub use scene::Scene;
pub use store::{BusyGuard, GenerationOutput, LayerStore};

/// Maximum number of reference-eligible (uploaded or selected) layers.
pub const MAX_REFERENCE_IMAGES: usize = 6;

/// Maximum number of live images a product may carry.
pub const MAX_LIVE_IMAGES: usize = 10;

/// Maximum accepted upload size in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// File extensions accepted for upload.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpeg", "webp", "png", "jpg"];

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
