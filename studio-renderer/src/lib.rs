//! # Catalog Studio Renderer
//!
//! Raster side of the studio: decoding, the interactive composition canvas
//! and resolution-independent export.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ ImageSource  │──▶│  Composer    │──▶│ ExportMapping    │──▶│ Encoder  │
//! │ bytes / path │   │ scene + dirty│   │ fit + center     │   │ png/jpeg │
//! │ data URI     │   │ baseline     │   │ (staged copy)    │   │ webp     │
//! └──────────────┘   └──────────────┘   └──────────────────┘   └──────────┘
//!                           │                    │
//!                           └──── RenderBackend ─┘
//!                                  (tiny-skia)
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod composer;
pub mod error;
pub mod export;
pub mod image;

pub use backend::{Frame, RenderBackend, SkiaBackend};
pub use composer::Composer;
pub use error::{RenderError, RenderResult};
pub use export::{
    export_filename, export_image_bytes, ExportFormat, ExportLabel, ExportSettings, ExportedFile,
};
pub use crate::image::{
    load_image_from_bytes, load_image_from_data_uri, ImageFormat, ImageSource, TextureData,
};
