//! # Catalog Studio Engine
//!
//! Network side of the studio: talks to the image-editor service and walks
//! layers through their lifecycle.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  upload   ┌────────────┐  submit   ┌──────────────────────┐
//! │  files   │──────────▶│ LayerStore │──────────▶│ GenerationOrchestrator│
//! └──────────┘           └────────────┘           │  export → edit-image  │
//!                          ▲        ▲             │  → fetch → resolve    │
//!                          │        │             └──────────┬───────────┘
//!                          │        │                        │
//!                          │  ┌─────┴──────────────────┐     │ StudioApi
//!                          │  │ PublicationController  │─────┤ (reqwest,
//!                          │  │ publish / delete       │     │  retry)
//!                          │  └────────────────────────┘     ▼
//!                          └──────────────────────── image-editor service
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prefs;
pub mod publication;
pub mod workspace;

pub use client::{
    AddMediaRequest, ApiError, EditImageRequest, FeedbackUpdate, GenerationRecord,
    GenerationStatus, MediaRecord, StudioApi, StudioApiClient, TaskKind,
};
pub use config::{RetryConfig, StudioConfig};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use orchestrator::{BatchResults, Generated, GenerationOrchestrator, GenerationSettings};
pub use prefs::ReviewAskFile;
pub use publication::{DeleteOutcome, PublicationController, Published};
pub use workspace::{open_store, upload_bytes, upload_file, ProductRef};
