//! # Catalog Studio CLI
//!
//! Command-line front end for the studio.
//!
//! ## Usage
//!
//! ```bash
//! # Annotate and export at 2000px wide, square
//! catalog-studio export mug.jpg --rectangles 1 --width 2000 --aspect 1:1
//!
//! # Generate a studio shot and publish it
//! catalog-studio --api-url https://studio.example/api/ generate mug.jpg \
//!     --prompt "white seamless background" --product-id 123 --publish
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `StudioConfig` - Built from the global arguments
//! - `commands` - One function per subcommand

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use studio_core::{AspectRatio, ExportRequest};
use studio_engine::config::DEFAULT_API_URL;
use studio_engine::{GenerationSettings, StudioConfig};
use studio_renderer::ExportFormat;

pub use commands::run;

/// Command-line arguments for catalog-studio.
#[derive(Debug, Clone, Parser)]
#[command(name = "catalog-studio")]
#[command(about = "Annotate, regenerate and publish product photos")]
#[command(version)]
pub struct CliArgs {
    /// Image-editor service base URL
    #[arg(long, env = "STUDIO_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Bearer token for the service
    #[arg(long, env = "STUDIO_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Directory for persisted preferences
    #[arg(long, env = "STUDIO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Export format (png, jpeg, webp)
    #[arg(long, default_value = "jpeg")]
    pub format: ExportFormat,

    /// Export quality, 1-100
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// First word of exported file names
    #[arg(long, default_value = "Studio")]
    pub prefix: String,

    /// Do not double small images before generation
    #[arg(long)]
    pub no_upscale: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Annotate an image and export it at a chosen resolution
    Export(ExportArgs),
    /// Upload images and generate new versions
    Generate(GenerateArgs),
}

/// Arguments of `export`.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Image to export
    pub input: PathBuf,

    /// Output file or directory (defaults to the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Output aspect ratio, e.g. 4:3
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Rectangles to mark on the image
    #[arg(long, default_value_t = 0)]
    pub rectangles: u32,

    /// Circles to mark on the image
    #[arg(long, default_value_t = 0)]
    pub circles: u32,

    /// Product name for the file name
    #[arg(long)]
    pub product_name: Option<String>,
}

impl ExportArgs {
    /// The export request described by these arguments.
    #[must_use]
    pub fn request(&self) -> ExportRequest {
        ExportRequest {
            target_width: self.width,
            aspect_ratio: self.aspect,
            auto_upscale: false,
        }
    }
}

/// Arguments of `generate`.
#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Images to upload
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Prompt text
    #[arg(long)]
    pub prompt: String,

    /// Catalog product the images belong to
    #[arg(long)]
    pub product_id: Option<String>,

    /// Catalog variant
    #[arg(long)]
    pub variant_id: Option<String>,

    /// Product name for exported file names
    #[arg(long)]
    pub product_name: Option<String>,

    /// Seed for reproducible results
    #[arg(long)]
    pub seed: Option<i64>,

    /// Quality tag, repeatable
    #[arg(long = "tag")]
    pub quality_tags: Vec<String>,

    /// Background mode
    #[arg(long)]
    pub background: Option<String>,

    /// Position mode
    #[arg(long)]
    pub position: Option<String>,

    /// Width of the submitted image
    #[arg(long)]
    pub width: Option<u32>,

    /// Aspect ratio of the submitted image
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Treat a single input as a copy-edit batch
    #[arg(long)]
    pub batch: bool,

    /// Publish every successful result to the product
    #[arg(long, requires = "product_id")]
    pub publish: bool,

    /// Save results into this directory
    #[arg(long)]
    pub download: Option<PathBuf>,
}

impl GenerateArgs {
    /// Generation settings described by these arguments.
    #[must_use]
    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            prompt: self.prompt.clone(),
            seed: self.seed,
            quality_tags: self.quality_tags.clone(),
            background: self.background.clone(),
            position: self.position.clone(),
            product_name: self.product_name.clone(),
            export: ExportRequest {
                target_width: self.width,
                aspect_ratio: self.aspect,
                auto_upscale: false,
            },
        }
    }
}

impl From<&CliArgs> for StudioConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            api_url: args.api_url.clone(),
            api_token: args.api_token.clone(),
            app_prefix: args.prefix.clone(),
            export_format: args.format,
            export_quality: args.quality,
            auto_upscale: !args.no_upscale,
            request_timeout: Duration::from_secs(args.timeout_secs),
            data_dir: args.data_dir.clone(),
            ..StudioConfig::new()
        }
    }
}
