//! Resolution-independent export.
//!
//! The on-screen composition is uniformly scaled and centered into the
//! export canvas, rasterized once and encoded. Exports always work on a
//! staged copy of the scene, so the editing session is never disturbed.

use std::fmt;
use std::str::FromStr;

use image::ImageEncoder;
use studio_core::geometry::{resolve_export_size, ExportMapping, Size};
use studio_core::{ExportRequest, LayerId, Scene, Shape};

use crate::backend::{Frame, RenderBackend, SkiaBackend};
use crate::error::{RenderError, RenderResult};
use crate::image::{load_image_from_bytes, TextureData};

/// Export output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    #[default]
    Jpeg,
    /// Lossless WebP image.
    WebP,
}

impl ExportFormat {
    /// MIME type of the encoded file.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            other => Err(RenderError::Export(format!("unsupported format: {other}"))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoding settings shared by every export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Output format.
    pub format: ExportFormat,
    /// JPEG quality 1-100 (ignored by lossless formats).
    pub quality: u8,
    /// First word of generated file names.
    pub app_prefix: String,
    /// Background color as RGBA bytes.
    pub background: [u8; 4],
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Jpeg,
            quality: 90,
            app_prefix: "Studio".to_string(),
            background: [255, 255, 255, 255],
        }
    }
}

/// Product context used to name an exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLabel {
    /// Display name of the product.
    pub product_name: String,
    /// Layer the export belongs to.
    pub layer_id: LayerId,
}

impl ExportLabel {
    /// Create a label.
    #[must_use]
    pub fn new(product_name: impl Into<String>, layer_id: LayerId) -> Self {
        Self {
            product_name: product_name.into(),
            layer_id,
        }
    }
}

/// An encoded export, ready to upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// File name.
    pub name: String,
    /// MIME type matching the encoding.
    pub mime: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ExportedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Deterministic export file name.
///
/// `"<prefix> <product> <layer>.<ext>"` with product context, otherwise
/// `"<prefix> export.<ext>"`.
#[must_use]
pub fn export_filename(prefix: &str, label: Option<&ExportLabel>, format: ExportFormat) -> String {
    let ext = format.extension();
    match label {
        Some(label) => format!("{prefix} {} {}.{ext}", label.product_name, label.layer_id),
        None => format!("{prefix} export.{ext}"),
    }
}

/// Scale and center `scene` into a `width`x`height` canvas, rasterize and
/// encode it.
///
/// `scene` is only read; the remapping happens on a staged copy.
///
/// # Errors
///
/// Returns an error if rasterization or encoding fails.
pub fn render_export(
    backend: &mut dyn RenderBackend,
    scene: &Scene,
    texture: Option<&TextureData>,
    (width, height): (u32, u32),
    settings: &ExportSettings,
    label: Option<&ExportLabel>,
) -> RenderResult<ExportedFile> {
    if width == 0 || height == 0 {
        return Err(RenderError::Export(format!("empty export size {width}x{height}")));
    }
    let target = Size::from_pixels(width, height);
    let mapping = ExportMapping::new(scene.size(), target);

    let mut staged = scene.clone();
    staged.resize(target.width, target.height);
    staged.remap(&mapping);

    let frame = backend.rasterize(&staged, texture, settings.background)?;
    let bytes = encode_frame(&frame, settings)?;
    let name = export_filename(&settings.app_prefix, label, settings.format);

    tracing::debug!(
        "Exported {name} at {width}x{height} (fit scale {:.4}, {} bytes)",
        mapping.scale,
        bytes.len()
    );
    Ok(ExportedFile {
        name,
        mime: settings.format.mime().to_string(),
        width,
        height,
        bytes,
    })
}

/// Export an encoded image with no interactive canvas behind it.
///
/// The image's own size stands in for the on-screen canvas, so the result
/// matches what [`crate::Composer::export_composition`] produces for an
/// untouched composition of the same image.
///
/// # Errors
///
/// Returns an error if the bytes cannot be decoded or the export fails.
pub fn export_image_bytes(
    bytes: &[u8],
    request: &ExportRequest,
    settings: &ExportSettings,
    label: Option<&ExportLabel>,
) -> RenderResult<ExportedFile> {
    let texture = load_image_from_bytes(bytes)?;
    let native = Size::from_pixels(texture.width, texture.height);

    let mut scene = Scene::new(native.width, native.height);
    scene.add_shape(Shape::image(texture.width, texture.height));

    let size = resolve_export_size(request, native, native);
    let mut backend = SkiaBackend::new();
    render_export(&mut backend, &scene, Some(&texture), size, settings, label)
}

/// Encode a frame with the configured format.
///
/// # Errors
///
/// Returns an error if encoding fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_frame(frame: &Frame, settings: &ExportSettings) -> RenderResult<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    match settings.format {
        ExportFormat::Png => {
            image::codecs::png::PngEncoder::new(&mut buf)
                .write_image(&frame.rgba, frame.width, frame.height, image::ColorType::Rgba8.into())
                .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
        }
        ExportFormat::Jpeg => {
            let bg = &settings.background;
            let mut rgb_data = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
            for pixel in frame.rgba.chunks_exact(4) {
                let alpha = f32::from(pixel[3]) / 255.0;
                let inv = 1.0 - alpha;
                rgb_data.push((f32::from(pixel[0]).mul_add(alpha, f32::from(bg[0]) * inv)) as u8);
                rgb_data.push((f32::from(pixel[1]).mul_add(alpha, f32::from(bg[1]) * inv)) as u8);
                rgb_data.push((f32::from(pixel[2]).mul_add(alpha, f32::from(bg[2]) * inv)) as u8);
            }
            let quality = settings.quality.clamp(1, 100);
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
                .write_image(&rgb_data, frame.width, frame.height, image::ColorType::Rgb8.into())
                .map_err(|e| RenderError::Export(format!("JPEG encoding failed: {e}")))?;
        }
        ExportFormat::WebP => {
            image::codecs::webp::WebPEncoder::new_lossless(&mut buf)
                .write_image(&frame.rgba, frame.width, frame.height, image::ColorType::Rgba8.into())
                .map_err(|e| RenderError::Export(format!("WebP encoding failed: {e}")))?;
        }
    }
    Ok(buf.into_inner())
}
