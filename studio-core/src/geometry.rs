//! Resolution-independent geometry for placement and export.
//!
//! The on-screen canvas and the exported raster rarely share a size. Every
//! export maps the whole on-screen composition through one [`ExportMapping`]:
//! a uniform scale plus a centering offset, so annotations keep their layout
//! relative to the base image.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::ShapeTransform;
use crate::{CoreError, CoreResult};

/// Position tolerance for dirty detection, in pixels.
pub const POSITION_TOLERANCE: f64 = 0.5;

/// Scale tolerance for dirty detection.
pub const SCALE_TOLERANCE: f64 = 0.001;

/// Angle tolerance for dirty detection, in degrees.
pub const ANGLE_TOLERANCE: f64 = 0.5;

/// Exports smaller than this on either side are doubled when auto upscale is on.
pub const UPSCALE_THRESHOLD: u32 = 1000;

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Size {
    /// Create a size from floating point dimensions.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Create a size from integer pixel dimensions.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self {
            width: f64::from(width),
            height: f64::from(height),
        }
    }

    /// Width divided by height, or 1.0 for a degenerate size.
    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Whether either side is zero or negative.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Round to whole pixels, never below 1x1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_pixels(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

/// A target aspect ratio such as `4:3` or `1:1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Horizontal component.
    pub width: u32,
    /// Vertical component.
    pub height: u32,
}

impl AspectRatio {
    /// Create an aspect ratio.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAspectRatio`] if either side is zero.
    pub fn new(width: u32, height: u32) -> CoreResult<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidAspectRatio(format!("{width}:{height}")));
        }
        Ok(Self { width, height })
    }

    /// The ratio as width / height.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidAspectRatio(s.to_string()))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| CoreError::InvalidAspectRatio(s.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| CoreError::InvalidAspectRatio(s.to_string()))?;
        Self::new(width, height)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Largest uniform scale that fits `content` inside `container`.
///
/// Degenerate content yields 1.0.
#[must_use]
pub fn fit_scale(container: Size, content: Size) -> f64 {
    if content.is_empty() {
        return 1.0;
    }
    (container.width / content.width).min(container.height / content.height)
}

/// What the caller asked the export to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExportRequest {
    /// Explicit output width in pixels.
    pub target_width: Option<u32>,
    /// Explicit output aspect ratio.
    pub aspect_ratio: Option<AspectRatio>,
    /// Double both sides when either falls below [`UPSCALE_THRESHOLD`].
    pub auto_upscale: bool,
}

impl ExportRequest {
    /// Request with an explicit width.
    #[must_use]
    pub fn with_width(mut self, width: u32) -> Self {
        self.target_width = Some(width);
        self
    }

    /// Request with an explicit aspect ratio.
    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect);
        self
    }

    /// Toggle automatic 2x upscaling of small exports.
    #[must_use]
    pub fn with_auto_upscale(mut self, enabled: bool) -> Self {
        self.auto_upscale = enabled;
        self
    }
}

/// Resolve the output pixel size of an export.
///
/// - width given: height follows the requested aspect ratio, else the
///   on-screen canvas aspect;
/// - only an aspect ratio: the native height is kept and the width derived;
/// - neither: native image resolution.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn resolve_export_size(request: &ExportRequest, canvas: Size, native: Size) -> (u32, u32) {
    let size = match (request.target_width, request.aspect_ratio) {
        (Some(width), Some(aspect)) => {
            let w = f64::from(width);
            Size::new(w, w / aspect.ratio())
        }
        (Some(width), None) => {
            let w = f64::from(width);
            Size::new(w, w / canvas.aspect())
        }
        (None, Some(aspect)) => Size::new(native.height * aspect.ratio(), native.height),
        (None, None) => native,
    };

    let (mut width, mut height) = size.to_pixels();
    if request.auto_upscale && (width < UPSCALE_THRESHOLD || height < UPSCALE_THRESHOLD) {
        width = width.saturating_mul(2);
        height = height.saturating_mul(2);
    }
    (width, height)
}

/// Uniform scale plus centering offset from one canvas size to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportMapping {
    /// Uniform scale factor (`fitScale`).
    pub scale: f64,
    /// Horizontal centering offset in target pixels.
    pub offset_x: f64,
    /// Vertical centering offset in target pixels.
    pub offset_y: f64,
}

impl ExportMapping {
    /// Mapping that fits `source` into `target`, centered.
    #[must_use]
    pub fn new(source: Size, target: Size) -> Self {
        let scale = fit_scale(target, source);
        Self {
            scale,
            offset_x: (target.width - source.width * scale) / 2.0,
            offset_y: (target.height - source.height * scale) / 2.0,
        }
    }

    /// Map a transform from source into target space.
    #[must_use]
    pub fn apply(&self, t: &ShapeTransform) -> ShapeTransform {
        ShapeTransform {
            left: t.left * self.scale + self.offset_x,
            top: t.top * self.scale + self.offset_y,
            scale_x: t.scale_x * self.scale,
            scale_y: t.scale_y * self.scale,
            angle: t.angle,
        }
    }

    /// Map a transform from target back into source space.
    #[must_use]
    pub fn invert(&self, t: &ShapeTransform) -> ShapeTransform {
        ShapeTransform {
            left: (t.left - self.offset_x) / self.scale,
            top: (t.top - self.offset_y) / self.scale,
            scale_x: t.scale_x / self.scale,
            scale_y: t.scale_y / self.scale,
            angle: t.angle,
        }
    }
}

/// Wrap-around placement offset for the `count`-th added shape.
///
/// Successive shapes step right by `padding`, wrapping to a new row once
/// they pass `max_x`, and wrapping back to the top once rows pass `max_y`.
#[must_use]
pub fn tile_offset(count: u32, padding: f64, max_x: f64, max_y: f64) -> (f64, f64) {
    let step = f64::from(count) * padding;
    let span_x = max_x.max(0.0).floor() + 1.0;
    let span_y = max_y.max(0.0).floor() + 1.0;
    let offset_x = step % span_x;
    let offset_y = ((step / span_x).floor() * padding) % span_y;
    (offset_x, offset_y)
}
