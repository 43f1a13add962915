//! Canvas shapes - the building blocks of an editing scene.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{ANGLE_TOLERANCE, POSITION_TOLERANCE, SCALE_TOLERANCE};

/// Unique identifier for a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeId(Uuid);

impl ShapeId {
    /// Create a new unique shape ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of content a shape draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// The raster base image. Exactly one per scene, always at the back.
    Image,
    /// An outlined rectangle annotation.
    Rect,
    /// An outlined ellipse annotation.
    Circle,
}

/// Placement of a shape: position of its top-left corner, per-axis scale and
/// rotation in degrees around that corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeTransform {
    /// X position (pixels from left).
    pub left: f64,
    /// Y position (pixels from top).
    pub top: f64,
    /// Horizontal scale.
    pub scale_x: f64,
    /// Vertical scale.
    pub scale_y: f64,
    /// Rotation in degrees.
    pub angle: f64,
}

impl Default for ShapeTransform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

impl ShapeTransform {
    /// Transform at a position with unit scale.
    #[must_use]
    pub fn at(left: f64, top: f64) -> Self {
        Self {
            left,
            top,
            ..Self::default()
        }
    }

    /// Whether `other` is within the dirty-detection tolerances of `self`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.left - other.left).abs() <= POSITION_TOLERANCE
            && (self.top - other.top).abs() <= POSITION_TOLERANCE
            && (self.scale_x - other.scale_x).abs() <= SCALE_TOLERANCE
            && (self.scale_y - other.scale_y).abs() <= SCALE_TOLERANCE
            && (self.angle - other.angle).abs() <= ANGLE_TOLERANCE
    }
}

/// A shape in the scene graph.
///
/// `width`/`height` are the unscaled dimensions; the rendered size is the
/// product with the transform's scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Unique identifier.
    pub id: ShapeId,
    /// Shape content type.
    pub kind: ShapeKind,
    /// Unscaled width in pixels.
    pub width: f64,
    /// Unscaled height in pixels.
    pub height: f64,
    /// Position, scale and rotation.
    pub transform: ShapeTransform,
    /// Stroke color as hex, for annotations.
    pub stroke: Option<String>,
    /// Stroke width in unscaled pixels.
    pub stroke_width: f64,
}

impl Shape {
    /// The base image shape for an image of the given natural size.
    #[must_use]
    pub fn image(width: u32, height: u32) -> Self {
        Self {
            id: ShapeId::new(),
            kind: ShapeKind::Image,
            width: f64::from(width),
            height: f64::from(height),
            transform: ShapeTransform::default(),
            stroke: None,
            stroke_width: 0.0,
        }
    }

    /// An outlined rectangle.
    #[must_use]
    pub fn rect(width: f64, height: f64, stroke: impl Into<String>) -> Self {
        Self {
            id: ShapeId::new(),
            kind: ShapeKind::Rect,
            width,
            height,
            transform: ShapeTransform::default(),
            stroke: Some(stroke.into()),
            stroke_width: 3.0,
        }
    }

    /// An outlined circle of the given diameter.
    #[must_use]
    pub fn circle(diameter: f64, stroke: impl Into<String>) -> Self {
        Self {
            id: ShapeId::new(),
            kind: ShapeKind::Circle,
            width: diameter,
            height: diameter,
            transform: ShapeTransform::default(),
            stroke: Some(stroke.into()),
            stroke_width: 3.0,
        }
    }

    /// Set the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: ShapeTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Whether this is the base image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.kind == ShapeKind::Image
    }

    /// Axis-aligned bounds `(left, top, width, height)`, ignoring rotation.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let t = &self.transform;
        (
            t.left,
            t.top,
            self.width * t.scale_x,
            self.height * t.scale_y,
        )
    }
}
