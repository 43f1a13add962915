//! Scene graph for one editing session.
//!
//! The draw order is back to front. The base image, when present, always
//! sits at index 0.

use serde::{Deserialize, Serialize};

use crate::element::{Shape, ShapeId, ShapeTransform};
use crate::geometry::{ExportMapping, Size};
use crate::{CoreError, CoreResult};

/// A scene containing the shapes of one editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Shapes in draw order, back to front.
    shapes: Vec<Shape>,
    /// Currently active (selected) shape.
    active: Option<ShapeId>,
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
}

impl Scene {
    /// Create a new empty scene with the given canvas size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            shapes: Vec::new(),
            active: None,
            width,
            height,
        }
    }

    /// Canvas size.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Resize the canvas without touching shapes.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Add a shape.
    ///
    /// An image shape replaces any existing image and goes to the back;
    /// annotations go to the front.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id;
        if shape.is_image() {
            if let Some(old) = self.image_shape().map(|s| s.id) {
                self.shapes.retain(|s| s.id != old);
                if self.active == Some(old) {
                    self.active = None;
                }
            }
            self.shapes.insert(0, shape);
        } else {
            self.shapes.push(shape);
        }
        id
    }

    /// Remove a shape from the scene.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is not found.
    pub fn remove_shape(&mut self, id: ShapeId) -> CoreResult<Shape> {
        let index = self
            .shapes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| CoreError::ShapeNotFound(id.to_string()))?;
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(self.shapes.remove(index))
    }

    /// Get a shape by ID.
    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    /// Get a mutable reference to a shape by ID.
    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    /// Replace a shape's transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is not found.
    pub fn set_transform(&mut self, id: ShapeId, transform: ShapeTransform) -> CoreResult<()> {
        let shape = self
            .get_mut(id)
            .ok_or_else(|| CoreError::ShapeNotFound(id.to_string()))?;
        shape.transform = transform;
        Ok(())
    }

    /// The base image shape, if loaded.
    #[must_use]
    pub fn image_shape(&self) -> Option<&Shape> {
        self.shapes.first().filter(|s| s.is_image())
    }

    /// Make a shape the active selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is not found.
    pub fn select(&mut self, id: ShapeId) -> CoreResult<()> {
        if self.get(id).is_none() {
            return Err(CoreError::ShapeNotFound(id.to_string()));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Clear the active selection.
    pub fn deselect(&mut self) {
        self.active = None;
    }

    /// The active shape.
    #[must_use]
    pub fn active(&self) -> Option<&Shape> {
        self.active.and_then(|id| self.get(id))
    }

    /// Shapes in draw order, back to front.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    /// Snapshot of every shape's transform, in draw order.
    #[must_use]
    pub fn transforms(&self) -> Vec<(ShapeId, ShapeTransform)> {
        self.shapes.iter().map(|s| (s.id, s.transform)).collect()
    }

    /// Map every shape through an export mapping.
    pub fn remap(&mut self, mapping: &ExportMapping) {
        for shape in &mut self.shapes {
            shape.transform = mapping.apply(&shape.transform);
        }
    }

    /// Number of shapes in the scene.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Check if the scene is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Drop every shape and the selection.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.active = None;
    }
}
