//! Canvas composition engine.
//!
//! A [`Composer`] owns the scene of one editing session: the base image,
//! the annotation shapes drawn over it, and the baseline used to tell
//! whether the image has been moved since it was loaded.

use studio_core::geometry::{fit_scale, resolve_export_size, tile_offset, Size};
use studio_core::{ExportRequest, Scene, Shape, ShapeId, ShapeTransform};
use tokio::sync::watch;

use crate::backend::{RenderBackend, SkiaBackend};
use crate::error::{RenderError, RenderResult};
use crate::export::{render_export, ExportLabel, ExportSettings, ExportedFile};
use crate::image::{ImageSource, TextureData};

/// Distance between successive placements, and the canvas margin.
pub const SHAPE_PADDING: f64 = 20.0;

/// Default rectangle size.
pub const RECT_SIZE: (f64, f64) = (100.0, 60.0);

/// Default circle diameter.
pub const CIRCLE_DIAMETER: f64 = 80.0;

/// Stroke colors cycled through as shapes are added.
pub const SHAPE_PALETTE: [&str; 5] = ["#ff3b30", "#34c759", "#007aff", "#ffcc00", "#af52de"];

/// The interactive canvas of one editing session.
pub struct Composer {
    backend: Box<dyn RenderBackend>,
    scene: Scene,
    texture: Option<TextureData>,
    baseline: Option<ShapeTransform>,
    shape_counter: u32,
    dirty: watch::Sender<bool>,
    error: Option<String>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("backend", &self.backend.name())
            .field("scene", &self.scene)
            .field("texture", &self.texture)
            .field("baseline", &self.baseline)
            .field("shape_counter", &self.shape_counter)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Composer {
    /// Create a composer for a container of the given size.
    #[must_use]
    pub fn new(container_width: f64, container_height: f64) -> Self {
        Self::with_backend(Box::new(SkiaBackend::new()), container_width, container_height)
    }

    /// Create a composer drawing through a specific backend.
    #[must_use]
    pub fn with_backend(
        backend: Box<dyn RenderBackend>,
        container_width: f64,
        container_height: f64,
    ) -> Self {
        let (dirty, _) = watch::channel(false);
        Self {
            backend,
            scene: Scene::new(container_width, container_height),
            texture: None,
            baseline: None,
            shape_counter: 0,
            dirty,
            error: None,
        }
    }

    /// Load a base image, replacing everything on the canvas.
    ///
    /// Decode failures do not propagate: they are recorded and available
    /// through [`Composer::error`].
    pub fn load_image(&mut self, source: &ImageSource) {
        self.clear_session();
        match source.decode() {
            Ok(texture) => self.load_texture(texture),
            Err(e) => {
                tracing::warn!("Failed to load canvas image: {e}");
                self.error = Some(e.to_string());
            }
        }
    }

    /// Load already decoded pixels as the base image.
    pub fn load_texture(&mut self, texture: TextureData) {
        self.clear_session();

        let natural = Size::from_pixels(texture.width, texture.height);
        let scale = fit_scale(self.scene.size(), natural);
        let transform = ShapeTransform {
            scale_x: scale,
            scale_y: scale,
            ..ShapeTransform::default()
        };
        self.scene
            .add_shape(Shape::image(texture.width, texture.height).with_transform(transform));
        self.baseline = Some(transform);
        tracing::debug!(
            "Loaded {}x{} image at scale {scale:.4}",
            texture.width,
            texture.height
        );
        self.texture = Some(texture);
        self.refresh_dirty();
    }

    fn clear_session(&mut self) {
        self.scene.clear();
        self.texture = None;
        self.baseline = None;
        self.shape_counter = 0;
        self.error = None;
        self.refresh_dirty();
    }

    /// Add an outlined rectangle at the next tiled position and select it.
    pub fn add_rectangle(&mut self) -> ShapeId {
        let (width, height) = RECT_SIZE;
        let stroke = self.next_color();
        self.place(Shape::rect(width, height, stroke))
    }

    /// Add an outlined circle at the next tiled position and select it.
    pub fn add_circle(&mut self) -> ShapeId {
        let stroke = self.next_color();
        self.place(Shape::circle(CIRCLE_DIAMETER, stroke))
    }

    fn next_color(&self) -> &'static str {
        SHAPE_PALETTE[self.shape_counter as usize % SHAPE_PALETTE.len()]
    }

    fn place(&mut self, shape: Shape) -> ShapeId {
        let canvas = self.scene.size();
        let max_x = canvas.width - shape.width - 2.0 * SHAPE_PADDING;
        let max_y = canvas.height - shape.height - 2.0 * SHAPE_PADDING;
        let (offset_x, offset_y) = tile_offset(self.shape_counter, SHAPE_PADDING, max_x, max_y);
        self.shape_counter += 1;

        let shape = shape.with_transform(ShapeTransform::at(
            SHAPE_PADDING + offset_x,
            SHAPE_PADDING + offset_y,
        ));
        let id = self.scene.add_shape(shape);
        // Freshly added shapes always exist.
        let _ = self.scene.select(id);
        id
    }

    /// Remove the selected shape. The base image is never removed.
    pub fn delete_active_shape(&mut self) -> Option<Shape> {
        let active = self.scene.active()?;
        if active.is_image() {
            tracing::debug!("Refusing to delete the base image");
            return None;
        }
        let id = active.id;
        self.scene.remove_shape(id).ok()
    }

    /// Select a shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is not on the canvas.
    pub fn select(&mut self, id: ShapeId) -> RenderResult<()> {
        Ok(self.scene.select(id)?)
    }

    /// Whether the base image has moved away from where it was loaded.
    #[must_use]
    pub fn is_image_dirty(&self) -> bool {
        match (self.scene.image_shape(), &self.baseline) {
            (Some(image), Some(baseline)) => !image.transform.approx_eq(baseline),
            _ => false,
        }
    }

    /// Observe the dirty flag. The channel only fires on changes.
    #[must_use]
    pub fn subscribe_dirty(&self) -> watch::Receiver<bool> {
        self.dirty.subscribe()
    }

    fn refresh_dirty(&self) {
        let now = self.is_image_dirty();
        self.dirty.send_if_modified(|dirty| {
            if *dirty == now {
                return false;
            }
            *dirty = now;
            true
        });
    }

    /// Put the base image back where it was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] if no image is loaded.
    pub fn reset_image(&mut self) -> RenderResult<()> {
        let baseline = self.baseline.ok_or_else(not_loaded)?;
        self.update_image(|t| *t = baseline)
    }

    /// Apply a transform event to any shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is not on the canvas.
    pub fn set_transform(&mut self, id: ShapeId, transform: ShapeTransform) -> RenderResult<()> {
        self.scene.set_transform(id, transform)?;
        self.refresh_dirty();
        Ok(())
    }

    /// Drag the base image.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] if no image is loaded.
    pub fn move_image(&mut self, dx: f64, dy: f64) -> RenderResult<()> {
        self.update_image(|t| {
            t.left += dx;
            t.top += dy;
        })
    }

    /// Scale the base image uniformly by `factor`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] if no image is loaded.
    pub fn scale_image(&mut self, factor: f64) -> RenderResult<()> {
        self.update_image(|t| {
            t.scale_x *= factor;
            t.scale_y *= factor;
        })
    }

    /// Rotate the base image by `degrees`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] if no image is loaded.
    pub fn rotate_image(&mut self, degrees: f64) -> RenderResult<()> {
        self.update_image(|t| t.angle = (t.angle + degrees) % 360.0)
    }

    fn update_image(&mut self, f: impl FnOnce(&mut ShapeTransform)) -> RenderResult<()> {
        let id = self.scene.image_shape().map(|s| s.id).ok_or_else(not_loaded)?;
        let shape = self.scene.get_mut(id).ok_or_else(not_loaded)?;
        f(&mut shape.transform);
        self.refresh_dirty();
        Ok(())
    }

    /// Resize the on-screen container. Shapes keep their transforms.
    pub fn resize_container(&mut self, width: f64, height: f64) {
        self.scene.resize(width, height);
    }

    /// Last load error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The current scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Transform of the image right after loading.
    #[must_use]
    pub fn baseline(&self) -> Option<ShapeTransform> {
        self.baseline
    }

    /// Whether a base image is loaded.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.texture.is_some()
    }

    /// Export the composition at an arbitrary resolution.
    ///
    /// The on-screen scene is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] without a loaded image, or an
    /// error if rasterization or encoding fails.
    pub fn export_composition(
        &mut self,
        request: &ExportRequest,
        settings: &ExportSettings,
        label: Option<&ExportLabel>,
    ) -> RenderResult<ExportedFile> {
        let texture = self.texture.as_ref().ok_or_else(not_loaded)?;
        let native = Size::from_pixels(texture.width, texture.height);
        let size = resolve_export_size(request, self.scene.size(), native);
        render_export(
            self.backend.as_mut(),
            &self.scene,
            Some(texture),
            size,
            settings,
            label,
        )
    }
}

fn not_loaded() -> RenderError {
    RenderError::NotInitialized("no image loaded".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    fn texture(width: u32, height: u32) -> TextureData {
        TextureData {
            width,
            height,
            data: vec![128; (width * height * 4) as usize],
            format: ImageFormat::Png,
        }
    }

    fn loaded(width: u32, height: u32) -> Composer {
        let mut composer = Composer::new(800.0, 400.0);
        composer.load_texture(texture(width, height));
        composer
    }

    #[test]
    fn test_load_fits_into_container() {
        let composer = loaded(2000, 1000);
        let image = composer.scene().image_shape().expect("image");
        assert!((image.transform.scale_x - 0.4).abs() < 1e-9);
        assert!((image.transform.scale_y - 0.4).abs() < 1e-9);
        assert_eq!((image.transform.left, image.transform.top), (0.0, 0.0));
        assert_eq!(composer.baseline(), Some(image.transform));
        assert!(!composer.is_image_dirty());
    }

    #[test]
    fn test_rectangle_placement() {
        let mut composer = loaded(2000, 1000);
        let id = composer.add_rectangle();
        let rect = composer.scene().get(id).expect("rect");
        assert_eq!(rect.bounds(), (20.0, 20.0, 100.0, 60.0));
        assert_eq!(rect.stroke.as_deref(), Some(SHAPE_PALETTE[0]));
        assert_eq!(composer.scene().active().map(|s| s.id), Some(id));
        assert!(!composer.is_image_dirty());

        let second = composer.add_circle();
        let circle = composer.scene().get(second).expect("circle");
        assert_eq!(circle.bounds(), (40.0, 20.0, 80.0, 80.0));
        assert_eq!(circle.stroke.as_deref(), Some(SHAPE_PALETTE[1]));
    }

    #[test]
    fn test_placement_wraps() {
        let mut composer = Composer::new(200.0, 200.0);
        // maxX = 200 - 100 - 40 = 60: the fifth step (80px) wraps onto the next row.
        let ids: Vec<_> = (0..5).map(|_| composer.add_rectangle()).collect();
        let fourth = composer.scene().get(ids[3]).expect("rect");
        assert_eq!((fourth.transform.left, fourth.transform.top), (80.0, 20.0));
        let fifth = composer.scene().get(ids[4]).expect("rect");
        assert_eq!((fifth.transform.left, fifth.transform.top), (39.0, 40.0));
    }

    #[test]
    fn test_palette_cycles() {
        let mut composer = loaded(100, 100);
        let ids: Vec<_> = (0..=SHAPE_PALETTE.len()).map(|_| composer.add_circle()).collect();
        let first = composer.scene().get(ids[0]).and_then(|s| s.stroke.clone());
        let wrapped = composer.scene().get(ids[SHAPE_PALETTE.len()]).and_then(|s| s.stroke.clone());
        assert_eq!(first, wrapped);
    }

    #[test]
    fn test_delete_protects_image() {
        let mut composer = loaded(400, 200);
        let image_id = composer.scene().image_shape().map(|s| s.id).expect("image");
        composer.select(image_id).expect("select");
        assert!(composer.delete_active_shape().is_none());
        assert!(composer.scene().image_shape().is_some());

        composer.add_rectangle();
        assert!(composer.delete_active_shape().is_some());
        assert_eq!(composer.scene().shape_count(), 1);
        assert!(composer.delete_active_shape().is_none());
    }

    #[test]
    fn test_dirty_and_reset() {
        let mut composer = loaded(2000, 1000);
        let mut dirty = composer.subscribe_dirty();
        assert!(!*dirty.borrow_and_update());

        composer.move_image(0.3, 0.0).expect("move");
        assert!(!composer.is_image_dirty(), "within tolerance");
        assert!(!dirty.has_changed().expect("open"));

        composer.move_image(5.0, 0.0).expect("move");
        assert!(composer.is_image_dirty());
        assert!(dirty.has_changed().expect("open"));
        assert!(*dirty.borrow_and_update());

        composer.reset_image().expect("reset");
        assert!(!composer.is_image_dirty());
        assert!(!*dirty.borrow_and_update());

        composer.rotate_image(1.0).expect("rotate");
        assert!(composer.is_image_dirty());
        composer.reset_image().expect("reset");
        composer.scale_image(1.01).expect("scale");
        assert!(composer.is_image_dirty());
    }

    #[test]
    fn test_moving_annotation_is_not_dirty() {
        let mut composer = loaded(2000, 1000);
        let id = composer.add_rectangle();
        composer
            .set_transform(id, ShapeTransform::at(300.0, 200.0))
            .expect("transform");
        assert!(!composer.is_image_dirty());
    }

    #[test]
    fn test_load_failure_records_error() {
        let mut composer = loaded(100, 100);
        composer.add_rectangle();
        composer.load_image(&ImageSource::Bytes(b"garbage".to_vec()));
        assert!(composer.error().is_some());
        assert!(composer.scene().is_empty());
        assert!(!composer.has_image());
        assert!(matches!(
            composer.move_image(1.0, 1.0),
            Err(RenderError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_export_requires_image() {
        let mut composer = Composer::new(800.0, 400.0);
        let result = composer.export_composition(
            &ExportRequest::default(),
            &ExportSettings::default(),
            None,
        );
        assert!(matches!(result, Err(RenderError::NotInitialized(_))));
    }

    #[test]
    fn test_export_is_non_destructive() {
        let mut composer = loaded(200, 100);
        composer.add_rectangle();
        composer.move_image(10.0, 5.0).expect("move");
        let before = composer.scene().clone();

        let first = composer
            .export_composition(
                &ExportRequest::default().with_width(400),
                &ExportSettings::default(),
                None,
            )
            .expect("export");
        assert_eq!((first.width, first.height), (400, 200));

        let second = composer
            .export_composition(&ExportRequest::default(), &ExportSettings::default(), None)
            .expect("export");
        assert_eq!((second.width, second.height), (200, 100));

        assert_eq!(composer.scene(), &before);
        assert!(composer.is_image_dirty());
    }
}
