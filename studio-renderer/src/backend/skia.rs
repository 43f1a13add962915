//! Software rasterizer built on tiny-skia.

use studio_core::{Scene, Shape, ShapeKind, ShapeTransform};
use tiny_skia::{
    Color, ColorU8, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

use crate::image::TextureData;
use crate::{RenderError, RenderResult};

use super::{Frame, RenderBackend};

/// Stroke color used when an annotation has none or an unparsable one.
const FALLBACK_STROKE: (u8, u8, u8) = (255, 59, 48);

/// CPU renderer drawing onto a tiny-skia pixmap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkiaBackend;

impl SkiaBackend {
    /// Create a backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn draw_annotation(pixmap: &mut Pixmap, shape: &Shape) {
        #[allow(clippy::cast_possible_truncation)]
        let Some(rect) = Rect::from_xywh(0.0, 0.0, shape.width as f32, shape.height as f32) else {
            tracing::trace!("Skipping degenerate shape {}", shape.id);
            return;
        };
        let path = match shape.kind {
            ShapeKind::Rect => Some(PathBuilder::from_rect(rect)),
            ShapeKind::Circle => PathBuilder::from_oval(rect),
            ShapeKind::Image => None,
        };
        let Some(path) = path else {
            return;
        };

        let (r, g, b) = shape
            .stroke
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(FALLBACK_STROKE);
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, 255);
        paint.anti_alias = true;

        #[allow(clippy::cast_possible_truncation)]
        let stroke = Stroke {
            width: shape.stroke_width as f32,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, to_skia(&shape.transform), None);
    }
}

impl RenderBackend for SkiaBackend {
    fn name(&self) -> &'static str {
        "tiny-skia"
    }

    fn rasterize(
        &mut self,
        scene: &Scene,
        base: Option<&TextureData>,
        background: [u8; 4],
    ) -> RenderResult<Frame> {
        let (width, height) = scene.size().to_pixels();
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| RenderError::Frame(format!("cannot allocate {width}x{height}")))?;
        let [r, g, b, a] = background;
        pixmap.fill(Color::from_rgba8(r, g, b, a));

        let base_pixmap = base.map(texture_to_pixmap).transpose()?;

        for shape in scene.shapes() {
            match shape.kind {
                ShapeKind::Image => {
                    if let Some(src) = &base_pixmap {
                        let paint = PixmapPaint {
                            quality: FilterQuality::Bilinear,
                            ..PixmapPaint::default()
                        };
                        pixmap.draw_pixmap(
                            0,
                            0,
                            src.as_ref(),
                            &paint,
                            to_skia(&shape.transform),
                            None,
                        );
                    }
                }
                ShapeKind::Rect | ShapeKind::Circle => Self::draw_annotation(&mut pixmap, shape),
            }
        }

        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();

        tracing::trace!("Rasterized {} shapes at {width}x{height}", scene.shape_count());
        Ok(Frame {
            width,
            height,
            rgba,
        })
    }
}

/// Translate, then rotate, then scale about the shape's top-left corner.
#[allow(clippy::cast_possible_truncation)]
fn to_skia(t: &ShapeTransform) -> Transform {
    Transform::from_translate(t.left as f32, t.top as f32)
        .pre_concat(Transform::from_rotate(t.angle as f32))
        .pre_concat(Transform::from_scale(t.scale_x as f32, t.scale_y as f32))
}

fn texture_to_pixmap(texture: &TextureData) -> RenderResult<Pixmap> {
    let size = IntSize::from_wh(texture.width, texture.height)
        .ok_or_else(|| RenderError::Frame("empty texture".to_string()))?;
    let data = texture
        .data
        .chunks_exact(4)
        .flat_map(|p| {
            let c = ColorU8::from_rgba(p[0], p[1], p[2], p[3]).premultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Pixmap::from_vec(data, size)
        .ok_or_else(|| RenderError::Frame("texture size mismatch".to_string()))
}

/// Parse `#rrggbb` (or `rrggbb`).
fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> TextureData {
        TextureData {
            width,
            height,
            data: rgba.repeat((width * height) as usize),
            format: ImageFormat::Unknown,
        }
    }

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff3b30"), Some((255, 59, 48)));
        assert_eq!(parse_hex_color("00FF00"), Some((0, 255, 0)));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn test_empty_scene_is_background() {
        let scene = Scene::new(10.0, 8.0);
        let frame = SkiaBackend::new().rasterize(&scene, None, WHITE).expect("frame");
        assert_eq!((frame.width, frame.height), (10, 8));
        assert_eq!(frame.pixel(5, 5), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(10, 0), None);

        let frame = SkiaBackend::new()
            .rasterize(&scene, None, [0, 0, 0, 255])
            .expect("frame");
        assert_eq!(frame.pixel(5, 5), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_image_drawn_with_scale() {
        let mut scene = Scene::new(20.0, 20.0);
        scene.add_shape(Shape::image(4, 4).with_transform(ShapeTransform {
            scale_x: 2.5,
            scale_y: 2.5,
            ..ShapeTransform::default()
        }));
        let texture = solid(4, 4, [0, 0, 255, 255]);
        let frame = SkiaBackend::new()
            .rasterize(&scene, Some(&texture), WHITE)
            .expect("frame");
        // Inside the scaled 10x10 image.
        assert_eq!(frame.pixel(5, 5), Some([0, 0, 255, 255]));
        // Outside it, background.
        assert_eq!(frame.pixel(15, 15), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_rect_stroke_drawn() {
        let mut scene = Scene::new(50.0, 50.0);
        let mut rect = Shape::rect(30.0, 30.0, "#00ff00").with_transform(ShapeTransform::at(10.0, 10.0));
        rect.stroke_width = 4.0;
        scene.add_shape(rect);
        let frame = SkiaBackend::new().rasterize(&scene, None, WHITE).expect("frame");
        let edge = frame.pixel(10, 25).expect("pixel");
        assert!(edge[1] > 200 && edge[0] < 80, "edge should be green: {edge:?}");
        // Hollow inside.
        assert_eq!(frame.pixel(25, 25), Some([255, 255, 255, 255]));
    }
}
