//! Rendering backend implementations.
//!
//! The composition engine only talks to [`RenderBackend`]; the scene graph
//! itself lives in `studio-core`, so a different rasterizer can be swapped in
//! without touching placement or export math.

pub mod skia;

use studio_core::Scene;

use crate::image::TextureData;
use crate::RenderResult;

pub use skia::SkiaBackend;

/// A rasterized frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA pixel data (4 bytes per pixel, straight alpha).
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// RGBA value at a pixel, if inside the frame.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Trait for rendering backends.
pub trait RenderBackend: Send {
    /// Backend name, for logging.
    fn name(&self) -> &'static str;

    /// Rasterize a scene at its canvas size over an RGBA `background`.
    ///
    /// `base` holds the decoded pixels drawn for the image shape.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterization fails.
    fn rasterize(
        &mut self,
        scene: &Scene,
        base: Option<&TextureData>,
        background: [u8; 4],
    ) -> RenderResult<Frame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_lookup() {
        let frame = Frame {
            width: 2,
            height: 1,
            rgba: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        assert_eq!(frame.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn test_pixel_index_past_u32_range() {
        // (y * width + x) * 4 exceeds u32::MAX here.
        let frame = Frame {
            width: 70_000,
            height: 70_000,
            rgba: Vec::new(),
        };
        assert_eq!(frame.pixel(69_999, 69_999), None);
    }
}
