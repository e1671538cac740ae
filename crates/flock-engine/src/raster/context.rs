use crate::coords::{Affine, Rect};
use crate::paint::BlendMode;
use crate::texture::ImageSource;

/// 2D drawing context consumed by raster render paths.
///
/// Semantics follow a canvas 2D context: `set_transform` replaces the current
/// matrix (device pixels), `set_global_alpha` multiplies every subsequent
/// draw, and `draw_image_region` maps `src` (image device pixels) onto `dst`
/// (user space under the current transform).
pub trait RasterContext {
    fn set_transform(&mut self, transform: Affine);
    fn set_global_alpha(&mut self, alpha: f32);
    fn set_composite_mode(&mut self, mode: BlendMode);
    fn draw_image_region(&mut self, image: &ImageSource, src: Rect, dst: Rect);
}

/// Renderer-level options for raster output.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RasterOptions {
    /// Device pixels per logical pixel.
    pub resolution: f32,
    /// Truncate translations to whole pixels for rotated elements.
    pub round_pixels: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { resolution: 1.0, round_pixels: false }
    }
}
