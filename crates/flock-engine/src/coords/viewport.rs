/// Viewport size in logical pixels.
///
/// Renderers upload this as a uniform to map logical positions to NDC.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Converts a physical pixel size to logical pixels at `resolution` device px per logical px.
    #[inline]
    pub fn from_physical(width: u32, height: u32, resolution: f32) -> Self {
        let r = if resolution > 0.0 { resolution } else { 1.0 };
        Self::new(width as f32 / r, height as f32 / r)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}
