use std::path::Path;

use anyhow::{Context, Result};

use crate::coords::{Affine, Rect, Vec2};
use crate::paint::{BlendMode, Color};
use crate::texture::ImageSource;

use super::RasterContext;

/// Software RGBA target (linear premultiplied `f32`).
///
/// Sampling is nearest-neighbour; good enough for a fallback path and for
/// deterministic tests.
#[derive(Debug, Clone)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<[f32; 4]>,

    transform: Affine,
    global_alpha: f32,
    mode: BlendMode,
}

impl Pixmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 4]; width as usize * height as usize],
            transform: Affine::IDENTITY,
            global_alpha: 1.0,
            mode: BlendMode::Normal,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fills every pixel with `color` (ignores transform/alpha/mode).
    pub fn clear(&mut self, color: Color) {
        self.data.fill([color.r, color.g, color.b, color.a]);
    }

    /// Premultiplied pixel value; transparent outside the pixmap.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        if x >= self.width || y >= self.height {
            return [0.0; 4];
        }
        self.data[(y * self.width + x) as usize]
    }

    /// Straight-alpha RGBA8, as image encoders expect.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 4);
        for &[r, g, b, a] in &self.data {
            let inv = if a > 0.0 { 1.0 / a } else { 0.0 };
            for c in [r * inv, g * inv, b * inv, a] {
                out.push((c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8);
            }
        }
        out
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let img = image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
            .context("pixmap buffer does not match its dimensions")?;
        img.save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {}x{} raster frame to {}", self.width, self.height, path.display());
        Ok(())
    }

    fn blend(&mut self, x: u32, y: u32, src: [f32; 4]) {
        let dst = &mut self.data[(y * self.width + x) as usize];
        let (sa, da) = (src[3], dst[3]);
        for i in 0..3 {
            dst[i] = self.mode.composite(src[i], sa, dst[i], da);
        }
        dst[3] = self.mode.composite(sa, sa, da, da);
    }
}

impl RasterContext for Pixmap {
    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_composite_mode(&mut self, mode: BlendMode) {
        self.mode = mode;
    }

    fn draw_image_region(&mut self, image: &ImageSource, src: Rect, dst: Rect) {
        if src.is_empty() || dst.is_empty() || self.global_alpha <= 0.0 {
            return;
        }
        let Some(inv) = self.transform.inverse() else { return };

        // Device-space bounding box of the transformed destination rect.
        let corners = dst.corners().map(|c| self.transform.apply(c));
        let (mut min, mut max) = (corners[0], corners[0]);
        for c in &corners[1..] {
            min = Vec2::new(min.x.min(c.x), min.y.min(c.y));
            max = Vec2::new(max.x.max(c.x), max.y.max(c.y));
        }
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(self.width);
        let y1 = (max.y.ceil().max(0.0) as u32).min(self.height);

        let alpha = self.global_alpha;
        for y in y0..y1 {
            for x in x0..x1 {
                let p = inv.apply(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                let u = (p.x - dst.origin.x) / dst.size.x;
                let v = (p.y - dst.origin.y) / dst.size.y;
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                let sx = (src.origin.x + u * src.size.x).floor() as i64;
                let sy = (src.origin.y + v * src.size.y).floor() as i64;
                let t = image.texel(sx, sy);
                if t[3] == 0 {
                    continue;
                }
                let s = t.map(|c| c as f32 / 255.0 * alpha);
                self.blend(x, y, s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_source(w: u32, h: u32) -> std::rc::Rc<ImageSource> {
        let px = [255u8, 0, 0, 255].repeat((w * h) as usize);
        ImageSource::from_rgba8(w, h, px, 1.0).unwrap()
    }

    #[test]
    fn draws_region_at_destination() {
        let mut pm = Pixmap::new(8, 8);
        let src = red_source(2, 2);
        pm.draw_image_region(&src, Rect::new(0.0, 0.0, 2.0, 2.0), Rect::new(2.0, 2.0, 2.0, 2.0));
        assert_eq!(pm.pixel(2, 2), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(pm.pixel(3, 3), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(pm.pixel(4, 4), [0.0; 4]);
        assert_eq!(pm.pixel(1, 1), [0.0; 4]);
    }

    #[test]
    fn transform_and_global_alpha_apply() {
        let mut pm = Pixmap::new(8, 8);
        let src = red_source(1, 1);
        pm.set_transform(Affine::translation(5.0, 0.0));
        pm.set_global_alpha(0.5);
        pm.draw_image_region(&src, Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(pm.pixel(5, 0), [0.5, 0.0, 0.0, 0.5]);
        assert_eq!(pm.pixel(0, 0), [0.0; 4]);
    }

    #[test]
    fn additive_mode_saturates() {
        let mut pm = Pixmap::new(1, 1);
        pm.clear(Color::from_premul(0.75, 0.0, 0.0, 0.75));
        pm.set_composite_mode(BlendMode::Add);
        let src = red_source(1, 1);
        pm.draw_image_region(&src, Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(pm.pixel(0, 0), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn to_rgba8_unpremultiplies() {
        let mut pm = Pixmap::new(1, 1);
        pm.clear(Color::from_premul(0.5, 0.0, 0.0, 0.5));
        assert_eq!(pm.to_rgba8(), vec![255, 0, 0, 128]);
    }
}
