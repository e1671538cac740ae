use core::f32::consts::TAU;

use crate::coords::{Affine, Rect};
use crate::raster::{RasterContext, RasterOptions};

use super::{BatchContainer, BatchSurface};

/// Raster fallback surface: draws each element immediately through a [`RasterContext`].
pub struct RasterSurface<'c, C: RasterContext + ?Sized> {
    ctx: &'c mut C,
    options: RasterOptions,
}

impl<'c, C: RasterContext + ?Sized> RasterSurface<'c, C> {
    pub fn new(ctx: &'c mut C, options: RasterOptions) -> Self {
        Self { ctx, options }
    }
}

impl<C: RasterContext + ?Sized> BatchSurface for RasterSurface<'_, C> {
    fn draw_batches(&mut self, container: &mut BatchContainer) {
        container.draw_raster(self.ctx, self.options);
    }
}

impl BatchContainer {
    /// Draws children in list order, one `draw_image_region` per visible child.
    ///
    /// Unrotated children share the container transform (set once per run of
    /// unrotated children) and get their scale folded into the destination
    /// rect. Rotated children get their own world transform.
    pub(crate) fn draw_raster<C: RasterContext + ?Sized>(&mut self, ctx: &mut C, options: RasterOptions) {
        if !self.can_render() {
            return;
        }
        let total = self.rendered_len();
        let world = *self.node().world_transform();
        let world_alpha = self.node().world_alpha();
        let res = options.resolution;

        ctx.set_composite_mode(self.blend_mode);

        // Forces the shared transform to be set before the first unrotated child.
        let mut rotated = true;

        for child in &self.children()[..total] {
            if !child.visible {
                continue;
            }
            let frame = child.texture().frame();
            ctx.set_global_alpha(world_alpha * child.alpha);

            let dst = if child.rotation % TAU == 0.0 {
                if rotated {
                    ctx.set_transform(world.with_scaled_translation(res));
                    rotated = false;
                }
                let size = frame.size.scale(child.scale);
                Rect::from_origin_size(child.position - child.anchor.scale(size), size)
            } else {
                rotated = true;
                let mut m = (world * child.local_affine()).with_scaled_translation(res);
                if options.round_pixels {
                    m = Affine { tx: m.tx.trunc(), ty: m.ty.trunc(), ..m };
                }
                ctx.set_transform(m);
                Rect::from_origin_size(-child.anchor.scale(frame.size), frame.size)
            };

            let source = child.texture().source();
            let src = frame.scaled(source.resolution());
            ctx.draw_image_region(source, src, dst.scaled(res));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::coords::Vec2;
    use crate::paint::BlendMode;
    use crate::scene::Sprite;
    use crate::texture::{ImageSource, Texture};
    use approx::assert_abs_diff_eq;
    use core::f32::consts::FRAC_PI_2;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Transform(Affine),
        Alpha(f32),
        Mode(BlendMode),
        Draw { src: Rect, dst: Rect },
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl Recorder {
        fn draws(&self) -> Vec<(Rect, Rect)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Draw { src, dst } => Some((*src, *dst)),
                    _ => None,
                })
                .collect()
        }

        fn transforms(&self) -> Vec<Affine> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Transform(m) => Some(*m),
                    _ => None,
                })
                .collect()
        }
    }

    impl RasterContext for Recorder {
        fn set_transform(&mut self, transform: Affine) {
            self.calls.push(Call::Transform(transform));
        }
        fn set_global_alpha(&mut self, alpha: f32) {
            self.calls.push(Call::Alpha(alpha));
        }
        fn set_composite_mode(&mut self, mode: BlendMode) {
            self.calls.push(Call::Mode(mode));
        }
        fn draw_image_region(&mut self, _image: &ImageSource, src: Rect, dst: Rect) {
            self.calls.push(Call::Draw { src, dst });
        }
    }

    fn texture(w: u32, h: u32, resolution: f32) -> Texture {
        Texture::new(ImageSource::from_rgba8(w, h, vec![255; (w * h * 4) as usize], resolution).unwrap())
    }

    fn render(c: &mut BatchContainer, options: RasterOptions) -> Recorder {
        let mut rec = Recorder::default();
        c.render(&mut RasterSurface::new(&mut rec, options));
        rec
    }

    #[test]
    fn unrotated_children_share_one_transform() {
        let tex = texture(10, 20, 1.0);
        let mut c = BatchContainer::new(BatchConfig::default());
        c.node_mut().transform.position = Vec2::new(100.0, 0.0);
        c.node_mut().update_as_root();

        let mut a = Sprite::new(tex.clone()).at(Vec2::new(5.0, 5.0)).with_anchor(Vec2::splat(0.5));
        a.scale = Vec2::splat(2.0);
        c.add_child(a);
        c.add_child(Sprite::new(tex).at(Vec2::new(1.0, 2.0)));

        let rec = render(&mut c, RasterOptions::default());

        assert_eq!(rec.transforms(), vec![Affine::translation(100.0, 0.0)]);
        assert_eq!(
            rec.draws(),
            vec![
                (Rect::new(0.0, 0.0, 10.0, 20.0), Rect::new(-5.0, -15.0, 20.0, 40.0)),
                (Rect::new(0.0, 0.0, 10.0, 20.0), Rect::new(1.0, 2.0, 10.0, 20.0)),
            ]
        );
        assert_eq!(rec.calls[0], Call::Mode(BlendMode::Normal));
    }

    #[test]
    fn rotated_child_gets_own_transform_and_anchor_only_dst() {
        let mut c = BatchContainer::new(BatchConfig::default());
        c.node_mut().update_as_root();
        let mut s = Sprite::new(texture(10, 10, 1.0)).at(Vec2::new(30.0, 40.0)).with_anchor(Vec2::splat(0.5));
        s.rotation = FRAC_PI_2;
        s.scale = Vec2::splat(3.0);
        c.add_child(s);
        c.add_child(Sprite::new(texture(4, 4, 1.0)));

        let rec = render(&mut c, RasterOptions::default());
        let ts = rec.transforms();

        assert_eq!(ts.len(), 2);
        assert_abs_diff_eq!(ts[0].a, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(ts[0].b, 3.0, epsilon = 1e-5);
        assert_eq!((ts[0].tx, ts[0].ty), (30.0, 40.0));
        // Back to an unrotated child: container transform is restored.
        assert_eq!(ts[1], Affine::IDENTITY);
        assert_eq!(rec.draws()[0].1, Rect::new(-5.0, -5.0, 10.0, 10.0));
    }

    #[test]
    fn round_pixels_truncates_rotated_translation_only() {
        let mut c = BatchContainer::new(BatchConfig::default());
        c.node_mut().transform.position = Vec2::new(0.75, 0.25);
        c.node_mut().update_as_root();
        let mut s = Sprite::new(texture(2, 2, 1.0)).at(Vec2::new(10.5, 3.5));
        s.rotation = 1.0;
        c.add_child(s);
        c.add_child(Sprite::new(texture(2, 2, 1.0)));

        let opts = RasterOptions { resolution: 1.0, round_pixels: true };
        let ts = render(&mut c, opts).transforms();

        assert_eq!((ts[0].tx, ts[0].ty), (11.0, 3.0));
        assert_eq!((ts[1].tx, ts[1].ty), (0.75, 0.25));
    }

    #[test]
    fn full_turn_uses_fast_path() {
        let mut c = BatchContainer::new(BatchConfig::default());
        c.node_mut().update_as_root();
        let mut s = Sprite::new(texture(2, 2, 1.0));
        s.rotation = TAU;
        c.add_child(s);
        assert_eq!(render(&mut c, RasterOptions::default()).transforms(), vec![Affine::IDENTITY]);
    }

    #[test]
    fn alpha_is_composed_and_hidden_children_skipped() {
        let tex = texture(2, 2, 1.0);
        let mut c = BatchContainer::new(BatchConfig::default());
        c.node_mut().alpha = 0.5;
        c.node_mut().update_as_root();
        let mut hidden = Sprite::new(tex.clone());
        hidden.visible = false;
        c.add_child(hidden);
        let mut s = Sprite::new(tex);
        s.alpha = 0.5;
        c.add_child(s);

        let rec = render(&mut c, RasterOptions::default());
        assert_eq!(rec.draws().len(), 1);
        let alphas: Vec<f32> = rec
            .calls
            .iter()
            .filter_map(|c| if let Call::Alpha(a) = c { Some(*a) } else { None })
            .collect();
        // Only the drawn child sets alpha, composed with the container's.
        assert_eq!(alphas, vec![0.25]);
    }

    #[test]
    fn resolution_scales_source_and_destination() {
        let mut c = BatchContainer::new(BatchConfig::default());
        c.node_mut().transform.position = Vec2::new(1.0, 1.0);
        c.node_mut().update_as_root();
        // 8x8 device pixels at @2x is a 4x4 logical frame.
        c.add_child(Sprite::new(texture(8, 8, 2.0)).at(Vec2::new(2.0, 0.0)));

        let rec = render(&mut c, RasterOptions { resolution: 3.0, round_pixels: false });
        assert_eq!(rec.transforms(), vec![Affine::translation(3.0, 3.0)]);
        assert_eq!(
            rec.draws(),
            vec![(Rect::new(0.0, 0.0, 8.0, 8.0), Rect::new(6.0, 0.0, 12.0, 12.0))]
        );
    }
}
