use std::cell::RefCell;
use std::f32::consts::TAU;
use std::rc::Rc;

use anyhow::Result;

use flock_engine::batch::{BatchConfig, BatchContainer, PropertySelection};
use flock_engine::coords::{Affine, Vec2, Viewport};
use flock_engine::paint::BlendMode;
use flock_engine::ribbon::{PointChain, RibbonMesh};
use flock_engine::scene::Sprite;
use flock_engine::texture::{ImageSource, Texture};

const DOT_SIZE: u32 = 16;
/// Seconds between consecutive ribbon points along the path.
const TRAIL_STEP: f32 = 0.025;

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub sprites: usize,
    pub ribbon_points: usize,
    pub taper: bool,
    pub blend: BlendMode,
}

/// Per-sprite orbit parameters.
#[derive(Debug, Copy, Clone)]
struct Orbit {
    phase: f32,
    speed: f32,
    radius: f32,
}

impl Orbit {
    /// Deterministic spread from the sprite index (golden-ratio sequence).
    fn for_index(i: usize) -> Self {
        let g = (i as f32 * 0.618_034).fract();
        let h = (i as f32 * 0.754_878).fract();
        Self {
            phase: g * TAU,
            speed: 0.2 + h * 0.8,
            radius: 0.15 + 0.85 * ((g + h) * 0.5),
        }
    }
}

/// A swarm of orbiting sprites plus a ribbon tracing a Lissajous path.
pub struct Demo {
    pub swarm: BatchContainer,
    pub ribbon: RibbonMesh,
    points: PointChain,
    orbits: Vec<Orbit>,
}

impl Demo {
    pub fn new(config: &DemoConfig) -> Result<Self> {
        let dot = Texture::new(ImageSource::from_rgba8(DOT_SIZE, DOT_SIZE, soft_disc(DOT_SIZE), 1.0)?);

        let mut swarm = BatchContainer::new(BatchConfig {
            max_size: config.sprites.max(1),
            properties: PropertySelection::new().position(true).rotation(true).alpha(true),
            blend_mode: config.blend,
            ..BatchConfig::default()
        });
        let orbits: Vec<Orbit> = (0..config.sprites).map(Orbit::for_index).collect();
        for orbit in &orbits {
            let mut sprite = Sprite::new(dot.clone()).with_anchor(Vec2::splat(0.5));
            sprite.scale = Vec2::splat(0.5 + orbit.radius);
            swarm.add_child(sprite);
        }

        let strip = Texture::new(ImageSource::from_rgba8(64, 12, gradient_strip(64, 12), 1.0)?);
        let points: PointChain = Rc::new(RefCell::new(vec![Vec2::zero(); config.ribbon_points]));
        let mut ribbon = RibbonMesh::new(strip, points.clone());
        ribbon.set_taper(config.taper);
        ribbon.blend_mode = BlendMode::Add;

        log::info!(
            "demo: {} sprite(s) in {} batch(es), ribbon of {} point(s)",
            swarm.len(),
            swarm.len().div_ceil(swarm.batch_size()),
            config.ribbon_points
        );

        Ok(Self {
            swarm,
            ribbon,
            points,
            orbits,
        })
    }

    /// Moves sprites and ribbon points to their state at `elapsed` seconds.
    pub fn update(&mut self, elapsed: f32, viewport: Viewport) {
        let center = Vec2::new(viewport.width * 0.5, viewport.height * 0.5);
        let reach = viewport.width.min(viewport.height) * 0.45;

        for (sprite, orbit) in self.swarm.children_mut().iter_mut().zip(&self.orbits) {
            let angle = orbit.phase + elapsed * orbit.speed;
            let wobble = 1.0 + 0.1 * (elapsed * 3.0 + orbit.phase).sin();
            sprite.position = center + Vec2::new(angle.cos(), angle.sin()) * (reach * orbit.radius * wobble);
            sprite.rotation = angle * 2.0;
            sprite.alpha = 0.55 + 0.45 * (elapsed * 2.0 + orbit.phase * 3.0).sin();
        }
        self.swarm.node_mut().update_as_root();

        for (i, point) in self.points.borrow_mut().iter_mut().enumerate() {
            let t = elapsed - i as f32 * TRAIL_STEP;
            *point = center
                + Vec2::new(
                    (t * 1.3).sin() * viewport.width * 0.35,
                    (t * 2.1).sin() * viewport.height * 0.3,
                );
        }
        self.ribbon.update_transform(&Affine::IDENTITY, 1.0);
    }
}

/// White disc with a soft edge, straight alpha.
fn soft_disc(size: u32) -> Vec<u8> {
    let r = size as f32 * 0.5;
    let mut out = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let d = Vec2::new(x as f32 + 0.5 - r, y as f32 + 0.5 - r).length() / r;
            let a = ((1.0 - d) * 3.0).clamp(0.0, 1.0);
            out.extend_from_slice(&[255, 255, 255, (a * 255.0) as u8]);
        }
    }
    out
}

/// Horizontal teal-to-magenta gradient, fading out at the top and bottom rows.
fn gradient_strip(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let v = (y as f32 + 0.5) / height as f32;
        let a = (1.0 - (v * 2.0 - 1.0).abs()).sqrt();
        for x in 0..width {
            let u = x as f32 / (width - 1).max(1) as f32;
            out.extend_from_slice(&[
                (40.0 + 200.0 * u) as u8,
                (220.0 - 160.0 * u) as u8,
                (230.0 - 30.0 * u) as u8,
                (a * 255.0) as u8,
            ]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DemoConfig {
        DemoConfig {
            sprites: 10,
            ribbon_points: 8,
            taper: false,
            blend: BlendMode::Normal,
        }
    }

    #[test]
    fn sprites_stay_inside_the_viewport() {
        let mut demo = Demo::new(&config()).unwrap();
        demo.update(1.5, Viewport::new(400.0, 300.0));
        for sprite in demo.swarm.children() {
            assert!(sprite.position.x > 0.0 && sprite.position.x < 400.0);
            assert!(sprite.position.y > 0.0 && sprite.position.y < 300.0);
        }
    }

    #[test]
    fn ribbon_follows_the_point_chain() {
        let mut demo = Demo::new(&config()).unwrap();
        demo.update(0.5, Viewport::new(400.0, 300.0));
        assert_eq!(demo.ribbon.vertices().len(), 8 * 4);
        assert!(demo.ribbon.vertices().iter().all(|v| v.is_finite()));
    }
}
