use crate::coords::{Affine, Vec2};
use crate::texture::Texture;

/// Transform-only visual element batched by a `BatchContainer`.
///
/// Sprites carry no children, filters or tint; everything that varies per
/// element is one of the five batchable attributes (scale, position,
/// rotation, uvs, alpha).
#[derive(Debug, Clone)]
pub struct Sprite {
    pub position: Vec2,
    pub scale: Vec2,
    /// Radians.
    pub rotation: f32,
    /// Normalized anchor within the frame; `(0.5, 0.5)` centers the sprite on `position`.
    pub anchor: Vec2,
    pub alpha: f32,
    pub visible: bool,
    texture: Texture,
}

impl Sprite {
    pub fn new(texture: Texture) -> Self {
        Self {
            position: Vec2::zero(),
            scale: Vec2::splat(1.0),
            rotation: 0.0,
            anchor: Vec2::zero(),
            alpha: 1.0,
            visible: true,
            texture,
        }
    }

    #[inline]
    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    #[inline]
    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = anchor;
        self
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Replaces the texture. Inside a batch container this changes static data;
    /// notify the container with `on_children_change(index)`.
    #[inline]
    pub fn set_texture(&mut self, texture: Texture) {
        self.texture = texture;
    }

    /// Local transform (no pivot; the anchor is applied to the frame instead).
    #[inline]
    pub fn local_affine(&self) -> Affine {
        Affine::from_trs(self.position, self.rotation, self.scale, Vec2::zero())
    }
}
