use crate::coords::Affine;

use super::Transform;

/// Renderable node state: local transform + visibility, and the world values
/// composed from the parent on each [`update_transform`](Self::update_transform).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub transform: Transform,
    pub alpha: f32,
    pub visible: bool,
    /// Cleared to exclude the node from rendering while keeping it updated.
    pub renderable: bool,

    world_transform: Affine,
    world_alpha: f32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            alpha: 1.0,
            visible: true,
            renderable: true,
            world_transform: Affine::IDENTITY,
            world_alpha: 1.0,
        }
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes `parent_world × local` and `parent_alpha × alpha`.
    pub fn update_transform(&mut self, parent_world: &Affine, parent_alpha: f32) {
        self.world_transform = *parent_world * self.transform.to_affine();
        self.world_alpha = parent_alpha * self.alpha;
    }

    /// Updates as a root node (identity parent, opaque).
    #[inline]
    pub fn update_as_root(&mut self) {
        self.update_transform(&Affine::IDENTITY, 1.0);
    }

    #[inline]
    pub fn world_transform(&self) -> &Affine {
        &self.world_transform
    }

    #[inline]
    pub fn world_alpha(&self) -> f32 {
        self.world_alpha
    }

    /// Visible, renderable and not fully transparent.
    #[inline]
    pub fn should_render(&self) -> bool {
        self.visible && self.renderable && self.world_alpha > 0.0
    }
}
