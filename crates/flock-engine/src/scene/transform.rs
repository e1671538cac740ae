use crate::coords::{Affine, Vec2};

/// Local transform of a node.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    /// Radians, clockwise in +Y-down space.
    pub rotation: f32,
    /// Local point that `position` refers to and rotation/scale pivot around.
    pub pivot: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::zero(),
            scale: Vec2::splat(1.0),
            rotation: 0.0,
            pivot: Vec2::zero(),
        }
    }
}

impl Transform {
    #[inline]
    pub fn from_position(position: Vec2) -> Self {
        Self { position, ..Self::default() }
    }

    #[inline]
    pub fn to_affine(&self) -> Affine {
        Affine::from_trs(self.position, self.rotation, self.scale, self.pivot)
    }
}
