use core::ops::Mul;

use super::Vec2;

/// 2D affine transform stored as the 2×3 matrix
///
/// ```text
/// | a  c  tx |
/// | b  d  ty |
/// ```
///
/// which maps `p` to `(a·x + c·y + tx, b·x + d·y + ty)`. This is the same
/// argument order a raster context's `set_transform(a, b, c, d, e, f)` takes.
///
/// Composition: `parent * local` applies `local` first.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[inline]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    #[inline]
    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Builds `translate(position) · rotate(rotation) · scale(scale) · translate(-pivot)`.
    pub fn from_trs(position: Vec2, rotation: f32, scale: Vec2, pivot: Vec2) -> Self {
        let (sin, cos) = rotation.sin_cos();
        let a = cos * scale.x;
        let b = sin * scale.x;
        let c = -sin * scale.y;
        let d = cos * scale.y;
        Self {
            a,
            b,
            c,
            d,
            tx: position.x - (pivot.x * a + pivot.y * c),
            ty: position.y - (pivot.x * b + pivot.y * d),
        }
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Returns the inverse, or `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }

    /// Returns a copy with the translation multiplied by `factor` (linear part untouched).
    #[inline]
    pub fn with_scaled_translation(self, factor: f32) -> Self {
        Self { tx: self.tx * factor, ty: self.ty * factor, ..self }
    }

    /// Column-major 3×3 for WGSL `mat3x3<f32>` uniforms, each column padded to 16 bytes.
    pub fn to_mat3_padded(&self) -> [[f32; 4]; 3] {
        [
            [self.a, self.b, 0.0, 0.0],
            [self.c, self.d, 0.0, 0.0],
            [self.tx, self.ty, 1.0, 0.0],
        ]
    }
}

impl Mul for Affine {
    type Output = Affine;

    #[inline]
    fn mul(self, rhs: Affine) -> Affine {
        Affine {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            tx: self.a * rhs.tx + self.c * rhs.ty + self.tx,
            ty: self.b * rhs.tx + self.d * rhs.ty + self.ty,
        }
    }
}
