use super::Vec2;

/// Axis-aligned rectangle in logical pixels (top-left origin).
///
/// Also used for image regions, where units are image pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Uniformly scales origin and size (e.g. logical units → device pixels).
    #[inline]
    pub fn scaled(self, factor: f32) -> Self {
        Self::from_origin_size(self.origin * factor, self.size * factor)
    }

    /// Corners in clockwise order starting at the top-left (for +Y down).
    #[inline]
    pub fn corners(self) -> [Vec2; 4] {
        let min = self.min();
        let max = self.max();
        [
            min,
            Vec2::new(max.x, min.y),
            max,
            Vec2::new(min.x, max.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_scales_origin_and_size() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0).scaled(2.0);
        assert_eq!(r, Rect::new(2.0, 4.0, 6.0, 8.0));
    }

    #[test]
    fn corners_are_clockwise_from_top_left() {
        let c = Rect::new(0.0, 0.0, 10.0, 5.0).corners();
        assert_eq!(c[0], Vec2::new(0.0, 0.0));
        assert_eq!(c[1], Vec2::new(10.0, 0.0));
        assert_eq!(c[2], Vec2::new(10.0, 5.0));
        assert_eq!(c[3], Vec2::new(0.0, 5.0));
    }

    #[test]
    fn is_empty_zero_size() {
        assert!(Rect::new(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
