//! Coordinate and geometry types shared by the batch container, ribbon mesh and renderers.
//!
//! Canonical CPU space:
//! - Logical pixels (resolution-independent)
//! - Origin top-left
//! - +X right, +Y down
//!
//! World transforms are 2×3 affine matrices; renderers convert to NDC in shaders
//! using a viewport uniform.

mod affine;
mod rect;
mod vec2;
mod viewport;

pub use affine::Affine;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
