//! Paint model shared between the batch container, ribbon renderer and raster path.
//!
//! Scope:
//! - color representation (linear premultiplied alpha)
//! - blend modes, resolved either to a `wgpu::BlendState` or a raster compositing rule
//!
//! Geometry types remain in `coords`.

pub mod blend;
pub mod color;

pub use blend::BlendMode;
pub use color::Color;
