//! Immediate-mode raster backend.
//!
//! [`RasterContext`] is the 2D drawing surface the batch container's raster
//! fallback draws through (the subset of a canvas 2D context it needs).
//! [`Pixmap`] is a software implementation used when no GPU is available and
//! by tests.

mod context;
mod pixmap;

pub use context::{RasterContext, RasterOptions};
pub use pixmap::Pixmap;
