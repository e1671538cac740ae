//! Flock engine crate.
//!
//! Batched sprite containers and ribbon meshes on top of a small wgpu/winit
//! runtime, with a software raster fallback.

pub mod device;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod paint;
pub mod texture;
pub mod scene;
pub mod raster;
pub mod batch;
pub mod ribbon;
pub mod render;
