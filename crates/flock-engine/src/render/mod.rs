//! GPU rendering subsystem.
//!
//! Renderers issue GPU commands via wgpu and own their GPU resources
//! (pipelines, buffers). Image sources are shared through [`TextureCache`].
//!
//! Convention:
//! - CPU geometry is in logical pixels (top-left origin, +Y down).
//! - Vertex shaders apply the node's world transform from a uniform, then
//!   convert to NDC using the viewport.

mod batch;
mod common;
mod ctx;
mod ribbon;
mod textures;

pub use batch::{BatchRenderer, GpuBatchSurface};
pub use ctx::{RenderCtx, RenderTarget};
pub use ribbon::RibbonRenderer;
pub use textures::TextureCache;
