//! Batched rendering of many transform-only sprites.
//!
//! Responsibilities:
//! - partition children into fixed-size batches, one [`BufferGroup`] each
//! - track the lowest batch needing static re-derivation ([`DirtyFloor`])
//! - split attributes into static / dynamic streams ([`BatchProperties`])
//! - hand the result to a [`BatchSurface`]: GPU batch renderer or raster fallback
//!
//! Uploading the derived ranges and issuing draw calls is the surface's job.

mod buffer;
mod config;
mod container;
mod dirty;
mod raster;
mod surface;

pub use buffer::{
    quad_indices, BufferGroup, Cadence, GroupGpu, StreamLayout, INDICES_PER_ELEMENT,
    VERTICES_PER_ELEMENT,
};
pub use config::{
    Attribute, BatchConfig, BatchProperties, PropertySelection, DEFAULT_MAX_SIZE, MAX_BATCH_SIZE,
};
pub use container::BatchContainer;
pub use dirty::DirtyFloor;
pub use raster::RasterSurface;
pub use surface::BatchSurface;
