//! Ribbon (rope) mesh generated from a moving point chain.
//!
//! Two vertices per point form a triangle-strip cross-section. UVs, colors
//! and indices are static and rebuilt by `refresh()`; vertices are rebuilt
//! every frame from the current point positions.

mod mesh;

pub use mesh::{PointChain, RibbonMesh};
