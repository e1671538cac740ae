//! Minimal scene-graph pieces the batch container and ribbon mesh sit on.
//!
//! Responsibilities:
//! - local transforms (position / rotation / scale / pivot) → affine matrices
//! - world transform + world alpha composition from a parent
//! - the lightweight [`Sprite`] element batched by `batch::BatchContainer`

mod node;
mod sprite;
mod transform;

pub use node::Node;
pub use sprite::Sprite;
pub use transform::Transform;
