//! Image sources and texture frames.
//!
//! An [`ImageSource`] is the shared, possibly still-loading pixel store. A
//! [`Texture`] is a cheap handle onto a rectangular frame of a source; many
//! textures (and therefore many sprites) can share one source.
//!
//! Everything here is single-threaded (`Rc` + interior mutability): sources are
//! only touched from the frame loop.

mod source;
mod texture;

pub use source::{ImageSource, LoadSubscription};
pub use texture::{Texture, TextureUvs};
