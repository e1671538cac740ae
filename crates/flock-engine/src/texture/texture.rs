use std::fmt;
use std::rc::Rc;

use crate::coords::Rect;

use super::ImageSource;

/// Normalized texture coordinates of a frame's four corners.
///
/// Order: top-left `(x0, y0)`, top-right `(x1, y1)`, bottom-right `(x2, y2)`,
/// bottom-left `(x3, y3)`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct TextureUvs {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub x3: f32,
    pub y3: f32,
}

impl TextureUvs {
    fn from_frame(frame: Rect, width: f32, height: f32) -> Self {
        let l = frame.origin.x / width;
        let t = frame.origin.y / height;
        let r = (frame.origin.x + frame.size.x) / width;
        let b = (frame.origin.y + frame.size.y) / height;
        Self { x0: l, y0: t, x1: r, y1: t, x2: r, y2: b, x3: l, y3: b }
    }

    /// Corners as `[u, v]` pairs in TL, TR, BR, BL order.
    #[inline]
    pub fn corners(&self) -> [[f32; 2]; 4] {
        [[self.x0, self.y0], [self.x1, self.y1], [self.x2, self.y2], [self.x3, self.y3]]
    }
}

/// A frame (sub-rectangle) of a shared [`ImageSource`].
///
/// Cloning is cheap; clones share the source.
#[derive(Clone)]
pub struct Texture {
    source: Rc<ImageSource>,
    /// Frame in logical units; `None` covers the whole source.
    frame: Option<Rect>,
}

impl Texture {
    /// Texture covering the entire source (tracks the size once it loads).
    pub fn new(source: Rc<ImageSource>) -> Self {
        Self { source, frame: None }
    }

    /// Texture covering `frame` (logical units) of `source`.
    pub fn with_frame(source: Rc<ImageSource>, frame: Rect) -> Self {
        Self { source, frame: Some(frame) }
    }

    #[inline]
    pub fn source(&self) -> &Rc<ImageSource> {
        &self.source
    }

    /// True when both textures reference the same underlying source.
    #[inline]
    pub fn shares_source(&self, other: &Texture) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }

    /// Frame in logical units.
    pub fn frame(&self) -> Rect {
        self.frame
            .unwrap_or_else(|| Rect::new(0.0, 0.0, self.source.width(), self.source.height()))
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.frame().width()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.frame().height()
    }

    /// Normalized UV rectangle; `None` until the source is loaded and non-empty.
    pub fn uvs(&self) -> Option<TextureUvs> {
        if !self.source.is_loaded() {
            return None;
        }
        let (w, h) = (self.source.width(), self.source.height());
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        Some(TextureUvs::from_frame(self.frame(), w, h))
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("source", &self.source.id())
            .field("frame", &self.frame)
            .finish()
    }
}
