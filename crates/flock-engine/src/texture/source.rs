use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

struct Pixels {
    loaded: bool,
    width: u32,
    height: u32,
    /// Premultiplied RGBA8, row-major, `width * height * 4` bytes.
    rgba: Vec<u8>,
    version: u64,
}

struct LoadListener {
    id: u64,
    callback: Box<dyn FnOnce()>,
}

/// Underlying image shared by textures.
///
/// A source is either loaded (pixels present) or pending. Pending sources
/// report zero size and no UVs; consumers register a one-shot
/// [`once_loaded`](Self::once_loaded) callback to re-synchronize once
/// [`finish_load`](Self::finish_load) is called.
pub struct ImageSource {
    id: u64,
    /// Device pixels per logical unit (2.0 for `@2x` assets).
    resolution: f32,
    pixels: RefCell<Pixels>,
    listeners: RefCell<Vec<LoadListener>>,
    next_listener: Cell<u64>,
}

impl ImageSource {
    fn from_state(pixels: Pixels, resolution: f32) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            resolution: if resolution > 0.0 { resolution } else { 1.0 },
            pixels: RefCell::new(pixels),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        })
    }

    /// Creates a source whose pixels arrive later via [`finish_load`](Self::finish_load).
    pub fn pending(resolution: f32) -> Rc<Self> {
        Self::from_state(
            Pixels { loaded: false, width: 0, height: 0, rgba: Vec::new(), version: 0 },
            resolution,
        )
    }

    /// Creates a loaded source from straight-alpha RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, rgba: Vec<u8>, resolution: f32) -> Result<Rc<Self>> {
        let source = Self::pending(resolution);
        source.finish_load(width, height, rgba)?;
        Ok(source)
    }

    /// Decodes an encoded image (PNG) into a loaded source at resolution 1.
    pub fn from_encoded(bytes: &[u8]) -> Result<Rc<Self>> {
        let img = image::load_from_memory(bytes)
            .context("failed to decode image source")?
            .to_rgba8();
        let (w, h) = img.dimensions();
        Self::from_rgba8(w, h, img.into_raw(), 1.0)
    }

    /// Stores pixels, marks the source loaded and fires every pending load callback once.
    ///
    /// `rgba` is straight-alpha RGBA8; it is premultiplied on the way in.
    /// Can be called again to replace the pixels; the version counter advances
    /// so GPU caches re-upload.
    pub fn finish_load(&self, width: u32, height: u32, mut rgba: Vec<u8>) -> Result<()> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .context("image dimensions overflow")?;
        anyhow::ensure!(
            rgba.len() == expected,
            "pixel buffer is {} bytes, expected {expected} for {width}x{height} RGBA8",
            rgba.len()
        );

        premultiply_rgba8(&mut rgba);

        {
            let mut px = self.pixels.borrow_mut();
            px.loaded = true;
            px.width = width;
            px.height = height;
            px.rgba = rgba;
            px.version = px.version.wrapping_add(1);
        }

        // Listeners are taken out before firing so a callback may subscribe again.
        let fired = std::mem::take(&mut *self.listeners.borrow_mut());
        if !fired.is_empty() {
            log::debug!("image source {} loaded; firing {} callback(s)", self.id, fired.len());
        }
        for listener in fired {
            (listener.callback)();
        }
        Ok(())
    }

    /// Registers `callback` to run once when this source finishes loading.
    ///
    /// If the source is already loaded the callback runs immediately and the
    /// returned subscription is inert. Dropping the subscription before the
    /// load cancels it.
    pub fn once_loaded(self: &Rc<Self>, callback: impl FnOnce() + 'static) -> LoadSubscription {
        if self.is_loaded() {
            callback();
            return LoadSubscription { source: Weak::new(), id: 0 };
        }

        let id = self.next_listener.get();
        self.next_listener.set(id.wrapping_add(1));
        self.listeners.borrow_mut().push(LoadListener { id, callback: Box::new(callback) });

        LoadSubscription { source: Rc::downgrade(self), id }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.pixels.borrow().loaded
    }

    /// Incremented on each load; lets GPU caches detect stale uploads.
    #[inline]
    pub fn version(&self) -> u64 {
        self.pixels.borrow().version
    }

    /// Size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = self.pixels.borrow();
        (px.width, px.height)
    }

    /// Width in logical units.
    pub fn width(&self) -> f32 {
        self.pixels.borrow().width as f32 / self.resolution
    }

    /// Height in logical units.
    pub fn height(&self) -> f32 {
        self.pixels.borrow().height as f32 / self.resolution
    }

    /// Borrows the premultiplied RGBA8 pixels (empty while pending).
    pub fn with_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.pixels.borrow().rgba)
    }

    /// Premultiplied RGBA8 texel at device pixel `(x, y)`; transparent outside.
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        let px = self.pixels.borrow();
        if x < 0 || y < 0 || x >= px.width as i64 || y >= px.height as i64 {
            return [0; 4];
        }
        let i = (y as usize * px.width as usize + x as usize) * 4;
        [px.rgba[i], px.rgba[i + 1], px.rgba[i + 2], px.rgba[i + 3]]
    }

    fn pending_listeners(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn cancel_listener(&self, id: u64) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let px = self.pixels.borrow();
        f.debug_struct("ImageSource")
            .field("id", &self.id)
            .field("loaded", &px.loaded)
            .field("width", &px.width)
            .field("height", &px.height)
            .field("resolution", &self.resolution)
            .field("pending_listeners", &self.pending_listeners())
            .finish()
    }
}

/// Handle for a one-shot load callback registered with [`ImageSource::once_loaded`].
///
/// The callback is removed from the source when it fires, when
/// [`cancel`](Self::cancel) is called, or when this handle is dropped.
#[derive(Debug)]
#[must_use = "dropping the subscription cancels the load callback"]
pub struct LoadSubscription {
    source: Weak<ImageSource>,
    id: u64,
}

impl LoadSubscription {
    /// True while the callback is still registered (not fired, not cancelled).
    pub fn is_pending(&self) -> bool {
        self.source
            .upgrade()
            .is_some_and(|s| s.listeners.borrow().iter().any(|l| l.id == self.id))
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for LoadSubscription {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.cancel_listener(self.id);
        }
    }
}

fn premultiply_rgba8(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter().copied().cycle().take((w * h * 4) as usize).collect()
    }

    #[test]
    fn pending_source_has_zero_size() {
        let s = ImageSource::pending(1.0);
        assert!(!s.is_loaded());
        assert_eq!(s.width(), 0.0);
        assert_eq!(s.height(), 0.0);
    }

    #[test]
    fn finish_load_fires_callback_once_and_drops_it() {
        let s = ImageSource::pending(1.0);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = s.once_loaded(move || h.set(h.get() + 1));
        assert!(sub.is_pending());

        s.finish_load(1, 1, solid(1, 1, [255; 4])).unwrap();
        s.finish_load(1, 1, solid(1, 1, [255; 4])).unwrap();

        assert_eq!(hits.get(), 1);
        assert!(!sub.is_pending());
        assert_eq!(s.pending_listeners(), 0);
    }

    #[test]
    fn dropping_subscription_cancels_callback() {
        let s = ImageSource::pending(1.0);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        drop(s.once_loaded(move || h.set(h.get() + 1)));

        s.finish_load(1, 1, solid(1, 1, [255; 4])).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn once_loaded_on_loaded_source_fires_immediately() {
        let s = ImageSource::from_rgba8(1, 1, solid(1, 1, [255; 4]), 1.0).unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = s.once_loaded(move || h.set(h.get() + 1));
        assert_eq!(hits.get(), 1);
        assert!(!sub.is_pending());
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let s = ImageSource::pending(1.0);
        assert!(s.finish_load(2, 2, vec![0; 4]).is_err());
        assert!(!s.is_loaded());
    }

    #[test]
    fn pixels_are_premultiplied_and_size_is_logical() {
        let s = ImageSource::from_rgba8(4, 2, solid(4, 2, [255, 0, 0, 128]), 2.0).unwrap();
        assert_eq!(s.texel(0, 0), [128, 0, 0, 128]);
        assert_eq!(s.texel(4, 0), [0; 4]);
        assert_eq!(s.width(), 2.0);
        assert_eq!(s.height(), 1.0);
        assert_eq!(s.pixel_size(), (4, 2));
    }
}
