use std::cell::Cell;
use std::rc::Rc;

/// Lowest batch index whose static data must be re-derived on the next render.
///
/// Shared (`Rc`) so a deferred image-load callback can lower it without
/// holding the container.
#[derive(Debug, Default)]
pub struct DirtyFloor(Cell<usize>);

impl DirtyFloor {
    /// Starts at 0: nothing has been uploaded yet.
    pub fn new() -> Rc<Self> {
        Rc::new(Self(Cell::new(0)))
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0.get()
    }

    /// Lowers the floor to `batch`; never raises it.
    #[inline]
    pub fn lower_to(&self, batch: usize) {
        if batch < self.0.get() {
            self.0.set(batch);
        }
    }

    /// Sets the floor after an upload pass.
    #[inline]
    pub(crate) fn reset_to(&self, batch: usize) {
        self.0.set(batch);
    }
}
