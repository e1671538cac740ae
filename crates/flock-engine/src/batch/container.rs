use std::ops::Range;
use std::rc::Rc;

use crate::paint::BlendMode;
use crate::scene::{Node, Sprite};
use crate::texture::{ImageSource, LoadSubscription};

use super::buffer::BufferGroup;
use super::config::{BatchConfig, BatchProperties, PropertySelection};
use super::dirty::DirtyFloor;
use super::surface::BatchSurface;

/// Container that renders many [`Sprite`]s sharing one image source.
///
/// Elements are partitioned into groups of `batch_size`, each backed by a
/// lazily-allocated [`BufferGroup`]. Structural changes lower the dirty floor
/// so the next render re-derives static data for that batch and every later
/// one (a removal shifts every later element's slot).
///
/// All children must reference the same [`ImageSource`]; this is not checked
/// when adding, the first child's source is simply captured on first render.
#[derive(Debug)]
pub struct BatchContainer {
    node: Node,
    pub blend_mode: BlendMode,

    max_size: usize,
    batch_size: usize,
    properties: BatchProperties,

    children: Vec<Sprite>,
    groups: Vec<BufferGroup>,
    dirty_floor: Rc<DirtyFloor>,

    base_image: Option<Rc<ImageSource>>,
    load_subscription: Option<LoadSubscription>,

    warned_over_capacity: bool,
    destroyed: bool,
}

impl Default for BatchContainer {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl BatchContainer {
    pub fn new(config: BatchConfig) -> Self {
        let batch_size = config.effective_batch_size();
        let mut properties = BatchProperties::default();
        properties.merge(config.properties);

        Self {
            node: Node::default(),
            blend_mode: config.blend_mode,
            max_size: config.max_size,
            batch_size,
            properties,
            children: Vec::new(),
            groups: Vec::new(),
            dirty_floor: DirtyFloor::new(),
            base_image: None,
            load_subscription: None,
            warned_over_capacity: false,
            destroyed: false,
        }
    }

    // ── configuration ──────────────────────────────────────────────────────

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Effective elements per buffer group.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn properties(&self) -> BatchProperties {
        self.properties
    }

    /// Overrides the flags present in `selection`; omitted flags are kept.
    ///
    /// Allocated groups are laid out for the old flags, so a change releases
    /// them; they are rebuilt on the next render.
    pub fn set_properties(&mut self, selection: PropertySelection) {
        let before = self.properties;
        self.properties.merge(selection);
        if self.properties != before && !self.groups.is_empty() {
            log::debug!("batch properties changed; releasing {} buffer group(s)", self.groups.len());
            self.release_groups();
            self.dirty_floor.lower_to(0);
        }
    }

    // ── node ───────────────────────────────────────────────────────────────

    #[inline]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[inline]
    pub fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    // ── element list ───────────────────────────────────────────────────────

    #[inline]
    pub fn children(&self) -> &[Sprite] {
        &self.children
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Mutable access without invalidation.
    ///
    /// Dynamic attributes are picked up on the next render anyway; edits to
    /// static attributes need [`on_children_change`](Self::on_children_change).
    #[inline]
    pub fn child_mut(&mut self, index: usize) -> Option<&mut Sprite> {
        self.children.get_mut(index)
    }

    /// Mutable slice without invalidation (see [`child_mut`](Self::child_mut)).
    #[inline]
    pub fn children_mut(&mut self) -> &mut [Sprite] {
        &mut self.children
    }

    /// Appends a sprite and returns its index.
    pub fn add_child(&mut self, sprite: Sprite) -> usize {
        let index = self.children.len();
        self.children.push(sprite);
        self.on_children_change(index);
        index
    }

    /// Inserts at `index` (clamped to the current length) and returns the actual index.
    pub fn add_child_at(&mut self, sprite: Sprite, index: usize) -> usize {
        let index = index.min(self.children.len());
        self.children.insert(index, sprite);
        self.on_children_change(index);
        index
    }

    pub fn remove_child_at(&mut self, index: usize) -> Option<Sprite> {
        if index >= self.children.len() {
            return None;
        }
        let sprite = self.children.remove(index);
        self.on_children_change(index);
        Some(sprite)
    }

    /// Removes the children in `range` (clamped) and returns them in order.
    pub fn remove_children(&mut self, range: Range<usize>) -> Vec<Sprite> {
        let end = range.end.min(self.children.len());
        let start = range.start.min(end);
        if start == end {
            return Vec::new();
        }
        let removed: Vec<Sprite> = self.children.drain(start..end).collect();
        self.on_children_change(start);
        removed
    }

    /// Notifies the container that children at `index` and above changed.
    pub fn on_children_change(&mut self, index: usize) {
        self.dirty_floor.lower_to(index / self.batch_size);
    }

    // ── backend contract ───────────────────────────────────────────────────

    #[inline]
    pub fn dirty_floor(&self) -> usize {
        self.dirty_floor.get()
    }

    #[inline]
    pub fn groups(&self) -> &[BufferGroup] {
        &self.groups
    }

    #[inline]
    pub(crate) fn groups_mut(&mut self) -> &mut [BufferGroup] {
        &mut self.groups
    }

    /// Image source captured from the first child on first render.
    #[inline]
    pub fn base_image(&self) -> Option<&Rc<ImageSource>> {
        self.base_image.as_ref()
    }

    /// True while a deferred image-load callback is registered.
    pub fn is_waiting_for_image(&self) -> bool {
        self.load_subscription.as_ref().is_some_and(|s| s.is_pending())
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of children that are rendered (`max_size` caps the list).
    pub fn rendered_len(&mut self) -> usize {
        let total = self.children.len().min(self.max_size);
        if total < self.children.len() && !self.warned_over_capacity {
            log::warn!(
                "batch container holds {} children but max_size is {}; the rest are not drawn",
                self.children.len(),
                self.max_size
            );
            self.warned_over_capacity = true;
        }
        total
    }

    /// Derives buffer contents for the current frame and returns the number of
    /// populated groups (one per batch, in order).
    ///
    /// Dynamic attributes are rewritten for every batch. Static attributes are
    /// rewritten for newly allocated groups and for every batch at or above
    /// the dirty floor; the floor is then reset past the last batch. Groups
    /// past the last batch are released.
    pub fn prepare_buffers(&mut self) -> usize {
        if self.destroyed {
            return 0;
        }
        let total = self.rendered_len();
        let floor = self.dirty_floor.get();
        let mut batches = 0;

        for (batch, start) in (0..total).step_by(self.batch_size).enumerate() {
            let amount = (total - start).min(self.batch_size);
            let fresh = batch >= self.groups.len();
            if fresh {
                log::debug!("allocating buffer group {batch} ({} elements)", self.batch_size);
                self.groups.push(BufferGroup::new(batch, self.batch_size, &self.properties));
            }

            let sprites = &self.children[start..start + amount];
            let group = &mut self.groups[batch];
            group.upload_dynamic(sprites);
            if fresh || batch >= floor {
                log::trace!("static upload for batch {batch} ({amount} elements)");
                group.upload_static(sprites);
            }
            batches += 1;
        }

        // Batches emptied by removals give their buffers back.
        if self.groups.len() > batches {
            log::debug!("releasing {} stale buffer group(s)", self.groups.len() - batches);
            for group in &mut self.groups[batches..] {
                group.release();
            }
            self.groups.truncate(batches);
        }

        self.dirty_floor.reset_to(batches);
        batches
    }

    // ── rendering ──────────────────────────────────────────────────────────

    /// True when the container is visible, opaque enough, renderable, non-empty and alive.
    pub fn can_render(&self) -> bool {
        !self.destroyed && self.node.should_render() && !self.children.is_empty()
    }

    /// Renders through `surface` (GPU batch renderer or raster fallback).
    ///
    /// On the first render the first child's image source is captured; if it
    /// is still loading, a one-shot callback invalidates batch 0 once it loads.
    pub fn render(&mut self, surface: &mut dyn BatchSurface) {
        if !self.can_render() {
            return;
        }
        if self.base_image.is_none() {
            self.capture_base_image();
        }
        surface.draw_batches(self);
    }

    fn capture_base_image(&mut self) {
        let Some(first) = self.children.first() else { return };
        let source = first.texture().source().clone();

        if !source.is_loaded() {
            log::debug!("image source {} not loaded; deferring batch upload", source.id());
            let floor = Rc::downgrade(&self.dirty_floor);
            self.load_subscription = Some(source.once_loaded(move || {
                if let Some(floor) = floor.upgrade() {
                    floor.lower_to(0);
                }
            }));
        }

        self.base_image = Some(source);
    }

    /// Releases every buffer group and clears state. Idempotent; later renders do nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        log::debug!("destroying batch container ({} buffer group(s))", self.groups.len());
        self.release_groups();
        self.load_subscription = None;
        self.base_image = None;
        self.properties = BatchProperties::NONE;
        self.destroyed = true;
    }

    fn release_groups(&mut self) {
        for group in &mut self.groups {
            group.release();
        }
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Cadence;
    use crate::texture::Texture;

    fn loaded_texture() -> Texture {
        Texture::new(ImageSource::from_rgba8(2, 2, vec![255; 16], 1.0).unwrap())
    }

    fn container(max_size: usize, batch_size: usize, n: usize) -> BatchContainer {
        let mut c = BatchContainer::new(BatchConfig { max_size, batch_size, ..BatchConfig::default() });
        let tex = loaded_texture();
        for _ in 0..n {
            c.add_child(Sprite::new(tex.clone()));
        }
        c
    }

    /// Records calls and runs the derivation step like a real backend.
    #[derive(Default)]
    struct RecordingSurface {
        draws: usize,
        batches: Vec<usize>,
    }

    impl BatchSurface for RecordingSurface {
        fn draw_batches(&mut self, container: &mut BatchContainer) {
            self.draws += 1;
            self.batches.push(container.prepare_buffers());
        }
    }

    #[test]
    fn max_size_clamps_batch_size() {
        let c = container(10, 20, 0);
        assert_eq!(c.batch_size(), 10);
    }

    #[test]
    fn hardware_ceiling_clamps_batch_size() {
        let c = container(100_000, 20_000, 0);
        assert_eq!(c.batch_size(), 16384);
    }

    #[test]
    fn set_properties_keeps_omitted_flags() {
        let mut c = container(100, 10, 0);
        c.set_properties(PropertySelection::new().rotation(true));
        c.set_properties(PropertySelection::new().scale(true));
        let p = c.properties();
        assert!(p.scale && p.position && p.rotation);
        assert!(!p.uvs && !p.alpha);
    }

    #[test]
    fn on_children_change_only_lowers_floor() {
        let mut c = container(100, 10, 30);
        let mut s = RecordingSurface::default();
        c.render(&mut s);
        assert_eq!(c.dirty_floor(), 3);

        c.on_children_change(25);
        assert_eq!(c.dirty_floor(), 2);
        c.on_children_change(29);
        assert_eq!(c.dirty_floor(), 2);
        c.on_children_change(7);
        assert_eq!(c.dirty_floor(), 0);
    }

    #[test]
    fn empty_container_skips_render() {
        let mut c = container(100, 10, 0);
        let mut s = RecordingSurface::default();
        c.render(&mut s);
        assert_eq!(s.draws, 0);
        assert!(c.base_image().is_none());
        assert!(c.groups().is_empty());
    }

    #[test]
    fn invisible_or_transparent_container_skips_render() {
        let mut c = container(100, 10, 3);
        let mut s = RecordingSurface::default();

        c.node_mut().visible = false;
        c.render(&mut s);
        c.node_mut().visible = true;
        c.node_mut().alpha = 0.0;
        c.node_mut().update_as_root();
        c.render(&mut s);

        assert_eq!(s.draws, 0);
    }

    #[test]
    fn unloaded_image_defers_and_load_invalidates_batch_zero() {
        let source = ImageSource::pending(1.0);
        let mut c = BatchContainer::new(BatchConfig { max_size: 100, batch_size: 10, ..BatchConfig::default() });
        for _ in 0..15 {
            c.add_child(Sprite::new(Texture::new(source.clone())));
        }

        let mut s = RecordingSurface::default();
        c.render(&mut s);
        assert!(Rc::ptr_eq(c.base_image().unwrap(), &source));
        assert!(c.is_waiting_for_image());
        assert_eq!(c.dirty_floor(), 2);

        source.finish_load(2, 2, vec![255; 16]).unwrap();
        assert_eq!(c.dirty_floor(), 0);
        assert!(!c.is_waiting_for_image());
    }

    #[test]
    fn groups_are_allocated_per_batch() {
        let mut c = container(100, 10, 25);
        let mut s = RecordingSurface::default();
        c.render(&mut s);

        assert_eq!(s.batches, vec![3]);
        let counts: Vec<usize> = c.groups().iter().map(|g| g.element_count()).collect();
        assert_eq!(counts, vec![10, 10, 5]);
    }

    #[test]
    fn static_reupload_covers_suffix_from_floor() {
        let mut c = container(100, 10, 25);
        let mut s = RecordingSurface::default();
        c.render(&mut s);
        for g in c.groups_mut() {
            g.take_pending(Cadence::Static);
            g.take_pending(Cadence::Dynamic);
        }

        c.remove_child_at(15);
        c.render(&mut s);

        let static_pending: Vec<bool> =
            c.groups().iter().map(|g| g.pending(Cadence::Static).is_some()).collect();
        let dynamic_pending: Vec<bool> =
            c.groups().iter().map(|g| g.pending(Cadence::Dynamic).is_some()).collect();
        assert_eq!(static_pending, vec![false, true, true]);
        assert_eq!(dynamic_pending, vec![true, true, true]);
        assert_eq!(c.groups()[2].element_count(), 4);
    }

    #[test]
    fn shrinking_releases_groups_past_last_batch() {
        let mut c = container(100, 10, 25);
        assert_eq!(c.prepare_buffers(), 3);

        c.remove_children(5..25);
        assert_eq!(c.prepare_buffers(), 1);

        let counts: Vec<usize> = c.groups().iter().map(|g| g.element_count()).collect();
        assert_eq!(counts, vec![5]);
        assert_eq!(c.dirty_floor(), 1);

        // Growing again allocates fresh groups.
        let tex = loaded_texture();
        for _ in 0..10 {
            c.add_child(Sprite::new(tex.clone()));
        }
        assert_eq!(c.prepare_buffers(), 2);
        assert_eq!(c.groups().len(), 2);
        assert_eq!(c.groups()[1].index(), 1);
    }

    #[test]
    fn emptied_container_keeps_no_groups() {
        let mut c = container(100, 10, 12);
        c.prepare_buffers();
        c.remove_children(0..12);
        assert_eq!(c.prepare_buffers(), 0);
        assert!(c.groups().is_empty());
    }

    #[test]
    fn children_past_max_size_are_not_uploaded() {
        let mut c = container(12, 5, 20);
        assert_eq!(c.prepare_buffers(), 3);
        assert_eq!(c.groups()[2].element_count(), 2);
    }

    #[test]
    fn changing_properties_releases_groups() {
        let mut c = container(100, 10, 12);
        c.prepare_buffers();
        assert_eq!(c.groups().len(), 2);

        c.set_properties(PropertySelection::new().alpha(true));
        assert!(c.groups().is_empty());
        assert_eq!(c.dirty_floor(), 0);
    }

    #[test]
    fn destroy_is_idempotent_and_stops_rendering() {
        let mut c = container(100, 10, 12);
        let mut s = RecordingSurface::default();
        c.render(&mut s);

        c.destroy();
        c.destroy();
        assert!(c.groups().is_empty());
        assert_eq!(c.properties(), BatchProperties::NONE);
        assert!(c.base_image().is_none());

        c.render(&mut s);
        assert_eq!(s.draws, 1);
    }

    #[test]
    fn destroy_cancels_pending_load_callback() {
        let source = ImageSource::pending(1.0);
        let mut c = BatchContainer::default();
        c.add_child(Sprite::new(Texture::new(source.clone())));
        c.render(&mut RecordingSurface::default());
        assert!(c.is_waiting_for_image());

        c.destroy();
        assert!(!c.is_waiting_for_image());
        source.finish_load(1, 1, vec![0; 4]).unwrap();
    }

    #[test]
    fn add_child_at_clamps_index() {
        let mut c = container(100, 10, 2);
        assert_eq!(c.add_child_at(Sprite::new(loaded_texture()), 99), 2);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn remove_children_clamps_range() {
        let mut c = container(100, 10, 4);
        assert_eq!(c.remove_children(2..10).len(), 2);
        assert!(c.remove_children(5..8).is_empty());
        assert_eq!(c.len(), 2);
    }
}
