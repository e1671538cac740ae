use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coords::{Affine, Vec2};
use crate::paint::BlendMode;
use crate::scene::Node;
use crate::texture::{LoadSubscription, Texture};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Caller-owned point sequence. The mesh only reads it.
pub type PointChain = Rc<RefCell<Vec<Vec2>>>;

/// Triangle-strip ribbon following a [`PointChain`].
///
/// Buffer sizes follow the point count `N`:
/// - `vertices`: 4N floats (two `(x, y)` per point), rebuilt every frame
/// - `uvs`: 4N floats, rebuilt by [`refresh`](Self::refresh)
/// - `colors`: 2N floats, always 1.0
/// - `indices`: 2N, `0..2N` in order
///
/// Moving points is picked up automatically; adding or removing points needs
/// an explicit `refresh()`.
///
/// When the texture is still loading, the load callback only flags a
/// refresh. `uvs()`, `colors()`, `indices()` and the dirty counters stay
/// stale until the next [`update_transform`](Self::update_transform) or
/// [`apply_pending_refresh`](Self::apply_pending_refresh).
#[derive(Debug)]
pub struct RibbonMesh {
    id: u64,
    node: Node,
    pub blend_mode: BlendMode,

    texture: Texture,
    points: PointChain,

    vertices: Vec<f32>,
    uvs: Vec<f32>,
    colors: Vec<f32>,
    indices: Vec<u32>,

    /// Bumped whenever uvs/colors change.
    dirty: u64,
    /// Bumped whenever indices change.
    index_dirty: u64,

    /// Set by the texture's load callback; consumed on the next update.
    pending_refresh: Rc<Cell<bool>>,
    load_subscription: Option<LoadSubscription>,

    taper: bool,
}

impl RibbonMesh {
    pub fn new(texture: Texture, points: PointChain) -> Self {
        let n = points.borrow().len();
        let mut mesh = Self {
            id: NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed),
            node: Node::default(),
            blend_mode: BlendMode::Normal,
            texture,
            points,
            vertices: vec![0.0; n * 4],
            uvs: vec![0.0; n * 4],
            colors: vec![0.0; n * 2],
            indices: vec![0; n * 2],
            dirty: 0,
            index_dirty: 0,
            pending_refresh: Rc::new(Cell::new(false)),
            load_subscription: None,
            taper: false,
        };
        mesh.watch_texture();
        mesh.refresh();
        mesh
    }

    // ── accessors ──────────────────────────────────────────────────────────

    /// Process-unique id; renderers key their GPU buffers by it.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[inline]
    pub fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    #[inline]
    pub fn points(&self) -> &PointChain {
        &self.points
    }

    #[inline]
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    #[inline]
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    #[inline]
    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    #[inline]
    pub fn index_dirty(&self) -> u64 {
        self.index_dirty
    }

    /// Number of points the buffers are currently sized for.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// True while a load callback for the current texture is registered.
    pub fn is_waiting_for_texture(&self) -> bool {
        self.load_subscription.as_ref().is_some_and(|s| s.is_pending())
    }

    /// True when the texture finished loading and static data has not been rebuilt yet.
    #[inline]
    pub fn needs_refresh(&self) -> bool {
        self.pending_refresh.get()
    }

    pub fn can_render(&self) -> bool {
        self.node.should_render() && !self.indices.is_empty()
    }

    // ── mutation ───────────────────────────────────────────────────────────

    /// Replaces the texture and rebuilds static data.
    pub fn set_texture(&mut self, texture: Texture) {
        self.texture = texture;
        self.watch_texture();
        self.refresh();
    }

    /// Swaps in a different point chain and rebuilds static data.
    pub fn set_points(&mut self, points: PointChain) {
        self.points = points;
        self.refresh();
    }

    /// Narrows the ribbon to zero over the last tenth of its length.
    ///
    /// Off by default.
    pub fn set_taper(&mut self, taper: bool) {
        self.taper = taper;
    }

    #[inline]
    pub fn taper(&self) -> bool {
        self.taper
    }

    /// Resizes buffers to the current point count and rebuilds uvs, colors and indices.
    ///
    /// Buffers are resized even when the texture is not ready; their contents
    /// are only written once the texture has a resolved UV rectangle.
    pub fn refresh(&mut self) {
        let n = self.points.borrow().len();
        self.resize(n);
        if n < 1 {
            return;
        }
        let Some(tex_uvs) = self.texture.uvs() else {
            log::trace!("ribbon refresh deferred: texture not ready");
            return;
        };

        let offset = Vec2::new(tex_uvs.x0, tex_uvs.y0);
        let factor = Vec2::new(tex_uvs.x2 - tex_uvs.x0, tex_uvs.y2 - tex_uvs.y0);
        let last = (n - 1).max(1) as f32;

        for i in 0..n {
            let u = (i as f32 / last) * factor.x + offset.x;
            let at = i * 4;
            self.uvs[at] = u;
            self.uvs[at + 1] = offset.y;
            self.uvs[at + 2] = u;
            self.uvs[at + 3] = factor.y + offset.y;

            self.colors[i * 2] = 1.0;
            self.colors[i * 2 + 1] = 1.0;

            self.indices[i * 2] = (i * 2) as u32;
            self.indices[i * 2 + 1] = (i * 2 + 1) as u32;
        }

        self.dirty = self.dirty.wrapping_add(1);
        self.index_dirty = self.index_dirty.wrapping_add(1);
    }

    /// Runs the refresh flagged by a texture load, if any. Returns whether it ran.
    pub fn apply_pending_refresh(&mut self) -> bool {
        let pending = self.pending_refresh.replace(false);
        if pending {
            self.refresh();
        }
        pending
    }

    /// Per-frame update: applies a deferred refresh, rebuilds vertices from
    /// the points, then composes the world transform.
    pub fn update_transform(&mut self, parent_world: &Affine, parent_alpha: f32) {
        self.apply_pending_refresh();
        self.derive_vertices();
        self.node.update_transform(parent_world, parent_alpha);
    }

    fn derive_vertices(&mut self) {
        let points = self.points.borrow();
        let total = points.len();
        // Points appended since the last refresh have no slots yet.
        let count = total.min(self.vertices.len() / 4);
        if count < 1 {
            return;
        }

        let half_width = self.texture.height() / 2.0;
        let span = (total - 1).max(1) as f32;
        let mut last = points[0];

        for i in 0..count {
            let point = points[i];
            let next = if i + 1 < total { points[i + 1] } else { point };

            let mut width = half_width;
            if self.taper {
                width *= ((1.0 - i as f32 / span) * 10.0).min(1.0);
            }

            // Coincident neighbours give a zero tangent: the cross-section collapses onto the point.
            let perp = (next - last).perp();
            let perp = perp / perp.length().max(f32::EPSILON) * width;

            let at = i * 4;
            let a = point + perp;
            let b = point - perp;
            self.vertices[at] = a.x;
            self.vertices[at + 1] = a.y;
            self.vertices[at + 2] = b.x;
            self.vertices[at + 3] = b.y;

            last = point;
        }
    }

    fn resize(&mut self, n: usize) {
        if self.vertices.len() == n * 4 {
            return;
        }
        log::debug!("ribbon resized to {n} point(s)");
        self.vertices.resize(n * 4, 0.0);
        self.uvs.resize(n * 4, 0.0);
        self.colors.resize(n * 2, 0.0);
        self.indices.resize(n * 2, 0);
        self.dirty = self.dirty.wrapping_add(1);
        self.index_dirty = self.index_dirty.wrapping_add(1);
    }

    fn watch_texture(&mut self) {
        self.load_subscription = None;
        let source = self.texture.source();
        if source.is_loaded() {
            return;
        }
        let flag = Rc::downgrade(&self.pending_refresh);
        self.load_subscription = Some(source.once_loaded(move || {
            if let Some(flag) = flag.upgrade() {
                flag.set(true);
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rect;
    use crate::texture::ImageSource;
    use approx::assert_abs_diff_eq;

    fn texture(w: u32, h: u32) -> Texture {
        Texture::new(ImageSource::from_rgba8(w, h, vec![255; (w * h * 4) as usize], 1.0).unwrap())
    }

    fn chain(points: &[(f32, f32)]) -> PointChain {
        Rc::new(RefCell::new(points.iter().map(|&(x, y)| Vec2::new(x, y)).collect()))
    }

    fn updated(mut mesh: RibbonMesh) -> RibbonMesh {
        mesh.update_transform(&Affine::IDENTITY, 1.0);
        mesh
    }

    #[test]
    fn refresh_sizes_and_fills_static_buffers() {
        let source = ImageSource::from_rgba8(8, 4, vec![255; 128], 1.0).unwrap();
        let tex = Texture::with_frame(source, Rect::new(2.0, 1.0, 4.0, 2.0));
        let mesh = RibbonMesh::new(tex, chain(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]));

        // offset (0.25, 0.25), scale (0.5, 0.5)
        assert_eq!(mesh.uvs().len(), 16);
        assert_eq!(mesh.colors().len(), 8);
        assert_eq!(mesh.indices().len(), 8);
        assert_eq!(mesh.uvs()[0], 0.25);
        assert_eq!(mesh.uvs()[1], 0.25);
        assert_eq!(mesh.uvs()[3], 0.75);
        assert_eq!(mesh.uvs()[12], 0.75);
        assert_eq!(mesh.uvs()[14], 0.75);
        assert!(mesh.colors().iter().all(|&c| c == 1.0));
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(mesh.dirty(), mesh.index_dirty());
        assert!(mesh.dirty() > 0);
    }

    #[test]
    fn collinear_chain_offsets_by_half_height() {
        let mesh = updated(RibbonMesh::new(texture(4, 20), chain(&[(0.0, 0.0), (50.0, 0.0), (100.0, 0.0)])));
        let v = mesh.vertices();
        assert_eq!(v.len(), 12);
        assert_abs_diff_eq!(v[4], 50.0, epsilon = 1e-4);
        assert_abs_diff_eq!(v[5], -10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(v[6], 50.0, epsilon = 1e-4);
        assert_abs_diff_eq!(v[7], 10.0, epsilon = 1e-4);
    }

    #[test]
    fn horizontal_chain_has_vertical_perpendiculars() {
        let pts: Vec<(f32, f32)> = (0..6).map(|i| (i as f32 * 7.0, 3.0)).collect();
        let mesh = updated(RibbonMesh::new(texture(2, 8), chain(&pts)));
        for i in 0..5 {
            let v = &mesh.vertices()[i * 4..i * 4 + 4];
            assert_abs_diff_eq!(v[0], pts[i].0, epsilon = 1e-4);
            assert_abs_diff_eq!(v[1], 3.0 - 4.0, epsilon = 1e-4);
            assert_abs_diff_eq!(v[3], 3.0 + 4.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn tail_uses_previous_point_for_tangent() {
        let mesh = updated(RibbonMesh::new(texture(2, 2), chain(&[(0.0, 0.0), (0.0, 10.0)])));
        // Tangent (0, 10) → perp (10, 0) → unit × 1.
        assert_eq!(&mesh.vertices()[4..8], &[1.0, 10.0, -1.0, 10.0]);
    }

    #[test]
    fn empty_chain_has_empty_buffers() {
        let mut mesh = RibbonMesh::new(texture(2, 2), chain(&[]));
        mesh.update_transform(&Affine::IDENTITY, 1.0);
        assert!(mesh.vertices().is_empty());
        assert!(mesh.uvs().is_empty());
        assert!(mesh.indices().is_empty());
        assert!(!mesh.can_render());
    }

    #[test]
    fn single_point_collapses_without_nan() {
        let mesh = updated(RibbonMesh::new(texture(2, 2), chain(&[(5.0, 5.0)])));
        assert_eq!(mesh.vertices(), &[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(mesh.uvs()[0], 0.0);
    }

    #[test]
    fn coincident_points_stay_finite() {
        let mesh = updated(RibbonMesh::new(texture(2, 2), chain(&[(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)])));
        assert!(mesh.vertices().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn moved_points_are_picked_up_each_frame() {
        let pts = chain(&[(0.0, 0.0), (10.0, 0.0)]);
        let mut mesh = updated(RibbonMesh::new(texture(2, 2), pts.clone()));
        pts.borrow_mut()[0] = Vec2::new(0.0, 100.0);
        mesh.update_transform(&Affine::IDENTITY, 1.0);
        // Tangent (10, -100) → perp (-100, -10), unit length.
        let len = 100.0f32.hypot(10.0);
        assert_abs_diff_eq!(mesh.vertices()[0], -100.0 / len, epsilon = 1e-4);
        assert_abs_diff_eq!(mesh.vertices()[1], 100.0 - 10.0 / len, epsilon = 1e-4);
    }

    #[test]
    fn appended_points_wait_for_refresh() {
        let pts = chain(&[(0.0, 0.0), (10.0, 0.0)]);
        let mut mesh = updated(RibbonMesh::new(texture(2, 2), pts.clone()));
        pts.borrow_mut().push(Vec2::new(20.0, 0.0));

        mesh.update_transform(&Affine::IDENTITY, 1.0);
        assert_eq!(mesh.point_count(), 2);

        mesh.refresh();
        mesh.update_transform(&Affine::IDENTITY, 1.0);
        assert_eq!(mesh.point_count(), 3);
        assert_eq!(mesh.indices().len(), 6);
        assert_eq!(mesh.vertices()[8], 20.0);
    }

    #[test]
    fn pending_texture_refreshes_after_load() {
        let source = ImageSource::pending(1.0);
        let mut mesh = RibbonMesh::new(Texture::new(source.clone()), chain(&[(0.0, 0.0), (10.0, 0.0)]));
        assert!(mesh.is_waiting_for_texture());
        assert!(mesh.uvs().iter().all(|&u| u == 0.0));
        let before = mesh.dirty();

        source.finish_load(2, 6, vec![255; 48]).unwrap();
        assert!(!mesh.is_waiting_for_texture());
        mesh.update_transform(&Affine::IDENTITY, 1.0);

        assert!(mesh.dirty() > before);
        assert_eq!(mesh.uvs()[3], 1.0);
        assert_abs_diff_eq!(mesh.vertices()[1], -3.0, epsilon = 1e-4);
    }

    #[test]
    fn load_flags_refresh_until_applied() {
        let source = ImageSource::pending(1.0);
        let mut mesh = RibbonMesh::new(Texture::new(source.clone()), chain(&[(0.0, 0.0), (10.0, 0.0)]));
        assert!(!mesh.needs_refresh());
        let before = mesh.dirty();

        source.finish_load(2, 6, vec![255; 48]).unwrap();
        assert!(mesh.needs_refresh());
        assert_eq!(mesh.dirty(), before);
        assert!(mesh.uvs().iter().all(|&u| u == 0.0));

        assert!(mesh.apply_pending_refresh());
        assert!(!mesh.needs_refresh());
        assert!(mesh.dirty() > before);
        assert_eq!(mesh.uvs()[3], 1.0);
        assert_eq!(mesh.colors(), &[1.0; 4]);
        assert!(!mesh.apply_pending_refresh());
    }

    #[test]
    fn taper_is_off_by_default_and_narrows_tail_when_on() {
        let pts = chain(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let mut mesh = updated(RibbonMesh::new(texture(2, 2), pts));
        assert_abs_diff_eq!(mesh.vertices()[9], -1.0, epsilon = 1e-4);

        mesh.set_taper(true);
        mesh.update_transform(&Affine::IDENTITY, 1.0);
        assert_abs_diff_eq!(mesh.vertices()[9], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(mesh.vertices()[5], -1.0, epsilon = 1e-4);
    }

    #[test]
    fn world_transform_follows_parent() {
        let mut mesh = RibbonMesh::new(texture(2, 2), chain(&[(0.0, 0.0)]));
        mesh.node_mut().transform.position = Vec2::new(4.0, 0.0);
        mesh.update_transform(&Affine::translation(1.0, 2.0), 0.5);
        assert_eq!(mesh.node().world_transform().apply(Vec2::zero()), Vec2::new(5.0, 2.0));
        assert_eq!(mesh.node().world_alpha(), 0.5);
    }
}
