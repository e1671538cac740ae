use std::ops::Range;

use crate::scene::Sprite;

use super::config::{Attribute, BatchProperties};

pub const VERTICES_PER_ELEMENT: usize = 4;
pub const INDICES_PER_ELEMENT: usize = 6;

/// Which of a group's two vertex streams an attribute lives in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Cadence {
    /// Rebuilt when the batch is allocated or invalidated.
    Static,
    /// Rebuilt every frame.
    Dynamic,
}

/// Interleaved vertex layout of one stream.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct StreamLayout {
    pub attributes: Vec<Attribute>,
    /// Floats per vertex.
    pub stride: usize,
}

impl StreamLayout {
    /// Attributes of `cadence` in shader-location order.
    pub fn for_cadence(properties: &BatchProperties, cadence: Cadence) -> Self {
        let attributes: Vec<Attribute> = Attribute::ALL
            .into_iter()
            .filter(|&a| properties.is_dynamic(a) == (cadence == Cadence::Dynamic))
            .collect();
        let stride = attributes.iter().map(|a| a.components()).sum();
        Self { attributes, stride }
    }

    /// Float offset of `attr` within a vertex, if this stream carries it.
    pub fn offset_of(&self, attr: Attribute) -> Option<usize> {
        let mut offset = 0;
        for &a in &self.attributes {
            if a == attr {
                return Some(offset);
            }
            offset += a.components();
        }
        None
    }
}

/// GPU side of a buffer group, created by the wgpu batch renderer.
#[derive(Debug)]
pub struct GroupGpu {
    pub(crate) static_vbo: Option<wgpu::Buffer>,
    pub(crate) dynamic_vbo: Option<wgpu::Buffer>,
}

impl GroupGpu {
    #[inline]
    pub(crate) fn buffer(&self, cadence: Cadence) -> Option<&wgpu::Buffer> {
        match cadence {
            Cadence::Static => self.static_vbo.as_ref(),
            Cadence::Dynamic => self.dynamic_vbo.as_ref(),
        }
    }

    fn destroy(&mut self) {
        for buf in [self.static_vbo.take(), self.dynamic_vbo.take()].into_iter().flatten() {
            buf.destroy();
        }
    }
}

/// CPU staging data for one batch of up to `capacity` elements.
///
/// Backends read the pending float ranges and upload them; the container only
/// derives data.
#[derive(Debug)]
pub struct BufferGroup {
    index: usize,
    capacity: usize,
    static_layout: StreamLayout,
    dynamic_layout: StreamLayout,
    static_data: Vec<f32>,
    dynamic_data: Vec<f32>,
    element_count: usize,
    static_pending: Option<Range<usize>>,
    dynamic_pending: Option<Range<usize>>,
    gpu: Option<GroupGpu>,
}

impl BufferGroup {
    pub fn new(index: usize, capacity: usize, properties: &BatchProperties) -> Self {
        let static_layout = StreamLayout::for_cadence(properties, Cadence::Static);
        let dynamic_layout = StreamLayout::for_cadence(properties, Cadence::Dynamic);
        let floats = |l: &StreamLayout| capacity * VERTICES_PER_ELEMENT * l.stride;
        Self {
            index,
            capacity,
            static_data: vec![0.0; floats(&static_layout)],
            dynamic_data: vec![0.0; floats(&dynamic_layout)],
            static_layout,
            dynamic_layout,
            element_count: 0,
            static_pending: None,
            dynamic_pending: None,
            gpu: None,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elements written by the latest upload.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn layout(&self, cadence: Cadence) -> &StreamLayout {
        match cadence {
            Cadence::Static => &self.static_layout,
            Cadence::Dynamic => &self.dynamic_layout,
        }
    }

    pub fn data(&self, cadence: Cadence) -> &[f32] {
        match cadence {
            Cadence::Static => &self.static_data,
            Cadence::Dynamic => &self.dynamic_data,
        }
    }

    /// Float range written since the backend last took it.
    pub fn pending(&self, cadence: Cadence) -> Option<Range<usize>> {
        match cadence {
            Cadence::Static => self.static_pending.clone(),
            Cadence::Dynamic => self.dynamic_pending.clone(),
        }
    }

    /// Hands the pending range to the backend and clears it.
    pub fn take_pending(&mut self, cadence: Cadence) -> Option<Range<usize>> {
        match cadence {
            Cadence::Static => self.static_pending.take(),
            Cadence::Dynamic => self.dynamic_pending.take(),
        }
    }

    /// Derives static attributes for `sprites` (at most `capacity`).
    pub fn upload_static(&mut self, sprites: &[Sprite]) {
        let range = write_stream(&self.static_layout, &mut self.static_data, sprites, self.capacity);
        self.element_count = sprites.len().min(self.capacity);
        self.static_pending = range;
    }

    /// Derives dynamic attributes for `sprites` (at most `capacity`).
    pub fn upload_dynamic(&mut self, sprites: &[Sprite]) {
        let range = write_stream(&self.dynamic_layout, &mut self.dynamic_data, sprites, self.capacity);
        self.element_count = sprites.len().min(self.capacity);
        self.dynamic_pending = range;
    }

    #[inline]
    pub fn gpu(&self) -> Option<&GroupGpu> {
        self.gpu.as_ref()
    }

    pub(crate) fn attach_gpu(&mut self, gpu: GroupGpu) {
        self.release();
        self.gpu = Some(gpu);
        // Fresh GPU buffers hold nothing; resend everything derived so far.
        let n = self.element_count * VERTICES_PER_ELEMENT;
        self.static_pending = Some(0..n * self.static_layout.stride);
        self.dynamic_pending = Some(0..n * self.dynamic_layout.stride);
    }

    /// Destroys GPU buffers, if any. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut gpu) = self.gpu.take() {
            gpu.destroy();
        }
    }
}

/// Writes every attribute of `layout` for each sprite; returns the touched float range.
fn write_stream(
    layout: &StreamLayout,
    dst: &mut [f32],
    sprites: &[Sprite],
    capacity: usize,
) -> Option<Range<usize>> {
    if layout.stride == 0 {
        return None;
    }
    let sprites = &sprites[..sprites.len().min(capacity)];
    let stride = layout.stride;

    for (e, sprite) in sprites.iter().enumerate() {
        let base = e * VERTICES_PER_ELEMENT * stride;
        let mut offset = 0;
        for &attr in &layout.attributes {
            let n = attr.components();
            let values = vertex_values(attr, sprite);
            for (v, value) in values.iter().enumerate() {
                let at = base + v * stride + offset;
                dst[at..at + n].copy_from_slice(&value[..n]);
            }
            offset += n;
        }
    }

    Some(0..sprites.len() * VERTICES_PER_ELEMENT * stride)
}

/// Per-vertex values of one attribute, TL/TR/BR/BL. Single-float attributes use `[v, 0]`.
fn vertex_values(attr: Attribute, sprite: &Sprite) -> [[f32; 2]; VERTICES_PER_ELEMENT] {
    match attr {
        Attribute::Scale => {
            let frame = sprite.texture().frame();
            let (w, h) = (frame.width(), frame.height());
            let (ax, ay) = (sprite.anchor.x, sprite.anchor.y);
            let (sx, sy) = (sprite.scale.x, sprite.scale.y);
            let w0 = w * (1.0 - ax) * sx;
            let w1 = -w * ax * sx;
            let h0 = h * (1.0 - ay) * sy;
            let h1 = -h * ay * sy;
            [[w1, h1], [w0, h1], [w0, h0], [w1, h0]]
        }
        Attribute::Position => [[sprite.position.x, sprite.position.y]; VERTICES_PER_ELEMENT],
        Attribute::Rotation => [[sprite.rotation, 0.0]; VERTICES_PER_ELEMENT],
        Attribute::Uvs => sprite
            .texture()
            .uvs()
            .map(|uvs| uvs.corners())
            .unwrap_or([[0.0; 2]; VERTICES_PER_ELEMENT]),
        Attribute::Alpha => {
            let alpha = if sprite.visible { sprite.alpha } else { 0.0 };
            [[alpha, 0.0]; VERTICES_PER_ELEMENT]
        }
    }
}

/// Quad indices for `elements` elements: `0 1 2  0 2 3` per element.
pub fn quad_indices(elements: usize) -> Vec<u16> {
    let mut out = Vec::with_capacity(elements * INDICES_PER_ELEMENT);
    for e in 0..elements {
        let v = (e * VERTICES_PER_ELEMENT) as u16;
        out.extend_from_slice(&[v, v + 1, v + 2, v, v + 2, v + 3]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::texture::{ImageSource, Texture};

    fn sprite(w: u32, h: u32) -> Sprite {
        let src = ImageSource::from_rgba8(w, h, vec![255; (w * h * 4) as usize], 1.0).unwrap();
        Sprite::new(Texture::new(src))
    }

    #[test]
    fn default_properties_split_streams() {
        let g = BufferGroup::new(0, 4, &BatchProperties::default());
        assert_eq!(g.layout(Cadence::Dynamic).attributes, vec![Attribute::Position]);
        assert_eq!(g.layout(Cadence::Dynamic).stride, 2);
        assert_eq!(g.layout(Cadence::Static).stride, 6);
        assert_eq!(g.layout(Cadence::Static).offset_of(Attribute::Uvs), Some(3));
        assert_eq!(g.data(Cadence::Static).len(), 4 * 4 * 6);
    }

    #[test]
    fn scale_stream_holds_anchored_corner_offsets() {
        let mut s = sprite(10, 20);
        s.anchor = Vec2::splat(0.5);
        s.scale = Vec2::splat(2.0);

        let mut g = BufferGroup::new(0, 1, &BatchProperties::default());
        g.upload_static(std::slice::from_ref(&s));

        let data = g.data(Cadence::Static);
        let corners: Vec<[f32; 2]> = (0..4).map(|v| [data[v * 6], data[v * 6 + 1]]).collect();
        assert_eq!(corners, vec![[-10.0, -20.0], [10.0, -20.0], [10.0, 20.0], [-10.0, 20.0]]);
    }

    #[test]
    fn dynamic_upload_marks_only_written_range() {
        let sprites: Vec<Sprite> = (0..3).map(|i| sprite(2, 2).at(Vec2::new(i as f32, 7.0))).collect();
        let mut g = BufferGroup::new(0, 8, &BatchProperties::default());
        g.upload_dynamic(&sprites);

        assert_eq!(g.element_count(), 3);
        assert_eq!(g.take_pending(Cadence::Dynamic), Some(0..3 * 4 * 2));
        assert_eq!(g.take_pending(Cadence::Dynamic), None);
        assert_eq!(&g.data(Cadence::Dynamic)[16..18], &[2.0, 7.0]);
        assert!(g.pending(Cadence::Static).is_none());
    }

    #[test]
    fn hidden_sprite_writes_zero_alpha() {
        let mut s = sprite(1, 1);
        s.visible = false;
        let mut g = BufferGroup::new(0, 1, &BatchProperties::default());
        g.upload_static(std::slice::from_ref(&s));
        let alpha_at = g.layout(Cadence::Static).offset_of(Attribute::Alpha).unwrap();
        assert_eq!(g.data(Cadence::Static)[alpha_at], 0.0);
    }

    #[test]
    fn upload_ignores_sprites_past_capacity() {
        let sprites: Vec<Sprite> = (0..5).map(|_| sprite(1, 1)).collect();
        let mut g = BufferGroup::new(0, 2, &BatchProperties::default());
        g.upload_dynamic(&sprites);
        assert_eq!(g.element_count(), 2);
    }

    #[test]
    fn quad_indices_offset_by_four() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }
}
