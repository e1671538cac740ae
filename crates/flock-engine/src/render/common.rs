//! GPU types shared by the batch and ribbon renderers.

use bytemuck::{Pod, Zeroable};

use crate::coords::{Affine, Viewport};

/// Per-draw uniform: viewport, world transform and world alpha.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DrawUniform {
    /// Columns of the world `mat3x3`, each padded to 16 bytes.
    pub world: [[f32; 4]; 3],
    pub viewport: [f32; 2],
    pub alpha: f32,
    pub _pad: f32,
}

impl DrawUniform {
    pub(super) fn new(viewport: Viewport, world: &Affine, alpha: f32) -> Self {
        Self {
            world: world.to_mat3_padded(),
            viewport: [viewport.width.max(1.0), viewport.height.max(1.0)],
            alpha,
            _pad: 0.0,
        }
    }
}

pub(super) fn draw_ubo_min_binding_size() -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(std::mem::size_of::<DrawUniform>() as u64)
}

/// Bind group layout for group 0: one `DrawUniform` visible to both stages.
pub(super) fn uniform_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: draw_ubo_min_binding_size(),
            },
            count: None,
        }],
    })
}

/// A uniform buffer with its bind group.
///
/// Several containers can be drawn into one encoder; each draw needs its own
/// slot because `write_buffer` calls land before the encoder executes.
pub(super) struct UniformSlot {
    pub ubo: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

/// Grow-only pool of [`UniformSlot`]s, rewound once per frame.
#[derive(Default)]
pub(super) struct UniformPool {
    slots: Vec<UniformSlot>,
    next: usize,
}

impl UniformPool {
    pub(super) fn rewind(&mut self) {
        self.next = 0;
    }

    /// Writes `uniform` into the next free slot and returns its index.
    pub(super) fn push(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        uniform: &DrawUniform,
    ) -> usize {
        if self.next == self.slots.len() {
            let ubo = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<DrawUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                }],
            });
            self.slots.push(UniformSlot { ubo, bind_group });
        }
        let index = self.next;
        queue.write_buffer(&self.slots[index].ubo, 0, bytemuck::bytes_of(uniform));
        self.next += 1;
        index
    }

    pub(super) fn get(&self, index: usize) -> Option<&UniformSlot> {
        self.slots.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_uniform_is_std140_sized() {
        assert_eq!(std::mem::size_of::<DrawUniform>(), 64);
    }

    #[test]
    fn draw_uniform_clamps_empty_viewport() {
        let u = DrawUniform::new(Viewport::new(0.0, 10.0), &Affine::IDENTITY, 0.5);
        assert_eq!(u.viewport, [1.0, 10.0]);
        assert_eq!(u.world[2], [0.0, 0.0, 1.0, 0.0]);
    }
}
