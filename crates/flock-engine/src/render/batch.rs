use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::batch::{
    quad_indices, BatchContainer, BatchProperties, BatchSurface, BufferGroup, Cadence, GroupGpu,
    StreamLayout, INDICES_PER_ELEMENT, VERTICES_PER_ELEMENT,
};
use crate::paint::BlendMode;
use crate::render::{RenderCtx, RenderTarget, TextureCache};

use super::common::{uniform_bind_group_layout, DrawUniform, UniformPool};

const FLOAT_BYTES: u64 = std::mem::size_of::<f32>() as u64;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    format: wgpu::TextureFormat,
    blend: BlendMode,
    properties: BatchProperties,
}

/// wgpu backend for [`BatchContainer`].
///
/// Each buffer group gets up to two vertex buffers (static and dynamic
/// streams) holding interleaved attributes. All groups share one 16-bit quad
/// index buffer. Pipelines are cached per surface format, blend mode and
/// attribute split.
///
/// Call [`begin_frame`](Self::begin_frame) once per frame before drawing.
#[derive(Default)]
pub struct BatchRenderer {
    shader: Option<wgpu::ShaderModule>,
    uniform_layout: Option<wgpu::BindGroupLayout>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniforms: UniformPool,

    quad_ibo: Option<wgpu::Buffer>,
    quad_ibo_elements: usize,
}

impl BatchRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recycles per-draw uniform slots.
    pub fn begin_frame(&mut self) {
        self.uniforms.rewind();
    }

    /// Uploads what changed in `container` and draws every populated group.
    pub fn draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        textures: &mut TextureCache,
        container: &mut BatchContainer,
    ) {
        let batches = container.prepare_buffers();
        if batches == 0 {
            return;
        }
        let Some(source) = container.base_image().cloned() else { return };
        if !textures.prepare(ctx.device, ctx.queue, &source) {
            log::trace!("image source {} pending; batch draw skipped", source.id());
            return;
        }

        let key = PipelineKey {
            format: ctx.surface_format,
            blend: container.blend_mode,
            properties: container.properties(),
        };
        self.ensure_pipeline(ctx, textures, key);
        self.ensure_quad_indices(ctx, container.batch_size());

        for group in &mut container.groups_mut()[..batches] {
            sync_group(ctx, group);
        }

        let Some(uniform_layout) = self.uniform_layout.as_ref() else { return };
        let uniform = DrawUniform::new(
            ctx.viewport,
            container.node().world_transform(),
            container.node().world_alpha(),
        );
        let slot = self
            .uniforms
            .push(ctx.device, ctx.queue, uniform_layout, "flock batch ubo", &uniform);

        let Some(pipeline) = self.pipelines.get(&key) else { return };
        let Some(uniforms) = self.uniforms.get(slot) else { return };
        let Some(texture_bind_group) = textures.bind_group(&source) else { return };
        let Some(quad_ibo) = self.quad_ibo.as_ref() else { return };

        let mut rpass = target.load_pass("flock batch pass");
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &uniforms.bind_group, &[]);
        rpass.set_bind_group(1, texture_bind_group, &[]);
        rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);

        for group in &container.groups()[..batches] {
            let count = group.element_count();
            if count == 0 {
                continue;
            }
            let Some(gpu) = group.gpu() else { continue };

            let buffers = [gpu.buffer(Cadence::Static), gpu.buffer(Cadence::Dynamic)];
            for (slot, buf) in buffers.into_iter().flatten().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buf.slice(..));
            }
            rpass.draw_indexed(0..(count * INDICES_PER_ELEMENT) as u32, 0, 0..1);
        }
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, textures: &mut TextureCache, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        log::debug!("building batch pipeline for {:?}", key.properties);

        let shader = self.shader.get_or_insert_with(|| {
            ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("flock batch shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/batch.wgsl").into()),
            })
        });
        let uniform_layout = self
            .uniform_layout
            .get_or_insert_with(|| uniform_bind_group_layout(ctx.device, "flock batch ubo bgl"));
        let texture_layout = textures.bind_group_layout(ctx.device);

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("flock batch pipeline layout"),
            bind_group_layouts: &[uniform_layout, texture_layout],
            immediate_size: 0,
        });

        // Streams without attributes get no vertex buffer slot.
        let streams: Vec<(StreamLayout, Vec<wgpu::VertexAttribute>)> = [Cadence::Static, Cadence::Dynamic]
            .into_iter()
            .map(|c| StreamLayout::for_cadence(&key.properties, c))
            .filter(|l| l.stride > 0)
            .map(|l| {
                let attrs = vertex_attributes(&l);
                (l, attrs)
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = streams
            .iter()
            .map(|(layout, attrs)| wgpu::VertexBufferLayout {
                array_stride: layout.stride as u64 * FLOAT_BYTES,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("flock batch pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: Some(key.blend.blend_state()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(key, pipeline);
    }

    fn ensure_quad_indices(&mut self, ctx: &RenderCtx<'_>, elements: usize) {
        if self.quad_ibo.is_some() && self.quad_ibo_elements >= elements {
            return;
        }
        if let Some(old) = self.quad_ibo.take() {
            old.destroy();
        }
        self.quad_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("flock batch quad ibo"),
            contents: bytemuck::cast_slice(&quad_indices(elements)),
            usage: wgpu::BufferUsages::INDEX,
        }));
        self.quad_ibo_elements = elements;
    }
}

/// Creates GPU buffers for a new group and writes its pending float ranges.
fn sync_group(ctx: &RenderCtx<'_>, group: &mut BufferGroup) {
    if group.gpu().is_none() {
        let vertex_buffer = |cadence: Cadence, label: &str| {
            let stride = group.layout(cadence).stride;
            (stride > 0).then(|| {
                ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: (group.capacity() * VERTICES_PER_ELEMENT * stride) as u64 * FLOAT_BYTES,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
        };
        let gpu = GroupGpu {
            static_vbo: vertex_buffer(Cadence::Static, "flock batch static vbo"),
            dynamic_vbo: vertex_buffer(Cadence::Dynamic, "flock batch dynamic vbo"),
        };
        group.attach_gpu(gpu);
    }

    for cadence in [Cadence::Static, Cadence::Dynamic] {
        let Some(range) = group.take_pending(cadence) else { continue };
        if range.is_empty() {
            continue;
        }
        let Some(buf) = group.gpu().and_then(|g| g.buffer(cadence)) else { continue };
        log::trace!("group {} {:?} upload: floats {:?}", group.index(), cadence, range);
        ctx.queue.write_buffer(
            buf,
            range.start as u64 * FLOAT_BYTES,
            bytemuck::cast_slice(&group.data(cadence)[range]),
        );
    }
}

fn vertex_attributes(layout: &StreamLayout) -> Vec<wgpu::VertexAttribute> {
    let mut offset = 0;
    layout
        .attributes
        .iter()
        .map(|&attr| {
            let format = match attr.components() {
                1 => wgpu::VertexFormat::Float32,
                _ => wgpu::VertexFormat::Float32x2,
            };
            let out = wgpu::VertexAttribute {
                format,
                offset: offset as u64 * FLOAT_BYTES,
                shader_location: attr.shader_location(),
            };
            offset += attr.components();
            out
        })
        .collect()
}

/// [`BatchSurface`] that draws through a [`BatchRenderer`] into a wgpu target.
pub struct GpuBatchSurface<'s, 't> {
    renderer: &'s mut BatchRenderer,
    textures: &'s mut TextureCache,
    ctx: &'s RenderCtx<'s>,
    target: &'s mut RenderTarget<'t>,
}

impl<'s, 't> GpuBatchSurface<'s, 't> {
    pub fn new(
        renderer: &'s mut BatchRenderer,
        textures: &'s mut TextureCache,
        ctx: &'s RenderCtx<'s>,
        target: &'s mut RenderTarget<'t>,
    ) -> Self {
        Self {
            renderer,
            textures,
            ctx,
            target,
        }
    }
}

impl BatchSurface for GpuBatchSurface<'_, '_> {
    fn draw_batches(&mut self, container: &mut BatchContainer) {
        self.renderer.draw(self.ctx, self.target, self.textures, container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Attribute;

    #[test]
    fn default_split_puts_position_in_dynamic_stream() {
        let props = BatchProperties::default();
        let dynamic = vertex_attributes(&StreamLayout::for_cadence(&props, Cadence::Dynamic));
        assert_eq!(dynamic.len(), 1);
        assert_eq!(dynamic[0].shader_location, Attribute::Position.shader_location());
        assert_eq!(dynamic[0].offset, 0);
    }

    #[test]
    fn static_attributes_are_packed_in_location_order() {
        let props = BatchProperties::default();
        let attrs = vertex_attributes(&StreamLayout::for_cadence(&props, Cadence::Static));
        // scale(2) rotation(1) uvs(2) alpha(1)
        let offsets: Vec<u64> = attrs.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 12, 20]);
        assert_eq!(attrs[1].format, wgpu::VertexFormat::Float32);
        assert_eq!(attrs[2].format, wgpu::VertexFormat::Float32x2);
    }
}
