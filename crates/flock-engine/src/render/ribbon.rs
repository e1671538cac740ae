use std::collections::HashMap;

use crate::paint::BlendMode;
use crate::render::{RenderCtx, RenderTarget, TextureCache};
use crate::ribbon::RibbonMesh;

use super::common::{uniform_bind_group_layout, DrawUniform, UniformPool};

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const UV_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32];

/// GPU buffers of one ribbon mesh.
///
/// Vertices are written every frame. UVs and colors are written when the
/// mesh's `dirty` counter moves, indices when `index_dirty` moves. The seen
/// counters only mean something for the mesh these buffers belong to.
#[derive(Default)]
struct MeshBuffers {
    points: usize,
    vertices: Option<wgpu::Buffer>,
    uvs: Option<wgpu::Buffer>,
    colors: Option<wgpu::Buffer>,
    indices: Option<wgpu::Buffer>,
    seen_dirty: Option<u64>,
    seen_index_dirty: Option<u64>,
}

impl MeshBuffers {
    fn ensure_capacity(&mut self, ctx: &RenderCtx<'_>, points: usize) {
        if self.points >= points && self.vertices.is_some() {
            return;
        }
        let points = points.next_power_of_two().max(16);
        log::debug!("allocating ribbon buffers for {points} point(s)");

        let vertex = |label: &str, floats: usize| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (floats * std::mem::size_of::<f32>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        self.destroy();
        self.vertices = Some(vertex("flock ribbon vertices", points * 4));
        self.uvs = Some(vertex("flock ribbon uvs", points * 4));
        self.colors = Some(vertex("flock ribbon colors", points * 2));
        self.indices = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("flock ribbon indices"),
            size: (points * 2 * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.points = points;
        // New buffers are empty whatever the counters say.
        self.seen_dirty = None;
        self.seen_index_dirty = None;
    }

    /// Whether uvs/colors and indices need uploading, in that order.
    fn stale(&self, mesh: &RibbonMesh) -> (bool, bool) {
        (
            self.seen_dirty != Some(mesh.dirty()),
            self.seen_index_dirty != Some(mesh.index_dirty()),
        )
    }

    fn sync(&mut self, ctx: &RenderCtx<'_>, mesh: &RibbonMesh) {
        if let Some(buf) = self.vertices.as_ref() {
            ctx.queue.write_buffer(buf, 0, bytemuck::cast_slice(mesh.vertices()));
        }
        let (static_stale, index_stale) = self.stale(mesh);
        if static_stale {
            if let (Some(uvs), Some(colors)) = (self.uvs.as_ref(), self.colors.as_ref()) {
                ctx.queue.write_buffer(uvs, 0, bytemuck::cast_slice(mesh.uvs()));
                ctx.queue.write_buffer(colors, 0, bytemuck::cast_slice(mesh.colors()));
            }
        }
        if index_stale {
            if let Some(indices) = self.indices.as_ref() {
                ctx.queue.write_buffer(indices, 0, bytemuck::cast_slice(mesh.indices()));
            }
        }
        self.mark_seen(mesh);
    }

    fn mark_seen(&mut self, mesh: &RibbonMesh) {
        self.seen_dirty = Some(mesh.dirty());
        self.seen_index_dirty = Some(mesh.index_dirty());
    }

    fn destroy(&mut self) {
        let buffers = [self.vertices.take(), self.uvs.take(), self.colors.take(), self.indices.take()];
        for buf in buffers.into_iter().flatten() {
            buf.destroy();
        }
    }
}

/// Triangle-strip renderer for [`RibbonMesh`]es.
///
/// GPU buffers are kept per mesh, keyed by [`RibbonMesh::id`]. Call
/// [`evict`](Self::evict) when a mesh is dropped.
#[derive(Default)]
pub struct RibbonRenderer {
    pipeline_key: Option<(wgpu::TextureFormat, BlendMode)>,
    pipeline: Option<wgpu::RenderPipeline>,
    uniform_layout: Option<wgpu::BindGroupLayout>,
    uniforms: UniformPool,
    meshes: HashMap<u64, MeshBuffers>,
}

impl RibbonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.uniforms.rewind();
    }

    /// Destroys the GPU buffers held for `mesh_id`.
    pub fn evict(&mut self, mesh_id: u64) {
        if let Some(mut buffers) = self.meshes.remove(&mesh_id) {
            buffers.destroy();
        }
    }

    /// Number of meshes with GPU buffers.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        textures: &mut TextureCache,
        mesh: &RibbonMesh,
    ) {
        if !mesh.can_render() {
            return;
        }
        let source = mesh.texture().source();
        if !textures.prepare(ctx.device, ctx.queue, source) {
            return;
        }

        self.ensure_pipeline(ctx, textures, mesh.blend_mode);
        let buffers = self.meshes.entry(mesh.id()).or_default();
        buffers.ensure_capacity(ctx, mesh.point_count());
        buffers.sync(ctx, mesh);

        let Some(uniform_layout) = self.uniform_layout.as_ref() else { return };
        let uniform = DrawUniform::new(ctx.viewport, mesh.node().world_transform(), mesh.node().world_alpha());
        let slot = self
            .uniforms
            .push(ctx.device, ctx.queue, uniform_layout, "flock ribbon ubo", &uniform);

        let Some(pipeline) = self.pipeline.as_ref() else { return };
        let Some(uniforms) = self.uniforms.get(slot) else { return };
        let Some(texture_bind_group) = textures.bind_group(source) else { return };
        let Some(b) = self.meshes.get(&mesh.id()) else { return };
        let (Some(vertices), Some(uvs), Some(colors), Some(indices)) =
            (b.vertices.as_ref(), b.uvs.as_ref(), b.colors.as_ref(), b.indices.as_ref())
        else {
            return;
        };

        let mut rpass = target.load_pass("flock ribbon pass");
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &uniforms.bind_group, &[]);
        rpass.set_bind_group(1, texture_bind_group, &[]);
        rpass.set_vertex_buffer(0, vertices.slice(..));
        rpass.set_vertex_buffer(1, uvs.slice(..));
        rpass.set_vertex_buffer(2, colors.slice(..));
        rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..mesh.indices().len() as u32, 0, 0..1);
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, textures: &mut TextureCache, blend: BlendMode) {
        let key = (ctx.surface_format, blend);
        if self.pipeline_key == Some(key) && self.pipeline.is_some() {
            return;
        }

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("flock ribbon shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/ribbon.wgsl").into()),
        });
        let uniform_layout = self
            .uniform_layout
            .get_or_insert_with(|| uniform_bind_group_layout(ctx.device, "flock ribbon ubo bgl"));
        let texture_layout = textures.bind_group_layout(ctx.device);

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("flock ribbon pipeline layout"),
            bind_group_layouts: &[&*uniform_layout, texture_layout],
            immediate_size: 0,
        });

        let stream = |stride: usize, attributes: &'static [wgpu::VertexAttribute]| wgpu::VertexBufferLayout {
            array_stride: (stride * std::mem::size_of::<f32>()) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        };

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("flock ribbon pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[stream(2, &POSITION_ATTRS), stream(2, &UV_ATTRS), stream(1, &COLOR_ATTRS)],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(blend.blend_state()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: Some(wgpu::IndexFormat::Uint32),
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

        self.pipeline_key = Some(key);
        self.pipeline = Some(pipeline);
    }
}

impl Drop for RibbonRenderer {
    fn drop(&mut self) {
        for buffers in self.meshes.values_mut() {
            buffers.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::coords::Vec2;
    use crate::texture::{ImageSource, Texture};

    fn mesh() -> RibbonMesh {
        let texture = Texture::new(ImageSource::from_rgba8(2, 2, vec![255; 16], 1.0).unwrap());
        let points = Rc::new(RefCell::new(vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)]));
        RibbonMesh::new(texture, points)
    }

    #[test]
    fn fresh_buffers_upload_everything() {
        let buffers = MeshBuffers::default();
        assert_eq!(buffers.stale(&mesh()), (true, true));
    }

    #[test]
    fn meshes_with_equal_counters_keep_separate_upload_state() {
        let a = mesh();
        let b = mesh();
        assert_ne!(a.id(), b.id());
        assert_eq!((a.dirty(), a.index_dirty()), (b.dirty(), b.index_dirty()));

        let mut renderer = RibbonRenderer::new();
        renderer.meshes.entry(a.id()).or_default().mark_seen(&a);
        assert_eq!(renderer.meshes[&a.id()].stale(&a), (false, false));

        let for_b = renderer.meshes.entry(b.id()).or_default();
        assert_eq!(for_b.stale(&b), (true, true));
        assert_eq!(renderer.mesh_count(), 2);

        renderer.evict(a.id());
        assert_eq!(renderer.mesh_count(), 1);
    }
}
