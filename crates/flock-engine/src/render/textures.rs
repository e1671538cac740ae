use std::collections::HashMap;
use std::rc::Rc;

use crate::texture::ImageSource;

struct GpuImage {
    version: u64,
    size: (u32, u32),
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// GPU copies of [`ImageSource`]s, keyed by source id.
///
/// A source is (re)uploaded when first seen and whenever its version
/// advances. Pending sources have no GPU image.
#[derive(Default)]
pub struct TextureCache {
    layout: Option<wgpu::BindGroupLayout>,
    sampler: Option<wgpu::Sampler>,
    images: HashMap<u64, GpuImage>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout of bind group 1 (texture + sampler) shared by every textured pipeline.
    pub(super) fn bind_group_layout(&mut self, device: &wgpu::Device) -> &wgpu::BindGroupLayout {
        self.layout.get_or_insert_with(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("flock texture bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            })
        })
    }

    /// Makes sure `source` is resident and current; returns false while it is pending.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, source: &Rc<ImageSource>) -> bool {
        if !source.is_loaded() {
            return false;
        }
        let (w, h) = source.pixel_size();
        if w == 0 || h == 0 {
            return false;
        }
        let version = source.version();

        let reusable = self
            .images
            .get(&source.id())
            .is_some_and(|img| img.size == (w, h));
        if !reusable {
            let image = self.create_image(device, source.id(), (w, h), version);
            if let Some(old) = self.images.insert(source.id(), image) {
                old.texture.destroy();
            }
            upload(queue, &self.images[&source.id()].texture, source, (w, h));
            return true;
        }

        if let Some(img) = self.images.get_mut(&source.id()) {
            if img.version != version {
                log::trace!("re-uploading image source {} (version {version})", source.id());
                upload(queue, &img.texture, source, (w, h));
                img.version = version;
            }
        }
        true
    }

    /// Bind group for a source previously accepted by [`prepare`](Self::prepare).
    pub(super) fn bind_group(&self, source: &ImageSource) -> Option<&wgpu::BindGroup> {
        self.images.get(&source.id()).map(|img| &img.bind_group)
    }

    /// Drops the GPU copy of a source.
    pub fn evict(&mut self, source: &ImageSource) {
        if let Some(img) = self.images.remove(&source.id()) {
            img.texture.destroy();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn create_image(&mut self, device: &wgpu::Device, id: u64, (w, h): (u32, u32), version: u64) -> GpuImage {
        log::debug!("creating GPU image for source {id} ({w}x{h})");
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("flock image"),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = self
            .sampler
            .get_or_insert_with(|| {
                device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some("flock image sampler"),
                    address_mode_u: wgpu::AddressMode::ClampToEdge,
                    address_mode_v: wgpu::AddressMode::ClampToEdge,
                    address_mode_w: wgpu::AddressMode::ClampToEdge,
                    mag_filter: wgpu::FilterMode::Linear,
                    min_filter: wgpu::FilterMode::Linear,
                    mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                    ..Default::default()
                })
            })
            .clone();
        let layout = self.bind_group_layout(device);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("flock image bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        GpuImage {
            version,
            size: (w, h),
            texture,
            bind_group,
        }
    }
}

fn upload(queue: &wgpu::Queue, texture: &wgpu::Texture, source: &ImageSource, (w, h): (u32, u32)) {
    source.with_pixels(|rgba| {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(w * 4),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
    });
}
