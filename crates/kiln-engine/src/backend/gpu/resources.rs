//! GPU-side resources behind the opaque handles.

use wgpu::util::DeviceExt;

use crate::vertex::VertexLayout;

use super::super::{
    BackendError, FrameTargetDesc, GpuBufferDesc, ShaderDesc, TextureDesc, TextureKind,
};
use super::convert::vertex_attributes;

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Uniform blocks are allocated in multiples of this.
const UNIFORM_ALIGN: u32 = 16;

/// Copies `bytes` into `dst` at offset 0.
///
/// Inside a frame the copy is recorded on the frame's encoder so it lands
/// between the draws around it; outside a frame it goes through the queue.
pub(super) fn write_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    encoder: Option<&mut wgpu::CommandEncoder>,
    dst: &wgpu::Buffer,
    bytes: &[u8],
) {
    if bytes.is_empty() {
        return;
    }
    match encoder {
        Some(encoder) => {
            let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kiln upload staging"),
                contents: bytes,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
            encoder.copy_buffer_to_buffer(&staging, 0, dst, 0, bytes.len() as u64);
        }
        None => queue.write_buffer(dst, 0, bytes),
    }
}

// ── buffers ───────────────────────────────────────────────────────────────

pub(super) struct GpuBuffer {
    pub desc: GpuBufferDesc,
    pub vertex: wgpu::Buffer,
    pub index: Option<wgpu::Buffer>,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl GpuBuffer {
    pub fn create(device: &wgpu::Device, desc: &GpuBufferDesc) -> Result<Self, BackendError> {
        // Rejects layouts wgpu cannot express before anything is allocated.
        vertex_attributes(&desc.layout)?;

        let vertex = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln vertex buffer"),
            size: desc.vertex_bytes().max(4),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index = (desc.topology.is_indexed() && desc.max_indices > 0).then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("kiln index buffer"),
                size: desc.index_bytes(),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Ok(Self {
            desc: desc.clone(),
            vertex,
            index,
            vertex_count: 0,
            index_count: 0,
        })
    }
}

// ── textures ──────────────────────────────────────────────────────────────

pub(super) struct GpuTexture {
    pub kind: TextureKind,
    pub view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

impl GpuTexture {
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &TextureDesc<'_>,
    ) -> Result<Self, BackendError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::ResourceCreation(format!(
                "texture has zero size ({}x{})",
                desc.width, desc.height
            )));
        }
        if desc.kind == TextureKind::Cube && desc.width != desc.height {
            return Err(BackendError::ResourceCreation(format!(
                "cube faces must be square, got {}x{}",
                desc.width, desc.height
            )));
        }
        if let Some(pixels) = desc.pixels {
            if pixels.len() != desc.expected_len() {
                return Err(BackendError::InvalidUpload(format!(
                    "{} texel bytes, expected {}",
                    pixels.len(),
                    desc.expected_len()
                )));
            }
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.kind.layers(),
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if let Some(pixels) = desc.pixels {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(desc.width * 4),
                    rows_per_image: Some(desc.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label,
            dimension: Some(view_dimension(desc.kind)),
            ..Default::default()
        });

        Ok(Self { kind: desc.kind, view, _texture: texture })
    }

    /// 1x1 opaque white, bound to sampler units that have no texture.
    pub fn fallback(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        kind: TextureKind,
    ) -> Result<Self, BackendError> {
        let pixels = vec![0xff; 4 * kind.layers() as usize];
        Self::create(
            device,
            queue,
            &TextureDesc {
                label: Some("kiln fallback texture"),
                kind,
                width: 1,
                height: 1,
                pixels: Some(&pixels),
            },
        )
    }
}

pub(super) fn view_dimension(kind: TextureKind) -> wgpu::TextureViewDimension {
    match kind {
        TextureKind::D2 => wgpu::TextureViewDimension::D2,
        TextureKind::Cube => wgpu::TextureViewDimension::Cube,
    }
}

// ── shaders ───────────────────────────────────────────────────────────────

/// Compiled program plus its uniform block.
///
/// Bind group 0 holds the uniform block at binding 0 (when non-empty) and,
/// for sampler unit `n`, the texture at `1 + 2n` and its sampler at `2 + 2n`.
pub(super) struct GpuShader {
    pub label: String,
    pub module: wgpu::ShaderModule,
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub layout: VertexLayout,
    pub attributes: Vec<wgpu::VertexAttribute>,
    pub samplers: Vec<TextureKind>,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    /// Declared block size; uniform writes are checked against this.
    pub uniform_size: u32,
    /// CPU copy of the block, flushed to `uniform_buffer` before a draw.
    pub uniforms: Vec<u8>,
    pub uniform_buffer: Option<wgpu::Buffer>,
    pub uniforms_dirty: bool,
}

impl GpuShader {
    pub fn create(device: &wgpu::Device, desc: &ShaderDesc<'_>) -> Result<Self, BackendError> {
        let attributes = vertex_attributes(&desc.layout)?;
        let label = desc.label.unwrap_or("kiln shader");

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let padded = desc.uniform_size.div_ceil(UNIFORM_ALIGN) * UNIFORM_ALIGN;
        let uniform_buffer = (padded > 0).then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: padded as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let mut entries = Vec::with_capacity(1 + desc.samplers.len() * 2);
        if uniform_buffer.is_some() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        for (unit, kind) in desc.samplers.iter().enumerate() {
            let (texture, sampler) = sampler_bindings(unit as u32);
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: texture,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: view_dimension(*kind),
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Ok(Self {
            label: label.to_owned(),
            module,
            vertex_entry: desc.vertex_entry.to_owned(),
            fragment_entry: desc.fragment_entry.to_owned(),
            layout: desc.layout,
            attributes,
            samplers: desc.samplers.to_vec(),
            bind_group_layout,
            pipeline_layout,
            uniform_size: desc.uniform_size,
            uniforms: vec![0; padded as usize],
            uniform_buffer,
            uniforms_dirty: false,
        })
    }
}

/// Texture and sampler binding indices for a sampler unit.
#[inline]
pub(super) fn sampler_bindings(unit: u32) -> (u32, u32) {
    (1 + unit * 2, 2 + unit * 2)
}

// ── frame target ──────────────────────────────────────────────────────────

/// Offscreen color (and optional depth) attachment frames render into.
pub(super) struct FrameTarget {
    pub desc: FrameTargetDesc,
    pub color_view: wgpu::TextureView,
    pub depth_view: Option<wgpu::TextureView>,
}

impl FrameTarget {
    pub fn create(device: &wgpu::Device, desc: FrameTargetDesc) -> Result<Self, BackendError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::ResourceCreation(format!(
                "render target has zero size ({}x{})",
                desc.width, desc.height
            )));
        }
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let color_view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("kiln frame color"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let depth_view = desc.depth.then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("kiln frame depth"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        Ok(Self { desc, color_view, depth_view })
    }

    #[inline]
    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth_view.as_ref().map(|_| DEPTH_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_units_do_not_overlap_uniform_binding() {
        assert_eq!(sampler_bindings(0), (1, 2));
        assert_eq!(sampler_bindings(3), (7, 8));
    }
}
