//! Resource descriptions passed to a backend.

use crate::vertex::VertexLayout;

/// Index element type of every staging buffer.
pub type IndexType = u32;

/// How vertices of a buffer are assembled into primitives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum DrawTopology {
    Triangles,
    #[default]
    IndexedTriangles,
    Lines,
    Points,
}

impl DrawTopology {
    /// Whether draws read the index array.
    #[inline]
    pub fn is_indexed(self) -> bool {
        matches!(self, DrawTopology::IndexedTriangles)
    }
}

/// Expected update frequency of a buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BufferUsage {
    /// Filled once.
    Static,
    /// Refilled occasionally.
    Dynamic,
    /// Refilled every frame.
    #[default]
    Stream,
}

/// Parameters for [`CommandDispatcher::buffer_create`](super::CommandDispatcher::buffer_create).
#[derive(Debug, Clone)]
pub struct GpuBufferDesc {
    pub layout: VertexLayout,
    pub topology: DrawTopology,
    pub usage: BufferUsage,
    pub max_vertices: u32,
    /// 0 for a non-indexed buffer.
    pub max_indices: u32,
}

impl GpuBufferDesc {
    #[inline]
    pub fn vertex_bytes(&self) -> u64 {
        self.layout.stride() as u64 * self.max_vertices as u64
    }

    #[inline]
    pub fn index_bytes(&self) -> u64 {
        self.max_indices as u64 * std::mem::size_of::<IndexType>() as u64
    }
}

/// Contents for one buffer upload. Replaces whatever the buffer held.
#[derive(Debug, Copy, Clone)]
pub struct BufferUpload<'a> {
    /// Interleaved vertex bytes, `vertex_count * stride` long.
    pub vertices: &'a [u8],
    pub vertex_count: u32,
    pub indices: &'a [IndexType],
}

/// Texture dimensionality, also used to declare shader sampler slots.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

impl TextureKind {
    /// Number of array layers backing a texture of this kind.
    #[inline]
    pub fn layers(self) -> u32 {
        match self {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
        }
    }
}

/// RGBA8 texture parameters.
#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: Option<&'a str>,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 texels; cube faces are concatenated in
    /// +X, -X, +Y, -Y, +Z, -Z order. `None` leaves the texture zeroed.
    pub pixels: Option<&'a [u8]>,
}

impl TextureDesc<'_> {
    /// Byte length `pixels` must have.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4 * self.kind.layers() as usize
    }
}

/// Shader program parameters.
///
/// Uniform `location`s recorded in the command stream are byte offsets into
/// a single uniform block of `uniform_size` bytes. Sampler unit `n` is the
/// `n`th entry of `samplers`.
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    pub label: Option<&'a str>,
    /// WGSL source.
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    /// Vertex layout the program consumes.
    pub layout: VertexLayout,
    pub uniform_size: u32,
    pub samplers: &'a [TextureKind],
}

/// Offscreen render target created by a GPU backend.
#[derive(Debug, Copy, Clone)]
pub struct FrameTargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    /// Create a depth attachment.
    pub depth: bool,
}

impl Default for FrameTargetDesc {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            depth: true,
        }
    }
}
