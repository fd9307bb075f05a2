//! Graphics backends.
//!
//! A backend implements [`CommandDispatcher`]: it owns GPU resources behind
//! opaque handles and executes recorded commands through its jump table.
//! Which backend runs is decided once, at startup, by [`create_dispatcher`].

mod bound;
mod desc;
mod error;
mod factory;
mod handle;
mod headless;

pub mod gpu;

pub use bound::{BoundState, MAX_TEXTURE_UNITS};
pub use desc::{
    BufferUpload, BufferUsage, DrawTopology, FrameTargetDesc, GpuBufferDesc, IndexType,
    ShaderDesc, TextureDesc, TextureKind,
};
pub use error::{BackendError, ResourceKind};
pub use factory::{create_dispatcher, BackendConfig, BackendPreference, Capabilities, GpuContext};
pub use handle::{GpuBufferHandle, ShaderHandle, TextureHandle};
pub use headless::HeadlessDispatcher;

pub(crate) use handle::{BufferKey, ShaderKey, TextureKey};

use std::fmt;

use crate::command::{DispatchError, Opcode};
use crate::stream::BinaryCursor;

/// Backend implementation in use.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BackendKind {
    Wgpu,
    Headless,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Wgpu => "wgpu",
            BackendKind::Headless => "headless",
        })
    }
}

/// Per-frame counters kept by every backend.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub vertices: u64,
    pub indices: u64,
    pub clears: u32,
    /// Draws skipped because the buffer held no vertices.
    pub empty_draws: u32,
}

/// Executes recorded commands and manages the resources they refer to.
///
/// `run_command` / `post_command` receive a cursor positioned at the
/// command's payload and must consume exactly that payload.
pub trait CommandDispatcher {
    fn kind(&self) -> BackendKind;

    fn run_command(
        &mut self,
        opcode: Opcode,
        payload: &mut BinaryCursor<&[u8]>,
    ) -> Result<(), DispatchError>;

    fn post_command(
        &mut self,
        opcode: Opcode,
        payload: &mut BinaryCursor<&[u8]>,
    ) -> Result<(), DispatchError>;

    /// Counters since the last `begin_frame`.
    fn stats(&self) -> FrameStats;

    /// Starts a frame. Called before the first playback of a frame.
    fn begin_frame(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Finishes the frame and hands it to the device.
    fn end_frame(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn buffer_create(&mut self, desc: &GpuBufferDesc) -> Result<GpuBufferHandle, BackendError>;

    fn buffer_upload(
        &mut self,
        buffer: GpuBufferHandle,
        upload: &BufferUpload<'_>,
    ) -> Result<(), BackendError>;

    fn buffer_destroy(&mut self, buffer: GpuBufferHandle) -> Result<(), BackendError>;

    fn texture_create(&mut self, desc: &TextureDesc<'_>) -> Result<TextureHandle, BackendError>;

    fn texture_destroy(&mut self, texture: TextureHandle) -> Result<(), BackendError>;

    fn shader_create(&mut self, desc: &ShaderDesc<'_>) -> Result<ShaderHandle, BackendError>;

    fn shader_destroy(&mut self, shader: ShaderHandle) -> Result<(), BackendError>;
}

/// Checks an upload against the buffer it targets. Shared by all backends.
pub(crate) fn validate_upload(
    desc: &GpuBufferDesc,
    upload: &BufferUpload<'_>,
) -> Result<(), BackendError> {
    let stride = desc.layout.stride() as usize;
    if upload.vertex_count > desc.max_vertices {
        return Err(BackendError::InvalidUpload(format!(
            "{} vertices exceed buffer capacity of {}",
            upload.vertex_count, desc.max_vertices
        )));
    }
    if upload.vertices.len() != upload.vertex_count as usize * stride {
        return Err(BackendError::InvalidUpload(format!(
            "{} vertex bytes for {} vertices of stride {stride}",
            upload.vertices.len(),
            upload.vertex_count
        )));
    }
    if upload.indices.len() > desc.max_indices as usize {
        return Err(BackendError::InvalidUpload(format!(
            "{} indices exceed buffer capacity of {}",
            upload.indices.len(),
            desc.max_indices
        )));
    }
    if let Some(&bad) = upload.indices.iter().find(|&&i| i >= upload.vertex_count) {
        return Err(BackendError::InvalidUpload(format!(
            "index {bad} out of range for {} vertices",
            upload.vertex_count
        )));
    }
    Ok(())
}

/// Byte range `location..location + size` checked against a uniform block.
pub(crate) fn uniform_range(
    location: i32,
    size: usize,
    block_size: u32,
) -> Result<std::ops::Range<usize>, BackendError> {
    let err = || BackendError::UniformOutOfRange {
        location,
        size: size as u32,
        block_size,
    };
    let start = usize::try_from(location).map_err(|_| err())?;
    let end = start.checked_add(size).ok_or_else(err)?;
    if end > block_size as usize {
        return Err(err());
    }
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{AttributeKind, VertexLayout};

    fn desc() -> GpuBufferDesc {
        GpuBufferDesc {
            layout: VertexLayout::from_kinds(&[AttributeKind::Float2]).unwrap(),
            topology: DrawTopology::IndexedTriangles,
            usage: BufferUsage::Stream,
            max_vertices: 4,
            max_indices: 6,
        }
    }

    #[test]
    fn upload_within_capacity_is_valid() {
        let bytes = [0u8; 32];
        let upload = BufferUpload { vertices: &bytes, vertex_count: 4, indices: &[0, 1, 2, 2, 3, 0] };
        assert!(validate_upload(&desc(), &upload).is_ok());
    }

    #[test]
    fn upload_rejects_out_of_range_index() {
        let bytes = [0u8; 24];
        let upload = BufferUpload { vertices: &bytes, vertex_count: 3, indices: &[0, 1, 3] };
        assert!(matches!(
            validate_upload(&desc(), &upload),
            Err(BackendError::InvalidUpload(_))
        ));
    }

    #[test]
    fn upload_rejects_mismatched_byte_count() {
        let bytes = [0u8; 20];
        let upload = BufferUpload { vertices: &bytes, vertex_count: 3, indices: &[] };
        assert!(validate_upload(&desc(), &upload).is_err());
    }

    #[test]
    fn uniform_range_bounds() {
        assert_eq!(uniform_range(16, 16, 32).unwrap(), 16..32);
        assert!(uniform_range(20, 16, 32).is_err());
        assert!(uniform_range(-4, 4, 32).is_err());
    }
}
