use bytemuck::Pod;

use crate::backend::{
    BufferUpload, BufferUsage, CommandDispatcher, DrawTopology, GpuBufferDesc, GpuBufferHandle,
    IndexType,
};
use crate::command::{CommandRecord, CommandRecorder, RecordError};
use crate::vertex::{LayoutError, VertexLayout};

use super::StagingError;

/// Append buffer for dynamic geometry, backed by one GPU buffer.
///
/// Vertices are requested in blocks and written in place; indices are given
/// relative to the block they belong to and remapped on append. `update`
/// uploads everything filled since the last `reset`.
///
/// The GPU buffer must be released with [`destroy`](Self::destroy) through the
/// dispatcher that created it.
#[derive(Debug)]
pub struct GeometryStagingBuffer {
    layout: VertexLayout,
    stride: usize,
    topology: DrawTopology,
    usage: BufferUsage,
    vertices: Box<[u8]>,
    indices: Box<[IndexType]>,
    max_vertices: u32,
    max_indices: u32,
    filled_vertices: u32,
    filled_indices: u32,
    index_base: IndexType,
    handle: Option<GpuBufferHandle>,
}

impl GeometryStagingBuffer {
    /// Allocates host storage and the GPU buffer.
    ///
    /// `max_indices == 0` creates a non-indexed buffer.
    pub fn create(
        dispatcher: &mut dyn CommandDispatcher,
        layout: VertexLayout,
        max_vertices: u32,
        max_indices: u32,
        topology: DrawTopology,
        usage: BufferUsage,
    ) -> Result<Self, StagingError> {
        if layout.is_empty() {
            return Err(LayoutError::Empty.into());
        }

        let stride = layout.stride() as usize;
        let handle = dispatcher.buffer_create(&GpuBufferDesc {
            layout,
            topology,
            usage,
            max_vertices,
            max_indices,
        })?;

        log::debug!(
            "staging buffer {:#x}: {max_vertices} vertices x {stride} bytes, {max_indices} indices",
            handle.raw()
        );

        Ok(Self {
            layout,
            stride,
            topology,
            usage,
            vertices: vec![0u8; stride * max_vertices as usize].into_boxed_slice(),
            indices: vec![0; max_indices as usize].into_boxed_slice(),
            max_vertices,
            max_indices,
            filled_vertices: 0,
            filled_indices: 0,
            index_base: 0,
            handle: Some(handle),
        })
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn topology(&self) -> DrawTopology {
        self.topology
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// GPU buffer handle, or `None` after `destroy`.
    #[inline]
    pub fn handle(&self) -> Option<GpuBufferHandle> {
        self.handle
    }

    #[inline]
    pub fn filled_vertices(&self) -> u32 {
        self.filled_vertices
    }

    #[inline]
    pub fn filled_indices(&self) -> u32 {
        self.filled_indices
    }

    /// Value added to the next appended block of indices.
    #[inline]
    pub fn index_base(&self) -> IndexType {
        self.index_base
    }

    #[inline]
    pub fn max_vertices(&self) -> u32 {
        self.max_vertices
    }

    #[inline]
    pub fn max_indices(&self) -> u32 {
        self.max_indices
    }

    /// Vertex bytes filled so far.
    #[inline]
    pub fn bytes_used(&self) -> usize {
        self.filled_vertices as usize * self.stride
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled_vertices == 0
    }

    /// Filled indices, already remapped.
    #[inline]
    pub fn indices(&self) -> &[IndexType] {
        &self.indices[..self.filled_indices as usize]
    }

    /// Filled vertex bytes.
    #[inline]
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices[..self.bytes_used()]
    }

    /// Whether `vertices` more vertices and `indices` more indices fit.
    pub fn has_room(&self, vertices: u32, indices: u32) -> bool {
        let vertices_fit = self
            .filled_vertices
            .checked_add(vertices)
            .is_some_and(|n| n <= self.max_vertices);
        let indices_fit = self.max_indices == 0
            || self
                .filled_indices
                .checked_add(indices)
                .is_some_and(|n| n <= self.max_indices);
        vertices_fit && indices_fit
    }

    fn vertex_range(&self, count: u32) -> Result<std::ops::Range<usize>, StagingError> {
        match self.filled_vertices.checked_add(count) {
            Some(end) if end <= self.max_vertices => {
                Ok(self.filled_vertices as usize * self.stride..end as usize * self.stride)
            }
            _ => Err(StagingError::VertexOverflow {
                requested: count,
                filled: self.filled_vertices,
                capacity: self.max_vertices,
            }),
        }
    }

    /// Reserves the next `count` vertices and returns their bytes for writing.
    pub fn request(&mut self, count: u32) -> Result<&mut [u8], StagingError> {
        let range = self.vertex_range(count)?;
        self.filled_vertices += count;
        Ok(&mut self.vertices[range])
    }

    /// Same view as [`request`](Self::request) without reserving it.
    pub fn request_peek(&mut self, count: u32) -> Result<&mut [u8], StagingError> {
        let range = self.vertex_range(count)?;
        Ok(&mut self.vertices[range])
    }

    /// Copies typed vertices into the next free slots.
    ///
    /// `V` must be exactly one vertex of this buffer's layout.
    pub fn push_vertices<V: Pod>(&mut self, vertices: &[V]) -> Result<(), StagingError> {
        let size = std::mem::size_of::<V>();
        if size != self.stride {
            return Err(StagingError::VertexSizeMismatch {
                expected: self.stride as u32,
                actual: size as u32,
            });
        }
        let count = u32::try_from(vertices.len()).map_err(|_| StagingError::VertexOverflow {
            requested: u32::MAX,
            filled: self.filled_vertices,
            capacity: self.max_vertices,
        })?;
        self.request(count)?
            .copy_from_slice(bytemuck::cast_slice(vertices));
        Ok(())
    }

    /// Bytes of an already requested vertex.
    pub fn vertex_mut(&mut self, index: u32) -> Option<&mut [u8]> {
        if index >= self.filled_vertices {
            return None;
        }
        let start = index as usize * self.stride;
        Some(&mut self.vertices[start..start + self.stride])
    }

    /// Appends indices local to the most recent vertex block.
    ///
    /// Each index is offset by the current index base; afterwards the base
    /// moves past the highest index written. Nothing is written on overflow.
    pub fn append_indices(&mut self, local: &[IndexType]) -> Result<(), StagingError> {
        let Some(&highest) = local.iter().max() else {
            return Ok(());
        };

        let count = local.len();
        let start = self.filled_indices as usize;
        if start + count > self.max_indices as usize {
            return Err(StagingError::IndexOverflow {
                requested: count as u32,
                filled: self.filled_indices,
                capacity: self.max_indices,
            });
        }

        let base = self.index_base;
        let next_base = next_index_base(base, highest)?;
        // Every local index is <= highest, so none of these can overflow.
        for (dst, &i) in self.indices[start..start + count].iter_mut().zip(local) {
            *dst = base + i;
        }
        self.filled_indices += count as u32;
        self.index_base = next_base;
        Ok(())
    }

    /// Replaces the contents with `vertices` and `indices`, copied as is.
    pub fn fill<V: Pod>(
        &mut self,
        vertices: &[V],
        indices: &[IndexType],
    ) -> Result<(), StagingError> {
        if indices.len() > self.max_indices as usize {
            return Err(StagingError::IndexOverflow {
                requested: indices.len() as u32,
                filled: 0,
                capacity: self.max_indices,
            });
        }

        let index_base = match indices.iter().max() {
            Some(&highest) => next_index_base(0, highest)?,
            None => 0,
        };

        let saved = (self.filled_vertices, self.filled_indices, self.index_base);
        self.reset();
        if let Err(e) = self.push_vertices(vertices) {
            (self.filled_vertices, self.filled_indices, self.index_base) = saved;
            return Err(e);
        }

        self.indices[..indices.len()].copy_from_slice(indices);
        self.filled_indices = indices.len() as u32;
        self.index_base = index_base;
        Ok(())
    }

    /// Uploads the filled vertices and indices. Does nothing when empty.
    pub fn update(&self, dispatcher: &mut dyn CommandDispatcher) -> Result<(), StagingError> {
        let handle = self.handle.ok_or(StagingError::AlreadyDestroyed)?;
        if self.filled_vertices == 0 {
            return Ok(());
        }

        dispatcher.buffer_upload(
            handle,
            &BufferUpload {
                vertices: self.vertex_bytes(),
                vertex_count: self.filled_vertices,
                indices: self.indices(),
            },
        )?;
        Ok(())
    }

    /// Records a draw of this buffer's current upload.
    ///
    /// After `destroy` this records a null handle, which playback rejects.
    pub fn draw(&self, recorder: &mut CommandRecorder) -> Result<CommandRecord, RecordError> {
        recorder.add_draw_call(self.handle.unwrap_or(GpuBufferHandle::NULL))
    }

    /// Clears the counters. Storage keeps its size and contents.
    pub fn reset(&mut self) {
        self.filled_vertices = 0;
        self.filled_indices = 0;
        self.index_base = 0;
    }

    /// Releases the GPU buffer. Fails if it was already released.
    pub fn destroy(&mut self, dispatcher: &mut dyn CommandDispatcher) -> Result<(), StagingError> {
        let handle = self.handle.take().ok_or(StagingError::AlreadyDestroyed)?;
        dispatcher.buffer_destroy(handle)?;
        log::debug!("staging buffer {:#x} destroyed", handle.raw());
        Ok(())
    }
}

/// Index base after a block whose highest local index is `highest`.
fn next_index_base(base: IndexType, highest: IndexType) -> Result<IndexType, StagingError> {
    base.checked_add(highest)
        .and_then(|top| top.checked_add(1))
        .ok_or(StagingError::IndexBaseOverflow { base, local: highest })
}

impl Drop for GeometryStagingBuffer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!(
                "staging buffer {:#x} dropped without destroy; GPU buffer left to backend teardown",
                handle.raw()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::TraceDispatcher;
    use crate::vertex::AttributeKind;

    #[repr(C)]
    #[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Vertex2 {
        pos: [f32; 2],
    }

    fn staging(
        d: &mut TraceDispatcher,
        max_vertices: u32,
        max_indices: u32,
    ) -> GeometryStagingBuffer {
        let layout = VertexLayout::from_kinds(&[AttributeKind::Float2]).unwrap();
        GeometryStagingBuffer::create(
            d,
            layout,
            max_vertices,
            max_indices,
            DrawTopology::IndexedTriangles,
            BufferUsage::Stream,
        )
        .unwrap()
    }

    fn finish(mut buf: GeometryStagingBuffer, d: &mut TraceDispatcher) {
        buf.destroy(d).unwrap();
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn has_room_guarantees_request_and_append() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 8, 12);

        for (v, i) in [(4, 6), (4, 6)] {
            assert!(buf.has_room(v, i));
            assert_eq!(buf.request(v).unwrap().len(), v as usize * 8);
            buf.append_indices(&[0, 1, 2, 2, 3, 0][..i as usize]).unwrap();
        }
        assert!(!buf.has_room(1, 0));
        assert!(!buf.has_room(0, 1));
        finish(buf, &mut d);
    }

    #[test]
    fn vertex_overflow_is_reported_without_advancing() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 0);
        buf.request(3).unwrap();
        assert_eq!(
            buf.request(2).unwrap_err(),
            StagingError::VertexOverflow { requested: 2, filled: 3, capacity: 4 }
        );
        assert_eq!(buf.filled_vertices(), 3);
        finish(buf, &mut d);
    }

    #[test]
    fn index_overflow_writes_nothing() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 16, 4);
        buf.append_indices(&[0, 1, 2]).unwrap();
        assert!(matches!(
            buf.append_indices(&[0, 1, 2]),
            Err(StagingError::IndexOverflow { .. })
        ));
        assert_eq!(buf.indices(), &[0, 1, 2]);
        assert_eq!(buf.index_base(), 3);
        finish(buf, &mut d);
    }

    #[test]
    fn non_indexed_buffer_ignores_index_room() {
        let mut d = TraceDispatcher::default();
        let buf = staging(&mut d, 4, 0);
        assert!(buf.has_room(4, 100));
        finish(buf, &mut d);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 0);
        buf.request_peek(4).unwrap().fill(0xAB);
        assert_eq!(buf.filled_vertices(), 0);
        buf.request(1).unwrap();
        assert_eq!(buf.vertex_bytes(), &[0xAB; 8]);
        finish(buf, &mut d);
    }

    // ── index remapping ───────────────────────────────────────────────────

    #[test]
    fn quads_are_remapped_onto_following_vertices() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 8, 12);
        let quad = [0, 1, 2, 2, 3, 0];

        buf.request(4).unwrap();
        buf.append_indices(&quad).unwrap();
        buf.request(4).unwrap();
        buf.append_indices(&quad).unwrap();

        assert_eq!(buf.indices(), &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        finish(buf, &mut d);
    }

    #[test]
    fn empty_index_slice_is_a_noop() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 6);
        buf.append_indices(&[]).unwrap();
        assert_eq!(buf.index_base(), 0);
        assert_eq!(buf.filled_indices(), 0);
        finish(buf, &mut d);
    }

    #[test]
    fn out_of_range_local_index_is_rejected() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 6);
        assert_eq!(
            buf.append_indices(&[u32::MAX]).unwrap_err(),
            StagingError::IndexBaseOverflow { base: 0, local: u32::MAX }
        );
        assert_eq!(buf.filled_indices(), 0);
        assert_eq!(buf.index_base(), 0);

        buf.append_indices(&[0, 1, 2]).unwrap();
        assert!(matches!(
            buf.append_indices(&[u32::MAX - 3]),
            Err(StagingError::IndexBaseOverflow { base: 3, .. })
        ));
        assert_eq!(buf.indices(), &[0, 1, 2]);
        assert_eq!(buf.index_base(), 3);
        finish(buf, &mut d);
    }

    #[test]
    fn fill_rejects_max_index_and_keeps_contents() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 6);
        let quad = [Vertex2 { pos: [0.0; 2] }; 4];
        buf.fill(&quad, &[0, 1, 2]).unwrap();

        assert!(matches!(
            buf.fill(&quad, &[0, u32::MAX]),
            Err(StagingError::IndexBaseOverflow { .. })
        ));
        assert_eq!(buf.filled_vertices(), 4);
        assert_eq!(buf.indices(), &[0, 1, 2]);
        assert_eq!(buf.index_base(), 3);
        finish(buf, &mut d);
    }

    // ── typed access ──────────────────────────────────────────────────────

    #[test]
    fn push_vertices_checks_stride() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 0);
        assert_eq!(
            buf.push_vertices(&[[0.0f32; 3]]).unwrap_err(),
            StagingError::VertexSizeMismatch { expected: 8, actual: 12 }
        );

        buf.push_vertices(&[Vertex2 { pos: [1.0, 2.0] }]).unwrap();
        let v: Vertex2 = bytemuck::pod_read_unaligned(buf.vertex_mut(0).unwrap());
        assert_eq!(v.pos, [1.0, 2.0]);
        assert!(buf.vertex_mut(1).is_none());
        finish(buf, &mut d);
    }

    #[test]
    fn fill_replaces_contents() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 6);
        buf.request(2).unwrap();
        buf.append_indices(&[0, 1]).unwrap();

        let verts = [Vertex2 { pos: [0.0; 2] }; 3];
        buf.fill(&verts, &[0, 1, 2]).unwrap();
        assert_eq!(buf.filled_vertices(), 3);
        assert_eq!(buf.indices(), &[0, 1, 2]);
        assert_eq!(buf.index_base(), 3);

        assert!(buf.fill(&[Vertex2 { pos: [0.0; 2] }; 5], &[]).is_err());
        assert_eq!(buf.filled_vertices(), 3);
        finish(buf, &mut d);
    }

    // ── upload + lifetime ─────────────────────────────────────────────────

    #[test]
    fn update_uploads_filled_prefix_only() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 8, 12);

        buf.update(&mut d).unwrap();
        assert!(d.uploads.is_empty());

        buf.push_vertices(&[Vertex2 { pos: [1.0, 1.0] }; 4]).unwrap();
        buf.append_indices(&[0, 1, 2, 2, 3, 0]).unwrap();
        buf.update(&mut d).unwrap();

        let (handle, bytes, indices) = &d.uploads[0];
        assert_eq!(Some(*handle), buf.handle());
        assert_eq!(bytes.len(), 32);
        assert_eq!(indices, &[0, 1, 2, 2, 3, 0]);
        finish(buf, &mut d);
    }

    #[test]
    fn reset_keeps_allocation() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 6);
        buf.request(4).unwrap();
        buf.append_indices(&[0, 1, 2]).unwrap();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.index_base(), 0);
        assert!(buf.has_room(4, 6));
        finish(buf, &mut d);
    }

    #[test]
    fn double_destroy_is_an_error() {
        let mut d = TraceDispatcher::default();
        let mut buf = staging(&mut d, 4, 0);
        let handle = buf.handle().unwrap();
        buf.destroy(&mut d).unwrap();
        assert_eq!(buf.destroy(&mut d).unwrap_err(), StagingError::AlreadyDestroyed);
        assert_eq!(d.destroyed, vec![handle]);
        assert_eq!(buf.update(&mut d).unwrap_err(), StagingError::AlreadyDestroyed);
    }

    #[test]
    fn empty_layout_is_rejected() {
        let mut d = TraceDispatcher::default();
        let err = GeometryStagingBuffer::create(
            &mut d,
            VertexLayout::new(),
            4,
            0,
            DrawTopology::Triangles,
            BufferUsage::Static,
        )
        .unwrap_err();
        assert_eq!(err, StagingError::Layout(LayoutError::Empty));
    }
}
