use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::backend::{BufferUsage, CommandDispatcher, DrawTopology, IndexType};
use crate::command::{CommandRecorder, PlaybackReport, RecordError, RecorderConfig};
use crate::geometry::{GeometryStagingBuffer, StagingError};
use crate::vertex::{AttributeKind, VertexLayout};

/// Two triangles over vertices 0..4, clockwise from the top-left corner.
pub const QUAD_INDICES: [IndexType; 6] = [0, 1, 2, 2, 3, 0];

/// Interleaved sprite vertex: `Float3` position, `UByte4` color, `Float2` uv.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
}

impl SpriteVertex {
    pub const ATTRIBUTES: [AttributeKind; 3] =
        [AttributeKind::Float3, AttributeKind::UByte4, AttributeKind::Float2];

    pub const LAYOUT: VertexLayout = VertexLayout::from_array(Self::ATTRIBUTES);

    #[inline]
    pub fn layout() -> VertexLayout {
        Self::LAYOUT
    }
}

/// Axis-aligned sprite, positioned by its center.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sprite {
    pub center: [f32; 2],
    pub size: [f32; 2],
    pub depth: f32,
    /// Straight RGBA8.
    pub color: [u8; 4],
    /// `[u0, v0, u1, v1]`.
    pub uv: [f32; 4],
}

impl Sprite {
    pub fn new(center: [f32; 2], size: [f32; 2], color: [u8; 4]) -> Self {
        Self {
            center,
            size,
            depth: 0.0,
            color,
            uv: [0.0, 0.0, 1.0, 1.0],
        }
    }

    fn vertices(&self) -> [SpriteVertex; 4] {
        let [cx, cy] = self.center;
        let (hw, hh) = (self.size[0] * 0.5, self.size[1] * 0.5);
        let [u0, v0, u1, v1] = self.uv;
        let v = |x: f32, y: f32, u: f32, v: f32| SpriteVertex {
            position: [x, y, self.depth],
            color: self.color,
            uv: [u, v],
        };
        [
            v(cx - hw, cy - hh, u0, v0),
            v(cx - hw, cy + hh, u0, v1),
            v(cx + hw, cy + hh, u1, v1),
            v(cx + hw, cy - hh, u1, v0),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct QuadBatchConfig {
    /// Quads per GPU upload.
    pub max_quads: u32,
    /// Capacity of the setup stream replayed before each batch draw.
    pub setup: RecorderConfig,
}

impl Default for QuadBatchConfig {
    fn default() -> Self {
        Self {
            max_quads: 256,
            setup: RecorderConfig {
                max_bytes: 4096,
                max_commands: 64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    Staging(StagingError),
    Record(RecordError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staging(e) => write!(f, "quad batch staging: {e}"),
            Self::Record(e) => write!(f, "quad batch recording: {e}"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Staging(e) => Some(e),
            Self::Record(e) => Some(e),
        }
    }
}

impl From<StagingError> for BatchError {
    fn from(e: StagingError) -> Self {
        Self::Staging(e)
    }
}

impl From<RecordError> for BatchError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

/// Collects sprites into a staging buffer and draws them in batches.
///
/// Commands recorded into [`setup`](Self::setup) (shader, uniforms,
/// samplers, state) are replayed before every batch draw. When the staging
/// buffer has no room for another quad the pending quads are uploaded, drawn
/// and the buffer is reset.
#[derive(Debug)]
pub struct QuadBatch {
    staging: GeometryStagingBuffer,
    setup: CommandRecorder,
    pending: PlaybackReport,
    flushes: u32,
}

impl QuadBatch {
    pub fn new(
        dispatcher: &mut dyn CommandDispatcher,
        config: QuadBatchConfig,
    ) -> Result<Self, StagingError> {
        let staging = GeometryStagingBuffer::create(
            dispatcher,
            SpriteVertex::layout(),
            config.max_quads.saturating_mul(4),
            config.max_quads.saturating_mul(6),
            DrawTopology::IndexedTriangles,
            BufferUsage::Stream,
        )?;
        Ok(Self {
            staging,
            setup: CommandRecorder::new(config.setup),
            pending: PlaybackReport::default(),
            flushes: 0,
        })
    }

    /// Commands replayed before every batch draw.
    #[inline]
    pub fn setup(&mut self) -> &mut CommandRecorder {
        &mut self.setup
    }

    /// Quads waiting for the next flush.
    #[inline]
    pub fn pending_quads(&self) -> u32 {
        self.staging.filled_vertices() / 4
    }

    /// Batches drawn so far.
    #[inline]
    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    /// Adds one sprite, flushing first if the batch is full.
    ///
    /// If that flush fails its quads are dropped, the error is returned and
    /// `sprite` is not added; the batch is empty and usable again.
    pub fn push(
        &mut self,
        dispatcher: &mut dyn CommandDispatcher,
        sprite: &Sprite,
    ) -> Result<(), BatchError> {
        if !self.staging.has_room(4, 6) {
            let report = self.draw_pending(dispatcher)?;
            self.merge(report);
        }

        self.staging.push_vertices(&sprite.vertices())?;
        self.staging.append_indices(&QUAD_INDICES)?;
        Ok(())
    }

    /// Draws pending quads. The report covers every batch drawn since the
    /// previous `flush`, including those triggered by `push`.
    ///
    /// On error the pending quads are dropped.
    pub fn flush(
        &mut self,
        dispatcher: &mut dyn CommandDispatcher,
    ) -> Result<PlaybackReport, BatchError> {
        let report = self.draw_pending(dispatcher)?;
        self.merge(report);
        Ok(std::mem::take(&mut self.pending))
    }

    /// Releases the GPU buffer.
    pub fn destroy(&mut self, dispatcher: &mut dyn CommandDispatcher) -> Result<(), StagingError> {
        self.staging.destroy(dispatcher)
    }

    fn draw_pending(
        &mut self,
        dispatcher: &mut dyn CommandDispatcher,
    ) -> Result<PlaybackReport, BatchError> {
        if self.staging.is_empty() {
            return Ok(PlaybackReport::default());
        }

        let quads = self.pending_quads();
        let setup = self.setup.save_offset();
        let drawn = self.draw_staged(dispatcher);
        let restored = self.setup.load_offset(setup);
        self.staging.reset();

        match drawn.and_then(|report| restored.map(|()| report).map_err(BatchError::from)) {
            Ok(report) => {
                log::trace!("quad batch #{}: {quads} quad(s)", self.flushes);
                self.flushes += 1;
                Ok(report)
            }
            Err(e) => {
                log::warn!("quad batch: dropped {quads} quad(s): {e}");
                Err(e)
            }
        }
    }

    fn draw_staged(
        &mut self,
        dispatcher: &mut dyn CommandDispatcher,
    ) -> Result<PlaybackReport, BatchError> {
        self.staging.update(dispatcher)?;
        self.staging.draw(&mut self.setup)?;
        Ok(self.setup.run_commands(dispatcher))
    }

    fn merge(&mut self, report: PlaybackReport) {
        self.pending.executed += report.executed;
        self.pending.errors.extend(report.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessDispatcher, ShaderDesc, ShaderHandle};

    fn sprite_shader(d: &mut HeadlessDispatcher) -> ShaderHandle {
        d.shader_create(&ShaderDesc {
            label: Some("sprite"),
            source: "",
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            layout: SpriteVertex::layout(),
            uniform_size: 64,
            samplers: &[],
        })
        .unwrap()
    }

    fn batch(d: &mut HeadlessDispatcher, max_quads: u32) -> QuadBatch {
        let program = sprite_shader(d);
        let mut batch = QuadBatch::new(d, QuadBatchConfig { max_quads, ..Default::default() })
            .unwrap();
        batch.setup().add_shader(program).unwrap();
        batch
    }

    #[test]
    fn sprite_vertex_matches_layout() {
        assert_eq!(std::mem::size_of::<SpriteVertex>(), 24);
        assert_eq!(SpriteVertex::layout().stride(), 24);
    }

    #[test]
    fn sprite_corners_follow_center_and_size() {
        let v = Sprite::new([10.0, 20.0], [4.0, 2.0], [255; 4]).vertices();
        assert_eq!(v[0].position, [8.0, 19.0, 0.0]);
        assert_eq!(v[2].position, [12.0, 21.0, 0.0]);
        assert_eq!(v[3].uv, [1.0, 0.0]);
    }

    #[test]
    fn full_batches_flush_automatically() {
        let mut d = HeadlessDispatcher::new();
        let mut batch = batch(&mut d, 2);

        d.begin_frame().unwrap();
        for i in 0..5 {
            let s = Sprite::new([i as f32, 0.0], [1.0, 1.0], [255, 0, 0, 255]);
            batch.push(&mut d, &s).unwrap();
        }
        assert_eq!(batch.flushes(), 2);
        assert_eq!(batch.pending_quads(), 1);

        let report = batch.flush(&mut d).unwrap();
        assert!(report.is_ok());
        // shader + draw per batch
        assert_eq!(report.executed, 6);

        let stats = d.stats();
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.vertices, 8 + 8 + 4);
        assert_eq!(stats.indices, 12 + 12 + 6);
        assert_eq!(batch.setup().len(), 1);

        batch.destroy(&mut d).unwrap();
    }

    #[test]
    fn each_batch_restarts_index_base() {
        let mut d = HeadlessDispatcher::new();
        let mut batch = batch(&mut d, 1);
        let s = Sprite::new([0.0, 0.0], [1.0, 1.0], [0; 4]);
        batch.push(&mut d, &s).unwrap();
        batch.push(&mut d, &s).unwrap();
        batch.flush(&mut d).unwrap();

        let handle = batch.staging.handle().unwrap();
        let (_, indices) = d.buffer_contents(handle).unwrap();
        assert_eq!(indices, &QUAD_INDICES);
        batch.destroy(&mut d).unwrap();
    }

    #[test]
    fn empty_flush_draws_nothing() {
        let mut d = HeadlessDispatcher::new();
        let mut batch = batch(&mut d, 4);
        let report = batch.flush(&mut d).unwrap();
        assert_eq!(report, PlaybackReport::default());
        assert_eq!(batch.flushes(), 0);
        batch.destroy(&mut d).unwrap();
    }

    #[test]
    fn failed_flush_drops_the_batch_and_recovers() {
        let mut d = HeadlessDispatcher::new();
        let program = sprite_shader(&mut d);
        let config = QuadBatchConfig {
            max_quads: 1,
            setup: RecorderConfig { max_bytes: 256, max_commands: 1 },
        };
        let mut batch = QuadBatch::new(&mut d, config).unwrap();
        // Leaves no record slot for the draw.
        batch.setup().add_shader(program).unwrap();
        let s = Sprite::new([0.0, 0.0], [1.0, 1.0], [0; 4]);

        d.begin_frame().unwrap();
        batch.push(&mut d, &s).unwrap();
        assert_eq!(
            batch.push(&mut d, &s),
            Err(BatchError::Record(RecordError::StreamFull { capacity: 1 }))
        );
        assert_eq!(batch.pending_quads(), 0);
        assert_eq!(batch.flushes(), 0);
        assert_eq!(batch.setup().len(), 1);

        batch.push(&mut d, &s).unwrap();
        assert_eq!(batch.pending_quads(), 1);
        assert_eq!(d.stats().draw_calls, 0);
        batch.destroy(&mut d).unwrap();
    }

    #[test]
    fn zero_capacity_batch_rejects_sprites() {
        let mut d = HeadlessDispatcher::new();
        let mut batch = batch(&mut d, 0);
        let s = Sprite::new([0.0, 0.0], [1.0, 1.0], [0; 4]);
        assert!(matches!(
            batch.push(&mut d, &s),
            Err(BatchError::Staging(StagingError::VertexOverflow { .. }))
        ));
        batch.destroy(&mut d).unwrap();
    }
}
