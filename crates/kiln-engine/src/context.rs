//! Explicit render context.
//!
//! Owns the active dispatcher and the frame's command recorder. Code that
//! records or draws takes a `&mut RenderContext`; there is no global backend.

use crate::backend::{
    create_dispatcher, BackendConfig, BackendError, BackendKind, BufferUsage, Capabilities,
    CommandDispatcher, DrawTopology, FrameStats,
};
use crate::command::{CommandRecorder, PlaybackReport, RecorderConfig};
use crate::geometry::{GeometryStagingBuffer, StagingError};
use crate::vertex::VertexLayout;

pub struct RenderContext {
    dispatcher: Box<dyn CommandDispatcher>,
    recorder: CommandRecorder,
}

impl RenderContext {
    pub fn new(dispatcher: Box<dyn CommandDispatcher>, recorder: RecorderConfig) -> Self {
        Self {
            dispatcher,
            recorder: CommandRecorder::new(recorder),
        }
    }

    /// Selects a backend for `capabilities` and wraps it.
    pub fn from_config(
        backend: &BackendConfig,
        capabilities: Capabilities,
        recorder: RecorderConfig,
    ) -> Result<Self, BackendError> {
        Ok(Self::new(create_dispatcher(backend, capabilities)?, recorder))
    }

    #[inline]
    pub fn kind(&self) -> BackendKind {
        self.dispatcher.kind()
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.dispatcher.stats()
    }

    #[inline]
    pub fn recorder(&mut self) -> &mut CommandRecorder {
        &mut self.recorder
    }

    #[inline]
    pub fn dispatcher(&mut self) -> &mut dyn CommandDispatcher {
        self.dispatcher.as_mut()
    }

    /// Both halves at once, for code that records and uploads in one step.
    #[inline]
    pub fn parts(&mut self) -> (&mut CommandRecorder, &mut dyn CommandDispatcher) {
        (&mut self.recorder, self.dispatcher.as_mut())
    }

    /// Rewinds the recorder and starts a backend frame.
    pub fn begin_frame(&mut self) -> Result<(), BackendError> {
        self.recorder.rewind();
        self.dispatcher.begin_frame()
    }

    /// Plays everything recorded so far.
    pub fn flush(&mut self) -> PlaybackReport {
        self.recorder.run_commands(self.dispatcher.as_mut())
    }

    /// Runs the post pass and finishes the backend frame.
    pub fn end_frame(&mut self) -> Result<PlaybackReport, BackendError> {
        let report = self.recorder.run_post_commands(self.dispatcher.as_mut());
        self.dispatcher.end_frame()?;
        Ok(report)
    }

    pub fn create_staging(
        &mut self,
        layout: VertexLayout,
        max_vertices: u32,
        max_indices: u32,
        topology: DrawTopology,
        usage: BufferUsage,
    ) -> Result<GeometryStagingBuffer, StagingError> {
        GeometryStagingBuffer::create(
            self.dispatcher.as_mut(),
            layout,
            max_vertices,
            max_indices,
            topology,
            usage,
        )
    }

    pub fn destroy_staging(&mut self, mut buffer: GeometryStagingBuffer) -> Result<(), StagingError> {
        buffer.destroy(self.dispatcher.as_mut())
    }

    pub fn into_dispatcher(self) -> Box<dyn CommandDispatcher> {
        self.dispatcher
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("backend", &self.dispatcher.kind())
            .field("recorder", &self.recorder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDispatcher;
    use crate::command::ClearFlags;

    fn headless() -> RenderContext {
        RenderContext::new(Box::new(HeadlessDispatcher::new()), RecorderConfig::default())
    }

    #[test]
    fn frame_cycle_rewinds_recorder() {
        let mut ctx = headless();
        ctx.begin_frame().unwrap();
        ctx.recorder().add_clear(ClearFlags::COLOR).unwrap();
        assert!(ctx.flush().is_ok());
        assert_eq!(ctx.stats().clears, 1);
        ctx.end_frame().unwrap();

        ctx.begin_frame().unwrap();
        assert!(ctx.recorder().is_empty());
        assert_eq!(ctx.stats(), FrameStats::default());
    }

    #[test]
    fn staging_round_trip_through_context() {
        let mut ctx = headless();
        let layout = VertexLayout::from_kinds(&[crate::vertex::AttributeKind::Float4]).unwrap();
        let buffer = ctx
            .create_staging(layout, 16, 0, DrawTopology::Points, BufferUsage::Dynamic)
            .unwrap();
        ctx.destroy_staging(buffer).unwrap();
    }
}
