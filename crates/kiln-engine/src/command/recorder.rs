use std::fmt;

use crate::backend::{CommandDispatcher, GpuBufferHandle, ShaderHandle, TextureHandle};
use crate::stream::{BinaryCursor, SeekFrom, StreamError};

use super::payload::{
    BlendFuncCmd, ClearCmd, ClearColorCmd, ClearDepthCmd, Command, CullModeCmd, DrawCallCmd,
    Payload, PixelRect, Sampler2DCmd, SamplerBinding, SamplerCubeCmd, ScissorCmd, ShaderCmd,
    StateCmd, Uniform1iCmd, Uniform3fCmd, Uniform4fCmd, UniformMatrix4Cmd, ViewportCmd,
};
use super::state::{BlendFactor, ClearFlags, CullFace, RenderState};
use super::table::DispatchError;
use super::opcode::Opcode;

/// Recorder capacity.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Payload buffer size in bytes.
    pub max_bytes: usize,
    /// Maximum number of recorded commands.
    pub max_commands: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_bytes: 32 * 1024,
            max_commands: 32 * 1024,
        }
    }
}

/// One recorded command: opcode + where its payload starts.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CommandRecord {
    pub opcode: Opcode,
    pub payload_offset: usize,
}

/// Position in a recorder, captured by [`CommandRecorder::save_offset`].
///
/// Holds both the payload byte offset and the record count, so loading it
/// drops every command recorded after the save.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StreamOffset {
    bytes: usize,
    records: usize,
}

impl StreamOffset {
    #[inline]
    pub fn bytes(self) -> usize {
        self.bytes
    }

    #[inline]
    pub fn records(self) -> usize {
        self.records
    }
}

/// Lifecycle of a recorder.
///
/// `Idle → Recording → Ready → Playing → Ready … → Idle (rewind)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecorderState {
    /// Nothing recorded since construction or the last rewind.
    Idle,
    /// Commands were added since the last playback.
    Recording,
    /// Every recorded command has been played at least once.
    Ready,
    /// A playback pass is running.
    Playing,
}

/// Recording failure. The recorder is left exactly as before the call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// The command table is full.
    StreamFull { capacity: usize },
    /// The payload did not fit in the byte buffer (or failed to encode).
    Stream(StreamError),
    /// `UniformMatrix4` supports at most 255 matrices per command.
    TooManyMatrices { count: usize },
    /// The offset does not belong to the current recording.
    StaleOffset { offset: StreamOffset, len: usize },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamFull { capacity } => {
                write!(f, "command stream full ({capacity} commands)")
            }
            Self::Stream(e) => write!(f, "command payload: {e}"),
            Self::TooManyMatrices { count } => write!(
                f,
                "{count} matrices in one uniform command (max {})",
                UniformMatrix4Cmd::MAX_MATRICES
            ),
            Self::StaleOffset { offset, len } => write!(
                f,
                "offset ({} records, {} bytes) is past the current recording ({len} records)",
                offset.records, offset.bytes
            ),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<StreamError> for RecordError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

/// A command that failed during playback.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandError {
    /// Index of the command in the recorder.
    pub index: usize,
    pub opcode: Opcode,
    pub error: DispatchError,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command #{} ({}): {}", self.index, self.opcode, self.error)
    }
}

impl std::error::Error for CommandError {}

/// Outcome of one playback pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    /// Commands that ran without error.
    pub executed: usize,
    pub errors: Vec<CommandError>,
}

impl PlaybackReport {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Records typed commands into a flat byte buffer for later playback.
///
/// Memory is allocated once at construction. `rewind` resets the counters and
/// keeps the allocation, so a recorder can be reused every frame.
///
/// Typical flush loop (setup recorded once, replayed before every batch):
///
/// ```ignore
/// rec.add_shader(shader)?;
/// rec.add_uniform_matrix4(0, &[projection])?;
/// let setup = rec.save_offset();
/// for batch in batches {
///     rec.add_draw_call(batch.handle())?;
///     rec.run_commands(dispatcher);
///     rec.load_offset(setup)?;
/// }
/// ```
#[derive(Debug)]
pub struct CommandRecorder {
    cursor: BinaryCursor<Box<[u8]>>,
    records: Vec<CommandRecord>,
    max_commands: usize,
    state: RecorderState,
}

impl CommandRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            cursor: BinaryCursor::new(vec![0u8; config.max_bytes].into_boxed_slice()),
            records: Vec::with_capacity(config.max_commands),
            max_commands: config.max_commands,
            state: RecorderState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> RecorderState {
        self.state
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_commands
    }

    /// Payload bytes written so far.
    #[inline]
    pub fn bytes_used(&self) -> usize {
        self.cursor.offset()
    }

    #[inline]
    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    /// Resets to an empty recording. The buffer is kept and overwritten.
    pub fn rewind(&mut self) {
        self.cursor.rewind();
        self.records.clear();
        self.state = RecorderState::Idle;
    }

    /// Captures the current position for a later [`load_offset`](Self::load_offset).
    #[inline]
    pub fn save_offset(&self) -> StreamOffset {
        StreamOffset {
            bytes: self.cursor.offset(),
            records: self.records.len(),
        }
    }

    /// Returns to a saved position.
    ///
    /// Commands recorded after the save are dropped and their payload bytes
    /// will be overwritten. Commands before it stay and are replayed by the
    /// next `run_commands`.
    pub fn load_offset(&mut self, offset: StreamOffset) -> Result<(), RecordError> {
        let valid = offset.records <= self.records.len()
            && offset.bytes <= self.cursor.offset()
            && self
                .records
                .get(offset.records)
                .is_none_or(|r| r.payload_offset >= offset.bytes);
        if !valid {
            return Err(RecordError::StaleOffset { offset, len: self.records.len() });
        }

        self.records.truncate(offset.records);
        self.cursor.seek(SeekFrom::Start(offset.bytes as u64))?;
        if self.records.is_empty() {
            self.state = RecorderState::Idle;
        }
        Ok(())
    }

    /// Records one command.
    ///
    /// The opcode is taken from the payload type, and the payload is encoded
    /// by the same type the dispatcher decodes with. On failure nothing is
    /// recorded.
    pub fn add_command<P: Payload>(&mut self, payload: &P) -> Result<CommandRecord, RecordError> {
        self.push_with(P::OPCODE, |out| payload.encode(out))
    }

    fn push_with<F>(&mut self, opcode: Opcode, encode: F) -> Result<CommandRecord, RecordError>
    where
        F: FnOnce(&mut BinaryCursor<Box<[u8]>>) -> Result<(), StreamError>,
    {
        if self.records.len() >= self.max_commands {
            log::warn!(
                "command stream full ({} commands); dropping {opcode}",
                self.max_commands
            );
            return Err(RecordError::StreamFull { capacity: self.max_commands });
        }

        let start = self.cursor.offset();
        if let Err(e) = encode(&mut self.cursor) {
            // Drop any partial payload.
            self.cursor.seek(SeekFrom::Start(start as u64))?;
            log::warn!("failed to record {opcode}: {e}");
            return Err(RecordError::Stream(e));
        }

        let record = CommandRecord { opcode, payload_offset: start };
        self.records.push(record);
        self.state = RecorderState::Recording;
        Ok(record)
    }

    // ── per-opcode helpers ────────────────────────────────────────────────

    pub fn add_shader(&mut self, shader: ShaderHandle) -> Result<CommandRecord, RecordError> {
        self.add_command(&ShaderCmd { shader })
    }

    pub fn add_uniform_matrix4(
        &mut self,
        location: i32,
        matrices: &[[f32; 16]],
    ) -> Result<CommandRecord, RecordError> {
        if matrices.len() > UniformMatrix4Cmd::MAX_MATRICES {
            return Err(RecordError::TooManyMatrices { count: matrices.len() });
        }
        self.push_with(Opcode::UniformMatrix4, |out| {
            UniformMatrix4Cmd::encode_parts(location, matrices, out)
        })
    }

    pub fn add_uniform1i(&mut self, location: i32, value: i32) -> Result<CommandRecord, RecordError> {
        self.add_command(&Uniform1iCmd { location, value })
    }

    pub fn add_uniform3f(
        &mut self,
        location: i32,
        value: [f32; 3],
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&Uniform3fCmd { location, value })
    }

    pub fn add_uniform4f(
        &mut self,
        location: i32,
        value: [f32; 4],
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&Uniform4fCmd { location, value })
    }

    pub fn add_sampler2d(
        &mut self,
        location: i32,
        unit: u32,
        texture: TextureHandle,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&Sampler2DCmd(SamplerBinding { location, unit, texture }))
    }

    pub fn add_sampler_cube(
        &mut self,
        location: i32,
        unit: u32,
        texture: TextureHandle,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&SamplerCubeCmd(SamplerBinding { location, unit, texture }))
    }

    pub fn add_clear(&mut self, flags: ClearFlags) -> Result<CommandRecord, RecordError> {
        self.add_command(&ClearCmd { flags })
    }

    pub fn add_clearcolor(
        &mut self,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&ClearColorCmd { rgba: [r, g, b, a] })
    }

    pub fn add_cleardepth(&mut self, depth: f32) -> Result<CommandRecord, RecordError> {
        self.add_command(&ClearDepthCmd { depth })
    }

    pub fn add_cullmode(&mut self, face: CullFace) -> Result<CommandRecord, RecordError> {
        self.add_command(&CullModeCmd { face })
    }

    pub fn add_viewport(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&ViewportCmd(PixelRect::new(x, y, width, height)))
    }

    pub fn add_draw_call(&mut self, buffer: GpuBufferHandle) -> Result<CommandRecord, RecordError> {
        self.add_command(&DrawCallCmd { buffer })
    }

    pub fn add_scissor(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&ScissorCmd(PixelRect::new(x, y, width, height)))
    }

    pub fn add_state(
        &mut self,
        state: RenderState,
        enabled: bool,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&StateCmd { state, enabled })
    }

    pub fn add_blendfunc(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<CommandRecord, RecordError> {
        self.add_command(&BlendFuncCmd { src, dst })
    }

    // ── playback ──────────────────────────────────────────────────────────

    /// Runs every recorded command, in order, through the dispatcher's run
    /// table. A failing command is reported and skipped.
    pub fn run_commands(&mut self, dispatcher: &mut dyn CommandDispatcher) -> PlaybackReport {
        self.play(dispatcher, Pass::Run)
    }

    /// Runs the post (cleanup) entry of every recorded command, in the same
    /// order as [`run_commands`](Self::run_commands).
    pub fn run_post_commands(&mut self, dispatcher: &mut dyn CommandDispatcher) -> PlaybackReport {
        self.play(dispatcher, Pass::Post)
    }

    fn play(&mut self, dispatcher: &mut dyn CommandDispatcher, pass: Pass) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        if self.records.is_empty() {
            return report;
        }

        self.state = RecorderState::Playing;

        // Separate read cursor; the write position is untouched.
        let mut reader = BinaryCursor::new(self.cursor.written());

        for (index, record) in self.records.iter().enumerate() {
            let result = reader
                .seek(SeekFrom::Start(record.payload_offset as u64))
                .map_err(DispatchError::from)
                .and_then(|_| match pass {
                    Pass::Run => dispatcher.run_command(record.opcode, &mut reader),
                    Pass::Post => dispatcher.post_command(record.opcode, &mut reader),
                });

            match result {
                Ok(()) => {
                    log::trace!("{} #{index} {}", pass.name(), record.opcode);
                    report.executed += 1;
                }
                Err(error) => {
                    let err = CommandError { index, opcode: record.opcode, error };
                    log::warn!("{} {err}", pass.name());
                    report.errors.push(err);
                }
            }
        }

        self.state = RecorderState::Ready;
        report
    }

    /// Decodes every recorded command into its tagged form.
    pub fn decode_all(&self) -> Result<Vec<Command>, StreamError> {
        let mut reader = BinaryCursor::new(self.cursor.written());
        self.records
            .iter()
            .map(|record| {
                reader.seek(SeekFrom::Start(record.payload_offset as u64))?;
                Command::decode(record.opcode, &mut reader)
            })
            .collect()
    }
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

#[derive(Copy, Clone)]
enum Pass {
    Run,
    Post,
}

impl Pass {
    fn name(self) -> &'static str {
        match self {
            Pass::Run => "run",
            Pass::Post => "post",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::command::testing::{Call, TraceDispatcher};

    fn small(max_bytes: usize, max_commands: usize) -> CommandRecorder {
        CommandRecorder::new(RecorderConfig { max_bytes, max_commands })
    }

    // ── recording ─────────────────────────────────────────────────────────

    #[test]
    fn offsets_are_monotonic() {
        let mut rec = CommandRecorder::default();
        rec.add_clearcolor(0.0, 0.0, 0.0, 1.0).unwrap();
        rec.add_clear(ClearFlags::COLOR).unwrap();
        rec.add_viewport(0, 0, 10, 10).unwrap();

        let offsets: Vec<usize> = rec.records().iter().map(|r| r.payload_offset).collect();
        assert_eq!(offsets, vec![0, 16, 20]);
        assert_eq!(rec.bytes_used(), 36);
        assert_eq!(rec.state(), RecorderState::Recording);
    }

    #[test]
    fn full_command_table_is_reported() {
        let mut rec = small(1024, 2);
        rec.add_cleardepth(1.0).unwrap();
        rec.add_cleardepth(1.0).unwrap();
        assert_eq!(
            rec.add_cleardepth(1.0).unwrap_err(),
            RecordError::StreamFull { capacity: 2 }
        );
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn payload_overflow_leaves_recorder_untouched() {
        let mut rec = small(20, 16);
        rec.add_viewport(0, 0, 1, 1).unwrap();
        let before = rec.bytes_used();

        let err = rec.add_viewport(0, 0, 2, 2).unwrap_err();
        assert!(matches!(err, RecordError::Stream(StreamError::OutOfBounds { .. })));
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.bytes_used(), before);

        // Something that does fit still records.
        rec.add_clear(ClearFlags::DEPTH).unwrap();
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn too_many_matrices_rejected() {
        let mut rec = CommandRecorder::new(RecorderConfig { max_bytes: 1 << 20, max_commands: 4 });
        let many = vec![[0.0f32; 16]; 256];
        assert_eq!(
            rec.add_uniform_matrix4(0, &many).unwrap_err(),
            RecordError::TooManyMatrices { count: 256 }
        );
        assert!(rec.is_empty());
    }

    #[test]
    fn rewind_resets_without_shrinking() {
        let mut rec = CommandRecorder::default();
        rec.add_cleardepth(0.5).unwrap();
        rec.rewind();
        assert!(rec.is_empty());
        assert_eq!(rec.bytes_used(), 0);
        assert_eq!(rec.state(), RecorderState::Idle);
        assert_eq!(rec.capacity(), RecorderConfig::default().max_commands);
    }

    // ── playback ──────────────────────────────────────────────────────────

    #[test]
    fn frame_setup_plays_back_in_order_with_literal_arguments() {
        let mut rec = CommandRecorder::default();
        let handle = GpuBufferHandle::from_raw(0x1_0000_0007);
        rec.add_clearcolor(0.0, 0.0, 0.0, 1.0).unwrap();
        rec.add_clear(ClearFlags::COLOR | ClearFlags::DEPTH).unwrap();
        rec.add_viewport(0, 0, 800, 600).unwrap();
        rec.add_draw_call(handle).unwrap();

        let mut trace = TraceDispatcher::default();
        let report = rec.run_commands(&mut trace);

        assert!(report.is_ok());
        assert_eq!(report.executed, 4);
        assert_eq!(
            trace.calls,
            vec![
                Call::Run(Command::ClearColor(ClearColorCmd { rgba: [0.0, 0.0, 0.0, 1.0] })),
                Call::Run(Command::Clear(ClearCmd { flags: ClearFlags::COLOR | ClearFlags::DEPTH })),
                Call::Run(Command::Viewport(PixelRect::new(0, 0, 800, 600))),
                Call::Run(Command::DrawCall(DrawCallCmd { buffer: handle })),
            ]
        );
        assert_eq!(rec.state(), RecorderState::Ready);
    }

    #[test]
    fn every_opcode_round_trips_through_playback() {
        let mut rec = CommandRecorder::default();
        let tex = TextureHandle::from_raw(3);
        rec.add_shader(ShaderHandle::from_raw(9)).unwrap();
        rec.add_uniform_matrix4(64, &[[1.0; 16]]).unwrap();
        rec.add_uniform1i(4, -2).unwrap();
        rec.add_uniform3f(16, [1.0, 2.0, 3.0]).unwrap();
        rec.add_uniform4f(32, [4.0, 3.0, 2.0, 1.0]).unwrap();
        rec.add_sampler2d(0, 1, tex).unwrap();
        rec.add_sampler_cube(1, 2, tex).unwrap();
        rec.add_clear(ClearFlags::DEPTH).unwrap();
        rec.add_clearcolor(0.1, 0.2, 0.3, 0.4).unwrap();
        rec.add_cleardepth(1.0).unwrap();
        rec.add_cullmode(CullFace::Front).unwrap();
        rec.add_viewport(1, 2, 3, 4).unwrap();
        rec.add_draw_call(GpuBufferHandle::from_raw(5)).unwrap();
        rec.add_scissor(5, 6, 7, 8).unwrap();
        rec.add_state(RenderState::Blend, true).unwrap();
        rec.add_blendfunc(BlendFactor::One, BlendFactor::Zero).unwrap();

        let recorded = rec.decode_all().unwrap();
        let opcodes: Vec<Opcode> = recorded.iter().map(Command::opcode).collect();
        assert_eq!(opcodes, Opcode::ALL.to_vec());

        let mut trace = TraceDispatcher::default();
        assert!(rec.run_commands(&mut trace).is_ok());
        let played: Vec<Command> = trace.calls.into_iter().map(Call::into_command).collect();
        assert_eq!(played, recorded);
    }

    #[test]
    fn post_pass_uses_same_order() {
        let mut rec = CommandRecorder::default();
        let tex = TextureHandle::from_raw(1);
        rec.add_shader(ShaderHandle::from_raw(2)).unwrap();
        rec.add_sampler2d(0, 0, tex).unwrap();

        let mut trace = TraceDispatcher::default();
        rec.run_commands(&mut trace);
        rec.run_post_commands(&mut trace);

        let kinds: Vec<(bool, Opcode)> = trace
            .calls
            .iter()
            .map(|c| (matches!(c, Call::Post(_)), c.command().opcode()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (false, Opcode::Shader),
                (false, Opcode::SamplerBind2D),
                (true, Opcode::Shader),
                (true, Opcode::SamplerBind2D),
            ]
        );
    }

    #[test]
    fn failing_command_does_not_stop_playback() {
        let mut rec = CommandRecorder::default();
        rec.add_viewport(0, 0, 1, 1).unwrap();
        rec.add_draw_call(GpuBufferHandle::NULL).unwrap();
        rec.add_clear(ClearFlags::COLOR).unwrap();

        let mut trace = TraceDispatcher { reject_null_draws: true, ..Default::default() };
        let report = rec.run_commands(&mut trace);

        assert_eq!(report.executed, 2);
        assert_eq!(report.errors.len(), 1);
        let err = &report.errors[0];
        assert_eq!(err.index, 1);
        assert_eq!(err.opcode, Opcode::DrawCall);
        assert!(matches!(
            err.error,
            DispatchError::Backend(BackendError::InvalidHandle { .. })
        ));
        assert_eq!(trace.calls.len(), 2);
    }

    #[test]
    fn playback_does_not_move_write_position() {
        let mut rec = CommandRecorder::default();
        rec.add_cleardepth(1.0).unwrap();
        rec.add_cleardepth(0.0).unwrap();
        let used = rec.bytes_used();

        rec.run_commands(&mut TraceDispatcher::default());
        assert_eq!(rec.bytes_used(), used);

        rec.add_cleardepth(0.5).unwrap();
        assert_eq!(rec.records()[2].payload_offset, used);
    }

    // ── replay ────────────────────────────────────────────────────────────

    #[test]
    fn setup_prefix_replays_identically() {
        let mut rec = CommandRecorder::default();
        rec.add_shader(ShaderHandle::from_raw(11)).unwrap();
        rec.add_uniform4f(0, [1.0, 0.5, 0.25, 1.0]).unwrap();
        let setup = rec.save_offset();

        let mut first = TraceDispatcher::default();
        rec.add_draw_call(GpuBufferHandle::from_raw(1)).unwrap();
        rec.run_commands(&mut first);
        rec.load_offset(setup).unwrap();

        let mut second = TraceDispatcher::default();
        rec.add_draw_call(GpuBufferHandle::from_raw(2)).unwrap();
        rec.run_commands(&mut second);
        rec.load_offset(setup).unwrap();

        assert_eq!(first.calls.len(), 3);
        assert_eq!(second.calls.len(), 3);
        assert_eq!(first.calls[..2], second.calls[..2]);
        assert_eq!(
            second.calls[2],
            Call::Run(Command::DrawCall(DrawCallCmd { buffer: GpuBufferHandle::from_raw(2) }))
        );
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn load_then_run_reproduces_same_invocations() {
        let mut rec = CommandRecorder::default();
        rec.add_viewport(0, 0, 64, 64).unwrap();
        let mark = rec.save_offset();
        rec.add_state(RenderState::DepthTest, false).unwrap();

        let mut a = TraceDispatcher::default();
        rec.run_commands(&mut a);

        // Loading the end-of-stream offset changes nothing.
        let end = rec.save_offset();
        rec.load_offset(end).unwrap();
        let mut b = TraceDispatcher::default();
        rec.run_commands(&mut b);
        assert_eq!(a.calls, b.calls);

        rec.load_offset(mark).unwrap();
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn offset_from_before_rewind_is_stale() {
        let mut rec = CommandRecorder::default();
        rec.add_cleardepth(1.0).unwrap();
        rec.add_cleardepth(1.0).unwrap();
        let mark = rec.save_offset();
        rec.rewind();
        assert!(matches!(rec.load_offset(mark), Err(RecordError::StaleOffset { .. })));
    }
}
