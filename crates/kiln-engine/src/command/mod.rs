//! Command recording and playback.
//!
//! - `CommandRecorder` writes opcode-tagged payloads into a flat byte buffer
//! - `JumpTable` maps every opcode to a decode-and-execute entry for a backend
//! - payload structs define the byte layout of each opcode

mod opcode;
mod payload;
mod recorder;
mod state;
mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use opcode::Opcode;
pub use payload::{
    BlendFuncCmd, ClearCmd, ClearColorCmd, ClearDepthCmd, Command, CullModeCmd, DrawCallCmd,
    Payload, PixelRect, Sampler2DCmd, SamplerBinding, SamplerCubeCmd, ScissorCmd, ShaderCmd,
    StateCmd, Uniform1iCmd, Uniform3fCmd, Uniform4fCmd, UniformMatrix4Cmd, ViewportCmd,
};
pub use recorder::{
    CommandError, CommandRecord, CommandRecorder, PlaybackReport, RecordError, RecorderConfig,
    RecorderState, StreamOffset,
};
pub use state::{BlendFactor, ClearFlags, CullFace, RenderState};
pub use table::{noop, CommandHandlers, DispatchError, Handler, JumpTable};
