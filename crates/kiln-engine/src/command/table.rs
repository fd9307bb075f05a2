use std::fmt;

use crate::backend::BackendError;
use crate::stream::{BinaryCursor, StreamError};

use super::payload::{
    BlendFuncCmd, ClearCmd, ClearColorCmd, ClearDepthCmd, CullModeCmd, DrawCallCmd, Payload,
    PixelRect, Sampler2DCmd, SamplerBinding, SamplerCubeCmd, ScissorCmd, ShaderCmd, StateCmd,
    Uniform1iCmd, Uniform3fCmd, Uniform4fCmd, UniformMatrix4Cmd, ViewportCmd,
};
use super::opcode::Opcode;

/// Per-opcode backend operations.
///
/// A backend implements this once; [`JumpTable`] turns it into opcode-indexed
/// entries that decode the payload and call the matching method.
pub trait CommandHandlers {
    fn shader(&mut self, cmd: &ShaderCmd) -> Result<(), BackendError>;
    fn uniform_matrix4(&mut self, cmd: &UniformMatrix4Cmd) -> Result<(), BackendError>;
    fn uniform1i(&mut self, cmd: &Uniform1iCmd) -> Result<(), BackendError>;
    fn uniform3f(&mut self, cmd: &Uniform3fCmd) -> Result<(), BackendError>;
    fn uniform4f(&mut self, cmd: &Uniform4fCmd) -> Result<(), BackendError>;
    fn sampler_2d(&mut self, binding: &SamplerBinding) -> Result<(), BackendError>;
    fn sampler_cube(&mut self, binding: &SamplerBinding) -> Result<(), BackendError>;
    fn clear(&mut self, cmd: &ClearCmd) -> Result<(), BackendError>;
    fn clear_color(&mut self, cmd: &ClearColorCmd) -> Result<(), BackendError>;
    fn clear_depth(&mut self, cmd: &ClearDepthCmd) -> Result<(), BackendError>;
    fn cull_mode(&mut self, cmd: &CullModeCmd) -> Result<(), BackendError>;
    fn viewport(&mut self, rect: &PixelRect) -> Result<(), BackendError>;
    fn draw_call(&mut self, cmd: &DrawCallCmd) -> Result<(), BackendError>;
    fn scissor(&mut self, rect: &PixelRect) -> Result<(), BackendError>;
    fn state(&mut self, cmd: &StateCmd) -> Result<(), BackendError>;
    fn blend_func(&mut self, cmd: &BlendFuncCmd) -> Result<(), BackendError>;

    fn post_shader(&mut self, _cmd: &ShaderCmd) -> Result<(), BackendError> {
        Ok(())
    }

    fn post_sampler_2d(&mut self, _binding: &SamplerBinding) -> Result<(), BackendError> {
        Ok(())
    }

    fn post_sampler_cube(&mut self, _binding: &SamplerBinding) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Failure of a single jump-table entry.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Payload bytes could not be decoded.
    Decode(StreamError),
    /// The backend operation failed.
    Backend(BackendError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "payload decode failed: {e}"),
            Self::Backend(e) => write!(f, "backend error: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Backend(e) => Some(e),
        }
    }
}

impl From<StreamError> for DispatchError {
    fn from(e: StreamError) -> Self {
        Self::Decode(e)
    }
}

impl From<BackendError> for DispatchError {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

/// One jump-table entry: reads its payload from the cursor and executes it.
pub type Handler<H> = fn(&mut H, &mut BinaryCursor<&[u8]>) -> Result<(), DispatchError>;

fn run_entry<H: CommandHandlers, P: Payload>(
    h: &mut H,
    cursor: &mut BinaryCursor<&[u8]>,
) -> Result<(), DispatchError> {
    let payload = P::decode(cursor)?;
    payload.run(h)?;
    Ok(())
}

fn post_entry<H: CommandHandlers, P: Payload>(
    h: &mut H,
    cursor: &mut BinaryCursor<&[u8]>,
) -> Result<(), DispatchError> {
    let payload = P::decode(cursor)?;
    payload.post(h)?;
    Ok(())
}

fn run_handler<H: CommandHandlers>(opcode: Opcode) -> Handler<H> {
    match opcode {
        Opcode::Shader => run_entry::<H, ShaderCmd>,
        Opcode::UniformMatrix4 => run_entry::<H, UniformMatrix4Cmd>,
        Opcode::Uniform1i => run_entry::<H, Uniform1iCmd>,
        Opcode::Uniform3f => run_entry::<H, Uniform3fCmd>,
        Opcode::Uniform4f => run_entry::<H, Uniform4fCmd>,
        Opcode::SamplerBind2D => run_entry::<H, Sampler2DCmd>,
        Opcode::SamplerBindCube => run_entry::<H, SamplerCubeCmd>,
        Opcode::Clear => run_entry::<H, ClearCmd>,
        Opcode::ClearColor => run_entry::<H, ClearColorCmd>,
        Opcode::ClearDepth => run_entry::<H, ClearDepthCmd>,
        Opcode::CullMode => run_entry::<H, CullModeCmd>,
        Opcode::Viewport => run_entry::<H, ViewportCmd>,
        Opcode::DrawCall => run_entry::<H, DrawCallCmd>,
        Opcode::Scissor => run_entry::<H, ScissorCmd>,
        Opcode::StateToggle => run_entry::<H, StateCmd>,
        Opcode::BlendFunc => run_entry::<H, BlendFuncCmd>,
    }
}

fn post_handler<H: CommandHandlers>(opcode: Opcode) -> Handler<H> {
    match opcode {
        Opcode::Shader => post_entry::<H, ShaderCmd>,
        Opcode::UniformMatrix4 => post_entry::<H, UniformMatrix4Cmd>,
        Opcode::Uniform1i => post_entry::<H, Uniform1iCmd>,
        Opcode::Uniform3f => post_entry::<H, Uniform3fCmd>,
        Opcode::Uniform4f => post_entry::<H, Uniform4fCmd>,
        Opcode::SamplerBind2D => post_entry::<H, Sampler2DCmd>,
        Opcode::SamplerBindCube => post_entry::<H, SamplerCubeCmd>,
        Opcode::Clear => post_entry::<H, ClearCmd>,
        Opcode::ClearColor => post_entry::<H, ClearColorCmd>,
        Opcode::ClearDepth => post_entry::<H, ClearDepthCmd>,
        Opcode::CullMode => post_entry::<H, CullModeCmd>,
        Opcode::Viewport => post_entry::<H, ViewportCmd>,
        Opcode::DrawCall => post_entry::<H, DrawCallCmd>,
        Opcode::Scissor => post_entry::<H, ScissorCmd>,
        Opcode::StateToggle => post_entry::<H, StateCmd>,
        Opcode::BlendFunc => post_entry::<H, BlendFuncCmd>,
    }
}

/// Opcode-indexed run/post handler arrays for one backend type.
pub struct JumpTable<H> {
    run: [Handler<H>; Opcode::COUNT],
    post: [Handler<H>; Opcode::COUNT],
}

impl<H: CommandHandlers> JumpTable<H> {
    pub fn new() -> Self {
        Self {
            run: std::array::from_fn(|i| run_handler::<H>(Opcode::ALL[i])),
            post: std::array::from_fn(|i| post_handler::<H>(Opcode::ALL[i])),
        }
    }
}

impl<H: CommandHandlers> Default for JumpTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> JumpTable<H> {
    #[inline]
    pub fn run(&self, opcode: Opcode) -> Handler<H> {
        self.run[opcode.index()]
    }

    #[inline]
    pub fn post(&self, opcode: Opcode) -> Handler<H> {
        self.post[opcode.index()]
    }

    /// Replaces one run entry (e.g. to turn an opcode into a no-op).
    pub fn set_run(&mut self, opcode: Opcode, handler: Handler<H>) {
        self.run[opcode.index()] = handler;
    }

    pub fn set_post(&mut self, opcode: Opcode, handler: Handler<H>) {
        self.post[opcode.index()] = handler;
    }
}

impl<H> Clone for JumpTable<H> {
    fn clone(&self) -> Self {
        Self { run: self.run, post: self.post }
    }
}

impl<H> fmt::Debug for JumpTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JumpTable").field("entries", &Opcode::COUNT).finish()
    }
}

/// Entry that consumes nothing and does nothing.
pub fn noop<H>(_h: &mut H, _cursor: &mut BinaryCursor<&[u8]>) -> Result<(), DispatchError> {
    Ok(())
}
