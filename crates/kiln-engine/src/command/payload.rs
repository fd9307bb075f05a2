//! Typed command payloads.
//!
//! Each opcode has exactly one payload struct. The struct's `encode` and
//! `decode` are the only definition of that opcode's byte layout, and the
//! dispatcher jump tables are built from the same types, so a recorder call
//! site and a backend handler cannot disagree about argument order or size.

use crate::backend::{BackendError, GpuBufferHandle, ShaderHandle, TextureHandle};
use crate::stream::{BinaryCursor, StreamError};

use super::state::{BlendFactor, ClearFlags, CullFace, RenderState};
use super::table::CommandHandlers;
use super::opcode::Opcode;

/// A command argument block that can be written to and read back from a
/// command stream.
pub trait Payload: Sized {
    const OPCODE: Opcode;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(
        &self,
        out: &mut BinaryCursor<B>,
    ) -> Result<(), StreamError>;

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError>;

    /// Performs the command against a backend.
    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError>;

    /// Undoes side effects of `run` (e.g. unbinding a texture). Most commands
    /// have nothing to undo.
    fn post<H: CommandHandlers + ?Sized>(&self, _h: &mut H) -> Result<(), BackendError> {
        Ok(())
    }
}

// ── shader + uniforms ─────────────────────────────────────────────────────

/// Binds a shader program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderCmd {
    pub shader: ShaderHandle,
}

impl Payload for ShaderCmd {
    const OPCODE: Opcode = Opcode::Shader;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.shader)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { shader: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.shader(self)
    }

    fn post<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.post_shader(self)
    }
}

/// Column-major 4x4 matrices written to consecutive uniform slots.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformMatrix4Cmd {
    pub location: i32,
    pub matrices: Vec<[f32; 16]>,
}

impl UniformMatrix4Cmd {
    /// The count travels as a single byte.
    pub const MAX_MATRICES: usize = u8::MAX as usize;

    /// Encodes without building an owned command, so recording borrowed
    /// matrices does not allocate.
    pub(crate) fn encode_parts<B: AsRef<[u8]> + AsMut<[u8]>>(
        location: i32,
        matrices: &[[f32; 16]],
        out: &mut BinaryCursor<B>,
    ) -> Result<(), StreamError> {
        let count = u8::try_from(matrices.len()).map_err(|_| StreamError::InvalidValue {
            what: "matrix count",
            raw: matrices.len() as u32,
        })?;
        out.write(&location)?;
        out.write(&count)?;
        out.write_bytes(bytemuck::cast_slice(matrices))
    }
}

impl Payload for UniformMatrix4Cmd {
    const OPCODE: Opcode = Opcode::UniformMatrix4;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        Self::encode_parts(self.location, &self.matrices, out)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        let location = input.read()?;
        let count: u8 = input.read()?;
        let mut matrices = Vec::with_capacity(count as usize);
        for _ in 0..count {
            matrices.push(input.read::<[f32; 16]>()?);
        }
        Ok(Self { location, matrices })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.uniform_matrix4(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Uniform1iCmd {
    pub location: i32,
    pub value: i32,
}

impl Payload for Uniform1iCmd {
    const OPCODE: Opcode = Opcode::Uniform1i;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.location)?;
        out.write(&self.value)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { location: input.read()?, value: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.uniform1i(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Uniform3fCmd {
    pub location: i32,
    pub value: [f32; 3],
}

impl Payload for Uniform3fCmd {
    const OPCODE: Opcode = Opcode::Uniform3f;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.location)?;
        out.write(&self.value)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { location: input.read()?, value: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.uniform3f(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Uniform4fCmd {
    pub location: i32,
    pub value: [f32; 4],
}

impl Payload for Uniform4fCmd {
    const OPCODE: Opcode = Opcode::Uniform4f;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.location)?;
        out.write(&self.value)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { location: input.read()?, value: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.uniform4f(self)
    }
}

// ── samplers ──────────────────────────────────────────────────────────────

/// Binds a texture to a sampler unit. Shared by the 2D and cube opcodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub location: i32,
    pub unit: u32,
    pub texture: TextureHandle,
}

impl SamplerBinding {
    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.location)?;
        out.write(&self.unit)?;
        out.write(&self.texture)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self {
            location: input.read()?,
            unit: input.read()?,
            texture: input.read()?,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Sampler2DCmd(pub SamplerBinding);

impl Payload for Sampler2DCmd {
    const OPCODE: Opcode = Opcode::SamplerBind2D;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        self.0.encode(out)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        SamplerBinding::decode(input).map(Self)
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.sampler_2d(&self.0)
    }

    fn post<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.post_sampler_2d(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SamplerCubeCmd(pub SamplerBinding);

impl Payload for SamplerCubeCmd {
    const OPCODE: Opcode = Opcode::SamplerBindCube;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        self.0.encode(out)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        SamplerBinding::decode(input).map(Self)
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.sampler_cube(&self.0)
    }

    fn post<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.post_sampler_cube(&self.0)
    }
}

// ── clears ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClearCmd {
    pub flags: ClearFlags,
}

impl Payload for ClearCmd {
    const OPCODE: Opcode = Opcode::Clear;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.flags.bits())
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { flags: ClearFlags::decode(input.read()?)? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.clear(self)
    }
}

/// Straight RGBA in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearColorCmd {
    pub rgba: [f32; 4],
}

impl Payload for ClearColorCmd {
    const OPCODE: Opcode = Opcode::ClearColor;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.rgba)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { rgba: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.clear_color(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearDepthCmd {
    pub depth: f32,
}

impl Payload for ClearDepthCmd {
    const OPCODE: Opcode = Opcode::ClearDepth;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.depth)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { depth: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.clear_depth(self)
    }
}

// ── fixed-function state ──────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CullModeCmd {
    pub face: CullFace,
}

impl Payload for CullModeCmd {
    const OPCODE: Opcode = Opcode::CullMode;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&(self.face as u32))
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { face: CullFace::decode(input.read()?)? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.cull_mode(self)
    }
}

/// Pixel rectangle, origin at the top-left of the render target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&[self.x, self.y, self.width, self.height])
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        let [x, y, width, height] = input.read::<[i32; 4]>()?;
        Ok(Self { x, y, width, height })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ViewportCmd(pub PixelRect);

impl Payload for ViewportCmd {
    const OPCODE: Opcode = Opcode::Viewport;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        self.0.encode(out)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        PixelRect::decode(input).map(Self)
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.viewport(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScissorCmd(pub PixelRect);

impl Payload for ScissorCmd {
    const OPCODE: Opcode = Opcode::Scissor;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        self.0.encode(out)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        PixelRect::decode(input).map(Self)
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.scissor(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StateCmd {
    pub state: RenderState,
    pub enabled: bool,
}

impl Payload for StateCmd {
    const OPCODE: Opcode = Opcode::StateToggle;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&[self.state as u32, self.enabled as u32])
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        let [state, enabled] = input.read::<[u32; 2]>()?;
        let enabled = match enabled {
            0 => false,
            1 => true,
            raw => return Err(StreamError::InvalidValue { what: "state enable flag", raw }),
        };
        Ok(Self { state: RenderState::decode(state)?, enabled })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.state(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlendFuncCmd {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl Payload for BlendFuncCmd {
    const OPCODE: Opcode = Opcode::BlendFunc;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&[self.src as u32, self.dst as u32])
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        let [src, dst] = input.read::<[u32; 2]>()?;
        Ok(Self {
            src: BlendFactor::decode(src)?,
            dst: BlendFactor::decode(dst)?,
        })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.blend_func(self)
    }
}

// ── draw ──────────────────────────────────────────────────────────────────

/// Draws the vertices/indices most recently uploaded to `buffer`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawCallCmd {
    pub buffer: GpuBufferHandle,
}

impl Payload for DrawCallCmd {
    const OPCODE: Opcode = Opcode::DrawCall;

    fn encode<B: AsRef<[u8]> + AsMut<[u8]>>(&self, out: &mut BinaryCursor<B>) -> Result<(), StreamError> {
        out.write(&self.buffer)
    }

    fn decode<B: AsRef<[u8]>>(input: &mut BinaryCursor<B>) -> Result<Self, StreamError> {
        Ok(Self { buffer: input.read()? })
    }

    fn run<H: CommandHandlers + ?Sized>(&self, h: &mut H) -> Result<(), BackendError> {
        h.draw_call(self)
    }
}

// ── tagged form ───────────────────────────────────────────────────────────

/// Any decoded command.
///
/// Used for inspection and tracing; recording and playback go through the
/// concrete payload types.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Shader(ShaderCmd),
    UniformMatrix4(UniformMatrix4Cmd),
    Uniform1i(Uniform1iCmd),
    Uniform3f(Uniform3fCmd),
    Uniform4f(Uniform4fCmd),
    SamplerBind2D(SamplerBinding),
    SamplerBindCube(SamplerBinding),
    Clear(ClearCmd),
    ClearColor(ClearColorCmd),
    ClearDepth(ClearDepthCmd),
    CullMode(CullModeCmd),
    Viewport(PixelRect),
    DrawCall(DrawCallCmd),
    Scissor(PixelRect),
    StateToggle(StateCmd),
    BlendFunc(BlendFuncCmd),
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Shader(_) => Opcode::Shader,
            Command::UniformMatrix4(_) => Opcode::UniformMatrix4,
            Command::Uniform1i(_) => Opcode::Uniform1i,
            Command::Uniform3f(_) => Opcode::Uniform3f,
            Command::Uniform4f(_) => Opcode::Uniform4f,
            Command::SamplerBind2D(_) => Opcode::SamplerBind2D,
            Command::SamplerBindCube(_) => Opcode::SamplerBindCube,
            Command::Clear(_) => Opcode::Clear,
            Command::ClearColor(_) => Opcode::ClearColor,
            Command::ClearDepth(_) => Opcode::ClearDepth,
            Command::CullMode(_) => Opcode::CullMode,
            Command::Viewport(_) => Opcode::Viewport,
            Command::DrawCall(_) => Opcode::DrawCall,
            Command::Scissor(_) => Opcode::Scissor,
            Command::StateToggle(_) => Opcode::StateToggle,
            Command::BlendFunc(_) => Opcode::BlendFunc,
        }
    }

    /// Decodes the payload of `opcode` at the cursor's offset.
    pub fn decode<B: AsRef<[u8]>>(
        opcode: Opcode,
        input: &mut BinaryCursor<B>,
    ) -> Result<Self, StreamError> {
        Ok(match opcode {
            Opcode::Shader => Command::Shader(ShaderCmd::decode(input)?),
            Opcode::UniformMatrix4 => Command::UniformMatrix4(UniformMatrix4Cmd::decode(input)?),
            Opcode::Uniform1i => Command::Uniform1i(Uniform1iCmd::decode(input)?),
            Opcode::Uniform3f => Command::Uniform3f(Uniform3fCmd::decode(input)?),
            Opcode::Uniform4f => Command::Uniform4f(Uniform4fCmd::decode(input)?),
            Opcode::SamplerBind2D => Command::SamplerBind2D(Sampler2DCmd::decode(input)?.0),
            Opcode::SamplerBindCube => Command::SamplerBindCube(SamplerCubeCmd::decode(input)?.0),
            Opcode::Clear => Command::Clear(ClearCmd::decode(input)?),
            Opcode::ClearColor => Command::ClearColor(ClearColorCmd::decode(input)?),
            Opcode::ClearDepth => Command::ClearDepth(ClearDepthCmd::decode(input)?),
            Opcode::CullMode => Command::CullMode(CullModeCmd::decode(input)?),
            Opcode::Viewport => Command::Viewport(ViewportCmd::decode(input)?.0),
            Opcode::DrawCall => Command::DrawCall(DrawCallCmd::decode(input)?),
            Opcode::Scissor => Command::Scissor(ScissorCmd::decode(input)?.0),
            Opcode::StateToggle => Command::StateToggle(StateCmd::decode(input)?),
            Opcode::BlendFunc => Command::BlendFunc(BlendFuncCmd::decode(input)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded<P: Payload>(p: &P) -> Vec<u8> {
        let mut c = BinaryCursor::new(vec![0u8; 2048]);
        p.encode(&mut c).unwrap();
        c.written().to_vec()
    }

    #[test]
    fn viewport_layout_is_four_i32() {
        let bytes = encoded(&ViewportCmd(PixelRect::new(1, 2, 3, 4)));
        let expected: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn matrix_payload_carries_count() {
        let cmd = UniformMatrix4Cmd { location: 64, matrices: vec![[1.0; 16], [2.0; 16]] };
        let bytes = encoded(&cmd);
        assert_eq!(bytes.len(), 4 + 1 + 2 * 64);

        let mut c = BinaryCursor::new(&bytes[..]);
        assert_eq!(UniformMatrix4Cmd::decode(&mut c).unwrap(), cmd);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn too_many_matrices_fail_to_encode() {
        let cmd = UniformMatrix4Cmd {
            location: 0,
            matrices: vec![[0.0; 16]; UniformMatrix4Cmd::MAX_MATRICES + 1],
        };
        let mut c = BinaryCursor::new(vec![0u8; 1 << 16]);
        assert!(matches!(cmd.encode(&mut c), Err(StreamError::InvalidValue { .. })));
    }

    #[test]
    fn state_enable_flag_must_be_boolean() {
        let mut c = BinaryCursor::new(vec![0u8; 8]);
        c.write(&[RenderState::Blend as u32, 7u32]).unwrap();
        c.rewind();
        assert_eq!(
            StateCmd::decode(&mut c).unwrap_err(),
            StreamError::InvalidValue { what: "state enable flag", raw: 7 }
        );
    }

    #[test]
    fn tagged_decode_matches_opcode() {
        let cmd = BlendFuncCmd { src: BlendFactor::SrcAlpha, dst: BlendFactor::OneMinusSrcAlpha };
        let bytes = encoded(&cmd);
        let mut c = BinaryCursor::new(&bytes[..]);
        let decoded = Command::decode(Opcode::BlendFunc, &mut c).unwrap();
        assert_eq!(decoded.opcode(), Opcode::BlendFunc);
        assert_eq!(decoded, Command::BlendFunc(cmd));
    }
}
