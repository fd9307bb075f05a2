//! Dispatcher that records every decoded call, for playback tests.

use crate::backend::{
    BackendError, BackendKind, BufferUpload, CommandDispatcher, FrameStats, GpuBufferDesc, GpuBufferHandle,
    ResourceKind, ShaderDesc, ShaderHandle, TextureDesc, TextureHandle,
};
use crate::stream::BinaryCursor;

use super::{
    BlendFuncCmd, ClearCmd, ClearColorCmd, ClearDepthCmd, Command, CullModeCmd, DispatchError,
    DrawCallCmd, JumpTable, Opcode, PixelRect, SamplerBinding, ShaderCmd, StateCmd, Uniform1iCmd,
    Uniform3fCmd, Uniform4fCmd, UniformMatrix4Cmd, CommandHandlers,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Run(Command),
    Post(Command),
}

impl Call {
    pub(crate) fn command(&self) -> &Command {
        match self {
            Call::Run(c) | Call::Post(c) => c,
        }
    }

    pub(crate) fn into_command(self) -> Command {
        match self {
            Call::Run(c) | Call::Post(c) => c,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TraceDispatcher {
    pub(crate) calls: Vec<Call>,
    pub(crate) uploads: Vec<(GpuBufferHandle, Vec<u8>, Vec<u32>)>,
    pub(crate) destroyed: Vec<GpuBufferHandle>,
    pub(crate) reject_null_draws: bool,
    pub(crate) table: JumpTable<TraceDispatcher>,
    pub(crate) next_handle: u64,
}

impl TraceDispatcher {
    fn push(&mut self, cmd: Command) -> Result<(), BackendError> {
        self.calls.push(Call::Run(cmd));
        Ok(())
    }

    fn mint(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl CommandHandlers for TraceDispatcher {
    fn shader(&mut self, cmd: &ShaderCmd) -> Result<(), BackendError> {
        self.push(Command::Shader(*cmd))
    }

    fn uniform_matrix4(&mut self, cmd: &UniformMatrix4Cmd) -> Result<(), BackendError> {
        self.push(Command::UniformMatrix4(cmd.clone()))
    }

    fn uniform1i(&mut self, cmd: &Uniform1iCmd) -> Result<(), BackendError> {
        self.push(Command::Uniform1i(*cmd))
    }

    fn uniform3f(&mut self, cmd: &Uniform3fCmd) -> Result<(), BackendError> {
        self.push(Command::Uniform3f(*cmd))
    }

    fn uniform4f(&mut self, cmd: &Uniform4fCmd) -> Result<(), BackendError> {
        self.push(Command::Uniform4f(*cmd))
    }

    fn sampler_2d(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.push(Command::SamplerBind2D(*binding))
    }

    fn sampler_cube(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.push(Command::SamplerBindCube(*binding))
    }

    fn clear(&mut self, cmd: &ClearCmd) -> Result<(), BackendError> {
        self.push(Command::Clear(*cmd))
    }

    fn clear_color(&mut self, cmd: &ClearColorCmd) -> Result<(), BackendError> {
        self.push(Command::ClearColor(*cmd))
    }

    fn clear_depth(&mut self, cmd: &ClearDepthCmd) -> Result<(), BackendError> {
        self.push(Command::ClearDepth(*cmd))
    }

    fn cull_mode(&mut self, cmd: &CullModeCmd) -> Result<(), BackendError> {
        self.push(Command::CullMode(*cmd))
    }

    fn viewport(&mut self, rect: &PixelRect) -> Result<(), BackendError> {
        self.push(Command::Viewport(*rect))
    }

    fn draw_call(&mut self, cmd: &DrawCallCmd) -> Result<(), BackendError> {
        if self.reject_null_draws && cmd.buffer.is_null() {
            return Err(BackendError::InvalidHandle { kind: ResourceKind::Buffer, raw: 0 });
        }
        self.push(Command::DrawCall(*cmd))
    }

    fn scissor(&mut self, rect: &PixelRect) -> Result<(), BackendError> {
        self.push(Command::Scissor(*rect))
    }

    fn state(&mut self, cmd: &StateCmd) -> Result<(), BackendError> {
        self.push(Command::StateToggle(*cmd))
    }

    fn blend_func(&mut self, cmd: &BlendFuncCmd) -> Result<(), BackendError> {
        self.push(Command::BlendFunc(*cmd))
    }

    fn post_shader(&mut self, cmd: &ShaderCmd) -> Result<(), BackendError> {
        self.calls.push(Call::Post(Command::Shader(*cmd)));
        Ok(())
    }

    fn post_sampler_2d(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.calls.push(Call::Post(Command::SamplerBind2D(*binding)));
        Ok(())
    }

    fn post_sampler_cube(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.calls.push(Call::Post(Command::SamplerBindCube(*binding)));
        Ok(())
    }
}

impl CommandDispatcher for TraceDispatcher {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn stats(&self) -> FrameStats {
        FrameStats::default()
    }

    fn run_command(
        &mut self,
        opcode: Opcode,
        payload: &mut BinaryCursor<&[u8]>,
    ) -> Result<(), DispatchError> {
        let entry = self.table.run(opcode);
        entry(self, payload)
    }

    fn post_command(
        &mut self,
        opcode: Opcode,
        payload: &mut BinaryCursor<&[u8]>,
    ) -> Result<(), DispatchError> {
        let entry = self.table.post(opcode);
        entry(self, payload)
    }

    fn buffer_create(&mut self, _desc: &GpuBufferDesc) -> Result<GpuBufferHandle, BackendError> {
        Ok(GpuBufferHandle::from_raw(self.mint()))
    }

    fn buffer_upload(
        &mut self,
        buffer: GpuBufferHandle,
        upload: &BufferUpload<'_>,
    ) -> Result<(), BackendError> {
        self.uploads.push((buffer, upload.vertices.to_vec(), upload.indices.to_vec()));
        Ok(())
    }

    fn buffer_destroy(&mut self, buffer: GpuBufferHandle) -> Result<(), BackendError> {
        self.destroyed.push(buffer);
        Ok(())
    }

    fn texture_create(&mut self, _desc: &TextureDesc<'_>) -> Result<TextureHandle, BackendError> {
        Ok(TextureHandle::from_raw(self.mint()))
    }

    fn texture_destroy(&mut self, _texture: TextureHandle) -> Result<(), BackendError> {
        Ok(())
    }

    fn shader_create(&mut self, _desc: &ShaderDesc<'_>) -> Result<ShaderHandle, BackendError> {
        Ok(ShaderHandle::from_raw(self.mint()))
    }

    fn shader_destroy(&mut self, _shader: ShaderHandle) -> Result<(), BackendError> {
        Ok(())
    }
}
