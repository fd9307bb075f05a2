//! CPU reference backend.
//!
//! Runs without a GPU. Resources live in generational slot maps, every handle
//! is validated, and render state is simulated so that tests (and tools that
//! only need to inspect a frame) can observe what a real backend would do.

use slotmap::SlotMap;

use crate::command::{
    BlendFuncCmd, ClearCmd, ClearColorCmd, ClearDepthCmd, ClearFlags, CommandHandlers,
    CullModeCmd, DispatchError, DrawCallCmd, JumpTable, Opcode, PixelRect, SamplerBinding,
    ShaderCmd, StateCmd, Uniform1iCmd, Uniform3fCmd, Uniform4fCmd, UniformMatrix4Cmd,
};
use crate::stream::BinaryCursor;
use crate::vertex::VertexLayout;

use super::{
    uniform_range, validate_upload, BackendError, BackendKind, BoundState, BufferKey,
    BufferUpload, CommandDispatcher, FrameStats, GpuBufferDesc, GpuBufferHandle, IndexType,
    ResourceKind, ShaderDesc, ShaderHandle, ShaderKey, TextureDesc, TextureHandle, TextureKey,
    TextureKind, MAX_TEXTURE_UNITS,
};

#[derive(Debug)]
struct BufferSlot {
    desc: GpuBufferDesc,
    vertices: Vec<u8>,
    vertex_count: u32,
    indices: Vec<IndexType>,
}

#[derive(Debug)]
struct TextureSlot {
    kind: TextureKind,
}

#[derive(Debug)]
struct ShaderSlot {
    layout: VertexLayout,
    uniforms: Vec<u8>,
}

/// Backend that simulates a GPU on the CPU.
#[derive(Debug)]
pub struct HeadlessDispatcher {
    table: JumpTable<HeadlessDispatcher>,
    buffers: SlotMap<BufferKey, BufferSlot>,
    textures: SlotMap<TextureKey, TextureSlot>,
    shaders: SlotMap<ShaderKey, ShaderSlot>,
    state: BoundState,
    stats: FrameStats,
    frames: u64,
}

impl Default for HeadlessDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDispatcher {
    pub fn new() -> Self {
        Self {
            table: JumpTable::new(),
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            state: BoundState::default(),
            stats: FrameStats::default(),
            frames: 0,
        }
    }

    pub fn state(&self) -> &BoundState {
        &self.state
    }

    /// Frames completed with `end_frame`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Replaces one run entry, e.g. to disable an opcode with [`noop`](crate::command::noop).
    pub fn table_mut(&mut self) -> &mut JumpTable<HeadlessDispatcher> {
        &mut self.table
    }

    /// Live resource counts: buffers, textures, shaders.
    pub fn live_resources(&self) -> (usize, usize, usize) {
        (self.buffers.len(), self.textures.len(), self.shaders.len())
    }

    /// Vertex bytes and indices from the last upload to `buffer`.
    pub fn buffer_contents(&self, buffer: GpuBufferHandle) -> Option<(&[u8], &[IndexType])> {
        self.buffers
            .get(buffer.to_key::<BufferKey>())
            .map(|b| (b.vertices.as_slice(), b.indices.as_slice()))
    }

    /// Current uniform block of `shader`.
    pub fn uniform_block(&self, shader: ShaderHandle) -> Option<&[u8]> {
        self.shaders
            .get(shader.to_key::<ShaderKey>())
            .map(|s| s.uniforms.as_slice())
    }

    fn buffer(&self, handle: GpuBufferHandle) -> Result<&BufferSlot, BackendError> {
        self.buffers
            .get(handle.to_key::<BufferKey>())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Buffer, raw: handle.raw() })
    }

    fn texture(&self, handle: TextureHandle) -> Result<&TextureSlot, BackendError> {
        self.textures
            .get(handle.to_key::<TextureKey>())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Texture, raw: handle.raw() })
    }

    fn active_shader(&mut self) -> Result<&mut ShaderSlot, BackendError> {
        let handle = self.state.shader.ok_or(BackendError::NoActiveShader)?;
        self.shaders
            .get_mut(handle.to_key::<ShaderKey>())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Shader, raw: handle.raw() })
    }

    fn write_uniform(&mut self, location: i32, bytes: &[u8]) -> Result<(), BackendError> {
        let shader = self.active_shader()?;
        let range = uniform_range(location, bytes.len(), shader.uniforms.len() as u32)?;
        shader.uniforms[range].copy_from_slice(bytes);
        Ok(())
    }

    fn bind_sampler(
        &mut self,
        binding: &SamplerBinding,
        kind: TextureKind,
    ) -> Result<(), BackendError> {
        if binding.unit >= MAX_TEXTURE_UNITS {
            return Err(BackendError::InvalidTextureUnit {
                unit: binding.unit,
                max: MAX_TEXTURE_UNITS - 1,
            });
        }
        let texture = self.texture(binding.texture)?;
        if texture.kind != kind {
            return Err(BackendError::InvalidHandle {
                kind: ResourceKind::Texture,
                raw: binding.texture.raw(),
            });
        }
        self.state.textures[binding.unit as usize] = Some(binding.texture);
        Ok(())
    }
}

impl CommandHandlers for HeadlessDispatcher {
    fn shader(&mut self, cmd: &ShaderCmd) -> Result<(), BackendError> {
        if !self.shaders.contains_key(cmd.shader.to_key::<ShaderKey>()) {
            return Err(BackendError::InvalidHandle {
                kind: ResourceKind::Shader,
                raw: cmd.shader.raw(),
            });
        }
        self.state.shader = Some(cmd.shader);
        Ok(())
    }

    fn uniform_matrix4(&mut self, cmd: &UniformMatrix4Cmd) -> Result<(), BackendError> {
        self.write_uniform(cmd.location, bytemuck::cast_slice(&cmd.matrices))
    }

    fn uniform1i(&mut self, cmd: &Uniform1iCmd) -> Result<(), BackendError> {
        self.write_uniform(cmd.location, bytemuck::bytes_of(&cmd.value))
    }

    fn uniform3f(&mut self, cmd: &Uniform3fCmd) -> Result<(), BackendError> {
        self.write_uniform(cmd.location, bytemuck::bytes_of(&cmd.value))
    }

    fn uniform4f(&mut self, cmd: &Uniform4fCmd) -> Result<(), BackendError> {
        self.write_uniform(cmd.location, bytemuck::bytes_of(&cmd.value))
    }

    fn sampler_2d(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.bind_sampler(binding, TextureKind::D2)
    }

    fn sampler_cube(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.bind_sampler(binding, TextureKind::Cube)
    }

    fn clear(&mut self, cmd: &ClearCmd) -> Result<(), BackendError> {
        if cmd.flags.contains(ClearFlags::COLOR) {
            self.state.cleared_color = Some(self.state.clear_color);
        }
        if cmd.flags.contains(ClearFlags::DEPTH) {
            self.state.cleared_depth = Some(self.state.clear_depth);
        }
        self.stats.clears += 1;
        Ok(())
    }

    fn clear_color(&mut self, cmd: &ClearColorCmd) -> Result<(), BackendError> {
        self.state.clear_color = cmd.rgba;
        Ok(())
    }

    fn clear_depth(&mut self, cmd: &ClearDepthCmd) -> Result<(), BackendError> {
        self.state.clear_depth = cmd.depth;
        Ok(())
    }

    fn cull_mode(&mut self, cmd: &CullModeCmd) -> Result<(), BackendError> {
        self.state.cull_face = cmd.face;
        Ok(())
    }

    fn viewport(&mut self, rect: &PixelRect) -> Result<(), BackendError> {
        self.state.viewport = *rect;
        Ok(())
    }

    fn draw_call(&mut self, cmd: &DrawCallCmd) -> Result<(), BackendError> {
        let shader_layout = self.active_shader()?.layout;
        let buffer = self.buffer(cmd.buffer)?;

        if buffer.desc.layout != shader_layout {
            return Err(BackendError::UnsupportedLayout {
                attribute: None,
                reason: "buffer layout does not match the bound shader",
            });
        }

        let (vertices, indices) = (buffer.vertex_count, buffer.indices.len());
        let indexed = buffer.desc.topology.is_indexed();
        if vertices == 0 || (indexed && indices == 0) {
            self.stats.empty_draws += 1;
            return Ok(());
        }

        self.stats.draw_calls += 1;
        self.stats.vertices += vertices as u64;
        if indexed {
            self.stats.indices += indices as u64;
        }
        Ok(())
    }

    fn scissor(&mut self, rect: &PixelRect) -> Result<(), BackendError> {
        self.state.scissor = Some(*rect);
        Ok(())
    }

    fn state(&mut self, cmd: &StateCmd) -> Result<(), BackendError> {
        self.state.set(cmd.state, cmd.enabled);
        Ok(())
    }

    fn blend_func(&mut self, cmd: &BlendFuncCmd) -> Result<(), BackendError> {
        self.state.blend_func = (cmd.src, cmd.dst);
        Ok(())
    }

    fn post_shader(&mut self, _cmd: &ShaderCmd) -> Result<(), BackendError> {
        self.state.shader = None;
        Ok(())
    }

    fn post_sampler_2d(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.state.unbind_texture(binding.unit);
        Ok(())
    }

    fn post_sampler_cube(&mut self, binding: &SamplerBinding) -> Result<(), BackendError> {
        self.state.unbind_texture(binding.unit);
        Ok(())
    }
}

impl CommandDispatcher for HeadlessDispatcher {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
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

    fn stats(&self) -> FrameStats {
        self.stats
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        self.stats = FrameStats::default();
        self.state.cleared_color = None;
        self.state.cleared_depth = None;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.frames += 1;
        log::debug!(
            "headless frame {}: {} draw(s), {} vertices, {} indices",
            self.frames,
            self.stats.draw_calls,
            self.stats.vertices,
            self.stats.indices
        );
        Ok(())
    }

    fn buffer_create(&mut self, desc: &GpuBufferDesc) -> Result<GpuBufferHandle, BackendError> {
        if desc.layout.is_empty() {
            return Err(BackendError::UnsupportedLayout {
                attribute: None,
                reason: "layout has no attributes",
            });
        }
        let key = self.buffers.insert(BufferSlot {
            desc: desc.clone(),
            vertices: Vec::new(),
            vertex_count: 0,
            indices: Vec::new(),
        });
        Ok(GpuBufferHandle::from_key(key))
    }

    fn buffer_upload(
        &mut self,
        buffer: GpuBufferHandle,
        upload: &BufferUpload<'_>,
    ) -> Result<(), BackendError> {
        let slot = self
            .buffers
            .get_mut(buffer.to_key::<BufferKey>())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Buffer, raw: buffer.raw() })?;
        validate_upload(&slot.desc, upload)?;

        slot.vertices.clear();
        slot.vertices.extend_from_slice(upload.vertices);
        slot.vertex_count = upload.vertex_count;
        slot.indices.clear();
        slot.indices.extend_from_slice(upload.indices);
        Ok(())
    }

    fn buffer_destroy(&mut self, buffer: GpuBufferHandle) -> Result<(), BackendError> {
        self.buffers
            .remove(buffer.to_key::<BufferKey>())
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Buffer, raw: buffer.raw() })
    }

    fn texture_create(&mut self, desc: &TextureDesc<'_>) -> Result<TextureHandle, BackendError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::ResourceCreation(format!(
                "texture has zero size ({}x{})",
                desc.width, desc.height
            )));
        }
        if let Some(pixels) = desc.pixels {
            if pixels.len() != desc.expected_len() {
                return Err(BackendError::InvalidUpload(format!(
                    "{} texel bytes, expected {}",
                    pixels.len(),
                    desc.expected_len()
                )));
            }
        }
        let key = self.textures.insert(TextureSlot { kind: desc.kind });
        Ok(TextureHandle::from_key(key))
    }

    fn texture_destroy(&mut self, texture: TextureHandle) -> Result<(), BackendError> {
        self.textures
            .remove(texture.to_key::<TextureKey>())
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Texture, raw: texture.raw() })
    }

    fn shader_create(&mut self, desc: &ShaderDesc<'_>) -> Result<ShaderHandle, BackendError> {
        if desc.samplers.len() > MAX_TEXTURE_UNITS as usize {
            return Err(BackendError::ResourceCreation(format!(
                "{} samplers, at most {MAX_TEXTURE_UNITS} supported",
                desc.samplers.len()
            )));
        }
        let key = self.shaders.insert(ShaderSlot {
            layout: desc.layout,
            uniforms: vec![0; desc.uniform_size as usize],
        });
        log::debug!("headless shader {:?} created", desc.label);
        Ok(ShaderHandle::from_key(key))
    }

    fn shader_destroy(&mut self, shader: ShaderHandle) -> Result<(), BackendError> {
        let removed = self.shaders.remove(shader.to_key::<ShaderKey>());
        if removed.is_none() {
            return Err(BackendError::InvalidHandle { kind: ResourceKind::Shader, raw: shader.raw() });
        }
        if self.state.shader == Some(shader) {
            self.state.shader = None;
        }
        Ok(())
    }
}
