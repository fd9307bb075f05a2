//! wgpu backend.
//!
//! Renders into an offscreen [`FrameTarget`](resources::FrameTarget). A frame
//! owns one command encoder; every draw opens a short render pass on it, and
//! buffer/uniform uploads issued while the frame is open are recorded on the
//! same encoder so they stay ordered with the draws around them. Clears are
//! folded into the load op of the next pass.

mod convert;
mod pipeline;
mod resources;

use slotmap::SlotMap;

use crate::command::{
    BlendFuncCmd, ClearCmd, ClearColorCmd, ClearDepthCmd, ClearFlags, CommandHandlers,
    CullModeCmd, DispatchError, DrawCallCmd, JumpTable, Opcode, PixelRect, SamplerBinding,
    ShaderCmd, StateCmd, Uniform1iCmd, Uniform3fCmd, Uniform4fCmd, UniformMatrix4Cmd,
};
use crate::stream::BinaryCursor;

use super::{
    uniform_range, validate_upload, BackendError, BackendKind, BoundState, BufferKey,
    BufferUpload, CommandDispatcher, FrameStats, FrameTargetDesc, GpuBufferDesc,
    GpuBufferHandle, GpuContext, ResourceKind, ShaderDesc, ShaderHandle, ShaderKey, TextureDesc,
    TextureHandle, TextureKey, TextureKind, MAX_TEXTURE_UNITS,
};

use convert::clamp_rect;
use pipeline::{PipelineCache, PipelineKey, TargetFormats};
use resources::{sampler_bindings, write_buffer, FrameTarget, GpuBuffer, GpuShader, GpuTexture};

/// Clear values waiting for the next pass.
#[derive(Debug, Default, Copy, Clone)]
struct PendingClear {
    color: Option<[f32; 4]>,
    depth: Option<f32>,
}

impl PendingClear {
    fn is_empty(&self) -> bool {
        self.color.is_none() && self.depth.is_none()
    }
}

struct Frame {
    encoder: wgpu::CommandEncoder,
    clear: PendingClear,
    passes: u32,
}

pub struct WgpuDispatcher {
    table: JumpTable<WgpuDispatcher>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: FrameTarget,
    buffers: SlotMap<BufferKey, GpuBuffer>,
    textures: SlotMap<TextureKey, GpuTexture>,
    shaders: SlotMap<ShaderKey, GpuShader>,
    pipelines: PipelineCache,
    fallback_2d: GpuTexture,
    fallback_cube: GpuTexture,
    sampler: wgpu::Sampler,
    state: BoundState,
    frame: Option<Frame>,
    stats: FrameStats,
    frames: u64,
}

impl WgpuDispatcher {
    pub fn new(gpu: GpuContext, target: FrameTargetDesc) -> Result<Self, BackendError> {
        let GpuContext { device, queue } = gpu;
        let target = FrameTarget::create(&device, target)?;
        let fallback_2d = GpuTexture::fallback(&device, &queue, TextureKind::D2)?;
        let fallback_cube = GpuTexture::fallback(&device, &queue, TextureKind::Cube)?;
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::info!(
            "wgpu backend: {}x{} {:?} target, depth: {}",
            target.desc.width,
            target.desc.height,
            target.desc.format,
            target.desc.depth
        );

        Ok(Self {
            table: JumpTable::new(),
            device,
            queue,
            target,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            pipelines: PipelineCache::default(),
            fallback_2d,
            fallback_cube,
            sampler,
            state: BoundState::default(),
            frame: None,
            stats: FrameStats::default(),
            frames: 0,
        })
    }

    pub fn state(&self) -> &BoundState {
        &self.state
    }

    /// Frames submitted with `end_frame`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn table_mut(&mut self) -> &mut JumpTable<WgpuDispatcher> {
        &mut self.table
    }

    fn frame(&mut self) -> Result<&mut Frame, BackendError> {
        self.frame.as_mut().ok_or(BackendError::NoRenderTarget)
    }

    fn write_uniform(&mut self, location: i32, bytes: &[u8]) -> Result<(), BackendError> {
        let handle = self.state.shader.ok_or(BackendError::NoActiveShader)?;
        let shader = self
            .shaders
            .get_mut(handle.to_key::<ShaderKey>())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Shader, raw: handle.raw() })?;
        let range = uniform_range(location, bytes.len(), shader.uniform_size)?;
        shader.uniforms[range].copy_from_slice(bytes);
        shader.uniforms_dirty = true;
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
        let texture = self
            .textures
            .get(binding.texture.to_key::<TextureKey>())
            .ok_or(BackendError::InvalidHandle {
                kind: ResourceKind::Texture,
                raw: binding.texture.raw(),
            })?;
        if texture.kind != kind {
            return Err(BackendError::InvalidHandle {
                kind: ResourceKind::Texture,
                raw: binding.texture.raw(),
            });
        }
        self.state.textures[binding.unit as usize] = Some(binding.texture);
        Ok(())
    }

    /// View bound to `unit`, or the fallback when nothing of `kind` is bound.
    fn sampler_view(&self, unit: usize, kind: TextureKind) -> &wgpu::TextureView {
        let bound = self.state.textures[unit]
            .and_then(|h| self.textures.get(h.to_key::<TextureKey>()))
            .filter(|t| t.kind == kind);
        match (bound, kind) {
            (Some(texture), _) => &texture.view,
            (None, TextureKind::D2) => &self.fallback_2d.view,
            (None, TextureKind::Cube) => &self.fallback_cube.view,
        }
    }

    fn color_load(clear: &PendingClear) -> wgpu::LoadOp<wgpu::Color> {
        match clear.color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        }
    }

    fn depth_load(clear: &PendingClear) -> wgpu::LoadOp<f32> {
        match clear.depth {
            Some(depth) => wgpu::LoadOp::Clear(depth),
            None => wgpu::LoadOp::Load,
        }
    }

    /// Runs an empty pass so that a clear with no draw after it still lands.
    fn resolve_clear(&mut self) {
        let Some(frame) = self.frame.as_mut() else { return };
        if frame.clear.is_empty() {
            return;
        }
        let clear = std::mem::take(&mut frame.clear);
        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("kiln clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: Self::color_load(&clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: self.target.depth_view.as_ref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: Self::depth_load(&clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        frame.passes += 1;
    }
}

impl CommandHandlers for WgpuDispatcher {
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
        let (color, depth) = (self.state.clear_color, self.state.clear_depth);
        let has_depth = self.target.depth_view.is_some();
        let frame = self.frame()?;
        if cmd.flags.contains(ClearFlags::COLOR) {
            frame.clear.color = Some(color);
        }
        if cmd.flags.contains(ClearFlags::DEPTH) && has_depth {
            frame.clear.depth = Some(depth);
        }
        if cmd.flags.contains(ClearFlags::COLOR) {
            self.state.cleared_color = Some(color);
        }
        if cmd.flags.contains(ClearFlags::DEPTH) {
            self.state.cleared_depth = Some(depth);
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
        if self.frame.is_none() {
            return Err(BackendError::NoRenderTarget);
        }
        let shader_handle = self.state.shader.ok_or(BackendError::NoActiveShader)?;
        let shader = self.shaders.get(shader_handle.to_key::<ShaderKey>()).ok_or(
            BackendError::InvalidHandle { kind: ResourceKind::Shader, raw: shader_handle.raw() },
        )?;
        let buffer = self.buffers.get(cmd.buffer.to_key::<BufferKey>()).ok_or(
            BackendError::InvalidHandle { kind: ResourceKind::Buffer, raw: cmd.buffer.raw() },
        )?;

        if buffer.desc.layout != shader.layout {
            return Err(BackendError::UnsupportedLayout {
                attribute: None,
                reason: "buffer layout does not match the bound shader",
            });
        }

        let indexed = buffer.desc.topology.is_indexed();
        if buffer.vertex_count == 0 || (indexed && buffer.index_count == 0) {
            self.stats.empty_draws += 1;
            return Ok(());
        }

        let (width, height) = (self.target.desc.width, self.target.desc.height);
        let full = PixelRect::new(0, 0, width as i32, height as i32);
        let viewport = match self.state.viewport {
            PixelRect { width: 0, .. } | PixelRect { height: 0, .. } => full,
            rect => rect,
        };
        let Some(viewport) = clamp_rect(viewport, width, height) else {
            log::trace!("draw skipped: viewport outside the target");
            return Ok(());
        };
        let Some(scissor) = clamp_rect(self.state.scissor.unwrap_or(full), width, height) else {
            log::trace!("draw skipped: empty scissor");
            return Ok(());
        };

        let mut entries = Vec::with_capacity(1 + shader.samplers.len() * 2);
        if let Some(uniforms) = shader.uniform_buffer.as_ref() {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            });
        }
        for (unit, kind) in shader.samplers.iter().enumerate() {
            let (texture, sampler) = sampler_bindings(unit as u32);
            entries.push(wgpu::BindGroupEntry {
                binding: texture,
                resource: wgpu::BindingResource::TextureView(self.sampler_view(unit, *kind)),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: sampler,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(shader.label.as_str()),
            layout: &shader.bind_group_layout,
            entries: &entries,
        });

        // Built last: the cache hands out a borrow of itself.
        let key = PipelineKey::new(shader_handle, buffer.desc.topology, &self.state);
        let formats = TargetFormats {
            color: self.target.desc.format,
            depth: self.target.depth_format(),
        };
        let pipeline = self.pipelines.get_or_create(&self.device, key, shader, formats)?;

        let Some(frame) = self.frame.as_mut() else {
            return Err(BackendError::NoRenderTarget);
        };
        if shader.uniforms_dirty {
            if let Some(uniforms) = shader.uniform_buffer.as_ref() {
                write_buffer(
                    &self.device,
                    &self.queue,
                    Some(&mut frame.encoder),
                    uniforms,
                    &shader.uniforms,
                );
            }
        }

        let clear = std::mem::take(&mut frame.clear);
        {
            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: Self::color_load(&clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: self.target.depth_view.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: Self::depth_load(&clear),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (vx, vy, vw, vh) = viewport;
            pass.set_viewport(vx as f32, vy as f32, vw as f32, vh as f32, 0.0, 1.0);
            let (sx, sy, sw, sh) = scissor;
            pass.set_scissor_rect(sx, sy, sw, sh);
            pass.set_vertex_buffer(0, buffer.vertex.slice(..));

            match buffer.index.as_ref().filter(|_| indexed) {
                Some(index) => {
                    pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..buffer.index_count, 0, 0..1);
                }
                None => pass.draw(0..buffer.vertex_count, 0..1),
            }
        }
        frame.passes += 1;

        self.stats.draw_calls += 1;
        self.stats.vertices += buffer.vertex_count as u64;
        if indexed {
            self.stats.indices += buffer.index_count as u64;
        }

        if let Some(shader) = self.shaders.get_mut(shader_handle.to_key::<ShaderKey>()) {
            shader.uniforms_dirty = false;
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

impl CommandDispatcher for WgpuDispatcher {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
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
        if self.frame.is_some() {
            log::warn!("begin_frame with a frame still open; submitting it first");
            self.end_frame()?;
        }
        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("kiln frame encoder"),
        });
        self.frame = Some(Frame { encoder, clear: PendingClear::default(), passes: 0 });
        self.stats = FrameStats::default();
        self.state.cleared_color = None;
        self.state.cleared_depth = None;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.resolve_clear();
        let Some(frame) = self.frame.take() else {
            log::debug!("end_frame without an open frame");
            return Ok(());
        };
        self.queue.submit(Some(frame.encoder.finish()));
        self.frames += 1;
        log::debug!(
            "wgpu frame {}: {} pass(es), {} draw(s), {} vertices, {} indices",
            self.frames,
            frame.passes,
            self.stats.draw_calls,
            self.stats.vertices,
            self.stats.indices
        );
        Ok(())
    }

    fn buffer_create(&mut self, desc: &GpuBufferDesc) -> Result<GpuBufferHandle, BackendError> {
        let buffer = GpuBuffer::create(&self.device, desc)?;
        Ok(GpuBufferHandle::from_key(self.buffers.insert(buffer)))
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

        let mut encoder = self.frame.as_mut().map(|f| &mut f.encoder);
        write_buffer(&self.device, &self.queue, encoder.as_deref_mut(), &slot.vertex, upload.vertices);
        if let Some(index) = slot.index.as_ref() {
            write_buffer(
                &self.device,
                &self.queue,
                encoder,
                index,
                bytemuck::cast_slice(upload.indices),
            );
        }
        slot.vertex_count = upload.vertex_count;
        slot.index_count = if slot.index.is_some() { upload.indices.len() as u32 } else { 0 };
        Ok(())
    }

    fn buffer_destroy(&mut self, buffer: GpuBufferHandle) -> Result<(), BackendError> {
        self.buffers
            .remove(buffer.to_key::<BufferKey>())
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle { kind: ResourceKind::Buffer, raw: buffer.raw() })
    }

    fn texture_create(&mut self, desc: &TextureDesc<'_>) -> Result<TextureHandle, BackendError> {
        let texture = GpuTexture::create(&self.device, &self.queue, desc)?;
        Ok(TextureHandle::from_key(self.textures.insert(texture)))
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
        let shader = GpuShader::create(&self.device, desc)?;
        log::debug!("wgpu shader '{}' created", shader.label);
        Ok(ShaderHandle::from_key(self.shaders.insert(shader)))
    }

    fn shader_destroy(&mut self, shader: ShaderHandle) -> Result<(), BackendError> {
        if self.shaders.remove(shader.to_key::<ShaderKey>()).is_none() {
            return Err(BackendError::InvalidHandle { kind: ResourceKind::Shader, raw: shader.raw() });
        }
        self.pipelines.evict_shader(shader);
        if self.state.shader == Some(shader) {
            self.state.shader = None;
        }
        Ok(())
    }
}

impl std::fmt::Debug for WgpuDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDispatcher")
            .field("target", &self.target.desc)
            .field("buffers", &self.buffers.len())
            .field("textures", &self.textures.len())
            .field("shaders", &self.shaders.len())
            .field("pipelines", &self.pipelines.len())
            .field("in_frame", &self.frame.is_some())
            .field("frames", &self.frames)
            .finish()
    }
}
