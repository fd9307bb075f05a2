use crate::command::{BlendFactor, CullFace, PixelRect, RenderState};

use super::{ShaderHandle, TextureHandle};

/// Sampler units available to a shader.
pub const MAX_TEXTURE_UNITS: u32 = 16;

/// Fixed-function and binding state set by playback.
///
/// Backends keep one of these and consult it when a draw is issued.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundState {
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub viewport: PixelRect,
    pub scissor: Option<PixelRect>,
    pub cull_face: CullFace,
    pub backface_culling: bool,
    pub blend: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend_func: (BlendFactor, BlendFactor),
    pub shader: Option<ShaderHandle>,
    pub textures: [Option<TextureHandle>; MAX_TEXTURE_UNITS as usize],
    /// Color/depth values written by the most recent `Clear`.
    pub cleared_color: Option<[f32; 4]>,
    pub cleared_depth: Option<f32>,
}

impl Default for BoundState {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            viewport: PixelRect::default(),
            scissor: None,
            cull_face: CullFace::Back,
            backface_culling: false,
            blend: false,
            depth_test: false,
            depth_write: true,
            blend_func: (BlendFactor::One, BlendFactor::Zero),
            shader: None,
            textures: [None; MAX_TEXTURE_UNITS as usize],
            cleared_color: None,
            cleared_depth: None,
        }
    }
}

impl BoundState {
    /// Sets one toggle.
    pub fn set(&mut self, state: RenderState, enabled: bool) {
        let flag = match state {
            RenderState::BackfaceCulling => &mut self.backface_culling,
            RenderState::Blend => &mut self.blend,
            RenderState::DepthTest => &mut self.depth_test,
            RenderState::DepthWrite => &mut self.depth_write,
        };
        *flag = enabled;
    }

    /// Drops the texture bound to `unit`, if any.
    pub fn unbind_texture(&mut self, unit: u32) {
        if let Some(slot) = self.textures.get_mut(unit as usize) {
            *slot = None;
        }
    }
}
