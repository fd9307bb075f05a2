use std::fmt;

/// Recordable operation.
///
/// The discriminant is the index into every backend's jump tables and must
/// stay dense (`0..COUNT`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Shader = 0,
    UniformMatrix4,
    Uniform1i,
    Uniform3f,
    Uniform4f,
    SamplerBind2D,
    SamplerBindCube,
    Clear,
    ClearColor,
    ClearDepth,
    CullMode,
    Viewport,
    DrawCall,
    Scissor,
    StateToggle,
    BlendFunc,
}

impl Opcode {
    pub const COUNT: usize = 16;

    /// All opcodes in discriminant order.
    pub const ALL: [Opcode; Self::COUNT] = [
        Opcode::Shader,
        Opcode::UniformMatrix4,
        Opcode::Uniform1i,
        Opcode::Uniform3f,
        Opcode::Uniform4f,
        Opcode::SamplerBind2D,
        Opcode::SamplerBindCube,
        Opcode::Clear,
        Opcode::ClearColor,
        Opcode::ClearDepth,
        Opcode::CullMode,
        Opcode::Viewport,
        Opcode::DrawCall,
        Opcode::Scissor,
        Opcode::StateToggle,
        Opcode::BlendFunc,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Opcode::Shader => "shader",
            Opcode::UniformMatrix4 => "uniform_matrix4",
            Opcode::Uniform1i => "uniform1i",
            Opcode::Uniform3f => "uniform3f",
            Opcode::Uniform4f => "uniform4f",
            Opcode::SamplerBind2D => "sampler_2d",
            Opcode::SamplerBindCube => "sampler_cube",
            Opcode::Clear => "clear",
            Opcode::ClearColor => "clear_color",
            Opcode::ClearDepth => "clear_depth",
            Opcode::CullMode => "cull_mode",
            Opcode::Viewport => "viewport",
            Opcode::DrawCall => "draw_call",
            Opcode::Scissor => "scissor",
            Opcode::StateToggle => "state",
            Opcode::BlendFunc => "blend_func",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_dense_and_ordered() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
            assert_eq!(Opcode::from_u8(i as u8), Some(*op));
        }
        assert_eq!(Opcode::from_u8(Opcode::COUNT as u8), None);
    }
}
