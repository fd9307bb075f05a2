use std::fmt;

use crate::vertex::AttributeKind;

/// Kind of resource a handle refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Shader,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Shader => "shader",
        })
    }
}

/// Backend operation failure.
///
/// Raised by resource management calls and by opcode handlers; during
/// playback it is attached to the failing command and playback continues.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Handle is null, stale or was already destroyed.
    InvalidHandle { kind: ResourceKind, raw: u64 },
    /// The backend cannot express this vertex layout.
    UnsupportedLayout {
        attribute: Option<AttributeKind>,
        reason: &'static str,
    },
    /// Uniform write falls outside the active shader's uniform block.
    UniformOutOfRange { location: i32, size: u32, block_size: u32 },
    /// A uniform or draw was issued with no shader bound.
    NoActiveShader,
    /// A pass-level command was issued before a render target was set.
    NoRenderTarget,
    /// Texture unit beyond what the backend supports.
    InvalidTextureUnit { unit: u32, max: u32 },
    /// Upload data does not match the buffer it targets.
    InvalidUpload(String),
    /// The backend failed to create a resource.
    ResourceCreation(String),
    /// The requested backend cannot run on this machine.
    Unavailable(&'static str),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle { kind, raw } => write!(f, "invalid {kind} handle {raw:#x}"),
            Self::UnsupportedLayout { attribute: Some(a), reason } => {
                write!(f, "unsupported vertex attribute {a:?}: {reason}")
            }
            Self::UnsupportedLayout { attribute: None, reason } => {
                write!(f, "unsupported vertex layout: {reason}")
            }
            Self::UniformOutOfRange { location, size, block_size } => write!(
                f,
                "uniform write of {size} byte(s) at location {location} exceeds block of {block_size} byte(s)"
            ),
            Self::NoActiveShader => f.write_str("no shader bound"),
            Self::NoRenderTarget => f.write_str("no render target set"),
            Self::InvalidTextureUnit { unit, max } => {
                write!(f, "texture unit {unit} out of range (max {max})")
            }
            Self::InvalidUpload(msg) => write!(f, "invalid upload: {msg}"),
            Self::ResourceCreation(msg) => write!(f, "resource creation failed: {msg}"),
            Self::Unavailable(why) => write!(f, "backend unavailable: {why}"),
        }
    }
}

impl std::error::Error for BackendError {}
