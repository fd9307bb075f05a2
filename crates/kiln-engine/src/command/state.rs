//! Render-state vocabulary shared by payloads and backends.
//!
//! Every value crosses the command stream as a `u32`; decoding rejects
//! discriminants that do not name a variant.

use bitflags::bitflags;

use crate::stream::StreamError;

bitflags! {
    /// Buffers cleared by a `Clear` command.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 0x0000_4000;
        const DEPTH = 0x0000_0100;
    }
}

impl ClearFlags {
    pub(crate) fn decode(raw: u32) -> Result<Self, StreamError> {
        Self::from_bits(raw).ok_or(StreamError::InvalidValue { what: "clear flags", raw })
    }
}

/// Face culled when backface culling is enabled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u32)]
pub enum CullFace {
    Front = 0,
    #[default]
    Back = 1,
}

impl CullFace {
    pub(crate) fn decode(raw: u32) -> Result<Self, StreamError> {
        match raw {
            0 => Ok(Self::Front),
            1 => Ok(Self::Back),
            _ => Err(StreamError::InvalidValue { what: "cull face", raw }),
        }
    }
}

/// Toggleable fixed-function state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum RenderState {
    BackfaceCulling = 0,
    Blend,
    DepthTest,
    DepthWrite,
}

impl RenderState {
    pub(crate) fn decode(raw: u32) -> Result<Self, StreamError> {
        match raw {
            0 => Ok(Self::BackfaceCulling),
            1 => Ok(Self::Blend),
            2 => Ok(Self::DepthTest),
            3 => Ok(Self::DepthWrite),
            _ => Err(StreamError::InvalidValue { what: "render state", raw }),
        }
    }
}

/// Blend factor for `BlendFunc`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum BlendFactor {
    Zero = 0,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
}

impl BlendFactor {
    const ALL: [BlendFactor; 18] = [
        BlendFactor::Zero,
        BlendFactor::One,
        BlendFactor::SrcColor,
        BlendFactor::OneMinusSrcColor,
        BlendFactor::DstColor,
        BlendFactor::OneMinusDstColor,
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        BlendFactor::OneMinusDstAlpha,
        BlendFactor::ConstantColor,
        BlendFactor::OneMinusConstantColor,
        BlendFactor::ConstantAlpha,
        BlendFactor::OneMinusConstantAlpha,
        BlendFactor::SrcAlphaSaturate,
        BlendFactor::Src1Color,
        BlendFactor::OneMinusSrc1Color,
        BlendFactor::Src1Alpha,
        BlendFactor::OneMinusSrc1Alpha,
    ];

    pub(crate) fn decode(raw: u32) -> Result<Self, StreamError> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(StreamError::InvalidValue { what: "blend factor", raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_factor_decode_matches_discriminant() {
        for f in BlendFactor::ALL {
            assert_eq!(BlendFactor::decode(f as u32).unwrap(), f);
        }
        assert!(BlendFactor::decode(18).is_err());
    }

    #[test]
    fn unknown_clear_bits_are_rejected() {
        assert_eq!(
            ClearFlags::decode(0x4100).unwrap(),
            ClearFlags::COLOR | ClearFlags::DEPTH
        );
        assert!(ClearFlags::decode(0x1).is_err());
    }

    #[test]
    fn enum_decode_rejects_out_of_range() {
        assert_eq!(CullFace::decode(0).unwrap(), CullFace::Front);
        assert!(CullFace::decode(2).is_err());
        assert_eq!(RenderState::decode(3).unwrap(), RenderState::DepthWrite);
        assert!(RenderState::decode(4).is_err());
    }
}
