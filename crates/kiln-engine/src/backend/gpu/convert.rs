//! Mappings from recorded state to wgpu descriptors.

use crate::command::{BlendFactor, CullFace, PixelRect};
use crate::vertex::{AttributeKind, VertexLayout};

use super::super::{BackendError, DrawTopology};

// ── vertex layout ─────────────────────────────────────────────────────────

pub(super) fn vertex_format(kind: AttributeKind) -> Result<wgpu::VertexFormat, BackendError> {
    Ok(match kind {
        AttributeKind::Float2 => wgpu::VertexFormat::Float32x2,
        AttributeKind::Float3 => wgpu::VertexFormat::Float32x3,
        AttributeKind::Float4 => wgpu::VertexFormat::Float32x4,
        AttributeKind::Int4 => wgpu::VertexFormat::Sint32x4,
        AttributeKind::UByte4 => wgpu::VertexFormat::Unorm8x4,
        AttributeKind::UInt => wgpu::VertexFormat::Uint32,
        AttributeKind::UByte3 => {
            return Err(BackendError::UnsupportedLayout {
                attribute: Some(kind),
                reason: "no three-component 8-bit vertex format",
            });
        }
    })
}

/// Attributes at shader locations `0..layout.len()`.
pub(super) fn vertex_attributes(
    layout: &VertexLayout,
) -> Result<Vec<wgpu::VertexAttribute>, BackendError> {
    if layout.is_empty() {
        return Err(BackendError::UnsupportedLayout {
            attribute: None,
            reason: "layout has no attributes",
        });
    }
    if layout.stride() % 4 != 0 {
        return Err(BackendError::UnsupportedLayout {
            attribute: None,
            reason: "stride is not a multiple of 4",
        });
    }
    layout
        .attribute_offsets()
        .enumerate()
        .map(|(location, (kind, offset))| {
            Ok(wgpu::VertexAttribute {
                format: vertex_format(kind)?,
                offset: offset as u64,
                shader_location: location as u32,
            })
        })
        .collect()
}

// ── primitive state ───────────────────────────────────────────────────────

pub(super) fn primitive_topology(topology: DrawTopology) -> wgpu::PrimitiveTopology {
    match topology {
        DrawTopology::Triangles | DrawTopology::IndexedTriangles => {
            wgpu::PrimitiveTopology::TriangleList
        }
        DrawTopology::Lines => wgpu::PrimitiveTopology::LineList,
        DrawTopology::Points => wgpu::PrimitiveTopology::PointList,
    }
}

pub(super) fn cull_mode(face: CullFace) -> wgpu::Face {
    match face {
        CullFace::Front => wgpu::Face::Front,
        CullFace::Back => wgpu::Face::Back,
    }
}

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        // wgpu has a single blend constant for color and alpha.
        BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::Src1Color => wgpu::BlendFactor::Src1,
        BlendFactor::OneMinusSrc1Color => wgpu::BlendFactor::OneMinusSrc1,
        BlendFactor::Src1Alpha => wgpu::BlendFactor::Src1Alpha,
        BlendFactor::OneMinusSrc1Alpha => wgpu::BlendFactor::OneMinusSrc1Alpha,
    }
}

/// Same factors for color and alpha, additive.
pub(super) fn blend_state(src: BlendFactor, dst: BlendFactor) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

/// Whether either factor reads the second fragment output.
pub(super) fn uses_dual_source(src: BlendFactor, dst: BlendFactor) -> bool {
    [src, dst].iter().any(|f| {
        matches!(
            f,
            BlendFactor::Src1Color
                | BlendFactor::OneMinusSrc1Color
                | BlendFactor::Src1Alpha
                | BlendFactor::OneMinusSrc1Alpha
        )
    })
}

// ── rects ─────────────────────────────────────────────────────────────────

/// Clamps `rect` to a `width` x `height` target.
///
/// Returns `None` for an empty result; the caller skips the draw.
pub(super) fn clamp_rect(rect: PixelRect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;
    let x0 = clamp(rect.x as i64, width);
    let y0 = clamp(rect.y as i64, height);
    let x1 = clamp(rect.x as i64 + rect.width as i64, width);
    let y1 = clamp(rect.y as i64 + rect.height as i64, height);
    let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
    if w == 0 || h == 0 { None } else { Some((x0, y0, w, h)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ubyte3_has_no_wgpu_format() {
        assert!(matches!(
            vertex_format(AttributeKind::UByte3),
            Err(BackendError::UnsupportedLayout { attribute: Some(AttributeKind::UByte3), .. })
        ));
        assert_eq!(vertex_format(AttributeKind::UByte4).unwrap(), wgpu::VertexFormat::Unorm8x4);
    }

    #[test]
    fn attributes_use_layout_offsets() {
        let layout = VertexLayout::from_kinds(&[
            AttributeKind::Float3,
            AttributeKind::UByte4,
            AttributeKind::Float2,
        ])
        .unwrap();
        let attrs = vertex_attributes(&layout).unwrap();
        let offsets: Vec<_> = attrs.iter().map(|a| (a.offset, a.shader_location)).collect();
        assert_eq!(offsets, [(0, 0), (12, 1), (16, 2)]);
    }

    #[test]
    fn layout_with_ubyte3_is_rejected() {
        let layout =
            VertexLayout::from_kinds(&[AttributeKind::Float2, AttributeKind::UByte3]).unwrap();
        assert!(vertex_attributes(&layout).is_err());
    }

    #[test]
    fn blend_maps_alpha_factors() {
        let state = blend_state(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(state.alpha.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert!(!uses_dual_source(BlendFactor::SrcAlpha, BlendFactor::One));
        assert!(uses_dual_source(BlendFactor::One, BlendFactor::Src1Alpha));
    }

    #[test]
    fn cull_faces_map_one_to_one() {
        assert_eq!(cull_mode(CullFace::Front), wgpu::Face::Front);
        assert_eq!(cull_mode(CullFace::Back), wgpu::Face::Back);
    }

    #[test]
    fn rect_is_clamped_to_target() {
        assert_eq!(clamp_rect(PixelRect::new(-10, 5, 50, 100), 32, 32), Some((0, 5, 32, 27)));
        assert_eq!(clamp_rect(PixelRect::new(40, 0, 10, 10), 32, 32), None);
        assert_eq!(clamp_rect(PixelRect::new(0, 0, 0, 10), 32, 32), None);
    }
}
