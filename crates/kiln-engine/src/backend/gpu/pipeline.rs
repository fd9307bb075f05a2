use std::collections::HashMap;

use crate::command::{BlendFactor, CullFace};

use super::super::{BackendError, BoundState, DrawTopology, ShaderHandle};
use super::convert::{blend_state, cull_mode, primitive_topology, uses_dual_source};
use super::resources::GpuShader;

/// Everything a render pipeline is baked from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub shader: ShaderHandle,
    pub topology: DrawTopology,
    pub blend: Option<(BlendFactor, BlendFactor)>,
    pub cull: Option<CullFace>,
    pub depth_test: bool,
    pub depth_write: bool,
}

impl PipelineKey {
    pub fn new(shader: ShaderHandle, topology: DrawTopology, state: &BoundState) -> Self {
        // Triangles and indexed triangles share a primitive topology.
        let topology = match topology {
            DrawTopology::IndexedTriangles => DrawTopology::Triangles,
            other => other,
        };
        Self {
            shader,
            topology,
            blend: state.blend.then_some(state.blend_func),
            cull: state.backface_culling.then_some(state.cull_face),
            depth_test: state.depth_test,
            depth_write: state.depth_write,
        }
    }
}

/// Color and depth formats every pipeline renders to.
#[derive(Debug, Copy, Clone)]
pub(super) struct TargetFormats {
    pub color: wgpu::TextureFormat,
    pub depth: Option<wgpu::TextureFormat>,
}

/// Render pipelines built on demand from recorded state.
#[derive(Default)]
pub(super) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        shader: &GpuShader,
        formats: TargetFormats,
    ) -> Result<&wgpu::RenderPipeline, BackendError> {
        if !self.pipelines.contains_key(&key) {
            let pipeline = create_pipeline(device, &key, shader, formats)?;
            log::debug!("pipeline #{} for shader '{}': {key:?}", self.pipelines.len(), shader.label);
            self.pipelines.insert(key, pipeline);
        }
        self.pipelines
            .get(&key)
            .ok_or(BackendError::ResourceCreation("pipeline cache miss".to_owned()))
    }

    /// Drops every pipeline built for `shader`.
    pub fn evict_shader(&mut self, shader: ShaderHandle) {
        self.pipelines.retain(|key, _| key.shader != shader);
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    shader: &GpuShader,
    formats: TargetFormats,
) -> Result<wgpu::RenderPipeline, BackendError> {
    if let Some((src, dst)) = key.blend {
        if uses_dual_source(src, dst)
            && !device.features().contains(wgpu::Features::DUAL_SOURCE_BLENDING)
        {
            return Err(BackendError::ResourceCreation(
                "dual-source blending is not supported by this device".to_owned(),
            ));
        }
    }

    let buffers = [wgpu::VertexBufferLayout {
        array_stride: shader.layout.stride() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &shader.attributes,
    }];

    let depth_stencil = formats.depth.map(|format| wgpu::DepthStencilState {
        format,
        // A disabled depth test also disables depth writes.
        depth_write_enabled: key.depth_test && key.depth_write,
        depth_compare: if key.depth_test {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: Default::default(),
        bias: Default::default(),
    });

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(shader.label.as_str()),
        layout: Some(&shader.pipeline_layout),

        vertex: wgpu::VertexState {
            module: &shader.module,
            entry_point: Some(shader.vertex_entry.as_str()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &shader.module,
            entry_point: Some(shader.fragment_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: formats.color,
                blend: key.blend.map(|(src, dst)| blend_state(src, dst)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(key.topology),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull.map(cull_mode),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_blend_func_while_blending_is_off() {
        let shader = ShaderHandle::from_raw(1);
        let mut state = BoundState {
            blend_func: (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            ..Default::default()
        };
        let off = PipelineKey::new(shader, DrawTopology::Triangles, &state);
        assert_eq!(off.blend, None);

        state.blend = true;
        let on = PipelineKey::new(shader, DrawTopology::Triangles, &state);
        assert_ne!(off, on);
    }

    #[test]
    fn cull_face_only_counts_while_culling_is_on() {
        let shader = ShaderHandle::from_raw(3);
        let mut state = BoundState { cull_face: CullFace::Front, ..Default::default() };
        assert_eq!(PipelineKey::new(shader, DrawTopology::Triangles, &state).cull, None);

        state.backface_culling = true;
        assert_eq!(
            PipelineKey::new(shader, DrawTopology::Triangles, &state).cull,
            Some(CullFace::Front)
        );
    }

    #[test]
    fn indexed_and_plain_triangles_share_a_key() {
        let state = BoundState::default();
        let shader = ShaderHandle::from_raw(7);
        assert_eq!(
            PipelineKey::new(shader, DrawTopology::IndexedTriangles, &state),
            PipelineKey::new(shader, DrawTopology::Triangles, &state)
        );
        assert_ne!(
            PipelineKey::new(shader, DrawTopology::Lines, &state),
            PipelineKey::new(shader, DrawTopology::Triangles, &state)
        );
    }
}
