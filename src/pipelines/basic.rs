use crate::{
    data_structures::{
        instance::InstanceAttribute,
        model::{ModelVertex, Vertex},
    },
    shader::reflect::{FRAGMENT_ENTRY, VERTEX_ENTRY, VertexInput},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Replace,
    /// `dst + src`, used by the bloom upsample chain.
    Additive,
}

impl BlendMode {
    fn state(self) -> wgpu::BlendState {
        match self {
            BlendMode::Replace => wgpu::BlendState::REPLACE,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthMode {
    None,
    /// Depth test against `compare`, optionally writing.
    Test {
        write: bool,
        compare: wgpu::CompareFunction,
    },
}

impl DepthMode {
    pub const OPAQUE: DepthMode = DepthMode::Test {
        write: true,
        compare: wgpu::CompareFunction::Less,
    };
    /// Sky is drawn at the far plane behind already written geometry.
    pub const SKY: DepthMode = DepthMode::Test {
        write: false,
        compare: wgpu::CompareFunction::LessEqual,
    };
    /// Fullscreen passes that only write `frag_depth`.
    pub const OVERWRITE: DepthMode = DepthMode::Test {
        write: true,
        compare: wgpu::CompareFunction::Always,
    };
}

/// Everything about a pipeline that depends on where it draws rather than
/// on the program itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// `None` for depth-only passes.
    pub color_format: Option<wgpu::TextureFormat>,
    pub blend: BlendMode,
    pub depth: DepthMode,
    pub samples: u32,
    pub cull: Option<wgpu::Face>,
}

impl PipelineKey {
    /// Single-sample color output without depth, the shape of every screen pass.
    pub fn screen(format: wgpu::TextureFormat) -> Self {
        Self {
            color_format: Some(format),
            blend: BlendMode::Replace,
            depth: DepthMode::None,
            samples: 1,
            cull: None,
        }
    }

    pub fn with_blend(self, blend: BlendMode) -> Self {
        Self { blend, ..self }
    }
}

/// Vertex buffer layouts for a program's vertex input.
pub fn vertex_layouts(input: VertexInput) -> Vec<wgpu::VertexBufferLayout<'static>> {
    match input {
        VertexInput::None => Vec::new(),
        VertexInput::Mesh => vec![ModelVertex::desc()],
        VertexInput::MeshInstanced => std::iter::once(ModelVertex::desc())
            .chain(InstanceAttribute::layouts())
            .collect(),
    }
}

/// Builds a pipeline whose layout wgpu derives from the shader.
///
/// Bind group layouts are then fetched from the pipeline itself, so only the
/// bindings the entry points use end up in them.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    vertex_input: VertexInput,
    has_fragment: bool,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let vertex_layouts = vertex_layouts(vertex_input);
    let targets = [key.color_format.map(|format| wgpu::ColorTargetState {
        format,
        blend: Some(key.blend.state()),
        write_mask: wgpu::ColorWrites::ALL,
    })];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: None,
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: has_fragment.then(|| wgpu::FragmentState {
            module,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: if key.color_format.is_some() {
                &targets[..]
            } else {
                &[]
            },
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: match key.depth {
            DepthMode::None => None,
            DepthMode::Test { write, compare } => Some(wgpu::DepthStencilState {
                format: crate::data_structures::texture::Texture::DEPTH_FORMAT,
                depth_write_enabled: write,
                depth_compare: compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        },
        multisample: wgpu::MultisampleState {
            count: key.samples,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instanced_programs_get_seven_streams() {
        assert_eq!(vertex_layouts(VertexInput::MeshInstanced).len(), 7);
        assert_eq!(vertex_layouts(VertexInput::Mesh).len(), 1);
        assert!(vertex_layouts(VertexInput::None).is_empty());
    }

    #[test]
    fn keys_differ_by_target() {
        let a = PipelineKey::screen(wgpu::TextureFormat::Rgba16Float);
        let b = a.with_blend(BlendMode::Additive);
        assert_ne!(a, b);
        assert_eq!(a, PipelineKey::screen(wgpu::TextureFormat::Rgba16Float));
    }
}
