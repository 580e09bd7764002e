//! Vertex layout and the entity ("model") record.

use crate::data_structures::registry::{GroupId, MaterialId, MeshId, ShaderId, TextureId};

/// Describes how a `#[repr(C)]` type is laid out in a vertex buffer.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// A renderable entity: what it is drawn with.
///
/// `instance` is `None` while the entity is drawn on its own; once it joins
/// an instance group it is drawn only through that group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub mesh: MeshId,
    pub shader: ShaderId,
    pub texture: TextureId,
    pub material: MaterialId,
    pub instance: Option<GroupId>,
}

impl Model {
    pub fn is_instanced(&self) -> bool {
        self.instance.is_some()
    }
}
