//! Per-instance attribute streams.
//!
//! Every geometry draw (instanced or not) reads six per-instance vertex
//! streams, each in its own buffer so that a change to one attribute only
//! uploads that attribute:
//!
//! | stream    | locations | contents                          |
//! |-----------|-----------|-----------------------------------|
//! | `Model`   | 5..=8     | model matrix                      |
//! | `Normal`  | 9..=11    | normal matrix                     |
//! | `Ambient` | 12        | material ambient                  |
//! | `Diffuse` | 13        | material diffuse                  |
//! | `Specular`| 14        | material specular                 |
//! | `Surface` | 15        | shininess, roughness, metallic    |

use std::ops::Range;

use bitflags::bitflags;
use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};

use crate::data_structures::material::Material;

bitflags! {
    /// Which per-instance values of a row need to be (re)written.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeMask: u8 {
        const MODEL = 1 << 0;
        const AMBIENT = 1 << 1;
        const DIFFUSE = 1 << 2;
        const SPECULAR = 1 << 3;
        const SHININESS = 1 << 4;
        const ROUGHNESS = 1 << 5;
        const METALLIC = 1 << 6;
        const SURFACE = Self::SHININESS.bits() | Self::ROUGHNESS.bits() | Self::METALLIC.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceAttribute {
    Model,
    Normal,
    Ambient,
    Diffuse,
    Specular,
    Surface,
}

impl InstanceAttribute {
    pub const ALL: [InstanceAttribute; 6] = [
        InstanceAttribute::Model,
        InstanceAttribute::Normal,
        InstanceAttribute::Ambient,
        InstanceAttribute::Diffuse,
        InstanceAttribute::Specular,
        InstanceAttribute::Surface,
    ];

    /// Vertex buffer slot; slot 0 holds the mesh vertices.
    pub fn slot(self) -> u32 {
        self as u32 + 1
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn stride(self) -> wgpu::BufferAddress {
        let bytes = match self {
            InstanceAttribute::Model => std::mem::size_of::<[[f32; 4]; 4]>(),
            InstanceAttribute::Normal => std::mem::size_of::<[[f32; 3]; 3]>(),
            _ => std::mem::size_of::<[f32; 3]>(),
        };
        bytes as wgpu::BufferAddress
    }

    pub fn touched_by(self, mask: AttributeMask) -> bool {
        let bits = match self {
            InstanceAttribute::Model | InstanceAttribute::Normal => AttributeMask::MODEL,
            InstanceAttribute::Ambient => AttributeMask::AMBIENT,
            InstanceAttribute::Diffuse => AttributeMask::DIFFUSE,
            InstanceAttribute::Specular => AttributeMask::SPECULAR,
            InstanceAttribute::Surface => AttributeMask::SURFACE,
        };
        mask.intersects(bits)
    }

    /// The buffers a write with `mask` has to touch.
    pub fn for_mask(mask: AttributeMask) -> impl Iterator<Item = InstanceAttribute> {
        Self::ALL.into_iter().filter(move |a| a.touched_by(mask))
    }

    pub fn desc(self) -> wgpu::VertexBufferLayout<'static> {
        const MODEL: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            5 => Float32x4, 6 => Float32x4, 7 => Float32x4, 8 => Float32x4
        ];
        const NORMAL: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![9 => Float32x3, 10 => Float32x3, 11 => Float32x3];
        const AMBIENT: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![12 => Float32x3];
        const DIFFUSE: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![13 => Float32x3];
        const SPECULAR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![14 => Float32x3];
        const SURFACE: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![15 => Float32x3];

        let attributes: &'static [wgpu::VertexAttribute] = match self {
            InstanceAttribute::Model => &MODEL,
            InstanceAttribute::Normal => &NORMAL,
            InstanceAttribute::Ambient => &AMBIENT,
            InstanceAttribute::Diffuse => &DIFFUSE,
            InstanceAttribute::Specular => &SPECULAR,
            InstanceAttribute::Surface => &SURFACE,
        };
        wgpu::VertexBufferLayout {
            array_stride: self.stride(),
            // advance once per instance rather than per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes,
        }
    }

    /// Layouts of all six streams in slot order.
    pub fn layouts() -> [wgpu::VertexBufferLayout<'static>; 6] {
        Self::ALL.map(Self::desc)
    }
}

/// One row's worth of instance data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceRow {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 3]; 3],
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub surface: [f32; 3],
}

impl InstanceRow {
    pub fn new(model: Matrix4<f32>, material: &Material) -> Self {
        Self {
            model: model.into(),
            normal: normal_matrix(&model).into(),
            ambient: material.ambient,
            diffuse: material.diffuse,
            specular: material.specular,
            surface: material.surface(),
        }
    }
}

/// Inverse-transpose of the upper 3x3, so normals survive non-uniform scale.
pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_cols(model.x.truncate(), model.y.truncate(), model.z.truncate());
    linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear)
}

/// CPU mirror of the six attribute buffers, one entry per row.
#[derive(Debug, Clone, Default)]
pub struct AttributeColumns {
    model: Vec<[[f32; 4]; 4]>,
    normal: Vec<[[f32; 3]; 3]>,
    ambient: Vec<[f32; 3]>,
    diffuse: Vec<[f32; 3]>,
    specular: Vec<[f32; 3]>,
    surface: Vec<[f32; 3]>,
}

impl AttributeColumns {
    pub fn len(&self) -> usize {
        self.model.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    pub fn push(&mut self, row: &InstanceRow) {
        self.model.push(row.model);
        self.normal.push(row.normal);
        self.ambient.push(row.ambient);
        self.diffuse.push(row.diffuse);
        self.specular.push(row.specular);
        self.surface.push(row.surface);
    }

    /// Overwrites the attributes of `row` selected by `mask`.
    pub fn set(&mut self, row: usize, data: &InstanceRow, mask: AttributeMask) {
        if mask.contains(AttributeMask::MODEL) {
            self.model[row] = data.model;
            self.normal[row] = data.normal;
        }
        if mask.contains(AttributeMask::AMBIENT) {
            self.ambient[row] = data.ambient;
        }
        if mask.contains(AttributeMask::DIFFUSE) {
            self.diffuse[row] = data.diffuse;
        }
        if mask.contains(AttributeMask::SPECULAR) {
            self.specular[row] = data.specular;
        }
        if mask.intersects(AttributeMask::SURFACE) {
            self.surface[row] = data.surface;
        }
    }

    /// Moves the last row into `row`, shrinking by one.
    pub fn swap_remove(&mut self, row: usize) {
        self.model.swap_remove(row);
        self.normal.swap_remove(row);
        self.ambient.swap_remove(row);
        self.diffuse.swap_remove(row);
        self.specular.swap_remove(row);
        self.surface.swap_remove(row);
    }

    /// Grows with zeroed rows up to `len`.
    pub fn resize(&mut self, len: usize) {
        self.model.resize(len, [[0.0; 4]; 4]);
        self.normal.resize(len, [[0.0; 3]; 3]);
        self.ambient.resize(len, [0.0; 3]);
        self.diffuse.resize(len, [0.0; 3]);
        self.specular.resize(len, [0.0; 3]);
        self.surface.resize(len, [0.0; 3]);
    }

    pub fn clear(&mut self) {
        self.model.clear();
        self.normal.clear();
        self.ambient.clear();
        self.diffuse.clear();
        self.specular.clear();
        self.surface.clear();
    }

    pub fn row(&self, row: usize) -> InstanceRow {
        InstanceRow {
            model: self.model[row],
            normal: self.normal[row],
            ambient: self.ambient[row],
            diffuse: self.diffuse[row],
            specular: self.specular[row],
            surface: self.surface[row],
        }
    }

    /// Raw bytes of `attribute` for `rows`.
    pub fn bytes(&self, attribute: InstanceAttribute, rows: Range<usize>) -> &[u8] {
        match attribute {
            InstanceAttribute::Model => bytemuck::cast_slice(&self.model[rows]),
            InstanceAttribute::Normal => bytemuck::cast_slice(&self.normal[rows]),
            InstanceAttribute::Ambient => bytemuck::cast_slice(&self.ambient[rows]),
            InstanceAttribute::Diffuse => bytemuck::cast_slice(&self.diffuse[rows]),
            InstanceAttribute::Specular => bytemuck::cast_slice(&self.specular[rows]),
            InstanceAttribute::Surface => bytemuck::cast_slice(&self.surface[rows]),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{Vector3, Zero};

    use super::*;

    #[test]
    fn material_bits_touch_one_buffer_each() {
        let touched: Vec<_> = InstanceAttribute::for_mask(AttributeMask::DIFFUSE).collect();
        assert_eq!(touched, [InstanceAttribute::Diffuse]);
        let touched: Vec<_> = InstanceAttribute::for_mask(AttributeMask::ROUGHNESS).collect();
        assert_eq!(touched, [InstanceAttribute::Surface]);
        let touched: Vec<_> = InstanceAttribute::for_mask(AttributeMask::MODEL).collect();
        assert_eq!(touched, [InstanceAttribute::Model, InstanceAttribute::Normal]);
        assert_eq!(InstanceAttribute::for_mask(AttributeMask::all()).count(), 6);
    }

    #[test]
    fn strides_match_row_layout() {
        assert_eq!(InstanceAttribute::Model.stride(), 64);
        assert_eq!(InstanceAttribute::Normal.stride(), 36);
        assert_eq!(InstanceAttribute::Surface.stride(), 12);
        let columns = {
            let mut c = AttributeColumns::default();
            c.push(&InstanceRow::new(Matrix4::from_scale(2.0), &Material::default()));
            c
        };
        for attribute in InstanceAttribute::ALL {
            assert_eq!(columns.bytes(attribute, 0..1).len() as u64, attribute.stride());
        }
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 4.0);
        let n = normal_matrix(&model);
        assert_relative_eq!(n.x.x, 0.5);
        assert_relative_eq!(n.z.z, 0.25);
        let translated = Matrix4::from_translation(Vector3::new(3.0, 0.0, 0.0));
        assert_eq!(normal_matrix(&translated), Matrix3::identity());
        assert_eq!(normal_matrix(&Matrix4::zero()), Matrix3::zero());
    }

    #[test]
    fn masked_set_leaves_other_columns_alone() {
        let mut columns = AttributeColumns::default();
        let base = Material::default();
        columns.push(&InstanceRow::new(Matrix4::identity(), &base));

        let mut changed = base.clone();
        changed.diffuse = [0.0, 0.0, 0.0];
        changed.ambient = [9.0, 9.0, 9.0];
        columns.set(
            0,
            &InstanceRow::new(Matrix4::from_scale(3.0), &changed),
            AttributeMask::DIFFUSE,
        );

        let row = columns.row(0);
        assert_eq!(row.diffuse, [0.0, 0.0, 0.0]);
        assert_eq!(row.ambient, base.ambient);
        assert_eq!(row.model, Into::<[[f32; 4]; 4]>::into(Matrix4::<f32>::identity()));
    }

    #[test]
    fn swap_remove_moves_the_last_row() {
        let mut columns = AttributeColumns::default();
        for s in [1.0, 2.0, 3.0] {
            columns.push(&InstanceRow::new(Matrix4::from_scale(s), &Material::default()));
        }
        columns.swap_remove(0);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns.row(0).model[0][0], 3.0);
    }
}
