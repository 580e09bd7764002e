//! Mesh data: the asset record, its bounding sphere and the GPU buffers.

use std::collections::HashMap;

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::data_structures::model::ModelVertex;

/// A (center, radius) approximation of a spatial extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vector3<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: impl Into<Vector3<f32>>, radius: f32) -> Self {
        Self {
            center: center.into(),
            radius,
        }
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::new([0.0; 3], 0.0)
    }
}

/// Indexed mesh asset in flat-array form.
///
/// `center` and `max_distance` are trusted as given; index bounds are not
/// revalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshAsset {
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    pub center: [f32; 3],
    pub max_distance: f32,
}

impl MeshAsset {
    /// Builds an indexed mesh from an unindexed triangle list.
    ///
    /// Identical (position, normal, uv) corners collapse into one vertex.
    /// Missing normals or uvs are treated as zero.
    pub fn indexed(positions: &[[f32; 3]], normals: &[[f32; 3]], uvs: &[[f32; 2]]) -> Self {
        let mut asset = MeshAsset::default();
        let mut seen: HashMap<[u32; 8], u32> = HashMap::with_capacity(positions.len());

        for (i, position) in positions.iter().enumerate() {
            let normal = normals.get(i).copied().unwrap_or_default();
            let uv = uvs.get(i).copied().unwrap_or_default();
            let key = [
                position[0].to_bits(),
                position[1].to_bits(),
                position[2].to_bits(),
                normal[0].to_bits(),
                normal[1].to_bits(),
                normal[2].to_bits(),
                uv[0].to_bits(),
                uv[1].to_bits(),
            ];
            let next = (asset.vertices.len() / 3) as u32;
            let index = *seen.entry(key).or_insert_with(|| {
                asset.vertices.extend_from_slice(position);
                asset.normals.extend_from_slice(&normal);
                asset.uvs.extend_from_slice(&uv);
                next
            });
            asset.indices.push(index);
        }

        asset.compute_bounds();
        asset
    }

    /// Recomputes `center` (AABB midpoint) and `max_distance`.
    pub fn compute_bounds(&mut self) {
        if self.vertices.is_empty() {
            self.center = [0.0; 3];
            self.max_distance = 0.0;
            return;
        }
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in self.vertices.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        let center = Vector3::new(
            (min[0] + max[0]) * 0.5,
            (min[1] + max[1]) * 0.5,
            (min[2] + max[2]) * 0.5,
        );
        self.max_distance = self
            .vertices
            .chunks_exact(3)
            .map(|p| (Vector3::new(p[0], p[1], p[2]) - center).magnitude())
            .fold(0.0, f32::max);
        self.center = center.into();
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> BoundingSphere {
        BoundingSphere::new(self.center, self.max_distance)
    }

    pub fn to_vertices(&self) -> Vec<ModelVertex> {
        (0..self.vertex_count())
            .map(|i| ModelVertex {
                position: [
                    self.vertices[i * 3],
                    self.vertices[i * 3 + 1],
                    self.vertices[i * 3 + 2],
                ],
                tex_coords: [
                    self.uvs.get(i * 2).copied().unwrap_or(0.0),
                    self.uvs.get(i * 2 + 1).copied().unwrap_or(0.0),
                ],
                normal: [
                    self.normals.get(i * 3).copied().unwrap_or(0.0),
                    self.normals.get(i * 3 + 1).copied().unwrap_or(0.0),
                    self.normals.get(i * 3 + 2).copied().unwrap_or(0.0),
                ],
            })
            .collect()
    }

    /// Axis-aligned cube of half-extent `half` with flat face normals.
    pub fn cube(half: f32) -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let mut positions = Vec::with_capacity(36);
        let mut normals = Vec::with_capacity(36);
        let mut uvs = Vec::with_capacity(36);
        for (n, u, v) in FACES {
            let n = Vector3::from(n);
            let u = Vector3::from(u);
            let v = Vector3::from(v);
            let corner = |su: f32, sv: f32| ((n + u * su + v * sv) * half).into();
            let quad: [([f32; 3], [f32; 2]); 4] = [
                (corner(-1.0, -1.0), [0.0, 1.0]),
                (corner(1.0, -1.0), [1.0, 1.0]),
                (corner(1.0, 1.0), [1.0, 0.0]),
                (corner(-1.0, 1.0), [0.0, 0.0]),
            ];
            for i in [0, 1, 2, 0, 2, 3] {
                positions.push(quad[i].0);
                normals.push(n.into());
                uvs.push(quad[i].1);
            }
        }
        Self::indexed(&positions, &normals, &uvs)
    }
}

/// CPU-side mesh record kept in the resource table.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub bounds: BoundingSphere,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl From<&MeshAsset> for Mesh {
    fn from(asset: &MeshAsset) -> Self {
        Self {
            bounds: asset.bounds(),
            vertex_count: asset.vertex_count() as u32,
            index_count: asset.indices.len() as u32,
        }
    }
}

/// Vertex and index buffers of an uploaded mesh.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, name: &str, asset: &MeshAsset) -> Self {
        let vertices = asset.to_vertices();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Vertex Buffer")),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Index Buffer")),
            contents: bytemuck::cast_slice(&asset.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_elements: asset.indices.len() as u32,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// Triangle soup of a unit cube around `offset`, positions only.
    pub(crate) fn cube_soup(offset: [f32; 3]) -> Vec<[f32; 3]> {
        let c = |x: f32, y: f32, z: f32| [x + offset[0], y + offset[1], z + offset[2]];
        let v = [
            c(-1.0, -1.0, -1.0),
            c(1.0, -1.0, -1.0),
            c(1.0, 1.0, -1.0),
            c(-1.0, 1.0, -1.0),
            c(-1.0, -1.0, 1.0),
            c(1.0, -1.0, 1.0),
            c(1.0, 1.0, 1.0),
            c(-1.0, 1.0, 1.0),
        ];
        let tris: [[usize; 3]; 12] = [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 6, 2],
            [3, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        tris.iter().flat_map(|t| t.map(|i| v[i])).collect()
    }

    #[test]
    fn cube_soup_collapses_to_eight_vertices() {
        let asset = MeshAsset::indexed(&cube_soup([0.0; 3]), &[], &[]);
        assert_eq!(asset.vertex_count(), 8);
        assert_eq!(asset.triangle_count(), 12);
        assert!(asset.indices.iter().all(|&i| i < 8));
        assert_eq!(asset.center, [0.0; 3]);
        assert_relative_eq!(asset.max_distance, 3f32.sqrt());
    }

    #[test]
    fn center_is_the_aabb_midpoint() {
        let asset = MeshAsset::indexed(&cube_soup([2.0, 0.0, -1.0]), &[], &[]);
        assert_eq!(asset.center, [2.0, 0.0, -1.0]);
        assert_relative_eq!(asset.max_distance, 3f32.sqrt());
    }

    #[test]
    fn differing_normals_keep_vertices_apart() {
        let positions = [[0.0, 0.0, 0.0]; 2];
        let normals = [[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        let asset = MeshAsset::indexed(&positions, &normals, &[]);
        assert_eq!(asset.vertex_count(), 2);
        assert_eq!(asset.indices, [0, 1]);
    }

    #[test]
    fn flat_shaded_cube_has_four_corners_per_face() {
        let cube = MeshAsset::cube(0.5);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert_relative_eq!(cube.max_distance, 0.75f32.sqrt(), epsilon = 1e-6);
    }
}
