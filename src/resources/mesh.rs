use std::io::{BufReader, Cursor};

use crate::{data_structures::mesh::MeshAsset, resources::load_string};

/// Loads every object of an OBJ file as a named mesh asset.
///
/// Materials referenced by the file are ignored; materials are created
/// through the engine instead.
pub async fn load_obj(file_name: &str) -> anyhow::Result<Vec<(String, MeshAsset)>> {
    let obj_text = load_string(file_name).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let (models, _) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| async { Err(tobj::LoadError::OpenFileFailed) },
    )
    .await?;

    let assets = obj_to_assets(&models);
    if assets.is_empty() {
        anyhow::bail!("'{file_name}' contains no triangles");
    }
    log::debug!("'{file_name}': {} meshes", assets.len());
    Ok(assets)
}

/// Converts single-index OBJ models into mesh assets. Missing normals or
/// uvs become zero; uvs are flipped to a top-left origin.
pub fn obj_to_assets(models: &[tobj::Model]) -> Vec<(String, MeshAsset)> {
    models
        .iter()
        .filter_map(|m| {
            let mesh = &m.mesh;
            if mesh.indices.is_empty() {
                log::warn!("object '{}' has no faces and is skipped", m.name);
                return None;
            }
            let count = mesh.positions.len() / 3;
            let normals = (0..count * 3)
                .map(|i| mesh.normals.get(i).copied().unwrap_or(0.0))
                .collect();
            let uvs = (0..count)
                .flat_map(|i| {
                    let u = mesh.texcoords.get(i * 2).copied().unwrap_or(0.0);
                    let v = mesh.texcoords.get(i * 2 + 1).copied().unwrap_or(0.0);
                    [u, 1.0 - v]
                })
                .collect();
            let mut asset = MeshAsset {
                vertices: mesh.positions.clone(),
                normals,
                uvs,
                indices: mesh.indices.clone(),
                ..Default::default()
            };
            asset.compute_bounds();
            Some((m.name.clone(), asset))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const QUAD: &str = "\
o quad
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
o empty
";

    fn parse(text: &str) -> Vec<tobj::Model> {
        let (models, _) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(text)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Err(tobj::LoadError::OpenFileFailed),
        )
        .unwrap();
        models
    }

    #[test]
    fn quad_is_triangulated_with_bounds() {
        let assets = obj_to_assets(&parse(QUAD));
        assert_eq!(assets.len(), 1);
        let (name, quad) = &assets[0];
        assert_eq!(name, "quad");
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.triangle_count(), 2);
        assert_eq!(quad.center, [0.0; 3]);
        assert_relative_eq!(quad.max_distance, 2f32.sqrt());
        assert!(quad.normals.iter().all(|&n| n == 0.0));
    }

    #[test]
    fn uvs_are_flipped_vertically() {
        let assets = obj_to_assets(&parse(QUAD));
        let uvs = &assets[0].1.uvs;
        assert_eq!(uvs.len(), 8);
        assert!(uvs.chunks(2).any(|uv| uv == [0.0, 1.0]));
        assert!(uvs.chunks(2).any(|uv| uv == [1.0, 0.0]));
    }
}
