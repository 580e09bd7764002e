use crate::{data_structures::texture::Texture, resources::load_binary};

/// Loads an image file as an sRGB texture.
pub async fn load_texture(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Texture> {
    let data = load_binary(file_name).await?;
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str());
    Texture::from_bytes(device, queue, &data, file_name, extension, false)
}

/// Loads six face images, in +X, -X, +Y, -Y, +Z, -Z order, as a cube map.
pub async fn load_cubemap(
    faces: [&str; 6],
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Texture> {
    let files = futures::future::try_join_all(faces.iter().map(|face| load_binary(face))).await?;
    let images = files
        .iter()
        .zip(faces)
        .map(|(bytes, name)| {
            image::load_from_memory(bytes).map_err(|e| anyhow::anyhow!("cube face '{name}': {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let images: [image::DynamicImage; 6] = images
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected six cube faces"))?;
    Texture::cube_from_images(device, queue, &images, "skybox")
}
