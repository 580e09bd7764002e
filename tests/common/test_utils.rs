#![allow(dead_code)]

use std::time::Duration;

use lumen_ngin::{Engine, RenderSettings};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 64;
pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Settings with every optional pass off and a black background.
pub fn plain_settings() -> RenderSettings {
    RenderSettings {
        shadow_map: false,
        bloom: false,
        samples: 1,
        clear_color: [0.0, 0.0, 0.0, 1.0],
        ..Default::default()
    }
}

pub fn headless_engine(settings: RenderSettings) -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    futures::executor::block_on(Engine::headless(WIDTH, HEIGHT, settings))
        .expect("Failed to create a headless engine.")
}

/// Updates, renders and presents one frame into an offscreen texture of the
/// engine's current size, then reads it back.
pub fn render_frame(engine: &mut Engine) -> image::RgbaImage {
    engine.update();
    engine.render();

    let [width, height] = engine.context().size();
    let device = &engine.context().device;
    let extent = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Golden Image Test Output Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    engine.present(&view, FORMAT);

    // Rows of a texture copy have to be 256-byte aligned.
    let unpadded = 4 * width;
    let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let ctx = engine.context();
    let output_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: None,
        size: (padded * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        extent,
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    futures::executor::block_on(async {
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        ctx.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .unwrap();
        rx.receive().await.unwrap().unwrap();
        let data = buffer_slice.get_mapped_range();
        let pixels: Vec<u8> = data
            .chunks(padded as usize)
            .flat_map(|row| &row[..unpadded as usize])
            .copied()
            .collect();
        image::RgbaImage::from_raw(width, height, pixels).unwrap()
    })
}
