//! Image-based ambient lighting.
//!
//! The forward program samples three maps: an irradiance cube for diffuse
//! ambient light, a prefiltered cube whose mips hold the sky convolved for
//! increasing roughness, and a 2D BRDF lookup table. The LUT does not depend
//! on the sky and is baked once; the cubes are baked whenever a skybox is
//! set. Until then both cubes are 1x1 and uniformly gray.

use cgmath::Vector3;

use crate::{
    camera::CameraUniform,
    context::Context,
    data_structures::{
        light::{cube_face_views, cube_projection},
        mesh::GpuMesh,
        texture::Texture,
    },
    error::{EngineError, Result},
    pipelines::{
        basic::PipelineKey,
        pass::{self, color_attachment},
        profiler::GpuProfiler,
        programs::Builtins,
    },
    shader::{ShaderProgram, UniformPool, UniformSlot},
};

pub const IRRADIANCE_SIZE: u32 = 32;
pub const PREFILTER_SIZE: u32 = 128;
/// Must stay in line with the highest LOD the forward program samples.
pub const PREFILTER_MIPS: u32 = 5;
pub const BRDF_LUT_SIZE: u32 = 256;

const NEUTRAL_AMBIENT: wgpu::Color = wgpu::Color {
    r: 0.03,
    g: 0.03,
    b: 0.03,
    a: 1.0,
};

#[derive(Debug)]
pub struct EnvironmentMaps {
    pub irradiance: Texture,
    pub prefilter: Texture,
    pub brdf_lut: Texture,
}

impl EnvironmentMaps {
    /// Gray cubes and a freshly baked BRDF LUT.
    pub fn neutral(ctx: &Context, pool: &UniformPool, builtins: &mut Builtins) -> Result<Self> {
        let irradiance = Texture::create_cube(&ctx.device, 1, 1, Texture::HDR_FORMAT, "irradiance (neutral)");
        let prefilter = Texture::create_cube(&ctx.device, 1, 1, Texture::HDR_FORMAT, "prefilter (neutral)");
        clear_cube(ctx, &irradiance, 1, NEUTRAL_AMBIENT);
        clear_cube(ctx, &prefilter, 1, NEUTRAL_AMBIENT);
        let brdf_lut = bake_brdf_lut(ctx, pool, &mut builtins.brdf)?;
        Ok(Self {
            irradiance,
            prefilter,
            brdf_lut,
        })
    }

    /// Convolves `sky` into new irradiance and prefilter cubes. The BRDF LUT
    /// is kept.
    ///
    /// `pool` must already hold `sky` in its skybox slot. The camera uniform
    /// is overwritten face by face and has to be rewritten before drawing.
    pub fn bake(
        &mut self,
        ctx: &Context,
        pool: &UniformPool,
        builtins: &mut Builtins,
        cube: &GpuMesh,
        sky: &Texture,
    ) -> Result<()> {
        let irradiance = Texture::create_cube(
            &ctx.device,
            IRRADIANCE_SIZE,
            1,
            Texture::HDR_FORMAT,
            "irradiance",
        );
        let prefilter = Texture::create_cube(
            &ctx.device,
            PREFILTER_SIZE,
            PREFILTER_MIPS,
            Texture::HDR_FORMAT,
            "prefilter",
        );

        render_cube(ctx, pool, &mut builtins.irradiance, cube, &irradiance, 0)?;
        let sky_size = sky.size()[0] as f32;
        for mip in 0..PREFILTER_MIPS {
            let roughness = mip as f32 / (PREFILTER_MIPS - 1) as f32;
            pool.write(&ctx.queue, UniformSlot::Environment, &[roughness, sky_size, 0.0, 0.0]);
            render_cube(ctx, pool, &mut builtins.prefilter, cube, &prefilter, mip)?;
        }

        self.irradiance = irradiance;
        self.prefilter = prefilter;
        log::info!("environment maps baked");
        Ok(())
    }

    /// Points the pool's environment slots at these maps.
    pub fn attach(&self, pool: &mut UniformPool) {
        pool.set_texture(UniformSlot::IrradianceMap, &self.irradiance.view);
        pool.set_texture(UniformSlot::PrefilterMap, &self.prefilter.view);
        pool.set_texture(UniformSlot::BrdfLut, &self.brdf_lut.view);
    }
}

fn clear_cube(ctx: &Context, cube: &Texture, mips: u32, color: wgpu::Color) {
    pass::submit(ctx, "clear cube", |encoder| {
        for mip in 0..mips {
            for face in 0..6 {
                let view = cube.face_view(face, mip);
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("clear cube face"),
                    color_attachments: &[Some(color_attachment(&view, wgpu::LoadOp::Clear(color)))],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
            }
        }
    });
}

/// Draws the unit cube from its center into all six faces of `target` at
/// `mip`, one submission per face.
fn render_cube(
    ctx: &Context,
    pool: &UniformPool,
    program: &mut ShaderProgram,
    cube: &GpuMesh,
    target: &Texture,
    mip: u32,
) -> Result<()> {
    let key = PipelineKey::screen(Texture::HDR_FORMAT);
    if !program.prepare_bindings(&ctx.device, pool, key, &[]) {
        return Err(missing_binding(program.name()));
    }
    let program = &*program;
    let projection = cube_projection(0.1, 10.0);

    for (face, view) in cube_face_views(Vector3::new(0.0, 0.0, 0.0)).into_iter().enumerate() {
        pool.write(
            &ctx.queue,
            UniformSlot::Camera,
            &CameraUniform {
                view: view.into(),
                projection: projection.into(),
                sky: (projection * view).into(),
                position: [0.0; 4],
            },
        );
        let face_view = target.face_view(face as u32, mip);
        pass::submit(ctx, program.name(), |encoder| {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.name()),
                color_attachments: &[Some(color_attachment(
                    &face_view,
                    wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                ))],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if !program.bind(&mut render_pass, pool, &key, &[]) {
                return;
            }
            render_pass.set_vertex_buffer(0, cube.vertex_buffer.slice(..));
            render_pass.set_index_buffer(cube.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..cube.num_elements, 0, 0..1);
        });
    }
    Ok(())
}

fn bake_brdf_lut(ctx: &Context, pool: &UniformPool, program: &mut ShaderProgram) -> Result<Texture> {
    let lut = Texture::create_render_target(
        &ctx.device,
        [BRDF_LUT_SIZE, BRDF_LUT_SIZE],
        Texture::HDR_FORMAT,
        1,
        "brdf lut",
    );
    let mut drawn = false;
    pass::submit(ctx, "brdf lut", |encoder| {
        drawn = pass::screen_pass(
            ctx,
            encoder,
            pool,
            program,
            PipelineKey::screen(Texture::HDR_FORMAT),
            &lut.view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &[],
            &mut GpuProfiler::default(),
        );
    });
    if !drawn {
        return Err(missing_binding(program.name()));
    }
    Ok(lut)
}

fn missing_binding(program: &str) -> EngineError {
    EngineError::ShaderCompile {
        program: program.to_string(),
        reason: "built-in program could not be bound".into(),
    }
}
