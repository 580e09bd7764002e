//! The passes that draw scene geometry: shadow cube, forward and skybox.

use crate::{
    context::Context,
    data_structures::{mesh::GpuMesh, registry::Id, texture::Texture},
    instancing::InstanceBuffers,
    pipelines::{
        basic::{BlendMode, DepthMode, PipelineKey},
        pass::{self, color_attachment, depth_attachment},
        profiler::GpuProfiler,
        targets::{RenderTargets, ShadowTarget},
    },
    render::FrameDraws,
    shader::{
        Override, ShaderProgram, UniformPool, UniformSlot,
        binder::{Bound, per_draw_group},
    },
};

/// The GPU resources the geometry passes draw from, indexed like the
/// world's registries.
#[derive(Debug, Clone, Copy)]
pub struct GpuScene<'a> {
    pub meshes: &'a [GpuMesh],
    pub textures: &'a [Texture],
    pub default_sampler: &'a wgpu::Sampler,
    pub solo: &'a InstanceBuffers,
    pub groups: &'a [InstanceBuffers],
}

impl<'a> GpuScene<'a> {
    fn texture_overrides(&self, texture: usize) -> [Override; 2] {
        let texture = &self.textures[texture];
        let sampler = texture.sampler.as_ref().unwrap_or(self.default_sampler);
        [
            (UniformSlot::DiffuseTexture, Bound::from(&texture.view)),
            (UniformSlot::DiffuseSampler, Bound::from(sampler)),
        ]
    }
}

fn bind_mesh(render_pass: &mut wgpu::RenderPass<'_>, mesh: &GpuMesh) {
    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
}

/// Sets the pipeline and every bind group, with `texture` in the per-draw
/// slots. Returns `false` if the program cannot be bound.
fn bind_program(
    render_pass: &mut wgpu::RenderPass<'_>,
    pool: &UniformPool,
    program: &ShaderProgram,
    key: &PipelineKey,
    scene: &GpuScene<'_>,
    texture: usize,
) -> bool {
    program.bind(render_pass, pool, key, &scene.texture_overrides(texture))
}

/// Rebinds only the group holding the per-draw texture slots.
fn bind_texture(
    render_pass: &mut wgpu::RenderPass<'_>,
    pool: &UniformPool,
    program: &ShaderProgram,
    key: &PipelineKey,
    scene: &GpuScene<'_>,
    texture: usize,
) -> bool {
    let Some(group) = per_draw_group(program) else {
        return true;
    };
    program.bind_group(render_pass, pool, key, group, &scene.texture_overrides(texture))
}

/// Replays the solo draw list and the instance groups into `render_pass`.
///
/// `program_for` picks the program of a draw from its own shader; the
/// shadow pass ignores it and draws everything with one program.
fn draw_geometry<'p>(
    render_pass: &mut wgpu::RenderPass<'_>,
    pool: &UniformPool,
    key: &PipelineKey,
    scene: &GpuScene<'_>,
    draws: &FrameDraws,
    program_for: impl Fn(usize) -> &'p ShaderProgram,
    per_draw_binds: bool,
) -> u32 {
    let mut draw_calls = 0;
    let mut pipeline_ok = !per_draw_binds;
    let mut texture_ok = true;
    let mut bound_mesh = None;

    scene.solo.bind(render_pass);
    for command in draws.solo.commands() {
        let item = command.item;
        if per_draw_binds {
            let program = program_for(item.shader.index());
            if command.bind_pipeline {
                pipeline_ok = bind_program(render_pass, pool, program, key, scene, item.texture.index());
                texture_ok = pipeline_ok;
            } else if command.bind_texture && pipeline_ok {
                texture_ok = bind_texture(render_pass, pool, program, key, scene, item.texture.index());
            }
            if !(pipeline_ok && texture_ok) {
                continue;
            }
        }
        let mesh = &scene.meshes[item.mesh.index()];
        if command.bind_mesh || bound_mesh != Some(item.mesh) {
            bind_mesh(render_pass, mesh);
            bound_mesh = Some(item.mesh);
        }
        let row = item.entity.index() as u32;
        render_pass.draw_indexed(0..mesh.num_elements, 0, row..row + 1);
        draw_calls += 1;
    }

    for group in &draws.groups {
        let Some(buffers) = scene.groups.get(group.group.index()) else {
            continue;
        };
        if per_draw_binds
            && !bind_program(
                render_pass,
                pool,
                program_for(group.shader.index()),
                key,
                scene,
                group.texture.index(),
            )
        {
            continue;
        }
        let mesh = &scene.meshes[group.mesh.index()];
        buffers.bind(render_pass);
        bind_mesh(render_pass, mesh);
        render_pass.draw_indexed(0..mesh.num_elements, 0, 0..group.count);
        draw_calls += 1;
    }
    draw_calls
}

/// Renders depth from the snapped sun position into all six cube faces.
#[allow(clippy::too_many_arguments)]
pub fn shadow_pass(
    ctx: &Context,
    pool: &UniformPool,
    program: &mut ShaderProgram,
    target: &ShadowTarget,
    scene: &GpuScene<'_>,
    draws: &FrameDraws,
    profiler: &mut GpuProfiler,
) {
    let key = PipelineKey {
        color_format: None,
        blend: BlendMode::Replace,
        depth: DepthMode::OPAQUE,
        samples: 1,
        cull: None,
    };
    if !program.prepare_bindings(&ctx.device, pool, key, &[]) {
        return;
    }
    let program = &*program;

    for (face, view) in target.faces.iter().enumerate() {
        pool.write(&ctx.queue, UniformSlot::ShadowFace, &[face as u32, 0, 0, 0]);
        pass::submit(ctx, "shadow", |encoder| {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow"),
                color_attachments: &[],
                depth_stencil_attachment: Some(depth_attachment(view, wgpu::LoadOp::Clear(1.0))),
                occlusion_query_set: None,
                timestamp_writes: profiler.timestamp_writes("shadow"),
            });
            if program.bind(&mut render_pass, pool, &key, &[]) {
                draw_geometry(&mut render_pass, pool, &key, scene, draws, |_| program, false);
            }
        });
    }
    log::trace!("shadow pass: {} faces", target.faces.len());
}

/// Draws every visible entity into the forward color and depth targets.
#[allow(clippy::too_many_arguments)]
pub fn forward_pass(
    ctx: &Context,
    pool: &UniformPool,
    shaders: &mut [ShaderProgram],
    targets: &RenderTargets,
    scene: &GpuScene<'_>,
    draws: &FrameDraws,
    clear: wgpu::Color,
    profiler: &mut GpuProfiler,
) {
    let key = PipelineKey {
        color_format: Some(Texture::HDR_FORMAT),
        blend: BlendMode::Replace,
        depth: DepthMode::OPAQUE,
        samples: targets.samples,
        cull: Some(wgpu::Face::Back),
    };
    for (shader, texture) in draws.bindings() {
        let overrides = scene.texture_overrides(texture.index());
        shaders[shader.index()].prepare_bindings(&ctx.device, pool, key, &overrides);
    }
    let shaders = &*shaders;

    pass::submit(ctx, "forward", |encoder| {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("forward"),
            color_attachments: &[Some(color_attachment(
                &targets.forward_color().view,
                wgpu::LoadOp::Clear(clear),
            ))],
            depth_stencil_attachment: Some(depth_attachment(
                &targets.depth.view,
                wgpu::LoadOp::Clear(1.0),
            )),
            occlusion_query_set: None,
            timestamp_writes: profiler.timestamp_writes("forward"),
        });
        let calls = draw_geometry(
            &mut render_pass,
            pool,
            &key,
            scene,
            draws,
            |shader| &shaders[shader],
            true,
        );
        log::trace!("forward pass: {calls} draw calls");
    });
}

/// Draws the sky cube behind the geometry already in the forward targets.
pub fn skybox_pass(
    ctx: &Context,
    pool: &UniformPool,
    program: &mut ShaderProgram,
    targets: &RenderTargets,
    cube: &GpuMesh,
    profiler: &mut GpuProfiler,
) {
    let key = PipelineKey {
        color_format: Some(Texture::HDR_FORMAT),
        blend: BlendMode::Replace,
        depth: DepthMode::SKY,
        samples: targets.samples,
        cull: None,
    };
    if !program.prepare_bindings(&ctx.device, pool, key, &[]) {
        return;
    }
    let program = &*program;

    pass::submit(ctx, "skybox", |encoder| {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("skybox"),
            color_attachments: &[Some(color_attachment(
                &targets.forward_color().view,
                wgpu::LoadOp::Load,
            ))],
            depth_stencil_attachment: Some(depth_attachment(&targets.depth.view, wgpu::LoadOp::Load)),
            occlusion_query_set: None,
            timestamp_writes: profiler.timestamp_writes("skybox"),
        });
        if program.bind(&mut render_pass, pool, &key, &[]) {
            bind_mesh(&mut render_pass, cube);
            render_pass.draw_indexed(0..cube.num_elements, 0, 0..1);
        }
    });
}
