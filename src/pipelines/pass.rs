//! Helpers shared by the passes.

use crate::{
    context::Context,
    pipelines::{basic::PipelineKey, profiler::GpuProfiler},
    shader::{Override, ShaderProgram, UniformPool},
};

/// Records one pass into its own encoder and submits it, so uniform writes
/// made before the next pass do not leak into this one.
pub fn submit(ctx: &Context, label: &str, record: impl FnOnce(&mut wgpu::CommandEncoder)) {
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    record(&mut encoder);
    ctx.queue.submit(std::iter::once(encoder.finish()));
}

pub fn color_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    }
}

pub fn depth_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<f32>,
) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

/// Draws a fullscreen triangle with `program` into `target`.
///
/// Returns `false` without recording anything when the program cannot be
/// bound; the caller decides how the frame degrades.
#[allow(clippy::too_many_arguments)]
pub fn screen_pass(
    ctx: &Context,
    encoder: &mut wgpu::CommandEncoder,
    pool: &UniformPool,
    program: &mut ShaderProgram,
    key: PipelineKey,
    target: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    overrides: &[Override],
    profiler: &mut GpuProfiler,
) -> bool {
    if !program.prepare_bindings(&ctx.device, pool, key, overrides) {
        return false;
    }
    let program = &*program;

    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(program.name()),
        color_attachments: &[Some(color_attachment(target, load))],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: profiler.timestamp_writes(program.name()),
    });
    let bound = program.bind(&mut render_pass, pool, &key, overrides);
    if bound {
        render_pass.draw(0..3, 0..1);
    }
    bound
}
