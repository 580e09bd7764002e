//! Screen-space passes between the forward pass and presentation.
//!
//! Every pass here reads `chain.front()` and, unless noted, writes
//! `chain.back()` and swaps. A pass that fails to bind leaves the chain
//! untouched so the frame degrades to the image before it.

use crate::{
    context::Context,
    data_structures::texture::Texture,
    pipelines::{
        basic::{BlendMode, DepthMode, PipelineKey},
        chain::{FramePlan, run_post_chain},
        pass::{self, depth_attachment},
        profiler::GpuProfiler,
        programs::Builtins,
        targets::RenderTargets,
    },
    shader::{Override, ShaderProgram, UniformPool, UniformSlot, binder::Bound},
};

fn screen_key() -> PipelineKey {
    PipelineKey::screen(Texture::HDR_FORMAT)
}

fn view(texture: &Texture) -> Bound {
    Bound::from(&texture.view)
}

/// Resolves the multisampled color into the chain front and the
/// multisampled depth into `resolved_depth`.
pub fn resolve(
    ctx: &Context,
    pool: &UniformPool,
    builtins: &mut Builtins,
    targets: &RenderTargets,
    profiler: &mut GpuProfiler,
) {
    let (Some(multisampled), Some(resolved_depth)) = (&targets.multisampled, &targets.resolved_depth)
    else {
        return;
    };

    let key = PipelineKey {
        color_format: None,
        blend: BlendMode::Replace,
        depth: DepthMode::OVERWRITE,
        samples: 1,
        cull: None,
    };
    let overrides = [(UniformSlot::DepthMsTexture, view(&targets.depth))];
    let ready = builtins
        .depth_resolve
        .prepare_bindings(&ctx.device, pool, key, &overrides);
    let program = &builtins.depth_resolve;

    pass::submit(ctx, "resolve", |encoder| {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("color resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &multisampled.view,
                resolve_target: Some(&targets.chain.front().view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Discard,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: profiler.timestamp_writes("color resolve"),
        });

        if !ready {
            return;
        }
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depth resolve"),
            color_attachments: &[],
            depth_stencil_attachment: Some(depth_attachment(
                &resolved_depth.view,
                wgpu::LoadOp::Clear(1.0),
            )),
            occlusion_query_set: None,
            timestamp_writes: profiler.timestamp_writes("depth resolve"),
        });
        if program.bind(&mut render_pass, pool, &key, &overrides) {
            render_pass.draw(0..3, 0..1);
        }
    });
}

/// Downsamples the front image through the bloom mips, adds them back up
/// and blends the result over the front image.
pub fn bloom(
    ctx: &Context,
    pool: &UniformPool,
    builtins: &mut Builtins,
    targets: &mut RenderTargets,
    strength: f32,
    profiler: &mut GpuProfiler,
) {
    if targets.bloom_mips.is_empty() {
        return;
    }
    pool.write(&ctx.queue, UniformSlot::Bloom, &[strength, 0.005, 0.0, 0.0]);

    let mut composited = false;
    pass::submit(ctx, "bloom", |encoder| {
        let mut source = targets.chain.front();
        for mip in &targets.bloom_mips {
            let drawn = pass::screen_pass(
                ctx,
                encoder,
                pool,
                &mut builtins.bloom_downsample,
                screen_key(),
                &mip.view,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &[(UniformSlot::ScreenTexture, view(source))],
                profiler,
            );
            if !drawn {
                return;
            }
            source = mip;
        }

        let additive = screen_key().with_blend(BlendMode::Additive);
        for pair in targets.bloom_mips.windows(2).rev() {
            let (larger, smaller) = (&pair[0], &pair[1]);
            pass::screen_pass(
                ctx,
                encoder,
                pool,
                &mut builtins.bloom_upsample,
                additive,
                &larger.view,
                wgpu::LoadOp::Load,
                &[(UniformSlot::ScreenTexture, view(smaller))],
                profiler,
            );
        }

        composited = pass::screen_pass(
            ctx,
            encoder,
            pool,
            &mut builtins.bloom_composite,
            screen_key(),
            &targets.chain.back().view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &[
                (UniformSlot::ScreenTexture, view(targets.chain.front())),
                (UniformSlot::BloomTexture, view(&targets.bloom_mips[0])),
            ],
            profiler,
        );
    });
    if composited {
        targets.chain.swap();
    }
}

/// Maps HDR to display range with the exposure already in the tonemap
/// uniform.
pub fn tonemap(
    ctx: &Context,
    pool: &UniformPool,
    builtins: &mut Builtins,
    targets: &mut RenderTargets,
    profiler: &mut GpuProfiler,
) {
    let mut drawn = false;
    pass::submit(ctx, "tonemap", |encoder| {
        drawn = pass::screen_pass(
            ctx,
            encoder,
            pool,
            &mut builtins.tonemap,
            screen_key(),
            &targets.chain.back().view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &[(UniformSlot::ScreenTexture, view(targets.chain.front()))],
            profiler,
        );
    });
    if drawn {
        targets.chain.swap();
    }
}

/// Separable gaussian blur of the front image into `blurred`. The chain
/// does not move.
pub fn blur(
    ctx: &Context,
    pool: &UniformPool,
    builtins: &mut Builtins,
    targets: &RenderTargets,
    radius: f32,
    profiler: &mut GpuProfiler,
) {
    let passes = [
        ([1.0, 0.0], targets.chain.front(), &targets.blur_scratch),
        ([0.0, 1.0], &targets.blur_scratch, &targets.blurred),
    ];
    for ([x, y], source, target) in passes {
        pool.write(&ctx.queue, UniformSlot::Blur, &[x, y, radius, 0.0]);
        pass::submit(ctx, "blur", |encoder| {
            pass::screen_pass(
                ctx,
                encoder,
                pool,
                &mut builtins.blur,
                screen_key(),
                &target.view,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &[(UniformSlot::ScreenTexture, view(source))],
                profiler,
            );
        });
    }
}

/// Mixes the sharp and blurred images by distance from the focus depth.
pub fn depth_of_field(
    ctx: &Context,
    pool: &UniformPool,
    builtins: &mut Builtins,
    targets: &mut RenderTargets,
    profiler: &mut GpuProfiler,
) {
    let mut drawn = false;
    pass::submit(ctx, "depth of field", |encoder| {
        drawn = pass::screen_pass(
            ctx,
            encoder,
            pool,
            &mut builtins.dof,
            screen_key(),
            &targets.chain.back().view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &[
                (UniformSlot::ScreenTexture, view(targets.chain.front())),
                (UniformSlot::BlurredTexture, view(&targets.blurred)),
                (UniformSlot::DepthTexture, view(targets.scene_depth())),
            ],
            profiler,
        );
    });
    if drawn {
        targets.chain.swap();
    }
}

fn copy_color(encoder: &mut wgpu::CommandEncoder, from: &Texture, to: &Texture) {
    encoder.copy_texture_to_texture(
        from.texture.as_image_copy(),
        to.texture.as_image_copy(),
        from.texture.size(),
    );
}

/// Runs the active effects in order, alternating between the two chain
/// targets, and leaves the result in the target that was front before.
/// Does nothing unless `plan` runs post-processing.
///
/// An effect that cannot be bound passes its input through unchanged.
#[allow(clippy::too_many_arguments)]
pub fn effect_chain(
    ctx: &Context,
    pool: &UniformPool,
    effects: &mut [ShaderProgram],
    active: &[(usize, [f32; 4])],
    plan: &FramePlan,
    targets: &RenderTargets,
    profiler: &mut GpuProfiler,
) {
    let (steps, copy_back) = plan.post_chain(active.len(), targets.chain.front_slot());
    run_post_chain(
        &targets.chain,
        &steps,
        copy_back,
        |step, read, write| {
            let (effect, params) = active[step.effect];
            pool.write(&ctx.queue, UniformSlot::EffectParams, &params);
            let program = &mut effects[effect];
            let name = program.name().to_string();
            pass::submit(ctx, &name, |encoder| {
                let overrides: [Override; 2] = [
                    (UniformSlot::ScreenTexture, view(read)),
                    (UniformSlot::BlurredTexture, view(&targets.blurred)),
                ];
                let drawn = pass::screen_pass(
                    ctx,
                    encoder,
                    pool,
                    program,
                    screen_key(),
                    &write.view,
                    wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    &overrides,
                    profiler,
                );
                if !drawn {
                    log::debug!("effect '{name}' passed through");
                    copy_color(encoder, read, write);
                }
            });
        },
        |from, to| {
            pass::submit(ctx, "post copy back", |encoder| copy_color(encoder, from, to));
        },
    );
}

/// Writes the front image to `target`, gamma encoding unless the target
/// format already is sRGB.
///
/// `encoder` is the frame's final encoder; the caller submits it.
#[allow(clippy::too_many_arguments)]
pub fn present(
    ctx: &Context,
    encoder: &mut wgpu::CommandEncoder,
    pool: &UniformPool,
    program: &mut ShaderProgram,
    source: &Texture,
    target: &wgpu::TextureView,
    format: wgpu::TextureFormat,
    profiler: &mut GpuProfiler,
) -> bool {
    pass::screen_pass(
        ctx,
        encoder,
        pool,
        program,
        PipelineKey::screen(format),
        target,
        wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        &[(UniformSlot::ScreenTexture, view(source))],
        profiler,
    )
}
