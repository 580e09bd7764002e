//! The GPU side of a frame.
//!
//! [`Renderer`] owns every GPU resource: uploaded meshes and textures,
//! compiled programs, instance buffers, render targets and the uniform pool.
//! [`Renderer::render`] runs the passes in their fixed order and returns the
//! texture holding the finished frame:
//!
//! 1. shadow cube (gated)
//! 2. forward
//! 3. skybox (gated)
//! 4. resolve (when multisampled)
//! 5. bloom (gated)
//! 6. tonemap
//! 7. blur (when depth of field or effects need it)
//! 8. depth of field (gated)
//! 9. user effects (gated)
//!
//! Skipped passes never touch the ping-pong chain.

pub mod basic;
pub mod chain;
pub mod environment;
pub mod geometry;
pub mod pass;
pub mod post;
pub mod profiler;
pub mod programs;
pub mod targets;

use crate::{
    camera::CameraUniform,
    context::Context,
    data_structures::{
        mesh::{GpuMesh, MeshAsset},
        registry::Id,
        texture::{self, Texture},
    },
    error::Result,
    instancing::{FrameWrites, InstanceBuffers},
    pipelines::{
        chain::FramePlan,
        environment::EnvironmentMaps,
        geometry::GpuScene,
        profiler::{GpuProfiler, PassTiming},
        programs::Builtins,
        targets::{RenderTargets, ShadowTarget},
    },
    settings::RenderSettings,
    shader::{LightsUniform, Reflection, ShaderProgram, ShadowUniform, UniformPool, UniformSlot},
    world::World,
};

/// Initial row capacity of the solo instance buffers.
const SOLO_CAPACITY: usize = 64;
/// Depth bias applied when comparing against the shadow cube.
const SHADOW_BIAS: f32 = 0.005;

#[derive(Debug)]
struct Samplers {
    default: wgpu::Sampler,
    clamped: wgpu::Sampler,
    shadow: wgpu::Sampler,
}

/// Every GPU resource of the renderer, indexed like the world's registries.
#[derive(Debug)]
pub struct Renderer {
    pool: UniformPool,
    builtins: Builtins,
    shaders: Vec<ShaderProgram>,
    effects: Vec<ShaderProgram>,
    meshes: Vec<GpuMesh>,
    textures: Vec<Texture>,
    solo_buffers: InstanceBuffers,
    group_buffers: Vec<InstanceBuffers>,
    sky_cube: GpuMesh,
    skybox: Option<Texture>,
    environment: EnvironmentMaps,
    targets: RenderTargets,
    shadow: ShadowTarget,
    samplers: Samplers,
    profiler: GpuProfiler,
    /// Sample counts usable for both the HDR color and the depth target.
    supported_samples: Vec<u32>,
    bloom_mips: u32,
    started: instant::Instant,
    frame: u64,
}

impl Renderer {
    /// Creates the targets and built-in programs. Any target or program
    /// failing here is fatal.
    ///
    /// Texture 0 is the white `"default"` texture the world registers first.
    pub fn new(ctx: &Context, settings: &RenderSettings) -> Result<Self> {
        let device = &ctx.device;
        let mut pool = UniformPool::new(device);
        let mut builtins = Builtins::compile(device)?;

        let samplers = Samplers {
            default: texture::create_default_sampler(device),
            clamped: texture::create_clamped_sampler(device),
            shadow: texture::create_shadow_sampler(device),
        };
        pool.set_sampler(UniformSlot::DiffuseSampler, &samplers.default);
        pool.set_sampler(UniformSlot::ScreenSampler, &samplers.clamped);
        pool.set_sampler(UniformSlot::EnvironmentSampler, &samplers.clamped);
        pool.set_sampler(UniformSlot::ShadowSampler, &samplers.shadow);

        let color_samples = ctx.supported_samples(Texture::HDR_FORMAT);
        let depth_samples = ctx.supported_samples(Texture::DEPTH_FORMAT);
        let supported_samples: Vec<u32> = color_samples
            .into_iter()
            .filter(|count| depth_samples.contains(count))
            .collect();
        let samples = settings.effective_samples(&supported_samples);
        if samples != settings.samples.max(1) {
            log::warn!(
                "{}x multisampling unsupported, using {samples}x",
                settings.samples
            );
        }

        let targets = RenderTargets::new(device, ctx.size(), samples, settings.bloom_mips)?;
        let shadow = ShadowTarget::new(device, settings.shadow_resolution)?;
        pool.set_texture(UniformSlot::ShadowMap, &shadow.cube.view);

        let environment = EnvironmentMaps::neutral(ctx, &pool, &mut builtins)?;
        environment.attach(&mut pool);

        let default_texture = Texture::create_solid(device, &ctx.queue, [255; 4], "default")?;
        log::info!("renderer ready, {samples}x MSAA");

        Ok(Self {
            pool,
            builtins,
            shaders: Vec::new(),
            effects: Vec::new(),
            meshes: Vec::new(),
            textures: vec![default_texture],
            solo_buffers: InstanceBuffers::new(device, "solo", SOLO_CAPACITY),
            group_buffers: Vec::new(),
            sky_cube: GpuMesh::new(device, "sky cube", &MeshAsset::cube(1.0)),
            skybox: None,
            environment,
            targets,
            shadow,
            samplers,
            profiler: GpuProfiler::new(device, &ctx.queue),
            supported_samples,
            bloom_mips: settings.bloom_mips,
            started: instant::Instant::now(),
            frame: 0,
        })
    }

    pub fn samples(&self) -> u32 {
        self.targets.samples
    }

    pub fn add_mesh(&mut self, ctx: &Context, name: &str, asset: &MeshAsset) {
        self.meshes.push(GpuMesh::new(&ctx.device, name, asset));
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn add_texture(&mut self, texture: Texture) {
        self.textures.push(texture);
    }

    pub fn add_shader(&mut self, ctx: &Context, name: &str, source: &str, reflection: Reflection) {
        self.shaders
            .push(ShaderProgram::with_reflection(&ctx.device, name, source, reflection));
    }

    pub fn replace_shader(&mut self, ctx: &Context, index: usize, source: &str, reflection: Reflection) {
        self.shaders[index].replace(&ctx.device, source, reflection);
    }

    pub fn add_effect(&mut self, ctx: &Context, name: &str, source: &str, reflection: Reflection) {
        self.effects
            .push(ShaderProgram::with_reflection(&ctx.device, name, source, reflection));
    }

    /// Uses `sky` for the skybox pass and bakes the ambient maps from it.
    pub fn set_skybox(&mut self, ctx: &Context, sky: Texture) -> Result<()> {
        self.pool.set_texture(UniformSlot::Skybox, &sky.view);
        self.environment
            .bake(ctx, &self.pool, &mut self.builtins, &self.sky_cube, &sky)?;
        self.environment.attach(&mut self.pool);
        self.skybox = Some(sky);
        Ok(())
    }

    /// Recreates every resolution-dependent target.
    pub fn resize(&mut self, ctx: &Context) -> Result<()> {
        let size = ctx.size();
        if size == self.targets.size {
            return Ok(());
        }
        self.targets = RenderTargets::new(&ctx.device, size, self.targets.samples, self.bloom_mips)?;
        self.pool.invalidate();
        Ok(())
    }

    /// Recreates the targets affected by a sample count, bloom chain or
    /// shadow resolution change. Every target is created before any is
    /// replaced, so on error the renderer keeps running with the old ones.
    pub fn apply_settings(&mut self, ctx: &Context, settings: &RenderSettings) -> Result<()> {
        let samples = settings.effective_samples(&self.supported_samples);
        let targets = if samples != self.targets.samples || settings.bloom_mips != self.bloom_mips {
            Some(RenderTargets::new(&ctx.device, ctx.size(), samples, settings.bloom_mips)?)
        } else {
            None
        };
        let shadow = if settings.shadow_resolution != self.shadow.resolution {
            Some(ShadowTarget::new(&ctx.device, settings.shadow_resolution)?)
        } else {
            None
        };

        if let Some(targets) = targets {
            self.targets = targets;
            self.bloom_mips = settings.bloom_mips;
            for program in self.shaders.iter_mut() {
                program.clear_pipelines();
            }
            self.builtins.clear_pipelines();
        }
        if let Some(shadow) = shadow {
            self.shadow = shadow;
            self.pool.set_texture(UniformSlot::ShadowMap, &self.shadow.cube.view);
        }
        self.pool.invalidate();
        Ok(())
    }

    /// Size of the screen targets.
    pub fn size(&self) -> [u32; 2] {
        self.targets.size
    }

    /// Bind groups cached across every program.
    pub fn cached_bind_groups(&self) -> usize {
        self.shaders
            .iter()
            .chain(&self.effects)
            .map(ShaderProgram::cached_bind_groups)
            .sum::<usize>()
            + self.builtins.cached_bind_groups()
    }

    /// Replays the instance writes of the syncs since the last frame.
    fn upload_instances(&mut self, ctx: &Context, world: &World, writes: &FrameWrites) {
        let groups = world.batcher().groups();
        let fresh = self.group_buffers.len();
        for (id, name, group) in groups.iter().skip(fresh) {
            let mut buffers = InstanceBuffers::new(&ctx.device, name, group.len());
            buffers.upload_all(&ctx.device, &ctx.queue, group.columns());
            debug_assert_eq!(id.index(), self.group_buffers.len());
            self.group_buffers.push(buffers);
        }
        for (id, set) in &writes.groups {
            if id.index() >= fresh {
                continue;
            }
            let columns = groups.get(*id).columns();
            let buffers = &mut self.group_buffers[id.index()];
            if set.rebuild {
                buffers.upload_all(&ctx.device, &ctx.queue, columns);
            } else {
                buffers.write_rows(&ctx.device, &ctx.queue, columns, set.uploads());
            }
        }

        let solo = world.batcher().solo().columns();
        if writes.solo_grown {
            self.solo_buffers.upload_all(&ctx.device, &ctx.queue, solo);
        } else {
            self.solo_buffers
                .write_rows(&ctx.device, &ctx.queue, solo, &writes.solo);
        }
    }

    fn write_frame_uniforms(&self, ctx: &Context, world: &World, plan: &FramePlan) {
        let settings = world.settings();
        let queue = &ctx.queue;
        let pool = &self.pool;

        pool.write(
            queue,
            UniformSlot::Camera,
            &CameraUniform::new(world.camera(), world.projection()),
        );
        let lights = world.lights();
        pool.write(
            queue,
            UniformSlot::Lights,
            &LightsUniform::new(
                lights.positions(),
                lights.colors(),
                lights.strengths(),
                world.ambient_light(),
            ),
        );

        let mut shadow: ShadowUniform = bytemuck::Zeroable::zeroed();
        if let (Some(cube), Some(sun)) = (lights.shadow(), lights.sun()) {
            for (face, view_proj) in cube.view_proj.iter().enumerate() {
                shadow.view_proj[face] = (*view_proj).into();
            }
            shadow.light = [cube.position.x, cube.position.y, cube.position.z, cube.far];
            let enabled = if plan.shadow { 1.0 } else { 0.0 };
            shadow.params = [enabled, SHADOW_BIAS, sun.index() as f32, 0.0];
        } else {
            shadow.light[3] = 1.0;
            shadow.params = [0.0, SHADOW_BIAS, -1.0, 0.0];
        }
        pool.write(queue, UniformSlot::Shadow, &shadow);

        pool.write(
            queue,
            UniformSlot::Tonemap,
            &[settings.exposure, settings.gamma, 0.0, 0.0],
        );
        pool.write(
            queue,
            UniformSlot::Focus,
            &[settings.focus_distance, settings.focus_range, 0.0, 0.0],
        );
        let [width, height] = self.targets.size.map(|v| v as f32);
        pool.write(
            queue,
            UniformSlot::Screen,
            &[width, height, 1.0 / width, 1.0 / height],
        );
        pool.write(
            queue,
            UniformSlot::Frame,
            &[
                self.started.elapsed().as_secs_f32(),
                self.frame as f32,
                0.0,
                0.0,
            ],
        );
    }

    /// Renders one frame of `world` and returns the texture holding it.
    ///
    /// `writes` are the instance writes accumulated since the last frame.
    pub fn render(&mut self, ctx: &Context, world: &World, writes: &FrameWrites) -> &Texture {
        let settings = world.settings();
        self.profiler.begin_frame(&ctx.device, settings.profile);
        self.upload_instances(ctx, world, writes);

        let active: Vec<(usize, [f32; 4])> = world
            .active_effects()
            .iter()
            .map(|(id, params)| (id.index(), *params))
            .collect();
        let plan = FramePlan::new(
            settings,
            self.targets.samples,
            world.lights().shadow().is_some(),
            self.skybox.is_some(),
            active.len(),
        );
        self.write_frame_uniforms(ctx, world, &plan);
        let draws = world.frame_draws();
        log::trace!("frame {}: {plan:?}", self.frame);

        let Self {
            pool,
            builtins,
            shaders,
            effects,
            meshes,
            textures,
            solo_buffers,
            group_buffers,
            sky_cube,
            targets,
            shadow,
            samplers,
            profiler,
            ..
        } = self;
        targets.chain.reset();
        let scene = GpuScene {
            meshes: meshes.as_slice(),
            textures: textures.as_slice(),
            default_sampler: &samplers.default,
            solo: &*solo_buffers,
            groups: group_buffers.as_slice(),
        };

        if plan.shadow {
            geometry::shadow_pass(ctx, pool, &mut builtins.shadow, shadow, &scene, &draws, profiler);
        }
        let [r, g, b, a] = settings.clear_color.map(f64::from);
        geometry::forward_pass(
            ctx,
            pool,
            shaders,
            targets,
            &scene,
            &draws,
            wgpu::Color { r, g, b, a },
            profiler,
        );
        if plan.skybox {
            geometry::skybox_pass(ctx, pool, &mut builtins.skybox, targets, sky_cube, profiler);
        }
        if plan.resolve {
            post::resolve(ctx, pool, builtins, targets, profiler);
        }
        if plan.bloom {
            post::bloom(ctx, pool, builtins, targets, settings.bloom_strength, profiler);
        }
        post::tonemap(ctx, pool, builtins, targets, profiler);
        if plan.blur {
            post::blur(ctx, pool, builtins, targets, settings.blur_radius, profiler);
        }
        if plan.depth_of_field {
            post::depth_of_field(ctx, pool, builtins, targets, profiler);
        }
        post::effect_chain(ctx, pool, effects, &active, &plan, targets, profiler);

        pass::submit(ctx, "frame end", |encoder| profiler.end_frame(encoder));
        profiler.after_submit();
        self.frame += 1;
        self.targets.chain.front()
    }

    /// Draws the last rendered frame into `target`, converting to its format.
    pub fn present(
        &mut self,
        ctx: &Context,
        settings: &RenderSettings,
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
    ) {
        let srgb = if format.is_srgb() { 1.0 } else { 0.0 };
        self.pool.write(
            &ctx.queue,
            UniformSlot::Tonemap,
            &[settings.exposure, settings.gamma, srgb, 0.0],
        );
        let source = self.targets.chain.front();
        pass::submit(ctx, "present", |encoder| {
            let drawn = post::present(
                ctx,
                encoder,
                &self.pool,
                &mut self.builtins.present,
                source,
                target,
                format,
                &mut GpuProfiler::default(),
            );
            if !drawn {
                log::warn!("present skipped");
            }
        });
    }

    /// Timings of the most recently measured frame.
    pub fn pass_timings(&self) -> &[PassTiming] {
        self.profiler.timings()
    }

    /// The finished frame of the last [`render`](Self::render).
    pub fn output(&self) -> &Texture {
        self.targets.chain.front()
    }
}
