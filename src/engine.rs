//! The single top-level owner of a running renderer.
//!
//! [`Engine`] pairs the CPU [`World`] with the GPU [`Renderer`] and keeps
//! their resource tables in step: every mesh, texture, shader and effect is
//! registered in both, in the same order, so a registry index is also the
//! index of the GPU resource.

use std::sync::Arc;

use winit::window::Window;

use crate::{
    context::Context,
    data_structures::{
        mesh::MeshAsset,
        registry::{EffectId, Id, MeshId, ShaderId, TextureId},
        texture::Texture,
    },
    error::{EngineError, Result},
    pipelines::{
        Renderer,
        profiler::PassTiming,
        programs::{BUILTIN_EFFECTS, FORWARD_SOURCE},
    },
    settings::RenderSettings,
    shader::reflect,
    world::World,
};

/// Name of the geometry program every engine starts with.
pub const BASIC_SHADER: &str = "basic";

#[derive(Debug)]
pub struct Engine {
    ctx: Context,
    world: World,
    renderer: Renderer,
}

impl Engine {
    /// Creates an engine presenting to `window`.
    pub async fn windowed(window: Arc<Window>, settings: RenderSettings) -> Result<Self> {
        let ctx = Context::new(window).await?;
        Self::new(ctx, settings)
    }

    /// Creates an engine that only renders offscreen.
    pub async fn headless(width: u32, height: u32, settings: RenderSettings) -> Result<Self> {
        let ctx = Context::headless(width, height).await?;
        Self::new(ctx, settings)
    }

    /// Builds the world and renderer on an existing context and registers
    /// the `"basic"` shader plus the built-in effects.
    pub fn new(ctx: Context, settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        let renderer = Renderer::new(&ctx, &settings)?;
        let [width, height] = ctx.size();
        let world = World::new(width, height, settings);
        let mut engine = Self {
            ctx,
            world,
            renderer,
        };

        engine.new_shader(BASIC_SHADER, FORWARD_SOURCE)?;
        for (name, source) in BUILTIN_EFFECTS {
            engine.new_effect(name, source)?;
        }
        log::info!("engine ready");
        Ok(engine)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// The mutation API: transforms, materials, lights, instance groups.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn new_mesh(&mut self, name: &str, asset: &MeshAsset) -> Result<MeshId> {
        let id = self.world.add_mesh(name, asset)?;
        self.renderer.add_mesh(&self.ctx, name, asset);
        debug_assert_eq!(id.index() + 1, self.renderer.mesh_count());
        Ok(id)
    }

    pub fn new_texture(&mut self, name: &str, texture: Texture) -> Result<TextureId> {
        let id = self.world.add_texture(name, texture.size())?;
        self.renderer.add_texture(texture);
        Ok(id)
    }

    /// Decodes image file contents into a new texture.
    pub fn new_texture_from_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<TextureId> {
        let texture = Texture::from_bytes(&self.ctx.device, &self.ctx.queue, bytes, name, None, false)?;
        self.new_texture(name, texture)
    }

    /// Compiles a WGSL geometry program. Parse or validation errors are
    /// returned and nothing is registered.
    pub fn new_shader(&mut self, name: &str, source: &str) -> Result<ShaderId> {
        let reflection = reflect(name, source)?;
        let id = self.world.add_shader(name, reflection.clone())?;
        self.renderer.add_shader(&self.ctx, name, source, reflection);
        Ok(id)
    }

    /// Recompiles a shader in place. On error the old program keeps running.
    pub fn reload_shader(&mut self, name: &str, source: &str) -> Result<()> {
        let reflection = reflect(name, source)?;
        let id = self.world.replace_shader(name, reflection.clone())?;
        self.renderer.replace_shader(&self.ctx, id.index(), source, reflection);
        log::info!("shader '{name}' reloaded");
        Ok(())
    }

    /// Registers a post-processing effect, selectable through
    /// [`World::set_post_processing`].
    pub fn new_effect(&mut self, name: &str, source: &str) -> Result<EffectId> {
        let reflection = reflect(name, source)?;
        let id = self.world.add_effect(name, reflection.clone())?;
        self.renderer.add_effect(&self.ctx, name, source, reflection);
        Ok(id)
    }

    /// Uses a cube texture as sky and bakes ambient lighting from it.
    pub fn set_skybox(&mut self, sky: Texture) -> Result<()> {
        self.renderer.set_skybox(&self.ctx, sky)
    }

    pub fn set_skybox_from_images(&mut self, faces: &[image::DynamicImage; 6]) -> Result<()> {
        let sky = Texture::cube_from_images(&self.ctx.device, &self.ctx.queue, faces, "skybox")?;
        self.set_skybox(sky)
    }

    pub fn settings(&self) -> &RenderSettings {
        self.world.settings()
    }

    /// Applies new render settings. Targets depending on a changed sample
    /// count, bloom chain or shadow resolution are rebuilt before returning.
    ///
    /// On error neither the world nor the renderer changes.
    pub fn set_settings(&mut self, settings: RenderSettings) -> Result<()> {
        settings.validate()?;
        self.renderer.apply_settings(&self.ctx, &settings)?;
        self.world.set_settings(settings)
    }

    /// Sample count the forward pass actually renders with.
    pub fn samples(&self) -> u32 {
        self.renderer.samples()
    }

    /// Size of the render targets, which follows the surface.
    pub fn target_size(&self) -> [u32; 2] {
        self.renderer.size()
    }

    /// Bind groups built so far across every program. Stays flat once every
    /// pass of a frame has run.
    pub fn cached_bind_groups(&self) -> usize {
        self.renderer.cached_bind_groups()
    }

    /// Resizes the surface, the projection and every resolution-dependent
    /// target. Must not be called between `update` and `render`.
    pub fn update_dimensions(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.ctx.resize(width, height);
        self.world.update_dimensions(width, height);
        self.renderer.resize(&self.ctx)
    }

    /// Folds the mutations since the last update into derived state.
    pub fn update(&mut self) {
        self.world.update();
    }

    /// Renders the world as of the last update.
    pub fn render(&mut self) -> &Texture {
        let writes = self.world.take_pending_writes();
        self.renderer.render(&self.ctx, &self.world, &writes)
    }

    /// The finished frame of the last render.
    pub fn output(&self) -> &Texture {
        self.renderer.output()
    }

    /// Blits the last frame into `target`.
    pub fn present(&mut self, target: &wgpu::TextureView, format: wgpu::TextureFormat) {
        self.renderer
            .present(&self.ctx, self.world.settings(), target, format);
    }

    /// Renders and presents one frame to the window surface.
    pub fn frame(&mut self) -> Result<()> {
        self.update();
        self.render();
        let Some(surface) = &self.ctx.surface else {
            return Ok(());
        };
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let [width, height] = self.ctx.size();
                self.ctx.resize(width, height);
                return Ok(());
            }
            Err(e) => return Err(EngineError::Surface(e.to_string())),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let format = self.ctx.config.format;
        self.renderer
            .present(&self.ctx, self.world.settings(), &view, format);
        frame.present();
        Ok(())
    }

    /// Per-pass GPU times of the last measured frame. Empty unless profiling
    /// is on and the adapter supports timestamps.
    pub fn pass_timings(&self) -> &[PassTiming] {
        self.renderer.pass_timings()
    }
}
