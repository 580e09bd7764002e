use std::sync::Arc;

use winit::window::Window;

use crate::error::{EngineError, Result};

/// The GPU handles every other part of the renderer works through.
///
/// A windowed context owns the surface it presents to; a headless one
/// only remembers a size and a color format so offscreen rendering and
/// tests go through the same code.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Option<Arc<Window>>,
    pub surface: Option<wgpu::Surface<'static>>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = Self::instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::Surface(e.to_string()))?;
        let adapter = Self::adapter(&instance, Some(&surface)).await?;
        let (device, queue) = Self::device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The present blit writes linear values and relies on an sRGB surface
        // for the encode; other formats come out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| EngineError::Surface("surface reports no formats".into()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "context ready: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            config.format,
            config.width,
            config.height
        );

        Ok(Self {
            window: Some(window),
            surface: Some(surface),
            adapter,
            device,
            queue,
            config,
        })
    }

    /// A context without a window, rendering into offscreen targets only.
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        let instance = Self::instance();
        let adapter = Self::adapter(&instance, None).await?;
        let (device, queue) = Self::device(&adapter).await?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!("headless context ready: {}", adapter.get_info().name);
        Ok(Self {
            window: None,
            surface: None,
            adapter,
            device,
            queue,
            config,
        })
    }

    fn instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        })
    }

    async fn adapter(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| {
                log::error!("adapter request failed: {e}");
                EngineError::Adapter
            })
    }

    async fn device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
        // Timestamps are optional; the profiler reports nothing without them.
        let required_features = adapter.features() & wgpu::Features::TIMESTAMP_QUERY;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features,
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| EngineError::Device(e.to_string()))
    }

    pub fn size(&self) -> [u32; 2] {
        [self.config.width, self.config.height]
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    /// Reconfigures the surface. Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
    }

    /// Sample counts the adapter supports for multisampled `format` targets.
    pub fn supported_samples(&self, format: wgpu::TextureFormat) -> Vec<u32> {
        let mut counts = self
            .adapter
            .get_texture_format_features(format)
            .flags
            .supported_sample_counts();
        if !counts.contains(&1) {
            counts.push(1);
        }
        counts
    }

    pub fn supports_timestamps(&self) -> bool {
        self.device.features().contains(wgpu::Features::TIMESTAMP_QUERY)
    }
}
