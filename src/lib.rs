//! lumen-ngin
//!
//! A multi-pass 3D scene renderer built around instancing. Entities are
//! kept in a dirty-tracked scene store, culled against the camera frustum
//! and drawn either on their own or through instance groups whose GPU
//! buffers are patched incrementally. Frames run through a fixed sequence
//! of passes (shadow cube, forward, skybox, resolve, bloom, tonemap, depth
//! of field, user effects) over a pair of ping-pong targets.
//!
//! High-level modules
//! - `engine`: the top-level owner pairing the world with the renderer
//! - `world`: resource tables, scene store, lights, batcher and culler plus
//!   the public mutation API
//! - `scene`: transforms and derived matrices / bounding spheres
//! - `culling`: frustum planes and per-entity visibility
//! - `instancing`: instance groups, the batcher and GPU instance buffers
//! - `shader`: uniform catalog, reflection and the uniform binder
//! - `pipelines`: render targets and every pass of a frame
//! - `render`: draw-list ordering for individually drawn entities
//! - `resources`: OBJ and image loaders
//! - `settings`: runtime render-state flags and tunables
//!

pub mod camera;
pub mod context;
pub mod culling;
pub mod data_structures;
pub mod engine;
pub mod error;
pub mod instancing;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod shader;
pub mod world;

pub use camera::{Camera, Projection};
pub use context::Context;
pub use data_structures::{material::Material, mesh::MeshAsset, texture::Texture};
pub use engine::Engine;
pub use error::{EngineError, ResourceKind, Result};
pub use settings::RenderSettings;
pub use world::World;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit;

/// Installs the platform logger: `env_logger` natively, the browser console
/// on the web. Calling it twice is harmless.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::warn!("logger already initialized: {e}");
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::warn!("logger already initialized: {e}");
        }
    }
}
