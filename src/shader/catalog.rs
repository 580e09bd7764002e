//! The fixed catalog of binding names shaders can declare.
//!
//! Any WGSL global whose name is in this catalog is fed automatically by the
//! binder. Uniform slots carry `#[repr(C)]` structs defined here (plus
//! [`CameraUniform`](crate::camera::CameraUniform)); texture and sampler
//! slots name the resource the binder attaches.

use crate::{camera::CameraUniform, data_structures::light::MAX_LIGHTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureShape {
    D2,
    Cube,
    Depth2D,
    DepthCube,
    DepthMultisampled2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Uniform { size: u64 },
    Texture(TextureShape),
    Sampler { comparison: bool },
}

macro_rules! catalog {
    ($($slot:ident => $name:literal : $kind:expr),* $(,)?) => {
        /// A named binding the renderer knows how to feed.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum UniformSlot {
            $($slot),*
        }

        impl UniformSlot {
            pub const ALL: &'static [UniformSlot] = &[$(UniformSlot::$slot),*];
            pub const COUNT: usize = Self::ALL.len();

            pub fn name(self) -> &'static str {
                match self {
                    $(UniformSlot::$slot => $name),*
                }
            }

            pub fn kind(self) -> SlotKind {
                match self {
                    $(UniformSlot::$slot => $kind),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(UniformSlot::$slot),)*
                    _ => None,
                }
            }
        }
    };
}

const fn uniform<T>() -> SlotKind {
    SlotKind::Uniform {
        size: std::mem::size_of::<T>() as u64,
    }
}

catalog! {
    Camera => "camera": uniform::<CameraUniform>(),
    Lights => "lights": uniform::<LightsUniform>(),
    Shadow => "shadow": uniform::<ShadowUniform>(),
    ShadowFace => "shadow_face": uniform::<[u32; 4]>(),
    Screen => "screen": uniform::<[f32; 4]>(),
    Blur => "blur": uniform::<[f32; 4]>(),
    Bloom => "bloom": uniform::<[f32; 4]>(),
    Tonemap => "tonemap": uniform::<[f32; 4]>(),
    Focus => "focus": uniform::<[f32; 4]>(),
    EffectParams => "effect_params": uniform::<[f32; 4]>(),
    Frame => "frame": uniform::<[f32; 4]>(),
    Environment => "environment": uniform::<[f32; 4]>(),

    ShadowMap => "shadow_map": SlotKind::Texture(TextureShape::DepthCube),
    Skybox => "skybox": SlotKind::Texture(TextureShape::Cube),
    IrradianceMap => "irradiance_map": SlotKind::Texture(TextureShape::Cube),
    PrefilterMap => "prefilter_map": SlotKind::Texture(TextureShape::Cube),
    BrdfLut => "brdf_lut": SlotKind::Texture(TextureShape::D2),
    DiffuseTexture => "diffuse_texture": SlotKind::Texture(TextureShape::D2),
    ScreenTexture => "screen_texture": SlotKind::Texture(TextureShape::D2),
    BloomTexture => "bloom_texture": SlotKind::Texture(TextureShape::D2),
    BlurredTexture => "blurred_texture": SlotKind::Texture(TextureShape::D2),
    DepthTexture => "depth_texture": SlotKind::Texture(TextureShape::Depth2D),
    DepthMsTexture => "depth_ms_texture": SlotKind::Texture(TextureShape::DepthMultisampled2D),

    ShadowSampler => "shadow_sampler": SlotKind::Sampler { comparison: true },
    EnvironmentSampler => "environment_sampler": SlotKind::Sampler { comparison: false },
    DiffuseSampler => "diffuse_sampler": SlotKind::Sampler { comparison: false },
    ScreenSampler => "screen_sampler": SlotKind::Sampler { comparison: false },
}

impl UniformSlot {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Slots whose resource changes from draw to draw within a pass.
    pub fn per_draw(self) -> bool {
        matches!(self, UniformSlot::DiffuseTexture | UniformSlot::DiffuseSampler)
    }
}

/// The light arrays as one uniform block.
///
/// Strengths are packed four to a vector: light `i` is `strengths[i / 4][i % 4]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub positions: [[f32; 4]; MAX_LIGHTS],
    pub colors: [[f32; 4]; MAX_LIGHTS],
    pub strengths: [[f32; 4]; MAX_LIGHTS / 4],
    /// Scene ambient color in xyz.
    pub ambient: [f32; 4],
    /// Light count in x.
    pub count: [u32; 4],
}

impl LightsUniform {
    pub fn new(
        positions: &[[f32; 3]],
        colors: &[[f32; 3]],
        strengths: &[f32],
        ambient: [f32; 3],
    ) -> Self {
        let mut uniform = Self::zeroed_with_ambient(ambient);
        let count = positions.len().min(MAX_LIGHTS);
        for i in 0..count {
            let [x, y, z] = positions[i];
            let [r, g, b] = colors[i];
            uniform.positions[i] = [x, y, z, 1.0];
            uniform.colors[i] = [r, g, b, 1.0];
            uniform.strengths[i / 4][i % 4] = strengths[i];
        }
        uniform.count = [count as u32, 0, 0, 0];
        uniform
    }

    fn zeroed_with_ambient(ambient: [f32; 3]) -> Self {
        let mut uniform: Self = bytemuck::Zeroable::zeroed();
        uniform.ambient = [ambient[0], ambient[1], ambient[2], 1.0];
        uniform
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniform {
    pub view_proj: [[[f32; 4]; 4]; 6],
    /// Snapped light position in xyz, far plane in w.
    pub light: [f32; 4],
    /// x: 1 when shadows are sampled, y: depth bias.
    pub params: [f32; 4],
}
