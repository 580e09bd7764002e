use crate::{error::Result, shader::ShaderProgram};

/// Geometry program registered as `"basic"` at startup.
pub const FORWARD_SOURCE: &str = include_str!("../shaders/forward.wgsl");

/// Post-processing effects available without registering anything.
pub const BUILTIN_EFFECTS: [(&str, &str); 4] = [
    ("grayscale", include_str!("../shaders/effects/grayscale.wgsl")),
    ("invert", include_str!("../shaders/effects/invert.wgsl")),
    ("vignette", include_str!("../shaders/effects/vignette.wgsl")),
    ("sharpen", include_str!("../shaders/effects/sharpen.wgsl")),
];

/// The programs of the fixed passes.
#[derive(Debug)]
pub struct Builtins {
    pub shadow: ShaderProgram,
    pub skybox: ShaderProgram,
    pub depth_resolve: ShaderProgram,
    pub bloom_downsample: ShaderProgram,
    pub bloom_upsample: ShaderProgram,
    pub bloom_composite: ShaderProgram,
    pub tonemap: ShaderProgram,
    pub blur: ShaderProgram,
    pub dof: ShaderProgram,
    pub present: ShaderProgram,
    pub irradiance: ShaderProgram,
    pub prefilter: ShaderProgram,
    pub brdf: ShaderProgram,
}

macro_rules! builtin {
    ($device:expr, $name:literal) => {
        ShaderProgram::compile($device, $name, include_str!(concat!("../shaders/", $name, ".wgsl")))?
    };
}

impl Builtins {
    pub fn compile(device: &wgpu::Device) -> Result<Self> {
        Ok(Self {
            shadow: builtin!(device, "shadow"),
            skybox: builtin!(device, "skybox"),
            depth_resolve: builtin!(device, "depth_resolve"),
            bloom_downsample: builtin!(device, "bloom_downsample"),
            bloom_upsample: builtin!(device, "bloom_upsample"),
            bloom_composite: builtin!(device, "bloom_composite"),
            tonemap: builtin!(device, "tonemap"),
            blur: builtin!(device, "blur"),
            dof: builtin!(device, "dof"),
            present: builtin!(device, "present"),
            irradiance: builtin!(device, "irradiance"),
            prefilter: builtin!(device, "prefilter"),
            brdf: builtin!(device, "brdf"),
        })
    }

    fn all(&self) -> [&ShaderProgram; 13] {
        [
            &self.shadow,
            &self.skybox,
            &self.depth_resolve,
            &self.bloom_downsample,
            &self.bloom_upsample,
            &self.bloom_composite,
            &self.tonemap,
            &self.blur,
            &self.dof,
            &self.present,
            &self.irradiance,
            &self.prefilter,
            &self.brdf,
        ]
    }

    /// Drops pipelines tied to the old sample count or target sizes.
    pub fn clear_pipelines(&mut self) {
        for program in [
            &mut self.shadow,
            &mut self.skybox,
            &mut self.depth_resolve,
            &mut self.bloom_downsample,
            &mut self.bloom_upsample,
            &mut self.bloom_composite,
            &mut self.tonemap,
            &mut self.blur,
            &mut self.dof,
            &mut self.present,
            &mut self.irradiance,
            &mut self.prefilter,
            &mut self.brdf,
        ] {
            program.clear_pipelines();
        }
    }

    pub fn cached_bind_groups(&self) -> usize {
        self.all().iter().map(|p| p.cached_bind_groups()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{UniformSlot, VertexInput, reflect};

    macro_rules! source {
        ($name:literal) => {
            include_str!(concat!("../shaders/", $name, ".wgsl"))
        };
    }

    #[test]
    fn every_builtin_reflects_cleanly() {
        let sources = [
            ("forward", FORWARD_SOURCE),
            ("shadow", source!("shadow")),
            ("skybox", source!("skybox")),
            ("depth_resolve", source!("depth_resolve")),
            ("bloom_downsample", source!("bloom_downsample")),
            ("bloom_upsample", source!("bloom_upsample")),
            ("bloom_composite", source!("bloom_composite")),
            ("tonemap", source!("tonemap")),
            ("blur", source!("blur")),
            ("dof", source!("dof")),
            ("present", source!("present")),
            ("irradiance", source!("irradiance")),
            ("prefilter", source!("prefilter")),
            ("brdf", source!("brdf")),
        ];
        for (name, source) in sources.into_iter().chain(BUILTIN_EFFECTS) {
            let reflection = reflect(name, source).unwrap_or_else(|e| panic!("{e}"));
            assert!(reflection.bindable(), "{name}: {:?}", reflection.unbound);
        }
    }

    #[test]
    fn forward_program_reads_the_instance_streams() {
        let reflection = reflect("basic", FORWARD_SOURCE).unwrap();
        assert_eq!(reflection.vertex_input, VertexInput::MeshInstanced);
        for slot in [
            UniformSlot::Camera,
            UniformSlot::Lights,
            UniformSlot::Shadow,
            UniformSlot::ShadowMap,
            UniformSlot::DiffuseTexture,
            UniformSlot::PrefilterMap,
        ] {
            assert!(reflection.slots.has(slot), "{slot:?}");
        }
    }

    #[test]
    fn shadow_program_only_writes_depth() {
        let reflection = reflect("shadow", source!("shadow")).unwrap();
        assert!(reflection.slots.has(UniformSlot::ShadowFace));
        assert!(!reflection.slots.has(UniformSlot::Camera));
        assert_eq!(reflection.vertex_input, VertexInput::MeshInstanced);
    }

    #[test]
    fn skybox_uses_mesh_positions_only() {
        let reflection = reflect("skybox", source!("skybox")).unwrap();
        assert_eq!(reflection.vertex_input, VertexInput::Mesh);
    }
}
