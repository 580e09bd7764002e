//! WGSL reflection into a typed slot table.

use naga::{
    AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, ShaderStage, TypeInner,
    valid::{Capabilities, ValidationFlags, Validator},
};

use crate::{
    error::{EngineError, Result},
    shader::catalog::{SlotKind, TextureShape, UniformSlot},
};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// First vertex location fed by the per-instance streams.
const FIRST_INSTANCE_LOCATION: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBinding {
    pub group: u32,
    pub binding: u32,
}

/// For every catalog slot, where the program expects it, if anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotTable {
    bindings: [Option<SlotBinding>; UniformSlot::COUNT],
}

impl Default for SlotTable {
    fn default() -> Self {
        Self {
            bindings: [None; UniformSlot::COUNT],
        }
    }
}

impl SlotTable {
    pub fn get(&self, slot: UniformSlot) -> Option<SlotBinding> {
        self.bindings[slot.index()]
    }

    pub fn has(&self, slot: UniformSlot) -> bool {
        self.bindings[slot.index()].is_some()
    }

    fn set(&mut self, slot: UniformSlot, binding: SlotBinding) {
        self.bindings[slot.index()] = Some(binding);
    }

    pub fn iter(&self) -> impl Iterator<Item = (UniformSlot, SlotBinding)> + '_ {
        UniformSlot::ALL
            .iter()
            .filter_map(|&slot| self.get(slot).map(|binding| (slot, binding)))
    }

    /// Slots bound in `group`, ordered by binding index.
    pub fn in_group(&self, group: u32) -> Vec<(UniformSlot, u32)> {
        let mut slots: Vec<_> = self
            .iter()
            .filter(|(_, b)| b.group == group)
            .map(|(slot, b)| (slot, b.binding))
            .collect();
        slots.sort_by_key(|&(_, binding)| binding);
        slots
    }

    /// Highest bind group index in use, if any.
    pub fn max_group(&self) -> Option<u32> {
        self.iter().map(|(_, b)| b.group).max()
    }
}

/// How a program consumes vertex buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInput {
    /// Vertices are generated from `vertex_index` (fullscreen passes).
    None,
    /// Mesh vertices only.
    Mesh,
    /// Mesh vertices plus the six per-instance streams.
    MeshInstanced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub slots: SlotTable,
    /// Bindings used by the entry points that the binder cannot feed.
    pub unbound: Vec<String>,
    pub vertex_input: VertexInput,
    pub has_fragment: bool,
}

impl Reflection {
    /// Whether every binding the program uses can be fed.
    pub fn bindable(&self) -> bool {
        self.unbound.is_empty()
    }
}

/// Parses and validates `source`, then reflects its bindings.
///
/// Only globals used by `vs_main` or `fs_main` count, since wgpu derives the
/// pipeline layout from those alone.
pub fn reflect(program: &str, source: &str) -> Result<Reflection> {
    let compile_error = |reason: String| EngineError::ShaderCompile {
        program: program.to_string(),
        reason,
    };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| compile_error(e.to_string()))?;

    let vertex = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == ShaderStage::Vertex && ep.name == VERTEX_ENTRY)
        .ok_or_else(|| compile_error(format!("missing @vertex fn {VERTEX_ENTRY}")))?;
    let fragment = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == ShaderStage::Fragment && ep.name == FRAGMENT_ENTRY);
    let used_by: Vec<usize> = std::iter::once(vertex).chain(fragment).collect();

    let mut slots = SlotTable::default();
    let mut unbound = Vec::new();
    for (handle, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        if used_by
            .iter()
            .all(|&ep| info.get_entry_point(ep)[handle].is_empty())
        {
            continue;
        }
        let name = var.name.clone().unwrap_or_default();
        let kind = slot_kind(&module.types[var.ty].inner, var.space);
        match UniformSlot::from_name(&name) {
            Some(slot) if Some(slot.kind()).filter(|k| kinds_match(*k, kind)).is_some() => {
                slots.set(
                    slot,
                    SlotBinding {
                        group: binding.group,
                        binding: binding.binding,
                    },
                );
            }
            Some(slot) => {
                log::warn!(
                    "{program}: '{name}' does not have the type of catalog slot {:?}",
                    slot.kind()
                );
                unbound.push(name);
            }
            None => {
                log::warn!("{program}: binding '{name}' is not in the uniform catalog");
                unbound.push(name);
            }
        }
    }

    let vertex_input = vertex_input(&module, &module.entry_points[vertex].function);
    Ok(Reflection {
        slots,
        unbound,
        vertex_input,
        has_fragment: fragment.is_some(),
    })
}

fn slot_kind(inner: &TypeInner, space: AddressSpace) -> Option<SlotKind> {
    match inner {
        TypeInner::Image {
            dim,
            arrayed: false,
            class,
        } => {
            let shape = match (dim, class) {
                (
                    ImageDimension::D2,
                    ImageClass::Sampled {
                        kind: ScalarKind::Float,
                        multi: false,
                    },
                ) => TextureShape::D2,
                (
                    ImageDimension::Cube,
                    ImageClass::Sampled {
                        kind: ScalarKind::Float,
                        multi: false,
                    },
                ) => TextureShape::Cube,
                (ImageDimension::D2, ImageClass::Depth { multi: false }) => TextureShape::Depth2D,
                (ImageDimension::D2, ImageClass::Depth { multi: true }) => {
                    TextureShape::DepthMultisampled2D
                }
                (ImageDimension::Cube, ImageClass::Depth { multi: false }) => TextureShape::DepthCube,
                _ => return None,
            };
            Some(SlotKind::Texture(shape))
        }
        TypeInner::Sampler { comparison } => Some(SlotKind::Sampler {
            comparison: *comparison,
        }),
        _ if space == AddressSpace::Uniform => Some(SlotKind::Uniform { size: 0 }),
        _ => None,
    }
}

fn kinds_match(expected: SlotKind, found: Option<SlotKind>) -> bool {
    match (expected, found) {
        (SlotKind::Uniform { .. }, Some(SlotKind::Uniform { .. })) => true,
        (expected, Some(found)) => expected == found,
        (_, None) => false,
    }
}

fn vertex_input(module: &naga::Module, function: &naga::Function) -> VertexInput {
    let mut locations = Vec::new();
    for argument in &function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(Binding::Location { location, .. }), _) => locations.push(*location),
            (None, TypeInner::Struct { members, .. }) => {
                locations.extend(members.iter().filter_map(|m| match &m.binding {
                    Some(Binding::Location { location, .. }) => Some(*location),
                    _ => None,
                }));
            }
            _ => {}
        }
    }
    match locations.iter().max() {
        None => VertexInput::None,
        Some(&max) if max >= FIRST_INSTANCE_LOCATION => VertexInput::MeshInstanced,
        Some(_) => VertexInput::Mesh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULLSCREEN: &str = r#"
@group(0) @binding(0) var screen_texture: texture_2d<f32>;
@group(0) @binding(1) var screen_sampler: sampler;
@group(0) @binding(2) var<uniform> effect_params: vec4<f32>;
@group(0) @binding(3) var<uniform> unused_but_known: vec4<f32>;

struct VsOut { @builtin(position) clip: vec4<f32>, @location(0) uv: vec2<f32> };

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> VsOut {
    let uv = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    return VsOut(vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0), uv);
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(screen_texture, screen_sampler, in.uv) * effect_params.x;
}
"#;

    #[test]
    fn declared_catalog_names_resolve() {
        let r = reflect("fullscreen", FULLSCREEN).unwrap();
        assert_eq!(
            r.slots.get(UniformSlot::ScreenTexture),
            Some(SlotBinding {
                group: 0,
                binding: 0
            })
        );
        assert!(r.slots.has(UniformSlot::ScreenSampler));
        assert!(r.slots.has(UniformSlot::EffectParams));
        assert!(!r.slots.has(UniformSlot::Camera));
        assert_eq!(r.vertex_input, VertexInput::None);
        assert!(r.has_fragment);
        assert!(r.bindable());
    }

    #[test]
    fn unused_globals_are_not_retained() {
        let r = reflect("fullscreen", FULLSCREEN).unwrap();
        assert!(r.unbound.is_empty());
        assert_eq!(r.slots.in_group(0).len(), 3);
    }

    #[test]
    fn unknown_used_bindings_are_reported() {
        let source = r#"
@group(0) @binding(0) var<uniform> mystery: vec4<f32>;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return mystery; }
"#;
        let r = reflect("odd", source).unwrap();
        assert_eq!(r.unbound, ["mystery"]);
        assert!(!r.bindable());
        assert!(!r.has_fragment);
    }

    #[test]
    fn wrong_type_for_a_catalog_name_is_unbound() {
        let source = r#"
@group(0) @binding(0) var screen_texture: texture_cube<f32>;
@group(0) @binding(1) var screen_sampler: sampler;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return textureSampleLevel(screen_texture, screen_sampler, vec3<f32>(1.0), 0.0);
}
"#;
        let r = reflect("odd", source).unwrap();
        assert!(!r.slots.has(UniformSlot::ScreenTexture));
        assert_eq!(r.unbound, ["screen_texture"]);
    }

    #[test]
    fn instance_locations_select_the_instanced_layout() {
        let source = r#"
struct V { @location(0) position: vec3<f32>, @location(5) m0: vec4<f32> };
@vertex
fn vs_main(v: V) -> @builtin(position) vec4<f32> { return v.m0 + vec4<f32>(v.position, 1.0); }
"#;
        assert_eq!(
            reflect("geo", source).unwrap().vertex_input,
            VertexInput::MeshInstanced
        );
    }

    #[test]
    fn syntax_errors_are_compile_errors() {
        let err = reflect("broken", "fn vs_main( {").unwrap_err();
        assert!(matches!(err, EngineError::ShaderCompile { ref program, .. } if program == "broken"));
    }

    #[test]
    fn missing_vertex_entry_is_a_compile_error() {
        let source = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(reflect("no_vs", source).is_err());
    }
}
