use std::{collections::HashMap, ops::Range};

use crate::shader::{
    catalog::{SlotKind, UniformSlot},
    program::ShaderProgram,
    reflect::Reflection,
};

/// A resource attached to a slot. Handles compare and hash by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound {
    Buffer(wgpu::Buffer),
    Texture(wgpu::TextureView),
    Sampler(wgpu::Sampler),
}

impl Bound {
    fn resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            Bound::Buffer(buffer) => buffer.as_entire_binding(),
            Bound::Texture(view) => wgpu::BindingResource::TextureView(view),
            Bound::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
        }
    }
}

impl From<&wgpu::TextureView> for Bound {
    fn from(view: &wgpu::TextureView) -> Self {
        Bound::Texture(view.clone())
    }
}

impl From<&wgpu::Sampler> for Bound {
    fn from(sampler: &wgpu::Sampler) -> Self {
        Bound::Sampler(sampler.clone())
    }
}

/// A resource bound in place of the pool's own for one pass.
pub type Override = (UniformSlot, Bound);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindKey {
    pipeline: wgpu::RenderPipeline,
    group: u32,
    entries: Vec<(u32, Bound)>,
}

/// Holds one resource per catalog slot and resolves the slots a program
/// declares into bind group entries.
///
/// Uniform slots own a buffer sized for their block. Texture and sampler
/// slots hold whatever the renderer attached last; passes that read a
/// target changing from frame to frame pass it as an [`Override`] instead.
///
/// Every attachment bumps the pool's generation, which empties the
/// [`BindGroupCache`] of each program on its next use.
#[derive(Debug)]
pub struct UniformPool {
    resources: Vec<Option<Bound>>,
    generation: u64,
}

impl UniformPool {
    pub fn new(device: &wgpu::Device) -> Self {
        let resources = UniformSlot::ALL
            .iter()
            .map(|&slot| match slot.kind() {
                SlotKind::Uniform { size } => Some(Bound::Buffer(device.create_buffer(
                    &wgpu::BufferDescriptor {
                        label: Some(slot.name()),
                        size,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    },
                ))),
                _ => None,
            })
            .collect();
        Self {
            resources,
            generation: 0,
        }
    }

    /// Writes `value` into the slot's buffer. Takes effect at the next submit.
    pub fn write<T: bytemuck::Pod>(&self, queue: &wgpu::Queue, slot: UniformSlot, value: &T) {
        match &self.resources[slot.index()] {
            Some(Bound::Buffer(buffer)) => {
                debug_assert_eq!(
                    Some(std::mem::size_of::<T>() as u64),
                    match slot.kind() {
                        SlotKind::Uniform { size } => Some(size),
                        _ => None,
                    },
                    "{slot:?}"
                );
                queue.write_buffer(buffer, 0, bytemuck::bytes_of(value));
            }
            _ => log::warn!("{slot:?} is not a uniform block"),
        }
    }

    pub fn set_texture(&mut self, slot: UniformSlot, view: &wgpu::TextureView) {
        debug_assert!(matches!(slot.kind(), SlotKind::Texture(_)), "{slot:?}");
        self.resources[slot.index()] = Some(Bound::from(view));
        self.generation += 1;
    }

    pub fn set_sampler(&mut self, slot: UniformSlot, sampler: &wgpu::Sampler) {
        debug_assert!(matches!(slot.kind(), SlotKind::Sampler { .. }), "{slot:?}");
        self.resources[slot.index()] = Some(Bound::from(sampler));
        self.generation += 1;
    }

    /// Drops every cached bind group. Needed when textures passed as
    /// overrides are recreated, so the caches do not keep them alive.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The entries of group `group` as `reflection` declares them, with
    /// `overrides` taking precedence. `None` if a slot has nothing attached.
    fn key(
        &self,
        label: &str,
        reflection: &Reflection,
        pipeline: &wgpu::RenderPipeline,
        group: u32,
        overrides: &[Override],
    ) -> Option<BindKey> {
        let mut entries = Vec::new();
        for (slot, binding) in reflection.slots.in_group(group) {
            let bound = overrides
                .iter()
                .find(|(s, _)| *s == slot)
                .map(|(_, bound)| bound)
                .or(self.resources[slot.index()].as_ref());
            let Some(bound) = bound else {
                log::trace!("'{label}': nothing attached to {slot:?}");
                return None;
            };
            entries.push((binding, bound.clone()));
        }
        Some(BindKey {
            pipeline: pipeline.clone(),
            group,
            entries,
        })
    }
}

/// Group indices a program binds, gaps included so the indices line up.
pub fn group_range(reflection: &Reflection) -> Range<u32> {
    match reflection.slots.max_group() {
        Some(max) => 0..max + 1,
        None => 0..0,
    }
}

/// Bind groups one program has needed so far, keyed by pipeline, group and
/// the exact resources inside.
///
/// Built outside the render passes by [`prepare`](Self::prepare); draws
/// only look them up.
#[derive(Debug, Default)]
pub struct BindGroupCache {
    generation: u64,
    groups: HashMap<BindKey, wgpu::BindGroup>,
}

impl BindGroupCache {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Builds every group of `pipeline` not cached yet. `false` if some
    /// declared slot has nothing attached.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        pool: &UniformPool,
        label: &str,
        reflection: &Reflection,
        pipeline: &wgpu::RenderPipeline,
        overrides: &[Override],
    ) -> bool {
        if self.generation != pool.generation() {
            self.groups.clear();
            self.generation = pool.generation();
        }
        for group in group_range(reflection) {
            let Some(key) = pool.key(label, reflection, pipeline, group, overrides) else {
                return false;
            };
            if self.groups.contains_key(&key) {
                continue;
            }
            let entries: Vec<wgpu::BindGroupEntry<'_>> = key
                .entries
                .iter()
                .map(|(binding, bound)| wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: bound.resource(),
                })
                .collect();
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipeline.get_bind_group_layout(group),
                entries: &entries,
            });
            drop(entries);
            self.groups.insert(key, bind_group);
        }
        true
    }

    /// The group [`prepare`](Self::prepare) built for these resources, if
    /// the pool has not changed since.
    pub fn get(
        &self,
        pool: &UniformPool,
        reflection: &Reflection,
        pipeline: &wgpu::RenderPipeline,
        group: u32,
        overrides: &[Override],
    ) -> Option<&wgpu::BindGroup> {
        if self.generation != pool.generation() {
            return None;
        }
        let key = pool.key("", reflection, pipeline, group, overrides)?;
        self.groups.get(&key)
    }
}

/// The bind group holding the slots that change from draw to draw, if the
/// program declares any.
pub fn per_draw_group(program: &ShaderProgram) -> Option<u32> {
    program
        .reflection()
        .slots
        .iter()
        .find(|(slot, _)| slot.per_draw())
        .map(|(_, binding)| binding.group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::reflect;

    #[test]
    fn group_range_covers_gaps() {
        let source = r#"
@group(2) @binding(0) var<uniform> camera: vec4<f32>;
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return camera; }
"#;
        let reflection = reflect("gap", source).unwrap();
        assert_eq!(group_range(&reflection), 0..3);
    }

    #[test]
    fn no_slots_no_groups() {
        let source = r#"
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
"#;
        let reflection = reflect("bare", source).unwrap();
        assert!(group_range(&reflection).is_empty());
    }
}
