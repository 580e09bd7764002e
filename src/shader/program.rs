use std::collections::HashMap;

use crate::{
    error::Result,
    pipelines::basic::{PipelineKey, mk_render_pipeline},
    shader::{
        binder::{BindGroupCache, Override, UniformPool, group_range},
        reflect::{Reflection, reflect},
    },
};

/// A compiled WGSL program with its reflected slots and the pipelines and
/// bind groups built from it so far.
#[derive(Debug)]
pub struct ShaderProgram {
    name: String,
    reflection: Reflection,
    module: wgpu::ShaderModule,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    bind_groups: BindGroupCache,
}

impl ShaderProgram {
    /// Reflects and compiles `source`. Any parse or validation error is fatal.
    pub fn compile(device: &wgpu::Device, name: &str, source: &str) -> Result<Self> {
        let reflection = reflect(name, source)?;
        Ok(Self::with_reflection(device, name, source, reflection))
    }

    /// Compiles `source` whose reflection is already known.
    pub fn with_reflection(
        device: &wgpu::Device,
        name: &str,
        source: &str,
        reflection: Reflection,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if !reflection.bindable() {
            log::warn!(
                "shader '{name}' uses bindings outside the catalog ({}); it will not be drawn",
                reflection.unbound.join(", ")
            );
        }
        log::debug!("shader '{name}' compiled");
        Self {
            name: name.to_string(),
            reflection,
            module,
            pipelines: HashMap::new(),
            bind_groups: BindGroupCache::default(),
        }
    }

    /// Swaps in an already reflected source and drops every cached pipeline
    /// and bind group.
    pub fn replace(&mut self, device: &wgpu::Device, source: &str, reflection: Reflection) {
        *self = Self::with_reflection(device, &self.name, source, reflection);
        log::info!("shader '{}' reloaded", self.name);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    /// Builds the pipeline for `key` unless it is cached already.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let pipeline = mk_render_pipeline(
            device,
            &self.name,
            &self.module,
            self.reflection.vertex_input,
            self.reflection.has_fragment,
            &key,
        );
        self.pipelines.insert(key, pipeline);
    }

    /// The pipeline for `key`, if [`prepare`](Self::prepare) built it.
    pub fn pipeline(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    /// Builds the pipeline for `key` and, unless cached, its bind groups
    /// with `overrides` in place of the pool's resources. Must run before
    /// the render pass that [`bind`](Self::bind)s them.
    ///
    /// `false` if the program cannot be bound.
    pub fn prepare_bindings(
        &mut self,
        device: &wgpu::Device,
        pool: &UniformPool,
        key: PipelineKey,
        overrides: &[Override],
    ) -> bool {
        if !self.reflection.bindable() {
            return false;
        }
        self.prepare(device, key);
        let Some(pipeline) = self.pipelines.get(&key) else {
            return false;
        };
        let ready = self
            .bind_groups
            .prepare(device, pool, &self.name, &self.reflection, pipeline, overrides);
        if !ready {
            log::warn!("'{}' skipped: a declared slot has nothing bound", self.name);
        }
        ready
    }

    /// Sets the pipeline for `key` and every bind group prepared for
    /// `overrides`.
    pub fn bind(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        pool: &UniformPool,
        key: &PipelineKey,
        overrides: &[Override],
    ) -> bool {
        if !self.reflection.bindable() {
            return false;
        }
        let Some(pipeline) = self.pipelines.get(key) else {
            return false;
        };
        let groups: Option<Vec<&wgpu::BindGroup>> = group_range(&self.reflection)
            .map(|group| {
                self.bind_groups
                    .get(pool, &self.reflection, pipeline, group, overrides)
            })
            .collect();
        let Some(groups) = groups else {
            log::warn!("'{}' bound before its bind groups were prepared", self.name);
            return false;
        };
        render_pass.set_pipeline(pipeline);
        for (index, group) in groups.into_iter().enumerate() {
            render_pass.set_bind_group(index as u32, group, &[]);
        }
        true
    }

    /// Sets only bind group `group`, as prepared for `overrides`.
    pub fn bind_group(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        pool: &UniformPool,
        key: &PipelineKey,
        group: u32,
        overrides: &[Override],
    ) -> bool {
        let bind_group = self
            .pipelines
            .get(key)
            .and_then(|pipeline| {
                self.bind_groups
                    .get(pool, &self.reflection, pipeline, group, overrides)
            });
        match bind_group {
            Some(bind_group) => {
                render_pass.set_bind_group(group, bind_group, &[]);
                true
            }
            None => false,
        }
    }

    /// Number of bind groups currently cached.
    pub fn cached_bind_groups(&self) -> usize {
        self.bind_groups.len()
    }

    /// Drops pipelines built for targets that no longer exist, and the bind
    /// groups built for them.
    pub fn clear_pipelines(&mut self) {
        self.pipelines.clear();
        self.bind_groups.clear();
    }
}
