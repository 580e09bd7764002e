//! The CPU side of the engine.
//!
//! [`World`] owns the resource tables, the scene store, the lights, the
//! instance batcher and the culler. Every mutation is synchronous and only
//! records state; [`World::update`] turns it into derived matrices,
//! visibility and instance writes once per frame. Nothing here touches the
//! GPU, so the whole world can be driven and inspected in plain unit tests.

use cgmath::{Deg, Matrix4, Vector3};

use crate::{
    camera::{Camera, Projection},
    culling::Culler,
    data_structures::{
        instance::{AttributeMask, InstanceRow},
        light::Lights,
        material::{Material, MaterialProperty},
        mesh::{BoundingSphere, Mesh, MeshAsset},
        model::Model,
        registry::{
            EffectId, EntityId, GroupId, Id, MaterialId, MeshId, Registry, ShaderId, TextureId,
        },
    },
    error::{EngineError, ResourceKind, Result},
    instancing::{FrameWrites, InstanceBatcher},
    render::{DrawItem, DrawList, FrameDraws, GroupDraw},
    scene::{SceneStore, Transform},
    settings::RenderSettings,
    shader::Reflection,
};

/// Name of the texture and material every world starts with.
pub const DEFAULT: &str = "default";

#[derive(Debug)]
pub struct World {
    meshes: Registry<MeshId, Mesh>,
    /// Texture sizes; the pixels live on the GPU.
    textures: Registry<TextureId, [u32; 2]>,
    shaders: Registry<ShaderId, Reflection>,
    materials: Registry<MaterialId, Material>,
    models: Registry<EntityId, Model>,
    effects: Registry<EffectId, Reflection>,
    active_effects: Vec<(EffectId, [f32; 4])>,

    scene: SceneStore,
    lights: Lights,
    ambient_light: [f32; 3],
    batcher: InstanceBatcher,
    culler: Culler,
    camera: Camera,
    projection: Projection,
    settings: RenderSettings,

    last_writes: FrameWrites,
    pending_writes: FrameWrites,
}

impl World {
    pub fn new(width: u32, height: u32, settings: RenderSettings) -> Self {
        let camera = Camera::default();
        let projection = Projection::new(width, height, Deg(45.0), 0.1, 100.0);
        let mut textures = Registry::new(ResourceKind::Texture);
        let mut materials = Registry::new(ResourceKind::Material);
        // Texture 0 is the renderer's white default texture.
        let texture = textures.insert(DEFAULT, [1, 1]).map(|id: TextureId| id.index());
        let material = materials.insert(DEFAULT, Material::default()).map(|id: MaterialId| id.index());
        debug_assert!(matches!((texture, material), (Ok(0), Ok(0))));

        Self {
            meshes: Registry::new(ResourceKind::Mesh),
            textures,
            shaders: Registry::new(ResourceKind::Shader),
            materials,
            models: Registry::new(ResourceKind::Model),
            effects: Registry::new(ResourceKind::Effect),
            active_effects: Vec::new(),
            scene: SceneStore::default(),
            lights: Lights::default(),
            ambient_light: [0.0; 3],
            batcher: InstanceBatcher::default(),
            culler: Culler::new(&camera, &projection),
            camera,
            projection,
            settings,
            last_writes: FrameWrites::default(),
            pending_writes: FrameWrites::default(),
        }
    }

    // Resources

    pub fn add_mesh(&mut self, name: &str, asset: &MeshAsset) -> Result<MeshId> {
        let id = self.meshes.insert(name, Mesh::from(asset))?;
        log::debug!(
            "mesh '{name}': {} vertices, {} triangles",
            asset.vertex_count(),
            asset.triangle_count()
        );
        Ok(id)
    }

    pub fn add_texture(&mut self, name: &str, size: [u32; 2]) -> Result<TextureId> {
        self.textures.insert(name, size)
    }

    pub fn add_shader(&mut self, name: &str, reflection: Reflection) -> Result<ShaderId> {
        self.shaders.insert(name, reflection)
    }

    /// Swaps the reflected slots of an existing shader.
    pub fn replace_shader(&mut self, name: &str, reflection: Reflection) -> Result<ShaderId> {
        let id = self.shaders.lookup(name)?;
        *self.shaders.get_mut(id) = reflection;
        Ok(id)
    }

    pub fn add_effect(&mut self, name: &str, reflection: Reflection) -> Result<EffectId> {
        self.effects.insert(name, reflection)
    }

    pub fn new_material(&mut self, name: &str, material: Material) -> Result<MaterialId> {
        self.materials.insert(name, material)
    }

    /// Creates an entity drawn on its own. Every name is resolved here, so
    /// rendering never fails a lookup.
    pub fn new_model(
        &mut self,
        name: &str,
        mesh: &str,
        shader: &str,
        texture: &str,
        material: &str,
    ) -> Result<EntityId> {
        let model = Model {
            mesh: self.meshes.lookup(mesh)?,
            shader: self.shaders.lookup(shader)?,
            texture: self.textures.lookup(texture)?,
            material: self.materials.lookup(material)?,
            instance: None,
        };
        let entity = self.models.insert(name, model)?;
        self.scene.insert(entity, self.meshes.get(model.mesh).bounds);
        self.materials.get_mut(model.material).attach(entity);
        self.batcher.track(entity);
        log::debug!("model '{name}' created");
        Ok(entity)
    }

    pub fn new_instance(&mut self, name: &str, mesh: &str, shader: &str) -> Result<GroupId> {
        let mesh = self.meshes.lookup(mesh)?;
        let shader = self.shaders.lookup(shader)?;
        self.batcher.new_instance(name, mesh, shader)
    }

    // Instance membership

    fn leave_group(&mut self, entity: EntityId) {
        if let Some(old) = self.models.get(entity).instance {
            self.batcher.remove(old, entity);
            self.models.get_mut(entity).instance = None;
        }
    }

    fn join_group(&mut self, group: GroupId, entity: EntityId) {
        let model = *self.models.get(entity);
        let target = self.batcher.group(group);
        if model.mesh != target.mesh || model.shader != target.shader {
            log::warn!(
                "model '{}' joins '{}' with a different mesh or shader; it is drawn with the group's",
                self.models.name(entity),
                self.batcher.groups().name(group)
            );
        }
        let first = target.members().next();
        if first.is_some_and(|first| self.models.get(first).texture != model.texture) {
            log::warn!(
                "model '{}' joins '{}' with a different texture; it is drawn with the first member's",
                self.models.name(entity),
                self.batcher.groups().name(group)
            );
        }
        self.models.get_mut(entity).instance = Some(group);
        self.batcher.add(group, entity);
    }

    /// Moves a model into an instance group, leaving its previous group.
    pub fn add(&mut self, instance: &str, model: &str) -> Result<()> {
        let group = self.batcher.lookup(instance)?;
        let entity = self.models.lookup(model)?;
        if self.models.get(entity).instance == Some(group) {
            return Ok(());
        }
        self.leave_group(entity);
        self.join_group(group, entity);
        Ok(())
    }

    /// Takes a model out of an instance group; it is drawn on its own again.
    pub fn remove(&mut self, instance: &str, model: &str) -> Result<()> {
        let group = self.batcher.lookup(instance)?;
        let entity = self.models.lookup(model)?;
        if self.models.get(entity).instance == Some(group) {
            self.leave_group(entity);
        }
        Ok(())
    }

    /// Replaces the group's members. Nothing changes if any name is unknown.
    pub fn set_models_in_instance(&mut self, instance: &str, models: &[&str]) -> Result<()> {
        let group = self.batcher.lookup(instance)?;
        let entities = models
            .iter()
            .map(|name| self.models.lookup(name))
            .collect::<Result<Vec<_>>>()?;

        let previous: Vec<EntityId> = self.batcher.group(group).members().collect();
        for entity in previous {
            if !entities.contains(&entity) {
                self.models.get_mut(entity).instance = None;
            }
        }
        for &entity in &entities {
            match self.models.get(entity).instance {
                Some(g) if g == group => {}
                Some(other) => {
                    self.batcher.remove(other, entity);
                    self.models.get_mut(entity).instance = Some(group);
                }
                None => self.models.get_mut(entity).instance = Some(group),
            }
        }
        self.batcher.set_members(group, &entities);
        Ok(())
    }

    /// Swaps the group's mesh. Its buffers are rebuilt at the next update.
    pub fn set_instance_mesh(&mut self, instance: &str, mesh: &str) -> Result<()> {
        let group = self.batcher.lookup(instance)?;
        let mesh = self.meshes.lookup(mesh)?;
        self.batcher.set_mesh(group, mesh);
        let bounds = self.meshes.get(mesh).bounds;
        let members: Vec<EntityId> = self.batcher.group(group).members().collect();
        for entity in members {
            self.models.get_mut(entity).mesh = mesh;
            self.scene.set_local_bounds(entity, bounds);
        }
        Ok(())
    }

    // Transforms

    /// Sets the position of a model, or of a light when no model has `name`.
    pub fn place(&mut self, name: &str, x: f32, y: f32, z: f32) -> Result<()> {
        match self.models.find(name) {
            Some(entity) => self.scene.place(entity, Vector3::new(x, y, z)),
            None => {
                let light = self.lights.find(name).ok_or_else(|| not_placeable(name))?;
                self.lights.set_position(light, [x, y, z]);
            }
        }
        Ok(())
    }

    /// Moves a model (or a light) by a delta.
    pub fn move_by(&mut self, name: &str, x: f32, y: f32, z: f32) -> Result<()> {
        match self.models.find(name) {
            Some(entity) => self.scene.translate(entity, Vector3::new(x, y, z)),
            None => {
                let light = self.lights.find(name).ok_or_else(|| not_placeable(name))?;
                self.lights.translate(light, [x, y, z]);
            }
        }
        Ok(())
    }

    /// Sets the Euler rotation in degrees.
    pub fn rotate(&mut self, name: &str, x: f32, y: f32, z: f32) -> Result<()> {
        let entity = self.models.lookup(name)?;
        self.scene.rotate(entity, Vector3::new(x, y, z));
        Ok(())
    }

    pub fn scale(&mut self, name: &str, x: f32, y: f32, z: f32) -> Result<()> {
        let entity = self.models.lookup(name)?;
        self.scene.scale(entity, Vector3::new(x, y, z));
        Ok(())
    }

    // Materials

    /// Applies a property and marks the attribute dirty on every user.
    pub fn set_material_property(&mut self, material: &str, property: MaterialProperty) -> Result<()> {
        let id = self.materials.lookup(material)?;
        if !self.materials.get_mut(id).set(property) {
            return Ok(());
        }
        for entity in self.materials.get(id).users() {
            let instance = self.models.get(entity).instance;
            self.batcher.mark_dirty(entity, instance, property.mask());
        }
        Ok(())
    }

    pub fn set_ambient(&mut self, material: &str, r: f32, g: f32, b: f32) -> Result<()> {
        self.set_material_property(material, MaterialProperty::Ambient([r, g, b]))
    }

    pub fn set_diffuse(&mut self, material: &str, r: f32, g: f32, b: f32) -> Result<()> {
        self.set_material_property(material, MaterialProperty::Diffuse([r, g, b]))
    }

    pub fn set_specular(&mut self, material: &str, r: f32, g: f32, b: f32) -> Result<()> {
        self.set_material_property(material, MaterialProperty::Specular([r, g, b]))
    }

    pub fn set_shininess(&mut self, material: &str, shininess: f32) -> Result<()> {
        self.set_material_property(material, MaterialProperty::Shininess(shininess))
    }

    pub fn set_roughness(&mut self, material: &str, roughness: f32) -> Result<()> {
        self.set_material_property(material, MaterialProperty::Roughness(roughness))
    }

    pub fn set_metallic(&mut self, material: &str, metallic: f32) -> Result<()> {
        self.set_material_property(material, MaterialProperty::Metallic(metallic))
    }

    /// Gives a model another material; every material attribute is rewritten.
    pub fn set_material(&mut self, model: &str, material: &str) -> Result<()> {
        let entity = self.models.lookup(model)?;
        let material = self.materials.lookup(material)?;
        let old = self.models.get(entity).material;
        if old == material {
            return Ok(());
        }
        self.materials.get_mut(old).detach(entity);
        self.materials.get_mut(material).attach(entity);
        let model = self.models.get_mut(entity);
        model.material = material;
        let instance = model.instance;
        self.batcher
            .mark_dirty(entity, instance, AttributeMask::all().difference(AttributeMask::MODEL));
        Ok(())
    }

    // Lights

    pub fn new_light(&mut self, name: &str, position: [f32; 3], color: [f32; 3], strength: f32) -> Result<()> {
        self.lights.insert(name, position, color, strength)?;
        Ok(())
    }

    pub fn set_light_color(&mut self, name: &str, r: f32, g: f32, b: f32) -> Result<()> {
        let light = self.lights.lookup(name)?;
        self.lights.set_color(light, [r, g, b]);
        Ok(())
    }

    pub fn set_light_strength(&mut self, name: &str, strength: f32) -> Result<()> {
        let light = self.lights.lookup(name)?;
        self.lights.set_strength(light, strength);
        Ok(())
    }

    /// Makes `name` the light that casts the shadow cube.
    pub fn set_sun(&mut self, name: &str) -> Result<()> {
        let light = self.lights.lookup(name)?;
        self.lights.set_sun(light);
        Ok(())
    }

    pub fn set_ambient_light(&mut self, r: f32, g: f32, b: f32) {
        self.ambient_light = [r, g, b];
    }

    // View and settings

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    pub fn update_dimensions(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
    }

    pub fn set_settings(&mut self, settings: RenderSettings) -> Result<()> {
        settings.validate()?;
        if settings.shadow_resolution != self.settings.shadow_resolution
            || settings.shadow_far != self.settings.shadow_far
        {
            self.lights.invalidate_shadow();
        }
        self.settings = settings;
        Ok(())
    }

    /// Selects the effects of the post-processing chain, in order, with their
    /// parameters. Nothing changes if any name is unknown.
    pub fn set_post_processing(&mut self, effects: &[(&str, [f32; 4])]) -> Result<()> {
        self.active_effects = effects
            .iter()
            .map(|(name, params)| Ok((self.effects.lookup(name)?, *params)))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    // Frame

    /// Recomputes dirty transforms, the shadow cube and visibility, then
    /// diffs the instance groups. Returns this update's writes.
    pub fn update(&mut self) -> &FrameWrites {
        self.scene.update();
        for &entity in self.scene.changed() {
            let instance = self.models.get(entity).instance;
            self.batcher.mark_dirty(entity, instance, AttributeMask::MODEL);
        }
        if self
            .lights
            .update(self.settings.shadow_resolution, self.settings.shadow_far)
        {
            log::trace!("shadow cube rebuilt");
        }
        self.culler.update_frustum(&self.camera, &self.projection);
        self.culler.evaluate(&self.scene);

        let models = &self.models;
        let culler = &self.culler;
        let scene = &self.scene;
        let materials = &self.materials;
        let writes = self.batcher.sync(
            |entity| models.get(entity).instance,
            |entity| culler.visible(entity),
            |entity| {
                InstanceRow::new(
                    scene.derived(entity).matrix,
                    materials.get(models.get(entity).material),
                )
            },
        );
        self.pending_writes.merge(writes.clone());
        self.last_writes = writes;
        &self.last_writes
    }

    /// Writes accumulated since the last call, for the GPU to replay.
    pub fn take_pending_writes(&mut self) -> FrameWrites {
        std::mem::take(&mut self.pending_writes)
    }

    /// What the geometry passes draw: visible solo models sorted to minimize
    /// rebinds, then one draw per instance group with visible members.
    ///
    /// A group draws with one texture, that of its first member, whichever
    /// members are visible.
    pub fn frame_draws(&self) -> FrameDraws {
        FrameDraws {
            solo: self.solo_draws(),
            groups: self
                .batcher
                .groups()
                .iter()
                .filter(|(_, _, instance)| instance.visible_count() > 0)
                .filter_map(|(group, _, instance)| {
                    let first = instance.members().next()?;
                    Some(GroupDraw {
                        group,
                        shader: instance.shader,
                        mesh: instance.mesh,
                        texture: self.models.get(first).texture,
                        count: instance.visible_count() as u32,
                    })
                })
                .collect(),
        }
    }

    pub fn solo_draws(&self) -> DrawList {
        DrawList::build(
            self.models
                .iter()
                .filter(|(entity, _, model)| !model.is_instanced() && self.culler.visible(*entity))
                .map(|(entity, _, model)| DrawItem {
                    entity,
                    shader: model.shader,
                    texture: model.texture,
                    mesh: model.mesh,
                    material: model.material,
                }),
        )
    }

    // Queries

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn lights(&self) -> &Lights {
        &self.lights
    }

    pub fn ambient_light(&self) -> [f32; 3] {
        self.ambient_light
    }

    pub fn batcher(&self) -> &InstanceBatcher {
        &self.batcher
    }

    pub fn scene(&self) -> &SceneStore {
        &self.scene
    }

    pub fn active_effects(&self) -> &[(EffectId, [f32; 4])] {
        &self.active_effects
    }

    pub fn shader_id(&self, name: &str) -> Result<ShaderId> {
        self.shaders.lookup(name)
    }

    pub fn model(&self, name: &str) -> Result<&Model> {
        self.models.by_name(name)
    }

    pub fn material(&self, name: &str) -> Result<&Material> {
        self.materials.by_name(name)
    }

    pub fn transform(&self, name: &str) -> Result<Transform> {
        Ok(*self.scene.transform(self.models.lookup(name)?))
    }

    /// As of the last update.
    pub fn model_matrix(&self, name: &str) -> Result<Matrix4<f32>> {
        Ok(self.scene.derived(self.models.lookup(name)?).matrix)
    }

    /// World-space bounds as of the last update.
    pub fn bounding_sphere(&self, name: &str) -> Result<BoundingSphere> {
        Ok(self.scene.derived(self.models.lookup(name)?).bounds)
    }

    pub fn is_visible(&self, name: &str) -> Result<bool> {
        Ok(self.culler.visible(self.models.lookup(name)?))
    }

    /// Rows the group currently draws.
    pub fn visible_count(&self, instance: &str) -> Result<usize> {
        let group = self.batcher.lookup(instance)?;
        Ok(self.batcher.group(group).visible_count())
    }

    /// The writes of the most recent update.
    pub fn last_write_sets(&self) -> &FrameWrites {
        &self.last_writes
    }
}

fn not_placeable(name: &str) -> EngineError {
    EngineError::not_found(ResourceKind::Model, name)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::SquareMatrix;

    use super::*;
    use crate::{
        data_structures::mesh::tests::cube_soup, pipelines::programs::FORWARD_SOURCE,
        shader::reflect,
    };

    fn world() -> World {
        let mut world = World::new(800, 600, RenderSettings::default());
        world
            .add_mesh("cube", &MeshAsset::indexed(&cube_soup([0.0; 3]), &[], &[]))
            .unwrap();
        world
            .add_shader("basic", reflect("basic", FORWARD_SOURCE).unwrap())
            .unwrap();
        world
    }

    fn with_box(world: &mut World, name: &str) {
        world
            .new_model(name, "cube", "basic", DEFAULT, DEFAULT)
            .unwrap();
    }

    #[test]
    fn box_at_origin_has_identity_matrix_and_mesh_bounds() {
        let mut world = world();
        with_box(&mut world, "box1");
        world.update();

        assert_eq!(world.model_matrix("box1").unwrap(), Matrix4::identity());
        let bounds = world.bounding_sphere("box1").unwrap();
        assert_eq!(bounds.center, Vector3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(bounds.radius, 3f32.sqrt());
    }

    #[test]
    fn uniform_scale_doubles_the_radius() {
        let mut world = world();
        with_box(&mut world, "box1");
        world.update();
        let before = world.bounding_sphere("box1").unwrap().radius;

        world.scale("box1", 2.0, 2.0, 2.0).unwrap();
        world.update();
        assert_relative_eq!(world.bounding_sphere("box1").unwrap().radius, before * 2.0);
    }

    #[test]
    fn leaving_the_frustum_removes_the_instance_row() {
        let mut world = world();
        with_box(&mut world, "box1");
        world.new_instance("G", "cube", "basic").unwrap();
        world.add("G", "box1").unwrap();
        world.update();
        assert_eq!(world.visible_count("G").unwrap(), 1);

        world.camera_mut().position = (0.0, 0.0, -500.0).into();
        world.update();
        let group = world.batcher().lookup("G").unwrap();
        let writes = world.last_write_sets().group(group).unwrap();
        let entity = world.models.lookup("box1").unwrap();
        assert_eq!(writes.removals, [entity]);
        assert_eq!(world.visible_count("G").unwrap(), 0);
    }

    #[test]
    fn diffuse_edit_rewrites_only_that_row() {
        let mut world = world();
        world.new_material("M", Material::default()).unwrap();
        world.new_instance("G", "cube", "basic").unwrap();
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            let material = if i == 1 { "M" } else { DEFAULT };
            world.new_model(name, "cube", "basic", DEFAULT, material).unwrap();
            world.place(name, i as f32 * 3.0 - 3.0, 0.0, 0.0).unwrap();
            world.add("G", name).unwrap();
        }
        world.update();

        world.set_diffuse("M", 0.0, 0.0, 0.0).unwrap();
        let group = world.batcher().lookup("G").unwrap();
        let b = world.models.lookup("b").unwrap();
        assert_eq!(world.batcher().group(group).pending(b), AttributeMask::DIFFUSE);

        world.update();
        let writes = world.last_write_sets().group(group).unwrap();
        assert_eq!(writes.updates.len(), 1);
        assert_eq!(writes.updates[0].entity, b);
        assert_eq!(writes.updates[0].mask, AttributeMask::DIFFUSE);
        assert!(writes.additions.is_empty() && writes.removals.is_empty());

        let row = world.batcher().group(group).row_of(b).unwrap();
        let columns = world.batcher().group(group).columns();
        assert_eq!(columns.row(row).diffuse, [0.0; 3]);
    }

    #[test]
    fn one_invisible_member_is_one_removal() {
        let mut world = world();
        world.new_instance("G", "cube", "basic").unwrap();
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            with_box(&mut world, name);
            world.place(name, i as f32 * 3.0 - 3.0, 0.0, 0.0).unwrap();
            world.add("G", name).unwrap();
        }
        world.update();

        world.place("b", 0.0, 0.0, 500.0).unwrap();
        world.update();
        let group = world.batcher().lookup("G").unwrap();
        let writes = world.last_write_sets().group(group).unwrap();
        assert_eq!(writes.removals.len(), 1);
        assert!(writes.additions.is_empty());
        assert!(writes.updates.is_empty());
    }

    #[test]
    fn unknown_names_fail_at_creation() {
        let mut world = world();
        let err = world
            .new_model("x", "sphere", "basic", DEFAULT, DEFAULT)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound {
                kind: ResourceKind::Mesh,
                ..
            }
        ));
        assert!(world.place("nobody", 0.0, 0.0, 0.0).is_err());
        assert!(world.set_post_processing(&[("missing", [0.0; 4])]).is_err());
        assert!(world.active_effects().is_empty());
    }

    #[test]
    fn lights_can_be_placed_by_name() {
        let mut world = world();
        world
            .new_light("sun", [0.0, 10.0, 0.0], [1.0; 3], 1.0)
            .unwrap();
        world.place("sun", 1.0, 2.0, 3.0).unwrap();
        world.update();
        let light = world.lights().lookup("sun").unwrap();
        assert_eq!(world.lights().position(light), [1.0, 2.0, 3.0]);
        assert!(world.lights().shadow().is_some());
    }

    #[test]
    fn instanced_models_leave_the_solo_list() {
        let mut world = world();
        with_box(&mut world, "a");
        with_box(&mut world, "b");
        world.new_instance("G", "cube", "basic").unwrap();
        world.add("G", "a").unwrap();
        world.update();

        let draws = world.frame_draws();
        assert_eq!(draws.solo.len(), 1);
        assert_eq!(draws.groups.len(), 1);
        assert_eq!(draws.groups[0].count, 1);

        world.remove("G", "a").unwrap();
        world.update();
        let draws = world.frame_draws();
        assert_eq!(draws.solo.len(), 2);
        assert!(draws.groups.is_empty());
        assert!(!world.model("a").unwrap().is_instanced());
    }

    #[test]
    fn membership_replacement_moves_models_between_groups() {
        let mut world = world();
        for name in ["a", "b"] {
            with_box(&mut world, name);
        }
        world.new_instance("G", "cube", "basic").unwrap();
        world.new_instance("H", "cube", "basic").unwrap();
        world.add("G", "a").unwrap();
        world.set_models_in_instance("H", &["a", "b"]).unwrap();

        let h = world.batcher().lookup("H").unwrap();
        assert_eq!(world.model("a").unwrap().instance, Some(h));
        assert_eq!(world.model("b").unwrap().instance, Some(h));
        world.update();
        assert_eq!(world.visible_count("G").unwrap(), 0);
        assert_eq!(world.visible_count("H").unwrap(), 2);

        assert!(world.set_models_in_instance("H", &["a", "nope"]).is_err());
        assert_eq!(world.batcher().group(h).len(), 2);
    }

    #[test]
    fn pending_writes_accumulate_until_taken() {
        let mut world = world();
        with_box(&mut world, "a");
        world.update();
        world.move_by("a", 1.0, 0.0, 0.0).unwrap();
        world.update();

        let pending = world.take_pending_writes();
        assert!(pending.solo_grown);
        assert!(pending.solo.len() >= 2);
        assert!(world.take_pending_writes().is_empty());
    }

    #[test]
    fn world_starts_with_the_default_texture_and_material() {
        let mut world = world();
        with_box(&mut world, "a");
        let model = world.model("a").unwrap();
        assert_eq!(model.texture.index(), 0);
        assert_eq!(model.material.index(), 0);
        assert!(world.add_texture(DEFAULT, [2, 2]).is_err());
    }

    #[test]
    fn group_draws_with_its_first_members_texture() {
        let mut world = world();
        world.add_texture("stone", [4, 4]).unwrap();
        world.new_instance("G", "cube", "basic").unwrap();
        world.new_model("a", "cube", "basic", DEFAULT, DEFAULT).unwrap();
        world.new_model("b", "cube", "basic", "stone", DEFAULT).unwrap();
        world.place("b", 3.0, 0.0, 0.0).unwrap();
        world.add("G", "a").unwrap();
        world.add("G", "b").unwrap();
        world.place("a", 0.0, 0.0, 500.0).unwrap();
        world.update();

        let draws = world.frame_draws();
        assert_eq!(draws.groups.len(), 1);
        assert_eq!(draws.groups[0].count, 1);
        assert_eq!(draws.groups[0].texture, world.model("a").unwrap().texture);
    }
}
