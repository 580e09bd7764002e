//! Ordering of individual draws.
//!
//! Entities that are not part of an instance group are drawn one call each.
//! [`DrawList`] sorts them so consecutive draws share program, texture and
//! mesh where possible, and records for every draw which of those have to
//! be rebound. The forward and shadow passes replay the list and skip the
//! redundant binds. Instance groups follow as one [`GroupDraw`] each.

use crate::data_structures::registry::{EntityId, GroupId, MaterialId, MeshId, ShaderId, TextureId};

/// One entity as the draw list sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    pub entity: EntityId,
    pub shader: ShaderId,
    pub texture: TextureId,
    pub mesh: MeshId,
    pub material: MaterialId,
}

impl DrawItem {
    /// Most expensive switch first.
    fn sort_key(&self) -> (ShaderId, TextureId, MeshId, MaterialId, EntityId) {
        (self.shader, self.texture, self.mesh, self.material, self.entity)
    }
}

/// A draw plus the binds it needs on top of the previous draw's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub item: DrawItem,
    pub bind_pipeline: bool,
    pub bind_texture: bool,
    pub bind_mesh: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn build(items: impl IntoIterator<Item = DrawItem>) -> Self {
        let mut items: Vec<DrawItem> = items.into_iter().collect();
        items.sort_unstable_by_key(DrawItem::sort_key);

        let mut commands = Vec::with_capacity(items.len());
        let mut previous: Option<DrawItem> = None;
        for item in items {
            let (bind_pipeline, bind_texture, bind_mesh) = match previous {
                None => (true, true, true),
                Some(prev) => {
                    let pipeline = prev.shader != item.shader;
                    // A new pipeline invalidates the bind groups built for the old one.
                    (
                        pipeline,
                        pipeline || prev.texture != item.texture,
                        pipeline || prev.mesh != item.mesh,
                    )
                }
            };
            commands.push(DrawCommand {
                item,
                bind_pipeline,
                bind_texture,
                bind_mesh,
            });
            previous = Some(item);
        }
        Self { commands }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn pipeline_switches(&self) -> usize {
        self.commands.iter().filter(|c| c.bind_pipeline).count()
    }

    pub fn texture_switches(&self) -> usize {
        self.commands.iter().filter(|c| c.bind_texture).count()
    }

    pub fn mesh_switches(&self) -> usize {
        self.commands.iter().filter(|c| c.bind_mesh).count()
    }
}

/// One instanced call: `count` rows of a group's buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDraw {
    pub group: GroupId,
    pub shader: ShaderId,
    pub mesh: MeshId,
    /// Texture of the first visible member; a group draws with one texture.
    pub texture: TextureId,
    pub count: u32,
}

/// Everything the geometry passes draw in one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDraws {
    pub solo: DrawList,
    pub groups: Vec<GroupDraw>,
}

impl FrameDraws {
    /// Program and texture pairs used by any draw, each once. The forward
    /// pass builds one set of bind groups per pair.
    pub fn bindings(&self) -> Vec<(ShaderId, TextureId)> {
        let mut bindings: Vec<_> = self
            .solo
            .commands()
            .iter()
            .map(|c| (c.item.shader, c.item.texture))
            .chain(self.groups.iter().map(|g| (g.shader, g.texture)))
            .collect();
        bindings.sort_unstable();
        bindings.dedup();
        bindings
    }

    pub fn is_empty(&self) -> bool {
        self.solo.is_empty() && self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::registry::Id;

    fn item(entity: usize, shader: usize, texture: usize, mesh: usize) -> DrawItem {
        DrawItem {
            entity: EntityId::from_index(entity),
            shader: ShaderId::from_index(shader),
            texture: TextureId::from_index(texture),
            mesh: MeshId::from_index(mesh),
            material: MaterialId::from_index(0),
        }
    }

    #[test]
    fn interleaved_items_are_grouped() {
        let list = DrawList::build([
            item(0, 1, 0, 0),
            item(1, 0, 0, 1),
            item(2, 1, 0, 0),
            item(3, 0, 0, 1),
            item(4, 0, 0, 0),
        ]);
        assert_eq!(list.len(), 5);
        assert_eq!(list.pipeline_switches(), 2);
        // shader 0: meshes 0, 1, 1; shader 1: mesh 0, 0
        assert_eq!(list.mesh_switches(), 3);
        assert_eq!(list.texture_switches(), 2);
    }

    #[test]
    fn first_draw_binds_everything() {
        let list = DrawList::build([item(7, 3, 2, 1)]);
        let first = list.commands()[0];
        assert!(first.bind_pipeline && first.bind_texture && first.bind_mesh);
    }

    #[test]
    fn pipeline_change_rebinds_texture_and_mesh() {
        let list = DrawList::build([item(0, 0, 5, 5), item(1, 1, 5, 5)]);
        let second = list.commands()[1];
        assert!(second.bind_pipeline);
        assert!(second.bind_texture);
        assert!(second.bind_mesh);
    }

    #[test]
    fn same_state_draws_bind_nothing() {
        let list = DrawList::build([item(0, 0, 0, 0), item(1, 0, 0, 0)]);
        let second = list.commands()[1];
        assert!(!second.bind_pipeline && !second.bind_texture && !second.bind_mesh);
        assert_eq!(second.item.entity, EntityId::from_index(1));
    }

    #[test]
    fn frame_bindings_are_deduplicated() {
        let draws = FrameDraws {
            solo: DrawList::build([item(0, 2, 0, 0), item(1, 0, 0, 0), item(2, 0, 0, 3)]),
            groups: vec![GroupDraw {
                group: GroupId::from_index(0),
                shader: ShaderId::from_index(2),
                mesh: MeshId::from_index(0),
                texture: TextureId::from_index(0),
                count: 3,
            }],
        };
        assert_eq!(
            draws.bindings(),
            [
                (ShaderId::from_index(0), TextureId::from_index(0)),
                (ShaderId::from_index(2), TextureId::from_index(0)),
            ]
        );
        assert!(!draws.is_empty());
    }

    #[test]
    fn empty_list() {
        let list = DrawList::build([]);
        assert!(list.is_empty());
        assert_eq!(list.pipeline_switches(), 0);
    }
}
