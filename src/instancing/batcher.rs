use crate::{
    data_structures::{
        instance::{AttributeMask, InstanceRow},
        registry::{EntityId, GroupId, MeshId, Registry, ShaderId},
    },
    error::{ResourceKind, Result},
    instancing::group::{InstanceGroup, RowWrite, SoloRows, WriteSet},
};

/// Writes produced by one [`InstanceBatcher::sync`].
#[derive(Debug, Clone, Default)]
pub struct FrameWrites {
    pub groups: Vec<(GroupId, WriteSet)>,
    pub solo: Vec<RowWrite>,
    /// The solo buffer grew and has to be re-uploaded in full.
    pub solo_grown: bool,
}

impl FrameWrites {
    pub fn group(&self, id: GroupId) -> Option<&WriteSet> {
        self.groups
            .iter()
            .find_map(|(group, writes)| (*group == id).then_some(writes))
    }

    /// Folds a later sync into this one.
    ///
    /// Replaying a write reads the row from the current CPU mirror, so the
    /// union of the touched rows uploads the latest state of each.
    pub fn merge(&mut self, later: FrameWrites) {
        for (id, writes) in later.groups {
            match self.groups.iter_mut().find(|(group, _)| *group == id) {
                Some((_, merged)) => {
                    merged.removals.extend(writes.removals);
                    merged.additions.extend(writes.additions);
                    merged.updates.extend(writes.updates);
                    merged.relocations.extend(writes.relocations);
                    merged.rebuild |= writes.rebuild;
                }
                None => self.groups.push((id, writes)),
            }
        }
        self.solo.extend(later.solo);
        self.solo_grown |= later.solo_grown;
    }

    pub fn is_empty(&self) -> bool {
        !self.solo_grown && self.solo.is_empty() && self.groups.iter().all(|(_, w)| w.is_empty())
    }
}

/// Owns every instance group plus the rows of individually drawn entities.
#[derive(Debug)]
pub struct InstanceBatcher {
    groups: Registry<GroupId, InstanceGroup>,
    solo: SoloRows,
}

impl Default for InstanceBatcher {
    fn default() -> Self {
        Self {
            groups: Registry::new(ResourceKind::InstanceGroup),
            solo: SoloRows::default(),
        }
    }
}

impl InstanceBatcher {
    pub fn new_instance(&mut self, name: &str, mesh: MeshId, shader: ShaderId) -> Result<GroupId> {
        let id = self.groups.insert(name, InstanceGroup::new(mesh, shader))?;
        log::debug!("instance group '{name}' created");
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Result<GroupId> {
        self.groups.lookup(name)
    }

    pub fn groups(&self) -> &Registry<GroupId, InstanceGroup> {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> &InstanceGroup {
        self.groups.get(id)
    }

    pub fn solo(&self) -> &SoloRows {
        &self.solo
    }

    /// Registers a new entity, drawn on its own until it joins a group.
    pub fn track(&mut self, entity: EntityId) {
        self.solo.insert(entity);
    }

    pub fn add(&mut self, group: GroupId, entity: EntityId) {
        self.groups.get_mut(group).insert(entity);
    }

    /// Removes `entity` from `group`; it falls back to an individual draw.
    pub fn remove(&mut self, group: GroupId, entity: EntityId) {
        if self.groups.get_mut(group).remove(entity) {
            self.solo.mark_dirty(entity, AttributeMask::all());
        }
    }

    pub fn set_members(&mut self, group: GroupId, entities: &[EntityId]) {
        let previous: Vec<EntityId> = self.groups.get(group).members().collect();
        self.groups
            .get_mut(group)
            .set_members(entities.iter().copied());
        for entity in previous {
            if !entities.contains(&entity) {
                self.solo.mark_dirty(entity, AttributeMask::all());
            }
        }
    }

    pub fn set_mesh(&mut self, group: GroupId, mesh: MeshId) {
        self.groups.get_mut(group).set_mesh(mesh);
    }

    /// Routes an attribute change to wherever the entity is drawn from.
    pub fn mark_dirty(&mut self, entity: EntityId, instance: Option<GroupId>, mask: AttributeMask) {
        match instance {
            Some(group) => self.groups.get_mut(group).mark_dirty(entity, mask),
            None => self.solo.mark_dirty(entity, mask),
        }
    }

    /// Diffs every group against the current visibility and applies the
    /// pending attribute changes.
    ///
    /// `instance_of` tells which group (if any) an entity belongs to,
    /// `visible` answers frustum visibility and `row_data` produces the
    /// current attribute values of an entity.
    pub fn sync(
        &mut self,
        instance_of: impl Fn(EntityId) -> Option<GroupId>,
        visible: impl Fn(EntityId) -> bool,
        row_data: impl Fn(EntityId) -> InstanceRow,
    ) -> FrameWrites {
        let mut frame = FrameWrites::default();
        let ids: Vec<GroupId> = self.groups.ids().collect();
        for id in ids {
            let writes = self.groups.get_mut(id).sync(&visible, &row_data);
            frame.groups.push((id, writes));
        }
        let (solo, grown) = self.solo.sync(|e| instance_of(e).is_none(), &row_data);
        frame.solo = solo;
        frame.solo_grown = grown;
        frame
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Matrix4, SquareMatrix};

    use super::*;
    use crate::data_structures::{material::Material, registry::Id};

    fn e(i: usize) -> EntityId {
        EntityId::from_index(i)
    }

    fn row(_: EntityId) -> InstanceRow {
        InstanceRow::new(Matrix4::identity(), &Material::default())
    }

    #[test]
    fn duplicate_group_names_fail() {
        let mut batcher = InstanceBatcher::default();
        let mesh = MeshId::from_index(0);
        let shader = ShaderId::from_index(0);
        batcher.new_instance("G", mesh, shader).unwrap();
        assert!(batcher.new_instance("G", mesh, shader).is_err());
    }

    #[test]
    fn dirty_marks_reach_the_owning_group() {
        let mut batcher = InstanceBatcher::default();
        let g = batcher
            .new_instance("G", MeshId::from_index(0), ShaderId::from_index(0))
            .unwrap();
        batcher.track(e(0));
        batcher.add(g, e(0));
        let instance_of = |_| Some(g);
        batcher.sync(instance_of, |_| true, row);

        batcher.mark_dirty(e(0), Some(g), AttributeMask::DIFFUSE);
        let frame = batcher.sync(instance_of, |_| true, row);
        let writes = frame.group(g).unwrap();
        assert_eq!(writes.updates.len(), 1);
        assert_eq!(writes.updates[0].mask, AttributeMask::DIFFUSE);
        assert!(frame.solo.is_empty());
    }

    #[test]
    fn leaving_a_group_rewrites_the_solo_row() {
        let mut batcher = InstanceBatcher::default();
        let g = batcher
            .new_instance("G", MeshId::from_index(0), ShaderId::from_index(0))
            .unwrap();
        batcher.track(e(0));
        batcher.add(g, e(0));
        batcher.sync(|_| Some(g), |_| true, row);

        batcher.remove(g, e(0));
        let frame = batcher.sync(|_| None, |_| true, row);
        assert_eq!(frame.group(g).unwrap().removals, [e(0)]);
        assert_eq!(frame.solo.len(), 1);
        assert_eq!(frame.solo[0].mask, AttributeMask::all());
    }

    #[test]
    fn merged_frames_keep_every_touched_row() {
        let mut batcher = InstanceBatcher::default();
        let g = batcher
            .new_instance("G", MeshId::from_index(0), ShaderId::from_index(0))
            .unwrap();
        for i in 0..3 {
            batcher.track(e(i));
        }
        batcher.add(g, e(0));
        let instance_of = move |entity: EntityId| (entity == e(0)).then_some(g);

        let mut pending = batcher.sync(instance_of, |_| true, row);
        batcher.mark_dirty(e(0), Some(g), AttributeMask::MODEL);
        batcher.mark_dirty(e(2), None, AttributeMask::DIFFUSE);
        pending.merge(batcher.sync(instance_of, |_| true, row));

        let writes = pending.group(g).unwrap();
        assert!(writes.rebuild);
        assert_eq!(writes.updates.len(), 1);
        assert!(pending.solo_grown);
        assert_eq!(pending.solo.iter().filter(|w| w.entity == e(2)).count(), 2);
        assert!(!pending.is_empty());
        assert!(FrameWrites::default().is_empty());
    }
}
