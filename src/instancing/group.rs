use indexmap::{IndexMap, IndexSet};

use crate::data_structures::{
    instance::{AttributeColumns, AttributeMask, InstanceRow},
    registry::{EntityId, Id, MeshId, ShaderId},
};

/// One row write: which entity, where, and which attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWrite {
    pub entity: EntityId,
    pub row: usize,
    pub mask: AttributeMask,
}

/// Everything a sync changed, as the GPU side has to replay it.
///
/// Removals need no upload: the buffer simply shrinks. Relocations are rows
/// moved into a hole left by a removal and are rewritten in full from the
/// CPU mirror; they are not attribute changes of the moved entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    pub removals: Vec<EntityId>,
    pub additions: Vec<RowWrite>,
    pub updates: Vec<RowWrite>,
    pub relocations: Vec<RowWrite>,
    /// Buffers must be recreated and every row uploaded.
    pub rebuild: bool,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        !self.rebuild
            && self.removals.is_empty()
            && self.additions.is_empty()
            && self.updates.is_empty()
            && self.relocations.is_empty()
    }

    /// Rows that need uploading, with their attributes.
    pub fn uploads(&self) -> impl Iterator<Item = &RowWrite> {
        self.additions
            .iter()
            .chain(&self.relocations)
            .chain(&self.updates)
    }
}

/// Entities drawn together with one instanced call.
///
/// Rows hold exactly the members that were visible at the last sync, in
/// whatever order swap-removal left them.
#[derive(Debug)]
pub struct InstanceGroup {
    pub mesh: MeshId,
    pub shader: ShaderId,
    members: IndexSet<EntityId>,
    rows: IndexSet<EntityId>,
    pending: IndexMap<EntityId, AttributeMask>,
    columns: AttributeColumns,
    rebuild: bool,
}

impl InstanceGroup {
    pub fn new(mesh: MeshId, shader: ShaderId) -> Self {
        Self {
            mesh,
            shader,
            members: IndexSet::new(),
            rows: IndexSet::new(),
            pending: IndexMap::new(),
            columns: AttributeColumns::default(),
            rebuild: true,
        }
    }

    pub fn members(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of rows, i.e. members visible at the last sync.
    pub fn visible_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.rows.get_index_of(&entity)
    }

    /// Entity occupying each row, in row order.
    pub fn row_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.rows.iter().copied()
    }

    pub fn columns(&self) -> &AttributeColumns {
        &self.columns
    }

    pub fn insert(&mut self, entity: EntityId) -> bool {
        self.members.insert(entity)
    }

    /// Drops a member. Its row, if any, goes at the next sync.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        self.pending.shift_remove(&entity);
        self.members.shift_remove(&entity)
    }

    /// Replaces the membership wholesale.
    pub fn set_members(&mut self, entities: impl IntoIterator<Item = EntityId>) {
        self.members = entities.into_iter().collect();
        self.pending.retain(|e, _| self.members.contains(e));
    }

    /// Swaps the mesh; the next sync rebuilds every buffer.
    pub fn set_mesh(&mut self, mesh: MeshId) {
        if self.mesh != mesh {
            self.mesh = mesh;
            self.rebuild = true;
        }
    }

    /// Records that `mask` attributes of `entity` changed.
    pub fn mark_dirty(&mut self, entity: EntityId, mask: AttributeMask) {
        if self.members.contains(&entity) {
            *self.pending.entry(entity).or_default() |= mask;
        }
    }

    pub fn pending(&self, entity: EntityId) -> AttributeMask {
        self.pending.get(&entity).copied().unwrap_or_default()
    }

    /// Brings the rows in line with the currently visible members.
    ///
    /// Rows of members that stopped being visible (or left the group) are
    /// swap-removed, newly visible members are appended in full, and visible
    /// members with pending attribute changes are rewritten for just those
    /// attributes. Pending changes of invisible members are dropped: they
    /// are written in full once the member becomes visible again.
    pub fn sync(
        &mut self,
        visible: impl Fn(EntityId) -> bool,
        row_data: impl Fn(EntityId) -> InstanceRow,
    ) -> WriteSet {
        let mut writes = WriteSet::default();

        if self.rebuild {
            self.rebuild = false;
            self.rows.clear();
            self.columns.clear();
            writes.rebuild = true;
        }

        if self.rows.is_empty() && !self.members.iter().any(|&e| visible(e)) {
            self.pending.clear();
            return writes;
        }

        let stale: Vec<EntityId> = self
            .rows
            .iter()
            .copied()
            .filter(|e| !self.members.contains(e) || !visible(*e))
            .collect();
        let mut relocated: IndexSet<EntityId> = IndexSet::new();
        for entity in stale {
            if let Some((row, _)) = self.rows.swap_remove_full(&entity) {
                self.columns.swap_remove(row);
                if let Some(&moved) = self.rows.get_index(row) {
                    relocated.insert(moved);
                }
                relocated.shift_remove(&entity);
                writes.removals.push(entity);
            }
        }

        for &entity in &self.members {
            if visible(entity) && !self.rows.contains(&entity) {
                let (row, _) = self.rows.insert_full(entity);
                self.columns.push(&row_data(entity));
                self.pending.shift_remove(&entity);
                relocated.shift_remove(&entity);
                writes.additions.push(RowWrite {
                    entity,
                    row,
                    mask: AttributeMask::all(),
                });
            }
        }

        for (entity, mask) in self.pending.drain(..) {
            let Some(row) = self.rows.get_index_of(&entity) else {
                continue;
            };
            self.columns.set(row, &row_data(entity), mask);
            if !relocated.contains(&entity) {
                writes.updates.push(RowWrite { entity, row, mask });
            }
        }

        for entity in relocated {
            if let Some(row) = self.rows.get_index_of(&entity) {
                writes.relocations.push(RowWrite {
                    entity,
                    row,
                    mask: AttributeMask::all(),
                });
            }
        }

        if !writes.is_empty() {
            log::trace!(
                "instance sync: -{} +{} ~{} >{} ({} rows)",
                writes.removals.len(),
                writes.additions.len(),
                writes.updates.len(),
                writes.relocations.len(),
                self.rows.len()
            );
        }
        writes
    }
}

/// Rows of the entities drawn on their own, addressed by entity index.
///
/// Each such entity owns row `entity.index()` of one shared buffer set and is
/// drawn with an instance range of one.
#[derive(Debug, Default)]
pub struct SoloRows {
    columns: AttributeColumns,
    pending: IndexMap<EntityId, AttributeMask>,
    grown: bool,
}

impl SoloRows {
    pub fn columns(&self) -> &AttributeColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Makes room for `entity` and schedules a full write of its row.
    pub fn insert(&mut self, entity: EntityId) {
        if entity.index() >= self.columns.len() {
            self.columns.resize(entity.index() + 1);
            self.grown = true;
        }
        self.mark_dirty(entity, AttributeMask::all());
    }

    pub fn mark_dirty(&mut self, entity: EntityId, mask: AttributeMask) {
        *self.pending.entry(entity).or_default() |= mask;
    }

    /// Applies pending changes of entities drawn individually.
    ///
    /// Returns the written rows and whether the buffer grew since the last
    /// sync (the GPU side then re-uploads everything).
    pub fn sync(
        &mut self,
        solo: impl Fn(EntityId) -> bool,
        row_data: impl Fn(EntityId) -> InstanceRow,
    ) -> (Vec<RowWrite>, bool) {
        let mut writes = Vec::new();
        for (entity, mask) in self.pending.drain(..) {
            if !solo(entity) {
                continue;
            }
            let row = entity.index();
            self.columns.set(row, &row_data(entity), mask);
            writes.push(RowWrite { entity, row, mask });
        }
        (writes, std::mem::take(&mut self.grown))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cgmath::{Matrix4, SquareMatrix};

    use super::*;
    use crate::data_structures::material::Material;

    fn e(i: usize) -> EntityId {
        EntityId::from_index(i)
    }

    fn group_of(members: &[usize]) -> InstanceGroup {
        let mut group = InstanceGroup::new(MeshId::from_index(0), ShaderId::from_index(0));
        group.set_members(members.iter().map(|&i| e(i)));
        group
    }

    fn row(_: EntityId) -> InstanceRow {
        InstanceRow::new(Matrix4::identity(), &Material::default())
    }

    fn visible_set(ids: &[usize]) -> impl Fn(EntityId) -> bool {
        let set: HashSet<EntityId> = ids.iter().map(|&i| e(i)).collect();
        move |entity| set.contains(&entity)
    }

    #[test]
    fn first_sync_adds_every_visible_member() {
        let mut group = group_of(&[0, 1, 2]);
        let writes = group.sync(visible_set(&[0, 1, 2]), row);
        assert!(writes.rebuild);
        assert_eq!(writes.additions.len(), 3);
        assert_eq!(group.visible_count(), 3);
        assert_eq!(group.columns().len(), 3);
    }

    #[test]
    fn one_member_leaving_is_exactly_one_removal() {
        let (a, b, c) = (0, 1, 2);
        let mut group = group_of(&[a, b, c]);
        group.sync(visible_set(&[a, b, c]), row);

        let writes = group.sync(visible_set(&[a, c]), row);
        assert_eq!(writes.removals, [e(b)]);
        assert!(writes.additions.is_empty());
        assert!(writes.updates.is_empty());
        assert!(!writes.rebuild);
        assert_eq!(group.visible_count(), 2);
        assert!(group.row_of(e(b)).is_none());
        // c filled b's hole
        assert_eq!(writes.relocations.len(), 1);
        assert_eq!(writes.relocations[0].entity, e(c));
        assert_eq!(group.row_of(e(c)), Some(1));
    }

    #[test]
    fn removing_the_last_row_moves_nothing() {
        let mut group = group_of(&[0, 1, 2]);
        group.sync(visible_set(&[0, 1, 2]), row);
        let writes = group.sync(visible_set(&[0, 1]), row);
        assert_eq!(writes.removals, [e(2)]);
        assert!(writes.relocations.is_empty());
    }

    #[test]
    fn unchanged_frame_writes_nothing() {
        let mut group = group_of(&[0, 1]);
        group.sync(visible_set(&[0, 1]), row);
        assert!(group.sync(visible_set(&[0, 1]), row).is_empty());
    }

    #[test]
    fn empty_visible_set_short_circuits() {
        let mut group = group_of(&[0, 1]);
        group.sync(visible_set(&[]), row);
        group.mark_dirty(e(0), AttributeMask::DIFFUSE);
        let writes = group.sync(visible_set(&[]), row);
        assert!(writes.is_empty());
        assert_eq!(group.pending(e(0)), AttributeMask::empty());
    }

    #[test]
    fn pending_change_rewrites_only_that_row_and_attribute() {
        let mut group = group_of(&[0, 1, 2]);
        group.sync(visible_set(&[0, 1, 2]), row);

        group.mark_dirty(e(1), AttributeMask::DIFFUSE);
        let mut black = Material::default();
        black.diffuse = [0.0, 0.0, 0.0];
        let writes = group.sync(visible_set(&[0, 1, 2]), |_| {
            InstanceRow::new(Matrix4::identity(), &black)
        });

        assert_eq!(
            writes.updates,
            [RowWrite {
                entity: e(1),
                row: 1,
                mask: AttributeMask::DIFFUSE
            }]
        );
        assert!(writes.additions.is_empty() && writes.removals.is_empty());
        assert_eq!(group.columns().row(1).diffuse, [0.0, 0.0, 0.0]);
        assert_eq!(group.columns().row(0).diffuse, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn newly_visible_and_dirty_is_written_once_as_an_addition() {
        let mut group = group_of(&[0, 1]);
        group.sync(visible_set(&[0]), row);
        group.mark_dirty(e(1), AttributeMask::MODEL);
        let writes = group.sync(visible_set(&[0, 1]), row);
        assert_eq!(writes.additions.len(), 1);
        assert!(writes.updates.is_empty());
    }

    #[test]
    fn leaving_the_group_removes_the_row() {
        let mut group = group_of(&[0, 1]);
        group.sync(visible_set(&[0, 1]), row);
        group.remove(e(0));
        let writes = group.sync(visible_set(&[0, 1]), row);
        assert_eq!(writes.removals, [e(0)]);
        assert_eq!(group.visible_count(), 1);
    }

    #[test]
    fn mesh_swap_rebuilds_all_rows() {
        let mut group = group_of(&[0, 1]);
        group.sync(visible_set(&[0, 1]), row);
        group.set_mesh(MeshId::from_index(4));
        let writes = group.sync(visible_set(&[0, 1]), row);
        assert!(writes.rebuild);
        assert_eq!(writes.additions.len(), 2);
        assert!(writes.removals.is_empty());
    }

    #[test]
    fn relocated_rows_report_their_final_position() {
        let mut group = group_of(&[0, 1, 2, 3]);
        group.sync(visible_set(&[0, 1, 2, 3]), row);
        // 0 leaves (3 moves to row 0), then 3 itself leaves too
        let writes = group.sync(visible_set(&[1, 2]), row);
        assert_eq!(writes.removals.len(), 2);
        for write in &writes.relocations {
            assert_eq!(group.row_of(write.entity), Some(write.row));
        }
        assert_eq!(group.visible_count(), 2);
    }

    #[test]
    fn solo_rows_follow_entity_indices() {
        let mut solo = SoloRows::default();
        solo.insert(e(0));
        solo.insert(e(2));
        let (writes, grown) = solo.sync(|_| true, row);
        assert!(grown);
        assert_eq!(solo.len(), 3);
        assert_eq!(
            writes.iter().map(|w| w.row).collect::<Vec<_>>(),
            [0, 2]
        );
        solo.mark_dirty(e(2), AttributeMask::MODEL);
        let (writes, grown) = solo.sync(|_| true, row);
        assert!(!grown);
        assert_eq!(writes.len(), 1);
    }

    #[test]
    fn instanced_entities_skip_solo_writes() {
        let mut solo = SoloRows::default();
        solo.insert(e(0));
        let (writes, _) = solo.sync(|_| false, row);
        assert!(writes.is_empty());
    }
}
