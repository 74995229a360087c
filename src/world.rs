use crate::archetype::{Archetype, Signature};
use crate::component_set::{assert_distinct, ComponentSet, ComponentTypes, Fetch};
use crate::entity::{ArchetypeId, EntityId};
use crate::error::WorldError;
use crate::type_info::{Component, ComponentTypeId, TypeInfo};
use crate::HashMap;
use smallvec::SmallVec;
use std::any::type_name;
use std::collections::hash_map;

/// An archetype together with the ids of the entities stored in it;
/// `entities[col]` names the owner of column `col`, and the list length
/// always equals the archetype's length.
pub struct ArchetypeRecord {
    pub(crate) archetype: Archetype,
    pub(crate) entities: Vec<EntityId>,
}

impl ArchetypeRecord {
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// The entity occupying each column, in column order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }
}

/// The unique location of a live entity: its archetype and column.
#[derive(Copy, Clone)]
struct EntityRecord {
    archetype: ArchetypeId,
    col: usize,
}

/// The entity/archetype directory: owns every [`Archetype`], routes entities
/// between them as their component sets change, and keeps the entity
/// directory consistent across swap-removes.
///
/// Archetypes are created on first sight of a novel signature and live until
/// the world is dropped, even when they become empty; the archetype count is
/// bounded by the number of distinct signatures ever observed.
///
/// All operations are plain synchronous calls; `&mut self` makes concurrent
/// mutation unrepresentable.
#[derive(Default)]
pub struct World {
    archetypes: Vec<ArchetypeRecord>,
    archetypes_by_signature: HashMap<Signature, ArchetypeId>,
    entities: HashMap<EntityId, EntityRecord>,
    next_entity_id: u64,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> World {
        World::default()
    }

    /// The number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if the entity is live in this world.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// The number of archetypes ever created.
    pub fn n_archetypes(&self) -> usize {
        self.archetypes.len()
    }

    /// Returns the archetype record at `id`, if it exists.
    pub fn archetype(&self, id: ArchetypeId) -> Option<&ArchetypeRecord> {
        self.archetypes.get(id)
    }

    /// Iterates over every archetype record, for bulk column processing.
    pub fn archetypes(&self) -> impl Iterator<Item = &ArchetypeRecord> {
        self.archetypes.iter()
    }

    /// The entity's current `(archetype, column)` location.
    ///
    /// The location is only valid until the next mutating call affecting the
    /// entity or its archetype.
    pub fn location(&self, entity: EntityId) -> Result<(ArchetypeId, usize), WorldError> {
        let record = self.record(entity)?;
        Ok((record.archetype, record.col))
    }

    fn record(&self, entity: EntityId) -> Result<EntityRecord, WorldError> {
        self.entities
            .get(&entity)
            .copied()
            .ok_or(WorldError::NotFound(entity))
    }

    /// Looks up the archetype for `signature`, creating it on first sight.
    /// Idempotent: equal signatures always yield the same id.
    fn find_or_create_archetype(&mut self, signature: Signature) -> ArchetypeId {
        match self.archetypes_by_signature.entry(signature) {
            hash_map::Entry::Occupied(e) => *e.get(),
            hash_map::Entry::Vacant(e) => {
                let id = self.archetypes.len();
                log::debug!(
                    "creating archetype {id} for {} component type(s)",
                    e.key().len()
                );
                self.archetypes.push(ArchetypeRecord {
                    archetype: Archetype::new(e.key().clone()),
                    entities: Vec::new(),
                });
                e.insert(id);
                id
            }
        }
    }

    /// Creates a new entity holding the supplied components and returns its
    /// freshly minted id.
    ///
    /// The pack's canonical signature decides the archetype; `spawn((a, b))`
    /// and `spawn((b, a))` land in the same one. Panics if the pack names the
    /// same component type twice.
    pub fn spawn<S: ComponentSet>(&mut self, set: S) -> EntityId {
        let signature = Signature::new(S::type_infos().to_vec());
        let arch_id = self.find_or_create_archetype(signature);

        let record = &mut self.archetypes[arch_id];
        let col = record.archetype.insert_row(set);

        let entity = EntityId(self.next_entity_id);
        self.next_entity_id += 1;

        record.entities.push(entity);
        self.entities.insert(
            entity,
            EntityRecord {
                archetype: arch_id,
                col,
            },
        );
        entity
    }

    /// Swap-removes the source column at `col` and repairs the directory
    /// entry of whichever entity was moved into the hole. The caller has
    /// already removed or repointed the directory entry of the entity that
    /// owned `col`.
    fn patch_moved_entity(&mut self, arch_id: ArchetypeId, col: usize, moved_from: usize) {
        let record = &mut self.archetypes[arch_id];
        if moved_from != col {
            record.entities.swap(col, moved_from);
            let moved_entity = record.entities[col];
            self.entities
                .get_mut(&moved_entity)
                .expect("moved entity has a directory entry")
                .col = col;
        }
        record.entities.pop();
        debug_assert_eq!(record.entities.len(), record.archetype.len());
    }

    /// Destroys the entity and every component it holds.
    ///
    /// Fails with [`WorldError::NotFound`] if the id is absent (including
    /// ids that were already despawned; ids are never reused).
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), WorldError> {
        let record = match self.entities.remove(&entity) {
            Some(record) => record,
            None => return Err(WorldError::NotFound(entity)),
        };

        let arch_record = &mut self.archetypes[record.archetype];
        debug_assert_eq!(arch_record.entities[record.col], entity);
        let moved_from = arch_record.archetype.remove(record.col);
        self.patch_moved_entity(record.archetype, record.col, moved_from);
        Ok(())
    }

    /// Returns references to the requested components of the entity.
    ///
    /// `Q` is `&T` for a single component or a tuple of references for
    /// several: `world.get::<(&Position, &Velocity)>(entity)?`. The returned
    /// references point straight into archetype storage; they are invalidated
    /// by the next mutating call on this world, exactly like iterators.
    pub fn get<Q: Fetch>(&self, entity: EntityId) -> Result<Q::Output<'_>, WorldError> {
        let record = self.record(entity)?;
        let archetype = &self.archetypes[record.archetype].archetype;
        Q::fetch(archetype, record.col)
            .map_err(|component| WorldError::MissingComponent { entity, component })
    }

    /// Returns a mutable reference to the entity's component of type `T`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, WorldError> {
        let record = self.record(entity)?;
        self.archetypes[record.archetype]
            .archetype
            .get_mut::<T>(record.col)
            .ok_or(WorldError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Adds the supplied components to the entity, overwriting any it
    /// already has of the same types.
    ///
    /// When every supplied type is already present this is a pure in-place
    /// overwrite and the entity stays put. Otherwise the entity physically
    /// migrates to the archetype for the union of the two type sets:
    /// carried-over components are relocated, overwritten ones are dropped at
    /// the source, the new values are written at the target, and the vacated
    /// source column is swap-removed with the usual directory repair.
    ///
    /// Panics if the pack names the same component type twice.
    pub fn add<S: ComponentSet>(&mut self, entity: EntityId, set: S) -> Result<(), WorldError> {
        let record = self.record(entity)?;
        let supplied = S::type_infos();
        // A bad pack must fail before any component is dropped or moved.
        assert_distinct(&supplied);

        let src_id = record.archetype;
        let all_present = {
            let signature = self.archetypes[src_id].archetype.signature();
            supplied.iter().all(|info| signature.contains(info.id()))
        };
        if all_present {
            // Pure overwrite: no migration, only the field values change.
            // (update_row rejects duplicate pack types.)
            self.archetypes[src_id]
                .archetype
                .update_row(record.col, set);
            return Ok(());
        }

        let mut target_types: Vec<TypeInfo> =
            self.archetypes[src_id].archetype.signature().types().to_vec();
        for info in &supplied {
            if !target_types.iter().any(|t| t.id() == info.id()) {
                target_types.push(*info);
            }
        }
        let dst_id = self.find_or_create_archetype(Signature::new(target_types));
        debug_assert_ne!(src_id, dst_id);
        log::trace!("entity {} migrating {src_id} -> {dst_id}", entity.to_bits());

        let supplied_ids: SmallVec<[ComponentTypeId; 16]> =
            supplied.iter().map(|info| info.id()).collect();
        let dst_col = self.migrate(entity, record, dst_id, |id| supplied_ids.contains(&id), set);

        let entity_record = self
            .entities
            .get_mut(&entity)
            .expect("migrating entity has a directory entry");
        entity_record.archetype = dst_id;
        entity_record.col = dst_col;
        Ok(())
    }

    /// Removes the named component types from the entity, migrating it to
    /// the archetype for the remaining set.
    ///
    /// Fails with [`WorldError::MissingComponent`] before any mutation if
    /// the entity lacks one of the named types. Removing an empty type list
    /// is a no-op.
    pub fn remove<Q: ComponentTypes>(&mut self, entity: EntityId) -> Result<(), WorldError> {
        let record = self.record(entity)?;
        let named = Q::type_infos();
        if named.is_empty() {
            return Ok(());
        }

        let src_id = record.archetype;
        for info in &named {
            if !self.archetypes[src_id]
                .archetype
                .signature()
                .contains(info.id())
            {
                return Err(WorldError::MissingComponent {
                    entity,
                    component: info.name(),
                });
            }
        }

        let named_ids: SmallVec<[ComponentTypeId; 16]> =
            named.iter().map(|info| info.id()).collect();
        let target_types: Vec<TypeInfo> = self.archetypes[src_id]
            .archetype
            .signature()
            .types()
            .iter()
            .filter(|info| !named_ids.contains(&info.id()))
            .copied()
            .collect();
        let dst_id = self.find_or_create_archetype(Signature::new(target_types));
        debug_assert_ne!(src_id, dst_id);
        log::trace!("entity {} migrating {src_id} -> {dst_id}", entity.to_bits());

        let dst_col = self.migrate(entity, record, dst_id, |id| named_ids.contains(&id), ());

        let entity_record = self
            .entities
            .get_mut(&entity)
            .expect("migrating entity has a directory entry");
        entity_record.archetype = dst_id;
        entity_record.col = dst_col;
        Ok(())
    }

    /// Physically moves the entity's row from its source archetype to
    /// `dst_id`, then swap-removes the vacated source column.
    ///
    /// Source components for which `consumed_at_source` is true are dropped
    /// in place (the pack overwrites them, or they are being removed);
    /// everything else is relocated to the target column. `set` supplies the
    /// values constructed fresh at the target. Returns the target column.
    fn migrate<S: ComponentSet>(
        &mut self,
        entity: EntityId,
        record: EntityRecord,
        dst_id: ArchetypeId,
        consumed_at_source: impl Fn(ComponentTypeId) -> bool,
        set: S,
    ) -> usize {
        let (src, dst) = two_records_mut(&mut self.archetypes, record.archetype, dst_id);

        dst.archetype.prepare_insert(1);
        let dst_col = dst.archetype.len();

        for (src_row, info) in src.archetype.signature().types().iter().enumerate() {
            // Safety: the source column is live, so every slot holds an
            // initialized element; each is consumed exactly once, either
            // dropped here or relocated into the (reserved, uninitialized)
            // target slot.
            unsafe {
                let src_ptr = src.archetype.slot_ptr(src_row, record.col);
                if consumed_at_source(info.id()) {
                    info.drop_in_place(src_ptr, 1);
                } else {
                    let dst_row = dst
                        .archetype
                        .row_of(info.id())
                        .expect("carried-over component exists in target signature");
                    let dst_ptr = dst.archetype.slot_ptr(dst_row, dst_col);
                    info.relocate_construct(dst_ptr, src_ptr, 1);
                }
            }
        }
        // Safety: the target column is capacity-reserved and its supplied
        // slots are uninitialized; together with the relocations above this
        // initializes the full target signature before the column goes live.
        unsafe { dst.archetype.init_fields(dst_col, set) };
        dst.archetype.bump_len();
        dst.entities.push(entity);
        debug_assert_eq!(dst.entities.len(), dst.archetype.len());

        // The source column is now a fully consumed hole; close it and
        // repair whichever entity the swap moved.
        let moved_from = unsafe { src.archetype.remove_vacated(record.col) };
        self.patch_moved_entity(record.archetype, record.col, moved_from);
        dst_col
    }
}

/// Disjoint mutable access to two archetype records.
fn two_records_mut(
    records: &mut [ArchetypeRecord],
    a: usize,
    b: usize,
) -> (&mut ArchetypeRecord, &mut ArchetypeRecord) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = records.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = records.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
