//! Per-type component storage.
//!
//! A [`ComponentStorage`] is a sparse set: component values live in a dense,
//! gap-free `Vec`, a parallel `Vec` records which entity owns each slot, and a
//! sparse table maps entity indices to slots. Removal swaps the last element
//! into the freed slot, so it only ever moves the removed entity's slot and
//! the last one.
//!
//! [`AnyStorage`] erases the component type so a world can keep every storage
//! in one map.

use std::any::Any;

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;
use crate::error::EcsError;

/// Dense storage for components of type `T`.
#[derive(Debug)]
pub struct ComponentStorage<T: Component> {
    /// Component values, no gaps.
    dense: Vec<T>,
    /// `entities[i]` owns `dense[i]`.
    entities: Vec<Entity>,
    /// Frame tick of the last add or mutable borrow, per slot.
    ticks: Vec<u64>,
    /// Entity index to slot.
    sparse: Vec<Option<u32>>,
    /// Tick stamped onto slots touched from now on.
    tick: u64,
}

impl<T: Component> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentStorage<T> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty storage with room for `capacity` components.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dense: Vec::with_capacity(capacity),
            entities: Vec::with_capacity(capacity),
            ticks: Vec::with_capacity(capacity),
            sparse: Vec::new(),
            tick: 0,
        }
    }

    /// Slot currently holding `entity`'s component, if any.
    #[inline]
    #[must_use]
    pub fn slot_of(&self, entity: Entity) -> Option<usize> {
        let slot = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.entities[slot] == entity).then_some(slot)
    }

    /// Attaches `value` to `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponent`] if `entity` already has a `T`.
    /// - [`EcsError::StaleHandle`] if a different generation of the same
    ///   index owns a `T` here.
    pub fn add(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        let index = entity.index() as usize;
        if let Some(Some(slot)) = self.sparse.get(index) {
            let owner = self.entities[*slot as usize];
            return Err(if owner == entity {
                EcsError::DuplicateComponent {
                    entity,
                    component: T::type_name(),
                }
            } else {
                EcsError::StaleHandle(entity)
            });
        }

        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, None);
        }
        let slot = u32::try_from(self.dense.len())
            .unwrap_or_else(|_| panic!("storage for '{}' exceeded u32 slots", T::type_name()));
        self.sparse[index] = Some(slot);
        self.dense.push(value);
        self.entities.push(entity);
        self.ticks.push(self.tick);
        Ok(())
    }

    /// Detaches and returns `entity`'s component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if `entity` has no `T`.
    pub fn remove(&mut self, entity: Entity) -> Result<T, EcsError> {
        let Some(slot) = self.slot_of(entity) else {
            return Err(EcsError::MissingComponent {
                entity,
                component: T::type_name(),
            });
        };

        let value = self.dense.swap_remove(slot);
        self.entities.swap_remove(slot);
        self.ticks.swap_remove(slot);
        self.sparse[entity.index() as usize] = None;

        if let Some(&moved) = self.entities.get(slot) {
            self.sparse[moved.index() as usize] = Some(slot as u32);
        }
        Ok(value)
    }

    /// Shared reference to `entity`'s component.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slot_of(entity).map(|slot| &self.dense[slot])
    }

    /// Mutable reference to `entity`'s component. Marks it changed for the
    /// current tick.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = self.slot_of(entity)?;
        self.ticks[slot] = self.tick;
        Some(&mut self.dense[slot])
    }

    /// Returns `true` if `entity` has a `T`.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.slot_of(entity).is_some()
    }

    /// Number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if no entity has a `T`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Owning entities, in storage order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Component values, in storage order.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.dense
    }

    /// Iterates `(entity, component)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// Iterates `(entity, component)` pairs mutably. Every slot is marked
    /// changed for the current tick.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        let tick = self.tick;
        self.ticks.iter_mut().for_each(|t| *t = tick);
        self.entities.iter().copied().zip(self.dense.iter_mut())
    }

    /// Returns `true` if `entity`'s component was added or mutably borrowed
    /// at or after `tick`.
    #[must_use]
    pub fn changed_since(&self, entity: Entity, tick: u64) -> bool {
        self.slot_of(entity).is_some_and(|slot| self.ticks[slot] >= tick)
    }

    /// Sets the tick stamped onto subsequently touched slots.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }
}

/// Type-erased view of a [`ComponentStorage`].
pub trait AnyStorage: Any + Send + Sync {
    /// Stable id of the stored component type.
    fn component_type(&self) -> ComponentTypeId;

    /// Stable name of the stored component type.
    fn component_name(&self) -> &'static str;

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Returns `true` if the storage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `entity` has a component here.
    fn contains(&self, entity: Entity) -> bool;

    /// Owning entities, in storage order.
    fn entities(&self) -> &[Entity];

    /// See [`ComponentStorage::changed_since`].
    fn changed_since(&self, entity: Entity, tick: u64) -> bool;

    /// See [`ComponentStorage::set_tick`].
    fn set_tick(&mut self, tick: u64);

    /// Removes and drops `entity`'s component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if absent.
    fn remove_entity(&mut self, entity: Entity) -> Result<(), EcsError>;

    /// Adds a boxed component value.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentStorage::add`].
    ///
    /// # Panics
    ///
    /// Panics if `value` is not of the stored component type.
    fn insert_boxed(
        &mut self,
        entity: Entity,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EcsError>;

    /// Serialises `entity`'s component to JSON, if present.
    fn encode(&self, entity: Entity) -> Option<Result<serde_json::Value, serde_json::Error>>;

    /// Upcast for downcasting to the concrete storage.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete storage.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl std::fmt::Debug for dyn AnyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("component", &self.component_name())
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Component> AnyStorage for ComponentStorage<T> {
    fn component_type(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn component_name(&self) -> &'static str {
        T::type_name()
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.has(entity)
    }

    fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn changed_since(&self, entity: Entity, tick: u64) -> bool {
        ComponentStorage::changed_since(self, entity, tick)
    }

    fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    fn remove_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.remove(entity).map(drop)
    }

    fn insert_boxed(
        &mut self,
        entity: Entity,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EcsError> {
        match value.downcast::<T>() {
            Ok(value) => self.add(entity, *value),
            Err(_) => panic!(
                "payload type mismatch for component '{}' on {entity}",
                T::type_name()
            ),
        }
    }

    fn encode(&self, entity: Entity) -> Option<Result<serde_json::Value, serde_json::Error>> {
        self.get(entity).map(serde_json::to_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Position(f32, f32);

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_add_then_get_returns_value() {
        let mut storage = ComponentStorage::new();
        storage.add(e(3), Position(1.0, 2.0)).unwrap();
        assert_eq!(storage.get(e(3)), Some(&Position(1.0, 2.0)));
        assert!(storage.has(e(3)));
        assert!(!storage.has(e(2)));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_get_mut_writes_through() {
        let mut storage = ComponentStorage::new();
        storage.add(e(0), Position(0.0, 0.0)).unwrap();
        storage.get_mut(e(0)).unwrap().0 = 9.0;
        assert_eq!(storage.get(e(0)), Some(&Position(9.0, 0.0)));
    }

    #[test]
    fn test_duplicate_add_fails_without_mutation() {
        let mut storage = ComponentStorage::new();
        storage.add(e(1), Position(1.0, 1.0)).unwrap();
        let err = storage.add(e(1), Position(5.0, 5.0)).unwrap_err();
        assert_eq!(
            err,
            EcsError::DuplicateComponent {
                entity: e(1),
                component: "Position"
            }
        );
        assert_eq!(storage.get(e(1)), Some(&Position(1.0, 1.0)));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_missing_remove_fails_without_mutation() {
        let mut storage = ComponentStorage::new();
        storage.add(e(1), Position(1.0, 1.0)).unwrap();
        let err = storage.remove(e(2)).unwrap_err();
        assert_eq!(
            err,
            EcsError::MissingComponent {
                entity: e(2),
                component: "Position"
            }
        );
        assert_eq!(storage.entities(), &[e(1)]);
    }

    #[test]
    fn test_swap_and_pop_keeps_dense_and_mappings() {
        let mut storage = ComponentStorage::new();
        for i in 0..4 {
            storage.add(e(i), Position(i as f32, 0.0)).unwrap();
        }

        let removed = storage.remove(e(1)).unwrap();
        assert_eq!(removed, Position(1.0, 0.0));

        // Last element moved into slot 1; nothing else moved.
        assert_eq!(storage.entities(), &[e(0), e(3), e(2)]);
        assert_eq!(storage.slot_of(e(3)), Some(1));
        assert_eq!(storage.slot_of(e(0)), Some(0));
        assert_eq!(storage.slot_of(e(2)), Some(2));
        assert_eq!(storage.get(e(3)), Some(&Position(3.0, 0.0)));
        assert_eq!(storage.get(e(1)), None);

        // Removing the last slot moves nothing.
        storage.remove(e(2)).unwrap();
        assert_eq!(storage.entities(), &[e(0), e(3)]);
        assert_eq!(storage.values().len(), 2);
    }

    #[test]
    fn test_stale_generation_does_not_alias() {
        let mut storage = ComponentStorage::new();
        let old = Entity::new(5, 0);
        let new = Entity::new(5, 1);
        storage.add(new, Position(7.0, 7.0)).unwrap();

        assert!(!storage.has(old));
        assert_eq!(storage.get(old), None);
        assert_eq!(storage.add(old, Position(0.0, 0.0)), Err(EcsError::StaleHandle(old)));
        assert!(matches!(
            storage.remove(old),
            Err(EcsError::MissingComponent { .. })
        ));
        assert_eq!(storage.get(new), Some(&Position(7.0, 7.0)));
    }

    #[test]
    fn test_change_ticks() {
        let mut storage = ComponentStorage::new();
        storage.set_tick(1);
        storage.add(e(0), Position(0.0, 0.0)).unwrap();
        storage.add(e(1), Position(0.0, 0.0)).unwrap();

        storage.set_tick(2);
        assert!(!storage.changed_since(e(0), 2));
        storage.get_mut(e(1)).unwrap().1 = 3.0;
        assert!(storage.changed_since(e(1), 2));
        assert!(!storage.changed_since(e(0), 2));
        assert!(storage.changed_since(e(0), 1));

        storage.set_tick(3);
        for (_, p) in storage.iter_mut() {
            p.0 += 1.0;
        }
        assert!(storage.changed_since(e(0), 3));
        assert!(storage.changed_since(e(1), 3));
    }

    #[test]
    fn test_erased_storage_roundtrip() {
        let mut storage: Box<dyn AnyStorage> = Box::new(ComponentStorage::<Position>::new());
        storage.insert_boxed(e(2), Box::new(Position(4.0, 5.0))).unwrap();
        assert_eq!(storage.component_name(), "Position");
        assert_eq!(storage.component_type(), Position::component_type_id());
        assert!(storage.contains(e(2)));

        let json = storage.encode(e(2)).unwrap().unwrap();
        assert_eq!(json, serde_json::json!([4.0, 5.0]));
        assert!(storage.encode(e(3)).is_none());

        let typed = storage
            .as_any()
            .downcast_ref::<ComponentStorage<Position>>()
            .unwrap();
        assert_eq!(typed.get(e(2)), Some(&Position(4.0, 5.0)));

        storage.remove_entity(e(2)).unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    #[should_panic(expected = "payload type mismatch")]
    fn test_erased_insert_wrong_type_panics() {
        let mut storage: Box<dyn AnyStorage> = Box::new(ComponentStorage::<Position>::new());
        let _ = storage.insert_boxed(e(0), Box::new(17_u32));
    }
}
