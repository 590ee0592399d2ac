//! Query evaluation: lazy views over the world's storages.
//!
//! A [`View`] is computed from a [`QueryDescriptor`] against the storages as
//! they are right now. Iteration is driven by the smallest required storage;
//! each candidate is then checked against the other required and excluded
//! storages with O(1) membership tests.
//!
//! Entities come out in the driving storage's slot order. That order follows
//! insertions and swap-and-pop removals, not creation order, so callers that
//! need a stable order must sort.

use engine_component::{AnyStorage, Component, ComponentStorage, ComponentTypeId, Entity, QueryDescriptor};

use crate::world::World;

/// A lazy, restartable selection of entities.
///
/// Borrows the storages it reads, so the borrow checker rules out a commit
/// while the view is alive.
pub struct View<'w> {
    /// All required storages; `required[driver]` drives iteration.
    required: Vec<&'w dyn AnyStorage>,
    driver: usize,
    excluded: Vec<&'w dyn AnyStorage>,
    changed: Vec<&'w dyn AnyStorage>,
    /// Frame tick for the `changed` filter.
    since: u64,
    epoch: u64,
}

impl<'w> View<'w> {
    /// Evaluate `descriptor` against storages resolved by `lookup`.
    ///
    /// A required type with no storage makes the view empty; an excluded type
    /// with no storage excludes nothing.
    pub(crate) fn build<F>(descriptor: &QueryDescriptor, lookup: F, since: u64, epoch: u64) -> Self
    where
        F: Fn(ComponentTypeId) -> Option<&'w dyn AnyStorage>,
    {
        let empty = Self {
            required: Vec::new(),
            driver: 0,
            excluded: Vec::new(),
            changed: Vec::new(),
            since,
            epoch,
        };
        if !descriptor.is_satisfiable() {
            return empty;
        }

        let Some(required) = descriptor
            .required()
            .iter()
            .map(|id| lookup(*id))
            .collect::<Option<Vec<_>>>()
        else {
            return empty;
        };

        let driver = required
            .iter()
            .enumerate()
            .min_by_key(|(_, storage)| storage.len())
            .map_or(0, |(i, _)| i);

        Self {
            driver,
            excluded: descriptor.excluded().iter().filter_map(|id| lookup(*id)).collect(),
            changed: descriptor
                .changed_types()
                .iter()
                .filter_map(|id| lookup(*id))
                .collect(),
            required,
            since,
            epoch,
        }
    }

    fn passes_filters(&self, entity: Entity) -> bool {
        self.required
            .iter()
            .enumerate()
            .all(|(i, s)| i == self.driver || s.contains(entity))
            && !self.excluded.iter().any(|s| s.contains(entity))
            && self.changed.iter().all(|s| s.changed_since(entity, self.since))
    }

    /// Iterates matching entities. May be called any number of times.
    #[must_use]
    pub fn iter(&self) -> ViewIter<'_, 'w> {
        let candidates: &'w [Entity] = match self.required.get(self.driver) {
            Some(&driver) => driver.entities(),
            None => &[],
        };
        ViewIter {
            view: self,
            candidates,
            pos: 0,
        }
    }

    /// Returns `true` if `entity` matches.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.required
            .get(self.driver)
            .is_some_and(|s| s.contains(entity))
            && self.passes_filters(entity)
    }

    /// Upper bound on the number of matches: the driving storage's size.
    #[must_use]
    pub fn len_hint(&self) -> usize {
        self.required.get(self.driver).map_or(0, |s| s.len())
    }

    /// Returns `true` if nothing matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Collects the matching entities.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.iter().collect()
    }

    /// Commit epoch of the world when this view was built.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn typed<T: Component>(&self) -> Option<&'w ComponentStorage<T>> {
        let id = T::component_type_id();
        self.required
            .iter()
            .find(|s| s.component_type() == id)
            .copied()
            .and_then(|s| s.as_any().downcast_ref::<ComponentStorage<T>>())
    }

    /// `entity`'s `T`, where `T` is one of the required types.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&'w T> {
        self.typed::<T>()?.get(entity)
    }

    /// Iterates `(entity, &T)` for every match.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not a required type of the descriptor.
    pub fn components<T: Component>(&self) -> impl Iterator<Item = (Entity, &'w T)> + '_ {
        let storage = self.typed::<T>().unwrap_or_else(|| {
            panic!(
                "view components::<{}>() needs '{}' in the required set",
                std::any::type_name::<T>(),
                T::type_name()
            )
        });
        self.iter()
            .filter_map(move |e| storage.get(e).map(|c| (e, c)))
    }
}

impl std::fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("required", &self.required.iter().map(|s| s.component_name()).collect::<Vec<_>>())
            .field("excluded", &self.excluded.iter().map(|s| s.component_name()).collect::<Vec<_>>())
            .field("len_hint", &self.len_hint())
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Iterator over a [`View`]'s matching entities.
pub struct ViewIter<'v, 'w> {
    view: &'v View<'w>,
    candidates: &'w [Entity],
    pos: usize,
}

impl Iterator for ViewIter<'_, '_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while let Some(&entity) = self.candidates.get(self.pos) {
            self.pos += 1;
            if self.view.passes_filters(entity) {
                return Some(entity);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.candidates.len() - self.pos))
    }
}

impl<'v, 'w> IntoIterator for &'v View<'w> {
    type Item = Entity;
    type IntoIter = ViewIter<'v, 'w>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A query result kept across frames and refreshed on demand.
///
/// The cached intersection is stamped with the world's commit epoch and
/// frame. Reading it after either moved on, without calling
/// [`refresh`](Self::refresh), is a programming error and panics.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    descriptor: QueryDescriptor,
    stamp: Option<(u64, u64)>,
    entities: Vec<Entity>,
}

impl CachedQuery {
    /// Create an unevaluated cache for `descriptor`.
    #[must_use]
    pub fn new(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            stamp: None,
            entities: Vec::new(),
        }
    }

    /// The cached descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Returns `true` if the cache must be refreshed before use.
    #[must_use]
    pub fn is_stale(&self, world: &World) -> bool {
        self.stamp != Some((world.epoch(), world.frame()))
    }

    /// Re-evaluate if stale, then return the matches.
    pub fn refresh(&mut self, world: &World) -> &[Entity] {
        if self.is_stale(world) {
            self.entities.clear();
            self.entities.extend(world.query(&self.descriptor).iter());
            self.stamp = Some((world.epoch(), world.frame()));
        }
        &self.entities
    }

    /// The cached matches.
    ///
    /// # Panics
    ///
    /// Panics if the world committed or advanced a frame since the last
    /// [`refresh`](Self::refresh).
    #[must_use]
    pub fn entities(&self, world: &World) -> &[Entity] {
        assert!(
            !self.is_stale(world),
            "cached query used after a commit without refresh (cached {:?}, world epoch {} frame {})",
            self.stamp,
            world.epoch(),
            world.frame(),
        );
        &self.entities
    }
}
