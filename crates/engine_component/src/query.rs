//! Query descriptors and system access declarations.
//!
//! A [`QueryDescriptor`] selects entities: every required type present, no
//! excluded type present, and (optionally) certain types mutated during the
//! current frame. An [`Access`] declares which component types a system reads
//! and writes, so the scheduler can run non-conflicting systems side by side.

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

fn insert_sorted(set: &mut Vec<ComponentTypeId>, id: ComponentTypeId) {
    if let Err(pos) = set.binary_search(&id) {
        set.insert(pos, id);
    }
}

/// An immutable selection of required and excluded component types.
///
/// Built with consuming builder methods; each set is kept sorted and free of
/// duplicates so two descriptors naming the same types compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryDescriptor {
    required: Vec<ComponentTypeId>,
    excluded: Vec<ComponentTypeId>,
    changed: Vec<ComponentTypeId>,
}

impl QueryDescriptor {
    /// Create a new empty query descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require component `T`.
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        self.with_id(T::component_type_id())
    }

    /// Exclude entities holding component `T`.
    #[must_use]
    pub fn without<T: Component>(self) -> Self {
        self.without_id(T::component_type_id())
    }

    /// Require component `T` and that it was added or mutated this frame.
    #[must_use]
    pub fn changed<T: Component>(self) -> Self {
        self.changed_id(T::component_type_id())
    }

    /// Require a component by id.
    #[must_use]
    pub fn with_id(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.required, type_id);
        self
    }

    /// Exclude a component by id.
    #[must_use]
    pub fn without_id(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.excluded, type_id);
        self
    }

    /// Require a component by id and that it changed this frame.
    #[must_use]
    pub fn changed_id(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.required, type_id);
        insert_sorted(&mut self.changed, type_id);
        self
    }

    /// Required component types.
    #[must_use]
    pub fn required(&self) -> &[ComponentTypeId] {
        &self.required
    }

    /// Excluded component types.
    #[must_use]
    pub fn excluded(&self) -> &[ComponentTypeId] {
        &self.excluded
    }

    /// Component types that must have changed this frame (always a subset of
    /// [`required`](Self::required)).
    #[must_use]
    pub fn changed_types(&self) -> &[ComponentTypeId] {
        &self.changed
    }

    /// Returns `false` when no entity can ever match: nothing is required, or
    /// a type is both required and excluded.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        !self.required.is_empty() && !self.required.iter().any(|t| self.excluded.contains(t))
    }

    /// Every type the descriptor inspects.
    pub fn referenced_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.required.iter().chain(&self.excluded).copied()
    }
}

/// The component types a system reads and writes during a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    /// Component types the system reads immutably.
    pub reads: Vec<ComponentTypeId>,
    /// Component types the system writes (mutable access).
    pub writes: Vec<ComponentTypeId>,
}

impl Access {
    /// Create an empty access set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare read access to `T`.
    #[must_use]
    pub fn read<T: Component>(self) -> Self {
        self.read_id(T::component_type_id())
    }

    /// Declare write access to `T`.
    #[must_use]
    pub fn write<T: Component>(self) -> Self {
        self.write_id(T::component_type_id())
    }

    /// Declare read access by id.
    #[must_use]
    pub fn read_id(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.reads, type_id);
        self
    }

    /// Declare write access by id.
    #[must_use]
    pub fn write_id(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.writes, type_id);
        self
    }

    /// Returns `true` if the system may read `type_id` (reads or writes).
    #[must_use]
    pub fn can_read(&self, type_id: ComponentTypeId) -> bool {
        self.reads.contains(&type_id) || self.writes.contains(&type_id)
    }

    /// Returns `true` if the system may write `type_id`.
    #[must_use]
    pub fn can_write(&self, type_id: ComponentTypeId) -> bool {
        self.writes.contains(&type_id)
    }

    /// Checks whether this access set conflicts with another.
    ///
    /// Two systems conflict when one writes a component type that the other
    /// reads or writes:
    ///
    /// ```text
    /// A.writes ∩ (B.reads ∪ B.writes) ≠ ∅  OR
    /// B.writes ∩ (A.reads ∪ A.writes) ≠ ∅
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &Access) -> bool {
        self.writes.iter().any(|w| other.can_read(*w))
            || other.writes.iter().any(|w| self.can_read(*w))
    }
}
