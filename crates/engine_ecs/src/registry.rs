//! Component registry: the per-world table of known component types.
//!
//! Maps stable component names and [`ComponentTypeId`]s to the hooks a world
//! needs to handle a type it only knows by id: building an empty storage and
//! decoding a persisted payload.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use engine_component::{AnyStorage, Component, ComponentStorage, ComponentTypeId};

/// Builds an empty storage for a registered type.
pub type StorageCtor = fn(usize) -> Box<dyn AnyStorage>;

/// Decodes a JSON payload into a boxed component value.
pub type DecodeFn = fn(serde_json::Value) -> Result<Box<dyn Any + Send + Sync>, serde_json::Error>;

/// Everything the world knows about one registered component type.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInfo {
    /// The stable type identifier.
    pub type_id: ComponentTypeId,
    /// The stable, persisted name.
    pub name: &'static str,
    /// The Rust type backing the component.
    pub rust_type: TypeId,
    /// The Rust type path, for diagnostics only.
    pub rust_name: &'static str,
    /// Storage constructor.
    pub new_storage: StorageCtor,
    /// Payload decoder.
    pub decode: DecodeFn,
}

impl ComponentInfo {
    /// Build the registry entry for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        let meta = T::meta();
        Self {
            type_id: meta.type_id,
            name: meta.name,
            rust_type: meta.rust_type,
            rust_name: meta.rust_name,
            new_storage: |capacity| Box::new(ComponentStorage::<T>::with_capacity(capacity)),
            decode: |value| {
                let component: T = serde_json::from_value(value)?;
                Ok(Box::new(component))
            },
        }
    }
}

/// Registry of every component type known to one world.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// Entries keyed by stable id.
    by_id: HashMap<ComponentTypeId, ComponentInfo>,
    /// Stable name to id.
    by_name: HashMap<&'static str, ComponentTypeId>,
    /// Ids in registration order.
    order: Vec<ComponentTypeId>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Returns `true` if the type was new.
    ///
    /// # Panics
    ///
    /// Panics if a different Rust type is already registered under the same
    /// name (or under a name with a colliding id). Two types sharing a
    /// persisted identity would corrupt saved scenes.
    pub fn register<T: Component>(&mut self) -> bool {
        let info = ComponentInfo::of::<T>();
        if let Some(existing) = self.by_id.get(&info.type_id) {
            assert!(
                existing.rust_type == info.rust_type,
                "component id {} claimed by both `{}` ('{}') and `{}` ('{}')",
                info.type_id,
                existing.rust_name,
                existing.name,
                info.rust_name,
                info.name,
            );
            return false;
        }

        self.by_name.insert(info.name, info.type_id);
        self.by_id.insert(info.type_id, info);
        self.order.push(info.type_id);
        true
    }

    /// Returns the entry for a registered id.
    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.by_id.get(&type_id)
    }

    /// Looks up an entry by stable name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ComponentInfo> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Returns `true` if `type_id` is registered.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.by_id.contains_key(&type_id)
    }

    /// Returns an iterator over all entries, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
