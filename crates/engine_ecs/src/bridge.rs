//! Scripting bridge.
//!
//! Script hosts see entities as opaque handles and components as stable
//! names with JSON payloads. Every structural operation is queued under the
//! bridge's origin name and applies at the host's next commit, and reads hand
//! back copies, so no reference into a storage ever crosses into a script.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use engine_component::{EcsError, Entity, QueryDescriptor};

use crate::command::PendingChange;
use crate::registry::ComponentInfo;
use crate::world::World;

/// Errors returned to scripts.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No component is registered under this name.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    /// A payload did not match the component's shape.
    #[error("component '{component}': {source}")]
    Payload {
        /// Component name.
        component: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The handle or storage operation was rejected.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Name-based façade over a [`World`] for a script host.
#[derive(Debug)]
pub struct ScriptBridge<'w> {
    world: &'w mut World,
    origin: Arc<str>,
}

impl<'w> ScriptBridge<'w> {
    /// Open a bridge whose queued changes report `origin` on failure.
    #[must_use]
    pub fn new(world: &'w mut World, origin: impl Into<Arc<str>>) -> Self {
        Self {
            world,
            origin: origin.into(),
        }
    }

    /// Origin name attached to queued changes.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn component(&self, name: &str) -> Result<ComponentInfo, BridgeError> {
        self.world
            .registry()
            .by_name(name)
            .copied()
            .ok_or_else(|| BridgeError::UnknownComponent(name.to_owned()))
    }

    fn check_handle(&self, entity: Entity) -> Result<(), BridgeError> {
        if self.world.is_valid(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleHandle(entity).into())
        }
    }

    /// Create an entity. The handle is usable immediately.
    pub fn create_entity(&mut self) -> Entity {
        self.world.create_entity()
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.world.is_valid(entity)
    }

    /// Queue destruction of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if the handle is already dead.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), BridgeError> {
        self.check_handle(entity)?;
        self.world
            .submit_change(Some(Arc::clone(&self.origin)), PendingChange::Destroy { entity });
        Ok(())
    }

    /// Queue attaching the component `name`, decoded from `payload`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::UnknownComponent`] for an unregistered name.
    /// - [`BridgeError::Payload`] if `payload` does not decode.
    /// - [`EcsError::StaleHandle`] if the handle is dead.
    ///
    /// Duplicates are detected at commit, like any other queued add.
    pub fn add_component(&mut self, entity: Entity, name: &str, payload: Value) -> Result<(), BridgeError> {
        let info = self.component(name)?;
        self.check_handle(entity)?;
        let payload = (info.decode)(payload).map_err(|source| BridgeError::Payload {
            component: name.to_owned(),
            source,
        })?;
        self.world.submit_change(
            Some(Arc::clone(&self.origin)),
            PendingChange::Add {
                entity,
                component: info.type_id,
                name: info.name,
                payload,
            },
        );
        Ok(())
    }

    /// Queue detaching the component `name`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownComponent`] or [`EcsError::StaleHandle`].
    pub fn remove_component(&mut self, entity: Entity, name: &str) -> Result<(), BridgeError> {
        let info = self.component(name)?;
        self.check_handle(entity)?;
        self.world.submit_change(
            Some(Arc::clone(&self.origin)),
            PendingChange::Remove {
                entity,
                component: info.type_id,
                name: info.name,
            },
        );
        Ok(())
    }

    /// A JSON copy of `entity`'s component `name`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownComponent`], [`EcsError::StaleHandle`], or
    /// [`BridgeError::Payload`] if the value fails to serialize.
    pub fn get(&self, entity: Entity, name: &str) -> Result<Option<Value>, BridgeError> {
        let info = self.component(name)?;
        self.check_handle(entity)?;
        let Some(storage) = self.world.storage_dyn(info.type_id) else {
            return Ok(None);
        };
        storage
            .encode(entity)
            .transpose()
            .map_err(|source| BridgeError::Payload {
                component: name.to_owned(),
                source,
            })
    }

    /// Entities that have every component in `with` and none in `without`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownComponent`] for any unregistered name.
    pub fn query(&self, with: &[&str], without: &[&str]) -> Result<Vec<Entity>, BridgeError> {
        let mut descriptor = QueryDescriptor::new();
        for name in with {
            descriptor = descriptor.with_id(self.component(name)?.type_id);
        }
        for name in without {
            descriptor = descriptor.without_id(self.component(name)?.type_id);
        }
        Ok(self.world.query(&descriptor).entities())
    }

    /// Stable names of every component on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if the handle is dead.
    pub fn component_names(&self, entity: Entity) -> Result<Vec<&'static str>, BridgeError> {
        self.check_handle(entity)?;
        let registry = self.world.registry();
        Ok(self
            .world
            .component_types_of(entity)
            .into_iter()
            .filter_map(|id| registry.get(id).map(|info| info.name))
            .collect())
    }
}
