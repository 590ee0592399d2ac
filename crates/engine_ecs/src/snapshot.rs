//! Scene snapshots.
//!
//! A [`SceneSnapshot`] is the persisted form of a world: one record per live
//! entity, each listing its components by stable name with a JSON payload.
//! Handles are not persisted; loading issues fresh ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use engine_component::Entity;

use crate::command::PendingChange;
use crate::world::World;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors produced while saving or loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: u32,
    },

    /// A record names a component this world has not registered.
    #[error("entity record {record}: unknown component '{component}'")]
    UnknownComponent {
        /// Index of the record in the snapshot.
        record: usize,
        /// The unknown name.
        component: String,
    },

    /// A record lists the same component twice.
    #[error("entity record {record}: component '{component}' listed twice")]
    DuplicateComponent {
        /// Index of the record in the snapshot.
        record: usize,
        /// The repeated name.
        component: String,
    },

    /// The world still has queued changes from another source.
    #[error("{count} changes still queued; commit them before loading")]
    PendingChanges {
        /// Number of queued changes.
        count: usize,
    },

    /// A payload failed to encode or decode.
    #[error("component '{component}': {source}")]
    Payload {
        /// Component whose payload failed.
        component: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// JSON text could not be produced or parsed.
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding failed.
    #[error("snapshot msgpack encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("snapshot msgpack decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// One component of an entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Stable component name.
    pub component: String,
    /// Serialized component value.
    pub payload: serde_json::Value,
}

/// One persisted entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Components, in registration order of the saving world.
    pub components: Vec<ComponentEntry>,
}

/// A persisted scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Format version.
    pub version: u32,
    /// Entity records.
    pub entities: Vec<EntityRecord>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            entities: Vec::new(),
        }
    }
}

impl SceneSnapshot {
    /// Encode as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] on malformed input.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as MessagePack with named fields.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if serialization fails.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Decode`] on malformed input.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Total number of component entries.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.entities.iter().map(|r| r.components.len()).sum()
    }
}

impl World {
    /// Capture every live entity and its components.
    ///
    /// Entities appear in index order and components in registration order,
    /// so saving the same world twice yields identical output.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Payload`] if a component fails to serialize.
    pub fn snapshot(&self) -> Result<SceneSnapshot, SnapshotError> {
        let mut snapshot = SceneSnapshot::default();
        for entity in self.entities() {
            let mut record = EntityRecord::default();
            for info in self.registry().iter() {
                let Some(storage) = self.storage_dyn(info.type_id) else {
                    continue;
                };
                if let Some(encoded) = storage.encode(entity) {
                    let payload = encoded.map_err(|source| SnapshotError::Payload {
                        component: info.name.to_owned(),
                        source,
                    })?;
                    record.components.push(ComponentEntry {
                        component: info.name.to_owned(),
                        payload,
                    });
                }
            }
            snapshot.entities.push(record);
        }

        info!(
            world = %self.id(),
            entities = snapshot.entities.len(),
            components = snapshot.component_count(),
            "saved snapshot"
        );
        Ok(snapshot)
    }

    /// Recreate the entities of `snapshot` in this world.
    ///
    /// Every record is decoded before anything is created, so a bad snapshot
    /// leaves the world untouched. On success the new entities and their
    /// components are committed together and their handles returned in
    /// record order.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::PendingChanges`] if other changes are queued; their
    ///   failures belong to whoever queued them, so commit first.
    /// - [`SnapshotError::UnsupportedVersion`] for a foreign format version.
    /// - [`SnapshotError::UnknownComponent`] for an unregistered name.
    /// - [`SnapshotError::DuplicateComponent`] for a name repeated in a record.
    /// - [`SnapshotError::Payload`] for a payload that does not decode.
    pub fn load_snapshot(&mut self, snapshot: &SceneSnapshot) -> Result<Vec<Entity>, SnapshotError> {
        let count = self.pending_count();
        if count > 0 {
            return Err(SnapshotError::PendingChanges { count });
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
            });
        }

        let mut decoded = Vec::with_capacity(snapshot.entities.len());
        for (record_index, record) in snapshot.entities.iter().enumerate() {
            let mut components = Vec::with_capacity(record.components.len());
            for entry in &record.components {
                let Some(info) = self.registry().by_name(&entry.component) else {
                    return Err(SnapshotError::UnknownComponent {
                        record: record_index,
                        component: entry.component.clone(),
                    });
                };
                if components
                    .iter()
                    .any(|(id, _, _)| *id == info.type_id)
                {
                    return Err(SnapshotError::DuplicateComponent {
                        record: record_index,
                        component: entry.component.clone(),
                    });
                }
                let payload = (info.decode)(entry.payload.clone()).map_err(|source| {
                    SnapshotError::Payload {
                        component: entry.component.clone(),
                        source,
                    }
                })?;
                components.push((info.type_id, info.name, payload));
            }
            decoded.push(components);
        }

        let mut created = Vec::with_capacity(decoded.len());
        for components in decoded {
            let entity = self.create_entity();
            for (component, name, payload) in components {
                self.submit_change(
                    None,
                    PendingChange::Add {
                        entity,
                        component,
                        name,
                        payload,
                    },
                );
            }
            created.push(entity);
        }
        let report = self.commit();

        info!(
            world = %self.id(),
            entities = created.len(),
            applied = report.applied,
            failed = report.failures.len(),
            "loaded snapshot"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use engine_component::{AssetId, Component, EcsError};

    use super::*;
    use crate::command::Commands;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Name(String);

    impl Component for Name {
        fn type_name() -> &'static str {
            "Name"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Mesh {
        asset: AssetId,
    }

    impl Component for Mesh {
        fn type_name() -> &'static str {
            "Mesh"
        }
    }

    fn world() -> World {
        let mut world = World::new();
        world.register::<Name>();
        world.register::<Mesh>();
        world
    }

    fn contents(world: &World) -> Vec<(Option<Name>, Option<Mesh>)> {
        let mut rows: Vec<_> = world
            .entities()
            .map(|e| (world.get::<Name>(e).cloned(), world.get::<Mesh>(e).cloned()))
            .collect();
        rows.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        rows
    }

    #[test]
    fn test_roundtrip_into_fresh_world() {
        let mut source = world();
        let a = source.create_entity();
        let b = source.create_entity();
        let c = source.create_entity();
        source.add_component(a, Name("camera".into()));
        source.add_component(b, Name("crate".into()));
        source.add_component(b, Mesh { asset: AssetId(77) });
        source.add_component(c, Mesh { asset: AssetId(3) });
        source.commit();
        // Leave a hole in the index space so fresh handles differ.
        source.destroy_entity(a);
        source.commit();

        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.component_count(), 3);

        let mut target = world();
        let loaded = target.load_snapshot(&snapshot).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(target.entity_count(), 2);
        assert_eq!(contents(&target), contents(&source));
        assert_eq!(target.get::<Mesh>(loaded[0]), Some(&Mesh { asset: AssetId(77) }));
    }

    #[test]
    fn test_json_and_msgpack_encodings() {
        let mut source = world();
        let e = source.create_entity();
        source.add_component(e, Name("lamp".into()));
        source.commit();
        let snapshot = source.snapshot().unwrap();

        let text = snapshot.to_json().unwrap();
        assert!(text.contains("\"component\": \"Name\""));
        assert_eq!(SceneSnapshot::from_json(&text).unwrap(), snapshot);

        let bytes = snapshot.to_msgpack().unwrap();
        assert_eq!(SceneSnapshot::from_msgpack(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_snapshot_keeps_componentless_entities() {
        let mut source = world();
        source.create_entity();
        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot.entities, vec![EntityRecord::default()]);

        let mut target = world();
        assert_eq!(target.load_snapshot(&snapshot).unwrap().len(), 1);
        assert_eq!(target.entity_count(), 1);
    }

    #[test]
    fn test_unknown_component_leaves_world_untouched() {
        let snapshot = SceneSnapshot {
            version: SNAPSHOT_VERSION,
            entities: vec![
                EntityRecord {
                    components: vec![ComponentEntry {
                        component: "Name".into(),
                        payload: json!("ok"),
                    }],
                },
                EntityRecord {
                    components: vec![ComponentEntry {
                        component: "Audio".into(),
                        payload: json!(null),
                    }],
                },
            ],
        };
        let mut target = world();
        let err = target.load_snapshot(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnknownComponent { record: 1, ref component } if component == "Audio"
        ));
        assert_eq!(target.entity_count(), 0);
        assert_eq!(target.pending_count(), 0);
    }

    #[test]
    fn test_bad_payload_and_duplicates_rejected() {
        let mut target = world();
        let bad_payload = SceneSnapshot {
            version: SNAPSHOT_VERSION,
            entities: vec![EntityRecord {
                components: vec![ComponentEntry {
                    component: "Mesh".into(),
                    payload: json!({"asset": "not a number"}),
                }],
            }],
        };
        assert!(matches!(
            target.load_snapshot(&bad_payload),
            Err(SnapshotError::Payload { .. })
        ));

        let entry = ComponentEntry {
            component: "Name".into(),
            payload: json!("twice"),
        };
        let duplicate = SceneSnapshot {
            version: SNAPSHOT_VERSION,
            entities: vec![EntityRecord {
                components: vec![entry.clone(), entry],
            }],
        };
        assert!(matches!(
            target.load_snapshot(&duplicate),
            Err(SnapshotError::DuplicateComponent { record: 0, .. })
        ));
        assert_eq!(target.entity_count(), 0);
    }

    #[test]
    fn test_load_refuses_while_changes_queued() {
        let mut target = world();
        let e = target.create_entity();
        target.add_component(e, Name("first".into()));
        target.commit();

        let mut commands = Commands::with_origin("gameplay");
        commands.add_component(e, Name("second".into()));
        target.submit(commands);

        let err = target.load_snapshot(&SceneSnapshot::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::PendingChanges { count: 1 }));
        assert_eq!(target.pending_count(), 1);

        let report = target.commit();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].origin.as_deref(), Some("gameplay"));
        assert!(matches!(
            report.failures[0].error,
            EcsError::DuplicateComponent { component: "Name", .. }
        ));
        assert!(target.load_snapshot(&SceneSnapshot::default()).unwrap().is_empty());
    }

    #[test]
    fn test_version_mismatch() {
        let snapshot = SceneSnapshot {
            version: 99,
            entities: Vec::new(),
        };
        assert!(matches!(
            world().load_snapshot(&snapshot),
            Err(SnapshotError::UnsupportedVersion { found: 99 })
        ));
    }
}
