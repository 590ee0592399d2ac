//! Per-frame change log.
//!
//! Every commit appends one [`ChangeRecord`] per structural change it applied.
//! Renderer and physics sync read the log to find the entities that need new
//! GPU resources or solver bodies instead of diffing whole scenes.

use serde::{Deserialize, Serialize};

use engine_component::{ComponentTypeId, Entity};

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The entity was created.
    Created,
    /// The entity was destroyed.
    Destroyed,
    /// A component was attached.
    ComponentAdded,
    /// A component was detached (including by entity destruction).
    ComponentRemoved,
}

/// One structural change applied during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The affected entity.
    pub entity: Entity,
    /// What happened.
    pub kind: ChangeKind,
    /// The component involved, for add/remove records.
    pub component: Option<ComponentTypeId>,
}

/// Ordered structural changes for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeLog {
    frame: u64,
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    /// Create an empty log for `frame`.
    #[must_use]
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            records: Vec::new(),
        }
    }

    /// Frame the records belong to.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn push(&mut self, entity: Entity, kind: ChangeKind, component: Option<ComponentTypeId>) {
        self.records.push(ChangeRecord {
            entity,
            kind,
            component,
        });
    }

    /// Discard all records and start `frame`.
    pub(crate) fn reset(&mut self, frame: u64) {
        self.frame = frame;
        self.records.clear();
    }

    /// All records, in application order.
    #[must_use]
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Returns an iterator over all records.
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    /// Records of one kind.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Add/remove records for one component type.
    pub fn for_component(&self, component: ComponentTypeId) -> impl Iterator<Item = &ChangeRecord> {
        self.records
            .iter()
            .filter(move |r| r.component == Some(component))
    }

    /// Entities created this frame.
    pub fn created(&self) -> impl Iterator<Item = Entity> + '_ {
        self.of_kind(ChangeKind::Created).map(|r| r.entity)
    }

    /// Entities destroyed this frame.
    pub fn destroyed(&self) -> impl Iterator<Item = Entity> + '_ {
        self.of_kind(ChangeKind::Destroyed).map(|r| r.entity)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let e = Entity::new(0, 0);
        let t = ComponentTypeId(7);
        let mut log = ChangeLog::new(1);
        log.push(e, ChangeKind::Created, None);
        log.push(e, ChangeKind::ComponentAdded, Some(t));
        log.push(e, ChangeKind::ComponentRemoved, Some(t));
        log.push(e, ChangeKind::Destroyed, None);

        assert_eq!(log.len(), 4);
        assert_eq!(log.created().collect::<Vec<_>>(), vec![e]);
        assert_eq!(log.destroyed().count(), 1);
        assert_eq!(log.for_component(t).count(), 2);
        assert_eq!(log.of_kind(ChangeKind::ComponentAdded).count(), 1);
        assert_eq!((&log).into_iter().count(), 4);
    }

    #[test]
    fn test_reset_clears_and_advances() {
        let mut log = ChangeLog::new(1);
        log.push(Entity::new(0, 0), ChangeKind::Created, None);
        log.reset(2);
        assert!(log.is_empty());
        assert_eq!(log.frame(), 2);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut log = ChangeLog::new(3);
        log.push(Entity::new(2, 1), ChangeKind::ComponentAdded, Some(ComponentTypeId(9)));
        let json = serde_json::to_string(&log).unwrap();
        let back: ChangeLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
