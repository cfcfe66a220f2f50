//! # Object Tracker
//!
//! Folds the object update stream into the latest known state of every
//! simulation entity.
//!
//! Updates are partial: a record only carries the fields whose mask bits
//! were set. The tracker keeps whatever it saw last for each field.

use std::collections::BTreeMap;

use diana_core::ObjectKind;
use diana_protocol::object_update::{ObjectFields, PlayerVesselFields};
use diana_protocol::{ObjectRecord, Packet};

/// Latest known state, keyed by object id
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    objects: BTreeMap<u32, ObjectRecord>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one record into the stored state
    ///
    /// A record whose kind differs from the stored one replaces it.
    pub fn update(&mut self, record: ObjectRecord) {
        match self.objects.get_mut(&record.object_id) {
            Some(stored) => {
                if stored.kind() != record.kind() {
                    tracing::debug!(
                        "Object {} changed from {} to {}",
                        record.object_id,
                        stored.kind(),
                        record.kind()
                    );
                }
                stored.fields.merge(record.fields);
            }
            None => {
                tracing::trace!("Tracking new {} {}", record.kind(), record.object_id);
                self.objects.insert(record.object_id, record);
            }
        }
    }

    /// Forget an object; unknown ids are ignored
    pub fn remove(&mut self, object_id: u32) -> Option<ObjectRecord> {
        self.objects.remove(&object_id)
    }

    pub fn get(&self, object_id: u32) -> Option<&ObjectRecord> {
        self.objects.get(&object_id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All tracked objects in id order
    pub fn objects(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.values()
    }

    pub fn objects_of(&self, kind: ObjectKind) -> impl Iterator<Item = &ObjectRecord> {
        self.objects().filter(move |record| record.kind() == kind)
    }

    /// The player vessel with the lowest object id
    pub fn player_ship(&self) -> Option<(u32, &PlayerVesselFields)> {
        self.objects().find_map(|record| match &record.fields {
            ObjectFields::PlayerVessel(ship) => Some((record.object_id, ship)),
            _ => None,
        })
    }

    /// Apply a received packet
    ///
    /// Object updates are merged and destroy notices remove the object.
    /// Undecodable object updates are treated as empty.
    pub fn observe(&mut self, packet: &Packet) {
        match packet {
            Packet::ObjectUpdate(update) => {
                for record in update.records_or_empty() {
                    self.update(record);
                }
            }
            Packet::DestroyObject(destroy) => {
                if self.remove(destroy.object_id).is_none() {
                    tracing::trace!("Destroy for untracked object {}", destroy.object_id);
                }
            }
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diana_protocol::object_update::{BaseFields, PositionFields};
    use diana_protocol::{DestroyObjectPacket, ObjectUpdatePacket};

    fn base(id: u32, fields: BaseFields) -> ObjectRecord {
        ObjectRecord {
            object_id: id,
            fields: ObjectFields::Base(fields),
        }
    }

    #[test]
    fn test_tracker_creation() {
        let tracker = Tracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.player_ship().is_none());
    }

    #[test]
    fn test_update_merges_present_fields() {
        let mut tracker = Tracker::new();
        tracker.update(base(
            7,
            BaseFields {
                name: Some("DS3".into()),
                shields: Some(100.0),
                ..Default::default()
            },
        ));
        tracker.update(base(
            7,
            BaseFields {
                shields: Some(60.0),
                ..Default::default()
            },
        ));

        assert_eq!(tracker.len(), 1);
        let ObjectFields::Base(stored) = &tracker.get(7).unwrap().fields else {
            panic!("expected a base");
        };
        assert_eq!(stored.name.as_deref(), Some("DS3"));
        assert_eq!(stored.shields, Some(60.0));
    }

    #[test]
    fn test_kind_change_replaces_record() {
        let mut tracker = Tracker::new();
        tracker.update(base(
            7,
            BaseFields {
                name: Some("DS3".into()),
                ..Default::default()
            },
        ));
        tracker.update(ObjectRecord {
            object_id: 7,
            fields: ObjectFields::Mine(PositionFields::default()),
        });
        assert_eq!(tracker.get(7).unwrap().kind(), ObjectKind::Mine);
        assert_eq!(tracker.objects_of(ObjectKind::Base).count(), 0);
    }

    #[test]
    fn test_observe_packets() {
        let mut tracker = Tracker::new();
        // player vessel 2 with only mask 1 bit 0 (weapons target)
        let update = ObjectUpdatePacket::new(vec![
            0x01, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00,
        ]);
        tracker.observe(&update.into());

        let (id, ship) = tracker.player_ship().unwrap();
        assert_eq!(id, 2);
        assert_eq!(ship.weapons_target, Some(9));

        tracker.observe(
            &DestroyObjectPacket {
                kind: ObjectKind::PlayerVessel,
                object_id: 2,
            }
            .into(),
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_bad_update_changes_nothing() {
        let mut tracker = Tracker::new();
        tracker.observe(&ObjectUpdatePacket::new(vec![0x08, 0x00]).into());
        assert!(tracker.is_empty());
    }
}
