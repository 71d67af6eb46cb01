//! Authoritative replication layer
//!
//! Owns the table of networked objects on the authoritative node. Every
//! creation, segment setup and destruction is recorded here and queued as a
//! packet; the network loop drains the queue and broadcasts it to all peers.
//! A peer joining mid-match gets the live table replayed instead.

use log::{debug, warn};
use shared::{
    ArchetypeRegistry, NetworkAuthority, ObjectHandle, Packet, Segment, SegmentId,
    SpawnedObject, StreamError, Vec3,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicatedObject {
    pub archetype: String,
    pub position: Vec3,
    /// Segment id and extent, once the object has been set up as a segment
    pub segment: Option<(SegmentId, f32)>,
}

pub struct Replicator {
    authoritative: bool,
    registry: ArchetypeRegistry,
    objects: BTreeMap<ObjectHandle, ReplicatedObject>,
    next_handle: ObjectHandle,
    outbox: Vec<Packet>,
}

impl Replicator {
    pub fn new(registry: ArchetypeRegistry, authoritative: bool) -> Self {
        Self {
            authoritative,
            registry,
            objects: BTreeMap::new(),
            next_handle: 1,
            outbox: Vec::new(),
        }
    }

    /// Takes every replication packet queued since the last drain, oldest first
    pub fn drain_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }

    /// Packets that rebuild every live object on a fresh peer, in handle order.
    ///
    /// Each segment's setup directly follows its creation, the same pairing
    /// the outbox produces.
    pub fn replay(&self) -> Vec<Packet> {
        let mut packets = Vec::with_capacity(self.objects.len() * 2);
        for (&handle, object) in &self.objects {
            packets.push(Packet::ObjectSpawned {
                handle,
                archetype: object.archetype.clone(),
                position: object.position,
            });
            if let Some((segment_id, vertical_extent)) = object.segment {
                packets.push(Packet::SegmentSynchronized {
                    handle,
                    segment_id,
                    vertical_extent,
                });
            }
        }
        packets
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl NetworkAuthority for Replicator {
    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn create_replicated(
        &mut self,
        archetype: &str,
        position: Vec3,
    ) -> Result<SpawnedObject, StreamError> {
        if !self.authoritative {
            return Err(StreamError::NotAuthoritative);
        }

        let template = self
            .registry
            .get(archetype)
            .ok_or_else(|| StreamError::UnknownArchetype(archetype.to_string()))?;
        let layers = template.layers.clone();

        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(
            handle,
            ReplicatedObject {
                archetype: archetype.to_string(),
                position,
                segment: None,
            },
        );
        self.outbox.push(Packet::ObjectSpawned {
            handle,
            archetype: archetype.to_string(),
            position,
        });

        debug!("Created object {} ({})", handle, archetype);
        Ok(SpawnedObject { handle, layers })
    }

    fn synchronize_segment(&mut self, segment: &Segment) {
        let Some(object) = self.objects.get_mut(&segment.handle) else {
            warn!(
                "Segment {} refers to unknown object {}",
                segment.id, segment.handle
            );
            return;
        };
        object.segment = Some((segment.id, segment.vertical_extent));
        self.outbox.push(Packet::SegmentSynchronized {
            handle: segment.handle,
            segment_id: segment.id,
            vertical_extent: segment.vertical_extent,
        });
    }

    fn destroy_replicated(&mut self, handle: ObjectHandle) {
        if !self.authoritative {
            return;
        }
        if self.objects.remove(&handle).is_some() {
            self.outbox.push(Packet::ObjectDestroyed { handle });
            debug!("Destroyed object {}", handle);
        }
    }
}
