use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ContactTracker, ContactingPlayer, MapStreamer, NetworkAuthority, ObjectHandle, Packet,
    PlayerSnapshot, RandomSelector, Segment, SegmentId, SpawnedObject, StreamConfig, StreamError,
    Vec3,
};
use std::collections::{BTreeMap, HashMap};

const CEILING_MARGIN: f32 = 0.01;

/// Replication primitives of a peer: never authoritative, never creates or destroys
#[derive(Debug, Default, Clone, Copy)]
pub struct MirrorAuthority;

impl NetworkAuthority for MirrorAuthority {
    fn is_authoritative(&self) -> bool {
        false
    }

    fn create_replicated(
        &mut self,
        _archetype: &str,
        _position: Vec3,
    ) -> Result<SpawnedObject, StreamError> {
        Err(StreamError::NotAuthoritative)
    }

    fn synchronize_segment(&mut self, _segment: &Segment) {}

    fn destroy_replicated(&mut self, _handle: ObjectHandle) {}
}

/// A replicated object as announced by its creation packet
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredObject {
    pub archetype: String,
    pub position: Vec3,
}

/// Chunks of one tick's world snapshot collected so far
#[derive(Debug)]
struct SnapshotAssembly {
    tick: u32,
    chunk_count: u32,
    chunks: BTreeMap<u32, Vec<Segment>>,
    players: Vec<PlayerSnapshot>,
}

impl SnapshotAssembly {
    fn new(tick: u32, chunk_count: u32) -> Self {
        Self {
            tick,
            chunk_count,
            chunks: BTreeMap::new(),
            players: Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.chunks.len() as u32 == self.chunk_count
    }
}

/// Peer-side view of the world plus the locally simulated climber
pub struct ClientGameState {
    streamer: MapStreamer<MirrorAuthority>,
    /// Latest creation still waiting for its segment setup. The authoritative
    /// node always sends a segment's setup right after its creation, so any
    /// other packet arriving first means the object is not a segment.
    pending: Option<(ObjectHandle, MirroredObject)>,
    /// Replicated objects that are not segments, such as the elimination zone
    props: HashMap<ObjectHandle, MirroredObject>,
    assembly: Option<SnapshotAssembly>,
    contacts: ContactTracker,
    rng: StdRng,
    pub tick: u32,
    pub players: Vec<PlayerSnapshot>,
    pub local_position: (f32, f32),
    pub climb_speed: f32,
}

impl ClientGameState {
    pub fn new(climb_speed: f32, seed: u64) -> Result<Self, StreamError> {
        let streamer = MapStreamer::new(
            StreamConfig::default(),
            MirrorAuthority,
            RandomSelector::from_seed(seed),
        )?;

        Ok(Self {
            streamer,
            pending: None,
            props: HashMap::new(),
            assembly: None,
            contacts: ContactTracker::new(),
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            players: Vec::new(),
            local_position: (0.0, 0.0),
            climb_speed,
        })
    }

    /// Applies a replication or snapshot packet from the authoritative node.
    ///
    /// Returns false for packets that do not describe the world.
    pub fn apply_server_packet(&mut self, packet: Packet) -> bool {
        if !matches!(packet, Packet::SegmentSynchronized { .. }) {
            self.settle_pending();
        }

        match packet {
            Packet::ObjectSpawned {
                handle,
                archetype,
                position,
            } => {
                self.pending = Some((
                    handle,
                    MirroredObject {
                        archetype,
                        position,
                    },
                ));
            }

            Packet::SegmentSynchronized {
                handle,
                segment_id,
                vertical_extent,
            } => match self.pending.take() {
                Some((pending, object)) if pending == handle => {
                    let segment = Segment::new(
                        segment_id,
                        handle,
                        &object.archetype,
                        object.position,
                        vertical_extent,
                    );
                    debug!("Mirrored segment {} at y={:.2}", segment_id, object.position.y);
                    self.streamer.apply_replicated_segment(segment);
                }
                other => {
                    self.pending = other;
                    self.settle_pending();
                    warn!(
                        "Setup for unknown object {} (segment {}), waiting for snapshot",
                        handle, segment_id
                    );
                }
            },

            Packet::ObjectDestroyed { handle } => {
                if self.props.remove(&handle).is_some() {
                    debug!("Object {} removed", handle);
                }
                if let Some(id) = self.streamer.apply_replicated_destroy(handle) {
                    debug!("Segment {} retired", id);
                }
            }

            Packet::WorldState {
                tick,
                chunk,
                chunk_count,
                segments,
                players,
                ..
            } => self.apply_snapshot_chunk(tick, chunk, chunk_count, segments, players),

            _ => return false,
        }
        true
    }

    fn settle_pending(&mut self) {
        if let Some((handle, object)) = self.pending.take() {
            debug!("Object {} ({}) is not a segment", handle, object.archetype);
            self.props.insert(handle, object);
        }
    }

    /// Collects snapshot chunks and replaces the window once a tick is complete.
    ///
    /// Chunks older than the last applied tick, or than the tick being
    /// collected, are dropped. A newer tick abandons an incomplete one.
    fn apply_snapshot_chunk(
        &mut self,
        tick: u32,
        chunk: u32,
        chunk_count: u32,
        segments: Vec<Segment>,
        players: Vec<PlayerSnapshot>,
    ) {
        if tick < self.tick || chunk >= chunk_count {
            return;
        }

        let mut assembly = match self.assembly.take() {
            Some(current) if current.tick == tick && current.chunk_count == chunk_count => current,
            Some(current) if current.tick > tick => {
                self.assembly = Some(current);
                return;
            }
            _ => SnapshotAssembly::new(tick, chunk_count),
        };

        if chunk == 0 {
            assembly.players = players;
        }
        assembly.chunks.insert(chunk, segments);

        if !assembly.is_complete() {
            self.assembly = Some(assembly);
            return;
        }

        let segments: Vec<Segment> = assembly.chunks.into_values().flatten().collect();
        // Anything the snapshot names as a segment was misfiled after a lost setup.
        for segment in &segments {
            self.props.remove(&segment.handle);
        }
        self.streamer.apply_snapshot(segments);
        self.players = assembly.players;
        self.tick = tick;
    }

    /// Advances the local climber and returns the segments it started touching.
    ///
    /// The climber cannot rise above the top of the mirrored window. Every onset
    /// also goes through the local streamer, which leaves the world untouched on
    /// a peer; the caller forwards the ids to the authoritative node.
    pub fn step(&mut self, client_id: u32, dt: f32) -> Vec<SegmentId> {
        let ceiling = self
            .streamer
            .catalog()
            .frontier()
            .map(Segment::top)
            .unwrap_or(0.0);
        let floor = self
            .streamer
            .catalog()
            .oldest()
            .map(|s| s.position.y)
            .unwrap_or(0.0);

        let jitter: f32 = self.rng.gen_range(0.5..1.5);
        let y = self.local_position.1 + self.climb_speed * jitter * dt;
        // Stay strictly inside the frontier so its contact still registers.
        let y = y.min(ceiling - CEILING_MARGIN).max(floor);
        self.local_position.1 = y;

        let entered = self.contacts.update(y, self.streamer.catalog().iter());

        let me = ContactingPlayer::new(client_id, self.is_local_lowest(client_id));
        for segment_id in &entered {
            let outcome = self.streamer.on_segment_contact(&me, *segment_id);
            debug_assert!(outcome.is_noop());
        }
        entered
    }

    fn is_local_lowest(&self, client_id: u32) -> bool {
        self.players
            .iter()
            .find(|p| p.id == client_id)
            .map(|p| p.in_lowest_position)
            .unwrap_or(false)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.streamer.catalog().iter()
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.streamer.catalog().ids()
    }

    /// Replicated objects that are not segments
    pub fn props(&self) -> &HashMap<ObjectHandle, MirroredObject> {
        &self.props
    }

    pub fn has_pending_object(&self) -> bool {
        self.pending.is_some()
    }
}
