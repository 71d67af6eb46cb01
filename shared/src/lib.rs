pub mod archetype;
pub mod authority;
pub mod catalog;
pub mod config;
pub mod contact;
pub mod datagram;
pub mod error;
pub mod rank;
pub mod streamer;

use serde::{Deserialize, Serialize};

pub use archetype::{measure_vertical_extent, Archetype, ArchetypeRegistry, TileLayer};
pub use authority::{NetworkAuthority, SpawnedObject};
pub use catalog::{Segment, SegmentCatalog};
pub use config::{EliminationZoneConfig, StreamConfig};
pub use contact::ContactTracker;
pub use datagram::{chunk_world_state, decode_packet, encode_packet};
pub use error::StreamError;
pub use rank::{ContactingPlayer, PlayerRankObserver};
pub use streamer::{
    ArchetypeSelector, ContactOutcome, MapStreamer, RandomSelector, SequenceSelector, StreamStats,
};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 2048;
pub const DEFAULT_INITIAL_WINDOW: u32 = 3;
pub const DEFAULT_REMOVAL_LAG: u32 = 2;
pub const CLIENT_TIMEOUT_SECS: u64 = 5;

pub type SegmentId = i64;
pub type ObjectHandle = u64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn up(y: f32) -> Self {
        Self::new(0.0, y, 0.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    PlayerState {
        sequence: u32,
        x: f32,
        y: f32,
    },
    Contact {
        sequence: u32,
        segment_id: SegmentId,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    ObjectSpawned {
        handle: ObjectHandle,
        archetype: String,
        position: Vec3,
    },
    SegmentSynchronized {
        handle: ObjectHandle,
        segment_id: SegmentId,
        vertical_extent: f32,
    },
    ObjectDestroyed {
        handle: ObjectHandle,
    },
    /// One chunk of the per-tick snapshot. A peer replaces its window only
    /// once all `chunk_count` chunks of a tick have arrived.
    WorldState {
        tick: u32,
        timestamp: u64,
        chunk: u32,
        chunk_count: u32,
        segments: Vec<Segment>,
        players: Vec<PlayerSnapshot>,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub in_lowest_position: bool,
}

impl PlayerSnapshot {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            in_lowest_position: false,
        }
    }
}
