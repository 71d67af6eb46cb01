//! Datagram encoding and snapshot chunking
//!
//! Every packet travels in a single UDP datagram of at most
//! [`MAX_PACKET_SIZE`] bytes. Anything larger would be truncated by the
//! receiving buffer, so encoding refuses it outright and world snapshots are
//! split into chunks that each fit.

use crate::{Packet, PlayerSnapshot, Segment, StreamError, MAX_PACKET_SIZE};
use bincode::{deserialize, serialize, serialized_size};

/// Encodes a packet, refusing anything that would not fit in one datagram
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, StreamError> {
    let data = serialize(packet)?;
    if data.len() > MAX_PACKET_SIZE {
        return Err(StreamError::PacketTooLarge(data.len()));
    }
    Ok(data)
}

pub fn decode_packet(data: &[u8]) -> Result<Packet, StreamError> {
    Ok(deserialize(data)?)
}

/// Splits a world snapshot into `WorldState` chunks that each fit in a datagram.
///
/// Segments keep their id order across chunks. Players ride in chunk 0 only.
/// An empty window still yields one chunk so peers see the tick.
pub fn chunk_world_state(
    tick: u32,
    timestamp: u64,
    segments: Vec<Segment>,
    mut players: Vec<PlayerSnapshot>,
) -> Vec<Packet> {
    let budget = MAX_PACKET_SIZE as u64;
    let frame = |players: &[PlayerSnapshot]| {
        serialized_size(&Packet::WorldState {
            tick,
            timestamp,
            chunk: 0,
            chunk_count: 0,
            segments: Vec::new(),
            players: players.to_vec(),
        })
        .unwrap_or(budget)
    };

    let mut groups: Vec<Vec<Segment>> = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut used = frame(&players);
    let bare_frame = frame(&[]);

    for segment in segments {
        let size = serialized_size(&segment).unwrap_or(budget);
        if used + size > budget && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
            used = bare_frame;
        }
        used += size;
        current.push(segment);
    }
    groups.push(current);

    let chunk_count = groups.len() as u32;
    groups
        .into_iter()
        .enumerate()
        .map(|(index, segments)| Packet::WorldState {
            tick,
            timestamp,
            chunk: index as u32,
            chunk_count,
            segments,
            players: if index == 0 {
                std::mem::take(&mut players)
            } else {
                Vec::new()
            },
        })
        .collect()
}
