use crate::replicator::Replicator;
use log::{error, info, warn};
use shared::{
    chunk_world_state, ArchetypeRegistry, ArchetypeSelector, ContactOutcome, MapStreamer, Packet,
    PlayerRankObserver, PlayerSnapshot, RandomSelector, SegmentId, StreamConfig, StreamError,
    StreamStats,
};
use std::collections::HashMap;

/// Authoritative match state: the streamed map plus the players climbing it
pub struct GameState<S: ArchetypeSelector = RandomSelector> {
    pub tick: u32,
    pub players: HashMap<u32, PlayerSnapshot>,
    streamer: MapStreamer<Replicator, S>,
    ranks: PlayerRankObserver,
    peers_joined: u32,
}

impl GameState<RandomSelector> {
    pub fn new(config: StreamConfig, seed: Option<u64>) -> Result<Self, StreamError> {
        let selector = match seed {
            Some(seed) => RandomSelector::from_seed(seed),
            None => RandomSelector::from_entropy(),
        };
        Self::with_selector(config, selector)
    }
}

impl<S: ArchetypeSelector> GameState<S> {
    pub fn with_selector(config: StreamConfig, selector: S) -> Result<Self, StreamError> {
        let registry = ArchetypeRegistry::from_archetypes(config.archetypes.iter().cloned());
        let replicator = Replicator::new(registry, true);

        Ok(Self {
            tick: 0,
            players: HashMap::new(),
            streamer: MapStreamer::new(config, replicator, selector)?,
            ranks: PlayerRankObserver::new(),
            peers_joined: 0,
        })
    }

    /// Registers a joining player and runs match setup.
    ///
    /// The first peer of the match builds the initial window; the second one
    /// brings in the elimination zone.
    pub fn add_player(&mut self, client_id: u32) {
        let player = PlayerSnapshot::new(client_id, 0.0, 0.0);
        info!("Added player {} at ({}, {})", client_id, player.x, player.y);
        self.players.insert(client_id, player);
        self.ranks.update(client_id, 0.0);
        self.peers_joined += 1;

        if self.peers_joined == 1 {
            self.streamer.initialize();
        } else if let Err(e) = self.streamer.create_elimination_zone() {
            error!("Failed to spawn elimination zone: {}", e);
        }
    }

    pub fn remove_player(&mut self, client_id: &u32) {
        self.players.remove(client_id);
        self.ranks.remove(*client_id);
        info!("Removed player {}", client_id);
    }

    pub fn update_player_position(&mut self, client_id: u32, x: f32, y: f32) {
        if let Some(player) = self.players.get_mut(&client_id) {
            player.x = x;
            player.y = y;
            self.ranks.update(client_id, y);
        }
    }

    /// Applies a contact onset reported by a peer.
    ///
    /// The lowest-position flag is read from the ranking at the moment the
    /// contact is processed.
    pub fn handle_contact(&mut self, client_id: u32, segment_id: SegmentId) -> ContactOutcome {
        if !self.players.contains_key(&client_id) {
            warn!(
                "Contact on segment {} from unknown player {}",
                segment_id, client_id
            );
            return ContactOutcome::default();
        }

        let player = self.ranks.snapshot(client_id);
        let outcome = self.streamer.on_segment_contact(&player, segment_id);

        if let Some(id) = outcome.spawned {
            info!(
                "Player {} reached segment {}, spawned segment {}",
                client_id, segment_id, id
            );
        }
        if let Some(id) = outcome.retired {
            info!(
                "Lowest player {} on segment {} retired segment {}",
                client_id, segment_id, id
            );
        }
        outcome
    }

    /// Replication packets produced since the last call
    pub fn drain_replication(&mut self) -> Vec<Packet> {
        self.streamer.authority_mut().drain_outbox()
    }

    pub fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
        let mut players: Vec<PlayerSnapshot> = self
            .players
            .values()
            .map(|p| PlayerSnapshot {
                in_lowest_position: self.ranks.is_in_lowest_position(p.id),
                ..p.clone()
            })
            .collect();
        players.sort_by_key(|p| p.id);
        players
    }

    /// The current window and players as datagram-sized `WorldState` chunks
    pub fn world_state(&self, timestamp: u64) -> Vec<Packet> {
        chunk_world_state(
            self.tick,
            timestamp,
            self.streamer.catalog().to_vec(),
            self.player_snapshots(),
        )
    }

    /// Replication packets that bring a newly joined peer up to date
    pub fn join_packets(&self) -> Vec<Packet> {
        self.streamer.authority().replay()
    }

    pub fn stats(&self) -> StreamStats {
        self.streamer.stats()
    }

    pub fn streamer(&self) -> &MapStreamer<Replicator, S> {
        &self.streamer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::SequenceSelector;

    fn game() -> GameState<SequenceSelector> {
        GameState::with_selector(StreamConfig::default(), SequenceSelector::new(vec![0, 1, 2]))
            .unwrap()
    }

    #[test]
    fn test_first_player_builds_window() {
        let mut game = game();
        game.add_player(1);

        assert_eq!(game.streamer().catalog().ids(), vec![0, 1, 2]);
        assert!(game.streamer().elimination_zone().is_none());

        let packets = game.drain_replication();
        let spawned = packets
            .iter()
            .filter(|p| matches!(p, Packet::ObjectSpawned { .. }))
            .count();
        let synced = packets
            .iter()
            .filter(|p| matches!(p, Packet::SegmentSynchronized { .. }))
            .count();
        assert_eq!(spawned, 3);
        assert_eq!(synced, 3);
    }

    #[test]
    fn test_second_player_brings_elimination_zone() {
        let mut game = game();
        game.add_player(1);
        game.add_player(2);
        let zone = game.streamer().elimination_zone();
        assert!(zone.is_some());

        game.add_player(3);
        assert_eq!(game.streamer().elimination_zone(), zone);
        assert_eq!(game.stats().segments_created, 3);
    }

    #[test]
    fn test_rejoin_does_not_rebuild_window() {
        let mut game = game();
        game.add_player(1);
        game.remove_player(&1);
        game.add_player(2);

        assert_eq!(game.stats().segments_created, 3);
        assert!(game.streamer().elimination_zone().is_some());
    }

    #[test]
    fn test_contact_uses_current_rank() {
        let mut game = game();
        game.add_player(1);
        game.add_player(2);
        game.update_player_position(1, 0.0, 30.0);
        game.update_player_position(2, 0.0, 5.0);

        // Player 1 is above player 2, so touching the frontier only grows the map.
        let outcome = game.handle_contact(1, 2);
        assert_eq!(outcome.spawned, Some(3));
        assert_eq!(outcome.retired, None);

        // Player 2 is lowest; touching segment 3 retires segment 1.
        let outcome = game.handle_contact(2, 3);
        assert_eq!(outcome.spawned, Some(4));
        assert_eq!(outcome.retired, Some(1));
    }

    #[test]
    fn test_contact_from_unknown_player_ignored() {
        let mut game = game();
        game.add_player(1);
        assert!(game.handle_contact(42, 2).is_noop());
        assert_eq!(game.stats().segments_created, 3);
    }

    #[test]
    fn test_world_state_snapshot() {
        let mut game = game();
        game.add_player(2);
        game.add_player(1);
        game.update_player_position(1, 0.0, 9.0);
        game.tick = 17;

        let chunks = game.world_state(1000);
        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            Packet::WorldState {
                tick,
                timestamp,
                segments,
                players,
                ..
            } => {
                assert_eq!(*tick, 17);
                assert_eq!(*timestamp, 1000);
                assert_eq!(segments.len(), 3);
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id, 1);
                assert_approx_eq!(players[0].y, 9.0);
                assert!(!players[0].in_lowest_position);
                assert!(players[1].in_lowest_position);
            }
            _ => panic!("Unexpected packet type"),
        }
    }

    #[test]
    fn test_lagging_window_snapshot_fits_datagrams() {
        let mut game = game();
        game.add_player(1);
        game.add_player(2);
        game.update_player_position(1, 0.0, 1000.0);

        // Player 2 never moves, so nothing is retired while player 1 climbs.
        for id in 2..50 {
            game.handle_contact(1, id);
        }
        assert_eq!(game.stats().live_segments, 51);

        let chunks = game.world_state(0);
        assert!(chunks.len() > 1);
        let mut ids = Vec::new();
        for packet in &chunks {
            let data = shared::encode_packet(packet).unwrap();
            assert!(data.len() <= shared::MAX_PACKET_SIZE);
            if let Packet::WorldState { segments, .. } = packet {
                ids.extend(segments.iter().map(|s| s.id));
            }
        }
        assert_eq!(ids, (0..51).collect::<Vec<SegmentId>>());

        for packet in game.join_packets() {
            assert!(shared::encode_packet(&packet).is_ok());
        }
    }

    #[test]
    fn test_join_packets_replay_live_window() {
        let mut game = game();
        game.add_player(1);
        game.add_player(2);
        game.handle_contact(1, 2);
        game.drain_replication();

        let packets = game.join_packets();
        let synced: Vec<SegmentId> = packets
            .iter()
            .filter_map(|p| match p {
                Packet::SegmentSynchronized { segment_id, .. } => Some(*segment_id),
                _ => None,
            })
            .collect();
        let spawned = packets
            .iter()
            .filter(|p| matches!(p, Packet::ObjectSpawned { .. }))
            .count();

        assert_eq!(synced, vec![0, 1, 2, 3]);
        // Four segments plus the elimination zone
        assert_eq!(spawned, 5);
    }

    #[test]
    fn test_unknown_zone_archetype_is_not_fatal() {
        let mut config = StreamConfig::default();
        config.elimination_zone.archetype = "Nowhere".to_string();
        let mut game =
            GameState::with_selector(config, SequenceSelector::new(vec![0])).unwrap();

        game.add_player(1);
        game.add_player(2);
        assert!(game.streamer().elimination_zone().is_none());
        assert_eq!(game.players.len(), 2);
    }
}
