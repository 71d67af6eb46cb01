use std::collections::HashMap;

/// What the streamer needs to know about the player touching a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactingPlayer {
    pub id: u32,
    pub in_lowest_position: bool,
}

impl ContactingPlayer {
    pub fn new(id: u32, in_lowest_position: bool) -> Self {
        Self {
            id,
            in_lowest_position,
        }
    }
}

/// Tracks the latest reported height of every active player.
///
/// A player is in the lowest position when no other active player is strictly
/// below it, so tied players all count as lowest and a lone player is lowest.
#[derive(Debug, Clone, Default)]
pub struct PlayerRankObserver {
    heights: HashMap<u32, f32>,
}

impl PlayerRankObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, player_id: u32, y: f32) {
        self.heights.insert(player_id, y);
    }

    pub fn remove(&mut self, player_id: u32) -> bool {
        self.heights.remove(&player_id).is_some()
    }

    /// Unknown players are never lowest
    pub fn is_in_lowest_position(&self, player_id: u32) -> bool {
        match self.heights.get(&player_id) {
            Some(&y) => self.heights.values().all(|&other| other >= y),
            None => false,
        }
    }

    /// Snapshot taken at the instant of a contact
    pub fn snapshot(&self, player_id: u32) -> ContactingPlayer {
        ContactingPlayer::new(player_id, self.is_in_lowest_position(player_id))
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}
