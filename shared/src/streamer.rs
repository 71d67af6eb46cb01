//! Sliding window of map segments
//!
//! The streamer decides when the next segment is spawned, where it is placed
//! and when the oldest one is retired. All of it runs on every node; only the
//! node whose [`NetworkAuthority`] reports itself authoritative ever mutates
//! anything. Callbacks are expected to arrive serially from one update loop.
//!
//! Placement follows a single running sum: segment `k` is created at the sum of
//! the extents of segments `0..k`, and ids are handed out as `0, 1, 2, ...` in
//! creation order.

use crate::{
    measure_vertical_extent, ContactingPlayer, NetworkAuthority, ObjectHandle, Segment,
    SegmentCatalog, SegmentId, StreamConfig, StreamError, Vec3,
};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of archetype picks, injected so tests can pin the sequence
pub trait ArchetypeSelector {
    /// Returns an index in `0..count`. `count` is never zero.
    fn select(&mut self, count: usize) -> usize;
}

/// Uniform pick backed by a seedable RNG
#[derive(Debug, Clone)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl ArchetypeSelector for RandomSelector {
    fn select(&mut self, count: usize) -> usize {
        self.rng.gen_range(0..count)
    }
}

/// Replays a fixed list of picks, cycling when exhausted
#[derive(Debug, Clone)]
pub struct SequenceSelector {
    picks: Vec<usize>,
    next: usize,
}

impl SequenceSelector {
    pub fn new(picks: Vec<usize>) -> Self {
        Self { picks, next: 0 }
    }
}

impl ArchetypeSelector for SequenceSelector {
    fn select(&mut self, count: usize) -> usize {
        if self.picks.is_empty() {
            return 0;
        }
        let pick = self.picks[self.next % self.picks.len()];
        self.next += 1;
        pick % count
    }
}

/// What a single contact did to the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactOutcome {
    pub spawned: Option<SegmentId>,
    pub retired: Option<SegmentId>,
}

impl ContactOutcome {
    pub fn is_noop(&self) -> bool {
        self.spawned.is_none() && self.retired.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStats {
    pub segments_created: u64,
    pub live_segments: usize,
    pub cumulative_height: f32,
    pub failed_spawns: u64,
    /// False when the frontier has already spawned its successor or no segment
    /// is live. A world stuck in that state has run out of climbable segments.
    pub frontier_can_grow: bool,
}

pub struct MapStreamer<A: NetworkAuthority, S: ArchetypeSelector = RandomSelector> {
    config: StreamConfig,
    authority: A,
    selector: S,
    catalog: SegmentCatalog,
    cumulative_height: f32,
    next_id: SegmentId,
    failed_spawns: u64,
    initialized: bool,
    elimination_zone: Option<ObjectHandle>,
}

impl<A: NetworkAuthority, S: ArchetypeSelector> MapStreamer<A, S> {
    pub fn new(config: StreamConfig, authority: A, selector: S) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            config,
            authority,
            selector,
            catalog: SegmentCatalog::new(),
            cumulative_height: 0.0,
            next_id: 0,
            failed_spawns: 0,
            initialized: false,
            elimination_zone: None,
        })
    }

    /// Match setup hook, called once on every node.
    ///
    /// On the authoritative node this spawns the initial window and returns how
    /// many segments were created. Failed spawns are logged and counted in
    /// [`StreamStats::failed_spawns`]; the remaining spawns are still attempted.
    pub fn initialize(&mut self) -> usize {
        if self.initialized {
            warn!("Map streamer already initialized, ignoring");
            return 0;
        }
        self.initialized = true;

        if !self.authority.is_authoritative() {
            debug!("Skipping initial window on non-authoritative node");
            return 0;
        }

        let mut spawned = 0;
        for _ in 0..self.config.initial_window {
            match self.spawn_segment() {
                Ok(Some(_)) => spawned += 1,
                Ok(None) => {}
                Err(e) => error!("Initial segment spawn failed: {}", e),
            }
        }

        info!(
            "Initial window ready: {} segments, height {:.2}",
            spawned, self.cumulative_height
        );
        spawned
    }

    /// Spawns the next segment on top of the current stack.
    ///
    /// Returns `Ok(None)` without touching anything on a non-authoritative
    /// node. On failure the counter and height are left unchanged.
    pub fn spawn_segment(&mut self) -> Result<Option<SegmentId>, StreamError> {
        if !self.authority.is_authoritative() {
            return Ok(None);
        }

        let index = self.selector.select(self.config.catalog.len());
        let archetype = self.config.catalog[index].clone();
        let position = Vec3::up(self.cumulative_height);

        let spawned = match self.authority.create_replicated(&archetype, position) {
            Ok(spawned) => spawned,
            Err(e) => {
                self.failed_spawns += 1;
                return Err(e);
            }
        };

        let extent = measure_vertical_extent(&spawned.layers);
        let id = self.next_id;
        let segment = Segment::new(id, spawned.handle, &archetype, position, extent);

        self.authority.synchronize_segment(&segment);
        self.catalog.insert(segment);
        self.next_id += 1;
        self.cumulative_height += extent;

        debug!(
            "Spawned segment {} ({}) at y={:.2}, extent {:.2}",
            id, archetype, position.y, extent
        );
        Ok(Some(id))
    }

    /// Handles a player beginning to touch a segment.
    ///
    /// The growth and retirement effects are independent: a lowest-ranked player
    /// touching the frontier both extends the window and retires the segment
    /// `removal_lag` ids behind the touched one. Non-authoritative nodes do
    /// nothing here; they forward the contact to the authoritative node.
    ///
    /// Retirement does not require the touched segment to still be live. A
    /// contact can reach the authoritative node after that segment was retired.
    pub fn on_segment_contact(
        &mut self,
        player: &ContactingPlayer,
        segment_id: SegmentId,
    ) -> ContactOutcome {
        let mut outcome = ContactOutcome::default();

        if !self.authority.is_authoritative() {
            return outcome;
        }

        let growth_enabled = self
            .catalog
            .get(segment_id)
            .map(|s| s.growth_enabled)
            .unwrap_or(false);

        if growth_enabled {
            match self.spawn_segment() {
                Ok(spawned) => {
                    outcome.spawned = spawned;
                    if let Some(segment) = self.catalog.get_mut(segment_id) {
                        segment.growth_enabled = false;
                    }
                }
                // The flag stays set so the next contact onset retries.
                Err(e) => error!(
                    "Segment {} could not extend the window for player {}: {}",
                    segment_id, player.id, e
                ),
            }
        }

        if player.in_lowest_position {
            // Ids come off the wire; a target below i64::MIN cannot name a segment.
            outcome.retired = segment_id
                .checked_sub(SegmentId::from(self.config.removal_lag))
                .and_then(|target| self.retire_segment(target));
        }

        outcome
    }

    /// Destroys the live segment with `target_id`, if any.
    ///
    /// Missing ids (negative, not yet created, already retired) are the normal
    /// steady state early in a match and are ignored.
    pub fn retire_segment(&mut self, target_id: SegmentId) -> Option<SegmentId> {
        if !self.authority.is_authoritative() {
            return None;
        }

        let segment = self.catalog.remove(target_id)?;
        self.authority.destroy_replicated(segment.handle);
        debug!("Retired segment {}", segment.id);
        Some(segment.id)
    }

    /// Spawns the elimination zone once per match on the authoritative node.
    ///
    /// Returns the handle of the new zone, or `Ok(None)` when the node is not
    /// authoritative or the zone already exists.
    pub fn create_elimination_zone(&mut self) -> Result<Option<ObjectHandle>, StreamError> {
        if !self.authority.is_authoritative() || self.elimination_zone.is_some() {
            return Ok(None);
        }

        let zone = &self.config.elimination_zone;
        let spawned = self
            .authority
            .create_replicated(&zone.archetype, zone.position)?;

        info!(
            "Elimination zone {} spawned at y={:.2}",
            zone.archetype, zone.position.y
        );
        self.elimination_zone = Some(spawned.handle);
        Ok(Some(spawned.handle))
    }

    /// Mirrors a segment replicated from the authoritative node
    pub fn apply_replicated_segment(&mut self, segment: Segment) {
        if self.authority.is_authoritative() {
            return;
        }
        self.next_id = self.next_id.max(segment.id.saturating_add(1));
        self.cumulative_height = self.cumulative_height.max(segment.top());
        self.catalog.insert(segment);
    }

    /// Mirrors a replicated destroy. Unknown handles are ignored.
    pub fn apply_replicated_destroy(&mut self, handle: ObjectHandle) -> Option<SegmentId> {
        if self.authority.is_authoritative() {
            return None;
        }
        if self.elimination_zone == Some(handle) {
            self.elimination_zone = None;
        }
        self.catalog.remove_by_handle(handle).map(|s| s.id)
    }

    /// Replaces the mirrored window with a full snapshot from the authoritative node
    pub fn apply_snapshot(&mut self, segments: Vec<Segment>) {
        if self.authority.is_authoritative() {
            return;
        }
        for segment in &segments {
            self.next_id = self.next_id.max(segment.id.saturating_add(1));
            self.cumulative_height = self.cumulative_height.max(segment.top());
        }
        self.catalog.replace_all(segments);
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            segments_created: self.next_id.max(0) as u64,
            live_segments: self.catalog.len(),
            cumulative_height: self.cumulative_height,
            failed_spawns: self.failed_spawns,
            frontier_can_grow: self
                .catalog
                .frontier()
                .map(|s| s.growth_enabled)
                .unwrap_or(false),
        }
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    /// Height at which the next segment will be placed
    pub fn cumulative_height(&self) -> f32 {
        self.cumulative_height
    }

    pub fn segments_created(&self) -> SegmentId {
        self.next_id
    }

    pub fn elimination_zone(&self) -> Option<ObjectHandle> {
        self.elimination_zone
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut A {
        &mut self.authority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SpawnedObject, TileLayer};
    use assert_approx_eq::assert_approx_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeAuthority {
        authoritative: bool,
        templates: HashMap<String, Vec<TileLayer>>,
        next_handle: ObjectHandle,
        created: Vec<(String, Vec3)>,
        synced: Vec<SegmentId>,
        destroyed: Vec<ObjectHandle>,
    }

    impl FakeAuthority {
        fn new(authoritative: bool) -> Self {
            let mut templates = HashMap::new();
            templates.insert("A".to_string(), vec![TileLayer::new("g", 0, 10, 1.0)]);
            templates.insert("B".to_string(), vec![TileLayer::new("g", 0, 4, 0.5)]);
            templates.insert("Zone".to_string(), vec![]);
            Self {
                authoritative,
                templates,
                next_handle: 1,
                ..Default::default()
            }
        }
    }

    impl NetworkAuthority for FakeAuthority {
        fn is_authoritative(&self) -> bool {
            self.authoritative
        }

        fn create_replicated(
            &mut self,
            archetype: &str,
            position: Vec3,
        ) -> Result<SpawnedObject, StreamError> {
            let layers = self
                .templates
                .get(archetype)
                .cloned()
                .ok_or_else(|| StreamError::UnknownArchetype(archetype.to_string()))?;
            let handle = self.next_handle;
            self.next_handle += 1;
            self.created.push((archetype.to_string(), position));
            Ok(SpawnedObject { handle, layers })
        }

        fn synchronize_segment(&mut self, segment: &Segment) {
            self.synced.push(segment.id);
        }

        fn destroy_replicated(&mut self, handle: ObjectHandle) {
            self.destroyed.push(handle);
        }
    }

    fn config(catalog: &[&str]) -> StreamConfig {
        StreamConfig {
            catalog: catalog.iter().map(|s| s.to_string()).collect(),
            elimination_zone: crate::EliminationZoneConfig {
                archetype: "Zone".to_string(),
                position: Vec3::up(-5.0),
            },
            ..StreamConfig::default()
        }
    }

    fn streamer(authoritative: bool) -> MapStreamer<FakeAuthority, SequenceSelector> {
        MapStreamer::new(
            config(&["A", "B"]),
            FakeAuthority::new(authoritative),
            SequenceSelector::new(vec![0, 1]),
        )
        .unwrap()
    }

    fn climber() -> ContactingPlayer {
        ContactingPlayer::new(1, false)
    }

    fn lowest() -> ContactingPlayer {
        ContactingPlayer::new(2, true)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = MapStreamer::new(
            config(&[]),
            FakeAuthority::new(true),
            SequenceSelector::new(vec![]),
        );
        assert!(matches!(result, Err(StreamError::EmptyCatalog)));
    }

    #[test]
    fn test_initialize_spawns_window() {
        let mut s = streamer(true);
        assert_eq!(s.initialize(), 3);

        assert_eq!(s.catalog().ids(), vec![0, 1, 2]);
        // A (10) + B (2) + A (10)
        assert_approx_eq!(s.cumulative_height(), 22.0);
        assert_eq!(s.authority().synced, vec![0, 1, 2]);
        assert!(s.is_initialized());
    }

    #[test]
    fn test_initialize_only_once() {
        let mut s = streamer(true);
        s.initialize();
        assert_eq!(s.initialize(), 0);
        assert_eq!(s.segments_created(), 3);
    }

    #[test]
    fn test_placement_is_prefix_sum() {
        let mut s = streamer(true);
        for _ in 0..6 {
            s.spawn_segment().unwrap();
        }

        let mut expected = 0.0;
        for segment in s.catalog().iter() {
            assert_approx_eq!(segment.position.y, expected);
            assert_eq!(segment.position.x, 0.0);
            assert_eq!(segment.position.z, 0.0);
            expected += segment.vertical_extent;
        }
        assert_approx_eq!(s.cumulative_height(), expected);
    }

    #[test]
    fn test_non_authoritative_never_mutates() {
        let mut s = streamer(false);
        assert_eq!(s.initialize(), 0);
        assert_eq!(s.spawn_segment(), Ok(None));
        assert_eq!(s.retire_segment(0), None);
        assert_eq!(s.create_elimination_zone(), Ok(None));
        assert!(s.on_segment_contact(&lowest(), 3).is_noop());

        assert_eq!(s.segments_created(), 0);
        assert_eq!(s.cumulative_height(), 0.0);
        assert!(s.authority().created.is_empty());
        assert!(s.authority().destroyed.is_empty());
    }

    #[test]
    fn test_non_authoritative_keeps_growth_flag() {
        let mut s = streamer(false);
        s.apply_replicated_segment(Segment::new(0, 7, "A", Vec3::up(0.0), 10.0));

        s.on_segment_contact(&climber(), 0);
        assert!(s.catalog().get(0).unwrap().growth_enabled);
    }

    #[test]
    fn test_frontier_contact_spawns_once() {
        let mut s = streamer(true);
        s.initialize();

        let outcome = s.on_segment_contact(&climber(), 2);
        assert_eq!(outcome.spawned, Some(3));
        assert_eq!(outcome.retired, None);
        assert!(!s.catalog().get(2).unwrap().growth_enabled);

        let again = s.on_segment_contact(&climber(), 2);
        assert!(again.is_noop());
        assert_eq!(s.segments_created(), 4);
    }

    #[test]
    fn test_every_segment_grows_once() {
        let mut s = streamer(true);
        s.initialize();

        // Older segments still carry their flag and each spawns exactly one successor.
        assert_eq!(s.on_segment_contact(&climber(), 0).spawned, Some(3));
        assert_eq!(s.on_segment_contact(&climber(), 0).spawned, None);
        assert_eq!(s.on_segment_contact(&climber(), 1).spawned, Some(4));
        assert_eq!(s.segments_created(), 5);
    }

    #[test]
    fn test_lowest_contact_retires_lagged_segment() {
        let mut s = streamer(true);
        for _ in 0..6 {
            s.spawn_segment().unwrap();
        }
        for id in 0..6 {
            s.catalog.get_mut(id).unwrap().growth_enabled = false;
        }

        let handle_of_3 = s.catalog().get(3).unwrap().handle;
        let outcome = s.on_segment_contact(&lowest(), 5);
        assert_eq!(outcome.retired, Some(3));
        assert_eq!(outcome.spawned, None);
        assert!(!s.catalog().contains(3));
        assert_eq!(s.authority().destroyed, vec![handle_of_3]);

        let again = s.on_segment_contact(&lowest(), 5);
        assert!(again.is_noop());
        assert_eq!(s.authority().destroyed.len(), 1);
    }

    #[test]
    fn test_spawn_and_retire_in_one_contact() {
        let mut s = streamer(true);
        s.initialize();

        let outcome = s.on_segment_contact(&lowest(), 2);
        assert_eq!(outcome.spawned, Some(3));
        assert_eq!(outcome.retired, Some(0));
        assert_eq!(s.catalog().ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_early_retire_targets_are_ignored() {
        let mut s = streamer(true);
        s.initialize();

        assert_eq!(s.retire_segment(-2), None);
        assert_eq!(s.retire_segment(-1), None);
        assert_eq!(s.retire_segment(42), None);
        assert_eq!(s.on_segment_contact(&lowest(), 1).retired, None);
        assert!(s.authority().destroyed.is_empty());
    }

    #[test]
    fn test_contact_on_retired_segment_still_retires() {
        let mut s = streamer(true);
        for _ in 0..5 {
            s.spawn_segment().unwrap();
        }
        s.retire_segment(4);

        let outcome = s.on_segment_contact(&lowest(), 4);
        assert_eq!(outcome.spawned, None);
        assert_eq!(outcome.retired, Some(2));
    }

    #[test]
    fn test_ids_never_reused() {
        let mut s = streamer(true);
        s.initialize();
        s.retire_segment(2);
        assert_eq!(s.spawn_segment(), Ok(Some(3)));
    }

    #[test]
    fn test_unknown_archetype_leaves_state_untouched() {
        let mut s = MapStreamer::new(
            config(&["A", "Missing"]),
            FakeAuthority::new(true),
            SequenceSelector::new(vec![0, 1, 0]),
        )
        .unwrap();

        assert_eq!(s.spawn_segment(), Ok(Some(0)));
        assert_eq!(
            s.spawn_segment(),
            Err(StreamError::UnknownArchetype("Missing".to_string()))
        );
        assert_eq!(s.segments_created(), 1);
        assert_approx_eq!(s.cumulative_height(), 10.0);
        assert_eq!(s.stats().failed_spawns, 1);
        assert_eq!(s.spawn_segment(), Ok(Some(1)));
    }

    #[test]
    fn test_failed_growth_keeps_flag_for_retry() {
        let mut s = MapStreamer::new(
            config(&["A", "Missing"]),
            FakeAuthority::new(true),
            SequenceSelector::new(vec![0, 1, 0]),
        )
        .unwrap();
        s.spawn_segment().unwrap();

        let outcome = s.on_segment_contact(&climber(), 0);
        assert!(outcome.is_noop());
        assert!(s.catalog().get(0).unwrap().growth_enabled);
        assert!(s.stats().frontier_can_grow);

        let retry = s.on_segment_contact(&climber(), 0);
        assert_eq!(retry.spawned, Some(1));
    }

    #[test]
    fn test_elimination_zone_once() {
        let mut s = streamer(true);
        let handle = s.create_elimination_zone().unwrap();
        assert!(handle.is_some());
        assert_eq!(s.elimination_zone(), handle);
        assert_eq!(s.create_elimination_zone(), Ok(None));
        assert_eq!(
            s.authority().created.last().cloned(),
            Some(("Zone".to_string(), Vec3::up(-5.0)))
        );
    }

    #[test]
    fn test_mirror_applies_replication() {
        let mut s = streamer(false);
        s.apply_replicated_segment(Segment::new(0, 10, "A", Vec3::up(0.0), 10.0));
        s.apply_replicated_segment(Segment::new(1, 11, "B", Vec3::up(10.0), 2.0));
        assert_eq!(s.catalog().ids(), vec![0, 1]);
        assert_approx_eq!(s.cumulative_height(), 12.0);

        assert_eq!(s.apply_replicated_destroy(10), Some(0));
        assert_eq!(s.apply_replicated_destroy(10), None);

        s.apply_snapshot(vec![Segment::new(5, 15, "A", Vec3::up(50.0), 10.0)]);
        assert_eq!(s.catalog().ids(), vec![5]);
        assert_eq!(s.segments_created(), 6);
    }

    #[test]
    fn test_authoritative_ignores_replication_input() {
        let mut s = streamer(true);
        s.apply_replicated_segment(Segment::new(9, 99, "A", Vec3::up(0.0), 10.0));
        s.apply_snapshot(vec![]);
        assert!(s.catalog().is_empty());
        assert_eq!(s.segments_created(), 0);
    }

    #[test]
    fn test_extreme_contact_ids_are_ignored() {
        let mut s = streamer(true);
        s.initialize();

        let outcome = s.on_segment_contact(&lowest(), SegmentId::MIN);
        assert!(outcome.is_noop());
        let outcome = s.on_segment_contact(&lowest(), SegmentId::MAX);
        assert!(outcome.is_noop());
        assert_eq!(s.catalog().ids(), vec![0, 1, 2]);
        assert!(s.authority().destroyed.is_empty());
    }

    #[test]
    fn test_mirror_tolerates_max_segment_id() {
        let mut s = streamer(false);
        s.apply_snapshot(vec![Segment::new(SegmentId::MAX, 5, "A", Vec3::up(0.0), 10.0)]);
        s.apply_replicated_segment(Segment::new(SegmentId::MAX, 5, "A", Vec3::up(0.0), 10.0));
        assert_eq!(s.segments_created(), SegmentId::MAX);
        assert_eq!(s.catalog().len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut s = streamer(true);
        let empty = s.stats();
        assert_eq!(empty.live_segments, 0);
        assert!(!empty.frontier_can_grow);

        s.initialize();
        s.on_segment_contact(&lowest(), 2);
        let stats = s.stats();
        assert_eq!(stats.segments_created, 4);
        assert_eq!(stats.live_segments, 3);
        assert!(stats.frontier_can_grow);
        assert_eq!(stats.failed_spawns, 0);
    }

    #[test]
    fn test_sequence_selector_cycles() {
        let mut selector = SequenceSelector::new(vec![2, 0, 5]);
        assert_eq!(selector.select(3), 2);
        assert_eq!(selector.select(3), 0);
        assert_eq!(selector.select(3), 2);
        assert_eq!(selector.select(3), 2);

        let mut empty = SequenceSelector::new(vec![]);
        assert_eq!(empty.select(4), 0);
    }

    #[test]
    fn test_random_selector_in_range_and_seeded() {
        let mut a = RandomSelector::from_seed(7);
        let mut b = RandomSelector::from_seed(7);
        for _ in 0..100 {
            let pick = a.select(3);
            assert!(pick < 3);
            assert_eq!(pick, b.select(3));
        }
    }
}
