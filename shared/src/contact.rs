use crate::{Segment, SegmentId};
use std::collections::BTreeSet;

/// Detects contact onsets between one player and the live segments.
///
/// A segment is reported once when the player enters its vertical span and not
/// again until the player has fully left it. Segments that disappear from the
/// world are forgotten, so a segment with a reused id would be reported anew.
#[derive(Debug, Clone, Default)]
pub struct ContactTracker {
    touching: BTreeSet<SegmentId>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids entered since the previous update, in ascending order
    pub fn update<'a>(
        &mut self,
        y: f32,
        segments: impl IntoIterator<Item = &'a Segment>,
    ) -> Vec<SegmentId> {
        let now: BTreeSet<SegmentId> = segments
            .into_iter()
            .filter(|s| s.spans(y))
            .map(|s| s.id)
            .collect();

        let entered = now.difference(&self.touching).copied().collect();
        self.touching = now;
        entered
    }
}
