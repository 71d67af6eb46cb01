//! Registry of live map segments
//!
//! Segments are kept ordered by id. The lowest live id is the oldest piece of
//! the window and the highest is the frontier.

use crate::{ObjectHandle, SegmentId, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One streamed map piece
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Segment {
    /// Creation order, starting at 0 and never reused
    pub id: SegmentId,
    /// Replicated object backing this segment
    pub handle: ObjectHandle,
    pub archetype: String,
    /// Base of the segment in world space
    pub position: Vec3,
    /// Height of the tallest tile layer, measured once at creation
    pub vertical_extent: f32,
    /// Cleared the first time a contact spawns a successor from this segment
    pub growth_enabled: bool,
}

impl Segment {
    pub fn new(
        id: SegmentId,
        handle: ObjectHandle,
        archetype: &str,
        position: Vec3,
        vertical_extent: f32,
    ) -> Self {
        Self {
            id,
            handle,
            archetype: archetype.to_string(),
            position,
            vertical_extent,
            growth_enabled: true,
        }
    }

    pub fn top(&self) -> f32 {
        self.position.y + self.vertical_extent
    }

    /// True when a point at height `y` lies within this segment's vertical span
    pub fn spans(&self, y: f32) -> bool {
        y >= self.position.y && y < self.top()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentCatalog {
    segments: BTreeMap<SegmentId, Segment>,
}

impl SegmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a segment, replacing and returning any live segment with the same id
    pub fn insert(&mut self, segment: Segment) -> Option<Segment> {
        self.segments.insert(segment.id, segment)
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn get_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(&id)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.segments.contains_key(&id)
    }

    pub fn remove(&mut self, id: SegmentId) -> Option<Segment> {
        self.segments.remove(&id)
    }

    pub fn find_by_handle(&self, handle: ObjectHandle) -> Option<&Segment> {
        self.segments.values().find(|s| s.handle == handle)
    }

    pub fn remove_by_handle(&mut self, handle: ObjectHandle) -> Option<Segment> {
        let id = self.find_by_handle(handle)?.id;
        self.segments.remove(&id)
    }

    /// Most recently created live segment
    pub fn frontier(&self) -> Option<&Segment> {
        self.segments.values().next_back()
    }

    pub fn oldest(&self) -> Option<&Segment> {
        self.segments.values().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments.keys().copied().collect()
    }

    /// Replaces the whole catalog with an authoritative snapshot
    pub fn replace_all(&mut self, segments: impl IntoIterator<Item = Segment>) {
        self.segments = segments.into_iter().map(|s| (s.id, s)).collect();
    }

    pub fn to_vec(&self) -> Vec<Segment> {
        self.segments.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
