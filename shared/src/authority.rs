//! Seam between the streaming core and the replication layer
//!
//! Every node runs the same streaming code. Whether a call mutates the shared
//! world depends only on `is_authoritative`, which the core checks before any
//! mutation. The server implements this trait on top of its object table and
//! outgoing packet queue; peers implement it as a permanently
//! non-authoritative mirror; tests implement it with in-memory fakes.

use crate::{ObjectHandle, Segment, StreamError, TileLayer, Vec3};

/// Result of a successful replicated creation
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedObject {
    pub handle: ObjectHandle,
    /// Tile layers of the instantiated template, used to measure its extent
    pub layers: Vec<TileLayer>,
}

pub trait NetworkAuthority {
    /// Whether this process is the elected node for world mutations
    fn is_authoritative(&self) -> bool;

    /// Instantiates `archetype` at `position` and replicates it to every peer.
    ///
    /// Fails with [`StreamError::UnknownArchetype`] when the template is not
    /// registered.
    fn create_replicated(
        &mut self,
        archetype: &str,
        position: Vec3,
    ) -> Result<SpawnedObject, StreamError>;

    /// Replicates the id and measured extent assigned to a freshly created segment
    fn synchronize_segment(&mut self, segment: &Segment);

    /// Destroys a replicated object on every peer. Destroying twice is a no-op.
    fn destroy_replicated(&mut self, handle: ObjectHandle);
}
