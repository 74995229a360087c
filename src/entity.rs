/// An archetype identifier: the archetype's index within its [`World`](crate::World).
pub type ArchetypeId = usize;

/// An entity identifier.
///
/// Ids are minted from a per-world monotonic counter and never reused within
/// that world's lifetime, so a stale id reliably fails with
/// [`NotFound`](crate::WorldError::NotFound) instead of aliasing a newer
/// entity. There is no recycling or generation scheme; unbounded id growth is
/// a deliberate scope boundary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EntityId(pub(crate) u64);

impl EntityId {
    /// Returns the raw id value.
    pub fn to_bits(self) -> u64 {
        self.0
    }
}
