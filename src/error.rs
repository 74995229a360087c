use crate::entity::EntityId;
use thiserror::Error;

/// Failures signaled by [`World`](crate::World) entry points.
///
/// Both variants are raised before any mutation begins; a failed call leaves
/// the world completely unchanged. Out-of-range columns, non-increasing
/// capacities and duplicate types within one pack are programmer errors and
/// panic instead.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum WorldError {
    /// The entity id is not present in the world.
    #[error("entity {} was not found", .0.to_bits())]
    NotFound(EntityId),
    /// The entity's archetype lacks a requested component type.
    #[error("entity {} has no {component} component", entity.to_bits())]
    MissingComponent {
        entity: EntityId,
        /// Type name of the missing component, for diagnostics.
        component: &'static str,
    },
}
