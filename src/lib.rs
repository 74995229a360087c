//! Archetype-based columnar storage for entity component data.
//!
//! An entity is an opaque identifier for an object; each entity can have
//! multiple components associated with it. Entities sharing the exact same
//! set of component types are grouped into an *archetype*, which stores each
//! component type in its own contiguous buffer. Bulk processing walks those
//! buffers linearly, and changing an entity's component set moves its data
//! between archetypes without `Box`ing anything.
//!
//! # Examples
//!
//! ```
//! use entity_world::World;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity {
//!     x: f32,
//!     y: f32,
//! }
//!
//! struct Frozen;
//!
//! let mut world = World::new();
//!
//! let player = world.spawn((Position { x: 1.0, y: 1.0 }, Velocity { x: 2.0, y: 2.0 }));
//!
//! let (pos, vel) = world.get::<(&Position, &Velocity)>(player).unwrap();
//! assert_eq!(pos, &Position { x: 1.0, y: 1.0 });
//! assert_eq!(vel, &Velocity { x: 2.0, y: 2.0 });
//!
//! // Adding a component the entity lacks migrates it to another archetype.
//! world.add(player, (Frozen,)).unwrap();
//! assert!(world.get::<&Frozen>(player).is_ok());
//!
//! // Removing it migrates back.
//! world.remove::<(Frozen,)>(player).unwrap();
//! assert!(world.get::<&Frozen>(player).is_err());
//!
//! world.despawn(player).unwrap();
//! assert!(!world.contains(player));
//! ```

#[cfg(test)]
mod tests;

mod archetype;
mod component_set;
mod entity;
mod error;
mod type_info;
mod world;

pub use archetype::{Archetype, Signature};
pub use component_set::{ComponentSet, ComponentTypes, Fetch, InfoVec, MAX_INFOS_ON_STACK};
pub use entity::{ArchetypeId, EntityId};
pub use error::WorldError;
pub use type_info::{Component, ComponentTypeId, TypeInfo};
pub use world::{ArchetypeRecord, World};

pub(crate) type HashMap<K, V> = ahash::AHashMap<K, V>;
