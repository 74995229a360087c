use crate::archetype::Archetype;
use crate::type_info::{Component, TypeInfo};
use smallvec::SmallVec;
use std::any::type_name;
use std::ptr;

/// Type-info lists short enough for this bound live on the stack.
pub const MAX_INFOS_ON_STACK: usize = 16;

/// A stack-friendly list of [`TypeInfo`]s, as produced by component packs.
pub type InfoVec = SmallVec<[TypeInfo; MAX_INFOS_ON_STACK]>;

/// A statically known set of component types, in declared order.
///
/// Implemented for tuples of components up to arity 8, including the empty
/// tuple. Used wherever an operation names types without carrying values,
/// e.g. [`World::remove`](crate::World::remove).
pub trait ComponentTypes {
    /// Descriptors for each type, in declared order. May contain duplicates
    /// if the tuple does; consumers that require distinct types assert it.
    fn type_infos() -> InfoVec;
}

/// A set of component values that can be written into columnar storage.
///
/// `(Position { .. }, Velocity { .. })` is a `ComponentSet`; so is a
/// 1-tuple. The set is consumed on write, transferring ownership of each
/// value into the archetype.
pub trait ComponentSet: ComponentTypes {
    /// Writes each component through the matching target pointer, in
    /// declared order, without reading or dropping the destination.
    ///
    /// # Safety
    /// `targets` must hold exactly one pointer per declared component, each
    /// aligned, writable and pointing at an uninitialized (or already
    /// dropped) slot of that component's type.
    unsafe fn write(self, targets: &[*mut u8]);
}

/// Shared-reference access for [`World::get`](crate::World::get).
///
/// Implemented for `&T` (yielding `&T`) and for tuples of fetches (yielding
/// a tuple), so both `world.get::<&Position>(e)` and
/// `world.get::<(&Position, &Velocity)>(e)` work. On failure the type name
/// of the first missing component is returned.
pub trait Fetch {
    type Output<'w>;

    fn fetch(archetype: &Archetype, col: usize) -> Result<Self::Output<'_>, &'static str>;
}

impl<'q, T: Component> Fetch for &'q T {
    type Output<'w> = &'w T;

    fn fetch(archetype: &Archetype, col: usize) -> Result<Self::Output<'_>, &'static str> {
        archetype.get::<T>(col).ok_or_else(type_name::<T>)
    }
}

macro_rules! impl_component_tuples {
    ($(($ty:ident, $idx:tt)),*) => {
        impl<$($ty: Component),*> ComponentTypes for ($($ty,)*) {
            fn type_infos() -> InfoVec {
                let mut infos = InfoVec::new();
                $(infos.push(TypeInfo::of::<$ty>());)*
                infos
            }
        }

        impl<$($ty: Component),*> ComponentSet for ($($ty,)*) {
            #[allow(unused_variables)]
            unsafe fn write(self, targets: &[*mut u8]) {
                debug_assert_eq!(targets.len(), count!($($ty)*));
                $(ptr::write(targets[$idx] as *mut $ty, self.$idx);)*
            }
        }

        impl<$($ty: Fetch),*> Fetch for ($($ty,)*) {
            type Output<'w> = ($($ty::Output<'w>,)*);

            #[allow(unused_variables)]
            fn fetch(archetype: &Archetype, col: usize) -> Result<Self::Output<'_>, &'static str> {
                Ok(($($ty::fetch(archetype, col)?,)*))
            }
        }
    };
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

impl_component_tuples!();
impl_component_tuples!((A, 0));
impl_component_tuples!((A, 0), (B, 1));
impl_component_tuples!((A, 0), (B, 1), (C, 2));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

/// Panics if the list names the same component type twice. Packs feed
/// signatures and per-row writes, both of which require distinct types.
pub(crate) fn assert_distinct(infos: &[TypeInfo]) {
    for (i, a) in infos.iter().enumerate() {
        for b in &infos[i + 1..] {
            assert!(
                a.id() != b.id(),
                "component pack names {} more than once",
                a.name()
            );
        }
    }
}
