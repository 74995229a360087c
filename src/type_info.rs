use std::any::{type_name, TypeId};
use std::cmp::Ordering;
use std::{mem, ptr};

/// Types eligible as components.
///
/// Every sized `Send + Sync + 'static` type qualifies: Rust moves are
/// non-throwing byte copies and every type is destructible, which is all the
/// storage core requires. Copy and default construction are optional
/// capabilities recorded on [`TypeInfo`].
pub trait Component: Send + Sync + 'static {}

impl<T> Component for T where T: Send + Sync + 'static {}

/// A process-stable identifier for a component type.
///
/// Derived from the compiler's type fingerprint, not from registration order
/// or addresses. Id equality is the sole criterion for "same component type".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ComponentTypeId(TypeId);

impl ComponentTypeId {
    pub fn of<T: Component>() -> ComponentTypeId {
        ComponentTypeId(TypeId::of::<T>())
    }
}

/// Lifecycle metadata for one component type: identity, layout and the
/// function table used by type-erased storage.
///
/// Carries no owned state beyond numbers and function pointers, so instances
/// may be freely recreated; two `TypeInfo`s describe the same component type
/// iff their [ids](TypeInfo::id) are equal.
#[derive(Debug, Copy, Clone)]
pub struct TypeInfo {
    id: ComponentTypeId,
    size: usize,
    align: usize,
    name: &'static str,
    needs_drop: bool,
    drop_fn: unsafe fn(*mut u8, usize),
    default_fn: Option<unsafe fn(*mut u8, usize)>,
    clone_fn: Option<unsafe fn(*mut u8, *const u8, usize)>,
    clone_assign_fn: Option<unsafe fn(*mut u8, *const u8, usize)>,
}

unsafe fn drop_impl<T>(ptr: *mut u8, count: usize) {
    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr as *mut T, count));
}

unsafe fn default_impl<T: Default>(dst: *mut u8, count: usize) {
    let dst = dst as *mut T;
    for i in 0..count {
        ptr::write(dst.add(i), T::default());
    }
}

unsafe fn clone_impl<T: Clone>(dst: *mut u8, src: *const u8, count: usize) {
    let dst = dst as *mut T;
    let src = src as *const T;
    for i in 0..count {
        ptr::write(dst.add(i), (*src.add(i)).clone());
    }
}

unsafe fn clone_assign_impl<T: Clone>(dst: *mut u8, src: *const u8, count: usize) {
    let dst = dst as *mut T;
    let src = src as *const T;
    for i in 0..count {
        (*dst.add(i)).clone_from(&*src.add(i));
    }
}

impl TypeInfo {
    /// Returns the descriptor for `T` with the mandatory operations only.
    pub fn of<T: Component>() -> TypeInfo {
        TypeInfo {
            id: ComponentTypeId::of::<T>(),
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            name: type_name::<T>(),
            needs_drop: mem::needs_drop::<T>(),
            drop_fn: drop_impl::<T>,
            default_fn: None,
            clone_fn: None,
            clone_assign_fn: None,
        }
    }

    /// Returns the descriptor for `T` with default construction recorded.
    pub fn of_defaultable<T: Component + Default>() -> TypeInfo {
        let mut info = Self::of::<T>();
        info.default_fn = Some(default_impl::<T>);
        info
    }

    /// Returns the descriptor for `T` with copy construction and copy
    /// assignment recorded.
    pub fn of_cloneable<T: Component + Clone>() -> TypeInfo {
        let mut info = Self::of::<T>();
        info.clone_fn = Some(clone_impl::<T>);
        info.clone_assign_fn = Some(clone_assign_impl::<T>);
        info
    }

    pub fn id(&self) -> ComponentTypeId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// The component's type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn needs_drop(&self) -> bool {
        self.needs_drop
    }

    /// Returns `true` if the type recorded a default constructor.
    pub fn has_default(&self) -> bool {
        self.default_fn.is_some()
    }

    /// Returns `true` if the type recorded copy operations; absence marks the
    /// type as move-only.
    pub fn has_clone(&self) -> bool {
        self.clone_fn.is_some()
    }

    /// Default-constructs `count` contiguous elements at `dst`.
    ///
    /// Panics if the type was not registered via [`TypeInfo::of_defaultable`].
    ///
    /// # Safety
    /// `dst` must be aligned and valid for `count` uninitialized elements.
    pub unsafe fn construct_default(&self, dst: *mut u8, count: usize) {
        let f = self
            .default_fn
            .unwrap_or_else(|| panic!("component {} records no default constructor", self.name));
        f(dst, count);
    }

    /// Drops `count` contiguous live elements at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be aligned and valid for `count` live elements; they must
    /// not be used afterwards.
    pub unsafe fn drop_in_place(&self, ptr: *mut u8, count: usize) {
        if self.needs_drop {
            (self.drop_fn)(ptr, count);
        }
    }

    /// Copy-constructs `count` elements from `src` into uninitialized `dst`.
    ///
    /// Panics if the type was not registered via [`TypeInfo::of_cloneable`].
    ///
    /// # Safety
    /// Both pointers must be aligned and valid for `count` elements; `src`
    /// elements must be live, `dst` uninitialized; the ranges must not
    /// overlap.
    pub unsafe fn copy_construct(&self, dst: *mut u8, src: *const u8, count: usize) {
        let f = self
            .clone_fn
            .unwrap_or_else(|| panic!("component {} records no copy operations", self.name));
        f(dst, src, count);
    }

    /// Copy-assigns `count` elements from `src` over live `dst` elements.
    ///
    /// Panics if the type was not registered via [`TypeInfo::of_cloneable`].
    ///
    /// # Safety
    /// Both pointers must be aligned and valid for `count` live elements; the
    /// ranges must not overlap.
    pub unsafe fn copy_assign(&self, dst: *mut u8, src: *const u8, count: usize) {
        let f = self
            .clone_assign_fn
            .unwrap_or_else(|| panic!("component {} records no copy operations", self.name));
        f(dst, src, count);
    }

    /// Move-constructs `count` elements from `src` into uninitialized `dst`.
    ///
    /// A Rust move is an untyped byte copy, so this does not run any user
    /// code. The source bytes are left in place; the caller must treat them
    /// as uninitialized from now on (in particular, never drop them).
    ///
    /// # Safety
    /// Both pointers must be aligned and valid for `count` elements; `src`
    /// elements must be live, `dst` uninitialized; the ranges must not
    /// overlap.
    pub unsafe fn move_construct(&self, dst: *mut u8, src: *const u8, count: usize) {
        ptr::copy_nonoverlapping(src, dst, count * self.size);
    }

    /// Move-assigns `count` elements from `src` over live `dst` elements,
    /// dropping the previous destination values.
    ///
    /// The caller must treat the source as uninitialized afterwards.
    ///
    /// # Safety
    /// Both pointers must be aligned and valid for `count` live elements; the
    /// ranges must not overlap.
    pub unsafe fn move_assign(&self, dst: *mut u8, src: *const u8, count: usize) {
        self.drop_in_place(dst, count);
        ptr::copy_nonoverlapping(src, dst, count * self.size);
    }

    /// Moves `count` elements from `src` into uninitialized `dst` and
    /// consumes the source: "pick up and move" as one step.
    ///
    /// Every Rust type is trivially relocatable, so this is a plain byte
    /// copy; it coincides with [`move_construct`](Self::move_construct) and
    /// exists as the operation storage code reaches for whenever a buffer
    /// grows or an entity migrates between archetypes.
    ///
    /// # Safety
    /// Same as [`move_construct`](Self::move_construct).
    pub unsafe fn relocate_construct(&self, dst: *mut u8, src: *const u8, count: usize) {
        ptr::copy_nonoverlapping(src, dst, count * self.size);
    }

    /// Moves `count` elements from `src` over live `dst` elements, dropping
    /// the previous destination values and consuming the source.
    ///
    /// This is the "move last into hole" step of a swap-remove.
    ///
    /// # Safety
    /// Same as [`move_assign`](Self::move_assign).
    pub unsafe fn relocate_assign(&self, dst: *mut u8, src: *const u8, count: usize) {
        self.drop_in_place(dst, count);
        ptr::copy_nonoverlapping(src, dst, count * self.size);
    }
}

/// The single fixed total order used to canonicalize signatures: alignment
/// descending, then id descending. Alignment first minimizes padding between
/// column layouts; id is a deterministic tie-break so equal type sets always
/// canonicalize identically regardless of argument order.
pub(crate) fn canonical_order(a: &TypeInfo, b: &TypeInfo) -> Ordering {
    b.align.cmp(&a.align).then_with(|| b.id.cmp(&a.id))
}

/// Sorts a type-info list into canonical order.
pub(crate) fn sort_type_infos(infos: &mut [TypeInfo]) {
    infos.sort_unstable_by(canonical_order);
}
