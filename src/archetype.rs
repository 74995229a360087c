use crate::component_set::{assert_distinct, ComponentSet};
use crate::type_info::{sort_type_infos, Component, ComponentTypeId, TypeInfo};
use crate::HashMap;
use smallvec::SmallVec;
use std::alloc::{self, Layout};
use std::hash::{Hash, Hasher};
use std::ptr::{self, NonNull};
use std::slice;

/// The canonical schema of one archetype: its component type descriptors
/// sorted by alignment descending, then id descending.
///
/// Two structurally identical type sets always produce an equal `Signature`
/// regardless of the order the types were supplied in, which makes it usable
/// as a structural map key. Equality compares the id sequence; the hash is
/// precomputed over it.
#[derive(Debug, Clone)]
pub struct Signature {
    types: Vec<TypeInfo>,
    hash_val: u64,
}

impl Signature {
    /// Canonicalizes `types` into a signature.
    ///
    /// Panics if the same component type appears twice.
    pub fn new(mut types: Vec<TypeInfo>) -> Signature {
        sort_type_infos(&mut types);
        assert_distinct(&types);

        let mut hasher = ahash::AHasher::default();
        for info in &types {
            info.id().hash(&mut hasher);
        }
        let hash_val = hasher.finish();

        Signature { types, hash_val }
    }

    /// The descriptors in canonical order.
    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.types.iter().any(|info| info.id() == id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.types.len() == other.types.len()
            && self
                .types
                .iter()
                .zip(&other.types)
                .all(|(a, b)| a.id() == b.id())
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_val.hash(state);
    }
}

/// One component type's contiguous buffer, allocated with that type's
/// required alignment. Capacity and liveness bookkeeping live on the owning
/// [`Archetype`]; the buffer itself is raw memory.
struct RowBuffer {
    ptr: NonNull<u8>,
    info: TypeInfo,
}

impl RowBuffer {
    fn new(info: TypeInfo, capacity: usize) -> RowBuffer {
        RowBuffer {
            ptr: Self::allocate(&info, capacity),
            info,
        }
    }

    fn array_layout(info: &TypeInfo, capacity: usize) -> Layout {
        let bytes = info
            .size()
            .checked_mul(capacity)
            .expect("row buffer size overflows usize");
        Layout::from_size_align(bytes, info.align()).expect("invalid row buffer layout")
    }

    fn allocate(info: &TypeInfo, capacity: usize) -> NonNull<u8> {
        let layout = Self::array_layout(info, capacity);
        if layout.size() == 0 {
            // Zero-sized rows never touch the allocator; an aligned dangling
            // pointer is a valid base for zero-size reads and writes.
            return unsafe { NonNull::new_unchecked(info.align() as *mut u8) };
        }
        // Safety: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout))
    }

    /// Pointer to the element slot at `col`.
    ///
    /// # Safety
    /// `col` must be within the capacity the buffer was allocated for.
    unsafe fn slot(&self, col: usize) -> *mut u8 {
        self.ptr.as_ptr().add(col * self.info.size())
    }

    /// Replaces the allocation with one of `new_capacity` slots, relocating
    /// `len` live elements into it.
    ///
    /// # Safety
    /// `len` elements starting at slot 0 must be live, `len <= old_capacity`
    /// and `len <= new_capacity`.
    unsafe fn grow_to(&mut self, len: usize, old_capacity: usize, new_capacity: usize) {
        let new_ptr = Self::allocate(&self.info, new_capacity);
        ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), len * self.info.size());
        self.release(old_capacity);
        self.ptr = new_ptr;
    }

    /// Frees the allocation without dropping elements.
    ///
    /// # Safety
    /// `capacity` must be the capacity the buffer was allocated for; the
    /// buffer must not be used afterwards.
    unsafe fn release(&mut self, capacity: usize) {
        let layout = Self::array_layout(&self.info, capacity);
        if layout.size() != 0 {
            alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

pub(crate) const START_CAPACITY: usize = 10;

/// A columnar, type-erased, growable table holding every entity that has
/// exactly this archetype's component set.
///
/// Each component type occupies one contiguous buffer (a *row* in storage
/// terms); an entity occupies one *column* slicing through all rows. All rows
/// share the same length and capacity. Elements `0..len` of every row are
/// live; the tail up to `capacity` is uninitialized raw memory and is never
/// exposed.
pub struct Archetype {
    signature: Signature,
    rows: Vec<RowBuffer>,
    row_index: HashMap<ComponentTypeId, usize>,
    capacity: usize,
    len: usize,
}

// Safety: components are Send + Sync by the `Component` bound, and the raw
// buffers are exclusively owned.
unsafe impl Send for Archetype {}
unsafe impl Sync for Archetype {}

impl Archetype {
    /// Creates an empty archetype for `signature`, allocating every row at
    /// the start capacity. The signature must already be canonical; the
    /// archetype never sorts.
    pub fn new(signature: Signature) -> Archetype {
        let rows: Vec<RowBuffer> = signature
            .types()
            .iter()
            .map(|info| RowBuffer::new(*info, START_CAPACITY))
            .collect();
        let row_index: HashMap<_, _> = signature
            .types()
            .iter()
            .enumerate()
            .map(|(row, info)| (info.id(), row))
            .collect();

        Archetype {
            signature,
            rows,
            row_index,
            capacity: START_CAPACITY,
            len: 0,
        }
    }

    /// The stored canonical signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The number of live columns (entities).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The allocated capacity in columns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Row index of the component type, if this archetype stores it.
    pub fn row_of(&self, id: ComponentTypeId) -> Option<usize> {
        self.row_index.get(&id).copied()
    }

    /// Grows every row buffer to `new_capacity`, relocating live elements.
    ///
    /// Panics unless `new_capacity > capacity`. The archetype is fully
    /// consistent before this returns; no partially relocated state is ever
    /// observable.
    pub fn reserve(&mut self, new_capacity: usize) {
        assert!(
            new_capacity > self.capacity,
            "reserve requires a capacity larger than the current {}",
            self.capacity
        );
        for row in &mut self.rows {
            // Safety: `len` elements are live in each row and fit both
            // capacities.
            unsafe { row.grow_to(self.len, self.capacity, new_capacity) };
        }
        self.capacity = new_capacity;
    }

    fn grow(&mut self) {
        self.reserve(self.capacity * 2);
    }

    /// Ensures headroom for `count` more columns: doubles the capacity, or
    /// jumps straight to `len + count` when even doubling would not fit, so
    /// a large bulk insert does not trigger repeated regrowth.
    pub(crate) fn prepare_insert(&mut self, count: usize) {
        if self.len + count > self.capacity {
            if self.len + count > 2 * self.capacity {
                self.reserve(self.len + count);
            } else {
                self.grow();
            }
        }
    }

    /// Pointer to the slot at (`row`, `col`).
    ///
    /// # Safety
    /// `row` must be a valid row index and `col < capacity`. The slot may be
    /// uninitialized; the caller tracks liveness.
    pub(crate) unsafe fn slot_ptr(&self, row: usize, col: usize) -> *mut u8 {
        debug_assert!(row < self.rows.len());
        debug_assert!(col < self.capacity || self.rows[row].info.size() == 0);
        self.rows[row].slot(col)
    }

    /// Marks one more column live and returns its index. The caller must
    /// have initialized every row's slot at that column first.
    pub(crate) fn bump_len(&mut self) -> usize {
        let col = self.len;
        self.len += 1;
        col
    }

    fn target_ptrs(&self, infos: &[TypeInfo], col: usize) -> SmallVec<[*mut u8; 16]> {
        infos
            .iter()
            .map(|info| {
                let row = self.row_of(info.id()).unwrap_or_else(|| {
                    panic!("component {} is not part of this archetype", info.name())
                });
                // Safety: row is valid and `col < capacity` is the caller's
                // precondition.
                unsafe { self.slot_ptr(row, col) }
            })
            .collect()
    }

    /// Inserts a new column holding the supplied components and returns its
    /// index, growing if needed.
    ///
    /// The pack must cover this archetype's signature exactly (asserted):
    /// counting a partially initialized column as live would hand
    /// uninitialized memory to safe readers. Partial initialization during
    /// cross-archetype migration goes through [`init_fields`](Self::init_fields)
    /// instead, before the column is marked live.
    pub fn insert_row<S: ComponentSet>(&mut self, set: S) -> usize {
        let infos = S::type_infos();
        assert_distinct(&infos);
        assert_eq!(
            infos.len(),
            self.rows.len(),
            "component pack must cover the archetype signature exactly"
        );

        self.prepare_insert(1);
        let col = self.len;
        let targets = self.target_ptrs(&infos, col);
        // Safety: one aligned, uninitialized slot per declared component.
        unsafe { set.write(&targets) };
        self.len += 1;
        col
    }

    /// Destroys the current values of the supplied components at `col` and
    /// writes the new ones in place. Panics if `col >= len` or the pack
    /// names a type this archetype lacks.
    pub fn update_row<S: ComponentSet>(&mut self, col: usize, set: S) {
        assert!(col < self.len, "column {col} is out of range");
        let infos = S::type_infos();
        assert_distinct(&infos);

        // Validate every row before dropping anything, so a bad pack cannot
        // leave a half-destroyed column behind.
        let targets = self.target_ptrs(&infos, col);
        for (info, &target) in infos.iter().zip(&targets) {
            // Safety: the slot holds a live element of `info`'s type.
            unsafe { info.drop_in_place(target, 1) };
        }
        // Safety: the slots were just vacated.
        unsafe { set.write(&targets) };
    }

    /// Placement-writes the supplied components at `col` without destroying
    /// anything first.
    ///
    /// # Safety
    /// `col < capacity`, each supplied component's slot at `col` must be
    /// uninitialized, and the caller must either mark the column live (after
    /// initializing every remaining row) or treat the slots as uninitialized
    /// again.
    pub(crate) unsafe fn init_fields<S: ComponentSet>(&mut self, col: usize, set: S) {
        let infos = S::type_infos();
        assert_distinct(&infos);
        let targets = self.target_ptrs(&infos, col);
        set.write(&targets);
    }

    /// Returns a reference to the component of type `T` at `col`.
    ///
    /// `None` if this archetype does not store `T`. Panics if `col >= len`.
    pub fn get<T: Component>(&self, col: usize) -> Option<&T> {
        assert!(col < self.len, "column {col} is out of range");
        let row = self.row_of(ComponentTypeId::of::<T>())?;
        // Safety: the slot at a live column holds an initialized T.
        unsafe { Some(&*(self.rows[row].slot(col) as *const T)) }
    }

    /// Returns a mutable reference to the component of type `T` at `col`.
    pub fn get_mut<T: Component>(&mut self, col: usize) -> Option<&mut T> {
        assert!(col < self.len, "column {col} is out of range");
        let row = self.row_of(ComponentTypeId::of::<T>())?;
        // Safety: the slot at a live column holds an initialized T, and
        // `&mut self` guarantees uniqueness.
        unsafe { Some(&mut *(self.rows[row].slot(col) as *mut T)) }
    }

    /// The contiguous column of every entity's `T`, in column order.
    ///
    /// `None` if this archetype does not store `T`. This is the bulk
    /// iteration surface: one cache-friendly slice per component type.
    pub fn column<T: Component>(&self) -> Option<&[T]> {
        let row = self.row_of(ComponentTypeId::of::<T>())?;
        // Safety: elements 0..len are live.
        unsafe {
            Some(slice::from_raw_parts(
                self.rows[row].slot(0) as *const T,
                self.len,
            ))
        }
    }

    /// Mutable variant of [`column`](Self::column).
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        let row = self.row_of(ComponentTypeId::of::<T>())?;
        // Safety: elements 0..len are live; `&mut self` guarantees
        // uniqueness.
        unsafe {
            Some(slice::from_raw_parts_mut(
                self.rows[row].slot(0) as *mut T,
                self.len,
            ))
        }
    }

    /// Exchanges the full columns at `a` and `b` across every row.
    ///
    /// Rust values relocate as raw bytes, so the exchange is a per-row byte
    /// swap; no scratch slot or extra capacity is needed. Panics if either
    /// column is out of range; no-op when equal.
    pub fn swap(&mut self, a: usize, b: usize) {
        assert!(a < self.len && b < self.len, "swap requires live columns");
        if a == b {
            return;
        }
        for row in &self.rows {
            // Safety: both columns are live and distinct, so the byte ranges
            // do not overlap.
            unsafe {
                ptr::swap_nonoverlapping(row.slot(a), row.slot(b), row.info.size());
            }
        }
    }

    /// Removes the column at `col` by swap-remove: the former last column's
    /// data is relocated into the vacated slot, keeping storage dense.
    ///
    /// Returns the index of the column that was last before removal. When
    /// that differs from `col`, the entity previously stored there now lives
    /// at `col` and any external index tracking it must be repaired by the
    /// caller. Panics if `col >= len`.
    pub fn remove(&mut self, col: usize) -> usize {
        assert!(col < self.len, "column {col} is out of range");
        self.len -= 1;
        let last = self.len;
        for row in &self.rows {
            unsafe {
                let dst = row.slot(col);
                if col == last {
                    row.info.drop_in_place(dst, 1);
                } else {
                    row.info.relocate_assign(dst, row.slot(last), 1);
                }
            }
        }
        last
    }

    /// Swap-remove for a column whose slots have already been consumed
    /// (relocated away or dropped during migration): the hole is filled by
    /// relocate-construct, with no destination drop.
    ///
    /// Returns the former last column, as [`remove`](Self::remove) does.
    ///
    /// # Safety
    /// `col < len` and every row's slot at `col` must be uninitialized.
    pub(crate) unsafe fn remove_vacated(&mut self, col: usize) -> usize {
        debug_assert!(col < self.len);
        self.len -= 1;
        let last = self.len;
        if col != last {
            for row in &self.rows {
                row.info
                    .relocate_construct(row.slot(col), row.slot(last), 1);
            }
        }
        last
    }
}

impl Drop for Archetype {
    fn drop(&mut self) {
        for row in &mut self.rows {
            unsafe {
                row.info.drop_in_place(row.ptr.as_ptr(), self.len);
                row.release(self.capacity);
            }
        }
    }
}
