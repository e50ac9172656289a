//! Arc-based storage management for zero-copy windows and copy-on-write sharing.
//!
//! This module provides the shared buffer backing every [`crate::Matrix`].
//! The buffer is wrapped in an `Arc`, so handle clones are cheap (a reference
//! count increment) and submatrix windows can alias a sub-range of a parent
//! buffer while keeping it alive.

use std::{alloc::Layout, ptr::NonNull, sync::Arc};

use thiserror::Error;

/// An error type for storage operations.
#[derive(Debug, Error, PartialEq)]
pub enum StorageError {
    /// A raw pointer handed to the storage was null.
    #[error("Null pointer")]
    NullPointer,

    /// A view range did not fit inside the underlying allocation.
    #[error("View range {end} out of bounds for storage of {len} elements")]
    ViewOutOfBounds {
        /// One past the last element the view would touch.
        end: usize,
        /// Number of elements in the underlying allocation.
        len: usize,
    },
}

/// How the underlying memory of a buffer is owned.
///
/// A buffer either allocated its own memory, borrowed caller memory it must
/// never free, or adopted caller memory it has to free on final drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOwnership {
    /// The buffer allocated its memory and frees it on final drop.
    Owned,
    /// The buffer wraps caller memory and never frees it.
    ExternalBorrowed,
    /// The buffer adopted caller memory allocated with the global allocator
    /// and frees it on final drop.
    ExternalOwned,
}

/// Inner storage that holds the actual memory.
///
/// Wrapped in an `Arc` to enable reference counting and zero-copy windows
/// with different offsets.
enum StorageImpl<T> {
    /// Internally allocated storage. Growth in place goes through this
    /// variant when the handle is the sole owner.
    Owned(Vec<T>),
    /// Caller-provided memory wrapped via [`MatStorage::from_raw_parts`].
    External {
        ptr: NonNull<T>,
        len: usize,
        owned: bool,
    },
}

impl<T> StorageImpl<T> {
    #[inline]
    fn as_base_slice(&self) -> &[T] {
        match self {
            StorageImpl::Owned(v) => v.as_slice(),
            // SAFETY: ptr is valid for len initialized elements for the
            // lifetime of the storage (contract of from_raw_parts).
            StorageImpl::External { ptr, len, .. } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    #[inline]
    fn len(&self) -> usize {
        match self {
            StorageImpl::Owned(v) => v.len(),
            StorageImpl::External { len, .. } => *len,
        }
    }
}

impl<T> Drop for StorageImpl<T> {
    fn drop(&mut self) {
        if let StorageImpl::External { ptr, len, owned } = self {
            if *owned && *len > 0 {
                // SAFETY: ownership was transferred in from_raw_parts with the
                // contract that the memory holds `len` initialized elements
                // allocated with the global allocator.
                unsafe {
                    std::ptr::drop_in_place(std::slice::from_raw_parts_mut(ptr.as_ptr(), *len));
                    if let Ok(layout) = Layout::array::<T>(*len) {
                        std::alloc::dealloc(ptr.as_ptr() as *mut u8, layout);
                    }
                }
            }
        }
    }
}

// SAFETY: the External variant is a plain owned region of initialized T.
unsafe impl<T: Send> Send for StorageImpl<T> {}
// SAFETY: shared access only hands out &T; mutation requires a unique Arc.
unsafe impl<T: Sync> Sync for StorageImpl<T> {}

/// Reference-counted matrix storage enabling zero-copy windows and
/// copy-on-write sharing.
///
/// Clones are O(1) (an `Arc` increment). A handle may address a sub-range of
/// the allocation through `offset`/`view_len`, which is how submatrix windows
/// alias their parent buffer: the window keeps the parent allocation alive via
/// its reference count and never frees memory it does not own.
///
/// # Thread safety
///
/// Reference count increments and decrements are atomic, so two handles over
/// the same buffer may be dropped concurrently from different threads.
/// Mutable access requires a unique handle and is checked.
pub struct MatStorage<T> {
    /// Reference-counted inner storage.
    inner: Arc<StorageImpl<T>>,
    /// Offset of this view into the allocation, in elements.
    offset: usize,
    /// Number of elements addressable through this view.
    view_len: usize,
}

impl<T> MatStorage<T> {
    /// Creates owned storage from a vector, taking ownership of its elements.
    pub fn from_vec(value: Vec<T>) -> Self {
        let view_len = value.len();
        Self {
            inner: Arc::new(StorageImpl::Owned(value)),
            offset: 0,
            view_len,
        }
    }

    /// Creates owned storage of `len` elements, every element initialized
    /// with a clone of `fill` (padding included).
    pub fn alloc_filled(len: usize, fill: T) -> Self
    where
        T: Clone,
    {
        Self::from_vec(vec![fill; len])
    }

    /// Wraps caller memory without copying it.
    ///
    /// With [`StorageOwnership::ExternalBorrowed`] the storage never frees
    /// `ptr`; with [`StorageOwnership::ExternalOwned`] it drops the elements
    /// and frees the allocation on final drop. [`StorageOwnership::Owned`] is
    /// rejected here; owned storage is created through [`Self::from_vec`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` is valid for reads of `len` initialized elements of `T`
    /// - `ptr` is properly aligned for `T`
    /// - for `ExternalBorrowed`, the memory outlives every handle and is not
    ///   mutated from outside while handles exist. The storage never writes
    ///   through the pointer ([`Self::as_mut_slice`] rejects borrowed memory
    ///   and the matrix layer detaches into owned storage before any write),
    ///   so read-only memory such as a pointer derived from a `&[T]` or a
    ///   `static` is acceptable
    /// - for `ExternalOwned`, the memory was allocated with the global
    ///   allocator using `Layout::array::<T>(len)`, is valid for writes, and
    ///   is not used afterwards
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        len: usize,
        ownership: StorageOwnership,
    ) -> Result<Self, StorageError> {
        if len == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        let ptr = NonNull::new(ptr as *mut T).ok_or(StorageError::NullPointer)?;
        let owned = match ownership {
            StorageOwnership::Owned => {
                // Adopting raw memory as internally owned is equivalent to
                // ExternalOwned; normalize to keep the invariants in one place.
                true
            }
            StorageOwnership::ExternalOwned => true,
            StorageOwnership::ExternalBorrowed => false,
        };
        Ok(Self {
            inner: Arc::new(StorageImpl::External { ptr, len, owned }),
            offset: 0,
            view_len: len,
        })
    }

    /// Creates a new view into this storage with the given offset and length,
    /// both in elements and relative to this view.
    ///
    /// This is a zero-copy operation: the new handle shares the allocation
    /// and pins it through the reference count.
    pub fn view(&self, offset: usize, len: usize) -> Result<Self, StorageError> {
        let end = self.offset + offset + len;
        if end > self.inner.len() {
            return Err(StorageError::ViewOutOfBounds {
                end,
                len: self.inner.len(),
            });
        }
        Ok(Self {
            inner: Arc::clone(&self.inner),
            offset: self.offset + offset,
            view_len: len,
        })
    }

    /// Returns the addressable elements of this view as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.inner.as_base_slice()[self.offset..self.offset + self.view_len]
    }

    /// Returns the addressable elements as a mutable slice.
    ///
    /// # Panics
    ///
    /// Panics if the storage is shared or wraps borrowed external memory,
    /// which may be read-only. Callers detach (clone) first; the
    /// copy-on-write layer in [`crate::Matrix`] guarantees an owned unique
    /// buffer before any write.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        assert!(
            self.is_unique(),
            "cannot mutate shared storage; detach first"
        );
        assert!(
            self.ownership() != StorageOwnership::ExternalBorrowed,
            "cannot mutate borrowed external storage; detach first"
        );
        let offset = self.offset;
        let view_len = self.view_len;
        match Arc::get_mut(&mut self.inner).expect("unique storage") {
            StorageImpl::Owned(v) => &mut v[offset..offset + view_len],
            // SAFETY: the storage is unique and adopted, so the memory is
            // valid for writes per the from_raw_parts contract; the range is
            // within the allocation by construction.
            StorageImpl::External { ptr, .. } => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr().add(offset), view_len)
            },
        }
    }

    /// Returns the pointer to the first addressable element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.as_slice().as_ptr()
    }

    /// Number of elements addressable through this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.view_len
    }

    /// Returns true if this view addresses no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.view_len == 0
    }

    /// Returns the offset of this view into the allocation, in elements.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if no other handle references this allocation.
    ///
    /// This is the copy-on-write test: mutation is safe without cloning
    /// exactly when the handle is unique.
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Current number of handles over the allocation.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// How the underlying memory is owned.
    pub fn ownership(&self) -> StorageOwnership {
        match &*self.inner {
            StorageImpl::Owned(_) => StorageOwnership::Owned,
            StorageImpl::External { owned: true, .. } => StorageOwnership::ExternalOwned,
            StorageImpl::External { owned: false, .. } => StorageOwnership::ExternalBorrowed,
        }
    }

    /// Grows the allocation in place to `new_len` elements, filling new
    /// slots with clones of `fill`.
    ///
    /// Succeeds only when the handle is the sole owner of an internally
    /// allocated buffer covering the whole allocation; otherwise returns
    /// `false` and the caller falls back to a detach-clone.
    pub fn grow(&mut self, new_len: usize, fill: T) -> bool
    where
        T: Clone,
    {
        if !self.is_unique() || self.offset != 0 || self.view_len != self.inner.len() {
            return false;
        }
        match Arc::get_mut(&mut self.inner).expect("unique storage") {
            StorageImpl::Owned(v) => {
                if new_len > v.len() {
                    v.resize(new_len, fill);
                }
                self.view_len = v.len();
                true
            }
            StorageImpl::External { .. } => false,
        }
    }
}

impl<T: Clone> MatStorage<T> {
    /// Deep-copies the addressable region into fresh owned storage.
    ///
    /// Existing contents are preserved verbatim; this is the detach step of
    /// the copy-on-write protocol.
    pub fn detach_clone(&self) -> Self {
        Self::from_vec(self.as_slice().to_vec())
    }
}

impl<T> Clone for MatStorage<T> {
    /// Creates a cheap clone by incrementing the reference count.
    ///
    /// This is an O(1) operation that does not copy the underlying data.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            offset: self.offset,
            view_len: self.view_len,
        }
    }
}

impl<T> std::fmt::Debug for MatStorage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatStorage")
            .field("len", &self.inner.len())
            .field("offset", &self.offset)
            .field("view_len", &self.view_len)
            .field("ownership", &self.ownership())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_roundtrip() {
        let storage = MatStorage::from_vec(vec![1, 2, 3, 4, 5]);
        assert_eq!(storage.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(storage.len(), 5);
        assert!(storage.is_unique());
        assert_eq!(storage.ownership(), StorageOwnership::Owned);
    }

    #[test]
    fn cheap_clone_shares() {
        let a = MatStorage::from_vec(vec![1, 2, 3]);
        let b = a.clone();
        assert!(!a.is_unique());
        assert_eq!(a.ref_count(), 2);
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert_eq!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn view_aliases_parent() {
        let a = MatStorage::from_vec(vec![1, 2, 3, 4, 5]);
        let v = a.view(1, 3).unwrap();
        assert_eq!(v.as_slice(), &[2, 3, 4]);
        assert_eq!(v.offset(), 1);
        assert_eq!(a.ref_count(), 2);
    }

    #[test]
    fn view_out_of_bounds() {
        let a = MatStorage::from_vec(vec![1, 2, 3]);
        assert_eq!(
            a.view(2, 2).unwrap_err(),
            StorageError::ViewOutOfBounds { end: 4, len: 3 }
        );
    }

    #[test]
    fn mutation_requires_unique() {
        let mut a = MatStorage::from_vec(vec![1, 2, 3]);
        {
            let s = a.as_mut_slice();
            s[0] = 10;
        }
        assert_eq!(a.as_slice()[0], 10);

        let _b = a.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = a.as_mut_slice();
        }));
        assert!(result.is_err());
    }

    #[test]
    fn detach_clone_is_independent() {
        let mut a = MatStorage::from_vec(vec![1, 2, 3]);
        let b = a.clone();
        a = a.detach_clone();
        a.as_mut_slice()[0] = 99;
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert_eq!(a.as_slice(), &[99, 2, 3]);
    }

    #[test]
    fn grow_in_place_when_unique() {
        let mut a = MatStorage::from_vec(vec![1, 2]);
        assert!(a.grow(4, 0));
        assert_eq!(a.as_slice(), &[1, 2, 0, 0]);

        let _b = a.clone();
        assert!(!a.grow(8, 0));
    }

    #[test]
    fn borrowed_storage_refuses_mutation() {
        let data = vec![1i32, 2, 3];
        let mut storage = unsafe {
            MatStorage::from_raw_parts(data.as_ptr(), 3, StorageOwnership::ExternalBorrowed)
        }
        .unwrap();
        assert!(storage.is_unique());
        // unique is not enough: borrowed memory may be read-only
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = storage.as_mut_slice();
        }));
        assert!(result.is_err());
        assert_eq!(data, vec![1, 2, 3]);

        let mut detached = storage.detach_clone();
        detached.as_mut_slice()[0] = 9;
        assert_eq!(data, vec![1, 2, 3]);
        assert_eq!(detached.as_slice(), &[9, 2, 3]);
    }

    #[test]
    fn external_borrowed_never_freed() {
        let data = vec![7i32, 8, 9];
        {
            let storage = unsafe {
                MatStorage::from_raw_parts(data.as_ptr(), 3, StorageOwnership::ExternalBorrowed)
            }
            .unwrap();
            assert_eq!(storage.as_slice(), &[7, 8, 9]);
            assert_eq!(storage.ownership(), StorageOwnership::ExternalBorrowed);
        }
        // still valid after the storage dropped
        assert_eq!(data, vec![7, 8, 9]);
    }

    #[test]
    fn external_owned_freed_on_drop() {
        let mut data = vec![1i64, 2, 3, 4];
        data.shrink_to_fit();
        assert_eq!(data.len(), data.capacity());
        let ptr = data.as_ptr();
        let len = data.len();
        std::mem::forget(data);
        let storage =
            unsafe { MatStorage::from_raw_parts(ptr, len, StorageOwnership::ExternalOwned) }
                .unwrap();
        assert_eq!(storage.as_slice(), &[1, 2, 3, 4]);
        drop(storage); // frees the adopted allocation
    }

    #[test]
    fn null_pointer_rejected() {
        let res = unsafe {
            MatStorage::<i32>::from_raw_parts(std::ptr::null(), 3, StorageOwnership::ExternalBorrowed)
        };
        assert_eq!(res.unwrap_err(), StorageError::NullPointer);
    }

    #[test]
    fn concurrent_drop_is_safe() {
        let a = MatStorage::from_vec((0..1024).collect::<Vec<i32>>());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let h = a.clone();
                std::thread::spawn(move || drop(h))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(a.is_unique());
    }
}
