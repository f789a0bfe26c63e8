//! Buffer: reference-counted element storage with copy-on-write.
//!
//! A buffer is either shared heap storage (`Arc<Vec<T>>`, the reference
//! count being the `Arc` strong count) or a `'static` slice. Static
//! buffers report a negative reference count and are never freed nor
//! written to; the first mutation copies them like any shared buffer.
//!
//! Invariant: a buffer is written in place only while its reference
//! count is exactly one. Every mutating path goes through
//! [`Buffer::make_unique`], which copies the live prefix into a fresh
//! allocation otherwise. Dropping the last reference drops (finalizes)
//! the elements.

use crate::error::{Error, Result};
use core::fmt;
use std::sync::Arc;

enum Repr<T: 'static> {
    Shared(Arc<Vec<T>>),
    Static(&'static [T]),
}

pub struct Buffer<T: 'static> {
    repr: Repr<T>,
}

impl<T: 'static> Buffer<T> {
    pub fn from_vec(v: Vec<T>) -> Self {
        Self {
            repr: Repr::Shared(Arc::new(v)),
        }
    }

    /// Immutable buffer over static data (reference count -1).
    pub fn from_static(data: &'static [T]) -> Self {
        Self {
            repr: Repr::Static(data),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current reference count; negative for static buffers.
    pub fn ref_count(&self) -> isize {
        match &self.repr {
            Repr::Shared(a) => Arc::strong_count(a) as isize,
            Repr::Static(_) => -1,
        }
    }

    /// True when an in-place write would be visible through another holder.
    #[inline]
    pub fn is_shared(&self) -> bool {
        match &self.repr {
            Repr::Shared(a) => Arc::strong_count(a) != 1 || Arc::weak_count(a) != 0,
            Repr::Static(_) => true,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match &self.repr {
            Repr::Shared(a) => a.as_slice(),
            Repr::Static(s) => s,
        }
    }

    /// Same underlying storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Shared(a), Repr::Shared(b)) => Arc::ptr_eq(a, b),
            (Repr::Static(a), Repr::Static(b)) => core::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl<T: Clone + 'static> Buffer<T> {
    /// Guarantees exclusive ownership before a write.
    ///
    /// When shared, allocates a fresh buffer holding copies of the first
    /// `min(len, needed)` elements and releases this reference to the old
    /// one. Returns the now-exclusive storage.
    pub fn make_unique(&mut self, needed: usize) -> Result<&mut Vec<T>> {
        if self.is_shared() {
            let old = self.as_slice();
            let keep = old.len().min(needed);
            let mut fresh = Vec::new();
            reserve(&mut fresh, needed.max(keep))?;
            fresh.extend_from_slice(&old[..keep]);
            tracing::trace!(keep, needed, "copy-on-write of shared buffer");
            self.repr = Repr::Shared(Arc::new(fresh));
        }
        match &mut self.repr {
            Repr::Shared(a) => Ok(Arc::make_mut(a)),
            Repr::Static(_) => Err(Error::Corrupt("static buffer survived make_unique".into())),
        }
    }

    /// Exclusive mutable view over all elements.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        let len = self.len();
        Ok(self.make_unique(len)?.as_mut_slice())
    }
}

impl<T: 'static> Clone for Buffer<T> {
    /// Shares the storage (reference count + 1).
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Shared(a) => Repr::Shared(Arc::clone(a)),
            Repr::Static(s) => Repr::Static(*s),
        };
        Self { repr }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("ref_count", &self.ref_count())
            .field("items", &self.as_slice())
            .finish()
    }
}

impl<T: PartialEq + 'static> PartialEq for Buffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.as_slice() == other.as_slice()
    }
}

/// Rejects element counts whose byte size does not fit the address space.
pub(crate) fn check_size<T>(count: usize) -> Result<usize> {
    count
        .checked_mul(core::mem::size_of::<T>().max(1))
        .filter(|bytes| *bytes <= isize::MAX as usize)
        .ok_or(Error::CapacityOverflow { requested: count })
}

/// Reserves room for `total` elements, surfacing allocator failure.
pub(crate) fn reserve<T>(v: &mut Vec<T>, total: usize) -> Result<()> {
    let bytes = check_size::<T>(total)?;
    if total > v.len() {
        v.try_reserve(total - v.len())
            .map_err(|_| Error::OutOfMemory { bytes })?;
    }
    Ok(())
}

/// Resizes the buffer held in `slot` to `new_len` elements.
///
/// - `0` releases the buffer and empties the slot.
/// - Growing appends elements produced by `fill`.
/// - Shrinking drops the tail elements.
///
/// A shared buffer is first made unique, copying at most `new_len`
/// elements.
pub fn resize_slot<T: Clone + 'static>(
    slot: &mut Option<Buffer<T>>,
    new_len: usize,
    fill: impl FnMut() -> T,
) -> Result<()> {
    if new_len == 0 {
        *slot = None;
        return Ok(());
    }
    check_size::<T>(new_len)?;
    match slot {
        None => {
            let mut v = Vec::new();
            reserve(&mut v, new_len)?;
            v.resize_with(new_len, fill);
            *slot = Some(Buffer::from_vec(v));
        }
        Some(buf) => {
            let v = buf.make_unique(new_len)?;
            if new_len > v.len() {
                reserve(v, new_len)?;
                v.resize_with(new_len, fill);
            } else {
                v.truncate(new_len);
            }
        }
    }
    Ok(())
}
