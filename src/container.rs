//! Container: a non-owning dynamic array handle.
//!
//! A container borrows a caller-owned buffer slot (`Option<Buffer<T>>`,
//! `None` being the empty array) and optionally a caller-owned count.
//! Without an external count the buffer holds exactly the live items.
//! With one, the buffer may be longer than the count; the spare tail holds
//! zeroed placeholders and grows by `cap + cap/8 + 64`, so repeated
//! appends do not reallocate every time.
//!
//! Every write goes through [`Buffer::make_unique`], so other holders of
//! a shared buffer never observe the mutation.
//!
//! Ordering: items compare through the container's comparator when one
//! is set, otherwise through [`Element::compare`] with the container's
//! case sensitivity. The `sorted` flag is only set by sorting with that
//! order, and any other mutation clears it.

use crate::buffer::{check_size, reserve, resize_slot, Buffer};
use crate::codec::{Reader, Writer};
use crate::dispatch::{read_array_frame, write_array_frame};
use crate::element::{Element, Typed};
use crate::error::{Error, Result};
use crate::hashing::combine;
use crate::rtti::Descriptor;
use crate::sort::quicksort;
use core::cmp::Ordering;

/// Item ordering supplied by the caller.
pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// Next capacity when an external count is tracked.
#[inline]
pub fn grow_capacity(capacity: usize, needed: usize) -> usize {
    capacity
        .saturating_add(capacity / 8)
        .saturating_add(64)
        .max(needed)
}

#[inline]
fn same_comparator<T>(a: Comparator<T>, b: Comparator<T>) -> bool {
    a as usize == b as usize
}

pub struct Container<'a, T: Element> {
    slot: &'a mut Option<Buffer<T>>,
    count: Option<&'a mut usize>,
    ty: Descriptor,
    comparator: Option<Comparator<T>>,
    case_insensitive: bool,
    sorted: bool,
}

impl<'a, T: Typed> Container<'a, T> {
    /// Handle over `slot` using `T`'s own descriptor.
    pub fn new(slot: &'a mut Option<Buffer<T>>) -> Self {
        Self {
            slot,
            count: None,
            ty: T::descriptor(),
            comparator: None,
            case_insensitive: false,
            sorted: false,
        }
    }
}

impl<'a, T: Element> Container<'a, T> {
    /// Handle over `slot` whose items are laid out as `ty`.
    ///
    /// Fails when `T` cannot represent `ty`, or when an item already in
    /// the buffer does not conform to it.
    pub fn with_descriptor(slot: &'a mut Option<Buffer<T>>, ty: Descriptor) -> Result<Self> {
        if !T::accepts(&ty) {
            return Err(Error::mismatch(
                ty.name(),
                core::any::type_name::<T>(),
            ));
        }
        if let Some(buf) = slot.as_ref() {
            for item in buf.as_slice() {
                item.check(&ty)?;
            }
        }
        Ok(Self {
            slot,
            count: None,
            ty,
            comparator: None,
            case_insensitive: false,
            sorted: false,
        })
    }

    /// Tracks the logical length in `count` instead of the buffer length.
    /// `count` must not exceed the current buffer length.
    pub fn with_count(mut self, count: &'a mut usize) -> Result<Self> {
        let capacity = self.capacity();
        if *count > capacity {
            return Err(Error::mismatch(
                format!("count at most {capacity}"),
                format!("count {}", *count),
            ));
        }
        self.count = Some(count);
        Ok(self)
    }

    pub fn with_comparator(mut self, comparator: Comparator<T>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self.sorted = false;
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.ty
    }

    pub fn comparator(&self) -> Option<Comparator<T>> {
        self.comparator
    }

    /// Replaces the comparator; the array is no longer considered sorted.
    pub fn set_comparator(&mut self, comparator: Option<Comparator<T>>) {
        self.comparator = comparator;
        self.sorted = false;
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn has_external_count(&self) -> bool {
        self.count.is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.count {
            Some(c) => **c,
            None => self.capacity(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the underlying buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slot.as_ref().map_or(0, Buffer::len)
    }

    /// The live items.
    pub fn as_slice(&self) -> &[T] {
        match self.slot.as_ref() {
            Some(buf) => &buf.as_slice()[..self.len()],
            None => &[],
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Mutable access to one item, unsharing the buffer first.
    pub fn get_mut(&mut self, index: usize) -> Result<Option<&mut T>> {
        let n = self.len();
        if index >= n {
            return Ok(None);
        }
        self.sorted = false;
        Ok(Some(&mut self.prepare(n)?[index]))
    }

    /// Overwrites the item at `index`; false when out of range.
    pub fn set(&mut self, index: usize, item: T) -> Result<bool> {
        item.check(&self.ty)?;
        match self.get_mut(index)? {
            Some(slot) => {
                *slot = item;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Orders two items the way this container does.
    pub fn compare_items(&self, a: &T, b: &T) -> Ordering {
        match self.comparator {
            Some(cmp) => cmp(a, b),
            None => a.compare(b, &self.ty, self.case_insensitive),
        }
    }

    pub fn hash_item(&self, item: &T) -> u32 {
        item.hash(&self.ty, self.case_insensitive)
    }

    fn set_len(&mut self, n: usize) {
        if let Some(c) = self.count.as_deref_mut() {
            *c = n;
        }
    }

    /// Exclusive storage able to hold `needed` live items.
    ///
    /// With an external count the returned vector spans the whole
    /// capacity; otherwise it holds exactly the live items and has room
    /// reserved for `needed`.
    fn prepare(&mut self, needed: usize) -> Result<&mut Vec<T>> {
        check_size::<T>(needed)?;
        if self.count.is_some() {
            let capacity = self.capacity();
            if needed > capacity {
                let ty = self.ty.clone();
                resize_slot(self.slot, grow_capacity(capacity, needed), || T::zeroed(&ty))?;
            }
        }
        let buf = self.slot.get_or_insert_with(|| Buffer::from_vec(Vec::new()));
        let len = buf.len();
        let v = buf.make_unique(len)?;
        reserve(v, needed)?;
        Ok(v)
    }

    /// Restores the "empty array is `None`" rule after a removal.
    fn normalize(&mut self) {
        if self.count.is_none() && self.slot.as_ref().is_some_and(Buffer::is_empty) {
            *self.slot = None;
        }
    }

    /// Appends `item` and returns its index.
    pub fn add(&mut self, item: T) -> Result<usize> {
        item.check(&self.ty)?;
        let n = self.len();
        let v = self.prepare(n + 1)?;
        put(v, n, item);
        self.set_len(n + 1);
        self.sorted = false;
        Ok(n)
    }

    /// Appends clones of `items`; returns how many were added.
    pub fn add_slice(&mut self, items: &[T]) -> Result<usize> {
        for item in items {
            item.check(&self.ty)?;
        }
        if items.is_empty() {
            return Ok(0);
        }
        let n = self.len();
        let total = n.checked_add(items.len()).ok_or(Error::CapacityOverflow {
            requested: usize::MAX,
        })?;
        let v = self.prepare(total)?;
        for (i, item) in items.iter().enumerate() {
            put(v, n + i, item.clone());
        }
        self.set_len(total);
        self.sorted = false;
        Ok(items.len())
    }

    /// Inserts `item` before `index`; an index past the end appends.
    /// Returns the index the item landed at.
    pub fn insert(&mut self, index: usize, item: T) -> Result<usize> {
        item.check(&self.ty)?;
        let n = self.len();
        let index = index.min(n);
        let v = self.prepare(n + 1)?;
        put(v, n, item);
        v[index..=n].rotate_right(1);
        self.set_len(n + 1);
        self.sorted = false;
        Ok(index)
    }

    /// Removes the item at `index`; false (and no change) when out of range.
    pub fn delete(&mut self, index: usize) -> Result<bool> {
        let removed = self.delete_range(index, 1)?;
        Ok(removed == 1)
    }

    /// Removes up to `count` items starting at `from`; returns how many
    /// were removed.
    pub fn delete_range(&mut self, from: usize, count: usize) -> Result<usize> {
        let n = self.len();
        if from >= n || count == 0 {
            return Ok(0);
        }
        let count = count.min(n - from);
        let ty = self.ty.clone();
        let external = self.count.is_some();
        let v = self.prepare(n)?;
        v[from..n].rotate_left(count);
        if external {
            for dropped in &mut v[n - count..n] {
                *dropped = T::zeroed(&ty);
            }
        } else {
            v.truncate(n - count);
        }
        self.set_len(n - count);
        self.normalize();
        self.sorted = false;
        Ok(count)
    }

    /// Releases the buffer and every item in it.
    pub fn clear(&mut self) {
        *self.slot = None;
        self.set_len(0);
        self.sorted = false;
    }

    /// Sets the number of live items; new items are zeroed, dropped ones
    /// are released.
    pub fn set_count(&mut self, count: usize) -> Result<()> {
        let n = self.len();
        if count == n {
            return Ok(());
        }
        let ty = self.ty.clone();
        if self.count.is_none() {
            resize_slot(self.slot, count, || T::zeroed(&ty))?;
        } else if count > n {
            // Placeholders past the count are already zeroed.
            self.prepare(count)?;
            self.set_len(count);
        } else {
            let v = self.prepare(n)?;
            for dropped in &mut v[count..n] {
                *dropped = T::zeroed(&ty);
            }
            self.set_len(count);
        }
        self.sorted = false;
        Ok(())
    }

    /// Resizes the buffer. Below the current count the array is
    /// truncated; without an external count the capacity is the count, so
    /// growing only reserves memory.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity < self.len() {
            self.set_count(capacity)?;
        }
        if self.count.is_some() {
            if capacity != self.capacity() {
                let ty = self.ty.clone();
                resize_slot(self.slot, capacity, || T::zeroed(&ty))?;
            }
        } else if capacity > 0 {
            self.prepare(capacity)?;
            self.normalize();
        }
        Ok(())
    }

    pub fn reverse(&mut self) -> Result<()> {
        let n = self.len();
        if n > 1 {
            self.prepare(n)?[..n].reverse();
            self.sorted = false;
        }
        Ok(())
    }

    /// Clones of up to `len` items starting at `from`.
    pub fn slice(&self, from: usize, len: usize) -> Vec<T> {
        let items = self.as_slice();
        let from = from.min(items.len());
        let to = from.saturating_add(len).min(items.len());
        items[from..to].to_vec()
    }

    /// A reference to the same storage (reference count + 1).
    ///
    /// When an external count leaves spare placeholders in the buffer, the
    /// live items are copied into a fresh buffer instead.
    pub fn copy(&self) -> Option<Buffer<T>> {
        let buf = self.slot.as_ref()?;
        if buf.len() == self.len() {
            Some(buf.clone())
        } else {
            self.copy_deep()
        }
    }

    /// A fresh buffer with clones of the live items.
    pub fn copy_deep(&self) -> Option<Buffer<T>> {
        let items = self.as_slice();
        if items.is_empty() {
            None
        } else {
            Some(Buffer::from_vec(items.to_vec()))
        }
    }

    /// Makes this container share `source`'s items.
    pub fn copy_from(&mut self, source: &Container<'_, T>) -> Result<()> {
        if !source.ty.same_shape(&self.ty) {
            return Err(Error::mismatch(self.ty.name(), source.ty.name()));
        }
        let shared = source.copy();
        let n = shared.as_ref().map_or(0, Buffer::len);
        *self.slot = shared;
        self.set_len(n);
        self.sorted = false;
        Ok(())
    }

    /// Same length and pairwise equal items under this container's order.
    pub fn equals(&self, other: &Container<'_, T>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| self.compare_items(a, b) == Ordering::Equal)
    }

    /// Hash of the whole array, consistent with [`Container::equals`] when
    /// no custom comparator is set.
    pub fn hash_all(&self) -> u32 {
        self.iter()
            .fold(combine(0, self.len() as u32), |h, item| combine(h, self.hash_item(item)))
    }

    /// Linear search by element equality, ignoring any comparator.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.iter()
            .position(|x| x.compare(item, &self.ty, self.case_insensitive) == Ordering::Equal)
    }

    /// Finds `item` with the container's own order: binary search when
    /// sorted, linear scan otherwise.
    pub fn find(&self, item: &T) -> Option<usize> {
        self.find_by(item, None)
    }

    /// Finds `item` with `comparator`, or the container's own order when
    /// `None`. Binary search is only used when the array was sorted with
    /// that same order.
    pub fn find_by(&self, item: &T, comparator: Option<Comparator<T>>) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let own = match (comparator, self.comparator) {
            (None, _) => true,
            (Some(a), Some(b)) => same_comparator(a, b),
            (Some(_), None) => false,
        };
        if self.sorted && own {
            return self.binary_search(item).ok();
        }
        match comparator {
            Some(cmp) => self.iter().position(|x| cmp(x, item) == Ordering::Equal),
            None => self
                .iter()
                .position(|x| self.compare_items(x, item) == Ordering::Equal),
        }
    }

    fn binary_search(&self, item: &T) -> core::result::Result<usize, usize> {
        self.as_slice()
            .binary_search_by(|probe| self.compare_items(probe, item))
    }

    /// On a sorted array, `Ok(index)` of an equal item or `Err(index)` of
    /// where it would be inserted. `None` when the array is not sorted.
    pub fn fast_locate_sorted(&self, item: &T) -> Option<core::result::Result<usize, usize>> {
        if !self.sorted {
            return None;
        }
        Some(self.binary_search(item))
    }

    /// Inserts at a position obtained from [`Container::fast_locate_sorted`]
    /// and keeps the array marked sorted.
    pub fn fast_add_sorted(&mut self, index: usize, item: T) -> Result<usize> {
        let sorted = self.sorted;
        let at = self.insert(index, item)?;
        self.sorted = sorted;
        Ok(at)
    }

    /// Deletes without clearing the sorted flag.
    pub fn fast_delete_sorted(&mut self, index: usize) -> Result<bool> {
        let sorted = self.sorted;
        let deleted = self.delete(index)?;
        self.sorted = sorted;
        Ok(deleted)
    }

    /// Sorts with the container's own order and marks it sorted.
    pub fn sort(&mut self) -> Result<()> {
        let n = self.len();
        self.sort_slice(0, n, None)?;
        self.sorted = true;
        Ok(())
    }

    /// Sorts with `comparator`. The array stays eligible for binary search
    /// only if that is the container's own comparator.
    pub fn sort_by(&mut self, comparator: Comparator<T>) -> Result<()> {
        let n = self.len();
        self.sort_slice(0, n, Some(comparator))?;
        self.sorted = self.comparator.is_some_and(|own| same_comparator(own, comparator));
        Ok(())
    }

    /// Sorts the items in `from..to` (clamped). Clears the sorted flag.
    pub fn sort_range(&mut self, from: usize, to: usize, comparator: Option<Comparator<T>>) -> Result<()> {
        let n = self.len();
        self.sort_slice(from.min(n), to.min(n), comparator)?;
        self.sorted = false;
        Ok(())
    }

    fn sort_slice(&mut self, from: usize, to: usize, comparator: Option<Comparator<T>>) -> Result<()> {
        if to <= from + 1 {
            return Ok(());
        }
        let n = self.len();
        let ty = self.ty.clone();
        let ci = self.case_insensitive;
        let cmp = comparator.or(self.comparator);
        let v = &mut self.prepare(n)?[from..to];
        match cmp {
            Some(f) => quicksort(v, &mut |a: &T, b: &T| f(a, b)),
            None => quicksort(v, &mut |a: &T, b: &T| a.compare(b, &ty, ci)),
        }
        Ok(())
    }

    /// Appends the DynamicArray frame of the live items to `w`.
    pub fn save_to(&self, w: &mut Writer) -> Result<()> {
        let ty = &self.ty;
        write_array_frame(ty, self.as_slice(), w, |item, w| item.save(ty, w))
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        self.save_to(&mut w)?;
        Ok(w.into_inner())
    }

    /// Replaces the contents with the array decoded from `r`.
    /// On failure the container is left unchanged.
    pub fn load_from_reader(&mut self, r: &mut Reader<'_>) -> Result<()> {
        let ty = self.ty.clone();
        let items = read_array_frame(&ty, r, |r| T::load(&ty, r))?;
        let n = items.len();
        *self.slot = if n == 0 { None } else { Some(Buffer::from_vec(items)) };
        self.set_len(n);
        self.sorted = false;
        Ok(())
    }

    /// Replaces the contents with the array at the start of `bytes` and
    /// returns the bytes after it.
    pub fn load_from<'b>(&mut self, bytes: &'b [u8]) -> Result<&'b [u8]> {
        let mut r = Reader::new(bytes);
        self.load_from_reader(&mut r)?;
        Ok(r.rest())
    }
}

/// Stores `item` as live item `n` of a vector from `prepare`.
#[inline]
fn put<T>(v: &mut Vec<T>, n: usize, item: T) {
    if n < v.len() {
        v[n] = item;
    } else {
        v.push(item);
    }
}

impl<'a, T: Element + core::fmt::Debug> core::fmt::Debug for Container<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("type", &self.ty.name())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("sorted", &self.sorted)
            .field("items", &self.as_slice())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtti::TypeDescriptor;

    fn desc(a: &i32, b: &i32) -> Ordering {
        b.cmp(a)
    }

    #[test]
    fn external_count_grows_by_an_eighth_plus_64() {
        let mut slot = None;
        let mut count = 0;
        let mut c = Container::<u32>::new(&mut slot).with_count(&mut count).unwrap();
        c.add(1).unwrap();
        assert_eq!(c.capacity(), 64);
        for i in 0..63 {
            c.add(i).unwrap();
        }
        assert_eq!(c.capacity(), 64);
        c.add(99).unwrap();
        assert_eq!(c.capacity(), 64 + 8 + 64);
        assert_eq!(c.len(), 65);
        drop(c);
        assert_eq!(count, 65);
        assert_eq!(slot.as_ref().unwrap().len(), 136);
    }

    #[test]
    fn with_count_rejects_count_beyond_buffer() {
        let mut slot = Some(Buffer::from_vec(vec![1u8, 2]));
        let mut count = 3;
        assert!(Container::new(&mut slot).with_count(&mut count).is_err());
    }

    #[test]
    fn delete_with_external_count_keeps_capacity() {
        let mut slot = None;
        let mut count = 0;
        let mut c = Container::<i64>::new(&mut slot).with_count(&mut count).unwrap();
        c.add_slice(&[1, 2, 3, 4]).unwrap();
        assert!(c.delete(1).unwrap());
        assert_eq!(c.as_slice(), &[1, 3, 4]);
        assert_eq!(c.capacity(), 64);
        assert_eq!(c.delete_range(1, 10).unwrap(), 2);
        assert_eq!(c.as_slice(), &[1]);
    }

    #[test]
    fn insert_clamps_and_shifts() {
        let mut slot = None;
        let mut c = Container::<i32>::new(&mut slot);
        assert_eq!(c.insert(5, 3).unwrap(), 0);
        c.insert(0, 1).unwrap();
        c.insert(1, 2).unwrap();
        assert_eq!(c.insert(99, 4).unwrap(), 3);
        assert_eq!(c.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn last_delete_releases_buffer() {
        let mut slot = None;
        let mut c = Container::<i32>::new(&mut slot);
        c.add(1).unwrap();
        assert!(c.delete(0).unwrap());
        assert!(!c.delete(0).unwrap());
        drop(c);
        assert!(slot.is_none());
    }

    #[test]
    fn sorted_flag_follows_own_comparator() {
        let mut slot = None;
        let mut c = Container::<i32>::new(&mut slot).with_comparator(desc);
        c.add_slice(&[3, 9, 1, 7]).unwrap();
        c.sort().unwrap();
        assert!(c.is_sorted());
        assert_eq!(c.as_slice(), &[9, 7, 3, 1]);
        assert_eq!(c.find(&3), Some(2));

        c.sort_by(desc).unwrap();
        assert!(c.is_sorted());

        fn asc(a: &i32, b: &i32) -> Ordering {
            a.cmp(b)
        }
        c.sort_by(asc).unwrap();
        assert!(!c.is_sorted());
        assert_eq!(c.as_slice(), &[1, 3, 7, 9]);
        // Linear scan still finds it with the original comparator.
        assert_eq!(c.find(&7), Some(2));
    }

    #[test]
    fn fast_sorted_helpers_keep_flag() {
        let mut slot = None;
        let mut c = Container::<i32>::new(&mut slot);
        c.add_slice(&[10, 30, 20]).unwrap();
        assert_eq!(c.fast_locate_sorted(&20), None);
        c.sort().unwrap();
        let at = c.fast_locate_sorted(&25).unwrap().unwrap_err();
        c.fast_add_sorted(at, 25).unwrap();
        assert!(c.is_sorted());
        assert_eq!(c.as_slice(), &[10, 20, 25, 30]);
        assert_eq!(c.fast_locate_sorted(&30), Some(Ok(3)));
        assert!(c.fast_delete_sorted(0).unwrap());
        assert!(c.is_sorted());
        c.add(5).unwrap();
        assert!(!c.is_sorted());
    }

    #[test]
    fn descriptor_must_be_accepted() {
        let mut slot: Option<Buffer<i32>> = None;
        let err = Container::with_descriptor(&mut slot, TypeDescriptor::u32()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn set_count_zeroes_and_releases() {
        let mut slot = None;
        let mut c = Container::<String>::new(&mut slot);
        c.set_count(2).unwrap();
        assert_eq!(c.as_slice(), &[String::new(), String::new()]);
        assert!(c.set(1, "a".into()).unwrap());
        assert!(!c.set(2, "b".into()).unwrap());
        c.set_count(1).unwrap();
        assert_eq!(c.as_slice(), &[String::new()]);
        c.set_count(0).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.capacity(), 0);
    }

    #[test]
    fn case_insensitive_find() {
        let mut slot = None;
        let mut c = Container::<String>::new(&mut slot).case_insensitive(true);
        c.add("Alpha".into()).unwrap();
        c.add("beta".into()).unwrap();
        assert_eq!(c.find(&"BETA".to_string()), Some(1));
        assert_eq!(c.index_of(&"alpha".to_string()), Some(0));
    }
}
