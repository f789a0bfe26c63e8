//! HashedContainer: a [`Container`] with a [`HashIndex`] mirroring it.
//!
//! Lookups scan linearly until hashing pays off (see [`HashIndex`]), then
//! go through the table. Equality is the container's order (comparator,
//! or element compare with its case sensitivity); hashing is the custom
//! hasher when one is set, otherwise the element hash. Both must agree:
//! items that compare equal must hash equal.
//!
//! Mutations made through this type keep the index consistent. Changing
//! items through [`HashedContainer::container_mut`] does not; call
//! [`HashedContainer::rehash`] before the next lookup. Likewise
//! [`HashedContainer::update`] must not change the part of an item that
//! its hash depends on.

use crate::container::Container;
use crate::dispatch;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::hash_index::{HashIndex, Probe};
use core::cmp::Ordering;

/// Item hash supplied by the caller.
pub type Hasher<T> = fn(&T) -> u32;

pub struct HashedContainer<'a, T: Element> {
    container: Container<'a, T>,
    index: HashIndex,
    hasher: Option<Hasher<T>>,
}

enum Located {
    /// `slot` is known when the table was used.
    Found { index: usize, slot: Option<usize> },
    /// Missing; the table has a vacant slot for it.
    Vacant { hash: u32, slot: usize },
    /// Missing, found by scanning.
    Absent,
}

fn item_hash<T: Element>(container: &Container<'_, T>, hasher: Option<Hasher<T>>, item: &T) -> u32 {
    match hasher {
        Some(h) => h(item),
        None => container.hash_item(item),
    }
}

impl<'a, T: Element> HashedContainer<'a, T> {
    /// Hashing is available when every part of the element type has a
    /// hash function and the container has no custom comparator; otherwise
    /// every lookup is a scan until [`HashedContainer::with_hasher`]
    /// provides a hash that agrees with the comparator.
    pub fn new(container: Container<'a, T>) -> Self {
        let hashable = dispatch::hashable(container.descriptor()) && container.comparator().is_none();
        Self {
            container,
            index: HashIndex::new(hashable),
            hasher: None,
        }
    }

    pub fn with_hasher(mut self, hasher: Hasher<T>) -> Self {
        self.hasher = Some(hasher);
        self.index.set_has_hasher(true);
        self
    }

    /// Item count from which lookups use the table.
    pub fn with_count_trigger(mut self, count_trigger: usize) -> Self {
        self.index = self.index.with_count_trigger(count_trigger);
        self
    }

    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.container.get(index)
    }

    pub fn container(&self) -> &Container<'a, T> {
        &self.container
    }

    /// Direct access to the items. Call [`HashedContainer::rehash`] after
    /// changing them. A comparator installed here needs a matching
    /// [`HashedContainer::with_hasher`].
    pub fn container_mut(&mut self) -> &mut Container<'a, T> {
        &mut self.container
    }

    pub fn into_container(self) -> Container<'a, T> {
        self.container
    }

    pub fn hash_index(&self) -> &HashIndex {
        &self.index
    }

    pub fn is_hashing(&self) -> bool {
        self.index.is_hashing()
    }

    pub fn hash_of(&self, item: &T) -> u32 {
        item_hash(&self.container, self.hasher, item)
    }

    fn locate(&mut self, item: &T) -> Result<Located> {
        let Self {
            container,
            index,
            hasher,
        } = self;
        let c: &Container<'a, T> = container;
        let hasher = *hasher;
        let hash_of = |i: usize| c.get(i).map_or(0, |x| item_hash(c, hasher, x));
        let same = |a: usize, b: usize| match (c.get(a), c.get(b)) {
            (Some(x), Some(y)) => c.compare_items(x, y) == Ordering::Equal,
            _ => false,
        };
        let matches = |i: usize| c.get(i).is_some_and(|x| c.compare_items(x, item) == Ordering::Equal);

        if index.prepare_lookup(c.len(), hash_of, same)? {
            let hash = item_hash(c, hasher, item);
            Ok(match index.probe(hash, matches)? {
                Probe::Found { slot, index } => Located::Found {
                    index,
                    slot: Some(slot),
                },
                Probe::Vacant { slot } => Located::Vacant { hash, slot },
            })
        } else {
            Ok(match c.iter().position(|x| c.compare_items(x, item) == Ordering::Equal) {
                Some(index) => Located::Found { index, slot: None },
                None => Located::Absent,
            })
        }
    }

    /// Appends `item` and, when a table slot is known, records it there.
    /// If the table cannot take it the append is undone.
    fn append(&mut self, item: T, vacant: Option<(u32, usize)>) -> Result<usize> {
        let at = self.container.add(item)?;
        if let Some((hash, slot)) = vacant {
            let Self {
                container,
                index,
                hasher,
            } = self;
            let c: &Container<'a, T> = container;
            let hasher = *hasher;
            let recorded = index.hash_add(
                hash,
                slot,
                at,
                |i| c.get(i).map_or(0, |x| item_hash(c, hasher, x)),
                |a, b| match (c.get(a), c.get(b)) {
                    (Some(x), Some(y)) => c.compare_items(x, y) == Ordering::Equal,
                    _ => false,
                },
            );
            if let Err(e) = recorded {
                // A failed grow may leave the table half built; the next
                // lookup rebuilds it.
                tracing::warn!(error = %e, at, "hash index rejected append, undoing");
                self.index.clear();
                self.container.delete(at)?;
                return Err(e);
            }
        }
        Ok(at)
    }

    /// Removes item `at`; `slot` is its table slot when hashing.
    fn remove(&mut self, at: usize, slot: Option<usize>) -> Result<()> {
        if let Some(slot) = slot {
            let Self {
                container,
                index,
                hasher,
            } = self;
            let c: &Container<'a, T> = container;
            let hasher = *hasher;
            index.delete(slot, at, |i| c.get(i).map_or(0, |x| item_hash(c, hasher, x)))?;
        }
        self.container.delete(at)?;
        Ok(())
    }

    pub fn find(&mut self, item: &T) -> Result<Option<usize>> {
        Ok(match self.locate(item)? {
            Located::Found { index, .. } => Some(index),
            Located::Vacant { .. } | Located::Absent => None,
        })
    }

    /// Index of an item equal to `item`, appending `item` when there is
    /// none. The flag tells whether it was added.
    pub fn find_or_add(&mut self, item: T) -> Result<(usize, bool)> {
        match self.locate(&item)? {
            Located::Found { index, .. } => Ok((index, false)),
            Located::Vacant { hash, slot } => Ok((self.append(item, Some((hash, slot)))?, true)),
            Located::Absent => Ok((self.append(item, None)?, true)),
        }
    }

    /// Appends `item`, failing with [`Error::DuplicateKey`] when an equal
    /// item is stored.
    pub fn add(&mut self, item: T) -> Result<usize> {
        match self.find_or_add(item)? {
            (index, true) => Ok(index),
            (_, false) => Err(Error::DuplicateKey),
        }
    }

    /// Overwrites the stored item equal to `item`. When there is none it
    /// is appended if `add_if_missing`, otherwise `None` is returned.
    pub fn update(&mut self, item: T, add_if_missing: bool) -> Result<Option<usize>> {
        match self.locate(&item)? {
            Located::Found { index, .. } => {
                self.container.set(index, item)?;
                Ok(Some(index))
            }
            Located::Vacant { hash, slot } if add_if_missing => Ok(Some(self.append(item, Some((hash, slot)))?)),
            Located::Absent if add_if_missing => Ok(Some(self.append(item, None)?)),
            Located::Vacant { .. } | Located::Absent => Ok(None),
        }
    }

    /// Removes the item equal to `item`; false when there is none.
    pub fn delete(&mut self, item: &T) -> Result<bool> {
        match self.locate(item)? {
            Located::Found { index, slot } => {
                self.remove(index, slot)?;
                Ok(true)
            }
            Located::Vacant { .. } | Located::Absent => Ok(false),
        }
    }

    /// Removes the item at `at`; false when out of range.
    pub fn delete_at(&mut self, at: usize) -> Result<bool> {
        let item = match self.container.get(at) {
            Some(item) => item,
            None => return Ok(false),
        };
        let slot = if self.index.is_hashing() {
            let hash = self.hash_of(item);
            match self.index.probe(hash, |i| i == at)? {
                Probe::Found { slot, .. } => Some(slot),
                Probe::Vacant { .. } => {
                    return Err(Error::HashTable(format!("item {at} is missing from the table")));
                }
            }
        } else {
            None
        };
        self.remove(at, slot)?;
        Ok(true)
    }

    /// Empties the container and returns the index to scanning.
    pub fn clear(&mut self) {
        self.container.clear();
        self.index.clear();
    }

    /// Rebuilds the table from the current items; returns how many items
    /// equal an earlier one.
    pub fn rehash(&mut self) -> Result<usize> {
        if !self.index.has_hasher() {
            return Err(Error::Unsupported {
                category: self.container.descriptor().category(),
                operation: "hash",
            });
        }
        let Self {
            container,
            index,
            hasher,
        } = self;
        let c: &Container<'a, T> = container;
        let hasher = *hasher;
        index.rehash(
            c.len(),
            false,
            |i| c.get(i).map_or(0, |x| item_hash(c, hasher, x)),
            |a, b| match (c.get(a), c.get(b)) {
                (Some(x), Some(y)) => c.compare_items(x, y) == Ordering::Equal,
                _ => false,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seven(_: &u32) -> u32 {
        7
    }

    #[test]
    fn scans_until_trigger_then_hashes() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<u32>::new(&mut slot)).with_count_trigger(4);
        for i in 0..3 {
            assert_eq!(h.find_or_add(i).unwrap(), (i as usize, true));
        }
        assert!(!h.is_hashing());
        h.find_or_add(3).unwrap();
        assert!(!h.is_hashing());
        assert_eq!(h.find(&2).unwrap(), Some(2));
        assert!(h.is_hashing());
        assert_eq!(h.find_or_add(2).unwrap(), (2, false));
        assert_eq!(h.find_or_add(10).unwrap(), (4, true));
        assert_eq!(h.find(&10).unwrap(), Some(4));
    }

    #[test]
    fn colliding_items_survive_middle_delete() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<u32>::new(&mut slot))
            .with_hasher(seven)
            .with_count_trigger(0);
        for v in [10, 20, 30] {
            h.add(v).unwrap();
        }
        assert!(h.is_hashing());
        assert!(h.delete(&20).unwrap());
        assert_eq!(h.find(&10).unwrap(), Some(0));
        assert_eq!(h.find(&30).unwrap(), Some(1));
        assert_eq!(h.find(&20).unwrap(), None);
        assert_eq!(h.len(), 2);
    }

    fn by_len(a: &String, b: &String) -> Ordering {
        a.len().cmp(&b.len())
    }

    fn len_hash(s: &String) -> u32 {
        s.len() as u32
    }

    #[test]
    fn comparator_without_hasher_keeps_scanning() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<String>::new(&mut slot).with_comparator(by_len))
            .with_count_trigger(0);
        h.add("ab".into()).unwrap();
        assert_eq!(h.find_or_add("cd".into()).unwrap(), (0, false));
        assert!(!h.is_hashing());
        assert!(!h.hash_index().has_hasher());

        let mut h = h.with_hasher(len_hash);
        assert_eq!(h.find_or_add("cd".into()).unwrap(), (0, false));
        assert!(h.is_hashing());
        assert_eq!(h.find_or_add("xyz".into()).unwrap(), (1, true));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn rejected_table_insert_undoes_append() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<u32>::new(&mut slot)).with_count_trigger(0);
        h.add(10).unwrap();
        assert!(h.is_hashing());
        let taken = h.hash_index().slots().iter().position(|&v| v != 0).unwrap();

        assert!(matches!(h.append(20, Some((0, taken))), Err(Error::HashTable(_))));
        assert_eq!(h.len(), 1);
        assert!(!h.is_hashing());
        assert_eq!(h.find(&20).unwrap(), None);
        assert_eq!(h.find(&10).unwrap(), Some(0));
        assert!(h.is_hashing());
        assert_eq!(h.hash_index().slots().iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<String>::new(&mut slot).case_insensitive(true));
        h.add("Key".into()).unwrap();
        assert_eq!(h.add("KEY".into()), Err(Error::DuplicateKey));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn update_overwrites_or_reports() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<String>::new(&mut slot).case_insensitive(true));
        h.add("alpha".into()).unwrap();
        assert_eq!(h.update("ALPHA".into(), false).unwrap(), Some(0));
        assert_eq!(h.get(0).map(String::as_str), Some("ALPHA"));
        assert_eq!(h.update("beta".into(), false).unwrap(), None);
        assert_eq!(h.update("beta".into(), true).unwrap(), Some(1));
    }

    #[test]
    fn rehash_is_idempotent() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<i64>::new(&mut slot)).with_count_trigger(0);
        for v in 0..100 {
            h.add(v * 31).unwrap();
        }
        assert_eq!(h.rehash().unwrap(), 0);
        let first = h.hash_index().slots().to_vec();
        assert_eq!(h.rehash().unwrap(), 0);
        assert_eq!(h.hash_index().slots(), &first[..]);
    }

    #[test]
    fn direct_mutation_needs_rehash() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<i32>::new(&mut slot)).with_count_trigger(0);
        h.add(1).unwrap();
        h.add(2).unwrap();
        h.container_mut().add(2).unwrap();
        assert_eq!(h.rehash().unwrap(), 1);
        assert_eq!(h.find(&2).unwrap(), Some(1));
    }

    #[test]
    fn delete_at_keeps_index_consistent() {
        let mut slot = None;
        let mut h = HashedContainer::new(Container::<u32>::new(&mut slot)).with_count_trigger(0);
        for v in 0..10 {
            h.add(v).unwrap();
        }
        assert!(h.delete_at(3).unwrap());
        assert!(!h.delete_at(42).unwrap());
        for v in [0u32, 1, 2, 4, 9] {
            let at = h.find(&v).unwrap().unwrap();
            assert_eq!(h.get(at), Some(&v));
        }
        assert_eq!(h.find(&3).unwrap(), None);
    }
}
