//! HashIndex: open-addressing table of item indices.
//!
//! Slots hold `0` when empty and `n + 1` for item `n` of the indexed
//! container. The table never stores hashes or items; callers supply
//! closures that hash an item index or test it for a match, so the index
//! stays valid however the items are represented.
//!
//! Sizing
//! - Tables are kept at most 75% full.
//! - Up to [`POW2_TABLE_LIMIT`] slots the size is a power of two and a
//!   hash maps to a slot by masking.
//! - Beyond that, sizes come from [`HASH_PRIMES`] and a hash maps to a
//!   slot by multiply-high (`(hash * size) >> 32`), or by modulo on 32-bit
//!   targets.
//!
//! Deletion clears the slot and re-inserts the rest of its probe run, so
//! no tombstones are needed. Probing that wraps around the whole table
//! without meeting an empty slot is a fatal [`Error::HashTable`].
//!
//! State: an index starts in scanning mode and switches to hashing when
//! the container reaches `count_trigger` items, or after `2 * count_trigger`
//! scans. [`HashIndex::clear`] goes back to scanning.

use crate::error::{Error, Result};

/// Items below which a linear scan is used instead of the table.
pub const DEFAULT_COUNT_TRIGGER: usize = 32;

/// Largest power-of-two table size; larger tables use [`HASH_PRIMES`].
pub const POW2_TABLE_LIMIT: usize = 1 << 18;

/// Smallest table built.
pub const MIN_TABLE_SIZE: usize = 64;

/// Ascending prime table sizes used past [`POW2_TABLE_LIMIT`].
pub const HASH_PRIMES: [usize; 26] = [
    53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613, 393241, 786433,
    1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319, 201326611, 402653189,
    805306457, 1610612741,
];

/// Outcome of a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// A matching item `index` sits at `slot`.
    Found { slot: usize, index: usize },
    /// No match; `slot` is the empty slot ending the probe run, where the
    /// item can be inserted without probing again.
    Vacant { slot: usize },
}

#[derive(Clone, Debug)]
pub struct HashIndex {
    table: Vec<u32>,
    has_hasher: bool,
    can_hash: bool,
    count_trigger: usize,
    scan_counter: usize,
}

/// Smallest table size keeping `count` items at most 75% full.
fn size_for(count: usize) -> Result<usize> {
    let min = count
        .checked_add(count / 3 + 1)
        .ok_or(Error::CapacityOverflow { requested: count })?;
    if min <= POW2_TABLE_LIMIT {
        return Ok(min.next_power_of_two().max(MIN_TABLE_SIZE));
    }
    HASH_PRIMES
        .iter()
        .copied()
        .find(|&p| p >= min)
        .ok_or(Error::CapacityOverflow { requested: count })
}

/// The size after `current` in the growth sequence.
fn next_size(current: usize) -> Result<usize> {
    if current < POW2_TABLE_LIMIT {
        return Ok((current * 2).max(MIN_TABLE_SIZE));
    }
    HASH_PRIMES
        .iter()
        .copied()
        .find(|&p| p > current)
        .ok_or(Error::CapacityOverflow { requested: current })
}

impl HashIndex {
    /// A scanning index. Without a hasher it never switches to hashing.
    pub fn new(has_hasher: bool) -> Self {
        Self {
            table: Vec::new(),
            has_hasher,
            can_hash: false,
            count_trigger: DEFAULT_COUNT_TRIGGER,
            scan_counter: 0,
        }
    }

    pub fn with_count_trigger(mut self, count_trigger: usize) -> Self {
        self.count_trigger = count_trigger;
        self
    }

    pub fn count_trigger(&self) -> usize {
        self.count_trigger
    }

    pub fn has_hasher(&self) -> bool {
        self.has_hasher
    }

    pub(crate) fn set_has_hasher(&mut self, has_hasher: bool) {
        self.has_hasher = has_hasher;
        self.clear();
    }

    /// True once the table mirrors the container.
    pub fn is_hashing(&self) -> bool {
        self.can_hash
    }

    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    /// Raw slot values (`0` empty, `n + 1` item `n`).
    pub fn slots(&self) -> &[u32] {
        &self.table
    }

    /// Drops the table and returns to scanning mode.
    pub fn clear(&mut self) {
        self.table = Vec::new();
        self.can_hash = false;
        self.scan_counter = 0;
    }

    /// Decides whether a lookup over `count` items should use the table.
    /// Returns false for a linear scan (counting it), true when the table
    /// is ready, building it first if hashing has just become worthwhile.
    pub fn prepare_lookup(
        &mut self,
        count: usize,
        hash_of: impl FnMut(usize) -> u32,
        same: impl FnMut(usize, usize) -> bool,
    ) -> Result<bool> {
        if !self.has_hasher {
            return Ok(false);
        }
        if self.can_hash {
            return Ok(true);
        }
        let forced = self.scan_counter >= 2 * self.count_trigger;
        if count >= self.count_trigger || forced {
            tracing::debug!(count, scans = self.scan_counter, forced, "switching to hashed lookups");
            self.rehash(count, false, hash_of, same)?;
            return Ok(true);
        }
        self.scan_counter += 1;
        Ok(false)
    }

    /// Slot for `hash` before probing.
    #[inline]
    pub fn table_index(&self, hash: u32) -> usize {
        let size = self.table.len();
        if size <= POW2_TABLE_LIMIT && size.is_power_of_two() {
            return hash as usize & (size - 1);
        }
        Self::reduce(hash, size)
    }

    #[cfg(not(target_pointer_width = "32"))]
    #[inline]
    fn reduce(hash: u32, size: usize) -> usize {
        ((hash as u64 * size as u64) >> 32) as usize
    }

    #[cfg(target_pointer_width = "32")]
    #[inline]
    fn reduce(hash: u32, size: usize) -> usize {
        hash as usize % size
    }

    #[inline]
    fn next_slot(&self, slot: usize) -> usize {
        if slot + 1 == self.table.len() {
            0
        } else {
            slot + 1
        }
    }

    fn wrapped(&self) -> Error {
        Error::HashTable(format!("no empty slot left in a {}-slot table", self.table.len()))
    }

    /// Probes from `hash`'s slot, calling `matches` on each occupied slot's
    /// item index, until a match or an empty slot.
    pub fn probe(&self, hash: u32, mut matches: impl FnMut(usize) -> bool) -> Result<Probe> {
        if self.table.is_empty() {
            return Err(Error::HashTable("probe on an unbuilt table".into()));
        }
        let start = self.table_index(hash);
        let mut slot = start;
        loop {
            let v = self.table[slot];
            if v == 0 {
                return Ok(Probe::Vacant { slot });
            }
            let index = (v - 1) as usize;
            if matches(index) {
                return Ok(Probe::Found { slot, index });
            }
            slot = self.next_slot(slot);
            if slot == start {
                return Err(self.wrapped());
            }
        }
    }

    /// Index of the first item matching `hash` and `matches`.
    pub fn find(&self, hash: u32, matches: impl FnMut(usize) -> bool) -> Result<Option<usize>> {
        Ok(match self.probe(hash, matches)? {
            Probe::Found { index, .. } => Some(index),
            Probe::Vacant { .. } => None,
        })
    }

    /// First empty slot on `hash`'s probe run.
    fn vacant_slot(&self, hash: u32) -> Result<usize> {
        match self.probe(hash, |_| false)? {
            Probe::Vacant { slot } => Ok(slot),
            Probe::Found { .. } => Err(self.wrapped()),
        }
    }

    /// Records item `index` (hash `hash`) at `slot`, a vacant slot from
    /// [`HashIndex::probe`]. When the table would pass 75% it is grown and
    /// rebuilt over items `0..index` first, and the slot is probed again.
    pub fn hash_add(
        &mut self,
        hash: u32,
        slot: usize,
        index: usize,
        hash_of: impl FnMut(usize) -> u32,
        same: impl FnMut(usize, usize) -> bool,
    ) -> Result<()> {
        let value = u32::try_from(index + 1).map_err(|_| Error::CapacityOverflow { requested: index + 1 })?;
        let mut slot = slot;
        if (index + 1) * 4 > self.table.len() * 3 {
            self.rehash(index, true, hash_of, same)?;
            slot = self.vacant_slot(hash)?;
        } else if self.table.get(slot) != Some(&0) {
            return Err(Error::HashTable(format!("slot {slot} is not vacant")));
        }
        self.table[slot] = value;
        Ok(())
    }

    /// Rebuilds the table over items `0..count`, growing it past its
    /// current size when `force_grow`. Every item gets a slot, duplicates
    /// included; returns how many items equal an earlier one.
    pub fn rehash(
        &mut self,
        count: usize,
        force_grow: bool,
        mut hash_of: impl FnMut(usize) -> u32,
        mut same: impl FnMut(usize, usize) -> bool,
    ) -> Result<usize> {
        if !self.has_hasher {
            return Err(Error::HashTable("rehash without a hasher".into()));
        }
        u32::try_from(count).map_err(|_| Error::CapacityOverflow { requested: count })?;
        let mut size = size_for(count)?;
        if force_grow && size <= self.table.len() {
            size = next_size(self.table.len())?;
        }

        let mut hashes = Vec::new();
        hashes
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory { bytes: count * 4 })?;
        hashes.extend((0..count).map(&mut hash_of));

        let mut table = Vec::new();
        table
            .try_reserve_exact(size)
            .map_err(|_| Error::OutOfMemory { bytes: size * 4 })?;
        table.resize(size, 0u32);
        self.table = table;

        let mut duplicates = 0;
        for (i, &h) in hashes.iter().enumerate() {
            let start = self.table_index(h);
            let mut slot = start;
            let mut duplicate = false;
            loop {
                let v = self.table[slot];
                if v == 0 {
                    self.table[slot] = i as u32 + 1;
                    break;
                }
                let j = (v - 1) as usize;
                if !duplicate && hashes[j] == h && same(j, i) {
                    duplicate = true;
                }
                slot = self.next_slot(slot);
                if slot == start {
                    return Err(self.wrapped());
                }
            }
            if duplicate {
                duplicates += 1;
            }
        }

        self.can_hash = true;
        self.scan_counter = 0;
        tracing::debug!(size, count, duplicates, "hash table rebuilt");
        if duplicates > 0 {
            tracing::warn!(duplicates, count, "hash table rebuilt over duplicate items");
        }
        Ok(duplicates)
    }

    /// Removes item `index`, stored at `slot`, and renumbers the items
    /// after it. `hash_of` must still see the items as numbered before the
    /// removal.
    pub fn delete(&mut self, slot: usize, index: usize, mut hash_of: impl FnMut(usize) -> u32) -> Result<()> {
        if self.table.get(slot).copied() != Some(index as u32 + 1) {
            return Err(Error::HashTable(format!("slot {slot} does not hold item {index}")));
        }
        self.table[slot] = 0;

        // Re-insert the rest of the probe run so nothing is orphaned past
        // the new hole.
        let mut s = self.next_slot(slot);
        while s != slot {
            let v = self.table[s];
            if v == 0 {
                break;
            }
            self.table[s] = 0;
            let target = self.vacant_slot(hash_of((v - 1) as usize))?;
            self.table[target] = v;
            s = self.next_slot(s);
        }

        let removed = index as u32 + 1;
        // Slots store positions, not keys, so every later item shifts down;
        // that is a full table walk per delete.
        for v in self.table.iter_mut() {
            if *v > removed {
                *v -= 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(hashes: &[u32]) -> HashIndex {
        let mut idx = HashIndex::new(true);
        idx.rehash(hashes.len(), false, |i| hashes[i], |_, _| false).unwrap();
        idx
    }

    #[test]
    fn sizes_follow_pow2_then_primes() {
        assert_eq!(size_for(0).unwrap(), MIN_TABLE_SIZE);
        assert_eq!(size_for(48).unwrap(), 128);
        assert_eq!(size_for(196_607).unwrap(), POW2_TABLE_LIMIT);
        assert_eq!(size_for(196_608).unwrap(), 393241);
        assert_eq!(next_size(64).unwrap(), 128);
        assert_eq!(next_size(POW2_TABLE_LIMIT).unwrap(), 393241);
        assert!(size_for(usize::MAX / 2).is_err());
    }

    #[test]
    fn table_index_stays_in_range() {
        let mut idx = HashIndex::new(true);
        idx.table = vec![0; 393241];
        for h in [0u32, 1, 0x8000_0000, u32::MAX] {
            assert!(idx.table_index(h) < 393241);
        }
        assert_eq!(idx.table_index(u32::MAX), 393240);
        idx.table = vec![0; 64];
        assert_eq!(idx.table_index(65), 1);
    }

    #[test]
    fn colliding_run_survives_middle_delete() {
        let hashes = vec![5u32, 5, 5];
        let mut idx = build(&hashes);
        assert_eq!(&idx.slots()[5..8], &[1, 2, 3]);

        let Probe::Found { slot, index } = idx.probe(5, |i| i == 1).unwrap() else {
            panic!("item 1 not found");
        };
        assert_eq!((slot, index), (6, 1));
        idx.delete(slot, index, |i| hashes[i]).unwrap();

        // Former item 2 is now item 1 and moved up into the hole.
        assert_eq!(&idx.slots()[5..8], &[1, 2, 0]);
        assert_eq!(idx.find(5, |i| i == 0).unwrap(), Some(0));
        assert_eq!(idx.find(5, |i| i == 1).unwrap(), Some(1));
    }

    #[test]
    fn rehash_counts_duplicates_once_per_item() {
        let values = [1, 2, 1, 1, 3];
        let mut idx = HashIndex::new(true);
        let dups = idx
            .rehash(values.len(), false, |i| values[i], |a, b| values[a] == values[b])
            .unwrap();
        assert_eq!(dups, 2);
        assert_eq!(idx.slots().iter().filter(|&&v| v != 0).count(), 5);
    }

    #[test]
    fn full_wrap_is_fatal() {
        let mut idx = HashIndex::new(true);
        idx.table = vec![1, 2, 3, 4];
        idx.can_hash = true;
        assert!(matches!(idx.probe(0, |_| false), Err(Error::HashTable(_))));
    }

    #[test]
    fn lookup_switches_after_trigger_or_scans() {
        let mut idx = HashIndex::new(true).with_count_trigger(4);
        assert!(!idx.prepare_lookup(3, |_| 0, |_, _| false).unwrap());
        assert!(idx.prepare_lookup(4, |_| 0, |_, _| false).unwrap());
        assert!(idx.is_hashing());

        idx.clear();
        for _ in 0..8 {
            assert!(!idx.prepare_lookup(1, |_| 0, |_, _| false).unwrap());
        }
        assert!(idx.prepare_lookup(1, |_| 0, |_, _| false).unwrap());

        let mut never = HashIndex::new(false).with_count_trigger(0);
        assert!(!never.prepare_lookup(100, |_| 0, |_, _| false).unwrap());
    }

    #[test]
    fn hash_add_grows_past_three_quarters() {
        let mut idx = build(&[]);
        assert_eq!(idx.table_size(), 64);
        for i in 0..48usize {
            let h = i as u32 * 7;
            let Probe::Vacant { slot } = idx.probe(h, |_| false).unwrap() else {
                panic!("unexpected match");
            };
            idx.hash_add(h, slot, i, |j| j as u32 * 7, |_, _| false).unwrap();
        }
        assert_eq!(idx.table_size(), 64);
        let Probe::Vacant { slot } = idx.probe(48 * 7, |_| false).unwrap() else {
            panic!("unexpected match");
        };
        idx.hash_add(48 * 7, slot, 48, |j| j as u32 * 7, |_, _| false).unwrap();
        assert_eq!(idx.table_size(), 128);
        for i in 0..49usize {
            assert_eq!(idx.find(i as u32 * 7, |j| j == i).unwrap(), Some(i));
        }
    }
}
