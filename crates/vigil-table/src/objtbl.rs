// SPDX-License-Identifier: MIT OR Apache-2.0
//! Open-addressing object table with Robin-Hood probing.

use std::cmp::Ordering;

/// Hash and compare callbacks for an [`ObjTbl`].
///
/// The ops value is passed to each table operation instead of being stored
/// in the table, so implementations may borrow context (for example the
/// interner that resolves symbol handles to bytes).
pub trait TblOps<T> {
    /// Hash `item` under `seed`.
    fn hash(&self, item: &T, seed: u32) -> u32;
    /// Total order used for duplicate detection and [`ObjTbl::into_sorted`].
    fn cmp(&self, a: &T, b: &T) -> Ordering;
}

#[derive(Debug)]
struct Entry<T> {
    hash: u32,
    distance: u32,
    value: T,
}

/// Robin-Hood hashed set keyed by a caller-supplied `(hash, compare)` pair.
///
/// Capacity is always a power of two; a rehash to the next power of two
/// triggers at 85% load. Lookups construct a probe value of the same type
/// (possibly partially filled) and are bounded by the tracked maximum probe
/// distance.
#[derive(Debug)]
pub struct ObjTbl<T> {
    entries: Vec<Option<Entry<T>>>,
    len: usize,
    modmask: u32,
    seed: u32,
    max_probe: u32,
}

const MIN_SLOTS: usize = 8;
const LOAD_PERCENT: usize = 85;

impl<T> ObjTbl<T> {
    /// Create a table with room for roughly `nslots` entries.
    pub fn with_capacity(seed: u32, nslots: usize) -> Self {
        let cap = nslots.max(MIN_SLOTS).next_power_of_two();
        Self {
            entries: (0..cap).map(|_| None).collect(),
            len: 0,
            modmask: (cap - 1) as u32,
            seed,
            max_probe: 0,
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot count of the current table.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Longest probe sequence seen since the last rehash.
    pub fn max_probe_distance(&self) -> u32 {
        self.max_probe
    }

    /// Look up the value equal to `key` under the table's compare.
    pub fn get<'s, O: TblOps<T>>(&'s self, ops: &O, key: &T) -> Option<&'s T> {
        let hash = ops.hash(key, self.seed);
        let mut idx = hash & self.modmask;
        let mut dist = 0u32;

        loop {
            match &self.entries[idx as usize] {
                None => return None,
                Some(e) => {
                    if e.hash == hash && ops.cmp(&e.value, key) == Ordering::Equal {
                        return Some(&e.value);
                    }
                    // A richer entry would have been displaced by now.
                    if e.distance < dist {
                        return None;
                    }
                }
            }
            if dist >= self.max_probe {
                return None;
            }
            dist += 1;
            idx = (idx + 1) & self.modmask;
        }
    }

    /// `true` if a value equal to `key` is present.
    pub fn contains<O: TblOps<T>>(&self, ops: &O, key: &T) -> bool {
        self.get(ops, key).is_some()
    }

    /// Insert `value`, replacing and returning any existing equal value.
    pub fn insert<O: TblOps<T>>(&mut self, ops: &O, value: T) -> Option<T> {
        if (self.len + 1) * 100 >= self.capacity() * LOAD_PERCENT {
            self.rehash(ops);
        }

        let hash = ops.hash(&value, self.seed);
        self.place(ops, hash, value, true)
    }

    /// Remove and return the value equal to `key`, if present.
    pub fn remove<O: TblOps<T>>(&mut self, ops: &O, key: &T) -> Option<T> {
        let hash = ops.hash(key, self.seed);
        let mut idx = hash & self.modmask;
        let mut dist = 0u32;

        let found = loop {
            match &self.entries[idx as usize] {
                None => return None,
                Some(e) => {
                    if e.hash == hash && ops.cmp(&e.value, key) == Ordering::Equal {
                        break idx;
                    }
                    if e.distance < dist || dist >= self.max_probe {
                        return None;
                    }
                }
            }
            dist += 1;
            idx = (idx + 1) & self.modmask;
        };

        let removed = self.entries[found as usize].take().map(|e| e.value);
        self.len -= 1;

        // Backward-shift entries displaced past the hole.
        let mut hole = found;
        let mut next = (hole + 1) & self.modmask;
        loop {
            match &self.entries[next as usize] {
                Some(e) if e.distance > 0 => {
                    let mut moved = self.entries[next as usize].take().expect("checked above");
                    moved.distance -= 1;
                    self.entries[hole as usize] = Some(moved);
                    hole = next;
                    next = (next + 1) & self.modmask;
                }
                _ => break,
            }
        }

        removed
    }

    /// Iterate over stored values in table order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|s| s.as_ref().map(|e| &e.value))
    }

    /// Consume the table and return its values sorted by the table compare.
    ///
    /// This is the emission path: once a table is sorted it no longer
    /// supports hashed access, which consuming `self` makes impossible to
    /// get wrong.
    pub fn into_sorted<O: TblOps<T>>(self, ops: &O) -> Vec<T> {
        let mut values: Vec<T> = self
            .entries
            .into_iter()
            .flatten()
            .map(|e| e.value)
            .collect();
        values.sort_by(|a, b| ops.cmp(a, b));
        values
    }

    fn place<O: TblOps<T>>(
        &mut self,
        ops: &O,
        hash: u32,
        value: T,
        check_dup: bool,
    ) -> Option<T> {
        let mut idx = hash & self.modmask;
        let mut carry = Entry {
            hash,
            distance: 0,
            value,
        };
        let mut may_match = check_dup;

        loop {
            match &mut self.entries[idx as usize] {
                slot @ None => {
                    self.max_probe = self.max_probe.max(carry.distance);
                    *slot = Some(carry);
                    self.len += 1;
                    return None;
                }
                Some(existing) => {
                    if may_match
                        && existing.hash == carry.hash
                        && ops.cmp(&existing.value, &carry.value) == Ordering::Equal
                    {
                        return Some(std::mem::replace(&mut existing.value, carry.value));
                    }
                    if existing.distance < carry.distance {
                        self.max_probe = self.max_probe.max(carry.distance);
                        std::mem::swap(existing, &mut carry);
                        // The displaced entry cannot be a duplicate of
                        // anything further down its own probe chain.
                        may_match = false;
                    }
                }
            }
            carry.distance += 1;
            idx = (idx + 1) & self.modmask;
        }
    }

    fn rehash<O: TblOps<T>>(&mut self, ops: &O) {
        let new_cap = self.capacity() * 2;
        let old = std::mem::replace(
            &mut self.entries,
            (0..new_cap).map(|_| None).collect(),
        );
        self.modmask = (new_cap - 1) as u32;
        self.len = 0;
        self.max_probe = 0;

        for entry in old.into_iter().flatten() {
            let hash = ops.hash(&entry.value, self.seed);
            self.place(ops, hash, entry.value, false);
        }
    }
}
