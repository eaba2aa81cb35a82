// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The open-addressed hash index used by each shard.
//!
//! Slots hold a tagged state rather than raw pointers: `Empty`, a tombstone
//! preserving probe-chain continuity past a deleted entry, or a reference
//! into the shard's entry pool. Tables are sized as a power of two so that
//! indexing is a bitmask, and a lookup stops only on an empty slot.

/// One slot of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Empty,
    Tomb,
    Live(u32),
}

/// The outcome of probing a table for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Locate {
    /// The key is present: slot index and entry pool index.
    Hit { slot: usize, entry: u32 },
    /// The key is absent: the slot an insert should use. The first
    /// tombstone on the probe path is preferred, keeping chains short.
    Miss { insert: usize },
}

pub(crate) struct Table {
    slots: Box<[Slot]>,
    mask: u64,
    used: u32,
}

impl Table {
    /// Creates a table with `capacity` slots. Initialization writes every
    /// slot, which also makes the allocation resident up front.
    pub fn new(capacity: usize) -> Table {
        assert!(capacity.is_power_of_two(), "index capacity must be a power of two");
        Self {
            slots: vec![Slot::Empty; capacity].into_boxed_slice(),
            mask: capacity as u64 - 1,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied plus tombstoned slots.
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn slot(&self, index: usize) -> Slot {
        self.slots[index]
    }

    fn index(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    /// Probe for a key. `key_matches` is given the entry pool index held in
    /// a live slot. A match is reported even for deleted or expired entries;
    /// the caller decides how to treat those. The probe is bounded by the
    /// table capacity so an over-full table degrades to a miss instead of
    /// spinning.
    pub fn locate<F: Fn(u32) -> bool>(&self, hash: u64, key_matches: F) -> Locate {
        let mut index = self.index(hash);
        let mut first_tomb = None;

        for _ in 0..self.slots.len() {
            match self.slots[index] {
                Slot::Empty => {
                    return Locate::Miss {
                        insert: first_tomb.unwrap_or(index),
                    };
                }
                Slot::Tomb => {
                    if first_tomb.is_none() {
                        first_tomb = Some(index);
                    }
                }
                Slot::Live(entry) => {
                    if key_matches(entry) {
                        return Locate::Hit { slot: index, entry };
                    }
                }
            }
            index = (index + 1) & self.mask as usize;
        }

        Locate::Miss {
            insert: first_tomb.unwrap_or_else(|| self.index(hash)),
        }
    }

    /// Fill the slot chosen by a prior `locate` miss. Upgrading a tombstone
    /// does not change `used`; filling an empty slot does.
    pub fn insert(&mut self, index: usize, entry: u32) {
        if self.slots[index] == Slot::Empty {
            self.used += 1;
        }
        self.slots[index] = Slot::Live(entry);
    }

    /// Insert during migration: the key is known absent, so probe for the
    /// first non-live slot without key comparisons.
    pub fn insert_new(&mut self, hash: u64, entry: u32) {
        let mut index = self.index(hash);
        loop {
            match self.slots[index] {
                Slot::Empty => {
                    self.used += 1;
                    self.slots[index] = Slot::Live(entry);
                    return;
                }
                Slot::Tomb => {
                    self.slots[index] = Slot::Live(entry);
                    return;
                }
                Slot::Live(_) => {}
            }
            index = (index + 1) & self.mask as usize;
        }
    }

    /// Replace the slot with a tombstone, keeping probe chains intact.
    pub fn set_tomb(&mut self, index: usize) {
        self.slots[index] = Slot::Tomb;
    }

    /// Reset every slot without releasing the allocation.
    pub fn clear(&mut self) {
        self.slots.fill(Slot::Empty);
        self.used = 0;
    }
}
