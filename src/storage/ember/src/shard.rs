// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! An independent partition of the key space. A shard owns its arena, its
//! free lists, its entry pool, and its hash index, and shares nothing with
//! other shards. All mutation happens behind the owning store's per-shard
//! write lock (or exclusive borrow on the nolock path).

use core::sync::atomic::{AtomicU64, Ordering};

use crate::arena::Arena;
use crate::hash::fnv1a_64;
use crate::hashtable::{Locate, Slot, Table};
use crate::slab::FreeLists;
use crate::time::unix_now;
use crate::{EmberError, Stats, MIGRATE_BATCH};

const LOAD_FACTOR_NUM: u64 = 7;
const LOAD_FACTOR_DEN: u64 = 10;

/// Time-to-live for a stored entry.
///
/// Zero means the entry never expires. Negative values mean the entry is
/// already expired when stored: a subsequent lookup reports a miss. This is
/// how negative `exptime` values on the wire are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ttl {
    inner: i32,
}

impl Ttl {
    /// The entry never expires.
    pub fn none() -> Self {
        Self { inner: 0 }
    }

    /// The entry expires `seconds` from now.
    pub fn seconds(seconds: u32) -> Self {
        Self {
            inner: seconds.min(i32::MAX as u32) as i32,
        }
    }

    /// The entry is expired on arrival.
    pub fn expired() -> Self {
        Self { inner: -1 }
    }

    /// Absolute expiration in unix seconds; zero means never.
    fn expire_at(self, now: u32) -> u32 {
        match self.inner {
            0 => 0,
            // storing `now` makes `expire <= now` hold immediately
            i32::MIN..=-1 => now,
            seconds => now.saturating_add(seconds as u32),
        }
    }
}

/// One live (or logically deleted) record. The key and value bytes live in
/// the shard arena; the entry holds offsets. Entries are never removed from
/// the pool, only their value slots are recycled.
pub(crate) struct Entry {
    key_offset: usize,
    key_len: u32,
    value_offset: usize,
    value_len: u32,
    expire: u32,
    deleted: bool,
    value_class: u8,
}

impl Entry {
    fn is_expired(&self, now: u32) -> bool {
        self.expire != 0 && self.expire <= now
    }

    fn is_live(&self, now: u32) -> bool {
        !self.deleted && !self.is_expired(now)
    }
}

pub(crate) struct Shard {
    arena: Arena,
    freelists: FreeLists,
    entries: Vec<Entry>,

    table: Table,

    // incremental resize state
    new_table: Option<Table>,
    migrate_pos: usize,

    // live entry count; approximate while expired entries linger
    count: usize,

    // lookup counters; atomic because lookups run under the read lock
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Shard {
    pub fn new(arena_size: usize, initial_capacity: usize, prefault: bool) -> Self {
        let mut arena = Arena::create(arena_size, prefault);
        let mut freelists = FreeLists::new();
        freelists.prewarm(&mut arena);

        Self {
            arena,
            freelists,
            entries: Vec::with_capacity(1024),
            table: Table::new(initial_capacity),
            new_table: None,
            migrate_pos: 0,
            count: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key_matches(&self, entry: u32, key: &[u8]) -> bool {
        let e = &self.entries[entry as usize];
        e.key_len as usize == key.len() && self.arena.slice(e.key_offset, key.len()) == key
    }

    /// Store a value, replacing any previous value for the key. Runs one
    /// migration batch when an index resize is in progress.
    pub fn set(
        &mut self,
        hash: u64,
        key: &[u8],
        value: &[u8],
        ttl: Ttl,
    ) -> Result<(), EmberError> {
        self.maybe_grow();

        // an existing entry is updated in place wherever it was matched; the
        // migration loop transports old-table entries when their turn comes
        let located = self.locate_either(hash, key);
        if let Some(((in_new, index), entry)) = located {
            self.update_entry(entry, value, ttl)?;

            // an old-table match at an already-scanned slot was skipped by
            // the migration loop (deleted or expired at scan time, then
            // revived here); it must be linked into the new table or the
            // table swap would orphan it
            if !in_new && index < self.migrate_pos {
                if let Some(new_table) = &mut self.new_table {
                    new_table.insert_new(hash, entry);
                }
            }
            return Ok(());
        }

        let now = unix_now();
        let expire = ttl.expire_at(now);

        // copy the key to the bump cursor and the value to a slab block;
        // allocate both before touching any index state so failure leaves
        // the shard unchanged
        let key_offset = self.arena.alloc(key.len()).ok_or(EmberError::OutOfMemory)?;
        self.arena
            .slice_mut(key_offset, key.len())
            .copy_from_slice(key);

        let (value_offset, value_class) = self
            .freelists
            .alloc(&mut self.arena, value.len())
            .ok_or(EmberError::OutOfMemory)?;
        self.arena
            .slice_mut(value_offset, value.len())
            .copy_from_slice(value);

        let entry = self.entries.len() as u32;
        self.entries.push(Entry {
            key_offset,
            key_len: key.len() as u32,
            value_offset,
            value_len: value.len() as u32,
            expire,
            deleted: false,
            value_class,
        });

        // inserts always target the newest table
        let target = self.new_table.as_mut().unwrap_or(&mut self.table);
        match target.locate(hash, |_| false) {
            Locate::Miss { insert } => target.insert(insert, entry),
            Locate::Hit { .. } => unreachable!("locate with no key match cannot hit"),
        }
        self.count += 1;
        Ok(())
    }

    fn update_entry(&mut self, entry: u32, value: &[u8], ttl: Ttl) -> Result<(), EmberError> {
        // allocate the replacement before releasing the old slot so an
        // allocation failure leaves the previous value intact
        let (value_offset, value_class) = self
            .freelists
            .alloc(&mut self.arena, value.len())
            .ok_or(EmberError::OutOfMemory)?;
        self.arena
            .slice_mut(value_offset, value.len())
            .copy_from_slice(value);

        let now = unix_now();
        let e = &mut self.entries[entry as usize];
        let old_offset = e.value_offset;
        let old_class = e.value_class;

        e.value_offset = value_offset;
        e.value_len = value.len() as u32;
        e.value_class = value_class;
        e.deleted = false;
        e.expire = ttl.expire_at(now);

        self.freelists.free(&mut self.arena, old_offset, old_class);
        Ok(())
    }

    /// Copy the value for `key` into `dst`, returning the value length.
    ///
    /// Lookups run under the read lock and must not mutate index state, so
    /// no migration work happens here; `set` and `delete` carry the resize
    /// forward.
    pub fn get_into(&self, hash: u64, key: &[u8], dst: &mut [u8]) -> Result<usize, EmberError> {
        let now = unix_now();

        let located = self.locate_either(hash, key);
        let entry = match located {
            Some((_, entry)) if self.entries[entry as usize].is_live(now) => entry,
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Err(EmberError::NotFound);
            }
        };

        self.hits.fetch_add(1, Ordering::Relaxed);

        let e = &self.entries[entry as usize];
        let len = e.value_len as usize;
        if len > dst.len() {
            return Err(EmberError::BufferTooSmall { required: len });
        }
        dst[..len].copy_from_slice(self.arena.slice(e.value_offset, len));
        Ok(len)
    }

    /// Remove the entry for `key`. The value slot is recycled immediately;
    /// the entry itself stays in the pool behind a tombstone.
    pub fn delete(&mut self, hash: u64, key: &[u8]) -> Result<(), EmberError> {
        if self.new_table.is_some() {
            self.migrate_batch();
        }

        let now = unix_now();
        let located = match self.locate_either(hash, key) {
            Some((slot, entry)) if self.entries[entry as usize].is_live(now) => (slot, entry),
            _ => return Err(EmberError::NotFound),
        };
        let (slot, entry) = located;

        let (in_new, index) = slot;
        let e = &mut self.entries[entry as usize];
        let value_offset = e.value_offset;
        let value_class = e.value_class;
        e.deleted = true;

        self.freelists.free(&mut self.arena, value_offset, value_class);

        if in_new {
            self.new_table
                .as_mut()
                .expect("matched in a table that no longer exists")
                .set_tomb(index);
        } else {
            self.table.set_tomb(index);
        }
        self.count = self.count.saturating_sub(1);
        Ok(())
    }

    /// Reset the shard to empty: index cleared, arena cursor rewound, free
    /// lists wiped and re-warmed. No per-entry teardown is needed because
    /// nothing outside the arena owns memory.
    pub fn flush(&mut self) {
        self.table.clear();
        self.new_table = None;
        self.migrate_pos = 0;
        self.entries.clear();
        self.arena.reset();
        self.freelists.clear();
        self.freelists.prewarm(&mut self.arena);
        self.count = 0;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn accumulate(&self, stats: &mut Stats) {
        stats.curr_items += self.count;
        stats.bytes += self.arena.used();
        stats.get_hits += self.hits.load(Ordering::Relaxed);
        stats.get_misses += self.misses.load(Ordering::Relaxed);
        if self.new_table.is_some() {
            stats.resizing_shards += 1;
        }
    }

    /// Search the new table first (newly-inserted keys live only there),
    /// then the old. Returns the matched ((in_new, slot_index), entry).
    /// Matches are reported even for deleted or expired entries.
    fn locate_either(&self, hash: u64, key: &[u8]) -> Option<((bool, usize), u32)> {
        if let Some(new_table) = &self.new_table {
            if let Locate::Hit { slot, entry } =
                new_table.locate(hash, |e| self.key_matches(e, key))
            {
                return Some(((true, slot), entry));
            }
        }
        if let Locate::Hit { slot, entry } = self.table.locate(hash, |e| self.key_matches(e, key))
        {
            return Some(((false, slot), entry));
        }
        None
    }

    /// Carry an in-progress resize forward, or start one when the load
    /// factor threshold would be crossed.
    fn maybe_grow(&mut self) {
        if self.new_table.is_some() {
            self.migrate_batch();
            return;
        }

        let capacity = self.table.capacity() as u64;
        if u64::from(self.table.used()) + 1 > capacity * LOAD_FACTOR_NUM / LOAD_FACTOR_DEN {
            debug!(
                "index grow: {} slots -> {} slots",
                capacity,
                capacity * 2
            );
            self.new_table = Some(Table::new(self.table.capacity() * 2));
            self.migrate_pos = 0;
            self.migrate_batch();
        }
    }

    /// Move up to `MIGRATE_BATCH` live entries from the old table into the
    /// new one. When the scan completes the new table becomes current and
    /// the live count is reconciled by walking it.
    fn migrate_batch(&mut self) {
        let new_table = match &mut self.new_table {
            Some(t) => t,
            None => return,
        };

        let now = unix_now();
        let mut migrated = 0;

        while self.migrate_pos < self.table.capacity() && migrated < MIGRATE_BATCH {
            let slot = self.table.slot(self.migrate_pos);
            self.migrate_pos += 1;

            let entry = match slot {
                Slot::Live(entry) => entry,
                _ => continue,
            };
            let e = &self.entries[entry as usize];
            if !e.is_live(now) {
                continue;
            }

            let key = self.arena.slice(e.key_offset, e.key_len as usize);
            new_table.insert_new(fnv1a_64(key), entry);
            migrated += 1;
        }

        if self.migrate_pos >= self.table.capacity() {
            self.table = self.new_table.take().expect("resize state vanished");
            self.migrate_pos = 0;

            // reconcile the live count against what actually moved
            let mut live = 0;
            for index in 0..self.table.capacity() {
                if let Slot::Live(entry) = self.table.slot(index) {
                    if !self.entries[entry as usize].deleted {
                        live += 1;
                    }
                }
            }
            self.count = live;
        }
    }
}
