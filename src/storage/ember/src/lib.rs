// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! This crate is a sharded in-memory key-value store designed for a
//! single-digit-microsecond hot path.
//!
//! Keys are dispatched to a fixed set of independent shards. Each shard owns
//! a pre-touched arena, a size-classed slab allocator for values, and an
//! open-addressed hash index which grows incrementally so that no single
//! store operation pays for a full rehash.
//!
//! Goals:
//! * high-throughput item storage with no steady-state heap calls
//! * incremental index growth, no stop-the-world rehash spike
//! * a locked API for multi-threaded embedders and a lock-free API for
//!   single-threaded event loops
//!
//! Non-goals:
//! * durability, the store is empty after restart
//! * eviction, writes fail cleanly when a shard's arena is exhausted

#[macro_use]
extern crate log;

use parking_lot::RwLock;

mod arena;
mod builder;
mod error;
mod hash;
mod hashtable;
mod shard;
mod slab;
mod time;

#[cfg(test)]
mod tests;

pub use builder::Builder;
pub use error::EmberError;
pub use shard::Ttl;

pub(crate) use hash::fnv1a_64;
pub(crate) use shard::Shard;

/// The number of shards. Must be a power of two so that shard dispatch is a
/// bitmask of the key hash.
pub const SHARDS: usize = 64;

/// Longest permitted key, in bytes.
pub const MAX_KEY_LEN: usize = 250;

/// Smallest arena a shard will be created with.
pub(crate) const MIN_SHARD_ARENA: usize = 1024 * 1024;

/// Live entries migrated from the old index to the new one per mutating
/// operation while a resize is in progress.
pub(crate) const MIGRATE_BATCH: usize = 16;

/// Aggregated statistics across all shards.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    /// approximate number of live items
    pub curr_items: usize,
    /// arena bytes consumed across all shards
    pub bytes: usize,
    /// the configured total pool size
    pub pool_size: usize,
    /// lookups which found a live item
    pub get_hits: u64,
    /// lookups which found nothing live
    pub get_misses: u64,
    /// shards with an index resize in progress
    pub resizing_shards: usize,
}

/// A pre-allocated sharded key-value store. Construct one through the
/// [`Builder`].
///
/// Two parallel APIs are exposed. The default methods take `&self` and
/// serialize access per shard through a reader-writer lock. The `_nolock`
/// variants take `&mut self` and bypass the locks entirely, which is the
/// fast path for a single-threaded event loop that owns the store.
///
/// ```
/// use ember::{Ember, Ttl};
///
/// const MB: usize = 1024 * 1024;
///
/// let cache = Ember::builder().heap_size(64 * MB).build();
/// assert!(cache.get(b"coffee").is_err());
///
/// cache.set(b"coffee", b"strong", Ttl::none()).unwrap();
/// assert_eq!(cache.get(b"coffee").unwrap(), b"strong");
/// ```
pub struct Ember {
    shards: Box<[RwLock<Shard>]>,
    pool_size: usize,
}

impl Ember {
    /// Returns a new `Builder` which is used to configure and construct an
    /// `Ember` instance.
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn from_shards(shards: Vec<RwLock<Shard>>, pool_size: usize) -> Self {
        Self {
            shards: shards.into_boxed_slice(),
            pool_size,
        }
    }

    /// The version of this storage library.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn check_key(key: &[u8]) -> Result<(), EmberError> {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(EmberError::InvalidKey);
        }
        Ok(())
    }

    fn shard_id(hash: u64) -> usize {
        (hash & (SHARDS as u64 - 1)) as usize
    }

    /// Store a value under the given key, replacing any previous value. The
    /// old value slot is recycled through the shard's free lists.
    pub fn set(&self, key: &[u8], value: &[u8], ttl: Ttl) -> Result<(), EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        let mut shard = self.shards[Self::shard_id(hash)].write();
        shard.set(hash, key, value, ttl)
    }

    /// Retrieve a copy of the value stored under the given key.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        let shard = &self.shards[Self::shard_id(hash)];

        let mut buf = vec![0; 8192];
        let result = shard.read().get_into(hash, key, &mut buf);
        match result {
            Ok(len) => {
                buf.truncate(len);
                Ok(buf)
            }
            Err(EmberError::BufferTooSmall { required }) => {
                // the value outgrew the fast-path buffer, size exactly and
                // retry under a fresh read lock
                buf.resize(required, 0);
                let len = shard.read().get_into(hash, key, &mut buf)?;
                buf.truncate(len);
                Ok(buf)
            }
            Err(e) => Err(e),
        }
    }

    /// Copy the value stored under the given key into a caller-supplied
    /// buffer, returning the value length. If the buffer is too small the
    /// required length is reported and the buffer contents are untouched.
    pub fn get_into(&self, key: &[u8], dst: &mut [u8]) -> Result<usize, EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        let shard = self.shards[Self::shard_id(hash)].read();
        shard.get_into(hash, key, dst)
    }

    /// Remove the entry stored under the given key.
    pub fn delete(&self, key: &[u8]) -> Result<(), EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        let mut shard = self.shards[Self::shard_id(hash)].write();
        shard.delete(hash, key)
    }

    /// Drop every entry in the store. This is a sequence of per-shard
    /// flushes, not a global snapshot: operations on other threads may
    /// interleave between shards.
    pub fn flush(&self) {
        for shard in self.shards.iter() {
            shard.write().flush();
        }
    }

    /// Aggregate statistics across all shards.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            pool_size: self.pool_size,
            ..Default::default()
        };
        for shard in self.shards.iter() {
            let shard = shard.read();
            shard.accumulate(&mut stats);
        }
        stats
    }

    /// Lock-free variant of [`set`](Self::set) for single-threaded owners.
    pub fn set_nolock(&mut self, key: &[u8], value: &[u8], ttl: Ttl) -> Result<(), EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        self.shards[Self::shard_id(hash)]
            .get_mut()
            .set(hash, key, value, ttl)
    }

    /// Lock-free variant of [`get_into`](Self::get_into).
    pub fn get_into_nolock(&mut self, key: &[u8], dst: &mut [u8]) -> Result<usize, EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        self.shards[Self::shard_id(hash)]
            .get_mut()
            .get_into(hash, key, dst)
    }

    /// Lock-free variant of [`delete`](Self::delete).
    pub fn delete_nolock(&mut self, key: &[u8]) -> Result<(), EmberError> {
        Self::check_key(key)?;
        let hash = fnv1a_64(key);
        self.shards[Self::shard_id(hash)].get_mut().delete(hash, key)
    }

    /// Lock-free variant of [`flush`](Self::flush).
    pub fn flush_nolock(&mut self) {
        for shard in self.shards.iter_mut() {
            shard.get_mut().flush();
        }
    }

    /// Lock-free variant of [`stats`](Self::stats).
    pub fn stats_nolock(&mut self) -> Stats {
        let mut stats = Stats {
            pool_size: self.pool_size,
            ..Default::default()
        };
        for shard in self.shards.iter_mut() {
            shard.get_mut().accumulate(&mut stats);
        }
        stats
    }
}
