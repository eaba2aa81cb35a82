// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A builder for configuring a new [`Ember`] instance.

use parking_lot::RwLock;

use crate::shard::Shard;
use crate::{Ember, MIN_SHARD_ARENA, SHARDS};

/// A builder that is used to construct a new [`Ember`] instance.
pub struct Builder {
    heap_size: usize,
    hash_power: u8,
    prefault: bool,
}

// Defines the default parameters
impl Default for Builder {
    fn default() -> Self {
        Self {
            heap_size: 64 * 1024 * 1024,
            hash_power: 14,
            prefault: true,
        }
    }
}

impl Builder {
    /// Specify the total number of bytes to be used for value and key
    /// storage across all shards. Each shard receives an equal split, with a
    /// floor of 1 MiB per shard.
    ///
    /// ```
    /// use ember::Ember;
    ///
    /// const MB: usize = 1024 * 1024;
    ///
    /// // create a cache with a 256MB heap
    /// let cache = Ember::builder().heap_size(256 * MB).build();
    /// ```
    pub fn heap_size(mut self, bytes: usize) -> Self {
        self.heap_size = bytes;
        self
    }

    /// Specify the hash power, which sets each shard's initial index
    /// capacity to 2^N slots. The index grows incrementally beyond this, so
    /// the power only decides how long the store runs before the first
    /// resize.
    ///
    /// ```
    /// use ember::Ember;
    ///
    /// // a small initial index, useful for tests that exercise growth
    /// let cache = Ember::builder().hash_power(4).build();
    /// ```
    pub fn hash_power(mut self, hash_power: u8) -> Self {
        assert!(hash_power >= 3, "hash power must be at least 3");
        assert!(hash_power <= 28, "hash power must be at most 28");
        self.hash_power = hash_power;
        self
    }

    /// Specify whether shard arenas are made resident at build time.
    /// Prefaulting removes first-touch faults from the steady-state path at
    /// the cost of slower startup.
    pub fn prefault(mut self, prefault: bool) -> Self {
        self.prefault = prefault;
        self
    }

    /// Consumes the builder and returns a fully-allocated `Ember` instance.
    pub fn build(self) -> Ember {
        let per_shard = (self.heap_size / SHARDS).max(MIN_SHARD_ARENA);
        let capacity = 1usize << self.hash_power;

        let shards = (0..SHARDS)
            .map(|_| RwLock::new(Shard::new(per_shard, capacity, self.prefault)))
            .collect();

        Ember::from_shards(shards, self.heap_size)
    }
}
