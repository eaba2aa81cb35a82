// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

const MB: usize = 1024 * 1024;

// constants to define default values
const EMBER_HEAP_SIZE: usize = 64 * MB;
const EMBER_HASH_POWER: u8 = 14;
const EMBER_MAX_VALUE_SIZE: usize = MB;

// helper functions
fn heap_size() -> usize {
    EMBER_HEAP_SIZE
}

fn hash_power() -> u8 {
    EMBER_HASH_POWER
}

fn max_value_size() -> usize {
    EMBER_MAX_VALUE_SIZE
}

// definitions
#[derive(Serialize, Deserialize, Debug)]
pub struct Ember {
    #[serde(default = "heap_size")]
    heap_size: usize,
    #[serde(default = "hash_power")]
    hash_power: u8,
    #[serde(default = "max_value_size")]
    max_value_size: usize,
}

// implementation
impl Ember {
    /// Total bytes of key and value storage, split evenly across shards
    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    pub fn set_heap_size(&mut self, bytes: usize) {
        self.heap_size = bytes;
    }

    /// Initial per-shard index capacity as a power of two
    pub fn hash_power(&self) -> u8 {
        self.hash_power
    }

    /// Largest value accepted on the wire
    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

// trait implementations
impl Default for Ember {
    fn default() -> Self {
        Self {
            heap_size: heap_size(),
            hash_power: hash_power(),
            max_value_size: max_value_size(),
        }
    }
}
