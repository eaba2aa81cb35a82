// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub use bytes::buf::UninitSlice;
pub use bytes::{Buf, BufMut};

use core::borrow::Borrow;

/// A growable byte buffer over a contiguous range of bytes, with distinct
/// read and write positions.
///
/// Growth is geometric and the buffer never shrinks: a connection that once
/// buffered a large burst keeps that capacity for its lifetime, trading
/// memory for never re-growing on the hot path. Consumed space is reclaimed
/// by rewinding when the buffer drains and by compacting in-place when a
/// write would not otherwise fit.
pub struct Buffer {
    data: Vec<u8>,
    read_offset: usize,
    write_offset: usize,
}

impl Buffer {
    /// Create a new buffer that can hold up to `target_size` bytes without
    /// growing.
    pub fn new(target_size: usize) -> Self {
        let target_size = target_size.next_power_of_two().max(1);
        Self {
            data: vec![0; target_size],
            read_offset: 0,
            write_offset: 0,
        }
    }

    /// Returns the current capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Make room for `amt` additional bytes, compacting first and growing
    /// geometrically only when compaction is not enough.
    pub fn reserve(&mut self, amt: usize) {
        if self.remaining() == 0 {
            self.read_offset = 0;
            self.write_offset = 0;
        }

        if amt <= self.remaining_mut() {
            return;
        }

        // slide pending bytes to the front before considering growth
        if self.read_offset > 0 {
            self.data.copy_within(self.read_offset..self.write_offset, 0);
            self.write_offset -= self.read_offset;
            self.read_offset = 0;
        }

        if amt > self.remaining_mut() {
            let size = (self.write_offset + amt).next_power_of_two();
            self.data.resize(size, 0);
        }
    }

    /// The initialized but unwritten tail, for reading from a stream
    /// directly into the buffer.
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.data[self.write_offset..]
    }

    /// Drop all pending bytes.
    pub fn clear(&mut self) {
        self.read_offset = 0;
        self.write_offset = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

impl Borrow<[u8]> for Buffer {
    fn borrow(&self) -> &[u8] {
        &self.data[self.read_offset..self.write_offset]
    }
}

impl Buf for Buffer {
    fn remaining(&self) -> usize {
        self.write_offset - self.read_offset
    }

    fn chunk(&self) -> &[u8] {
        self.borrow()
    }

    fn advance(&mut self, amt: usize) {
        self.read_offset = std::cmp::min(self.read_offset + amt, self.write_offset);
        if self.read_offset == self.write_offset {
            self.read_offset = 0;
            self.write_offset = 0;
        }
    }
}

unsafe impl BufMut for Buffer {
    fn remaining_mut(&self) -> usize {
        self.data.len() - self.write_offset
    }

    unsafe fn advance_mut(&mut self, amt: usize) {
        self.write_offset = std::cmp::min(self.write_offset + amt, self.data.len());
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        UninitSlice::new(self.unfilled())
    }

    fn put_slice(&mut self, src: &[u8]) {
        self.reserve(src.len());
        self.data[self.write_offset..self.write_offset + src.len()].copy_from_slice(src);
        self.write_offset += src.len();
    }
}
