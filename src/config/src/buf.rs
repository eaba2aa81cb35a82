// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

const KB: usize = 1024;

// constants to define default values
const BUF_READ_BUFFER_SIZE: usize = 64 * KB;
const BUF_WRITE_BUFFER_SIZE: usize = 512 * KB;
const BUF_FLUSH_THRESHOLD: usize = 256 * KB;

// helper functions
fn read_buffer_size() -> usize {
    BUF_READ_BUFFER_SIZE
}

fn write_buffer_size() -> usize {
    BUF_WRITE_BUFFER_SIZE
}

fn flush_threshold() -> usize {
    BUF_FLUSH_THRESHOLD
}

// definitions
#[derive(Serialize, Deserialize, Debug)]
pub struct Buf {
    #[serde(default = "read_buffer_size")]
    read_buffer_size: usize,
    #[serde(default = "write_buffer_size")]
    write_buffer_size: usize,
    #[serde(default = "flush_threshold")]
    flush_threshold: usize,
}

// implementation
impl Buf {
    /// Initial size of each connection's input buffer
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Initial size of each of a connection's two output buffers
    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    /// Buffered output bytes which trigger a mid-pipeline flush
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }
}

// trait implementations
impl Default for Buf {
    fn default() -> Self {
        Self {
            read_buffer_size: read_buffer_size(),
            write_buffer_size: write_buffer_size(),
            flush_threshold: flush_threshold(),
        }
    }
}
