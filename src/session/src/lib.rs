// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Buffered bi-directional communication on top of a TCP stream.
//!
//! The read side fills one growable buffer directly from the socket. The
//! write side is double-buffered: responses accumulate in an active buffer
//! until a flush hands it to the socket as one vectored write; bytes that
//! arrive while the active buffer still has an unsent tail land in the
//! standby buffer, which the same vectored write picks up. At most one
//! write per flush reaches the kernel regardless of how many responses a
//! pipeline produced.

#[macro_use]
extern crate log;

mod buffer;

pub use buffer::*;

use core::borrow::Borrow;
use std::io::{Error, ErrorKind, IoSlice, Read, Result, Write};

use mio::event;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

// The size of one kilobyte, in bytes
const KB: usize = 1024;

// If the read buffer has less than this amount available before a read, we
// will grow the read buffer. One page.
const BUFFER_MIN_FREE: usize = 8 * KB;

// The target size of read operations from the stream.
const TARGET_READ_SIZE: usize = 64 * KB;

/// A `Session` is an underlying TCP stream with its read buffer and its
/// pair of write buffers.
pub struct Session {
    stream: TcpStream,
    read_buffer: Buffer,
    write_buffer: [Buffer; 2],
    active: usize,
    // set when a flush left unsent bytes in the active buffer; appends then
    // land in the standby buffer until the active side drains
    writing: bool,
}

impl Session {
    /// Construct a new `Session` over a stream, with the given initial
    /// buffer sizes. Both write buffers are sized equally.
    pub fn new(stream: TcpStream, read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self {
            stream,
            read_buffer: Buffer::new(read_buffer_size),
            write_buffer: [
                Buffer::new(write_buffer_size),
                Buffer::new(write_buffer_size),
            ],
            active: 0,
            writing: false,
        }
    }

    /// Return the event `Interest`s for the `Session`.
    pub fn interest(&self) -> Interest {
        if self.write_pending() > 0 {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    /// Fill the read buffer by calling read on the underlying stream until
    /// read would block. Returns the number of bytes read. `Ok(0)` indicates
    /// that the remote side has closed the stream.
    pub fn fill(&mut self) -> Result<usize> {
        let mut read = 0;

        loop {
            if self.read_buffer.remaining_mut() < BUFFER_MIN_FREE {
                self.read_buffer.reserve(TARGET_READ_SIZE);
            }

            match self.stream.read(self.read_buffer.unfilled()) {
                Ok(0) => {
                    // the underlying stream is closed, the caller must be
                    // notified even if earlier reads made progress
                    return Ok(0);
                }
                Ok(n) => {
                    unsafe {
                        self.read_buffer.advance_mut(n);
                    }
                    read += n;
                }
                Err(e) => match e.kind() {
                    ErrorKind::WouldBlock => {
                        if read == 0 {
                            return Err(e);
                        } else {
                            return Ok(read);
                        }
                    }
                    ErrorKind::Interrupted => {}
                    _ => {
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Mark `amt` bytes as consumed from the read buffer.
    pub fn consume(&mut self, amt: usize) {
        self.read_buffer.advance(amt)
    }

    /// Bytes buffered on the read side, waiting to be parsed.
    pub fn read_pending(&self) -> usize {
        self.read_buffer.remaining()
    }

    /// Bytes buffered on the write side, waiting to reach the socket.
    pub fn write_pending(&self) -> usize {
        self.write_buffer[0].remaining() + self.write_buffer[1].remaining()
    }

    /// Attempt to drain the write buffers to the stream. Each pass issues a
    /// single vectored write covering the active buffer's unsent tail and
    /// any bytes that accumulated in the standby buffer.
    pub fn flush(&mut self) -> Result<usize> {
        let mut flushed = 0;

        loop {
            if self.write_buffer[self.active].is_empty() {
                if self.write_buffer[1 - self.active].is_empty() {
                    break;
                }
                // the active buffer drained; the standby becomes active
                self.active = 1 - self.active;
            }

            let active = self.write_buffer[self.active].chunk();
            let standby = self.write_buffer[1 - self.active].chunk();
            let iovs = [IoSlice::new(active), IoSlice::new(standby)];
            let count = if standby.is_empty() { 1 } else { 2 };

            match self.stream.write_vectored(&iovs[..count]) {
                Ok(0) => {
                    return Err(Error::new(ErrorKind::WriteZero, "wrote zero bytes"));
                }
                Ok(amt) => {
                    let first = amt.min(self.write_buffer[self.active].remaining());
                    self.write_buffer[self.active].advance(first);
                    if amt > first {
                        self.write_buffer[1 - self.active].advance(amt - first);
                    }
                    flushed += amt;
                }
                Err(e) => match e.kind() {
                    ErrorKind::WouldBlock => {
                        if flushed == 0 {
                            self.writing = self.write_pending() > 0;
                            return Err(e);
                        }
                        break;
                    }
                    ErrorKind::Interrupted => {}
                    _ => {
                        return Err(e);
                    }
                },
            }
        }

        self.writing = self.write_pending() > 0;
        Ok(flushed)
    }

    /// Shut the stream down. Buffered output that has not reached the
    /// socket is dropped with the session.
    pub fn close(&mut self) {
        trace!("closing session");
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    fn append_buffer(&mut self) -> &mut Buffer {
        // a write in flight pins the active buffer; new bytes accumulate in
        // the standby buffer until the flush drains and swaps
        let index = if self.writing {
            1 - self.active
        } else {
            self.active
        };
        &mut self.write_buffer[index]
    }
}

impl Borrow<[u8]> for Session {
    fn borrow(&self) -> &[u8] {
        self.read_buffer.borrow()
    }
}

impl Buf for Session {
    fn remaining(&self) -> usize {
        self.read_buffer.remaining()
    }

    fn chunk(&self) -> &[u8] {
        self.read_buffer.chunk()
    }

    fn advance(&mut self, amt: usize) {
        self.read_buffer.advance(amt)
    }
}

unsafe impl BufMut for Session {
    fn remaining_mut(&self) -> usize {
        if self.writing {
            self.write_buffer[1 - self.active].remaining_mut()
        } else {
            self.write_buffer[self.active].remaining_mut()
        }
    }

    unsafe fn advance_mut(&mut self, amt: usize) {
        self.append_buffer().advance_mut(amt)
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        self.append_buffer().chunk_mut()
    }

    fn put_slice(&mut self, src: &[u8]) {
        self.append_buffer().put_slice(src)
    }
}

impl event::Source for Session {
    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        self.stream.register(registry, token, interest)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        self.stream.reregister(registry, token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> Result<()> {
        self.stream.deregister(registry)
    }
}
