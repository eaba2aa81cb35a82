// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Embercache is a cache backend that implements a subset of the memcache
//! ASCII protocol over a sharded, arena-backed storage engine. A single
//! event-loop thread accepts connections, parses pipelined commands, and
//! executes them inline against lock-free storage; pipelining is what makes
//! the throughput, so replies are buffered and flushed once per connection
//! turn.
//!
//! Running the `embercache` binary is the primary way of using it. The
//! [`EmbercacheBuilder`] entry point exists so integration tests can run a
//! full server in-process and shut it down cleanly.

#[macro_use]
extern crate log;

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use config::EmbercacheConfig;

pub mod logger;

mod storage;
mod worker;

pub use logger::Logger;

use worker::Worker;

const THREAD_PREFIX: &str = "ember";

/// Control messages delivered to the event loop between poll cycles.
pub enum Signal {
    Shutdown,
}

/// A structure which represents an embercache instance which is not yet
/// running. Construction binds the listener, so failures surface here
/// rather than on the loop thread.
pub struct EmbercacheBuilder {
    worker: Worker,
}

impl EmbercacheBuilder {
    pub fn new(config: EmbercacheConfig) -> Result<Self, std::io::Error> {
        let config = Arc::new(config);
        let worker = Worker::new(config)?;
        Ok(Self { worker })
    }

    /// Spawn the event loop thread, converting the builder into a running
    /// `Embercache`.
    pub fn spawn(self) -> Embercache {
        let signal_sender = self.worker.signal_sender();
        let mut worker = self.worker;

        let thread = std::thread::Builder::new()
            .name(format!("{}_worker", THREAD_PREFIX))
            .spawn(move || worker.run())
            .unwrap();

        Embercache {
            thread,
            signal_sender,
        }
    }
}

/// A structure which represents a running embercache.
///
/// For a long-running daemon, call `wait()` to block the process until the
/// loop thread terminates. Within tests, call `shutdown()` to terminate the
/// loop and block until it exits.
pub struct Embercache {
    thread: JoinHandle<()>,
    signal_sender: Sender<Signal>,
}

impl Embercache {
    /// Attempts to gracefully shutdown by signalling the event loop, then
    /// waits for the thread to exit.
    pub fn shutdown(self) {
        if self.signal_sender.send(Signal::Shutdown).is_err() {
            error!("error sending shutdown signal to event loop");
        }
        self.wait()
    }

    /// Will block until the event loop terminates. This should be used to
    /// keep the process alive while the loop runs.
    pub fn wait(self) {
        let _ = self.thread.join();
    }
}
