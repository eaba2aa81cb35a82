// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The event loop. One thread owns the listener, every session, and the
//! storage engine; commands execute inline as they are parsed. Pipelines
//! are answered in strict order, and each connection turn costs one
//! vectored write no matter how many commands it carried.

use std::borrow::Borrow;
use std::io::ErrorKind;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;

use config::EmbercacheConfig;
use protocol_common::{Compose, Execute, Parse};
use protocol_memcache::{ParseError, RequestParser, MAX_LINE_LEN};
use session::Session;

use crate::storage::Storage;
use crate::Signal;

pub const LISTENER_TOKEN: Token = Token(usize::MAX);

pub struct Worker {
    config: Arc<EmbercacheConfig>,
    listener: mio::net::TcpListener,
    poll: Poll,
    sessions: Slab<Session>,
    parser: RequestParser,
    storage: Storage,
    signal_receiver: Receiver<Signal>,
    signal_sender: Sender<Signal>,
}

impl Worker {
    /// Bind the listener and prepare the loop. Binding here, rather than on
    /// the loop thread, lets startup failures surface before any thread is
    /// spawned.
    pub fn new(config: Arc<EmbercacheConfig>) -> Result<Self, std::io::Error> {
        let addr = config.server().socket_addr().map_err(|e| {
            error!("{}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Bad listen address")
        })?;
        let mut listener = mio::net::TcpListener::bind(addr).map_err(|e| {
            error!("{}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Failed to start tcp listener")
        })?;
        let poll = Poll::new().map_err(|e| {
            error!("{}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Failed to create event loop")
        })?;

        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let parser = RequestParser::new()
            .max_value_size(config.ember().max_value_size())
            .max_key_len(ember::MAX_KEY_LEN);

        let storage = Storage::new(&config);

        let (signal_sender, signal_receiver) = crossbeam_channel::bounded(128);

        Ok(Self {
            config,
            listener,
            poll,
            sessions: Slab::new(),
            parser,
            storage,
            signal_receiver,
            signal_sender,
        })
    }

    pub fn signal_sender(&self) -> Sender<Signal> {
        self.signal_sender.clone()
    }

    /// Run the loop: accept, read, parse, execute, flush, repeat.
    pub fn run(&mut self) {
        info!(
            "running server on: {}",
            self.config.server().socket_addr().unwrap()
        );

        let mut events = Events::with_capacity(self.config.server().nevent());
        let timeout = Some(std::time::Duration::from_millis(
            self.config.server().timeout() as u64,
        ));

        loop {
            if self.poll.poll(&mut events, timeout).is_err() {
                error!("error polling");
            }

            for event in events.iter() {
                let token = event.token();

                if token == LISTENER_TOKEN {
                    self.do_accept();
                    continue;
                }

                // handle error events first
                if event.is_error() {
                    self.close(token);
                    continue;
                }

                // handle write events before read events to drain the write
                // buffers ahead of new pipeline output
                if event.is_writable() {
                    self.do_write(token);
                }

                if event.is_readable() {
                    self.do_read(token);
                }
            }

            // poll queue to receive new signals
            #[allow(clippy::never_loop)]
            while let Ok(signal) = self.signal_receiver.try_recv() {
                match signal {
                    Signal::Shutdown => {
                        return;
                    }
                }
            }
        }
    }

    /// Repeatedly call accept on the listener
    fn do_accept(&mut self) {
        while let Ok((stream, addr)) = self.listener.accept() {
            // disable Nagle's algorithm, pipelined replies must not wait
            let _ = stream.set_nodelay(true);

            let session = Session::new(
                stream,
                self.config.buf().read_buffer_size(),
                self.config.buf().write_buffer_size(),
            );
            trace!("accepted new session: {}", addr);

            let entry = self.sessions.vacant_entry();
            let token = Token(entry.key());
            let session = entry.insert(session);
            let interest = session.interest();
            if self
                .poll
                .registry()
                .register(session, token, interest)
                .is_err()
            {
                error!("error registering new session");
                self.sessions.remove(token.0);
            }
        }
    }

    fn do_read(&mut self, token: Token) {
        let session = match self.sessions.get_mut(token.0) {
            Some(session) => session,
            None => {
                trace!("attempted to read non-existent session: {}", token.0);
                return;
            }
        };

        match session.fill() {
            Ok(0) => {
                // the peer closed the connection
                self.close(token);
            }
            Ok(_) => {
                self.handle_data(token);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                // spurious wakeup
            }
            Err(_) => {
                self.close(token);
            }
        }
    }

    fn do_write(&mut self, token: Token) {
        let session = match self.sessions.get_mut(token.0) {
            Some(session) => session,
            None => {
                trace!("attempted to write non-existent session: {}", token.0);
                return;
            }
        };

        match session.flush() {
            Ok(_) => self.reregister(token),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => {
                self.close(token);
            }
        }
    }

    /// Parse and execute every complete command buffered on the session,
    /// then flush once. Client faults resynchronize at the next line
    /// boundary and leave the connection open.
    fn handle_data(&mut self, token: Token) {
        let flush_threshold = self.config.buf().flush_threshold();

        loop {
            let session = match self.sessions.get_mut(token.0) {
                Some(session) => session,
                None => return,
            };

            let buffer: &[u8] = (&*session).borrow();
            if buffer.is_empty() {
                break;
            }

            // the first CRLF bounds the current command line; a line over
            // the cap is consumed whole and answered as a fault
            let line_end = find_crlf(buffer);
            match line_end {
                Some(end) if end > MAX_LINE_LEN => {
                    session.consume(end + 2);
                    let response =
                        protocol_memcache::Response::client_error("bad command line format");
                    response.compose(session);
                    continue;
                }
                None => {
                    // no complete line yet; wait for more bytes
                    break;
                }
                _ => {}
            }

            match self.parser.parse(buffer) {
                Ok(parsed) => {
                    let consumed = parsed.consumed();
                    let request = parsed.into_inner();
                    session.consume(consumed);

                    let response = self.storage.execute(&request);

                    let session = match self.sessions.get_mut(token.0) {
                        Some(session) => session,
                        None => return,
                    };
                    response.compose(session);

                    if response.should_hangup() {
                        let _ = session.flush();
                        self.close(token);
                        return;
                    }

                    // a long pipeline flushes mid-stream instead of growing
                    // the output buffers without bound
                    if session.write_pending() >= flush_threshold {
                        match session.flush() {
                            Ok(_) => {}
                            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                            Err(_) => {
                                self.close(token);
                                return;
                            }
                        }
                    }
                }
                Err(ParseError::Incomplete) => {
                    break;
                }
                Err(e) => {
                    // consume through the offending line and reply, keeping
                    // the connection open
                    let end = line_end.expect("faults are only raised on complete lines");
                    session.consume(end + 2);

                    let response = match e {
                        ParseError::BadCommandLine => {
                            protocol_memcache::Response::client_error("bad command line format")
                        }
                        ParseError::BadCommand => {
                            protocol_memcache::Response::client_error("bad command")
                        }
                        ParseError::BadDataChunk => {
                            protocol_memcache::Response::client_error("bad data chunk")
                        }
                        ParseError::UnknownCommand => protocol_memcache::Response::error(),
                        ParseError::Incomplete => unreachable!(),
                    };
                    response.compose(session);
                }
            }
        }

        // one flush per connection turn covers the whole pipeline
        if let Some(session) = self.sessions.get_mut(token.0) {
            if session.write_pending() > 0 {
                match session.flush() {
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(_) => {
                        self.close(token);
                        return;
                    }
                }
            }
            self.reregister(token);
        }
    }

    /// Reregister the session to track its current write interest.
    fn reregister(&mut self, token: Token) {
        if let Some(session) = self.sessions.get_mut(token.0) {
            let interest = session.interest();
            if self
                .poll
                .registry()
                .reregister(session, token, interest)
                .is_err()
            {
                error!("failed to reregister session");
                self.close(token);
            }
        }
    }

    fn close(&mut self, token: Token) {
        if self.sessions.contains(token.0) {
            let mut session = self.sessions.remove(token.0);
            let _ = self.poll.registry().deregister(&mut session);
            session.close();
        }
    }
}

// position of the first CRLF, if any
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
}
