// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

mod client_error;
mod server_error;
mod stats;
mod values;

pub use client_error::ClientError;
pub use server_error::ServerError;
pub use stats::Stats;
pub use values::{Value, Values};

/// A server-to-client message. Simple acknowledgements carry no payload and
/// compose their fixed line inline; the data-bearing responses live in their
/// own modules.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    /// `ERROR\r\n`, the reply to an unknown command
    Error,
    ClientError(ClientError),
    ServerError(ServerError),
    /// `STORED\r\n`
    Stored,
    /// `DELETED\r\n`
    Deleted,
    /// `NOT_FOUND\r\n`
    NotFound,
    /// `OK\r\n`, the reply to `flush_all`
    Ok,
    Values(Values),
    Stats(Stats),
    /// composes nothing; the session is closed after any pending output
    Hangup,
}

impl Response {
    pub fn error() -> Self {
        Self::Error
    }

    pub fn client_error<T: ToString>(msg: T) -> Self {
        Self::ClientError(ClientError {
            inner: msg.to_string(),
        })
    }

    pub fn server_error<T: ToString>(msg: T) -> Self {
        Self::ServerError(ServerError {
            inner: msg.to_string(),
        })
    }

    pub fn stored() -> Self {
        Self::Stored
    }

    pub fn deleted() -> Self {
        Self::Deleted
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn ok() -> Self {
        Self::Ok
    }

    pub fn values(values: Vec<Value>) -> Self {
        Self::Values(Values { values })
    }

    pub fn stats(entries: Vec<(String, String)>) -> Self {
        Self::Stats(Stats { entries })
    }

    pub fn hangup() -> Self {
        Self::Hangup
    }
}

impl Compose for Response {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        match self {
            Self::Error => {
                let msg = b"ERROR\r\n";
                session.put_slice(msg);
                msg.len()
            }
            Self::ClientError(e) => e.compose(session),
            Self::ServerError(e) => e.compose(session),
            Self::Stored => {
                let msg = b"STORED\r\n";
                session.put_slice(msg);
                msg.len()
            }
            Self::Deleted => {
                let msg = b"DELETED\r\n";
                session.put_slice(msg);
                msg.len()
            }
            Self::NotFound => {
                let msg = b"NOT_FOUND\r\n";
                session.put_slice(msg);
                msg.len()
            }
            Self::Ok => {
                let msg = b"OK\r\n";
                session.put_slice(msg);
                msg.len()
            }
            Self::Values(v) => v.compose(session),
            Self::Stats(s) => s.compose(session),
            Self::Hangup => 0,
        }
    }

    fn should_hangup(&self) -> bool {
        matches!(self, Self::Hangup)
    }
}
