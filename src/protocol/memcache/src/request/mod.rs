// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;
use core::fmt::{Display, Formatter};
use core::num::NonZeroI32;
use protocol_common::{Parse, ParseOk};

mod delete;
mod flush_all;
mod get;
mod quit;
mod set;
mod stats;

pub use delete::Delete;
pub use get::Get;
pub use set::Set;

pub const DEFAULT_MAX_KEY_LEN: usize = 250;
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024; // 1MB max value size

#[derive(Copy, Clone)]
pub struct RequestParser {
    max_value_size: usize,
    max_key_len: usize,
}

impl RequestParser {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn max_value_size(mut self, bytes: usize) -> Self {
        self.max_value_size = bytes;
        self
    }

    pub fn max_key_len(mut self, bytes: usize) -> Self {
        self.max_key_len = bytes;
        self
    }

    fn parse_command<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Command> {
        let (remaining, command_bytes) = take_till(|b| (b == b' ' || b == b'\r'))(input)?;
        let command = match command_bytes {
            b"delete" => Command::Delete,
            b"flush_all" => Command::FlushAll,
            b"get" => Command::Get,
            b"quit" => Command::Quit,
            b"set" => Command::Set,
            b"stats" => Command::Stats,
            _ => {
                return fail(input, ErrorKind::Tag);
            }
        };
        Ok((remaining, command))
    }

    pub fn parse_request<'a>(&self, input: &'a [u8]) -> Result<(&'a [u8], Request), ParseError> {
        let (input, command) = self
            .parse_command(input)
            .map_err(|e| fault(e, ParseError::UnknownCommand))?;

        match command {
            Command::Delete => {
                let (input, request) = self
                    .parse_delete(input)
                    .map_err(|e| fault(e, ParseError::BadCommand))?;
                Ok((input, Request::Delete(request)))
            }
            Command::FlushAll => {
                let (input, _) = self
                    .parse_flush_all(input)
                    .map_err(|e| fault(e, ParseError::BadCommand))?;
                Ok((input, Request::FlushAll))
            }
            Command::Get => {
                let (input, request) = self
                    .parse_get(input)
                    .map_err(|e| fault(e, ParseError::BadCommand))?;
                Ok((input, Request::Get(request)))
            }
            Command::Quit => {
                let (input, _) = self
                    .parse_quit(input)
                    .map_err(|e| fault(e, ParseError::BadCommand))?;
                Ok((input, Request::Quit))
            }
            Command::Set => {
                let (input, request) = self.parse_set(input).map_err(set_fault)?;
                Ok((input, Request::Set(request)))
            }
            Command::Stats => {
                let (input, _) = self
                    .parse_stats(input)
                    .map_err(|e| fault(e, ParseError::BadCommand))?;
                Ok((input, Request::Stats))
            }
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self {
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            max_key_len: DEFAULT_MAX_KEY_LEN,
        }
    }
}

impl Parse<Request> for RequestParser {
    type Error = ParseError;

    fn parse(&self, buffer: &[u8]) -> Result<ParseOk<Request>, ParseError> {
        let (remaining, request) = self.parse_request(buffer)?;
        Ok(ParseOk::new(request, buffer.len() - remaining.len()))
    }
}

// maps a nom error onto the wire fault for this command; incomplete input
// is never a fault
fn fault(e: nom::Err<nom::error::Error<&[u8]>>, kind: ParseError) -> ParseError {
    match e {
        nom::Err::Incomplete(_) => ParseError::Incomplete,
        _ => kind,
    }
}

// `set` distinguishes an out-of-range byte count from other malformed lines
fn set_fault(e: nom::Err<nom::error::Error<&[u8]>>) -> ParseError {
    match e {
        nom::Err::Incomplete(_) => ParseError::Incomplete,
        nom::Err::Error(inner) | nom::Err::Failure(inner) => {
            if inner.code == ErrorKind::TooLarge {
                ParseError::BadDataChunk
            } else {
                ParseError::BadCommandLine
            }
        }
    }
}

impl Compose for Request {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        match self {
            Self::Delete(r) => r.compose(session),
            Self::FlushAll => {
                session.put_slice(b"flush_all\r\n");
                11
            }
            Self::Get(r) => r.compose(session),
            Self::Quit => {
                session.put_slice(b"quit\r\n");
                6
            }
            Self::Set(r) => r.compose(session),
            Self::Stats => {
                session.put_slice(b"stats\r\n");
                7
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    Delete(Delete),
    FlushAll,
    Get(Get),
    Quit,
    Set(Set),
    Stats,
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Request::Delete(_) => write!(f, "delete"),
            Request::FlushAll => write!(f, "flush_all"),
            Request::Get(_) => write!(f, "get"),
            Request::Quit => write!(f, "quit"),
            Request::Set(_) => write!(f, "set"),
            Request::Stats => write!(f, "stats"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Delete,
    FlushAll,
    Get,
    Quit,
    Set,
    Stats,
}

/// Time-to-live as carried on the wire. `exptime` is interpreted as whole
/// seconds from now when positive and as "never expires" when zero.
/// Negative values are treated as immediate expiration.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Ttl {
    inner: Option<NonZeroI32>,
}

impl Ttl {
    pub fn new(exptime: i64) -> Self {
        if exptime < 0 {
            return Self {
                inner: NonZeroI32::new(-1),
            };
        }

        if exptime == 0 {
            return Self { inner: None };
        }

        // clamp long TTLs
        let exptime = exptime.min(i32::MAX as i64);
        Self {
            inner: NonZeroI32::new(exptime as i32),
        }
    }

    /// Return the TTL in seconds. A `None` variant should be treated as no
    /// expiration. Positive values will always be one second or greater.
    /// Negative values must be treated as immediate expiration.
    pub fn get(&self) -> Option<i32> {
        self.inner.map(|v| v.get())
    }

    pub fn none() -> Self {
        Self { inner: None }
    }
}
