// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

#[derive(Debug, PartialEq, Eq)]
pub struct Set {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) flags: u32,
    pub(crate) ttl: Ttl,
}

impl Set {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    /// The flags field is accepted for wire compatibility. It is stored
    /// nowhere and reads always report zero.
    pub fn flags(&self) -> u32 {
        self.flags
    }
}

impl RequestParser {
    // this is to be called after parsing the command, so we do not match the verb
    pub(crate) fn parse_set<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Set> {
        let (input, _) = space1(input)?;
        let (input, key) = key(input, self.max_key_len)?;

        let key = match key {
            Some(k) => k,
            None => {
                return fail(input, ErrorKind::Tag);
            }
        };

        let (input, _) = space1(input)?;
        let (input, flags) = parse_u32(input)?;
        let (input, _) = space1(input)?;
        let (input, exptime) = parse_i64(input)?;
        let (input, _) = space1(input)?;
        let (input, bytes) = parse_usize(input)?;

        // an out-of-range byte count is answered before the data phase, so
        // the payload bytes are never treated as a value
        if bytes > self.max_value_size {
            return fail(input, ErrorKind::TooLarge);
        }

        let (input, _) = space0(input)?;
        let (input, _) = crlf(input)?;
        let (input, value) = take(bytes)(input)?;
        // the terminator is required but its bytes are not checked
        let (input, _) = take(2usize)(input)?;

        Ok((
            input,
            Set {
                key: key.to_owned().into_boxed_slice(),
                value: value.to_owned().into_boxed_slice(),
                flags,
                ttl: Ttl::new(exptime),
            },
        ))
    }
}

impl Compose for Set {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let verb = b"set ";
        let flags = format!(" {}", self.flags).into_bytes();
        let ttl = format!(" {}", self.ttl.get().unwrap_or(0)).into_bytes();
        let vlen = format!(" {}\r\n", self.value.len()).into_bytes();

        let size = verb.len()
            + self.key.len()
            + flags.len()
            + ttl.len()
            + vlen.len()
            + self.value.len()
            + CRLF.len();

        session.put_slice(verb);
        session.put_slice(&self.key);
        session.put_slice(&flags);
        session.put_slice(&ttl);
        session.put_slice(&vlen);
        session.put_slice(&self.value);
        session.put_slice(CRLF.as_bytes());

        size
    }
}
