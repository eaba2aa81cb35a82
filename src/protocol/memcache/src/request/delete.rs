// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

#[derive(Debug, PartialEq, Eq)]
pub struct Delete {
    pub(crate) key: Box<[u8]>,
}

impl Delete {
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl RequestParser {
    // this is to be called after parsing the command, so we do not match the verb
    pub(crate) fn parse_delete<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Delete> {
        let (input, _) = space1(input)?;
        let (input, key) = key(input, self.max_key_len)?;

        let key = match key {
            Some(k) => k,
            None => {
                return fail(input, ErrorKind::Tag);
            }
        };

        let (input, _) = space0(input)?;
        let (input, _) = crlf(input)?;

        Ok((
            input,
            Delete {
                key: key.to_owned().into_boxed_slice(),
            },
        ))
    }
}

impl Compose for Delete {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let verb = b"delete ";

        let size = verb.len() + self.key.len() + CRLF.len();

        session.put_slice(verb);
        session.put_slice(&self.key);
        session.put_slice(CRLF.as_bytes());

        size
    }
}
