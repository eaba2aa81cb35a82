// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

/// The reply to a `get`: zero or more `VALUE` blocks followed by `END`.
#[derive(Debug, PartialEq, Eq)]
pub struct Values {
    pub(crate) values: Vec<Value>,
}

impl Values {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Value {
    // data holds the key followed by the value bytes
    data: Vec<u8>,
    klen: usize,
    flags: u32,
}

impl Value {
    pub fn new(key: &[u8], flags: u32, value: &[u8]) -> Self {
        let mut data = Vec::with_capacity(key.len() + value.len());
        data.extend_from_slice(key);
        data.extend_from_slice(value);

        Self {
            data,
            klen: key.len(),
            flags,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.data[0..self.klen]
    }

    pub fn value(&self) -> &[u8] {
        &self.data[self.klen..]
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }
}

impl Compose for Values {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let suffix = b"END\r\n";

        let mut size = suffix.len();

        for value in self.values.iter() {
            size += value.compose(session);
        }
        session.put_slice(suffix);

        size
    }
}

impl Compose for Value {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let key = self.key();
        let value = &self.data[self.klen..];

        // header, payload, and trailer are appended as three segments so a
        // vectored flush can cover them in one write
        let prefix = b"VALUE ";
        let header_fields = format!(" {} {}\r\n", self.flags, value.len()).into_bytes();

        let size = prefix.len() + key.len() + header_fields.len() + value.len() + CRLF.len();

        session.put_slice(prefix);
        session.put_slice(key);
        session.put_slice(&header_fields);
        session.put_slice(value);
        session.put_slice(CRLF.as_bytes());

        size
    }
}
