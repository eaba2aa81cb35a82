// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

/// A fault on the server side, such as allocator exhaustion. The connection
/// stays open and no partial payload is written.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerError {
    pub(crate) inner: String,
}

impl Compose for ServerError {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let prefix = b"SERVER_ERROR ";
        let size = prefix.len() + self.inner.len() + CRLF.len();

        session.put_slice(prefix);
        session.put_slice(self.inner.as_bytes());
        session.put_slice(CRLF.as_bytes());

        size
    }
}
