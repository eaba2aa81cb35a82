// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

/// A fault in the client's request. The connection stays open.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientError {
    pub(crate) inner: String,
}

impl Compose for ClientError {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let prefix = b"CLIENT_ERROR ";
        let size = prefix.len() + self.inner.len() + CRLF.len();

        session.put_slice(prefix);
        session.put_slice(self.inner.as_bytes());
        session.put_slice(CRLF.as_bytes());

        size
    }
}
