// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

/// The reply to `stats`: zero or more `STAT <name> <value>` lines followed
/// by `END`.
#[derive(Debug, PartialEq, Eq)]
pub struct Stats {
    pub(crate) entries: Vec<(String, String)>,
}

impl Stats {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl Compose for Stats {
    fn compose(&self, session: &mut dyn BufMut) -> usize {
        let mut size = 0;

        for (name, value) in &self.entries {
            let line = format!("STAT {name} {value}\r\n").into_bytes();
            session.put_slice(&line);
            size += line.len();
        }

        let suffix = b"END\r\n";
        session.put_slice(suffix);
        size + suffix.len()
    }
}
