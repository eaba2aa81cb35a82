// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

impl RequestParser {
    // `flush_all` takes no arguments; anything but trailing whitespace on
    // the line is a client fault
    pub(crate) fn parse_flush_all<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], ()> {
        let (input, _) = space0(input)?;
        let (input, _) = crlf(input)?;
        Ok((input, ()))
    }
}
