// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

impl RequestParser {
    // the general-form `stats <subcommand>` is not part of this dialect
    pub(crate) fn parse_stats<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], ()> {
        let (input, _) = space0(input)?;
        let (input, _) = crlf(input)?;
        Ok((input, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let parser = RequestParser::new();

        assert_eq!(
            parser.parse_request(b"stats\r\n"),
            Ok((&b""[..], Request::Stats))
        );
        assert_eq!(
            parser.parse_request(b"stats \r\n"),
            Ok((&b""[..], Request::Stats))
        );
    }

    #[test]
    fn parse_rejects_subcommands() {
        let parser = RequestParser::new();

        assert_eq!(
            parser.parse_request(b"stats slabs\r\n"),
            Err(ParseError::BadCommand)
        );
    }
}
