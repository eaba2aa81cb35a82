// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! This module provides a set of integration tests and functions to run
//! them against a running embercache instance over a real TCP connection.

use log::{debug, error, info};

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

pub const ADDR: &str = "127.0.0.1:12321";

pub fn tests() {
    debug!("beginning tests");
    println!();

    // get on a key that is not in the cache results in a miss
    test("get miss", &[("get missing\r\n", "END\r\n")]);

    // check that we can store and retrieve a key
    test(
        "set and get",
        &[
            ("set foo 0 0 5\r\nhello\r\n", "STORED\r\n"),
            ("get foo\r\n", "VALUE foo 0 5\r\nhello\r\nEND\r\n"),
        ],
    );

    // storing a zero-length value is valid
    test(
        "set empty value",
        &[
            ("set empty 0 0 0\r\n\r\n", "STORED\r\n"),
            ("get empty\r\n", "VALUE empty 0 0\r\n\r\nEND\r\n"),
        ],
    );

    // the flags field is accepted and ignored; reads echo zero
    test(
        "flags are not stored",
        &[
            ("set flagged 42 0 1\r\nA\r\n", "STORED\r\n"),
            ("get flagged\r\n", "VALUE flagged 0 1\r\nA\r\nEND\r\n"),
        ],
    );

    // overwrite replaces the value and the live count stays at one
    test(
        "overwrite",
        &[
            ("set over 0 0 3\r\nxyz\r\n", "STORED\r\n"),
            ("set over 0 0 2\r\nqq\r\n", "STORED\r\n"),
            ("get over\r\n", "VALUE over 0 2\r\nqq\r\nEND\r\n"),
        ],
    );

    // delete semantics: absent, present, absent again
    test(
        "delete",
        &[
            ("delete nope\r\n", "NOT_FOUND\r\n"),
            ("set nope 0 0 1\r\nA\r\n", "STORED\r\n"),
            ("delete nope\r\n", "DELETED\r\n"),
            ("delete nope\r\n", "NOT_FOUND\r\n"),
            ("get nope\r\n", "END\r\n"),
        ],
    );

    // multi-key get emits hits in key order and skips misses
    test(
        "multi get",
        &[
            ("set mk1 0 0 1\r\n1\r\n", "STORED\r\n"),
            ("set mk3 0 0 1\r\n3\r\n", "STORED\r\n"),
            (
                "get mk1 mk2 mk3\r\n",
                "VALUE mk1 0 1\r\n1\r\nVALUE mk3 0 1\r\n3\r\nEND\r\n",
            ),
        ],
    );

    // pipelined commands are answered strictly in order
    test(
        "pipelined set set get",
        &[(
            "set pa 0 0 3\r\nxyz\r\nset pa 0 0 2\r\nqq\r\nget pa\r\n",
            "STORED\r\nSTORED\r\nVALUE pa 0 2\r\nqq\r\nEND\r\n",
        )],
    );
    test(
        "pipelined get depth 4",
        &[(
            "get p0\r\nget p1\r\nget p2\r\nget p3\r\n",
            "END\r\nEND\r\nEND\r\nEND\r\n",
        )],
    );

    // unknown commands produce ERROR and the connection stays usable
    test(
        "unknown command",
        &[
            ("bogus\r\n", "ERROR\r\n"),
            ("get foo\r\n", "VALUE foo 0 5\r\nhello\r\nEND\r\n"),
        ],
    );

    // malformed known commands are client errors, connection stays open
    test(
        "bad command line",
        &[
            ("set broken 0 0\r\n", "CLIENT_ERROR bad command line format\r\n"),
            ("get \r\n", "CLIENT_ERROR bad command\r\n"),
            ("stats slabs\r\n", "CLIENT_ERROR bad command\r\n"),
            ("flush_all 10\r\n", "CLIENT_ERROR bad command\r\n"),
            ("get foo\r\n", "VALUE foo 0 5\r\nhello\r\nEND\r\n"),
        ],
    );

    // an oversize byte count fails before the data phase: the would-be
    // payload is parsed as commands instead
    test(
        "bad data chunk",
        &[(
            "set x 0 0 9999999\r\nget foo\r\n",
            "CLIENT_ERROR bad data chunk\r\nVALUE foo 0 5\r\nhello\r\nEND\r\n",
        )],
    );

    // values are binary safe, CRLF inside the payload included
    test(
        "binary value",
        &[
            ("set bin 0 0 4\r\n\r\nZZ\r\n", "STORED\r\n"),
            ("get bin\r\n", "VALUE bin 0 4\r\n\r\nZZ\r\nEND\r\n"),
        ],
    );

    // negative exptime means already expired
    test(
        "negative exptime",
        &[
            ("set neg 0 -1 1\r\nA\r\n", "STORED\r\n"),
            ("get neg\r\n", "END\r\n"),
        ],
    );

    expiration_test();
    stats_test();
    flush_test();
    quit_test();
    line_length_test();
}

// opens a new connection, operating on request + response pairs from the
// provided data.
pub fn test(name: &str, data: &[(&str, &str)]) {
    info!("testing: {}", name);
    let mut stream = connect();

    for (request, response) in data {
        send(&mut stream, request.as_bytes());
        let received = receive(&mut stream, response.len());
        if received != response.as_bytes() {
            error!("expected: {:?}", response);
            error!("received: {:?}", String::from_utf8_lossy(&received));
            panic!("status: failed\n");
        }
    }
    info!("status: passed\n");
}

// a short ttl makes the key visible now and gone strictly after expiry
fn expiration_test() {
    info!("testing: expiration");
    let mut stream = connect();

    send(&mut stream, b"set ttl 0 2 1\r\nZ\r\n");
    assert_eq!(receive(&mut stream, 8), b"STORED\r\n");

    send(&mut stream, b"get ttl\r\n");
    assert_eq!(receive(&mut stream, 22), b"VALUE ttl 0 1\r\nZ\r\nEND\r\n");

    std::thread::sleep(Duration::from_secs(3));

    send(&mut stream, b"get ttl\r\n");
    assert_eq!(receive(&mut stream, 5), b"END\r\n");
    info!("status: passed\n");
}

// stats values vary, so check the line set rather than exact bytes
fn stats_test() {
    info!("testing: stats");
    let mut stream = connect();

    send(&mut stream, b"stats\r\n");
    let response = receive_until(&mut stream, b"END\r\n");
    let response = String::from_utf8(response).expect("stats is ascii");

    assert!(response.starts_with("STAT version "));
    for name in [
        "curr_items",
        "bytes",
        "limit_maxbytes",
        "get_hits",
        "get_misses",
    ] {
        assert!(
            response.contains(&format!("STAT {name} ")),
            "missing stat: {name}"
        );
    }
    // compatibility fields are emitted verbatim
    assert!(response.contains("STAT bloom_bits 0\r\n"));
    assert!(response.contains("STAT bloom_fill_pct 0.00\r\n"));
    assert!(response.contains("STAT storage_mode hash\r\n"));
    assert!(response.ends_with("END\r\n"));
    info!("status: passed\n");
}

// flush_all empties the store and is idempotent
fn flush_test() {
    info!("testing: flush_all");
    let mut stream = connect();

    send(&mut stream, b"set keep 0 0 1\r\nK\r\n");
    assert_eq!(receive(&mut stream, 8), b"STORED\r\n");

    send(&mut stream, b"flush_all\r\n");
    assert_eq!(receive(&mut stream, 4), b"OK\r\n");

    send(&mut stream, b"get keep\r\n");
    assert_eq!(receive(&mut stream, 5), b"END\r\n");

    send(&mut stream, b"flush_all\r\nflush_all\r\n");
    assert_eq!(receive(&mut stream, 8), b"OK\r\nOK\r\n");

    // the store accepts new writes after a flush
    send(&mut stream, b"set fresh 0 0 1\r\nF\r\n");
    assert_eq!(receive(&mut stream, 8), b"STORED\r\n");
    info!("status: passed\n");
}

// quit closes the connection without a reply
fn quit_test() {
    info!("testing: quit");
    let mut stream = connect();

    send(&mut stream, b"quit\r\n");

    let mut buf = [0; 64];
    match stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("expected close, read {} bytes", n),
        Err(e) => panic!("expected clean close: {}", e),
    }
    info!("status: passed\n");
}

// a line over the cap is answered as a fault and the connection survives
fn line_length_test() {
    info!("testing: oversized command line");
    let mut stream = connect();

    let mut request = Vec::new();
    request.extend_from_slice(b"get ");
    request.resize(5000, b'k');
    request.extend_from_slice(b"\r\n");
    send(&mut stream, &request);

    let expected = b"CLIENT_ERROR bad command line format\r\n";
    assert_eq!(receive(&mut stream, expected.len()), expected);

    send(&mut stream, b"get missing\r\n");
    assert_eq!(receive(&mut stream, 5), b"END\r\n");
    info!("status: passed\n");
}

fn connect() -> TcpStream {
    debug!("connecting to server");
    let stream = TcpStream::connect(ADDR).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_millis(250)))
        .expect("failed to set read timeout");
    stream
        .set_write_timeout(Some(Duration::from_millis(250)))
        .expect("failed to set write timeout");
    stream
}

fn send(stream: &mut TcpStream, request: &[u8]) {
    stream.write_all(request).expect("error sending request");
}

// reads until `len` bytes arrive or the read times out
fn receive(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0; 4096];

    while received.len() < len {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => break,
            Err(e) => panic!("error reading response: {}", e),
        }
    }
    received
}

// reads until the terminator appears or the read times out
fn receive_until(stream: &mut TcpStream, terminator: &[u8]) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0; 4096];

    while !received
        .windows(terminator.len())
        .any(|w| w == terminator)
    {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => break,
            Err(e) => panic!("error reading response: {}", e),
        }
    }
    received
}
