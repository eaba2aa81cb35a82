// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The entry point into a running embercache instance. Parses the command
//! line, loads the optional configuration file, and launches the event
//! loop.

#[macro_use]
extern crate log;

use backtrace::Backtrace;
use clap::{App, Arg};

use config::EmbercacheConfig;
use embercache::{EmbercacheBuilder, Logger};

const MB: usize = 1024 * 1024;

fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        error!("{}", s);
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    // parse command line options
    let matches = App::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_about(
            "A key-value cache backend which speaks a subset of the \
            memcached ASCII protocol. Storage is sharded, arena-backed, and \
            grows its hash index incrementally to keep the latency profile \
            flat.",
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .help("TCP port to listen on")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .help("Storage pool size in megabytes")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("CONFIG")
                .help("Server configuration file")
                .index(1),
        )
        .get_matches();

    // load config from file, if provided
    let mut config = if let Some(file) = matches.value_of("CONFIG") {
        match EmbercacheConfig::load(file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("unable to load config file: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Default::default()
    };

    // command line flags override the file
    if let Some(port) = matches.value_of("port") {
        match port.parse::<u16>() {
            Ok(port) => config.server_mut().set_port(port),
            Err(_) => {
                eprintln!("invalid port: {}", port);
                std::process::exit(1);
            }
        }
    }
    if let Some(memory) = matches.value_of("memory") {
        match memory.parse::<usize>() {
            Ok(mb) => config.ember_mut().set_heap_size(mb * MB),
            Err(_) => {
                eprintln!("invalid memory size: {}", memory);
                std::process::exit(1);
            }
        }
    }

    // initialize logging
    Logger::new()
        .label(env!("CARGO_CRATE_NAME"))
        .level(config.debug().log_level())
        .init()
        .expect("failed to initialize logger");

    // launch embercache
    match EmbercacheBuilder::new(config) {
        Ok(builder) => builder.spawn().wait(),
        Err(e) => {
            eprintln!("error launching embercache: {}", e);
            std::process::exit(1);
        }
    }
}
