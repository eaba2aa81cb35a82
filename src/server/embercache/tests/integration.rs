// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! This test module runs the integration test suite against a
//! single-threaded instance of embercache over real TCP connections.

mod common;

use log::{debug, info};

use common::*;

use config::EmbercacheConfig;
use embercache::{EmbercacheBuilder, Logger};

use std::time::Duration;

fn main() {
    Logger::new()
        .label("integration")
        .level(log::Level::Debug)
        .init()
        .expect("failed to initialize logger");

    debug!("launching server");
    let mut config = EmbercacheConfig::default();
    config.server_mut().set_port(12321);

    let server = EmbercacheBuilder::new(config)
        .expect("failed to bind")
        .spawn();

    // wait for the event loop to begin polling. duration is chosen to be
    // longer than we'd expect startup to take in a slow ci environment.
    std::thread::sleep(Duration::from_secs(2));

    tests();

    // shutdown server and join
    info!("shutdown...");
    server.shutdown();

    info!("passed!");
}
