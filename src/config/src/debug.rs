// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

// constants to define default values
const DEBUG_LOG_LEVEL: log::Level = log::Level::Info;

// helper functions
fn log_level() -> String {
    DEBUG_LOG_LEVEL.to_string().to_lowercase()
}

// definitions
#[derive(Serialize, Deserialize, std::fmt::Debug)]
pub struct Debug {
    #[serde(default = "log_level")]
    log_level: String,
}

// implementation
impl Debug {
    /// The logging level for the process
    pub fn log_level(&self) -> log::Level {
        match self.log_level.as_str() {
            "error" => log::Level::Error,
            "warn" => log::Level::Warn,
            "info" => log::Level::Info,
            "debug" => log::Level::Debug,
            "trace" => log::Level::Trace,
            _ => DEBUG_LOG_LEVEL,
        }
    }
}

// trait implementations
impl Default for Debug {
    fn default() -> Self {
        Self {
            log_level: log_level(),
        }
    }
}
