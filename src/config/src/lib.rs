// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#[macro_use]
extern crate log;

mod buf;
mod debug;
mod ember;
mod server;

pub use buf::Buf;
pub use debug::Debug;
pub use ember::Ember;
pub use server::Server;

use serde::{Deserialize, Serialize};

use std::io::Read;

// struct definitions
#[derive(Serialize, Deserialize, Default)]
pub struct EmbercacheConfig {
    // application modules
    #[serde(default)]
    server: Server,
    #[serde(default)]
    ember: Ember,

    // connection buffering and logging
    #[serde(default)]
    buf: Buf,
    #[serde(default)]
    debug: Debug,
}

// implementation
impl EmbercacheConfig {
    pub fn load(file: &str) -> Result<Self, std::io::Error> {
        let mut file = std::fs::File::open(file)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        match toml::from_str(&content) {
            Ok(t) => Ok(t),
            Err(e) => {
                error!("{}", e);
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "Error parsing config",
                ))
            }
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    pub fn ember(&self) -> &Ember {
        &self.ember
    }

    pub fn ember_mut(&mut self) -> &mut Ember {
        &mut self.ember
    }

    pub fn buf(&self) -> &Buf {
        &self.buf
    }

    pub fn debug(&self) -> &Debug {
        &self.debug
    }
}
