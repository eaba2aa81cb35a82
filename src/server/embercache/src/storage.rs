// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Wires the memcache protocol onto the `ember` storage engine. The event
//! loop owns the store exclusively, so every operation goes through the
//! lock-free API.

use config::EmbercacheConfig;
use ember::{Ember, EmberError};
use protocol_common::Execute;
use protocol_memcache::{Delete, Get, Request, Response, Set, Value};

// initial size of the shared get buffer; it grows to the largest value the
// server has ever returned and stays there
const GET_BUFFER_SIZE: usize = 64 * 1024;

pub struct Storage {
    data: Ember,
    // one scratch buffer for all connections; the loop is single-threaded
    get_buffer: Vec<u8>,
}

impl Storage {
    pub fn new(config: &EmbercacheConfig) -> Self {
        let data = Ember::builder()
            .heap_size(config.ember().heap_size())
            .hash_power(config.ember().hash_power())
            .build();

        Self {
            data,
            get_buffer: vec![0; GET_BUFFER_SIZE],
        }
    }

    fn get(&mut self, get: &Get) -> Response {
        let mut values = Vec::new();

        for key in get.keys() {
            let len = match self.data.get_into_nolock(key, &mut self.get_buffer) {
                Ok(len) => len,
                Err(EmberError::BufferTooSmall { required }) => {
                    self.get_buffer.resize(required, 0);
                    match self.data.get_into_nolock(key, &mut self.get_buffer) {
                        Ok(len) => len,
                        Err(_) => continue,
                    }
                }
                Err(_) => continue,
            };
            // flags are not stored; they read back as zero
            values.push(Value::new(key, 0, &self.get_buffer[..len]));
        }

        Response::values(values)
    }

    fn set(&mut self, set: &Set) -> Response {
        let ttl = match set.ttl().get() {
            None => ember::Ttl::none(),
            Some(seconds) if seconds < 0 => ember::Ttl::expired(),
            Some(seconds) => ember::Ttl::seconds(seconds as u32),
        };

        match self.data.set_nolock(set.key(), set.value(), ttl) {
            Ok(()) => Response::stored(),
            Err(EmberError::OutOfMemory) => Response::server_error("out of memory"),
            Err(_) => Response::client_error("bad command line format"),
        }
    }

    fn delete(&mut self, delete: &Delete) -> Response {
        match self.data.delete_nolock(delete.key()) {
            Ok(()) => Response::deleted(),
            Err(_) => Response::not_found(),
        }
    }

    fn stats(&mut self) -> Response {
        let stats = self.data.stats_nolock();

        let entries = vec![
            ("version".to_string(), Ember::version().to_string()),
            ("curr_items".to_string(), stats.curr_items.to_string()),
            ("bytes".to_string(), stats.bytes.to_string()),
            ("limit_maxbytes".to_string(), stats.pool_size.to_string()),
            ("get_hits".to_string(), stats.get_hits.to_string()),
            ("get_misses".to_string(), stats.get_misses.to_string()),
            // compatibility fields: scripts parse these even though this
            // storage mode has nothing behind them
            ("bloom_bits".to_string(), "0".to_string()),
            ("bloom_fill_pct".to_string(), "0.00".to_string()),
            ("storage_mode".to_string(), "hash".to_string()),
        ];

        Response::stats(entries)
    }
}

impl Execute<Request, Response> for Storage {
    fn execute(&mut self, request: &Request) -> Response {
        match request {
            Request::Get(get) => self.get(get),
            Request::Set(set) => self.set(set),
            Request::Delete(delete) => self.delete(delete),
            Request::FlushAll => {
                self.data.flush_nolock();
                Response::ok()
            }
            Request::Stats => self.stats(),
            Request::Quit => Response::hangup(),
        }
    }
}
