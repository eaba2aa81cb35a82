// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Coarse wall-clock time. Expirations are stored as whole unix seconds, so
//! second resolution is all the store ever needs.

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
