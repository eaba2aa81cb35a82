// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Top-level errors that will be returned to a caller of this library.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
/// Possible errors returned by the top-level API
pub enum EmberError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("item not found")]
    NotFound,
    #[error("buffer too small ({required:?} bytes required)")]
    BufferTooSmall { required: usize },
    #[error("invalid key")]
    InvalidKey,
}
