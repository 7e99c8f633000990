// SPDX-License-Identifier: MIT OR Apache-2.0
//! Store error taxonomy.

use thiserror::Error;

/// Errors from store operations, the index, and the request protocol.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store id is not exactly 20 lowercase hex digits.
    #[error("invalid store id")]
    InvalidId,

    /// An entry name contains a slash, control bytes, or is too long.
    #[error("invalid path")]
    InvalidPath,

    /// Could not generate an unused store id.
    #[error("store id space exhausted after {0} attempts")]
    IdExhausted(usize),

    /// The peer broke the request protocol.
    #[error("protocol: {0}")]
    Protocol(String),

    /// The peer reported a failed open as an errno.
    #[error("remote errno {0}")]
    Errno(i32),

    /// The daemon reported a request failure.
    #[error("{0}")]
    Remote(String),

    /// The index file length is not a whole number of records.
    #[error("store index is corrupt")]
    CorruptIndex,

    /// A list filter failed to compile.
    #[error("bad must-match pattern: {0}")]
    BadFilter(#[from] regex::Error),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
