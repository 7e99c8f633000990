// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error type shared by the vulnspec reader, parser, validator and
//! interpreter.

use thiserror::Error;

/// Everything that can go wrong between vulnspec source and evaluation.
#[derive(Debug, Error)]
pub enum VulnspecError {
    /// The reader hit a malformed token.
    #[error("invalid token at {row}:{col}")]
    InvalidToken {
        /// 1-based source row.
        row: usize,
        /// 0-based source column.
        col: usize,
    },

    /// The parser saw a well-formed token it did not expect.
    #[error("unexpected {got} at {row}:{col}")]
    UnexpectedToken {
        /// Description of the offending token.
        got: &'static str,
        /// 1-based source row.
        row: usize,
        /// 0-based source column.
        col: usize,
    },

    /// The image grew past the 32-bit offset space.
    #[error("bytecode image exceeds offset space")]
    ImageTooLarge,

    /// The image does not start with the vulnspec header.
    #[error("bad image header")]
    Header,

    /// An offset points before the header, past the end of the image, or a
    /// string is not NUL-terminated within its recorded length.
    #[error("invalid offset {offset:#x}")]
    InvalidOffset {
        /// The offending byte offset.
        offset: u32,
    },

    /// A node's kind tag does not fit the position it was reached from.
    #[error("invalid node at {offset:#x}")]
    InvalidNode {
        /// The offending byte offset.
        offset: u32,
    },

    /// Loading an image from a file failed.
    #[error("image load: {0}")]
    Load(#[from] std::io::Error),
}
