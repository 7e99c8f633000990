// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collation error taxonomy.

use thiserror::Error;

/// Errors from the collation pipeline.
#[derive(Debug, Error)]
pub enum CollateError {
    /// A banner event line failed to decode.
    #[error("banner event: {0}")]
    BadEvent(String),

    /// Pattern table failed to compile or match.
    #[error(transparent)]
    Matcher(#[from] vigil_matcher::MatcherError),

    /// Vulnspec image failed to load or evaluate.
    #[error(transparent)]
    Vulnspec(#[from] vigil_vulnspec::VulnspecError),

    /// Could not enter the sandbox.
    #[error("sandbox: {0}")]
    Sandbox(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CollateError {
    fn from(e: serde_json::Error) -> Self {
        CollateError::BadEvent(e.to_string())
    }
}
