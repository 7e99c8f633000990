// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `job.json` description of a scan job.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Metadata describing one scan job, persisted as `job.json` inside the
/// job's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// The store id the job lives in.
    pub id: String,
    /// Human-readable job name.
    pub name: String,
    /// Seconds since the epoch at job creation.
    pub created: i64,
    /// Vulnspec name evaluated for this job, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnspec: Option<String>,
}

impl Job {
    /// Serialize to `job.json` contents.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Protocol(format!("job encode: {e}")))
    }

    /// Write the job to an open `job.json`.
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), StoreError> {
        w.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }

    /// Read a job back from `job.json`.
    pub fn read_from(r: &mut impl Read) -> Result<Self, StoreError> {
        let mut text = String::new();
        r.read_to_string(&mut text)?;
        serde_json::from_str(&text).map_err(|e| StoreError::Protocol(format!("job decode: {e}")))
    }
}
