// SPDX-License-Identifier: MIT OR Apache-2.0
//! The five collation modes.
//!
//! Each mode is an independent batch driver over CSV or JSONL streams;
//! the CLI wires files to them and the sandbox is entered before any of
//! them run.

pub mod banners;
pub mod components;
pub mod cves;
pub mod httpmsgs;
pub mod matches;
