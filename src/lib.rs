// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil
#![deny(unsafe_code)]
//!
//! Umbrella crate for the vigil network service scanning and
//! vulnerability collation toolkit. Re-exports the workspace libraries;
//! the binaries live in `vigil-collate` (batch collation) and
//! `vigil-store` (the `vigil-stored` daemon).

pub use vigil_collate as collate;
pub use vigil_csv as csv;
pub use vigil_matcher as matcher;
pub use vigil_mem as mem;
pub use vigil_store as store;
pub use vigil_table as table;
pub use vigil_version as version;
pub use vigil_vulnspec as vulnspec;
