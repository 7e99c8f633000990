// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil-store
#![warn(missing_docs)]
//!
//! Filesystem-backed artifact store for scan jobs, its append-only index,
//! and the UNIX-domain request protocol served by `vigil-stored`.
//!
//! Stores are keyed by 20-character lowercase hex identifiers under a
//! two-level directory tree (`store/<last-2-chars>/<id>/`). Clients enter a
//! store, then open and rename files inside it; file descriptors travel
//! back over the socket as `SCM_RIGHTS` ancillary data.

pub mod client;
pub mod daemon;
mod error;
pub mod fdpass;
mod id;
pub mod index;
pub mod job;
pub mod manifest;
pub mod proto;
mod store;

pub use error::StoreError;
pub use id::{is_valid_id, IdGen, STORE_ID_LEN};
pub use store::{validate_entry_name, Store, StoreHandle};
