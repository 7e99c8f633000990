// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil-collate
#![warn(missing_docs)]
//!
//! The collation pipeline: turns raw scan output (banner events,
//! certificate chains) into deduplicated CSV reports, joins banner
//! matches to services, rolls identifications up to components, and
//! evaluates components against a vulnspec bytecode image.
//!
//! Five independent modes, each a straight-line batch driver:
//! `banners`, `httpmsgs`, `matches`, `components`, `cves`.

mod chain;
mod component;
mod error;
pub mod event;
pub mod modes;
mod out;
pub mod patterns;
mod proto_ids;
pub mod sandbox;
mod service;
mod svclut;

pub use chain::{ChainId, ChainTable, CertInfo};
pub use component::{Component, ComponentTable};
pub use error::CollateError;
pub use out::MultiWriter;
pub use proto_ids::{ProtoId, Transport};
pub use service::{Service, ServiceTable, MAX_MPIDS};
pub use svclut::SvcLut;
