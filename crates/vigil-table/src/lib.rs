// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil-table
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Table primitives behind the collation pipeline and the vulnspec
//! compiler: an insertion-ordered string map, an open-addressing object
//! table with Robin-Hood probing and caller-supplied hash/compare, and an
//! arena-backed string interner.

mod hash;
mod intern;
mod objtbl;
mod omap;

pub use hash::{fnv1a_seeded, seed_from_time, Fnv1a};
pub use intern::{Interner, Sym};
pub use objtbl::{ObjTbl, TblOps};
pub use omap::OrderedMap;
