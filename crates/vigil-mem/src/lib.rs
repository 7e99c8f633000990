//! vigil-mem
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Low-level memory primitives shared by the rest of the workspace: a
//! growable byte buffer with alignment-aware allocation ([`Buf`]) and a
//! chunk-allocated bump arena for byte strings ([`Arena`]).

mod arena;
mod buf;

pub use arena::{Arena, Span};
pub use buf::{Buf, ALIGNMENT};
