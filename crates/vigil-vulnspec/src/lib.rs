// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil-vulnspec
#![warn(missing_docs)]
//!
//! The vulnerability spec ("vulnspec") subsystem: an S-expression source
//! language describing CVE predicates, a compiler producing a
//! position-independent bytecode image, and an interpreter evaluating that
//! image against `(vendor/product, version)` tuples.
//!
//! ```text
//! (cve "CVE-2019-0001" 6.5 7.2 "description"
//!   (^ (> "foo/bar" "1.2.2")
//!      (< "foo/bar" "1.2.4")))
//! ```
//!
//! All inter-node references inside an image are byte offsets, never
//! pointers; offset zero means "absent". Images are validated structurally
//! before any evaluation.

mod error;
mod interp;
mod node;
mod parser;
mod progn;
mod reader;
mod validator;

pub use error::VulnspecError;
pub use interp::{CveMatch, EvalEnd, Flow, Interp};
pub use node::{NodeType, VersionType, HEADER, HEADER_SIZE};
pub use parser::Parser;
pub use progn::Progn;
pub use reader::{Reader, Token};
pub use validator::validate;

/// Compile vulnspec source into a bytecode image.
pub fn compile(src: &[u8]) -> Result<Vec<u8>, VulnspecError> {
    let mut parser = Parser::new();
    parser.parse(src)?;
    Ok(parser.into_progn().into_image())
}
