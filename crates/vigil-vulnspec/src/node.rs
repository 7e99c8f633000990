// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bytecode image layout.
//!
//! Every multi-byte integer in an image is a host-endian `u32`; images are
//! not designed for cross-endianness transfer. A `cvalue` is a 32-bit
//! length followed by a 32-bit offset; a bare `value` is a 32-bit offset.
//! Offset zero means "absent".

use vigil_version::VAGUE_FIELDS;

/// Image header: `"VM0"` followed by five NUL bytes.
pub const HEADER: [u8; 8] = *b"VM0\0\0\0\0\0";
/// Byte length of [`HEADER`]; also the offset of the first CVE node.
pub const HEADER_SIZE: usize = 8;

/// Node kind tags.
///
/// The numbering is part of the image format; slot 4 is a reserved
/// sequence tag that no writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NodeType {
    /// Sentinel; never valid in an image.
    Invalid = 0,
    /// CVE list node.
    Cve = 1,
    /// Boolean OR node.
    Or = 2,
    /// Boolean AND node.
    And = 3,
    /// Version comparison, `<`.
    Lt = 5,
    /// Version comparison, `<=`.
    Le = 6,
    /// Version comparison, `=`.
    Eq = 7,
    /// Version comparison, `>=`.
    Ge = 8,
    /// Version comparison, `>`.
    Gt = 9,
    /// Comparator switch; only a source construct, never an image node.
    Nalpha = 10,
}

impl NodeType {
    /// Decode a kind tag.
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::Cve,
            2 => Self::Or,
            3 => Self::And,
            5 => Self::Lt,
            6 => Self::Le,
            7 => Self::Eq,
            8 => Self::Ge,
            9 => Self::Gt,
            10 => Self::Nalpha,
            _ => return None,
        })
    }

    /// `true` for the five comparison tags.
    pub fn is_compar(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Eq | Self::Ge | Self::Gt)
    }

    /// `true` for AND/OR.
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// Which comparator a compar node selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VersionType {
    /// Numeric-fields ordering, version inlined into the node.
    Vague = 0,
    /// Integer-plus-suffix ordering, version interned as a string.
    Nalpha = 1,
}

/// `(length, offset)` reference to interned bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CValue {
    /// Byte length including the trailing NUL.
    pub length: u32,
    /// Byte offset into the image.
    pub offset: u32,
}

// Node byte layouts. Field offsets are relative to the node offset.

/// Compar node size: tag, vendprod cvalue, vtype, version union.
pub const COMPAR_NODE_SIZE: usize = 16 + 4 * (1 + VAGUE_FIELDS);
/// Compar field offsets.
pub mod compar {
    /// Kind tag.
    pub const TYPE: usize = 0;
    /// vendprod cvalue length.
    pub const VENDPROD_LEN: usize = 4;
    /// vendprod cvalue offset.
    pub const VENDPROD_OFF: usize = 8;
    /// Version type discriminator.
    pub const VTYPE: usize = 12;
    /// Vague variant: used-field count.
    pub const VAGUE_NUSED: usize = 16;
    /// Vague variant: first of four numeric fields.
    pub const VAGUE_FIELDS_BASE: usize = 20;
    /// Nalpha variant: version cvalue length.
    pub const NALPHA_LEN: usize = 16;
    /// Nalpha variant: version cvalue offset.
    pub const NALPHA_OFF: usize = 20;
}

/// Boolean node size: tag, next, value.
pub const BOOLEAN_NODE_SIZE: usize = 12;
/// Boolean field offsets.
pub mod boolean {
    /// Kind tag.
    pub const TYPE: usize = 0;
    /// Next sibling in the AND/OR chain, 0 at the end.
    pub const NEXT: usize = 4;
    /// The child expression.
    pub const VALUE: usize = 8;
}

/// CVE node size: tag, next, two scores, two cvalues, expression.
pub const CVE_NODE_SIZE: usize = 36;
/// CVE field offsets.
pub mod cve {
    /// Kind tag.
    pub const TYPE: usize = 0;
    /// Next CVE in the top-level chain, 0 at the end.
    pub const NEXT: usize = 4;
    /// CVSSv2 base score, fixed point ×100.
    pub const CVSS2: usize = 8;
    /// CVSSv3 base score, fixed point ×100.
    pub const CVSS3: usize = 12;
    /// CVE id cvalue length.
    pub const ID_LEN: usize = 16;
    /// CVE id cvalue offset.
    pub const ID_OFF: usize = 20;
    /// Description cvalue length.
    pub const DESC_LEN: usize = 24;
    /// Description cvalue offset.
    pub const DESC_OFF: usize = 28;
    /// The vulnerability expression.
    pub const VULNEXPR: usize = 32;
}

/// Smallest node an image can contain; used to bound structural walks.
pub const MIN_NODE_SIZE: usize = BOOLEAN_NODE_SIZE;

/// Read a host-endian `u32` at `off`. Callers bounds-check first.
pub(crate) fn read_u32(image: &[u8], off: usize) -> u32 {
    let bytes: [u8; 4] = image[off..off + 4].try_into().expect("bounds-checked");
    u32::from_ne_bytes(bytes)
}

/// Write a host-endian `u32` at `off`.
pub(crate) fn write_u32(image: &mut [u8], off: usize, value: u32) {
    image[off..off + 4].copy_from_slice(&value.to_ne_bytes());
}
