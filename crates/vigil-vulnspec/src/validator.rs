// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural validation of bytecode images.

use crate::error::VulnspecError;
use crate::node::{boolean, compar, cve, read_u32};
use crate::node::{
    NodeType, VersionType, BOOLEAN_NODE_SIZE, COMPAR_NODE_SIZE, CVE_NODE_SIZE, HEADER,
    HEADER_SIZE, MIN_NODE_SIZE,
};

struct Validator<'a> {
    image: &'a [u8],
    // Walk budget; a well-formed image visits each node once, so running
    // past this means a reference cycle.
    steps: usize,
}

/// Validate `image` structurally.
///
/// Checks the header prefix, then walks every reachable node verifying at
/// each step that offsets stay inside the image and past the header, that
/// string references are NUL-terminated within their recorded length, and
/// that each node's kind tag fits the position it was reached from.
/// Validation must succeed before an image is evaluated.
pub fn validate(image: &[u8]) -> Result<(), VulnspecError> {
    if image.len() < HEADER_SIZE || image[..HEADER_SIZE] != HEADER {
        return Err(VulnspecError::Header);
    }

    // Header-only images carry no nodes and are trivially valid.
    if image.len() == HEADER_SIZE {
        return Ok(());
    }

    let mut v = Validator {
        image,
        steps: image.len() / MIN_NODE_SIZE + 1,
    };
    v.cve_chain(HEADER_SIZE as u32)
}

impl Validator<'_> {
    fn check(&mut self, offset: u32, len: usize) -> Result<(), VulnspecError> {
        if (offset as usize) < HEADER_SIZE {
            return Err(VulnspecError::InvalidOffset { offset });
        }
        let end = (offset as usize)
            .checked_add(len)
            .ok_or(VulnspecError::InvalidOffset { offset })?;
        if end > self.image.len() {
            return Err(VulnspecError::InvalidOffset { offset });
        }

        self.steps = self
            .steps
            .checked_sub(1)
            .ok_or(VulnspecError::InvalidNode { offset })?;
        Ok(())
    }

    fn check_str(&mut self, length: u32, offset: u32) -> Result<(), VulnspecError> {
        if length == 0 {
            return Err(VulnspecError::InvalidNode { offset });
        }
        self.check(offset, length as usize)?;
        let last = offset as usize + length as usize - 1;
        if self.image[last] != 0 {
            return Err(VulnspecError::InvalidNode { offset });
        }
        Ok(())
    }

    fn node_type(&self, offset: u32) -> Result<NodeType, VulnspecError> {
        NodeType::from_u32(read_u32(self.image, offset as usize))
            .ok_or(VulnspecError::InvalidNode { offset })
    }

    fn cve_chain(&mut self, mut offset: u32) -> Result<(), VulnspecError> {
        while offset != 0 {
            self.check(offset, CVE_NODE_SIZE)?;
            if self.node_type(offset)? != NodeType::Cve {
                return Err(VulnspecError::InvalidNode { offset });
            }

            let at = offset as usize;
            self.check_str(
                read_u32(self.image, at + cve::ID_LEN),
                read_u32(self.image, at + cve::ID_OFF),
            )?;
            self.check_str(
                read_u32(self.image, at + cve::DESC_LEN),
                read_u32(self.image, at + cve::DESC_OFF),
            )?;
            self.vulnexpr(read_u32(self.image, at + cve::VULNEXPR))?;
            offset = read_u32(self.image, at + cve::NEXT);
        }
        Ok(())
    }

    fn vulnexpr(&mut self, offset: u32) -> Result<(), VulnspecError> {
        self.check(offset, 4)?;
        // The tag check above consumed a step; give it back so nodes are
        // only charged once.
        self.steps += 1;
        match self.node_type(offset)? {
            t if t.is_compar() => self.compar(offset),
            t if t.is_boolean() => self.boolean_chain(offset),
            _ => Err(VulnspecError::InvalidNode { offset }),
        }
    }

    fn compar(&mut self, offset: u32) -> Result<(), VulnspecError> {
        self.check(offset, COMPAR_NODE_SIZE)?;
        let at = offset as usize;
        self.check_str(
            read_u32(self.image, at + compar::VENDPROD_LEN),
            read_u32(self.image, at + compar::VENDPROD_OFF),
        )?;

        let vtype = read_u32(self.image, at + compar::VTYPE);
        if vtype == VersionType::Nalpha as u32 {
            self.check_str(
                read_u32(self.image, at + compar::NALPHA_LEN),
                read_u32(self.image, at + compar::NALPHA_OFF),
            )?;
        } else if vtype != VersionType::Vague as u32 {
            return Err(VulnspecError::InvalidNode { offset });
        }
        Ok(())
    }

    fn boolean_chain(&mut self, mut offset: u32) -> Result<(), VulnspecError> {
        while offset != 0 {
            self.check(offset, BOOLEAN_NODE_SIZE)?;
            let at = offset as usize;
            if !self.node_type(offset)?.is_boolean() {
                return Err(VulnspecError::InvalidNode { offset });
            }
            self.vulnexpr(read_u32(self.image, at + boolean::VALUE))?;
            offset = read_u32(self.image, at + boolean::NEXT);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::compile;
    use crate::error::VulnspecError;
    use crate::node::{write_u32, HEADER_SIZE};

    fn sample() -> Vec<u8> {
        compile(
            br#"
            (cve "CVE-1" 6.5 6.5 "first"
              (^ (> "foo/bar" "1.2.2") (< "foo/bar" "1.2.4")))
            (cve "CVE-2" 2.1 3.0 "second"
              (nalpha (= "baz/qux" "2.0r")))
            "#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_compiled_images() {
        validate(&sample()).unwrap();
    }

    #[test]
    fn rejects_bad_header() {
        assert!(matches!(validate(b""), Err(VulnspecError::Header)));
        assert!(matches!(validate(b"VM1\0\0\0\0\0"), Err(VulnspecError::Header)));
        let mut img = sample();
        img[0] ^= 0xff;
        assert!(matches!(validate(&img), Err(VulnspecError::Header)));
    }

    #[test]
    fn rejects_truncated_images() {
        // Cutting at the half drops the second CVE node; cutting just
        // past the header drops everything. Cutting only trailing
        // alignment padding would still validate, so no cut lands there.
        let img = sample();
        for cut in [HEADER_SIZE + 1, img.len() / 2] {
            assert!(validate(&img[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        let mut img = sample();
        // point the first CVE's expression past the end
        let len = img.len() as u32;
        write_u32(&mut img, HEADER_SIZE + 32, len);
        assert!(validate(&img).is_err());

        let mut img = sample();
        // point the next-link into the header
        write_u32(&mut img, HEADER_SIZE + 4, 4);
        assert!(matches!(
            validate(&img),
            Err(VulnspecError::InvalidOffset { offset: 4 })
        ));
    }

    #[test]
    fn rejects_corrupted_tags() {
        let mut img = sample();
        write_u32(&mut img, HEADER_SIZE, 0xfeed);
        assert!(matches!(
            validate(&img),
            Err(VulnspecError::InvalidNode { .. })
        ));
    }

    #[test]
    fn rejects_reference_cycles() {
        let mut img = sample();
        // first CVE links back to itself
        write_u32(&mut img, HEADER_SIZE + 4, HEADER_SIZE as u32);
        assert!(validate(&img).is_err());
    }

    #[test]
    fn header_only_image_is_valid() {
        let img = compile(b"").unwrap();
        validate(&img).unwrap();
    }
}
