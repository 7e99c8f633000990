// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bytecode interpreter.

use std::fs::File;

use memmap2::Mmap;
use vigil_version::{nalpha_cmp, VagueVersion};

use crate::error::VulnspecError;
use crate::node::{boolean, compar, cve, read_u32};
use crate::node::{NodeType, VersionType, HEADER_SIZE};
use crate::validator::validate;

/// A CVE whose predicate held for the current subject.
///
/// The id and description borrow from the loaded image and stay valid
/// until the image is unloaded.
#[derive(Debug, Clone, Copy)]
pub struct CveMatch<'i> {
    /// CVE identifier, e.g. `CVE-2019-0001`.
    pub id: &'i str,
    /// CVSSv2 base score.
    pub cvss2: f32,
    /// CVSSv3 base score.
    pub cvss3: f32,
    /// Human-readable description.
    pub desc: &'i str,
}

/// Verdict returned by a match callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep evaluating further CVE nodes.
    Continue,
    /// Abort evaluation now.
    Stop,
}

/// How an evaluation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalEnd {
    /// Every CVE node was considered.
    Completed,
    /// The callback returned [`Flow::Stop`].
    Stopped,
}

#[derive(Debug)]
enum ImageData<'a> {
    Borrowed(&'a [u8]),
    Mapped(Mmap),
}

impl ImageData<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            ImageData::Borrowed(b) => b,
            ImageData::Mapped(m) => m,
        }
    }
}

/// Evaluator of validated bytecode images.
///
/// Load an image once, then repeatedly set a subject and evaluate. The
/// subject's version is kept both as the raw string (for nalpha compars)
/// and pre-parsed as a vague version (for vague compars).
#[derive(Debug, Default)]
pub struct Interp<'a> {
    image: Option<ImageData<'a>>,
    vendprod: String,
    version: String,
    vague: Option<VagueVersion>,
}

impl<'a> Interp<'a> {
    /// Create an interpreter with no image loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and retain `data` as the active image.
    pub fn load(&mut self, data: &'a [u8]) -> Result<(), VulnspecError> {
        validate(data)?;
        self.image = Some(ImageData::Borrowed(data));
        Ok(())
    }

    /// Map `file` read-only, validate the mapping, and retain it until
    /// [`Interp::unload`].
    pub fn load_file(&mut self, file: &File) -> Result<(), VulnspecError> {
        // Safety: the mapping is private and read-only; the underlying
        // file is expected not to be truncated while loaded, as with any
        // mapped input.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(file)? };
        validate(&map)?;
        self.image = Some(ImageData::Mapped(map));
        Ok(())
    }

    /// Drop the active image, unmapping it if it was file-backed.
    pub fn unload(&mut self) {
        self.image = None;
    }

    /// `true` while an image is loaded.
    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// Set the `(vendor/product, version)` tuple evaluated against.
    pub fn set_subject(&mut self, vendprod: &str, version: &str) {
        self.vendprod = vendprod.to_string();
        self.version = version.to_string();
        self.vague = Some(VagueVersion::new(version));
    }

    /// Evaluate every CVE node against the current subject, invoking
    /// `on_match` per matching CVE.
    ///
    /// With no image, a header-only image, or an empty vendprod or
    /// version, returns [`EvalEnd::Completed`] without invoking the
    /// callback: no data, no decision.
    pub fn eval<F>(&self, mut on_match: F) -> Result<EvalEnd, VulnspecError>
    where
        F: FnMut(&CveMatch<'_>) -> Flow,
    {
        let image = match &self.image {
            None => return Ok(EvalEnd::Completed),
            Some(data) => data.bytes(),
        };
        if image.len() <= HEADER_SIZE + 4 {
            return Ok(EvalEnd::Completed);
        }
        if self.vendprod.is_empty() || self.version.is_empty() {
            return Ok(EvalEnd::Completed);
        }

        let mut offset = HEADER_SIZE as u32;
        while offset != 0 {
            let at = offset as usize;
            if NodeType::from_u32(read_u32(image, at)) != Some(NodeType::Cve) {
                return Err(VulnspecError::InvalidNode { offset });
            }

            if self.eval_vulnexpr(image, read_u32(image, at + cve::VULNEXPR))? {
                let m = CveMatch {
                    id: cstr(image, read_u32(image, at + cve::ID_OFF)),
                    cvss2: read_u32(image, at + cve::CVSS2) as f32 / 100.0,
                    cvss3: read_u32(image, at + cve::CVSS3) as f32 / 100.0,
                    desc: cstr(image, read_u32(image, at + cve::DESC_OFF)),
                };
                if on_match(&m) == Flow::Stop {
                    return Ok(EvalEnd::Stopped);
                }
            }

            offset = read_u32(image, at + cve::NEXT);
        }

        Ok(EvalEnd::Completed)
    }

    fn eval_vulnexpr(&self, image: &[u8], offset: u32) -> Result<bool, VulnspecError> {
        let nodet = NodeType::from_u32(read_u32(image, offset as usize))
            .ok_or(VulnspecError::InvalidNode { offset })?;
        if nodet.is_compar() {
            Ok(self.eval_compar(image, offset, nodet))
        } else if nodet.is_boolean() {
            self.eval_boolean(image, offset)
        } else {
            Err(VulnspecError::InvalidNode { offset })
        }
    }

    fn eval_boolean(&self, image: &[u8], mut offset: u32) -> Result<bool, VulnspecError> {
        let mut ret = false;
        while offset != 0 {
            let at = offset as usize;
            let nodet = NodeType::from_u32(read_u32(image, at))
                .filter(|t| t.is_boolean())
                .ok_or(VulnspecError::InvalidNode { offset })?;

            ret = self.eval_vulnexpr(image, read_u32(image, at + boolean::VALUE))?;
            match nodet {
                NodeType::And if !ret => break,
                NodeType::Or if ret => break,
                _ => {}
            }
            offset = read_u32(image, at + boolean::NEXT);
        }
        Ok(ret)
    }

    fn eval_compar(&self, image: &[u8], offset: u32, nodet: NodeType) -> bool {
        let at = offset as usize;
        let vendprod = cstr(image, read_u32(image, at + compar::VENDPROD_OFF));
        if vendprod != self.vendprod {
            return false;
        }

        let cmp = if read_u32(image, at + compar::VTYPE) == VersionType::Nalpha as u32 {
            let spec = cstr(image, read_u32(image, at + compar::NALPHA_OFF));
            nalpha_cmp(&self.version, spec)
        } else {
            let mut fields = [0u32; 4];
            for (i, f) in fields.iter_mut().enumerate() {
                *f = read_u32(image, at + compar::VAGUE_FIELDS_BASE + i * 4);
            }
            let vague = self.vague.as_ref().expect("subject version parsed");
            vague.fields().cmp(&fields)
        };

        match nodet {
            NodeType::Lt => cmp.is_lt(),
            NodeType::Le => cmp.is_le(),
            NodeType::Eq => cmp.is_eq(),
            NodeType::Ge => cmp.is_ge(),
            NodeType::Gt => cmp.is_gt(),
            _ => false,
        }
    }
}

/// Read the NUL-terminated string at `offset`.
///
/// Validation has already established termination inside the image; the
/// scan stops at the first NUL regardless.
fn cstr(image: &[u8], offset: u32) -> &str {
    let start = offset as usize;
    let end = image[start..]
        .iter()
        .position(|&b| b == 0)
        .map_or(image.len(), |p| start + p);
    std::str::from_utf8(&image[start..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::{EvalEnd, Flow, Interp};
    use crate::compile;

    fn matches_for(src: &[u8], vendprod: &str, version: &str) -> Vec<(String, f32, f32)> {
        let img = compile(src).unwrap();
        let mut interp = Interp::new();
        interp.load(&img).unwrap();
        interp.set_subject(vendprod, version);

        let mut out = Vec::new();
        let end = interp
            .eval(|m| {
                out.push((m.id.to_string(), m.cvss2, m.cvss3));
                Flow::Continue
            })
            .unwrap();
        assert_eq!(end, EvalEnd::Completed);
        out
    }

    const RANGE_SRC: &[u8] = br#"
        (cve "my-cve" 6.5 6.5 "bar"
          (^ (> "foo/bar" "1.2.2") (< "foo/bar" "1.2.4")))
    "#;

    #[test]
    fn vague_range_hits_inside() {
        let out = matches_for(RANGE_SRC, "foo/bar", "1.2.3");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "my-cve");
        assert!((out[0].2 - 6.5).abs() < f32::EPSILON);
    }

    #[test]
    fn vague_range_misses_boundaries() {
        assert!(matches_for(RANGE_SRC, "foo/bar", "1.2.4").is_empty());
        assert!(matches_for(RANGE_SRC, "foo/bar", "1.2.2").is_empty());
    }

    #[test]
    fn vendprod_must_match_exactly() {
        assert!(matches_for(RANGE_SRC, "foo/baz", "1.2.3").is_empty());
    }

    #[test]
    fn nalpha_equality_needs_suffix() {
        let src = br#"(cve "my-cve" 6.5 6.5 "bar" (nalpha (= "foo/bar" "1.2.3r")))"#;
        assert!(matches_for(src, "foo/bar", "1.2.3").is_empty());
        assert_eq!(matches_for(src, "foo/bar", "1.2.3r").len(), 1);
    }

    #[test]
    fn or_tries_every_arm() {
        let src = br#"
            (cve "either" 1.0 2.0 "d"
              (v (= "a/b" "1.0") (= "a/b" "2.0")))
        "#;
        assert_eq!(matches_for(src, "a/b", "2.0").len(), 1);
        assert_eq!(matches_for(src, "a/b", "1.0").len(), 1);
        assert!(matches_for(src, "a/b", "3.0").is_empty());
    }

    #[test]
    fn empty_subject_short_circuits() {
        let img = compile(RANGE_SRC).unwrap();
        let mut interp = Interp::new();
        interp.load(&img).unwrap();

        for (vp, ver) in [("", "1.2.3"), ("foo/bar", ""), ("", "")] {
            interp.set_subject(vp, ver);
            let mut called = false;
            let end = interp.eval(|_| {
                called = true;
                Flow::Continue
            });
            assert_eq!(end.unwrap(), EvalEnd::Completed);
            assert!(!called);
        }
    }

    #[test]
    fn stop_aborts_remaining_cves() {
        let src = br#"
            (cve "one" 1.0 1.0 "a" (>= "x/y" "0"))
            (cve "two" 2.0 2.0 "b" (>= "x/y" "0"))
        "#;
        let img = compile(src).unwrap();
        let mut interp = Interp::new();
        interp.load(&img).unwrap();
        interp.set_subject("x/y", "1");

        let mut seen = Vec::new();
        let end = interp
            .eval(|m| {
                seen.push(m.id.to_string());
                Flow::Stop
            })
            .unwrap();
        assert_eq!(end, EvalEnd::Stopped);
        assert_eq!(seen, vec!["one"]);
    }

    #[test]
    fn eval_without_image_is_a_no_op() {
        let interp = Interp::new();
        let end = interp.eval(|_| Flow::Stop).unwrap();
        assert_eq!(end, EvalEnd::Completed);
    }

    #[test]
    fn load_file_maps_and_evaluates() {
        use std::io::Write;

        let img = compile(RANGE_SRC).unwrap();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&img).unwrap();
        tmp.flush().unwrap();

        let file = tmp.reopen().unwrap();
        let mut interp = Interp::new();
        interp.load_file(&file).unwrap();
        interp.set_subject("foo/bar", "1.2.3");

        let mut hits = 0;
        interp
            .eval(|_| {
                hits += 1;
                Flow::Continue
            })
            .unwrap();
        assert_eq!(hits, 1);

        interp.unload();
        assert!(!interp.is_loaded());
    }

    #[test]
    fn corrupt_images_are_refused_at_load() {
        let mut img = compile(RANGE_SRC).unwrap();
        img[0] = b'X';
        let mut interp = Interp::new();
        assert!(interp.load(&img).is_err());
        assert!(!interp.is_loaded());
    }
}
