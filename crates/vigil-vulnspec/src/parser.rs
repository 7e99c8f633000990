// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive-descent parser emitting bytecode.

use vigil_table::OrderedMap;
use vigil_version::VagueVersion;

use crate::error::VulnspecError;
use crate::node::{boolean, compar, cve, CValue};
use crate::node::{NodeType, VersionType, BOOLEAN_NODE_SIZE, COMPAR_NODE_SIZE, CVE_NODE_SIZE};
use crate::progn::Progn;
use crate::reader::{Reader, Token};

/// Compiler from vulnspec source to a bytecode image.
///
/// Strings are interned: each unique string is written to the image once
/// and later references reuse its `(length, offset)`. Whether a compar
/// node inlines a parsed vague version or references an interned version
/// string depends on whether the node lies inside a `nalpha` subtree.
#[derive(Debug)]
pub struct Parser {
    vtype: VersionType,
    strtab: OrderedMap<CValue>,
    progn: Progn,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser with an empty image.
    pub fn new() -> Self {
        Self {
            vtype: VersionType::Vague,
            strtab: OrderedMap::new(),
            progn: Progn::new(),
        }
    }

    /// Parse `src`, appending its CVE forms to the image.
    pub fn parse(&mut self, src: &[u8]) -> Result<(), VulnspecError> {
        let mut reader = Reader::new(src);
        let mut prev: u32 = 0;

        loop {
            match reader.next_token()? {
                Token::Eof => return Ok(()),
                Token::LParen => {}
                tok => return Err(unexpected(&reader, tok)),
            }

            match self.read_node_symbol(&mut reader)? {
                NodeType::Cve => {}
                _ => return Err(unexpected(&reader, Token::Symbol)),
            }
            let curr = self.parse_cve(&mut reader)?;
            expect(&mut reader, Token::RParen)?;

            if prev != 0 {
                self.progn.put_u32(prev, cve::NEXT, curr);
            }
            prev = curr;
        }
    }

    /// Hand over the finished image writer.
    pub fn into_progn(self) -> Progn {
        self.progn
    }

    fn parse_cve(&mut self, reader: &mut Reader<'_>) -> Result<u32, VulnspecError> {
        let node = self.progn.alloc(CVE_NODE_SIZE)?;

        let id = self.load_string(reader)?;
        let cvss2 = expect_double(reader)?;
        let cvss3 = expect_double(reader)?;
        let desc = self.load_string(reader)?;

        expect(reader, Token::LParen)?;
        let vulnexpr = self.parse_vulnexpr(reader)?;

        self.progn.put_u32(node, cve::TYPE, NodeType::Cve as u32);
        self.progn.put_u32(node, cve::CVSS2, (cvss2 * 100.0) as u32);
        self.progn.put_u32(node, cve::CVSS3, (cvss3 * 100.0) as u32);
        self.progn.put_u32(node, cve::ID_LEN, id.length);
        self.progn.put_u32(node, cve::ID_OFF, id.offset);
        self.progn.put_u32(node, cve::DESC_LEN, desc.length);
        self.progn.put_u32(node, cve::DESC_OFF, desc.offset);
        self.progn.put_u32(node, cve::VULNEXPR, vulnexpr);
        Ok(node)
    }

    /// Parse one expression form. The opening paren is already consumed;
    /// the form's closing paren is consumed before returning.
    fn parse_vulnexpr(&mut self, reader: &mut Reader<'_>) -> Result<u32, VulnspecError> {
        let nodet = self.read_node_symbol(reader)?;
        match nodet {
            t if t.is_compar() => self.parse_compar(reader, t),
            t if t.is_boolean() => self.parse_boolean(reader, t),
            NodeType::Nalpha => self.parse_nalpha(reader),
            _ => Err(unexpected(reader, Token::Symbol)),
        }
    }

    fn parse_compar(
        &mut self,
        reader: &mut Reader<'_>,
        nodet: NodeType,
    ) -> Result<u32, VulnspecError> {
        let node = self.progn.alloc(COMPAR_NODE_SIZE)?;
        let vendprod = self.load_string(reader)?;

        self.progn.put_u32(node, compar::TYPE, nodet as u32);
        self.progn.put_u32(node, compar::VENDPROD_LEN, vendprod.length);
        self.progn.put_u32(node, compar::VENDPROD_OFF, vendprod.offset);
        self.progn.put_u32(node, compar::VTYPE, self.vtype as u32);

        match self.vtype {
            VersionType::Vague => {
                // The version text is parsed into the node, not interned.
                expect(reader, Token::Str)?;
                let text = String::from_utf8_lossy(reader.string()).into_owned();
                let vague = VagueVersion::new(&text);
                self.progn
                    .put_u32(node, compar::VAGUE_NUSED, vague.field_count() as u32);
                for (i, field) in vague.fields().iter().enumerate() {
                    self.progn
                        .put_u32(node, compar::VAGUE_FIELDS_BASE + i * 4, *field);
                }
            }
            VersionType::Nalpha => {
                let version = self.load_string(reader)?;
                self.progn.put_u32(node, compar::NALPHA_LEN, version.length);
                self.progn.put_u32(node, compar::NALPHA_OFF, version.offset);
            }
        }

        expect(reader, Token::RParen)?;
        Ok(node)
    }

    fn parse_boolean(
        &mut self,
        reader: &mut Reader<'_>,
        nodet: NodeType,
    ) -> Result<u32, VulnspecError> {
        let mut first: u32 = 0;
        let mut prev: u32 = 0;

        loop {
            match reader.next_token()? {
                Token::LParen => {}
                Token::RParen => break,
                tok => return Err(unexpected(reader, tok)),
            }

            let node = self.progn.alloc(BOOLEAN_NODE_SIZE)?;
            if first == 0 {
                first = node;
            }

            let value = self.parse_vulnexpr(reader)?;
            self.progn.put_u32(node, boolean::TYPE, nodet as u32);
            self.progn.put_u32(node, boolean::VALUE, value);
            if prev != 0 {
                self.progn.put_u32(prev, boolean::NEXT, node);
            }
            prev = node;
        }

        if first == 0 {
            // An AND/OR with no operands has no defined value.
            return Err(unexpected(reader, Token::RParen));
        }
        Ok(first)
    }

    fn parse_nalpha(&mut self, reader: &mut Reader<'_>) -> Result<u32, VulnspecError> {
        let saved = self.vtype;
        self.vtype = VersionType::Nalpha;
        expect(reader, Token::LParen)?;
        let value = self.parse_vulnexpr(reader)?;
        expect(reader, Token::RParen)?;
        self.vtype = saved;
        Ok(value)
    }

    fn read_node_symbol(&mut self, reader: &mut Reader<'_>) -> Result<NodeType, VulnspecError> {
        match reader.next_token()? {
            Token::Symbol => {}
            tok => return Err(unexpected(reader, tok)),
        }
        Ok(match reader.symbol() {
            "v" => NodeType::Or,
            "^" => NodeType::And,
            "<" => NodeType::Lt,
            "<=" => NodeType::Le,
            "=" => NodeType::Eq,
            ">=" => NodeType::Ge,
            ">" => NodeType::Gt,
            "cve" => NodeType::Cve,
            "nalpha" => NodeType::Nalpha,
            _ => NodeType::Invalid,
        })
    }

    fn load_string(&mut self, reader: &mut Reader<'_>) -> Result<CValue, VulnspecError> {
        expect(reader, Token::Str)?;
        let text = String::from_utf8_lossy(reader.string()).into_owned();
        if let Some(cval) = self.strtab.get(&text) {
            return Ok(*cval);
        }

        let (length, offset) = self.progn.alloc_str(text.as_bytes())?;
        let cval = CValue { length, offset };
        self.strtab.set(&text, cval);
        Ok(cval)
    }
}

fn expect(reader: &mut Reader<'_>, want: Token) -> Result<(), VulnspecError> {
    let got = reader.next_token()?;
    if std::mem::discriminant(&got) == std::mem::discriminant(&want) {
        Ok(())
    } else {
        Err(unexpected(reader, got))
    }
}

fn expect_double(reader: &mut Reader<'_>) -> Result<f64, VulnspecError> {
    match reader.next_token()? {
        Token::Double(v) => Ok(v),
        tok => Err(unexpected(reader, tok)),
    }
}

fn unexpected(reader: &Reader<'_>, got: Token) -> VulnspecError {
    VulnspecError::UnexpectedToken {
        got: got.describe(),
        row: reader.row(),
        col: reader.col(),
    }
}

#[cfg(test)]
mod tests {
    use crate::compile;
    use crate::node::{read_u32, NodeType, HEADER, HEADER_SIZE};
    use crate::validate;

    #[test]
    fn minimal_cve_compiles_and_validates() {
        let img = compile(
            br#"(cve "CVE-1" 6.5 6.5 "desc" (> "foo/bar" "1.2.2"))"#,
        )
        .unwrap();
        assert_eq!(&img[..HEADER_SIZE], &HEADER);
        assert_eq!(read_u32(&img, HEADER_SIZE), NodeType::Cve as u32);
        // single CVE, no successor
        assert_eq!(read_u32(&img, HEADER_SIZE + 4), 0);
        // cvss fixed point
        assert_eq!(read_u32(&img, HEADER_SIZE + 8), 650);
        validate(&img).unwrap();
    }

    #[test]
    fn cve_nodes_are_linked_in_order() {
        let img = compile(
            br#"
            (cve "CVE-1" 1.0 1.0 "a" (> "x/y" "1"))
            (cve "CVE-2" 2.0 2.0 "b" (> "x/y" "2"))
            "#,
        )
        .unwrap();
        let next = read_u32(&img, HEADER_SIZE + 4);
        assert!(next as usize >= HEADER_SIZE);
        assert_eq!(read_u32(&img, next as usize), NodeType::Cve as u32);
        assert_eq!(read_u32(&img, next as usize + 4), 0);
        validate(&img).unwrap();
    }

    #[test]
    fn strings_are_interned_once() {
        let one = compile(br#"(cve "X" 1.0 1.0 "X" (> "a/b" "1"))"#).unwrap();
        let twice = compile(
            br#"
            (cve "X" 1.0 1.0 "X" (> "a/b" "1"))
            (cve "Y" 1.0 1.0 "Y" (> "a/b" "2"))
            "#,
        )
        .unwrap();
        // "a/b" appears once in both images; the second CVE only adds its
        // own id/desc strings and nodes.
        let occurrences = |img: &[u8]| {
            img.windows(4)
                .filter(|w| *w == b"a/b\0")
                .count()
        };
        assert_eq!(occurrences(&one), 1);
        assert_eq!(occurrences(&twice), 1);
    }

    #[test]
    fn booleans_and_nalpha_forms() {
        let img = compile(
            br#"
            (cve "CVE-3" 6.5 6.5 "d"
              (v (^ (> "foo/bar" "1.2.2") (< "foo/bar" "1.2.4"))
                 (nalpha (= "foo/bar" "1.2.3r"))))
            "#,
        )
        .unwrap();
        validate(&img).unwrap();
    }

    #[test]
    fn rejects_malformed_source() {
        assert!(compile(b"(").is_err());
        assert!(compile(b"(frob)").is_err());
        assert!(compile(br#"(cve "X" 1.0 1.0 "d" ())"#).is_err());
        assert!(compile(br#"(cve "X" 1 1 "d" (> "a/b" "1"))"#).is_err());
        assert!(compile(br#"(cve "X" 1.0 1.0 "d" (> "a/b"))"#).is_err());
        assert!(compile(br#"cve"#).is_err());
    }

    #[test]
    fn empty_source_yields_header_only_image() {
        let img = compile(b"  \n ").unwrap();
        assert_eq!(img.len(), HEADER_SIZE);
    }
}
