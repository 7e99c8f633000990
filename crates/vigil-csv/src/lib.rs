// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil-csv
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! RFC 4180 row encoding and incremental row reading for the collation
//! report files. Rows terminate with CRLF; a row is always encoded into a
//! buffer as a whole, so an output file never receives a partial row.

use std::io::{self, BufRead};

use vigil_mem::Buf;

/// Encode one row into `dst`, appending the CRLF terminator.
///
/// Fields containing a comma, quote, CR or LF are quoted, with embedded
/// quotes doubled.
pub fn encode_row(dst: &mut Buf, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            dst.push_byte(b',');
        }
        if needs_quoting(field) {
            dst.push_byte(b'"');
            for &b in field.as_bytes() {
                if b == b'"' {
                    dst.push_byte(b'"');
                }
                dst.push_byte(b);
            }
            dst.push_byte(b'"');
        } else {
            dst.push_bytes(field.as_bytes());
        }
    }
    dst.push_bytes(b"\r\n");
}

fn needs_quoting(field: &str) -> bool {
    field
        .bytes()
        .any(|b| matches!(b, b',' | b'"' | b'\r' | b'\n'))
}

/// Incremental CSV row reader.
///
/// Reads one row at a time from any [`BufRead`], handling quoted fields
/// and both CRLF and bare-LF row terminators. Column accessors return
/// `None` past the end of the row, which the mode drivers use to skip
/// short or malformed rows.
#[derive(Debug, Default)]
pub struct CsvReader {
    cols: Vec<String>,
}

impl CsvReader {
    /// Create a reader with no row loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the next row. Returns `Ok(false)` at end of input.
    pub fn read_row<R: BufRead>(&mut self, input: &mut R) -> io::Result<bool> {
        self.cols.clear();

        let mut field: Vec<u8> = Vec::new();
        let mut in_quotes = false;
        let mut seen_any = false;

        loop {
            let mut byte = [0u8; 1];
            let n = read_one(input, &mut byte)?;
            if n == 0 {
                if in_quotes {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "unterminated quoted field",
                    ));
                }
                if seen_any {
                    self.commit(&mut field);
                    return Ok(true);
                }
                return Ok(false);
            }
            seen_any = true;
            let b = byte[0];

            if in_quotes {
                if b == b'"' {
                    let mut peek = [0u8; 1];
                    let n = read_one(input, &mut peek)?;
                    if n == 1 && peek[0] == b'"' {
                        field.push(b'"');
                    } else {
                        in_quotes = false;
                        if n == 1 {
                            match peek[0] {
                                b',' => self.commit(&mut field),
                                b'\n' => {
                                    self.commit(&mut field);
                                    return Ok(true);
                                }
                                b'\r' => {
                                    consume_lf(input)?;
                                    self.commit(&mut field);
                                    return Ok(true);
                                }
                                other => field.push(other),
                            }
                        } else {
                            self.commit(&mut field);
                            return Ok(true);
                        }
                    }
                } else {
                    field.push(b);
                }
                continue;
            }

            match b {
                b'"' if field.is_empty() => in_quotes = true,
                b',' => self.commit(&mut field),
                b'\n' => {
                    self.commit(&mut field);
                    return Ok(true);
                }
                b'\r' => {
                    consume_lf(input)?;
                    self.commit(&mut field);
                    return Ok(true);
                }
                other => field.push(other),
            }
        }
    }

    fn commit(&mut self, field: &mut Vec<u8>) {
        self.cols
            .push(String::from_utf8_lossy(field).into_owned());
        field.clear();
    }

    /// Number of columns in the current row.
    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    /// Column `i` of the current row, or `None` past the end.
    pub fn elem(&self, i: usize) -> Option<&str> {
        self.cols.get(i).map(String::as_str)
    }
}

fn read_one<R: BufRead>(input: &mut R, byte: &mut [u8; 1]) -> io::Result<usize> {
    loop {
        match input.read(byte) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn consume_lf<R: BufRead>(input: &mut R) -> io::Result<()> {
    let buf = input.fill_buf()?;
    if buf.first() == Some(&b'\n') {
        input.consume(1);
    }
    Ok(())
}
