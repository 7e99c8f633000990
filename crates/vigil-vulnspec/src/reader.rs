// SPDX-License-Identifier: MIT OR Apache-2.0
//! S-expression token reader.

use crate::error::VulnspecError;

const MAX_SYMBOL: usize = 31;

/// Tokens produced by [`Reader::next_token`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    /// End of input.
    Eof,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// A quoted string; contents via [`Reader::string`].
    Str,
    /// An integer literal.
    Long(i64),
    /// A fractional literal.
    Double(f64),
    /// A bare symbol; contents via [`Reader::symbol`].
    Symbol,
}

impl Token {
    /// Short description used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Token::Eof => "end of input",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::Str => "string",
            Token::Long(_) => "integer",
            Token::Double(_) => "number",
            Token::Symbol => "symbol",
        }
    }
}

/// Tokenizer over vulnspec source bytes with row/column tracking.
#[derive(Debug)]
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    row: usize,
    col: usize,
    sval: Vec<u8>,
    symbol: String,
}

impl<'a> Reader<'a> {
    /// Create a reader over `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            row: 1,
            col: 0,
            sval: Vec::new(),
            symbol: String::new(),
        }
    }

    /// 1-based row of the read position.
    pub fn row(&self) -> usize {
        self.row
    }

    /// 0-based column of the read position.
    pub fn col(&self) -> usize {
        self.col
    }

    /// Contents of the most recent [`Token::Str`].
    pub fn string(&self) -> &[u8] {
        &self.sval
    }

    /// Contents of the most recent [`Token::Symbol`].
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn getc(&mut self) -> Option<u8> {
        let ch = *self.input.get(self.pos)?;
        self.pos += 1;
        if ch == b'\n' {
            self.row += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn invalid(&self) -> VulnspecError {
        VulnspecError::InvalidToken {
            row: self.row,
            col: self.col,
        }
    }

    /// Read the next token.
    pub fn next_token(&mut self) -> Result<Token, VulnspecError> {
        loop {
            let ch = match self.getc() {
                None => return Ok(Token::Eof),
                Some(c) => c,
            };

            match ch {
                b' ' | b'\t' | b'\r' | b'\n' => continue,
                b'(' => return Ok(Token::LParen),
                b')' => return Ok(Token::RParen),
                b'.' | b'-' | b'0'..=b'9' => return self.read_number(ch),
                b'"' => return self.read_string(),
                _ => return self.read_symbol(ch),
            }
        }
    }

    fn read_number(&mut self, first: u8) -> Result<Token, VulnspecError> {
        let mut ival: i64 = 0;
        let mut negate = false;
        let mut fpdiv: i64 = 0;

        match first {
            b'0'..=b'9' => ival = i64::from(first - b'0'),
            b'-' => negate = true,
            b'.' => fpdiv = 1,
            _ => return Err(self.invalid()),
        }

        while let Some(ch) = self.peek() {
            if ch != b'.' && !ch.is_ascii_digit() {
                break;
            }
            self.getc();

            fpdiv = fpdiv.saturating_mul(10);
            match ch {
                b'.' => {
                    if fpdiv != 0 {
                        return Err(self.invalid());
                    }
                    fpdiv = 1;
                }
                _ => {
                    ival = ival
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(ch - b'0')))
                        .ok_or_else(|| self.invalid())?;
                }
            }
        }

        if negate {
            ival = -ival;
        }

        if fpdiv != 0 {
            Ok(Token::Double(ival as f64 / fpdiv as f64))
        } else {
            Ok(Token::Long(ival))
        }
    }

    fn read_string(&mut self) -> Result<Token, VulnspecError> {
        // The opening quote is already consumed.
        self.sval.clear();
        loop {
            let ch = self.getc().ok_or_else(|| self.invalid())?;
            match ch {
                b'"' => return Ok(Token::Str),
                b'\\' => {
                    let escaped = self.getc().ok_or_else(|| self.invalid())?;
                    self.sval.push(escaped);
                }
                _ => self.sval.push(ch),
            }
        }
    }

    fn read_symbol(&mut self, first: u8) -> Result<Token, VulnspecError> {
        self.symbol.clear();
        self.symbol.push(first as char);
        loop {
            match self.peek() {
                None | Some(b'(') | Some(b')') | Some(b' ') | Some(b'\r') | Some(b'\n')
                | Some(b'\t') => return Ok(Token::Symbol),
                Some(ch) => {
                    if self.symbol.len() >= MAX_SYMBOL {
                        return Err(self.invalid());
                    }
                    self.getc();
                    self.symbol.push(ch as char);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Reader, Token};

    fn tokens(src: &str) -> Vec<Token> {
        let mut r = Reader::new(src.as_bytes());
        let mut out = Vec::new();
        loop {
            let t = r.next_token().unwrap();
            out.push(t);
            if t == Token::Eof {
                return out;
            }
        }
    }

    #[test]
    fn parens_and_symbols() {
        let ts = tokens("(cve)");
        assert_eq!(ts, vec![Token::LParen, Token::Symbol, Token::RParen, Token::Eof]);
    }

    #[test]
    fn strings_with_escapes() {
        let mut r = Reader::new(br#""a \"quoted\" \\ string""#);
        assert_eq!(r.next_token().unwrap(), Token::Str);
        assert_eq!(r.string(), br#"a "quoted" \ string"#);
    }

    #[test]
    fn numbers() {
        let mut r = Reader::new(b"42 -7 6.5 .25 -0.5");
        assert_eq!(r.next_token().unwrap(), Token::Long(42));
        assert_eq!(r.next_token().unwrap(), Token::Long(-7));
        assert_eq!(r.next_token().unwrap(), Token::Double(6.5));
        assert_eq!(r.next_token().unwrap(), Token::Double(0.25));
        assert_eq!(r.next_token().unwrap(), Token::Double(-0.5));
        assert_eq!(r.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn double_dot_is_invalid() {
        let mut r = Reader::new(b"1.2.3");
        assert!(r.next_token().is_err());
    }

    #[test]
    fn unterminated_string_is_invalid() {
        let mut r = Reader::new(b"\"oops");
        assert!(r.next_token().is_err());
    }

    #[test]
    fn row_col_track_newlines() {
        let mut r = Reader::new(b"(\n  cve");
        r.next_token().unwrap();
        r.next_token().unwrap();
        assert_eq!(r.row(), 2);
        assert!(r.col() > 0);
    }

    #[test]
    fn comparison_symbols() {
        let mut r = Reader::new(b"< <= = >= > ^ v nalpha");
        let mut seen = Vec::new();
        while let Token::Symbol = r.next_token().unwrap() {
            seen.push(r.symbol().to_string());
        }
        assert_eq!(seen, vec!["<", "<=", "=", ">=", ">", "^", "v", "nalpha"]);
    }
}
