//! PDF lexer (tokenizer).
//!
//! The [`Scanner`] turns a [`ByteStream`] into PDF tokens with one token of
//! lookahead. It decodes string escapes and name `#HH` escapes itself, so
//! the value reader only ever sees final bytes.
//!
//! # PDF Syntax Overview
//!
//! - Numbers: integers (42, -123) and reals (3.14, -2.5, .5); no exponents
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /Pages)
//! - Delimiters: `[`, `]`, `<<`, `>>`
//! - Keywords: true, false, null, obj, endobj, stream, endstream, R,
//!   xref, trailer, startxref; anything else is a bare keyword
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are
//! skipped, except `%PDF-` and `%%EOF` which surface as tokens.

use crate::error::{Error, Result};
use crate::source::ByteStream;
use nom::{
    IResult,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, opt},
    sequence::preceded,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Name with `#HH` escapes decoded (e.g., "Type" from "/Type")
    Name(Vec<u8>),
    /// Literal string with escapes decoded
    String(Vec<u8>),
    /// Hexadecimal string, decoded to bytes
    HexString(Vec<u8>),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `obj`
    Obj,
    /// `endobj`
    EndObj,
    /// `stream`
    Stream,
    /// `endstream`
    EndStream,
    /// `R`
    R,
    /// `xref`
    Xref,
    /// `trailer`
    Trailer,
    /// `startxref`
    StartXref,
    /// Any other bare word (including the xref entry flags `n` and `f`)
    Keyword(String),
    /// `%PDF-M.N` header comment; holds the text after the dash
    Header(String),
    /// `%%EOF` marker
    EofMarker,
}

impl Token {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(i) => format!("integer {}", i),
            Token::Real(r) => format!("real {}", r),
            Token::Name(n) => format!("name /{}", String::from_utf8_lossy(n)),
            Token::String(_) => "string".to_string(),
            Token::HexString(_) => "hex string".to_string(),
            Token::ArrayStart => "'['".to_string(),
            Token::ArrayEnd => "']'".to_string(),
            Token::DictStart => "'<<'".to_string(),
            Token::DictEnd => "'>>'".to_string(),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
            Token::Obj => "'obj'".to_string(),
            Token::EndObj => "'endobj'".to_string(),
            Token::Stream => "'stream'".to_string(),
            Token::EndStream => "'endstream'".to_string(),
            Token::R => "'R'".to_string(),
            Token::Xref => "'xref'".to_string(),
            Token::Trailer => "'trailer'".to_string(),
            Token::StartXref => "'startxref'".to_string(),
            Token::Keyword(k) => format!("keyword '{}'", k),
            Token::Header(_) => "header comment".to_string(),
            Token::EofMarker => "'%%EOF'".to_string(),
        }
    }
}

/// PDF whitespace characters.
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

/// PDF delimiter characters.
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Numeric grammar: optional sign, digits, optional fraction.
///
/// Accepts 42, -17, +3, 3.14, .5, 5., -.002.
fn number(input: &[u8]) -> IResult<&[u8], Token> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let negative = sign == Some('-');
    let int_str = int_part
        .map(|d| String::from_utf8_lossy(d).into_owned())
        .unwrap_or_else(|| "0".to_string());

    match frac_part {
        Some(frac) => {
            let frac_str = frac
                .map(|d| String::from_utf8_lossy(d).into_owned())
                .unwrap_or_else(|| "0".to_string());
            let magnitude: f64 = format!("{}.{}", int_str, frac_str).parse().map_err(|_| {
                nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
            })?;
            Ok((input, Token::Real(if negative { -magnitude } else { magnitude })))
        },
        None => match int_str.parse::<u64>().ok().and_then(|n| signed(n, negative)) {
            Some(n) => Ok((input, Token::Integer(n))),
            // Too large for i64: keep the magnitude as a real.
            None => {
                let magnitude: f64 = int_str.parse().map_err(|_| {
                    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
                })?;
                Ok((input, Token::Real(if negative { -magnitude } else { magnitude })))
            },
        },
    }
}

fn signed(magnitude: u64, negative: bool) -> Option<i64> {
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Parse a complete numeric word, rejecting exponent form and trailing junk.
pub fn parse_number(word: &[u8], offset: u64) -> Result<Token> {
    match all_consuming(number)(word) {
        Ok((_, token)) => Ok(token),
        Err(_) if word.iter().any(|&b| b == b'e' || b == b'E') => Err(Error::lex(
            offset,
            format!("exponent form is not allowed: {}", String::from_utf8_lossy(word)),
        )),
        Err(_) => Err(Error::lex(
            offset,
            format!("invalid number: {}", String::from_utf8_lossy(word)),
        )),
    }
}

fn keyword(word: &[u8]) -> Token {
    match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::Obj,
        b"endobj" => Token::EndObj,
        b"stream" => Token::Stream,
        b"endstream" => Token::EndStream,
        b"R" => Token::R,
        b"xref" => Token::Xref,
        b"trailer" => Token::Trailer,
        b"startxref" => Token::StartXref,
        other => Token::Keyword(String::from_utf8_lossy(other).into_owned()),
    }
}

/// Token scanner with one token of lookahead.
#[derive(Debug)]
pub struct Scanner<S> {
    stream: S,
    peeked: Option<(u64, Option<Token>)>,
    token_start: u64,
}

impl<S: ByteStream> Scanner<S> {
    /// Scanner over `stream`, starting at its current position.
    pub fn new(stream: S) -> Self {
        let token_start = stream.position();
        Self {
            stream,
            peeked: None,
            token_start,
        }
    }

    /// Offset where the next token starts (or where scanning resumes).
    pub fn position(&self) -> u64 {
        match &self.peeked {
            Some((offset, _)) => *offset,
            None => self.stream.position(),
        }
    }

    /// Offset of the most recently returned token.
    pub fn token_offset(&self) -> u64 {
        self.token_start
    }

    /// Restart scanning at `offset`, dropping any lookahead.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.peeked = None;
        self.stream.seek(offset)
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&Token>> {
        if self.peeked.is_none() {
            let (offset, token) = self.scan()?;
            self.peeked = Some((offset, token));
        }
        Ok(self.peeked.as_ref().and_then(|(_, t)| t.as_ref()))
    }

    /// Consume the next token; `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        let (offset, token) = match self.peeked.take() {
            Some(p) => p,
            None => self.scan()?,
        };
        self.token_start = offset;
        Ok(token)
    }

    /// Drop lookahead and move the byte stream back to where it began.
    fn rewind_lookahead(&mut self) -> Result<()> {
        if let Some((offset, _)) = self.peeked.take() {
            self.stream.seek(offset)?;
        }
        Ok(())
    }

    /// Skip the end-of-line that follows the `stream` keyword.
    ///
    /// Accepts CRLF, LF, or a lone CR (tolerated with a warning).
    pub fn skip_stream_eol(&mut self) -> Result<()> {
        self.rewind_lookahead()?;
        // Some writers put spaces between `stream` and the EOL.
        while self.stream.peek()? == Some(b' ') {
            self.stream.consume()?;
        }
        match self.stream.peek()? {
            Some(b'\r') => {
                self.stream.consume()?;
                if self.stream.peek()? == Some(b'\n') {
                    self.stream.consume()?;
                } else {
                    log::warn!(
                        "stream keyword followed by bare CR at byte {}",
                        self.stream.position()
                    );
                }
            },
            Some(b'\n') => {
                self.stream.consume()?;
            },
            _ => {
                log::warn!(
                    "stream keyword not followed by EOL at byte {}",
                    self.stream.position()
                );
            },
        }
        Ok(())
    }

    /// Skip whitespace at the byte level (no comment handling).
    pub fn skip_whitespace(&mut self) -> Result<()> {
        self.rewind_lookahead()?;
        while let Some(b) = self.stream.peek()? {
            if !is_whitespace(b) {
                break;
            }
            self.stream.consume()?;
        }
        Ok(())
    }

    /// Switch to raw mode and consume exactly `len` bytes (fewer at end of input).
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        self.rewind_lookahead()?;
        self.stream.read_raw(len)
    }

    /// Access the underlying byte stream.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the scanner and return the byte stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn scan(&mut self) -> Result<(u64, Option<Token>)> {
        loop {
            while let Some(b) = self.stream.peek()? {
                if !is_whitespace(b) {
                    break;
                }
                self.stream.consume()?;
            }

            let start = self.stream.position();
            let b = match self.stream.consume()? {
                Some(b) => b,
                None => return Ok((start, None)),
            };

            let token = match b {
                b'%' => match self.scan_comment()? {
                    Some(token) => token,
                    None => continue,
                },
                b'(' => self.scan_literal_string(start)?,
                b'<' => {
                    if self.stream.peek()? == Some(b'<') {
                        self.stream.consume()?;
                        Token::DictStart
                    } else {
                        self.scan_hex_string(start)?
                    }
                },
                b'>' => {
                    if self.stream.peek()? == Some(b'>') {
                        self.stream.consume()?;
                        Token::DictEnd
                    } else {
                        return Err(Error::lex(start, "unexpected '>'"));
                    }
                },
                b'[' => Token::ArrayStart,
                b']' => Token::ArrayEnd,
                b'{' | b'}' => Token::Keyword((b as char).to_string()),
                b')' => return Err(Error::lex(start, "unbalanced ')'")),
                b'/' => self.scan_name(start)?,
                _ => {
                    let mut word = vec![b];
                    while let Some(next) = self.stream.peek()? {
                        if !is_regular(next) {
                            break;
                        }
                        word.push(next);
                        self.stream.consume()?;
                    }
                    if matches!(b, b'0'..=b'9' | b'+' | b'-' | b'.') {
                        parse_number(&word, start)?
                    } else {
                        keyword(&word)
                    }
                },
            };
            return Ok((start, Some(token)));
        }
    }

    /// Read a comment after `%`. Returns a token for `%PDF-` and `%%EOF`.
    fn scan_comment(&mut self) -> Result<Option<Token>> {
        let mut text = Vec::new();
        while let Some(b) = self.stream.peek()? {
            if b == b'\r' || b == b'\n' {
                break;
            }
            text.push(b);
            self.stream.consume()?;
        }
        if let Some(version) = text.strip_prefix(b"PDF-") {
            let version = String::from_utf8_lossy(version).trim().to_string();
            return Ok(Some(Token::Header(version)));
        }
        if text.starts_with(b"%EOF") {
            return Ok(Some(Token::EofMarker));
        }
        Ok(None)
    }

    /// Literal string after `(`: balanced parentheses, backslash escapes,
    /// octal codes, and line continuations. Bare CR and CRLF become LF.
    fn scan_literal_string(&mut self, start: u64) -> Result<Token> {
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            let b = self
                .stream
                .consume()?
                .ok_or_else(|| Error::lex(start, "unterminated literal string"))?;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                },
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Token::String(out));
                    }
                    out.push(b);
                },
                b'\r' => {
                    if self.stream.peek()? == Some(b'\n') {
                        self.stream.consume()?;
                    }
                    out.push(b'\n');
                },
                b'\\' => {
                    let escape_at = self.stream.position();
                    let e = self
                        .stream
                        .consume()?
                        .ok_or_else(|| Error::lex(start, "unterminated literal string"))?;
                    match e {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(b'\x08'),
                        b'f' => out.push(b'\x0c'),
                        b'(' | b')' | b'\\' => out.push(e),
                        b'0'..=b'7' => {
                            let mut code = u32::from(e - b'0');
                            for _ in 0..2 {
                                match self.stream.peek()? {
                                    Some(d @ b'0'..=b'7') => {
                                        code = code * 8 + u32::from(d - b'0');
                                        self.stream.consume()?;
                                    },
                                    _ => break,
                                }
                            }
                            out.push((code & 0xFF) as u8);
                        },
                        b'\r' => {
                            if self.stream.peek()? == Some(b'\n') {
                                self.stream.consume()?;
                            }
                        },
                        b'\n' => {},
                        other => {
                            return Err(Error::lex(
                                escape_at,
                                format!("invalid escape sequence '\\{}'", other as char),
                            ));
                        },
                    }
                },
                _ => out.push(b),
            }
        }
    }

    /// Hex string after `<`: whitespace ignored, odd length padded with 0.
    fn scan_hex_string(&mut self, start: u64) -> Result<Token> {
        let mut out = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            let at = self.stream.position();
            let b = self
                .stream
                .consume()?
                .ok_or_else(|| Error::lex(start, "unterminated hex string"))?;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let nibble = hex_value(b).ok_or_else(|| {
                Error::lex(at, format!("invalid hex digit '{}'", b as char))
            })?;
            match high.take() {
                Some(h) => out.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(h) = high {
            out.push(h << 4);
        }
        Ok(Token::HexString(out))
    }

    /// Name after `/`, decoding `#HH` escapes.
    fn scan_name(&mut self, start: u64) -> Result<Token> {
        let mut bytes = Vec::new();
        while let Some(b) = self.stream.peek()? {
            if !is_regular(b) {
                break;
            }
            self.stream.consume()?;
            if b == b'#' {
                let hi = self.stream.consume()?.and_then(hex_value);
                let lo = self.stream.consume()?.and_then(hex_value);
                match (hi, lo) {
                    (Some(0), Some(0)) => return Err(Error::lex(start, "NUL byte in name")),
                    (Some(h), Some(l)) => bytes.push((h << 4) | l),
                    _ => return Err(Error::lex(start, "invalid #HH escape in name")),
                }
            } else {
                bytes.push(b);
            }
        }
        if bytes.is_empty() {
            return Err(Error::lex(start, "empty name"));
        }
        Ok(Token::Name(bytes))
    }
}
