//! PDF value reader.
//!
//! Combines tokens from the [`Scanner`] into complete values (arrays,
//! dictionaries, indirect references, ...) and indirect object definitions.
//!
//! # Architecture
//!
//! The reader is recursive descent with a small queue of pending tokens on
//! top of the scanner. `12 0 R` needs two tokens of lookahead after the
//! first integer; tokens read ahead but not used stay queued for the next
//! call, so the scanner itself only ever moves forward.
//!
//! Stream bodies are not read here: [`ObjectParser::read_indirect`] stops
//! right after the end-of-line that follows `stream` and reports the offset
//! of the first data byte. The caller resolves `/Length` (which may itself
//! be an indirect reference) and reads the payload in raw mode.

use crate::error::{Error, Result};
use crate::lexer::{Scanner, Token};
use crate::object::{Dictionary, ObjectRef, Value};
use crate::source::ByteStream;
use std::collections::VecDeque;

/// Default limit on array/dictionary nesting.
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Header and value of an indirect object definition (`N G obj ... endobj`).
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// Number and generation from the `N G obj` header
    pub reference: ObjectRef,
    /// The object's value (the stream dictionary for streams)
    pub value: Value,
    /// Offset of the first stream data byte, if the value is followed by `stream`
    pub stream_offset: Option<u64>,
    /// Whether `endobj` was seen (always `false` for streams, whose
    /// `endobj` comes after the payload)
    pub has_endobj: bool,
}

/// Recursive-descent value reader.
#[derive(Debug)]
pub struct ObjectParser<S> {
    scanner: Scanner<S>,
    pending: VecDeque<(u64, Token)>,
    max_nesting: usize,
}

impl<S: ByteStream> ObjectParser<S> {
    /// Reader over `stream`, starting at its current position.
    pub fn new(stream: S) -> Self {
        Self {
            scanner: Scanner::new(stream),
            pending: VecDeque::new(),
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    /// Set the nesting limit for arrays and dictionaries.
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Offset where the next token starts.
    pub fn position(&self) -> u64 {
        match self.pending.front() {
            Some((offset, _)) => *offset,
            None => self.scanner.position(),
        }
    }

    /// Restart reading at `offset`.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.pending.clear();
        self.scanner.seek(offset)
    }

    /// Consume the next token; `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.next_with_offset()?.map(|(_, token)| token))
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<&Token>> {
        self.peek_nth(0)
    }

    /// Skip whitespace bytes in raw mode (comments are not skipped).
    pub fn skip_whitespace(&mut self) -> Result<()> {
        self.unread()?;
        self.scanner.skip_whitespace()
    }

    /// Consume up to `len` raw bytes at the current position.
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        self.unread()?;
        self.scanner.read_raw(len)
    }

    /// Read one complete value.
    pub fn read_value(&mut self) -> Result<Value> {
        self.read_value_at(0)
    }

    /// Read an indirect object definition: `N G obj <value> [stream | endobj]`.
    ///
    /// A missing `endobj` is not an error here; `has_endobj` tells the
    /// caller, which decides whether to tolerate it.
    pub fn read_indirect(&mut self) -> Result<IndirectObject> {
        let (offset, first) = self.expect_token("object number")?;
        let number = match first {
            Token::Integer(n) if n >= 0 && n <= i64::from(u32::MAX) => n as u32,
            other => {
                return Err(Error::syntax(
                    offset,
                    format!("expected object number, found {}", other.describe()),
                ));
            },
        };
        let (offset, second) = self.expect_token("generation number")?;
        let generation = match second {
            Token::Integer(g) if g >= 0 && g <= i64::from(u16::MAX) => g as u16,
            other => {
                return Err(Error::syntax(
                    offset,
                    format!("expected generation number, found {}", other.describe()),
                ));
            },
        };
        let (offset, keyword) = self.expect_token("'obj'")?;
        if keyword != Token::Obj {
            return Err(Error::syntax(
                offset,
                format!("expected 'obj', found {}", keyword.describe()),
            ));
        }

        let reference = ObjectRef::new(number, generation);
        let value = self.read_value()?;

        match self.peek_nth(0)? {
            Some(Token::Stream) => {
                let (offset, _) = self.expect_token("'stream'")?;
                if value.as_dict().is_none() {
                    return Err(Error::syntax(
                        offset,
                        format!("stream in object {} without a dictionary", reference),
                    ));
                }
                self.scanner.skip_stream_eol()?;
                Ok(IndirectObject {
                    reference,
                    value,
                    stream_offset: Some(self.scanner.position()),
                    has_endobj: false,
                })
            },
            Some(Token::EndObj) => {
                self.next_with_offset()?;
                Ok(IndirectObject {
                    reference,
                    value,
                    stream_offset: None,
                    has_endobj: true,
                })
            },
            _ => Ok(IndirectObject {
                reference,
                value,
                stream_offset: None,
                has_endobj: false,
            }),
        }
    }

    /// Give the byte stream back.
    pub fn into_inner(self) -> S {
        self.scanner.into_inner()
    }

    fn read_value_at(&mut self, depth: usize) -> Result<Value> {
        let (offset, token) = self.expect_token("a value")?;
        match token {
            Token::Null => Ok(Value::Null),
            Token::True => Ok(Value::Boolean(true)),
            Token::False => Ok(Value::Boolean(false)),
            Token::Real(r) => Ok(Value::Real(r)),
            Token::Name(name) => Ok(Value::Name(name)),
            Token::String(bytes) => Ok(Value::String(bytes)),
            Token::HexString(bytes) => {
                if looks_like_text(&bytes) {
                    Ok(Value::String(bytes))
                } else {
                    Ok(Value::Binary(bytes))
                }
            },
            Token::Integer(i) => {
                if let Some(reference) = self.try_reference(i)? {
                    return Ok(Value::Reference(reference));
                }
                Ok(Value::Integer(i))
            },
            Token::ArrayStart => self.read_array(offset, depth + 1),
            Token::DictStart => self.read_dictionary(offset, depth + 1),
            Token::Keyword(word) => {
                Err(Error::syntax(offset, format!("unexpected keyword '{}'", word)))
            },
            other => Err(Error::syntax(offset, format!("unexpected {}", other.describe()))),
        }
    }

    /// After an integer, check for `G R` and consume it if present.
    fn try_reference(&mut self, number: i64) -> Result<Option<ObjectRef>> {
        if number < 0 || number > i64::from(u32::MAX) {
            return Ok(None);
        }
        let generation = match self.peek_nth(0)? {
            Some(Token::Integer(g)) if *g >= 0 && *g <= i64::from(u16::MAX) => *g as u16,
            _ => return Ok(None),
        };
        if self.peek_nth(1)? != Some(&Token::R) {
            return Ok(None);
        }
        self.pending.pop_front();
        self.pending.pop_front();
        Ok(Some(ObjectRef::new(number as u32, generation)))
    }

    fn read_array(&mut self, start: u64, depth: usize) -> Result<Value> {
        self.check_depth(start, depth)?;
        let mut items = Vec::new();
        loop {
            match self.peek_nth(0)? {
                Some(Token::ArrayEnd) => {
                    self.next_with_offset()?;
                    return Ok(Value::Array(items));
                },
                None => return Err(Error::syntax(start, "unterminated array")),
                _ => items.push(self.read_value_at(depth)?),
            }
        }
    }

    fn read_dictionary(&mut self, start: u64, depth: usize) -> Result<Value> {
        self.check_depth(start, depth)?;
        let mut dict = Dictionary::new();
        loop {
            let (offset, token) = self
                .next_with_offset()?
                .ok_or_else(|| Error::syntax(start, "unterminated dictionary"))?;
            match token {
                Token::DictEnd => return Ok(Value::Dictionary(dict)),
                Token::Name(key) => {
                    let key = match String::from_utf8(key) {
                        Ok(key) => key,
                        Err(e) => {
                            log::warn!("dictionary key at byte {} is not UTF-8", offset);
                            String::from_utf8_lossy(e.as_bytes()).into_owned()
                        },
                    };
                    let value = self.read_value_at(depth)?;
                    if !dict.insert_first(key.clone(), value) {
                        log::warn!(
                            "duplicate dictionary key /{} at byte {}; keeping the first value",
                            key,
                            offset
                        );
                    }
                },
                other => {
                    return Err(Error::syntax(
                        offset,
                        format!("expected name as dictionary key, found {}", other.describe()),
                    ));
                },
            }
        }
    }

    fn check_depth(&self, offset: u64, depth: usize) -> Result<()> {
        if depth > self.max_nesting {
            return Err(Error::LimitExceeded(format!(
                "nesting deeper than {} at byte {}",
                self.max_nesting, offset
            )));
        }
        Ok(())
    }

    fn expect_token(&mut self, what: &str) -> Result<(u64, Token)> {
        let at = self.position();
        self.next_with_offset()?
            .ok_or_else(|| Error::syntax(at, format!("unexpected end of input, expected {}", what)))
    }

    fn next_with_offset(&mut self) -> Result<Option<(u64, Token)>> {
        if let Some(entry) = self.pending.pop_front() {
            return Ok(Some(entry));
        }
        let token = self.scanner.next_token()?;
        Ok(token.map(|t| (self.scanner.token_offset(), t)))
    }

    fn peek_nth(&mut self, n: usize) -> Result<Option<&Token>> {
        while self.pending.len() <= n {
            match self.scanner.next_token()? {
                Some(token) => {
                    let offset = self.scanner.token_offset();
                    self.pending.push_back((offset, token));
                },
                None => return Ok(None),
            }
        }
        Ok(self.pending.get(n).map(|(_, t)| t))
    }

    /// Drop queued tokens and move the scanner back to the first of them.
    fn unread(&mut self) -> Result<()> {
        if let Some((offset, _)) = self.pending.front() {
            let offset = *offset;
            self.pending.clear();
            self.scanner.seek(offset)?;
        }
        Ok(())
    }
}

/// Whether a hex string's bytes read as text.
///
/// UTF-16BE with a byte-order mark counts as text, as does any valid UTF-8
/// free of control characters other than tab, CR and LF.
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return true;
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r')),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::SliceStream;

    fn parse(input: &[u8]) -> Result<Value> {
        ObjectParser::new(SliceStream::new(input)).read_value()
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse(b"null").unwrap(), Value::Null);
        assert_eq!(parse(b"true").unwrap(), Value::Boolean(true));
        assert_eq!(parse(b"false").unwrap(), Value::Boolean(false));
        assert_eq!(parse(b"-17").unwrap(), Value::Integer(-17));
        assert_eq!(parse(b"0.5").unwrap(), Value::Real(0.5));
        assert_eq!(parse(b"/Type").unwrap(), Value::name("Type"));
        assert_eq!(parse(b"(Hello)").unwrap(), Value::string("Hello"));
    }

    #[test]
    fn test_hex_string_text_or_binary() {
        assert_eq!(parse(b"<48656C6C6F>").unwrap(), Value::string("Hello"));
        assert_eq!(
            parse(b"<8B2F00FF>").unwrap(),
            Value::Binary(vec![0x8B, 0x2F, 0x00, 0xFF])
        );
        assert!(matches!(parse(b"<FEFF0041>").unwrap(), Value::String(_)));
    }

    #[test]
    fn test_parse_indirect_reference() {
        assert_eq!(parse(b"10 0 R").unwrap(), Value::Reference(ObjectRef::new(10, 0)));
        assert_eq!(parse(b"23513 2 R").unwrap(), Value::Reference(ObjectRef::new(23513, 2)));
    }

    #[test]
    fn test_integers_not_reference() {
        let mut parser = ObjectParser::new(SliceStream::new(b"10 0 /Name"));
        assert_eq!(parser.read_value().unwrap(), Value::Integer(10));
        assert_eq!(parser.read_value().unwrap(), Value::Integer(0));
        assert_eq!(parser.read_value().unwrap(), Value::name("Name"));
    }

    #[test]
    fn test_array_of_references() {
        assert_eq!(
            parse(b"[1 0 R 2 0 R 7]").unwrap(),
            Value::Array(vec![
                Value::Reference(ObjectRef::new(1, 0)),
                Value::Reference(ObjectRef::new(2, 0)),
                Value::Integer(7),
            ])
        );
    }

    #[test]
    fn test_complex_page_dictionary() {
        let input = b"<</Annots 5457 0 R/Contents 5469 0 R/CropBox[0 0 595.4 842]/Group 725 0 R\
/MediaBox[0 0 595.4 842]/Parent 23513 0 R/Resources<</ColorSpace<</CS0 5474 0 R>>\
/ExtGState<</GS0 5475 0 R/GS1 5476 0 R>>/Font<</TT0 5477 0 R/TT1 5478 0 R>>\
/ProcSet[/PDF/Text/ImageC]/XObject<</Im0 5480 0 R>>>>/Rotate 0/StructParents 2105\
/Tabs/S/Type/Page>>";
        let value = parse(input).unwrap();
        let dict = value.as_dict().unwrap();

        assert_eq!(dict.type_name(), Some("Page"));
        assert_eq!(dict.get_name("Tabs"), Some("S"));
        assert_eq!(dict.get_reference("Parent"), Some(ObjectRef::new(23513, 0)));
        assert_eq!(
            dict.get("CropBox"),
            Some(&Value::Array(vec![
                Value::Integer(0),
                Value::Integer(0),
                Value::Real(595.4),
                Value::Integer(842),
            ]))
        );
        let rect = dict.get_rect("CropBox").unwrap();
        assert_eq!((rect.x1, rect.y1, rect.x2, rect.y2), (0.0, 0.0, 595.4, 842.0));

        let fonts = dict.get_dict("Resources").and_then(|r| r.get_dict("Font")).unwrap();
        assert_eq!(fonts.get_reference("TT1"), Some(ObjectRef::new(5478, 0)));

        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "Annots",
                "Contents",
                "CropBox",
                "Group",
                "MediaBox",
                "Parent",
                "Resources",
                "Rotate",
                "StructParents",
                "Tabs",
                "Type"
            ]
        );
    }

    #[test]
    fn test_duplicate_key_first_wins() {
        let value = parse(b"<< /A 1 /B 2 /A 3 >>").unwrap();
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get_integer("A"), Some(1));
    }

    #[test]
    fn test_dictionary_errors() {
        assert_eq!(parse(b"<< /A 1").unwrap_err().kind(), ErrorKind::Syntax);
        assert_eq!(parse(b"<< 1 2 >>").unwrap_err().kind(), ErrorKind::Syntax);
        assert_eq!(parse(b"[1 2").unwrap_err().kind(), ErrorKind::Syntax);
        assert_eq!(parse(b"]").unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let err = parse(b"[1 foo]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_lex_error_propagates() {
        assert_eq!(parse(b"<< /A 1e3 >>").unwrap_err().kind(), ErrorKind::Lex);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "[".repeat(20), "]".repeat(20));
        let mut parser = ObjectParser::new(SliceStream::new(deep.as_bytes())).with_max_nesting(10);
        assert_eq!(parser.read_value().unwrap_err().kind(), ErrorKind::Limit);

        let mut parser = ObjectParser::new(SliceStream::new(deep.as_bytes())).with_max_nesting(20);
        assert!(parser.read_value().is_ok());
    }

    #[test]
    fn test_read_indirect_plain() {
        let mut parser = ObjectParser::new(SliceStream::new(b"4 0 obj\n<< /Type /Catalog >>\nendobj\n"));
        let obj = parser.read_indirect().unwrap();
        assert_eq!(obj.reference, ObjectRef::new(4, 0));
        assert_eq!(obj.value.as_dict().and_then(|d| d.type_name()), Some("Catalog"));
        assert!(obj.has_endobj);
        assert_eq!(obj.stream_offset, None);
    }

    #[test]
    fn test_read_indirect_integer_value() {
        let mut parser = ObjectParser::new(SliceStream::new(b"7 0 obj 42 endobj"));
        let obj = parser.read_indirect().unwrap();
        assert_eq!(obj.value, Value::Integer(42));
        assert!(obj.has_endobj);
    }

    #[test]
    fn test_read_indirect_missing_endobj() {
        let mut parser = ObjectParser::new(SliceStream::new(b"7 0 obj 42 8 0 obj"));
        let obj = parser.read_indirect().unwrap();
        assert!(!obj.has_endobj);
        assert_eq!(parser.position(), 11);
    }

    #[test]
    fn test_read_indirect_stream() {
        let input = b"5 0 obj\n<< /Length 5 >>\nstream\r\nHELLO\nendstream\nendobj\n";
        let mut parser = ObjectParser::new(SliceStream::new(input));
        let obj = parser.read_indirect().unwrap();
        let data_offset = obj.stream_offset.unwrap();
        assert_eq!(&input[data_offset as usize..data_offset as usize + 5], b"HELLO");
        assert_eq!(parser.read_raw(5).unwrap(), b"HELLO");
        assert_eq!(parser.next_token().unwrap(), Some(Token::EndStream));
        assert_eq!(parser.next_token().unwrap(), Some(Token::EndObj));
    }

    #[test]
    fn test_read_indirect_bad_header() {
        let mut parser = ObjectParser::new(SliceStream::new(b"5 0 R"));
        assert_eq!(parser.read_indirect().unwrap_err().kind(), ErrorKind::Syntax);
        let mut parser = ObjectParser::new(SliceStream::new(b"/Name 0 obj"));
        assert_eq!(parser.read_indirect().unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_stream_without_dictionary() {
        let mut parser = ObjectParser::new(SliceStream::new(b"5 0 obj 12 stream\nxx"));
        assert_eq!(parser.read_indirect().unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_read_raw_after_lookahead() {
        // The integer check peeks two tokens ahead; raw reads must start after "7".
        let mut parser = ObjectParser::new(SliceStream::new(b"7 abc def"));
        assert_eq!(parser.read_value().unwrap(), Value::Integer(7));
        parser.skip_whitespace().unwrap();
        assert_eq!(parser.read_raw(3).unwrap(), b"abc");
    }
}
