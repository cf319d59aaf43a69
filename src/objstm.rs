//! Object streams (PDF 1.5+).
//!
//! An object stream packs several non-stream objects into one compressed
//! stream:
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 3 /First 15 /Filter /FlateDecode /Length ... >>
//! stream
//! 10 0 11 12 13 27                  % (object number, offset) pairs
//! << /Type /Font ... >> [1 2 3] ... % objects, offsets relative to /First
//! endstream
//! ```
//!
//! Compressed xref entries name the containing stream and the member's
//! index in the pair list.

use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::object::{Object, Value};
use crate::parser::ObjectParser;
use crate::parser_config::ParserOptions;
use crate::source::SliceStream;

/// Decode an object stream and parse its members.
///
/// Returns `(object number, value)` in index order. A member that fails to
/// parse becomes `null` so later indices stay aligned.
pub fn parse_object_stream(stream: &Object, options: &ParserOptions) -> Result<Vec<(u32, Value)>> {
    let dict = stream
        .dict()
        .filter(|_| stream.is_stream())
        .ok_or_else(|| Error::InvalidPdf(format!("object {} is not a stream", stream.reference())))?;

    if let Some(kind) = dict.type_name() {
        if kind != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let n = dict
        .get_integer("N")
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N".to_string()))?;
    let first = dict
        .get_integer("First")
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First".to_string()))?;
    if !(0..=1_000_000).contains(&n) {
        return Err(Error::InvalidPdf(format!("invalid object stream /N {}", n)));
    }
    if first < 0 {
        return Err(Error::InvalidPdf(format!("invalid object stream /First {}", first)));
    }
    let (n, first) = (n as usize, first as usize);

    let data = stream.decode_stream_with_options(options)?;
    if data.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data is {} bytes, /First is {}",
            data.len(),
            first
        )));
    }

    let pairs = parse_pairs(&data[..first], n)?;
    let body = &data[first..];
    let mut members = Vec::with_capacity(pairs.len());

    for (number, offset) in pairs {
        let value = match body.get(offset..) {
            Some(slice) => {
                let mut parser =
                    ObjectParser::new(SliceStream::new(slice)).with_max_nesting(options.max_nesting);
                parser.read_value().unwrap_or_else(|e| {
                    log::warn!("object {} in object stream {}: {}", number, stream.reference(), e);
                    Value::Null
                })
            },
            None => {
                log::warn!(
                    "object {} offset {} lies beyond object stream {}",
                    number,
                    offset,
                    stream.reference()
                );
                Value::Null
            },
        };
        members.push((number, value));
    }

    Ok(members)
}

/// Read `count` (object number, offset) pairs.
fn parse_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut parser = ObjectParser::new(SliceStream::new(data));
    let mut pairs = Vec::with_capacity(count);

    for i in 0..count {
        let number = parser.next_token()?;
        let offset = parser.next_token()?;
        match (number, offset) {
            (Some(Token::Integer(number)), Some(Token::Integer(offset)))
                if number > 0 && number <= i64::from(u32::MAX) && offset >= 0 =>
            {
                pairs.push((number as u32, offset as usize));
            },
            (None, _) | (_, None) => {
                log::warn!("object stream header lists {} of {} pairs", i, count);
                break;
            },
            _ => {
                return Err(Error::InvalidPdf(format!(
                    "malformed object stream header at pair {}",
                    i
                )));
            },
        }
    }

    Ok(pairs)
}
