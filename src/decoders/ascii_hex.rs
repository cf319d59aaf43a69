//! ASCIIHexDecode implementation.
//!
//! Whitespace is ignored, `>` ends the data, and an odd final digit is
//! padded with an implicit '0'.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if crate::lexer::is_whitespace(c) {
                continue;
            }
            let nibble = hex_digit_to_value(c).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid hex digit '{}'", c as char))
            })?;
            match high.take() {
                Some(h) => output.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(h) = high {
            output.push(h << 4);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

fn hex_digit_to_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_hex_decode_simple() {
        assert_eq!(AsciiHexDecoder.decode(b"48656C6C6F").unwrap(), b"Hello");
        assert_eq!(AsciiHexDecoder.decode(b"48656c6C6f").unwrap(), b"Hello");
    }

    #[test]
    fn test_ascii_hex_decode_with_whitespace() {
        assert_eq!(AsciiHexDecoder.decode(b"48 65 6C\n6C 6F").unwrap(), b"Hello");
    }

    #[test]
    fn test_ascii_hex_decode_odd_length() {
        assert_eq!(AsciiHexDecoder.decode(b"486").unwrap(), b"H`");
    }

    #[test]
    fn test_ascii_hex_decode_stops_at_end_marker() {
        assert_eq!(AsciiHexDecoder.decode(b"4869>ZZ").unwrap(), b"Hi");
    }

    #[test]
    fn test_ascii_hex_decode_empty() {
        assert_eq!(AsciiHexDecoder.decode(b"").unwrap(), b"");
    }

    #[test]
    fn test_ascii_hex_decode_invalid_digit() {
        assert!(AsciiHexDecoder.decode(b"4G").is_err());
    }
}
