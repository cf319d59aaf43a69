//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses flate2 for zlib decompression and falls back to raw deflate and
//! then libflate for streams with damaged headers or trailers.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use libflate::zlib::Decoder as LibflateDecoder;
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };
        // A bad checksum or truncated trailer still leaves usable data.
        if !output.is_empty() {
            log::warn!(
                "FlateDecode recovered {} bytes before corruption: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        log::info!("zlib decode failed ({}), trying raw deflate", zlib_err);
        output.clear();
        let deflate_err = match DeflateDecoder::new(input).read_to_end(&mut output) {
            Ok(_) if !output.is_empty() => return Ok(output),
            Ok(_) => None,
            Err(e) if !output.is_empty() => {
                log::warn!("raw deflate recovered {} bytes: {}", output.len(), e);
                return Ok(output);
            },
            Err(e) => Some(e),
        };

        output.clear();
        if let Ok(mut decoder) = LibflateDecoder::new(input) {
            match decoder.read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::info!("libflate recovered {} bytes", output.len());
                    return Ok(output);
                },
                Err(_) if !output.is_empty() => {
                    log::warn!("libflate recovered {} bytes before an error", output.len());
                    return Ok(output);
                },
                _ => {},
            }
        }

        Err(Error::Decode(format!(
            "FlateDecode failed on {} bytes: zlib: {}; deflate: {}",
            input.len(),
            zlib_err,
            deflate_err.map_or_else(|| "no output".to_string(), |e| e.to_string())
        )))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use std::io::Write;

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_large_data() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        let original = b"0 0 m 100 100 l S";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_truncated_checksum() {
        let original = b"BT /F1 12 Tf (truncated) Tj ET".repeat(10);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let mut compressed = encoder.finish().unwrap();
        compressed.truncate(compressed.len() - 4);

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        let err = FlateDecoder.decode(b"This is not zlib compressed data").unwrap_err();
        assert!(err.to_string().contains("FlateDecode failed"));
    }
}
