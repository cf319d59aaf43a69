//! Stream filters for the read side.
//!
//! - FlateDecode (zlib/deflate), with PNG and TIFF predictors
//! - ASCIIHexDecode
//!
//! Filters are applied in `/Filter` order. Any other filter name is
//! reported as unsupported; image filters such as DCTDecode are never
//! decoded here since their payload is copied verbatim.

use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;

mod ascii_hex;
mod flate;
mod predictor;

pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use predictor::{DecodeParams, decode_predictor};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as used in `/Filter` (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

fn decoder_for(filter: &str) -> Result<Box<dyn StreamDecoder>> {
    match filter {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(AsciiHexDecoder)),
        other => Err(Error::UnsupportedFilter(other.to_string())),
    }
}

/// Decode stream data through a filter pipeline with default limits.
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_options(data, filters, None, None)
}

/// Decode stream data through a filter pipeline.
///
/// `params` (from `/DecodeParms`) selects a predictor applied after the
/// filters. The output is checked against the decompression ratio and size
/// limits of `options` after every filter.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: Option<&ParserOptions>,
) -> Result<Vec<u8>> {
    let defaults = ParserOptions::default();
    let options = options.unwrap_or(&defaults);
    let max_ratio = options.max_decompression_ratio;
    let max_size = options.max_decompressed_size;

    let compressed_size = data.len();
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder = decoder_for(filter_name)?;
        current = decoder.decode(&current)?;

        if max_ratio > 0 && compressed_size > 0 {
            let ratio = current.len() as u64 / compressed_size as u64;
            if ratio > u64::from(max_ratio) {
                return Err(Error::LimitExceeded(format!(
                    "{} output is {}x its input (limit {}x)",
                    decoder.name(),
                    ratio,
                    max_ratio
                )));
            }
        }
        if max_size > 0 && current.len() > max_size {
            return Err(Error::LimitExceeded(format!(
                "{} output of {} bytes exceeds {} bytes",
                decoder.name(),
                current.len(),
                max_size
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor > 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}
