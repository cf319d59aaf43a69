//! PNG and TIFF predictors for FlateDecode streams.
//!
//! Xref streams and object streams written by most producers use PNG Up
//! (predictor 12) over fixed-width rows. Predictors encode differences
//! between neighbouring bytes; decoding adds the neighbours back.

use crate::error::{Error, Result};
use crate::object::Value;

/// Decode parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` value.
    ///
    /// For an array (one entry per filter) the first dictionary is used.
    /// Returns `None` when there is no dictionary to read.
    pub fn from_value(value: &Value) -> Option<Self> {
        let dict = match value {
            Value::Dictionary(d) => d,
            Value::Array(arr) => arr.iter().find_map(Value::as_dict)?,
            _ => return None,
        };
        let defaults = Self::default();
        let positive = |key: &str, default: usize| {
            dict.get_integer(key)
                .filter(|&v| v > 0)
                .map_or(default, |v| v as usize)
        };
        Some(Self {
            predictor: dict.get_integer("Predictor").unwrap_or(defaults.predictor),
            columns: positive("Columns", defaults.columns),
            colors: positive("Colors", defaults.colors),
            bits_per_component: positive("BitsPerComponent", defaults.bits_per_component),
        })
    }

    /// Bytes of sample data per row, excluding the PNG tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per row as stored, including the PNG tag byte.
    pub fn bytes_per_row(&self) -> usize {
        let pixel_bytes = self.pixel_bytes_per_row();
        if self.predictor >= 10 {
            pixel_bytes + 1
        } else {
            pixel_bytes
        }
    }

    /// Distance in bytes to the corresponding byte of the previous sample.
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor named by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("unsupported predictor {}", other))),
    }
}

fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }

    Ok(output)
}

fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.bytes_per_row();
    let pixel_bytes = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();

    if data.len() % row_len != 0 {
        log::warn!(
            "predictor data length {} is not a multiple of row size {}; ignoring the partial row",
            data.len(),
            row_len
        );
    }

    let mut output: Vec<u8> = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; pixel_bytes];

    for row in data.chunks_exact(row_len) {
        let tag = row[0];
        let encoded = &row[1..];
        let start = output.len();

        for (i, &byte) in encoded.iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("invalid PNG predictor tag {}", other)));
                },
            };
            output.push(byte.wrapping_add(predicted));
        }
        previous.copy_from_slice(&output[start..]);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (i16::from(a), i16::from(b), i16::from(c));
    let p = ia + ib - ic;
    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
