//! Stream writer and encode filters.
//!
//! A [`StreamWriter`] collects the payload of one stream object. On
//! [`close`](StreamWriter::close) the payload goes through the stream's
//! [`FilterChain`], and the final `/Length` and `/Filter` are patched into
//! the stream dictionary before anything is serialized.

use super::content_stream::ContentStreamOp;
use super::pdf_writer::PdfWriter;
use crate::error::{Error, Result};
use crate::object::ObjectRef;
use crate::source::ByteSink;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fmt;
use std::io::Write;

/// One encode step in a stream's filter chain.
pub trait StreamEncoder: fmt::Debug {
    /// Filter name recorded in `/Filter`, or `None` for a pass-through.
    fn filter_name(&self) -> Option<&'static str>;

    /// Encode `data`.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEncoder;

impl StreamEncoder for IdentityEncoder {
    fn filter_name(&self) -> Option<&'static str> {
        None
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// zlib/deflate encoder for `/FlateDecode`.
#[derive(Debug, Clone, Copy)]
pub struct FlateEncoder {
    level: u32,
}

impl Default for FlateEncoder {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl FlateEncoder {
    /// Encoder with an explicit compression level (0-9).
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl StreamEncoder for FlateEncoder {
    fn filter_name(&self) -> Option<&'static str> {
        Some("FlateDecode")
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}

/// Ordered list of encoders applied to a stream payload on close.
#[derive(Debug, Default)]
pub struct FilterChain {
    encoders: Vec<Box<dyn StreamEncoder>>,
}

impl FilterChain {
    /// Empty chain: the payload is stored as written.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Single FlateDecode step.
    pub fn flate() -> Self {
        Self::identity().with(FlateEncoder::default())
    }

    /// Append an encoder; encoders run in the order they were added.
    pub fn with(mut self, encoder: impl StreamEncoder + 'static) -> Self {
        self.encoders.push(Box::new(encoder));
        self
    }

    /// Whether no encoder changes the payload.
    pub fn is_identity(&self) -> bool {
        self.encoders.iter().all(|e| e.filter_name().is_none())
    }

    /// Run every encoder over `data`.
    ///
    /// Returns the encoded bytes and the filter names in `/Filter` order
    /// (the last encoder applied is decoded first).
    pub fn encode(&self, data: &[u8]) -> Result<(Vec<u8>, Vec<String>)> {
        let mut encoded = data.to_vec();
        let mut names = Vec::new();
        for encoder in &self.encoders {
            encoded = encoder.encode(&encoded)?;
            if let Some(name) = encoder.filter_name() {
                names.push(name.to_string());
            }
        }
        names.reverse();
        Ok((encoded, names))
    }
}

/// Writer for one stream object's payload.
///
/// Holds the file writer exclusively until [`close`](Self::close)
/// consumes it. A stream writer dropped without `close` leaves its object
/// open, and the file then fails to finalize.
///
/// ```no_run
/// use pdfio::object::Dictionary;
/// use pdfio::writer::PdfWriter;
///
/// let mut pdf = PdfWriter::create("out.pdf")?;
/// let mut page = pdf.create_page(Dictionary::new())?;
/// page.save()?;
/// page.puts("0 0 100 100 re f\n")?;
/// page.restore()?;
/// page.close()?;
/// pdf.close()?;
/// # Ok::<(), pdfio::error::Error>(())
/// ```
pub struct StreamWriter<'w, W: ByteSink> {
    writer: &'w mut PdfWriter<W>,
    reference: ObjectRef,
    filters: FilterChain,
    buffer: Vec<u8>,
    closed: bool,
}

impl<'w, W: ByteSink> StreamWriter<'w, W> {
    pub(crate) fn new(writer: &'w mut PdfWriter<W>, reference: ObjectRef, filters: FilterChain) -> Self {
        Self {
            writer,
            reference,
            filters,
            buffer: Vec::new(),
            closed: false,
        }
    }

    /// The stream object being written.
    pub fn reference(&self) -> ObjectRef {
        self.reference
    }

    /// Bytes written so far (before encoding).
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append raw bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.check_writable("write stream")?;
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Append a string.
    pub fn puts(&mut self, text: &str) -> Result<()> {
        self.write(text.as_bytes())
    }

    /// Formatted write, so `write!(stream, ...)` works.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.puts(&args.to_string())
    }

    /// Append one content operator.
    pub fn op(&mut self, op: &ContentStreamOp) -> Result<()> {
        self.puts(&op.encode())
    }

    /// `q`: save the graphics state.
    pub fn save(&mut self) -> Result<()> {
        self.op(&ContentStreamOp::SaveState)
    }

    /// `Q`: restore the graphics state.
    pub fn restore(&mut self) -> Result<()> {
        self.op(&ContentStreamOp::RestoreState)
    }

    /// `cm`: concatenate a transformation matrix.
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<()> {
        self.op(&ContentStreamOp::Transform(a, b, c, d, e, f))
    }

    /// Paint image resource `name` into the rectangle `(x, y, width, height)`.
    pub fn draw_image(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        if name.is_empty() {
            return Err(self.writer.fail(Error::InvalidPdf("empty image resource name".to_string())));
        }
        for op in ContentStreamOp::draw_image(name, x, y, width, height) {
            self.op(&op)?;
        }
        Ok(())
    }

    /// Encode the payload and patch `/Length` (and `/Filter`).
    pub fn close(mut self) -> Result<()> {
        self.writer.check_writable("close stream")?;
        let (data, filters) = match self.filters.encode(&self.buffer) {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.writer.fail(e)),
        };
        log::debug!(
            "closing stream {}: {} bytes, {} encoded",
            self.reference,
            self.buffer.len(),
            data.len()
        );
        if let Err(e) = self.writer.finish_stream(self.reference, data, filters) {
            return Err(self.writer.fail(e));
        }
        self.closed = true;
        Ok(())
    }
}

impl<W: ByteSink> Drop for StreamWriter<'_, W> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!(
                "stream {} dropped without close; the file cannot be finalized",
                self.reference
            );
        }
    }
}

impl<W: ByteSink> fmt::Debug for StreamWriter<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("reference", &self.reference)
            .field("closed", &self.closed)
            .field("buffered", &self.buffer.len())
            .field("filters", &self.filters)
            .finish()
    }
}
