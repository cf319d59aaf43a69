//! Byte sources and sinks.
//!
//! The reader works over a [`ByteSource`] (random access by offset) and the
//! writer emits into a [`ByteSink`] (sequential, position-aware). The token
//! scanner never touches either directly: it is driven through a
//! [`ByteStream`], a small `consume`/`peek` capability that can sit on top of
//! a file, an in-memory buffer, or a decoded object stream.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Random-access read side.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; 0 means `offset` is at or past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Read exactly the byte range `offset..offset + len`, truncated at end of source.
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

/// Sequential write side.
pub trait ByteSink {
    /// Number of bytes written so far.
    fn tell(&self) -> u64;

    /// Append bytes.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Push buffered bytes to the underlying storage.
    fn flush(&mut self) -> Result<()>;
}

/// Byte-at-a-time input used by the scanner.
pub trait ByteStream {
    /// Look at the next byte without consuming it.
    fn peek(&mut self) -> Result<Option<u8>>;

    /// Consume and return the next byte.
    fn consume(&mut self) -> Result<Option<u8>>;

    /// Offset of the next byte to be consumed.
    fn position(&self) -> u64;

    /// Reposition the stream.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Consume up to `len` raw bytes.
    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(64 * 1024));
        while out.len() < len {
            match self.consume()? {
                Some(b) => out.push(b),
                None => break,
            }
        }
        Ok(out)
    }
}

/// File-backed [`ByteSource`].
pub struct FileSource {
    file: RefCell<File>,
    size: u64,
}

impl FileSource {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: RefCell::new(file),
            size,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource").field("size", &self.size).finish_non_exhaustive()
    }
}

/// In-memory [`ByteSource`].
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap a byte buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The whole buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Buffered file-backed [`ByteSink`].
pub struct FileSink {
    writer: BufWriter<File>,
    position: u64,
}

impl FileSink {
    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
            position: 0,
        })
    }
}

impl ByteSink for FileSink {
    fn tell(&self) -> u64 {
        self.position
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// In-memory [`ByteSink`].
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSink for MemorySink {
    fn tell(&self) -> u64 {
        self.data.len() as u64
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

const WINDOW_SIZE: usize = 4096;

/// [`ByteStream`] over a [`ByteSource`], reading through a small window.
pub struct SourceStream<'a> {
    source: &'a dyn ByteSource,
    window: Vec<u8>,
    window_start: u64,
    pos: u64,
}

impl<'a> SourceStream<'a> {
    /// Stream starting at `offset`.
    pub fn new(source: &'a dyn ByteSource, offset: u64) -> Self {
        Self {
            source,
            window: Vec::new(),
            window_start: offset,
            pos: offset,
        }
    }

    fn fill(&mut self) -> Result<bool> {
        let window_end = self.window_start + self.window.len() as u64;
        if self.pos >= self.window_start && self.pos < window_end {
            return Ok(true);
        }
        self.window.resize(WINDOW_SIZE, 0);
        let n = self.source.read_at(self.pos, &mut self.window)?;
        self.window.truncate(n);
        self.window_start = self.pos;
        Ok(n > 0)
    }
}

impl ByteStream for SourceStream<'_> {
    fn peek(&mut self) -> Result<Option<u8>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.window[(self.pos - self.window_start) as usize]))
    }

    fn consume(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let data = self.source.read_range(self.pos, len)?;
        self.pos += data.len() as u64;
        Ok(data)
    }
}

/// [`ByteStream`] over a borrowed slice.
#[derive(Debug, Clone)]
pub struct SliceStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceStream<'a> {
    /// Stream over `data` starting at byte 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteStream for SliceStream<'_> {
    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.data.get(self.pos).copied())
    }

    fn consume(&mut self) -> Result<Option<u8>> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.data.len() as u64 {
            return Err(Error::InvalidPdf(format!(
                "seek to {} past end of {} byte buffer",
                offset,
                self.data.len()
            )));
        }
        self.pos = offset as usize;
        Ok(())
    }

    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let end = (self.pos + len).min(self.data.len());
        let out = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }
}
