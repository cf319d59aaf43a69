//! PDF document model (read side).
//!
//! A [`PdfDocument`] owns one byte source, the object table built from the
//! xref chain, and the trailer. Objects are parsed on first access and
//! memoized. Problems the reader knows how to work around are offered to
//! the document's [`ErrorSink`]; a sink that asks to abort puts the
//! document into [`FileState::Error`].

use crate::error::{Error, ErrorSink, LogErrorSink, Reporter, Result};
use crate::lexer::Token;
use crate::object::{Dictionary, Object, ObjectRef, Value};
use crate::objstm::parse_object_stream;
use crate::parser::ObjectParser;
use crate::parser_config::ParserOptions;
use crate::source::{ByteSource, FileSource, MemorySource, SourceStream};
use crate::table::{Entry, ObjectTable};
use crate::xref::{find_startxref, load_xref_chain, CrossRefTable};
use crate::xref_reconstruction::reconstruct_xref;
use bytes::Bytes;
use nom::{
    bytes::complete::tag,
    character::complete::{char, satisfy},
    sequence::{preceded, separated_pair},
    IResult,
};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// The header must start within this many bytes of the beginning of the file.
const HEADER_SEARCH: usize = 1024;

/// Newest PDF version the reader accepts, as (major, minor).
const MAX_VERSION: (u8, u8) = (2, 0);

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Created, header and xref not loaded yet
    Opening,
    /// Loaded for reading
    OpenRead,
    /// Being written
    OpenWrite,
    /// Closed; every operation fails
    Closed,
    /// An error was reported and the sink chose to abort; only `close` works
    Error,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileState::Opening => "opening",
            FileState::OpenRead => "open for reading",
            FileState::OpenWrite => "open for writing",
            FileState::Closed => "closed",
            FileState::Error => "in error state",
        })
    }
}

/// An open PDF file.
///
/// # Example
///
/// ```no_run
/// use pdfio::document::PdfDocument;
///
/// let mut doc = PdfDocument::open("sample.pdf")?;
/// println!("PDF {}", doc.version());
/// println!("{} pages", doc.page_count()?);
/// # Ok::<(), pdfio::error::Error>(())
/// ```
pub struct PdfDocument {
    id: u64,
    source: Box<dyn ByteSource>,
    state: FileState,
    version: String,
    trailer: Dictionary,
    table: ObjectTable,
    options: ParserOptions,
    reporter: Reporter,
    /// Set when the current operation's error already went through the sink
    reported: bool,
    /// Objects currently being loaded (cycle detection)
    resolving: HashSet<ObjectRef>,
    depth: u32,
    pub(crate) pages: Option<Vec<ObjectRef>>,
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("size", &self.table.size())
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF file with default options and a logging error sink.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, the header is missing or newer
    /// than PDF 2.0, the xref cannot be loaded or rebuilt, the trailer has
    /// no `/Root`, or the file is encrypted.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ParserOptions::default(), LogErrorSink::new())
    }

    /// Open a PDF file with explicit options and error sink.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: ParserOptions,
        sink: impl ErrorSink + 'static,
    ) -> Result<Self> {
        let mut sink = sink;
        let source = match FileSource::open(path.as_ref()) {
            Ok(source) => source,
            Err(e) => {
                sink.report(e.kind(), &e.to_string());
                return Err(e);
            },
        };
        let mut doc = Self::from_source(Box::new(source), options, Box::new(sink));
        doc.load()?;
        Ok(doc)
    }

    /// Open a PDF held in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let mut doc = Self::from_source(
            Box::new(MemorySource::new(data)),
            ParserOptions::default(),
            Box::new(LogErrorSink::new()),
        );
        doc.load()?;
        Ok(doc)
    }

    /// Wrap a byte source without reading it; call [`load`](Self::load) next.
    ///
    /// Unlike [`open`](Self::open), a failed load leaves the handle around
    /// (in [`FileState::Error`]) so callers can observe its state.
    pub fn from_source(
        source: Box<dyn ByteSource>,
        options: ParserOptions,
        sink: Box<dyn ErrorSink>,
    ) -> Self {
        Self {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            source,
            state: FileState::Opening,
            version: String::new(),
            trailer: Dictionary::new(),
            table: ObjectTable::new(),
            options,
            reporter: Reporter::new(sink, options.max_errors),
            reported: false,
            resolving: HashSet::new(),
            depth: 0,
            pages: None,
        }
    }

    /// Read the header, the xref chain and the trailer.
    pub fn load(&mut self) -> Result<()> {
        if self.state != FileState::Opening {
            let err = Error::state("load", self.state);
            self.reporter.report(&err);
            return Err(err);
        }
        self.reported = false;
        match self.bootstrap() {
            Ok(()) => {
                self.state = FileState::OpenRead;
                log::debug!(
                    "opened PDF {} with {} objects",
                    self.version,
                    self.table.in_use_count()
                );
                Ok(())
            },
            Err(e) => {
                if !self.reported {
                    self.reporter.report(&e);
                }
                self.state = FileState::Error;
                Err(e)
            },
        }
    }

    fn bootstrap(&mut self) -> Result<()> {
        self.version = read_header(self.source.as_ref())?;
        let xref = self.load_xref()?;

        let trailer = xref.trailer().clone();
        if trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents".to_string()));
        }
        if trailer.get_reference("Root").is_none() {
            return Err(Error::InvalidPdf("trailer has no /Root reference".to_string()));
        }

        let highest = xref.iter().map(|(&n, _)| n).max().unwrap_or(0);
        let size = match trailer.get_integer("Size") {
            Some(size) if size > 0 && size <= i64::from(u32::MAX) => size as u32,
            _ => {
                log::warn!("trailer /Size missing or invalid; using {}", highest + 1);
                highest.saturating_add(1)
            },
        };
        self.table = ObjectTable::from_xref(&xref, size);
        self.trailer = trailer;
        Ok(())
    }

    fn load_xref(&mut self) -> Result<CrossRefTable> {
        let source = self.source.as_ref();
        let loaded = find_startxref(source)
            .and_then(|offset| load_xref_chain(source, offset, &self.options))
            .map_err(|e| match e.kind() {
                crate::error::ErrorKind::Lex | crate::error::ErrorKind::Syntax => {
                    Error::InvalidXref(e.to_string())
                },
                _ => e,
            });

        match loaded {
            Ok(xref) => Ok(xref),
            Err(e) if self.options.allow_xref_reconstruction => {
                self.tolerate(e)?;
                let xref = reconstruct_xref(self.source.as_ref(), self.options.max_nesting)?;
                log::info!("continuing with a reconstructed xref ({} entries)", xref.len());
                Ok(xref)
            },
            Err(e) => Err(e),
        }
    }

    /// Offer a recoverable error to the sink. `Ok` means apply the fallback.
    pub(crate) fn tolerate(&mut self, err: Error) -> Result<()> {
        self.reporter.recover(err).map_err(|e| {
            self.reported = true;
            e
        })
    }

    /// Run a public operation: check the state, and route a failure
    /// through the sink exactly once.
    pub(crate) fn guard<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.state != FileState::OpenRead {
            let err = Error::state(operation, self.state);
            self.reporter.report(&err);
            return Err(err);
        }
        self.reported = false;
        let result = f(self);
        if let Err(e) = &result {
            let abort = self.reported || self.reporter.report(e);
            if abort {
                log::debug!("{} failed; document is now in error state", operation);
                self.state = FileState::Error;
            }
        }
        self.reported = false;
        result
    }

    /// Process-unique handle id.
    pub(crate) fn instance_id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Effective trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Reader options in effect.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Load an object by reference.
    ///
    /// Objects already parsed stay readable after the document enters its
    /// error state.
    pub fn get_object(&mut self, reference: ObjectRef) -> Result<Object> {
        if self.state == FileState::Error {
            if let Some(object) = self.table.resolved(reference) {
                return Ok(object.clone());
            }
        }
        self.guard("get object", |doc| doc.load_object(reference))
    }

    /// Resolve a value: references are loaded (and followed through
    /// reference chains), anything else is returned as is. A reference to a
    /// missing object resolves to `null`.
    pub fn resolve(&mut self, value: &Value) -> Result<Value> {
        self.guard("resolve reference", |doc| doc.resolve_value(value))
    }

    /// Number of in-use objects.
    pub fn object_count(&mut self) -> Result<usize> {
        self.guard("count objects", |doc| Ok(doc.table.in_use_count()))
    }

    /// The `index`-th in-use object in ascending object number.
    pub fn get_object_by_index(&mut self, index: usize) -> Result<Object> {
        self.guard("get object by index", |doc| {
            let count = doc.table.in_use_count();
            let reference = doc
                .table
                .in_use()
                .nth(index)
                .ok_or(Error::IndexOutOfRange { index, count })?;
            doc.load_object(reference)
        })
    }

    /// Object with the given number, whatever its generation.
    pub fn find_object(&mut self, number: u32) -> Result<Object> {
        self.guard("find object", |doc| {
            let reference = match doc.table.entry_by_number(number) {
                Some((reference, entry)) if !matches!(entry, Entry::Free) => reference,
                _ => return Err(Error::ObjectNotFound(number, 0)),
            };
            doc.load_object(reference)
        })
    }

    /// The document catalog (`/Root`).
    pub fn catalog(&mut self) -> Result<Dictionary> {
        self.guard("read catalog", |doc| doc.catalog_dict())
    }

    /// The `/Info` dictionary, if the trailer has one.
    pub fn info(&mut self) -> Result<Option<Dictionary>> {
        self.guard("read info", |doc| doc.info_dict())
    }

    /// `/Title` from the info dictionary.
    pub fn title(&mut self) -> Result<Option<String>> {
        self.info_text("Title")
    }

    /// `/Author` from the info dictionary.
    pub fn author(&mut self) -> Result<Option<String>> {
        self.info_text("Author")
    }

    /// `/Subject` from the info dictionary.
    pub fn subject(&mut self) -> Result<Option<String>> {
        self.info_text("Subject")
    }

    /// `/Creator` from the info dictionary.
    pub fn creator(&mut self) -> Result<Option<String>> {
        self.info_text("Creator")
    }

    /// `/Producer` from the info dictionary.
    pub fn producer(&mut self) -> Result<Option<String>> {
        self.info_text("Producer")
    }

    fn info_text(&mut self, key: &str) -> Result<Option<String>> {
        self.guard("read info", |doc| {
            Ok(doc.info_dict()?.and_then(|info| info.get(key).and_then(Value::as_text)))
        })
    }

    /// Close the document and release its byte source.
    ///
    /// Allowed from any state except [`FileState::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.state == FileState::Closed {
            let err = Error::state("close", self.state);
            self.reporter.report(&err);
            return Err(err);
        }
        self.source = Box::new(MemorySource::new(Bytes::new()));
        self.table = ObjectTable::new();
        self.pages = None;
        self.resolving.clear();
        self.state = FileState::Closed;
        Ok(())
    }

    pub(crate) fn catalog_dict(&mut self) -> Result<Dictionary> {
        let root = self
            .trailer
            .get_reference("Root")
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))?;
        match self.load_object(root)?.into_value() {
            Value::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    fn info_dict(&mut self) -> Result<Option<Dictionary>> {
        let info = match self.trailer.get("Info") {
            Some(info) => info.clone(),
            None => return Ok(None),
        };
        Ok(match self.resolve_value(&info)? {
            Value::Dictionary(dict) => Some(dict),
            _ => None,
        })
    }

    /// Resolve without the public-operation bookkeeping.
    pub(crate) fn resolve_value(&mut self, value: &Value) -> Result<Value> {
        let mut current = match value {
            Value::Reference(reference) => *reference,
            other => return Ok(other.clone()),
        };
        let mut hops = 0u32;
        loop {
            let object = match self.load_object(current) {
                Ok(object) => object,
                Err(Error::ObjectNotFound(..)) => {
                    log::debug!("reference {} is dangling; treating it as null", current);
                    return Ok(Value::Null);
                },
                Err(e) => return Err(e),
            };
            match object.into_value() {
                Value::Reference(next) => {
                    hops += 1;
                    if hops > self.options.max_recursion_depth {
                        return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
                    }
                    current = next;
                },
                other => return Ok(other),
            }
        }
    }

    /// Load and memoize an object.
    pub(crate) fn load_object(&mut self, reference: ObjectRef) -> Result<Object> {
        enum Location {
            Offset(u64),
            InStream(u32, u32),
        }

        let location = match self.table.entry(reference) {
            Some(Entry::Resolved(object)) => return Ok(object.clone()),
            Some(Entry::Unresolved { offset }) => Location::Offset(*offset),
            Some(Entry::Compressed { stream, index }) => Location::InStream(*stream, *index),
            Some(Entry::Free) | Some(Entry::Writable(_)) | None => {
                return Err(Error::ObjectNotFound(reference.id, reference.gen));
            },
        };

        if self.depth >= self.options.max_recursion_depth {
            log::error!(
                "recursion depth limit ({}) hit while loading object {}",
                self.options.max_recursion_depth,
                reference
            );
            return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
        }
        if !self.resolving.insert(reference) {
            return Err(Error::CircularReference(reference));
        }
        self.depth += 1;

        let result = match location {
            Location::Offset(offset) => self.load_at(reference, offset),
            Location::InStream(stream, index) => self.load_compressed(reference, stream, index),
        };

        self.depth -= 1;
        self.resolving.remove(&reference);

        let object = result?;
        self.table.memoize(object.clone());
        Ok(object)
    }

    /// Parse an uncompressed object at its xref offset.
    fn load_at(&mut self, reference: ObjectRef, offset: u64) -> Result<Object> {
        log::debug!("loading object {} at byte {}", reference, offset);
        let indirect = {
            let mut parser = ObjectParser::new(SourceStream::new(self.source.as_ref(), offset))
                .with_max_nesting(self.options.max_nesting);
            parser.read_indirect()?
        };

        if indirect.reference.id != reference.id {
            return Err(Error::InvalidXref(format!(
                "xref entry for {} points at object {}",
                reference, indirect.reference
            )));
        }
        if indirect.reference.gen != reference.gen {
            log::warn!(
                "object {} found with generation {}",
                reference,
                indirect.reference.gen
            );
        }

        match indirect.stream_offset {
            Some(data_offset) => self.read_stream(reference, indirect.value, data_offset),
            None => {
                if !indirect.has_endobj {
                    let err = Error::InvalidPdf(format!("object {} is missing endobj", reference));
                    if !self.options.allow_missing_endobj {
                        return Err(err);
                    }
                    self.tolerate(err)?;
                }
                Ok(Object::new(reference, indirect.value))
            },
        }
    }

    /// Read a stream payload using `/Length`, falling back to a scan for
    /// `endstream` when the length is missing or wrong.
    fn read_stream(&mut self, reference: ObjectRef, value: Value, data_offset: u64) -> Result<Object> {
        let Value::Dictionary(dict) = value else {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: value.type_name().to_string(),
            });
        };

        let length = match dict.get("Length") {
            Some(Value::Reference(length_ref)) => {
                let length_ref = *length_ref;
                match self.load_object(length_ref) {
                    Ok(object) => object.value().as_integer(),
                    Err(e) => {
                        log::warn!("stream {} /Length {} unreadable: {}", reference, length_ref, e);
                        None
                    },
                }
            },
            Some(other) => other.as_integer(),
            None => None,
        };

        let available = self.source.size().saturating_sub(data_offset);
        let data = match length {
            Some(len) if len >= 0 && (len as u64) <= available => {
                let data = self.source.read_range(data_offset, len as usize)?;
                if self.endstream_at(data_offset + len as u64) {
                    Some(data)
                } else {
                    None
                }
            },
            _ => None,
        };

        let data = match data {
            Some(data) => data,
            None => {
                let err = Error::InvalidPdf(format!(
                    "stream {} /Length {} does not end at endstream",
                    reference,
                    length.map_or_else(|| "missing".to_string(), |n| n.to_string())
                ));
                if !self.options.allow_malformed_streams {
                    return Err(err);
                }
                self.tolerate(err)?;
                let data = self.scan_to_endstream(reference, data_offset)?;
                log::info!("resynced stream {} to {} bytes", reference, data.len());
                data
            },
        };

        Ok(Object::with_stream(reference, dict, data))
    }

    fn endstream_at(&self, offset: u64) -> bool {
        let mut parser = ObjectParser::new(SourceStream::new(self.source.as_ref(), offset));
        matches!(parser.next_token(), Ok(Some(Token::EndStream)))
    }

    fn scan_to_endstream(&self, reference: ObjectRef, data_offset: u64) -> Result<Vec<u8>> {
        let rest = self
            .source
            .read_range(data_offset, self.source.size().saturating_sub(data_offset) as usize)?;
        let end = rest
            .windows(b"endstream".len())
            .position(|w| w == b"endstream")
            .ok_or_else(|| Error::InvalidPdf(format!("stream {} has no endstream", reference)))?;
        let mut data = rest[..end].to_vec();
        if data.ends_with(b"\r\n") {
            data.truncate(data.len() - 2);
        } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
            data.truncate(data.len() - 1);
        }
        Ok(data)
    }

    /// Load an object out of an object stream, memoizing every member
    /// the xref places in that stream.
    fn load_compressed(&mut self, reference: ObjectRef, stream_number: u32, index: u32) -> Result<Object> {
        log::debug!(
            "loading object {} from object stream {} index {}",
            reference,
            stream_number,
            index
        );
        let stream_ref = self
            .table
            .entry_by_number(stream_number)
            .map(|(stream_ref, _)| stream_ref)
            .ok_or(Error::ObjectNotFound(stream_number, 0))?;
        let stream = self.load_object(stream_ref)?;
        let members = parse_object_stream(&stream, &self.options)?;

        let mut found = None;
        for (position, (number, value)) in members.into_iter().enumerate() {
            let member_ref = ObjectRef::new(number, 0);
            let belongs = matches!(
                self.table.entry(member_ref),
                Some(Entry::Compressed { stream, index })
                    if *stream == stream_number && *index as usize == position
            );
            if !belongs && member_ref != reference {
                continue;
            }
            let object = Object::new(member_ref, value);
            if member_ref == reference {
                if position as u32 != index {
                    log::warn!(
                        "object {} found at index {} of stream {}, xref says {}",
                        reference,
                        position,
                        stream_number,
                        index
                    );
                }
                found = Some(object.clone());
            }
            if belongs {
                self.table.memoize(object);
            }
        }

        found.ok_or_else(|| {
            Error::InvalidPdf(format!(
                "object {} is not in object stream {}",
                reference, stream_number
            ))
        })
    }
}

/// `%PDF-M.N`
fn header_version(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
    let digit = || satisfy(|c| c.is_ascii_digit());
    let (input, (major, minor)) =
        preceded(tag("%PDF-"), separated_pair(digit(), char('.'), digit()))(input)?;
    Ok((input, (major as u8 - b'0', minor as u8 - b'0')))
}

/// Find the header in the first KiB and return its version string.
fn read_header(source: &dyn ByteSource) -> Result<String> {
    let head = source.read_range(0, HEADER_SEARCH)?;
    let start = head
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| Error::InvalidHeader(format!("no %PDF- marker in the first {} bytes", HEADER_SEARCH)))?;
    if start > 0 {
        log::warn!("PDF header found at byte {}, not at the start of the file", start);
    }

    let (_, (major, minor)) = header_version(&head[start..]).map_err(|_| {
        let end = head.len().min(start + 10);
        Error::InvalidHeader(format!(
            "malformed header '{}'",
            String::from_utf8_lossy(&head[start..end]).trim_end()
        ))
    })?;

    let version = format!("{}.{}", major, minor);
    if major == 0 {
        return Err(Error::InvalidHeader(format!("invalid version {}", version)));
    }
    if (major, minor) > MAX_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(version)
}
