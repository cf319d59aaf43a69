//! PDF file writer.
//!
//! Assembles complete PDF files with proper structure:
//! header, body, xref table, and trailer.
//!
//! Objects are held in the object table until the file is closed. Closing
//! runs in two phases:
//!
//! 1. [`finalize`](PdfWriter::finalize) builds the page tree, catalog and
//!    `/Info`, then serializes every object in ascending number while
//!    recording byte offsets.
//! 2. [`flush`](PdfWriter::flush) writes the xref table and the trailer.
//!
//! Each phase runs once; repeating it is a no-op and running them out of
//! order is a state error.

use super::object_serializer::{validate_dictionary, validate_value, ObjectSerializer};
use super::stream_writer::{FilterChain, StreamWriter};
use super::xref_writer::{trailer_section, xref_section};
use crate::document::FileState;
use crate::error::{Error, ErrorSink, LogErrorSink, Reporter, Result};
use crate::object::{filter_names, Dictionary, ObjectRef, Rect, Value};
use crate::source::{ByteSink, FileSink, MemorySink};
use crate::table::{ObjectTable, WritableObject};
use md5::{Digest, Md5};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Output versions the writer can declare in the header.
pub const SUPPORTED_VERSIONS: [&str; 5] = ["1.4", "1.5", "1.6", "1.7", "2.0"];

/// Configuration for PDF generation.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfWriterConfig {
    /// PDF version written in the header (e.g., "1.7")
    pub version: String,
    /// Document information dictionary
    pub info: Option<Dictionary>,
    /// `/Producer` added to `/Info` when the dictionary has none
    pub producer: String,
    /// Whether to write an `/Info` dictionary at all
    pub include_info: bool,
    /// Whether to compress page content streams
    pub compress: bool,
    /// Fixed document `/ID`; derived from the body when unset
    pub id: Option<Vec<u8>>,
    /// Default `/MediaBox` on the page tree root
    pub media_box: Rect,
}

impl Default for PdfWriterConfig {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
            info: None,
            producer: format!("pdfio {}", env!("CARGO_PKG_VERSION")),
            include_info: true,
            compress: false,
            id: None,
            media_box: Rect::LETTER,
        }
    }
}

impl PdfWriterConfig {
    /// Set the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Use `info` as the document information dictionary.
    pub fn with_info(mut self, info: Dictionary) -> Self {
        self.info = Some(info);
        self.include_info = true;
        self
    }

    fn with_info_entry(mut self, key: &str, text: impl Into<String>) -> Self {
        let info = self.info.get_or_insert_with(Dictionary::new);
        info.insert(key, Value::string(text.into()));
        self.include_info = true;
        self
    }

    /// Set document title.
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_info_entry("Title", title)
    }

    /// Set document author.
    pub fn with_author(self, author: impl Into<String>) -> Self {
        self.with_info_entry("Author", author)
    }

    /// Set document subject.
    pub fn with_subject(self, subject: impl Into<String>) -> Self {
        self.with_info_entry("Subject", subject)
    }

    /// Set creator application.
    pub fn with_creator(self, creator: impl Into<String>) -> Self {
        self.with_info_entry("Creator", creator)
    }

    /// Override the default producer string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Omit the `/Info` dictionary.
    pub fn without_info(mut self) -> Self {
        self.include_info = false;
        self
    }

    /// Enable or disable stream compression.
    ///
    /// When enabled, page content streams are compressed using FlateDecode
    /// (zlib/deflate) to reduce file size.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Use a fixed document `/ID`.
    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Default page size for pages that set no `/MediaBox`.
    pub fn with_media_box(mut self, media_box: Rect) -> Self {
        self.media_box = media_box;
        self
    }

    fn info_dictionary(&self) -> Option<Dictionary> {
        if !self.include_info {
            return None;
        }
        let mut info = self.info.clone().unwrap_or_default();
        if !info.contains_key("Producer") {
            info.insert("Producer", Value::string(self.producer.as_str()));
        }
        Some(info)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Finalized,
    Flushed,
}

/// PDF file writer over a [`ByteSink`].
pub struct PdfWriter<W: ByteSink = FileSink> {
    sink: W,
    config: PdfWriterConfig,
    state: FileState,
    phase: Phase,
    pub(crate) table: ObjectTable,
    pages_root: ObjectRef,
    pages: Vec<ObjectRef>,
    catalog: Option<ObjectRef>,
    info: Option<ObjectRef>,
    offsets: BTreeMap<u32, u64>,
    body_digest: Vec<u8>,
    /// Source object number to target object, per source document
    pub(crate) copy_maps: HashMap<u64, HashMap<ObjectRef, ObjectRef>>,
    reporter: Reporter,
}

impl PdfWriter<FileSink> {
    /// Create a PDF file at `path` with the default configuration.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, PdfWriterConfig::default())
    }

    /// Create a PDF file at `path`.
    pub fn create_with(path: impl AsRef<Path>, config: PdfWriterConfig) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("creating {}", path.display());
        let sink = FileSink::create(path)?;
        PdfWriter::with_sink(sink, config, Box::new(LogErrorSink::new()))
    }
}

impl PdfWriter<MemorySink> {
    /// Writer that builds the file in memory.
    pub fn in_memory(config: PdfWriterConfig) -> Result<Self> {
        PdfWriter::with_sink(MemorySink::new(), config, Box::new(LogErrorSink::new()))
    }
}

impl<W: ByteSink> PdfWriter<W> {
    /// Writer over an arbitrary sink, with errors delivered to `error_sink`.
    ///
    /// The header is written immediately.
    pub fn with_sink(sink: W, config: PdfWriterConfig, error_sink: Box<dyn ErrorSink>) -> Result<Self> {
        let mut reporter = Reporter::new(error_sink, 0);
        if !SUPPORTED_VERSIONS.contains(&config.version.as_str()) {
            let err = Error::UnsupportedVersion(format!(
                "cannot write PDF {}; expected one of {}",
                config.version,
                SUPPORTED_VERSIONS.join(", ")
            ));
            reporter.report(&err);
            return Err(err);
        }
        if let Some(info) = &config.info {
            if let Err(err) = validate_dictionary(info) {
                reporter.report(&err);
                return Err(err);
            }
        }

        let mut table = ObjectTable::new();
        let pages_root = table.allocate(Value::Null);
        let mut writer = Self {
            sink,
            config,
            state: FileState::OpenWrite,
            phase: Phase::Building,
            table,
            pages_root,
            pages: Vec::new(),
            catalog: None,
            info: None,
            offsets: BTreeMap::new(),
            body_digest: Vec::new(),
            copy_maps: HashMap::new(),
            reporter,
        };

        let mut header = format!("%PDF-{}\n", writer.config.version).into_bytes();
        // Binary marker (recommended for binary content)
        header.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        if let Err(e) = writer.sink.write(&header) {
            writer.reporter.report(&e);
            return Err(e);
        }
        Ok(writer)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Version written in the header.
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// Writer configuration.
    pub fn config(&self) -> &PdfWriterConfig {
        &self.config
    }

    /// The `/Pages` root, always object 1.
    pub fn pages_root(&self) -> ObjectRef {
        self.pages_root
    }

    /// Pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of objects allocated so far, including object 0.
    pub fn object_count(&self) -> u32 {
        self.table.size()
    }

    /// The sink, for inspecting in-memory output.
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Consume the writer and return its sink.
    pub fn into_sink(self) -> W {
        if self.state == FileState::OpenWrite && self.phase != Phase::Flushed {
            log::warn!("writer released before close; output is incomplete");
        }
        self.sink
    }

    /// Run a public operation: check the state, and route a failure
    /// through the sink.
    pub(crate) fn guard<T>(&mut self, operation: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.state != FileState::OpenWrite {
            let err = Error::state(operation, self.state);
            self.reporter.report(&err);
            return Err(err);
        }
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Report a failed operation; the writer enters the error state when
    /// the sink aborts.
    pub(crate) fn fail(&mut self, err: Error) -> Error {
        if self.reporter.report(&err) {
            log::debug!("write failed; writer is now in error state");
            self.state = FileState::Error;
        }
        err
    }

    /// Fail unless objects may still be added.
    pub(crate) fn check_writable(&mut self, operation: &str) -> Result<()> {
        if self.state != FileState::OpenWrite {
            let err = Error::state(operation, self.state);
            self.reporter.report(&err);
            return Err(err);
        }
        if self.phase != Phase::Building {
            return Err(self.fail(Error::state(operation, "finalized")));
        }
        Ok(())
    }

    pub(crate) fn require_building(&self, operation: &str) -> Result<()> {
        if self.phase != Phase::Building {
            return Err(Error::state(operation, "finalized"));
        }
        Ok(())
    }

    /// Add a plain (non-stream) object.
    pub fn create_object(&mut self, value: impl Into<Value>) -> Result<ObjectRef> {
        let value = value.into();
        self.guard("create object", |w| {
            w.require_building("create object")?;
            validate_value(&value)?;
            Ok(w.table.allocate(value))
        })
    }

    /// Replace the value of an object created earlier.
    pub fn set_object(&mut self, reference: ObjectRef, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.guard("set object", |w| {
            w.require_building("set object")?;
            validate_value(&value)?;
            let object = w.table.writable_mut(reference)?;
            if object.open || object.stream.is_some() {
                return Err(Error::state(format!("replace stream {}", reference), "written"));
            }
            object.value = value;
            Ok(())
        })
    }

    /// Start a stream object whose payload is stored as written.
    ///
    /// A `/Filter` already present in `dict` describes data the caller
    /// encoded itself.
    pub fn create_stream(&mut self, dict: Dictionary) -> Result<StreamWriter<'_, W>> {
        self.create_stream_with(dict, FilterChain::identity())
    }

    /// Start a stream object whose payload runs through `filters` on close.
    pub fn create_stream_with(&mut self, dict: Dictionary, filters: FilterChain) -> Result<StreamWriter<'_, W>> {
        let reference = self.guard("create stream", |w| {
            w.require_building("create stream")?;
            validate_dictionary(&dict)?;
            Ok(w.allocate_stream(dict))
        })?;
        Ok(StreamWriter::new(self, reference, filters))
    }

    /// Add a page and return the writer for its content stream.
    ///
    /// The page dictionary gets `/Type /Page`, `/Parent` and `/Contents`;
    /// every other entry of `dict` is kept in order. The content stream is
    /// compressed when the configuration asks for it.
    pub fn create_page(&mut self, dict: Dictionary) -> Result<StreamWriter<'_, W>> {
        let contents = self.guard("create page", |w| {
            w.require_building("create page")?;
            validate_dictionary(&dict)?;
            let page = w.table.allocate(Value::Null);
            let contents = w.allocate_stream(Dictionary::new());

            let mut page_dict = Dictionary::new()
                .with("Type", Value::name("Page"))
                .with("Parent", w.pages_root);
            for (key, value) in dict.iter() {
                if !matches!(key.as_str(), "Type" | "Parent" | "Contents") {
                    page_dict.insert(key.as_str(), value.clone());
                }
            }
            page_dict.insert("Contents", contents);
            w.table.writable_mut(page)?.value = page_dict.into();
            w.pages.push(page);
            log::debug!("page {} is object {} (contents {})", w.pages.len(), page, contents);
            Ok(contents)
        })?;
        let filters = if self.config.compress {
            FilterChain::flate()
        } else {
            FilterChain::identity()
        };
        Ok(StreamWriter::new(self, contents, filters))
    }

    /// Append an already-built `/Page` object to the page tree.
    pub(crate) fn add_page(&mut self, page: ObjectRef) {
        self.pages.push(page);
    }

    /// Allocate a stream object; it stays open until its writer closes.
    pub(crate) fn allocate_stream(&mut self, dict: Dictionary) -> ObjectRef {
        let reference = self.table.allocate(dict.into());
        if let Ok(object) = self.table.writable_mut(reference) {
            object.open = true;
        }
        reference
    }

    /// Store a complete stream object in one step.
    pub(crate) fn insert_stream(&mut self, dict: Dictionary, data: Vec<u8>) -> Result<ObjectRef> {
        let reference = self.allocate_stream(dict);
        self.finish_stream(reference, data, Vec::new())?;
        Ok(reference)
    }

    /// Record a closed stream's payload and patch its dictionary.
    ///
    /// `filters` are prepended to any `/Filter` the dictionary already has.
    pub(crate) fn finish_stream(&mut self, reference: ObjectRef, data: Vec<u8>, filters: Vec<String>) -> Result<()> {
        let object = self.table.writable_mut(reference)?;
        if !object.open {
            return Err(Error::state(format!("close stream {}", reference), "closed"));
        }
        let found = object.value.type_name();
        let dict = object.value.as_dict_mut().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: found.to_string(),
        })?;

        if !filters.is_empty() {
            let mut names = filters;
            if let Some(existing) = dict.get("Filter") {
                names.extend(filter_names(existing));
            }
            let filter = if names.len() == 1 {
                Value::name(names.remove(0))
            } else {
                Value::Array(names.into_iter().map(Value::name).collect())
            };
            dict.insert("Filter", filter);
        }
        dict.insert("Length", data.len());

        object.stream = Some(data);
        object.open = false;
        Ok(())
    }

    /// First phase of close: build the document structure and write the body.
    ///
    /// Fails if a stream writer is still open.
    pub fn finalize(&mut self) -> Result<()> {
        self.guard("finalize", |w| w.write_body())
    }

    fn write_body(&mut self) -> Result<()> {
        if self.phase != Phase::Building {
            return Ok(());
        }
        if let Some((reference, _)) = self.table.writable().find(|(_, object)| object.open) {
            return Err(Error::state("finalize", format!("stream {} is still open", reference)));
        }

        let kids: Vec<Value> = self.pages.iter().map(|&page| Value::Reference(page)).collect();
        let root = Dictionary::new()
            .with("Type", Value::name("Pages"))
            .with("Kids", kids)
            .with("Count", self.pages.len())
            .with("MediaBox", self.config.media_box);
        *self.table.writable_mut(self.pages_root)? = WritableObject::new(root.into());

        // A failed earlier attempt may have allocated these already.
        if self.catalog.is_none() {
            let catalog = Dictionary::new()
                .with("Type", Value::name("Catalog"))
                .with("Pages", self.pages_root);
            self.catalog = Some(self.table.allocate(catalog.into()));
            if let Some(info) = self.config.info_dictionary() {
                self.info = Some(self.table.allocate(info.into()));
            }
        }

        let serializer = ObjectSerializer::new();
        let start = self.sink.tell();
        let mut body = Vec::new();
        let mut offsets = BTreeMap::new();
        for (reference, object) in self.table.writable() {
            let bytes = match &object.stream {
                Some(data) => {
                    let dict = object.value.as_dict().ok_or_else(|| Error::InvalidObjectType {
                        expected: "Dictionary".to_string(),
                        found: object.value.type_name().to_string(),
                    })?;
                    serializer.serialize_stream(reference, dict, data)
                },
                None => serializer.serialize_indirect(reference, &object.value),
            };
            offsets.insert(reference.id, start + body.len() as u64);
            body.extend_from_slice(&bytes);
        }
        self.sink.write(&body)?;
        self.body_digest = Md5::digest(&body).to_vec();
        self.offsets = offsets;
        log::debug!(
            "wrote {} objects, {} pages, body ends at byte {}",
            self.offsets.len(),
            self.pages.len(),
            self.sink.tell()
        );
        self.phase = Phase::Finalized;
        Ok(())
    }

    /// Second phase of close: write the xref table and trailer.
    ///
    /// Fails unless [`finalize`](Self::finalize) has run.
    pub fn flush(&mut self) -> Result<()> {
        self.guard("flush", |w| w.write_trailer())
    }

    fn write_trailer(&mut self) -> Result<()> {
        match self.phase {
            Phase::Building => return Err(Error::state("flush", "not finalized")),
            Phase::Flushed => return Ok(()),
            Phase::Finalized => {},
        }
        let catalog = self
            .catalog
            .ok_or_else(|| Error::InvalidPdf("no catalog after finalize".to_string()))?;

        let xref_offset = self.sink.tell();
        let size = self.table.size();
        self.sink.write(&xref_section(size, &self.offsets))?;

        let mut trailer = Dictionary::new().with("Size", size).with("Root", catalog);
        if let Some(info) = self.info {
            trailer.insert("Info", info);
        }
        let id = self.config.id.clone().unwrap_or_else(|| self.body_digest.clone());
        trailer.insert("ID", vec![Value::Binary(id.clone()), Value::Binary(id)]);
        self.sink.write(&trailer_section(&trailer, xref_offset))?;
        self.sink.flush()?;

        log::debug!("xref at byte {}, {} entries", xref_offset, size);
        self.phase = Phase::Flushed;
        Ok(())
    }

    /// Finalize, flush and close the file.
    ///
    /// A writer in the error state is closed without writing anything more.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            FileState::Closed => {
                let err = Error::state("close", self.state);
                self.reporter.report(&err);
                Err(err)
            },
            FileState::Error => {
                self.state = FileState::Closed;
                Ok(())
            },
            _ => {
                self.finalize()?;
                self.flush()?;
                self.state = FileState::Closed;
                Ok(())
            },
        }
    }
}

impl PdfWriter<MemorySink> {
    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        self.sink.as_bytes()
    }

    /// Consume the writer and return the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.into_sink().into_bytes()
    }
}

impl<W: ByteSink> fmt::Debug for PdfWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfWriter")
            .field("version", &self.config.version)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("objects", &self.table.size())
            .field("pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}
