//! Error types for the PDF engine.
//!
//! Every [`Error`] maps to a stable [`ErrorKind`] so callers can react to the
//! category of a failure without matching on message text. Errors are also
//! delivered to an [`ErrorSink`] installed on each file handle, which decides
//! whether a recoverable problem aborts the current operation.

use crate::object::ObjectRef;
use std::fmt;

/// Result type alias for PDF engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The byte source or sink could not read, write or seek.
    Io,
    /// The token scanner rejected the input.
    Lex,
    /// The value reader rejected a token sequence.
    Syntax,
    /// Xref, trailer or page tree invariants were violated.
    Structure,
    /// Encryption, exotic filters or a PDF version newer than 2.0.
    Unsupported,
    /// The operation was invoked in the wrong file or stream state.
    State,
    /// An implementation limit was exceeded.
    Limit,
    /// A page or object index is out of range.
    NotFound,
}

impl ErrorKind {
    /// Lowercase name of the kind, as used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Lex => "lex",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Structure => "structure",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::State => "state",
            ErrorKind::Limit => "limit",
            ErrorKind::NotFound => "not-found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while reading or writing PDF files.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// IO error from the underlying byte source or sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Token scanner failure at a byte offset
    #[error("Lexical error at byte {offset}: {reason}")]
    Lex {
        /// Byte offset where the scanner stopped
        offset: u64,
        /// What the scanner rejected
        reason: String,
    },

    /// Value reader failure at a byte offset
    #[error("Syntax error at byte {offset}: {reason}")]
    Syntax {
        /// Byte offset of the offending token
        offset: u64,
        /// What the reader expected
        reason: String,
    },

    /// Missing or malformed `%PDF-M.N` header
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    /// PDF version newer than the engine supports
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Broken cross-reference section or `startxref` pointer
    #[error("Invalid cross-reference data: {0}")]
    InvalidXref(String),

    /// Generic structural violation
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Referenced object is not present in the object table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Index past the end of the page list or object table
    #[error("Index {index} out of range ({count} available)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of available items
        count: usize,
    },

    /// Object has the wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unsupported feature (encryption and the like)
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Image import error
    #[error("Image error: {0}")]
    Image(String),

    /// Operation invoked in the wrong state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted
        operation: String,
        /// State the file or stream was in
        state: String,
    },

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Any other implementation limit
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

impl Error {
    /// Stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Lex { .. } => ErrorKind::Lex,
            Error::Syntax { .. } => ErrorKind::Syntax,
            Error::InvalidHeader(_)
            | Error::Image(_)
            | Error::InvalidXref(_)
            | Error::InvalidPdf(_)
            | Error::InvalidObjectType { .. }
            | Error::Decode(_)
            | Error::CircularReference(_) => ErrorKind::Structure,
            Error::UnsupportedVersion(_) | Error::Unsupported(_) | Error::UnsupportedFilter(_) => {
                ErrorKind::Unsupported
            },
            Error::InvalidState { .. } => ErrorKind::State,
            Error::RecursionLimitExceeded(_) | Error::LimitExceeded(_) => ErrorKind::Limit,
            Error::ObjectNotFound(..) | Error::IndexOutOfRange { .. } => ErrorKind::NotFound,
        }
    }

    pub(crate) fn lex(offset: u64, reason: impl Into<String>) -> Self {
        Error::Lex {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn syntax(offset: u64, reason: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn state(operation: impl Into<String>, state: impl fmt::Display) -> Self {
        Error::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }
}

/// Receiver for errors raised while a file is being read or written.
///
/// `report` returns `true` to abort the current operation (the file then
/// enters its error state) or `false` to let the engine apply its recovery
/// strategy and continue.
pub trait ErrorSink {
    /// Deliver one error. Return `true` to abort.
    fn report(&mut self, kind: ErrorKind, message: &str) -> bool;
}

impl<F> ErrorSink for F
where
    F: FnMut(ErrorKind, &str) -> bool,
{
    fn report(&mut self, kind: ErrorKind, message: &str) -> bool {
        self(kind, message)
    }
}

/// Default sink: logs every report and continues unless built with
/// [`LogErrorSink::aborting`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink {
    abort: bool,
}

impl LogErrorSink {
    /// Sink that logs and lets recovery proceed.
    pub fn new() -> Self {
        Self { abort: false }
    }

    /// Sink that logs and aborts on the first report.
    pub fn aborting() -> Self {
        Self { abort: true }
    }
}

impl ErrorSink for LogErrorSink {
    fn report(&mut self, kind: ErrorKind, message: &str) -> bool {
        if self.abort {
            log::error!("{}: {}", kind, message);
        } else {
            log::warn!("{}: {}", kind, message);
        }
        self.abort
    }
}

/// Per-file bookkeeping around an [`ErrorSink`].
pub(crate) struct Reporter {
    sink: Box<dyn ErrorSink>,
    continued: usize,
    max_errors: usize,
}

impl Reporter {
    pub(crate) fn new(sink: Box<dyn ErrorSink>, max_errors: usize) -> Self {
        Self {
            sink,
            continued: 0,
            max_errors,
        }
    }

    /// Deliver an error; returns the sink's abort decision.
    pub(crate) fn report(&mut self, err: &Error) -> bool {
        self.sink.report(err.kind(), &err.to_string())
    }

    /// Deliver a recoverable error. `Ok` means the caller may apply its
    /// fallback; `Err` carries the error that ends the operation and has
    /// already been reported.
    pub(crate) fn recover(&mut self, err: Error) -> Result<()> {
        if self.report(&err) {
            return Err(err);
        }
        self.continued += 1;
        if self.max_errors > 0 && self.continued > self.max_errors {
            let limit = Error::LimitExceeded(format!(
                "more than {} recoverable errors in one file",
                self.max_errors
            ));
            self.report(&limit);
            return Err(limit);
        }
        Ok(())
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("continued", &self.continued)
            .field("max_errors", &self.max_errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn test_lex_error_carries_offset() {
        let err = Error::lex(1234, "invalid escape sequence");
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid escape sequence"));
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(format!("{}", err).contains("10 0 R"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_state_error() {
        let err = Error::state("read object", "closed");
        assert_eq!(format!("{}", err), "Cannot read object while closed");
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::Io.to_string(), "io");
        assert_eq!(ErrorKind::Unsupported.to_string(), "unsupported");
        assert_eq!(ErrorKind::NotFound.to_string(), "not-found");
        assert_eq!(Error::UnsupportedVersion("2.1".into()).kind(), ErrorKind::Unsupported);
        assert_eq!(Error::RecursionLimitExceeded(100).kind(), ErrorKind::Limit);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(format!("{}", err).contains("IO error"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let mut sink = move |kind: ErrorKind, msg: &str| {
            log.borrow_mut().push((kind, msg.to_string()));
            true
        };
        assert!(sink.report(ErrorKind::Structure, "bad xref"));
        assert_eq!(seen.borrow()[0], (ErrorKind::Structure, "bad xref".to_string()));
    }

    #[test]
    fn test_reporter_recover_continues() {
        let mut reporter = Reporter::new(Box::new(LogErrorSink::new()), 0);
        assert!(reporter.recover(Error::InvalidPdf("missing endobj".into())).is_ok());
    }

    #[test]
    fn test_reporter_recover_aborts() {
        let mut reporter = Reporter::new(Box::new(LogErrorSink::aborting()), 0);
        let err = reporter.recover(Error::InvalidPdf("missing endobj".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn test_reporter_error_budget() {
        let mut reporter = Reporter::new(Box::new(LogErrorSink::new()), 2);
        assert!(reporter.recover(Error::InvalidPdf("one".into())).is_ok());
        assert!(reporter.recover(Error::InvalidPdf("two".into())).is_ok());
        let err = reporter.recover(Error::InvalidPdf("three".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Limit);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
