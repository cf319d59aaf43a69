//! Reader configuration: recovery switches and implementation limits.

/// Options controlling how much damage the reader tolerates and how far it
/// will follow untrusted structure.
///
/// A recoverable problem (missing `endobj`, wrong stream `/Length`, broken
/// xref) is only offered to the file's error sink when the matching
/// `allow_*` switch is on; otherwise it fails the operation outright.
///
/// # Example
///
/// ```
/// use pdfio::parser_config::ParserOptions;
///
/// // Reject anything malformed
/// let strict = ParserOptions::strict();
/// assert!(!strict.allow_xref_reconstruction);
///
/// // Default: recover where possible, with limits
/// let lenient = ParserOptions::default().with_max_errors(10);
/// assert!(lenient.allow_missing_endobj);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum array/dictionary nesting depth inside one value
    pub max_nesting: usize,

    /// Maximum depth of reference chains followed while resolving objects
    /// and walking the page tree
    pub max_recursion_depth: u32,

    /// Maximum number of xref sections followed through `/Prev`
    pub max_xref_chain: usize,

    /// Maximum number of recoverable errors one file may continue past
    /// (0 = unlimited)
    pub max_errors: usize,

    /// Accept objects whose value is not followed by `endobj`
    pub allow_missing_endobj: bool,

    /// Accept streams whose `/Length` does not land on `endstream`
    pub allow_malformed_streams: bool,

    /// Rebuild the xref by scanning the file when it cannot be loaded
    pub allow_xref_reconstruction: bool,

    /// Maximum decompressed:compressed ratio per filter (0 = unchecked)
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes (0 = unchecked)
    pub max_decompressed_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: every malformation fails the operation.
    pub fn strict() -> Self {
        Self {
            max_nesting: 100,
            max_recursion_depth: 100,
            max_xref_chain: 100,
            max_errors: 1,
            allow_missing_endobj: false,
            allow_malformed_streams: false,
            allow_xref_reconstruction: false,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024,
        }
    }

    /// Lenient mode: recover from common damage, subject to the error sink.
    pub fn lenient() -> Self {
        Self {
            max_nesting: 100,
            max_recursion_depth: 100,
            max_xref_chain: 100,
            max_errors: 1000,
            allow_missing_endobj: true,
            allow_malformed_streams: true,
            allow_xref_reconstruction: true,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024,
        }
    }

    /// Set the value nesting limit.
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Set the reference-chain depth limit.
    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Set the `/Prev` chain limit.
    pub fn with_max_xref_chain(mut self, sections: usize) -> Self {
        self.max_xref_chain = sections;
        self
    }

    /// Set the recoverable error budget.
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Toggle xref reconstruction.
    pub fn with_xref_reconstruction(mut self, allow: bool) -> Self {
        self.allow_xref_reconstruction = allow;
        self
    }

    /// Set the decompression ratio limit.
    pub fn with_max_decompression_ratio(mut self, ratio: u32) -> Self {
        self.max_decompression_ratio = ratio;
        self
    }

    /// Set the decompressed size limit.
    pub fn with_max_decompressed_size(mut self, bytes: usize) -> Self {
        self.max_decompressed_size = bytes;
        self
    }
}
