//! Cross-reference reconstruction for damaged files.
//!
//! When the xref cannot be loaded, the whole file is scanned for `N G obj`
//! headers. The last `trailer` dictionary in the file is reused when it
//! names a `/Root`; otherwise a minimal trailer is built around the first
//! object whose `/Type` is `/Catalog`.
//!
//! This is a fallback only; it is never used for files whose xref loads.

use crate::error::{Error, Result};
use crate::object::{Dictionary, ObjectRef, Value};
use crate::parser::ObjectParser;
use crate::source::{ByteSource, SliceStream};
use crate::xref::{CrossRefTable, XRefEntry, XRefEntryType};
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_HEADER: Regex = Regex::new(r"(\d+)\s+(\d+)\s+obj").unwrap();

    /// "trailer <<" openings
    static ref RE_TRAILER: Regex = Regex::new(r"trailer\s*<<").unwrap();
}

/// Rebuild the xref (and its trailer) by scanning the file.
///
/// Later definitions of the same object number override earlier ones, as
/// an incremental update would.
pub fn reconstruct_xref(source: &dyn ByteSource, max_nesting: usize) -> Result<CrossRefTable> {
    log::info!("reconstructing xref by scanning {} bytes", source.size());
    let contents = source.read_range(0, source.size() as usize)?;

    let mut xref = CrossRefTable::new();
    xref.add_entry(0, XRefEntry::free(0, 65535));
    let mut found = 0usize;

    for capture in RE_OBJ_HEADER.captures_iter(&contents) {
        let (Some(whole), Some(num), Some(gen)) = (capture.get(0), capture.get(1), capture.get(2))
        else {
            continue;
        };
        // A header glued to a preceding digit or letter is part of something else.
        if whole.start() > 0 && contents[whole.start() - 1].is_ascii_alphanumeric() {
            continue;
        }
        let (Some(number), Some(generation)) = (
            parse_digits::<u32>(num.as_bytes()),
            parse_digits::<u16>(gen.as_bytes()),
        ) else {
            log::debug!("skipping out-of-range object header at byte {}", whole.start());
            continue;
        };
        if number == 0 || !starts_value(&contents[whole.end()..]) {
            log::debug!("skipping false object header at byte {}", whole.start());
            continue;
        }
        xref.add_entry(number, XRefEntry::uncompressed(whole.start() as u64, generation));
        found += 1;
    }

    if found == 0 {
        return Err(Error::InvalidXref("no objects found while rebuilding xref".to_string()));
    }
    log::info!("rebuilt xref with {} object headers", found);

    let trailer = match find_trailer(&contents, max_nesting) {
        Some(trailer) => trailer,
        None => minimal_trailer(&contents, &xref, max_nesting)?,
    };
    xref.set_trailer(trailer);
    Ok(xref)
}

fn parse_digits<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Whether the bytes after `obj` can start a value.
fn starts_value(rest: &[u8]) -> bool {
    let next = rest.iter().copied().find(|&b| !crate::lexer::is_whitespace(b));
    match next {
        Some(b) => {
            matches!(b, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
                || b.is_ascii_digit()
        },
        None => false,
    }
}

/// Last `trailer` dictionary in the file that names a `/Root`.
fn find_trailer(contents: &[u8], max_nesting: usize) -> Option<Dictionary> {
    let starts: Vec<usize> = RE_TRAILER.find_iter(contents).map(|m| m.start()).collect();
    for start in starts.into_iter().rev() {
        let mut parser = ObjectParser::new(SliceStream::new(&contents[start + "trailer".len()..]))
            .with_max_nesting(max_nesting);
        match parser.read_value() {
            Ok(Value::Dictionary(mut trailer)) if trailer.contains_key("Root") => {
                // Offsets in a damaged file are not to be trusted.
                trailer.remove("Prev");
                trailer.remove("XRefStm");
                log::info!("reusing trailer found at byte {}", start);
                return Some(trailer);
            },
            Ok(_) => log::debug!("trailer at byte {} has no /Root", start),
            Err(e) => log::debug!("unreadable trailer at byte {}: {}", start, e),
        }
    }
    None
}

/// Trailer naming the first `/Type /Catalog` object.
fn minimal_trailer(
    contents: &[u8],
    xref: &CrossRefTable,
    max_nesting: usize,
) -> Result<Dictionary> {
    let mut size = 1u32;
    let mut root = None;
    for (&number, entry) in xref.iter() {
        size = size.max(number.saturating_add(1));
        if root.is_some() || entry.entry_type != XRefEntryType::Uncompressed {
            continue;
        }
        let Some(data) = contents.get(entry.offset as usize..) else {
            continue;
        };
        let mut parser = ObjectParser::new(SliceStream::new(data)).with_max_nesting(max_nesting);
        if let Ok(object) = parser.read_indirect() {
            if is_catalog(&object.value) {
                log::info!("using object {} as the catalog", object.reference);
                root = Some(ObjectRef::new(number, entry.generation));
            }
        }
    }

    let root = root.ok_or_else(|| {
        Error::InvalidXref("no trailer and no catalog found while rebuilding xref".to_string())
    })?;
    Ok(Dictionary::new().with("Size", size).with("Root", root))
}

fn is_catalog(value: &Value) -> bool {
    value.as_dict().and_then(Dictionary::type_name) == Some("Catalog")
}
