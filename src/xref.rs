//! Cross-reference loading.
//!
//! The xref maps object numbers to byte offsets (or object-stream slots).
//! Both classic `xref` tables and cross-reference streams (PDF 1.5+) are
//! read, and the `/Prev` chain of incremental updates is followed from the
//! newest section backwards. A newer section always wins: an older entry is
//! only used for object numbers the newer sections never mention.

use crate::error::{Error, Result};
use crate::decoders::{self, DecodeParams};
use crate::lexer::Token;
use crate::object::{Dictionary, Value, filter_names};
use crate::parser::ObjectParser;
use crate::parser_config::ParserOptions;
use crate::source::{ByteSource, SourceStream};
use nom::{
    IResult,
    bytes::complete::{tag, take_while, take_while_m_n},
    character::complete::{digit1, one_of},
    combinator::map_res,
    sequence::tuple,
};
use std::collections::{BTreeMap, HashSet};

/// How many bytes at the end of the file are searched for `startxref`.
const TAIL_SIZE: u64 = 1024;

/// Largest subsection count accepted in a classic table.
const MAX_SUBSECTION_COUNT: u32 = 1_000_000;

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object at a byte offset
    Uncompressed,
    /// Entry for an object inside an object stream (PDF 1.5+)
    Compressed,
}

/// Cross-reference table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed), object stream number (compressed), or
    /// next free object (free)
    pub offset: u64,
    /// Generation number, or index within the object stream for compressed entries
    pub generation: u16,
}

impl XRefEntry {
    /// Uncompressed object at `offset`.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
        }
    }

    /// Object at `index` inside object stream `stream`.
    pub fn compressed(stream: u64, index: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream,
            generation: index,
        }
    }

    /// Free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
        }
    }

    /// Whether the entry names an object in use.
    pub fn in_use(&self) -> bool {
        self.entry_type != XRefEntryType::Free
    }
}

/// Cross-reference entries plus the trailer that came with them.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The trailer dictionary (for xref streams, the stream dictionary).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = trailer;
    }

    /// Take the trailer dictionary.
    pub fn into_trailer(self) -> Dictionary {
        self.trailer
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Entry for `object_number`.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Entries in ascending object number.
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    /// Merge an older section into this (newer) one.
    ///
    /// Entries already present here win. Trailer keys missing here are
    /// taken from the older trailer.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in older.trailer.iter() {
            if !self.trailer.contains_key(key) {
                self.trailer.insert(key.clone(), value.clone());
            }
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decimal_u64(input: &[u8]) -> IResult<&[u8], u64> {
    map_res(digit1, |d: &[u8]| {
        std::str::from_utf8(d)
            .map_err(|_| ())
            .and_then(|s| s.parse::<u64>().map_err(|_| ()))
    })(input)
}

fn is_pdf_whitespace(b: u8) -> bool {
    crate::lexer::is_whitespace(b)
}

/// `startxref <ws> <offset>`
fn startxref_offset(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, _) = tag("startxref")(input)?;
    let (input, _) = take_while(is_pdf_whitespace)(input)?;
    decimal_u64(input)
}

/// Fixed-width part of a classic entry: `oooooooooo ggggg n`.
fn xref_entry(input: &[u8]) -> IResult<&[u8], (u64, u16, char)> {
    let digits = |n| take_while_m_n(n, n, |b: u8| b.is_ascii_digit());
    let (input, (offset, _, generation, _, flag)) = tuple((
        map_res(digits(10), parse_ascii::<u64>),
        tag(" "),
        map_res(digits(5), parse_ascii::<u32>),
        tag(" "),
        one_of("nf"),
    ))(input)?;
    Ok((input, (offset, generation.min(u32::from(u16::MAX)) as u16, flag)))
}

fn parse_ascii<T: std::str::FromStr>(digits: &[u8]) -> std::result::Result<T, ()> {
    std::str::from_utf8(digits)
        .map_err(|_| ())?
        .parse()
        .map_err(|_| ())
}

/// Find the offset named by the last `startxref` in the final 1 KiB.
pub fn find_startxref(source: &dyn ByteSource) -> Result<u64> {
    let size = source.size();
    let start = size.saturating_sub(TAIL_SIZE);
    let tail = source.read_range(start, (size - start) as usize)?;

    if !tail.windows(5).any(|w| w == b"%%EOF") {
        log::warn!("no %%EOF marker in the last {} bytes", TAIL_SIZE);
    }

    let pos = tail
        .windows(9)
        .rposition(|w| w == b"startxref")
        .ok_or_else(|| Error::InvalidXref("startxref not found".to_string()))?;
    let (_, offset) = startxref_offset(&tail[pos..])
        .map_err(|_| Error::InvalidXref("startxref is not followed by an offset".to_string()))?;
    log::debug!("startxref points at byte {}", offset);
    Ok(offset)
}

/// Load the xref section at `offset` and every section reachable through `/Prev`.
pub fn load_xref_chain(
    source: &dyn ByteSource,
    offset: u64,
    options: &ParserOptions,
) -> Result<CrossRefTable> {
    let mut merged: Option<CrossRefTable> = None;
    let mut visited = HashSet::new();
    let mut next = Some(offset);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            return Err(Error::InvalidXref(format!(
                "/Prev chain loops back to byte {}",
                offset
            )));
        }
        if visited.len() > options.max_xref_chain {
            return Err(Error::LimitExceeded(format!(
                "more than {} xref sections in the /Prev chain",
                options.max_xref_chain
            )));
        }

        let mut section = parse_xref_section(source, offset, options)?;

        // Hybrid files: a classic section may point at an xref stream
        // holding the compressed entries.
        if let Some(stm) = section.trailer().get_integer("XRefStm") {
            let stm = stm as u64;
            if visited.insert(stm) {
                match parse_xref_section(source, stm, options) {
                    Ok(stream_section) => {
                        for (number, entry) in stream_section.entries {
                            section.entries.entry(number).or_insert(entry);
                        }
                    },
                    Err(e) => log::warn!("ignoring unreadable /XRefStm at byte {}: {}", stm, e),
                }
            }
        }

        next = match section.trailer().get("Prev") {
            Some(Value::Integer(prev)) if *prev >= 0 => Some(*prev as u64),
            Some(other) => {
                log::warn!("ignoring /Prev of type {}", other.type_name());
                None
            },
            None => None,
        };

        merged = Some(match merged {
            None => section,
            Some(mut newer) => {
                newer.merge_from(section);
                newer
            },
        });
    }

    merged.ok_or_else(|| Error::InvalidXref("no xref section loaded".to_string()))
}

/// Parse one classic table or xref stream at `offset`.
pub fn parse_xref_section(
    source: &dyn ByteSource,
    offset: u64,
    options: &ParserOptions,
) -> Result<CrossRefTable> {
    if offset >= source.size() {
        return Err(Error::InvalidXref(format!(
            "xref offset {} is beyond the end of the file ({} bytes)",
            offset,
            source.size()
        )));
    }
    let mut parser =
        ObjectParser::new(SourceStream::new(source, offset)).with_max_nesting(options.max_nesting);

    match parser.peek_token() {
        Ok(Some(Token::Xref)) => {
            log::debug!("classic xref table at byte {}", offset);
            parse_classic(&mut parser)
        },
        Ok(Some(Token::Integer(_))) => {
            log::debug!("xref stream at byte {}", offset);
            parse_xref_stream(source, &mut parser, options)
        },
        Ok(_) | Err(_) => Err(Error::InvalidXref(format!("no xref section at byte {}", offset))),
    }
}

fn parse_classic(parser: &mut ObjectParser<SourceStream<'_>>) -> Result<CrossRefTable> {
    let mut xref = CrossRefTable::new();
    parser.next_token()?;

    loop {
        let at = parser.position();
        match parser.next_token()? {
            Some(Token::Trailer) => break,
            Some(Token::Integer(first)) => {
                let count = match parser.next_token()? {
                    Some(Token::Integer(count)) => count,
                    _ => {
                        return Err(Error::InvalidXref(format!(
                            "subsection header at byte {} has no count",
                            at
                        )));
                    },
                };
                if first < 0 || count < 0 || first > i64::from(u32::MAX) {
                    return Err(Error::InvalidXref(format!(
                        "bad subsection header {} {} at byte {}",
                        first, count, at
                    )));
                }
                if count > i64::from(MAX_SUBSECTION_COUNT) {
                    return Err(Error::LimitExceeded(format!(
                        "xref subsection of {} entries",
                        count
                    )));
                }
                let (first, count) = (first as u32, count as u32);
                if first.checked_add(count).is_none() {
                    return Err(Error::InvalidXref(format!(
                        "subsection {} {} overflows object numbers",
                        first, count
                    )));
                }

                parser.skip_whitespace()?;
                for i in 0..count {
                    let entry_at = parser.position();
                    let raw = parser.read_raw(18)?;
                    let (_, (offset, generation, flag)) = xref_entry(&raw).map_err(|_| {
                        Error::InvalidXref(format!(
                            "malformed entry for object {} at byte {}",
                            first + i,
                            entry_at
                        ))
                    })?;
                    let entry = if flag == 'n' {
                        XRefEntry::uncompressed(offset, generation)
                    } else {
                        XRefEntry::free(offset, generation)
                    };
                    xref.add_entry(first + i, entry);
                    parser.skip_whitespace()?;
                }
            },
            Some(other) => {
                return Err(Error::InvalidXref(format!(
                    "unexpected {} in xref table at byte {}",
                    other.describe(),
                    at
                )));
            },
            None => return Err(Error::InvalidXref("xref table has no trailer".to_string())),
        }
    }

    match parser.read_value()? {
        Value::Dictionary(trailer) => xref.set_trailer(trailer),
        other => {
            return Err(Error::InvalidXref(format!(
                "trailer is a {}, not a dictionary",
                other.type_name()
            )));
        },
    }
    Ok(xref)
}

/// Parse a cross-reference stream.
///
/// The stream dictionary carries `/W [w1 w2 w3]` field widths, `/Size`, and
/// an optional `/Index [first count ...]`; each entry holds a type (0 free,
/// 1 uncompressed, 2 compressed) and two big-endian fields.
fn parse_xref_stream(
    source: &dyn ByteSource,
    parser: &mut ObjectParser<SourceStream<'_>>,
    options: &ParserOptions,
) -> Result<CrossRefTable> {
    let object = parser.read_indirect()?;
    let data_offset = object
        .stream_offset
        .ok_or_else(|| Error::InvalidXref(format!("object {} is not a stream", object.reference)))?;
    let dict = match object.value {
        Value::Dictionary(dict) => dict,
        _ => return Err(Error::InvalidXref("xref stream without dictionary".to_string())),
    };
    if let Some(kind) = dict.type_name() {
        if kind != "XRef" {
            return Err(Error::InvalidXref(format!("expected /Type /XRef, got /{}", kind)));
        }
    }

    let length = dict
        .get_integer("Length")
        .filter(|&l| l >= 0)
        .ok_or_else(|| Error::InvalidXref("xref stream needs a direct /Length".to_string()))?;
    let raw = source.read_range(data_offset, length as usize)?;
    let filters = dict.get("Filter").map(filter_names).unwrap_or_default();
    let params = dict.get("DecodeParms").and_then(DecodeParams::from_value);
    let data = decoders::decode_stream_with_options(&raw, &filters, params.as_ref(), Some(options))?;

    let widths: Vec<usize> = dict
        .get_array("W")
        .ok_or_else(|| Error::InvalidXref("missing /W in xref stream".to_string()))?
        .iter()
        .map(|w| w.as_integer().filter(|&w| (0..=8).contains(&w)).map(|w| w as usize))
        .collect::<Option<_>>()
        .ok_or_else(|| Error::InvalidXref("invalid /W in xref stream".to_string()))?;
    if widths.len() != 3 {
        return Err(Error::InvalidXref(format!("/W has {} fields, expected 3", widths.len())));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(Error::InvalidXref("/W describes empty entries".to_string()));
    }

    let size = dict
        .get_integer("Size")
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| Error::InvalidXref("missing or invalid /Size in xref stream".to_string()))?;

    let ranges: Vec<(u32, u32)> = match dict.get_array("Index") {
        Some(index) => {
            if index.len() % 2 != 0 {
                return Err(Error::InvalidXref("odd-length /Index".to_string()));
            }
            index
                .chunks(2)
                .map(|pair| {
                    let first = pair[0].as_integer().and_then(|n| u32::try_from(n).ok());
                    let count = pair[1].as_integer().and_then(|n| u32::try_from(n).ok());
                    match (first, count) {
                        // The last object number of the range must fit as well.
                        (Some(first), Some(count)) if first.checked_add(count).is_some() => {
                            Ok((first, count))
                        },
                        _ => Err(Error::InvalidXref(format!(
                            "invalid /Index entry [{:?} {:?}]",
                            pair[0], pair[1]
                        ))),
                    }
                })
                .collect::<Result<_>>()?
        },
        None => vec![(0, size)],
    };

    let mut xref = CrossRefTable::new();
    let mut rows = data.chunks_exact(entry_size);
    'ranges: for (first, count) in ranges {
        for i in 0..count {
            let Some(row) = rows.next() else {
                log::warn!("xref stream data ends before object {}", first + i);
                break 'ranges;
            };
            let entry_type = if w1 == 0 { 1 } else { read_int(&row[..w1]) };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = u16::try_from(read_int(&row[w1 + w2..])).map_err(|_| {
                Error::InvalidXref(format!("xref stream entry {} has third field above 65535", first + i))
            })?;
            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3),
                1 => XRefEntry::uncompressed(field2, field3),
                2 => XRefEntry::compressed(field2, field3),
                other => {
                    log::debug!("xref stream entry of unknown type {} treated as free", other);
                    XRefEntry::free(0, 0)
                },
            };
            xref.add_entry(first + i, entry);
        }
    }

    xref.set_trailer(dict);
    Ok(xref)
}

/// Big-endian unsigned integer of up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::ObjectRef;
    use crate::source::MemorySource;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn test_xref_entry_parser() {
        assert_eq!(xref_entry(b"0000000017 00000 n").unwrap().1, (17, 0, 'n'));
        assert_eq!(xref_entry(b"0000000000 65535 f").unwrap().1, (0, 65535, 'f'));
        assert!(xref_entry(b"000000017 00000 n ").is_err());
        assert!(xref_entry(b"0000000017 00000 x").is_err());
    }

    #[test]
    fn test_merge_newer_wins() {
        let mut newer = CrossRefTable::new();
        newer.add_entry(1, XRefEntry::uncompressed(500, 0));
        newer.set_trailer(Dictionary::new().with("Size", 3));

        let mut older = CrossRefTable::new();
        older.add_entry(1, XRefEntry::uncompressed(100, 0));
        older.add_entry(2, XRefEntry::uncompressed(200, 0));
        older.set_trailer(
            Dictionary::new()
                .with("Size", 2)
                .with("Info", ObjectRef::new(2, 0)),
        );

        newer.merge_from(older);
        assert_eq!(newer.get(1).unwrap().offset, 500);
        assert_eq!(newer.get(2).unwrap().offset, 200);
        assert_eq!(newer.trailer().get_integer("Size"), Some(3));
        assert_eq!(newer.trailer().get_reference("Info"), Some(ObjectRef::new(2, 0)));
    }

    #[test]
    fn test_find_startxref() {
        let source = MemorySource::new(&b"%PDF-1.4\n...\nstartxref\n1234\n%%EOF\n"[..]);
        assert_eq!(find_startxref(&source).unwrap(), 1234);
    }

    #[test]
    fn test_find_startxref_uses_last_occurrence() {
        let source =
            MemorySource::new(&b"startxref\n10\n%%EOF\nstuff\nstartxref\r\n99\r\n%%EOF"[..]);
        assert_eq!(find_startxref(&source).unwrap(), 99);
    }

    #[test]
    fn test_find_startxref_missing() {
        let source = MemorySource::new(&b"%PDF-1.4\nno pointer here\n%%EOF"[..]);
        assert_eq!(find_startxref(&source).unwrap_err().kind(), ErrorKind::Structure);
    }

    #[test]
    fn test_classic_section() {
        let data = b"xref\n0 3\n0000000000 65535 f \n0000000015 00000 n \n0000000079 00000 n \n\
trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n";
        let source = MemorySource::new(&data[..]);
        let xref = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap();
        assert_eq!(xref.len(), 3);
        assert_eq!(xref.get(0).unwrap().entry_type, XRefEntryType::Free);
        assert_eq!(xref.get(0).unwrap().generation, 65535);
        assert_eq!(xref.get(1).unwrap().offset, 15);
        assert_eq!(xref.get(2).unwrap().offset, 79);
        assert_eq!(xref.trailer().get_reference("Root"), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_classic_section_crlf_and_subsections() {
        let data = b"xref\r\n0 1\r\n0000000000 65535 f\r\n4 2\r\n0000000100 00000 n\r\n0000000200 00001 n\r\ntrailer<</Size 6>>";
        let source = MemorySource::new(&data[..]);
        let xref = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap();
        assert_eq!(xref.len(), 3);
        assert_eq!(xref.get(4).unwrap().offset, 100);
        assert_eq!(xref.get(5).unwrap().generation, 1);
        assert!(xref.get(1).is_none());
    }

    #[test]
    fn test_classic_section_malformed_entry() {
        let data = b"xref\n0 2\n0000000000 65535 f \n00000x0015 00000 n \ntrailer<<>>";
        let source = MemorySource::new(&data[..]);
        let err = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn test_section_offset_out_of_range() {
        let source = MemorySource::new(&b"xref\n"[..]);
        assert!(parse_xref_section(&source, 50, &ParserOptions::default()).is_err());
        assert!(parse_xref_section(&source, 1, &ParserOptions::default()).is_err());
    }

    #[test]
    fn test_prev_chain() {
        // Older section at 0, newer at `newer_at` pointing back with /Prev 0.
        let older = b"xref\n0 3\n0000000000 65535 f \n0000000011 00000 n \n0000000022 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Info 2 0 R >>\n";
        let mut data = older.to_vec();
        let newer_at = data.len();
        data.extend_from_slice(
            b"xref\n2 2\n0000000333 00000 n \n0000000444 00000 n \ntrailer\n<< /Size 4 /Root 1 0 R /Prev 0 >>\n",
        );
        let source = MemorySource::new(data);
        let xref = load_xref_chain(&source, newer_at as u64, &ParserOptions::default()).unwrap();
        assert_eq!(xref.get(1).unwrap().offset, 11);
        assert_eq!(xref.get(2).unwrap().offset, 333);
        assert_eq!(xref.get(3).unwrap().offset, 444);
        assert_eq!(xref.trailer().get_integer("Size"), Some(4));
        assert_eq!(xref.trailer().get_reference("Info"), Some(ObjectRef::new(2, 0)));
    }

    #[test]
    fn test_prev_cycle_rejected() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        let source = MemorySource::new(&data[..]);
        let err = load_xref_chain(&source, 0, &ParserOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn test_prev_chain_limit() {
        let first = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 >>\n";
        let mut data = first.to_vec();
        let second_at = data.len();
        data.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n");
        let source = MemorySource::new(data);
        let options = ParserOptions::default().with_max_xref_chain(1);
        let err = load_xref_chain(&source, second_at as u64, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Limit);
    }

    #[test]
    fn test_xref_stream() {
        // Entries: 0 free, 1 at offset 15, 2 compressed in stream 5 index 0.
        let rows: Vec<u8> = vec![
            0, 0, 0, 0xFF, //
            1, 0, 15, 0, //
            2, 0, 5, 0, //
        ];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&rows).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = format!(
            "9 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            compressed.len()
        )
        .into_bytes();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let source = MemorySource::new(data);
        let xref = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap();
        assert_eq!(xref.get(0).unwrap().entry_type, XRefEntryType::Free);
        assert_eq!(xref.get(1).unwrap(), &XRefEntry::uncompressed(15, 0));
        assert_eq!(xref.get(2).unwrap(), &XRefEntry::compressed(5, 0));
        assert_eq!(xref.trailer().get_reference("Root"), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_xref_stream_with_index() {
        let rows: Vec<u8> = vec![1, 0, 40, 1, 0, 50];
        let mut data = format!(
            "3 0 obj << /Type /XRef /Size 12 /Index [10 2] /W [1 2 0] /Length {} >> stream\n",
            rows.len()
        )
        .into_bytes();
        data.extend_from_slice(&rows);
        data.extend_from_slice(b"\nendstream endobj");

        let source = MemorySource::new(data);
        let xref = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap();
        assert_eq!(xref.len(), 2);
        assert_eq!(xref.get(10).unwrap().offset, 40);
        assert_eq!(xref.get(11).unwrap().offset, 50);
    }

    fn xref_stream_with(index: &str, rows: &[u8], widths: &str) -> Vec<u8> {
        let mut data = format!(
            "3 0 obj << /Type /XRef /Size 12 /Index {} /W {} /Length {} >> stream\n",
            index,
            widths,
            rows.len()
        )
        .into_bytes();
        data.extend_from_slice(rows);
        data.extend_from_slice(b"\nendstream endobj");
        data
    }

    #[test]
    fn test_xref_stream_index_out_of_range() {
        let rows = [1, 0, 40, 1, 0, 50];
        for index in ["[4294967295 2]", "[4294967296 1]", "[0 -1]", "[1 4294967296]"] {
            let source = MemorySource::new(xref_stream_with(index, &rows, "[1 2 0]"));
            let err = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Structure, "{}", index);
        }

        // The last representable object number is still accepted.
        let source = MemorySource::new(xref_stream_with("[4294967294 1]", &rows[..3], "[1 2 0]"));
        let xref = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap();
        assert_eq!(xref.get(4_294_967_294).unwrap().offset, 40);
    }

    #[test]
    fn test_xref_stream_wide_third_field() {
        let rows = [1, 0, 40, 1, 0, 0];
        let source = MemorySource::new(xref_stream_with("[10 1]", &rows, "[1 2 3]"));
        let err = parse_xref_section(&source, 0, &ParserOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn test_read_int() {
        assert_eq!(read_int(&[]), 0);
        assert_eq!(read_int(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_int(&[0xFF, 0, 0, 1]), 0xFF00_0001);
    }
}
