//! Cross-reference table and trailer output.
//!
//! The writer always emits one classic xref section covering objects
//! `0..size`. Numbers that were never written become free entries chained
//! into the free list headed by object 0.

use super::object_serializer::ObjectSerializer;
use crate::object::Dictionary;
use std::collections::BTreeMap;

/// Build the `xref` section for objects `0..size`.
///
/// `offsets` maps each written object number to its byte offset. Every
/// entry is exactly 20 bytes.
pub fn xref_section(size: u32, offsets: &BTreeMap<u32, u64>) -> Vec<u8> {
    let size = size.max(1);
    let free: Vec<u32> = (1..size).filter(|n| !offsets.contains_key(n)).collect();

    let mut out = format!("xref\n0 {}\n", size).into_bytes();
    out.reserve(size as usize * 20);

    let next_free = |after: u32| free.iter().copied().find(|&n| n > after).unwrap_or(0);
    out.extend_from_slice(format!("{:010} 65535 f \n", next_free(0)).as_bytes());
    for number in 1..size {
        let line = match offsets.get(&number) {
            Some(offset) => format!("{:010} 00000 n \n", offset),
            None => format!("{:010} 00001 f \n", next_free(number)),
        };
        out.extend_from_slice(line.as_bytes());
    }
    out
}

/// Build the `trailer` dictionary, `startxref` pointer and `%%EOF` marker.
pub fn trailer_section(trailer: &Dictionary, xref_offset: u64) -> Vec<u8> {
    let mut out = b"trailer\n".to_vec();
    ObjectSerializer::new().write_dictionary(&mut out, trailer);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}
