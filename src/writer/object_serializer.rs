//! PDF object serialization.
//!
//! Values are written in one canonical form so that the same object graph
//! always produces the same bytes:
//!
//! - dictionaries `<</Key value /Key value>>` in insertion order
//! - arrays `[a b c]`
//! - integers without a decimal point, reals with at least one
//! - names with `#HH` escapes for bytes outside `!`..`~`, delimiters and `#`
//! - text strings as literals with minimal escapes, binary strings as hex

use crate::error::{Error, Result};
use crate::object::{Dictionary, ObjectRef, Value};

/// `name` as PDF name syntax, slash included.
pub fn escape_name(name: &[u8]) -> String {
    let mut text = String::with_capacity(name.len() + 1);
    text.push('/');
    for &byte in name {
        match byte {
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#' => {
                text.push_str(&format!("#{:02X}", byte));
            },
            b'!'..=b'~' => text.push(byte as char),
            _ => text.push_str(&format!("#{:02X}", byte)),
        }
    }
    text
}

/// Reject values that have no PDF syntax. Empty names and empty
/// dictionary keys would serialize as a bare `/`, and names may not hold NUL.
pub fn validate_value(value: &Value) -> Result<()> {
    match value {
        Value::Name(name) if name.is_empty() => Err(Error::InvalidPdf("empty name".to_string())),
        Value::Name(name) if name.contains(&0) => Err(Error::InvalidPdf(format!(
            "name /{} contains a NUL byte",
            String::from_utf8_lossy(name)
        ))),
        Value::Array(items) => items.iter().try_for_each(validate_value),
        Value::Dictionary(dict) => validate_dictionary(dict),
        _ => Ok(()),
    }
}

/// [`validate_value`] for a dictionary.
pub fn validate_dictionary(dict: &Dictionary) -> Result<()> {
    for (key, value) in dict.iter() {
        if key.is_empty() {
            return Err(Error::InvalidPdf("empty dictionary key".to_string()));
        }
        if key.contains('\0') {
            return Err(Error::InvalidPdf("dictionary key contains a NUL byte".to_string()));
        }
        validate_value(value)?;
    }
    Ok(())
}

/// Serializer for PDF values and indirect objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize a value to bytes.
    pub fn serialize(&self, value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_value(&mut buf, value);
        buf
    }

    /// Serialize a value to a string (for debugging and tests).
    pub fn serialize_to_string(&self, value: &Value) -> String {
        String::from_utf8_lossy(&self.serialize(value)).into_owned()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{value}\nendobj\n`
    pub fn serialize_indirect(&self, reference: ObjectRef, value: &Value) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", reference.id, reference.gen).into_bytes();
        self.write_value(&mut buf, value);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    /// Serialize a stream object. The dictionary is written as given; its
    /// `/Length` must already match `data`.
    ///
    /// Format: `{id} {gen} obj\n{dict}\nstream\n{data}\nendstream\nendobj\n`
    pub fn serialize_stream(&self, reference: ObjectRef, dict: &Dictionary, data: &[u8]) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", reference.id, reference.gen).into_bytes();
        buf.reserve(data.len() + 64);
        self.write_dictionary(&mut buf, dict);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\nendstream\nendobj\n");
        buf
    }

    /// Append the serialized form of `value` to `out`.
    pub fn write_value(&self, out: &mut Vec<u8>, value: &Value) {
        match value {
            Value::Null => out.extend_from_slice(b"null"),
            Value::Boolean(true) => out.extend_from_slice(b"true"),
            Value::Boolean(false) => out.extend_from_slice(b"false"),
            Value::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Value::Real(r) => self.write_real(out, *r),
            Value::Name(name) => self.write_name(out, name),
            Value::String(s) => self.write_literal(out, s),
            Value::Binary(b) => self.write_hex(out, b),
            Value::Array(items) => self.write_array(out, items),
            Value::Dictionary(dict) => self.write_dictionary(out, dict),
            Value::Reference(r) => out.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes()),
        }
    }

    /// Reals always carry a decimal point so they read back as reals.
    fn write_real(&self, out: &mut Vec<u8>, value: f64) {
        if !value.is_finite() {
            log::warn!("cannot represent {} in PDF; writing 0.0", value);
            out.extend_from_slice(b"0.0");
            return;
        }
        // f64's Display is the shortest round-tripping form and never uses exponents.
        let mut text = value.to_string();
        if !text.contains('.') {
            text.push_str(".0");
        }
        out.extend_from_slice(text.as_bytes());
    }

    /// Write a literal string `(...)`.
    fn write_literal(&self, out: &mut Vec<u8>, data: &[u8]) {
        out.push(b'(');
        for &byte in data {
            match byte {
                b'(' => out.extend_from_slice(b"\\("),
                b')' => out.extend_from_slice(b"\\)"),
                b'\\' => out.extend_from_slice(b"\\\\"),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                0x08 => out.extend_from_slice(b"\\b"),
                0x0C => out.extend_from_slice(b"\\f"),
                _ => out.push(byte),
            }
        }
        out.push(b')');
    }

    /// Write a hex string `<...>` in uppercase.
    fn write_hex(&self, out: &mut Vec<u8>, data: &[u8]) {
        out.push(b'<');
        for byte in data {
            out.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        out.push(b'>');
    }

    fn write_name(&self, out: &mut Vec<u8>, name: &[u8]) {
        out.extend_from_slice(escape_name(name).as_bytes());
    }

    fn write_array(&self, out: &mut Vec<u8>, items: &[Value]) {
        out.push(b'[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            self.write_value(out, item);
        }
        out.push(b']');
    }

    /// Write a dictionary, keeping key order.
    pub fn write_dictionary(&self, out: &mut Vec<u8>, dict: &Dictionary) {
        out.extend_from_slice(b"<<");
        for (i, (key, value)) in dict.iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            self.write_name(out, key.as_bytes());
            out.push(b' ');
            self.write_value(out, value);
        }
        out.extend_from_slice(b">>");
    }
}
