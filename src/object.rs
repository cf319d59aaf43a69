//! PDF value and object model.
//!
//! A [`Value`] is one of the PDF value kinds; an [`Object`] is a numbered,
//! generation-tagged value that may carry a stream payload. Values refer to
//! other objects only through [`ObjectRef`], never by ownership, so cyclic
//! graphs such as `/Parent` back-references need no special handling.

use crate::decoders::{self, DecodeParams};
use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;
use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// Name bytes, without the leading slash and with `#HH` decoded
    Name(Vec<u8>),
    /// Text-like byte string
    String(Vec<u8>),
    /// Byte string known to carry non-text bytes (document IDs and the like)
    Binary(Vec<u8>),
    /// Array of values
    Array(Vec<Value>),
    /// Ordered dictionary
    Dictionary(Dictionary),
    /// Indirect object reference
    Reference(ObjectRef),
}

impl Value {
    /// Name value.
    pub fn name(name: impl Into<Vec<u8>>) -> Self {
        Value::Name(name.into())
    }

    /// Text string value.
    pub fn string(text: impl Into<Vec<u8>>) -> Self {
        Value::String(text.into())
    }

    /// Array of numbers; whole values become integers.
    pub fn numbers(values: &[f64]) -> Self {
        Value::Array(
            values
                .iter()
                .map(|&v| {
                    if v.fract() == 0.0 && v.abs() < 1e15 {
                        Value::Integer(v as i64)
                    } else {
                        Value::Real(v)
                    }
                })
                .collect(),
        )
    }

    /// Get the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Real(_) => "Real",
            Value::Name(_) => "Name",
            Value::String(_) => "String",
            Value::Binary(_) => "Binary",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Reference(_) => "Reference",
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to integer. Reals with no fractional part qualify.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(r) if r.fract() == 0.0 && r.abs() < i64::MAX as f64 => Some(*r as i64),
            _ => None,
        }
    }

    /// Try to cast to a number; integers are a subset of reals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name. `None` for names that are not UTF-8.
    pub fn as_name(&self) -> Option<&str> {
        self.as_name_bytes().and_then(|n| std::str::from_utf8(n).ok())
    }

    /// Raw name bytes.
    pub fn as_name_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Try to cast to string bytes (text or binary).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) | Value::Binary(s) => Some(s),
            _ => None,
        }
    }

    /// String contents decoded as text.
    ///
    /// Handles the UTF-16BE byte-order mark; everything else is read as UTF-8
    /// with replacement characters.
    pub fn as_text(&self) -> Option<String> {
        let bytes = self.as_string()?;
        if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&units));
        }
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to cast to dictionary.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Mutable dictionary access.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Reference(r)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Value::Dictionary(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<Rect> for Value {
    fn from(r: Rect) -> Self {
        Value::numbers(&[r.x1, r.y1, r.x2, r.y2])
    }
}

/// Dictionary that keeps its keys in insertion order.
///
/// Keys are unique. The reader keeps the first occurrence of a duplicated
/// key; [`Dictionary::insert`] replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<String, Value>,
}

impl Dictionary {
    /// Empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append `key`, or replace its value in place if already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Insert only if `key` is new. Returns `false` for a duplicate.
    pub(crate) fn insert_first(&mut self, key: String, value: Value) -> bool {
        match self.entries.entry(key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            },
        }
    }

    /// Remove a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Name value of `key`.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_name)
    }

    /// String bytes of `key`.
    pub fn get_string(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_string)
    }

    /// Numeric value of `key`.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_number)
    }

    /// Integer value of `key`.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    /// Boolean value of `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Array value of `key`.
    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    /// Dictionary value of `key`.
    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(Value::as_dict)
    }

    /// Reference value of `key`.
    pub fn get_reference(&self, key: &str) -> Option<ObjectRef> {
        self.get(key).and_then(Value::as_reference)
    }

    /// Rectangle value of `key`.
    pub fn get_rect(&self, key: &str) -> Option<Rect> {
        self.get(key).and_then(Rect::from_value)
    }

    /// `/Type` of this dictionary.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// Rectangle given by two corners, as stored in `/MediaBox` and friends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Lower-left x
    pub x1: f64,
    /// Lower-left y
    pub y1: f64,
    /// Upper-right x
    pub x2: f64,
    /// Upper-right y
    pub y2: f64,
}

impl Rect {
    /// US Letter, the default page size.
    pub const LETTER: Rect = Rect {
        x1: 0.0,
        y1: 0.0,
        x2: 612.0,
        y2: 792.0,
    };

    /// Create a rectangle.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Parse a four-number array.
    pub fn from_value(value: &Value) -> Option<Rect> {
        let arr = value.as_array()?;
        if arr.len() != 4 {
            return None;
        }
        Some(Rect::new(
            arr[0].as_number()?,
            arr[1].as_number()?,
            arr[2].as_number()?,
            arr[3].as_number()?,
        ))
    }

    /// Width, regardless of corner order.
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    /// Height, regardless of corner order.
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }
}

/// Indirect object: number, generation, value, and optional stream payload.
///
/// For stream objects, `stream` holds the raw (still encoded) bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    reference: ObjectRef,
    value: Value,
    stream: Option<Bytes>,
}

impl Object {
    /// Plain object.
    pub fn new(reference: ObjectRef, value: Value) -> Self {
        Self {
            reference,
            value,
            stream: None,
        }
    }

    /// Stream object.
    pub fn with_stream(reference: ObjectRef, dict: Dictionary, data: impl Into<Bytes>) -> Self {
        Self {
            reference,
            value: Value::Dictionary(dict),
            stream: Some(data.into()),
        }
    }

    /// Object number.
    pub fn number(&self) -> u32 {
        self.reference.id
    }

    /// Generation number.
    pub fn generation(&self) -> u16 {
        self.reference.gen
    }

    /// Reference naming this object.
    pub fn reference(&self) -> ObjectRef {
        self.reference
    }

    /// The object's value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Take the value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Dictionary value (for streams, the stream dictionary).
    pub fn dict(&self) -> Option<&Dictionary> {
        self.value.as_dict()
    }

    /// Whether the object carries a stream payload.
    pub fn is_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Raw stream bytes, as stored in the file.
    pub fn raw_stream(&self) -> Option<&Bytes> {
        self.stream.as_ref()
    }

    /// Decode the stream payload through its `/Filter` chain.
    pub fn decode_stream(&self) -> Result<Vec<u8>> {
        self.decode_stream_with_options(&ParserOptions::default())
    }

    /// Decode the stream payload with explicit decompression limits.
    pub fn decode_stream_with_options(&self, options: &ParserOptions) -> Result<Vec<u8>> {
        let data = self.stream.as_ref().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: self.value.type_name().to_string(),
        })?;
        let dict = self.dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: self.value.type_name().to_string(),
        })?;

        let filters = dict.get("Filter").map(filter_names).unwrap_or_default();
        let params = dict.get("DecodeParms").and_then(DecodeParams::from_value);
        decoders::decode_stream_with_options(data, &filters, params.as_ref(), Some(options))
    }
}

/// Filter names from a `/Filter` value (a name or an array of names).
pub(crate) fn filter_names(filter: &Value) -> Vec<String> {
    match filter {
        Value::Name(name) => vec![String::from_utf8_lossy(name).into_owned()],
        Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_name_bytes())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}
