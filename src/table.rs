//! Object table.
//!
//! Maps object numbers to where the object lives: a byte offset not yet
//! parsed, a slot inside an object stream, a memoized parsed object, a free
//! entry, or (on the write side) an in-memory object awaiting
//! serialization.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef, Value};
use crate::xref::{CrossRefTable, XRefEntryType};
use std::collections::BTreeMap;

/// Where an object's definition is found.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Indirect object at a byte offset, not parsed yet
    Unresolved {
        /// Offset of the `N G obj` header
        offset: u64,
    },
    /// Member of an object stream, not parsed yet
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index within the object stream
        index: u32,
    },
    /// Parsed and memoized
    Resolved(Object),
    /// Free entry
    Free,
    /// Write-side object held in memory until the file is finalized
    Writable(WritableObject),
}

/// Object created on the write side.
#[derive(Debug, Clone, PartialEq)]
pub struct WritableObject {
    /// Object value; for streams, the stream dictionary
    pub value: Value,
    /// Encoded stream payload, once the stream is closed
    pub stream: Option<Vec<u8>>,
    /// A stream writer is still open on this object
    pub open: bool,
}

impl WritableObject {
    /// Plain object.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            stream: None,
            open: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    generation: u16,
    entry: Entry,
}

/// Table from object number to [`Entry`].
///
/// Object 0 is always free with generation 65535. Numbers not present in
/// the table are treated as free.
#[derive(Debug, Clone)]
pub struct ObjectTable {
    slots: BTreeMap<u32, Slot>,
    size: u32,
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTable {
    /// Table holding only the free object 0.
    pub fn new() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(
            0,
            Slot {
                generation: 65535,
                entry: Entry::Free,
            },
        );
        Self { slots, size: 1 }
    }

    /// Build the read-side table from a merged xref, sized by the trailer's `/Size`.
    ///
    /// Entries at or beyond `size` are dropped with a warning.
    pub fn from_xref(xref: &CrossRefTable, size: u32) -> Self {
        let mut table = Self::new();
        table.size = size.max(1);
        for (&number, entry) in xref.iter() {
            if number == 0 {
                continue;
            }
            if number >= table.size {
                log::warn!(
                    "xref entry for object {} lies beyond /Size {}; ignoring it",
                    number,
                    size
                );
                continue;
            }
            let (generation, entry) = match entry.entry_type {
                XRefEntryType::Free => (entry.generation, Entry::Free),
                XRefEntryType::Uncompressed => (
                    entry.generation,
                    Entry::Unresolved {
                        offset: entry.offset,
                    },
                ),
                XRefEntryType::Compressed => (
                    0,
                    Entry::Compressed {
                        stream: entry.offset as u32,
                        index: u32::from(entry.generation),
                    },
                ),
            };
            table.slots.insert(number, Slot { generation, entry });
        }
        table
    }

    /// One past the highest object number (the trailer's `/Size`).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Allocate the next object number for a write-side object.
    pub fn allocate(&mut self, value: Value) -> ObjectRef {
        let number = self.size;
        self.size += 1;
        self.slots.insert(
            number,
            Slot {
                generation: 0,
                entry: Entry::Writable(WritableObject::new(value)),
            },
        );
        ObjectRef::new(number, 0)
    }

    /// Record the byte offset of an object (read side).
    pub fn bind_offset(&mut self, reference: ObjectRef, offset: u64) {
        if reference.id >= self.size {
            self.size = reference.id + 1;
        }
        self.slots.insert(
            reference.id,
            Slot {
                generation: reference.gen,
                entry: Entry::Unresolved { offset },
            },
        );
    }

    /// Mark an object free; the next reuse gets generation + 1.
    pub fn mark_free(&mut self, number: u32) {
        if number == 0 {
            return;
        }
        if let Some(slot) = self.slots.get_mut(&number) {
            slot.generation = slot.generation.saturating_add(1);
            slot.entry = Entry::Free;
        }
    }

    /// Entry for `reference`, if the generation matches and the entry is in use.
    pub fn entry(&self, reference: ObjectRef) -> Option<&Entry> {
        let slot = self.slots.get(&reference.id)?;
        if matches!(slot.entry, Entry::Free) {
            return None;
        }
        // Compressed objects always have generation 0.
        if slot.generation != reference.gen {
            return None;
        }
        Some(&slot.entry)
    }

    /// Entry for `number`, whatever its generation.
    pub fn entry_by_number(&self, number: u32) -> Option<(ObjectRef, &Entry)> {
        let slot = self.slots.get(&number)?;
        Some((ObjectRef::new(number, slot.generation), &slot.entry))
    }

    /// Memoize a parsed object.
    pub fn memoize(&mut self, object: Object) {
        let number = object.number();
        let generation = object.generation();
        self.slots.insert(
            number,
            Slot {
                generation,
                entry: Entry::Resolved(object),
            },
        );
    }

    /// Already-parsed object for `reference`.
    pub fn resolved(&self, reference: ObjectRef) -> Option<&Object> {
        match self.entry(reference)? {
            Entry::Resolved(object) => Some(object),
            _ => None,
        }
    }

    /// Mutable access to a write-side object.
    pub fn writable_mut(&mut self, reference: ObjectRef) -> Result<&mut WritableObject> {
        match self.slots.get_mut(&reference.id) {
            Some(Slot {
                generation,
                entry: Entry::Writable(object),
            }) if *generation == reference.gen => Ok(object),
            _ => Err(Error::ObjectNotFound(reference.id, reference.gen)),
        }
    }

    /// Write-side objects in ascending number.
    pub fn writable(&self) -> impl Iterator<Item = (ObjectRef, &WritableObject)> {
        self.slots.iter().filter_map(|(&number, slot)| match &slot.entry {
            Entry::Writable(object) => Some((ObjectRef::new(number, slot.generation), object)),
            _ => None,
        })
    }

    /// References of all in-use entries in ascending number.
    pub fn in_use(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.slots.iter().filter_map(|(&number, slot)| match slot.entry {
            Entry::Free => None,
            _ => Some(ObjectRef::new(number, slot.generation)),
        })
    }

    /// Number of in-use entries.
    pub fn in_use_count(&self) -> usize {
        self.in_use().count()
    }

    /// Highest in-use object number; 0 when empty.
    pub fn max_number(&self) -> u32 {
        self.in_use().map(|r| r.id).max().unwrap_or(0)
    }
}
