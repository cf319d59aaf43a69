//! Copying pages and objects from a read document into a writer.
//!
//! The reachable subgraph of the copied object is walked through its
//! indirect references. Each source object gets one fresh number in the
//! target, and the mapping is kept per source document, so objects shared
//! between several copied pages (fonts, images) are written once.
//!
//! References that lead back into the source's page tree (`/Parent`,
//! other pages, the catalog) are not followed; they become `null` unless
//! the referenced page has itself been copied.

use super::pdf_writer::PdfWriter;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, ObjectRef, Value};
use crate::pages::INHERITABLE_ATTRIBUTES;
use crate::source::ByteSink;
use crate::table::{ObjectTable, WritableObject};
use std::collections::HashMap;

impl<W: ByteSink> PdfWriter<W> {
    /// Copy page `index` of `source` and append it to this file's pages.
    ///
    /// Inherited attributes are resolved from the source's page tree and
    /// stored on the copied page. Returns the new page object.
    pub fn copy_page(&mut self, source: &mut PdfDocument, index: usize) -> Result<ObjectRef> {
        self.guard("copy page", |w| {
            w.require_building("copy page")?;
            let page = source.get_page(index)?;

            let mut dict = page.dict.clone();
            dict.remove("Parent");
            for key in INHERITABLE_ATTRIBUTES {
                if dict.contains_key(key) {
                    continue;
                }
                if let Some(value) = source.page_attribute(page.reference, key)? {
                    dict.insert(key, value);
                }
            }

            let pages_root = w.pages_root();
            let target = w.copy_from(source, |copy| {
                let target = copy.table.allocate(Value::Null);
                copy.map.insert(page.reference, target);
                let mut dict = match copy.remap(&Value::Dictionary(dict), 0)? {
                    Value::Dictionary(dict) => dict,
                    _ => Dictionary::new(),
                };
                dict.insert("Parent", pages_root);
                copy.table.writable_mut(target)?.value = dict.into();
                copy.drain()?;
                Ok(target)
            })?;
            w.add_page(target);
            log::debug!("copied page {} ({}) as {}", index, page.reference, target);
            Ok(target)
        })
    }

    /// Copy one object of `source`, with everything it references, into
    /// this file. Returns the object's number in this file.
    pub fn copy_object(&mut self, source: &mut PdfDocument, reference: ObjectRef) -> Result<ObjectRef> {
        self.guard("copy object", |w| {
            w.require_building("copy object")?;
            w.copy_from(source, |copy| {
                let target = match copy.map.get(&reference) {
                    Some(&target) => target,
                    None => {
                        let target = copy.table.allocate(Value::Null);
                        copy.map.insert(reference, target);
                        copy.pending.push((reference, target));
                        target
                    },
                };
                copy.drain()?;
                Ok(target)
            })
        })
    }

    /// Run one copy against the mapping kept for `source`.
    ///
    /// On failure every object allocated by the run is freed and the
    /// mapping forgets them, so a later copy starts again from the source.
    fn copy_from<T>(
        &mut self,
        source: &mut PdfDocument,
        f: impl FnOnce(&mut GraphCopy<'_>) -> Result<T>,
    ) -> Result<T> {
        let id = source.instance_id();
        let mut map = self.copy_maps.remove(&id).unwrap_or_default();
        let max_nesting = source.options().max_nesting;
        let first = self.table.size();
        let result = {
            let mut copy = GraphCopy {
                source,
                table: &mut self.table,
                map: &mut map,
                pending: Vec::new(),
                max_nesting,
            };
            f(&mut copy)
        };
        if result.is_err() {
            map.retain(|_, target| target.id < first);
            let end = self.table.size();
            for number in first..end {
                self.table.mark_free(number);
            }
            log::debug!("copy failed; released objects {}..{}", first, end);
        }
        self.copy_maps.insert(id, map);
        result
    }
}

/// One copy run: the source, the target table, and the objects still to copy.
struct GraphCopy<'a> {
    source: &'a mut PdfDocument,
    table: &'a mut ObjectTable,
    map: &'a mut HashMap<ObjectRef, ObjectRef>,
    /// (source, target) pairs allocated but not yet filled in
    pending: Vec<(ObjectRef, ObjectRef)>,
    max_nesting: usize,
}

impl GraphCopy<'_> {
    /// Copy every pending object until none are left.
    fn drain(&mut self) -> Result<()> {
        while let Some((from, to)) = self.pending.pop() {
            let object = self.source.load_object(from)?;
            let mut value = object.value().clone();
            let stream = object.raw_stream().map(|raw| raw.to_vec());
            if let (Some(data), Some(dict)) = (&stream, value.as_dict_mut()) {
                // A direct length keeps an indirect /Length object out of the copy.
                dict.insert("Length", data.len());
            }
            let value = self.remap(&value, 0)?;
            *self.table.writable_mut(to)? = WritableObject {
                value,
                stream,
                open: false,
            };
        }
        Ok(())
    }

    /// Rewrite references in `value` to target numbers, allocating
    /// targets for objects seen for the first time.
    fn remap(&mut self, value: &Value, depth: usize) -> Result<Value> {
        if depth > self.max_nesting {
            return Err(Error::LimitExceeded(format!(
                "object nesting deeper than {} while copying",
                self.max_nesting
            )));
        }
        Ok(match value {
            Value::Reference(reference) => self.remap_reference(*reference)?,
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.remap(item, depth + 1))
                    .collect::<Result<_>>()?,
            ),
            Value::Dictionary(dict) => {
                let mut copied = Dictionary::new();
                for (key, item) in dict.iter() {
                    copied.insert(key.as_str(), self.remap(item, depth + 1)?);
                }
                Value::Dictionary(copied)
            },
            other => other.clone(),
        })
    }

    fn remap_reference(&mut self, reference: ObjectRef) -> Result<Value> {
        if let Some(&target) = self.map.get(&reference) {
            return Ok(Value::Reference(target));
        }
        let object = match self.source.load_object(reference) {
            Ok(object) => object,
            Err(Error::ObjectNotFound(..)) => {
                log::debug!("dangling reference {} copied as null", reference);
                return Ok(Value::Null);
            },
            Err(e) => return Err(e),
        };
        if let Some(kind @ ("Page" | "Pages" | "Catalog")) = object.dict().and_then(Dictionary::type_name) {
            log::debug!("not following reference to {} {}", kind, reference);
            return Ok(Value::Null);
        }
        let target = self.table.allocate(Value::Null);
        self.map.insert(reference, target);
        self.pending.push((reference, target));
        Ok(Value::Reference(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySink;
    use crate::writer::PdfWriterConfig;

    /// Two-page source whose pages share a font and inherit a media box.
    fn source() -> PdfDocument {
        let objects: [(&str, &str); 7] = [
            ("1 0 obj", "<</Type /Catalog /Pages 2 0 R>>"),
            ("2 0 obj", "<</Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 200 300] /Resources <</Font <</F1 5 0 R>>>>>>"),
            ("3 0 obj", "<</Type /Page /Parent 2 0 R /Contents 6 0 R /Annots [<</Subtype /Link /P 3 0 R /Dest [4 0 R /Fit]>>]>>"),
            ("4 0 obj", "<</Type /Page /Parent 2 0 R /MediaBox [0 0 50 50]>>"),
            ("5 0 obj", "<</Type /Font /Subtype /Type1 /BaseFont /Helvetica /Self 5 0 R /Missing 99 0 R>>"),
            ("6 0 obj", "<</Length 7 0 R>>\nstream\nBT ET\nendstream"),
            ("7 0 obj", "5"),
        ];
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (header, body) in objects {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{}\n{}\nendobj\n", header, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 8\n0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(format!("trailer\n<</Size 8 /Root 1 0 R>>\nstartxref\n{}\n%%EOF\n", xref).as_bytes());
        PdfDocument::from_bytes(pdf).unwrap()
    }

    fn writable(writer: &mut PdfWriter<MemorySink>, reference: ObjectRef) -> WritableObject {
        writer.table.writable_mut(reference).unwrap().clone()
    }

    #[test]
    fn test_copy_page_materializes_inherited_attributes() {
        let mut src = source();
        let mut writer = PdfWriter::in_memory(PdfWriterConfig::default()).unwrap();
        let page = writer.copy_page(&mut src, 0).unwrap();
        assert_eq!(writer.page_count(), 1);

        let copied = writable(&mut writer, page);
        let dict = copied.value.as_dict().unwrap();
        assert_eq!(dict.get_reference("Parent"), Some(writer.pages_root()));
        assert_eq!(dict.get_rect("MediaBox").unwrap().width(), 200.0);
        let font = dict
            .get_dict("Resources")
            .and_then(|r| r.get_dict("Font"))
            .and_then(|f| f.get_reference("F1"))
            .unwrap();

        // Self reference maps to the copy; dangling reference becomes null.
        let font_dict = writable(&mut writer, font).value;
        let font_dict = font_dict.as_dict().unwrap();
        assert_eq!(font_dict.get_reference("Self"), Some(font));
        assert_eq!(font_dict.get("Missing"), Some(&Value::Null));

        // Back-reference to the copied page is remapped, the uncopied page is cut.
        let annot = dict.get_array("Annots").unwrap()[0].as_dict().unwrap().clone();
        assert_eq!(annot.get_reference("P"), Some(page));
        assert_eq!(annot.get_array("Dest").unwrap()[0], Value::Null);

        // Stream bytes copied with a direct length.
        let contents = dict.get_reference("Contents").unwrap();
        let stream = writable(&mut writer, contents);
        assert_eq!(stream.stream.as_deref(), Some(&b"BT ET"[..]));
        assert_eq!(stream.value.as_dict().unwrap().get("Length"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_shared_objects_copied_once() {
        let mut src = source();
        let mut writer = PdfWriter::in_memory(PdfWriterConfig::default()).unwrap();
        let first = writer.copy_page(&mut src, 0).unwrap();
        let second = writer.copy_page(&mut src, 1).unwrap();

        let font_of = |writer: &mut PdfWriter<MemorySink>, page| {
            writable(writer, page)
                .value
                .as_dict()
                .and_then(|d| d.get_dict("Resources").cloned())
                .and_then(|r| r.get_dict("Font").and_then(|f| f.get_reference("F1")))
        };
        assert_eq!(font_of(&mut writer, first), font_of(&mut writer, second));
        let media_box = writable(&mut writer, second).value.as_dict().unwrap().get_rect("MediaBox");
        assert_eq!(media_box.map(|r| r.width()), Some(50.0));
    }

    #[test]
    fn test_copy_object() {
        let mut src = source();
        let mut writer = PdfWriter::in_memory(PdfWriterConfig::default()).unwrap();
        let font = writer.copy_object(&mut src, ObjectRef::new(5, 0)).unwrap();
        assert_eq!(writer.copy_object(&mut src, ObjectRef::new(5, 0)).unwrap(), font);
        assert_eq!(writer.page_count(), 0);
    }

    #[test]
    fn test_failed_copy_leaves_no_placeholders() {
        // Both pages share a font whose /Widths object does not parse.
        let objects: [(&str, &str); 7] = [
            ("1 0 obj", "<</Type /Catalog /Pages 2 0 R>>"),
            ("2 0 obj", "<</Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /Resources <</Font <</F1 5 0 R>>>>>>"),
            ("3 0 obj", "<</Type /Page /Parent 2 0 R /Contents 6 0 R>>"),
            ("4 0 obj", "<</Type /Page /Parent 2 0 R /Contents 6 0 R>>"),
            ("5 0 obj", "<</Type /Font /Subtype /Type1 /BaseFont /Helvetica /Widths 7 0 R>>"),
            ("6 0 obj", "<</Length 5>>\nstream\nBT ET\nendstream"),
            ("7 0 obj", "[250 >> 300]"),
        ];
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (header, body) in objects {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{}\n{}\nendobj\n", header, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 8\n0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(format!("trailer\n<</Size 8 /Root 1 0 R>>\nstartxref\n{}\n%%EOF\n", xref).as_bytes());
        let mut src = PdfDocument::from_bytes(pdf).unwrap();

        let mut writer = PdfWriter::in_memory(PdfWriterConfig::default()).unwrap();
        let before = writer.table.writable().count();
        assert!(writer.copy_page(&mut src, 0).is_err());
        assert_eq!(writer.table.writable().count(), before);
        assert!(writer.copy_maps.values().all(HashMap::is_empty));

        // The shared font is not mistaken for an already copied object.
        assert!(writer.copy_page(&mut src, 1).is_err());
        assert_eq!(writer.table.writable().count(), before);
        assert_eq!(writer.page_count(), 0);

        // Objects outside the broken subgraph still copy.
        let contents = writer.copy_object(&mut src, ObjectRef::new(6, 0)).unwrap();
        assert_eq!(writable(&mut writer, contents).stream.as_deref(), Some(&b"BT ET"[..]));
        writer.close().unwrap();

        let mut reread = PdfDocument::from_bytes(writer.into_bytes()).unwrap();
        assert_eq!(reread.page_count().unwrap(), 0);
        assert_eq!(reread.get_object(contents).unwrap().decode_stream().unwrap(), b"BT ET");
    }

    #[test]
    fn test_copy_out_of_range_page() {
        let mut src = source();
        let mut writer = PdfWriter::in_memory(PdfWriterConfig::default()).unwrap();
        let err = writer.copy_page(&mut src, 9).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
        writer.close().unwrap();
    }
}
