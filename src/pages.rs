//! Page tree traversal.
//!
//! The `/Pages` hierarchy is flattened once, depth first in `/Kids` order,
//! and cached on the document. Attributes a page omits are looked up on
//! its `/Parent` chain.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, ObjectRef, Rect, Value};
use std::collections::HashSet;

/// Page attributes that may be inherited from an ancestor `/Pages` node.
pub const INHERITABLE_ATTRIBUTES: [&str; 4] = ["MediaBox", "CropBox", "Resources", "Rotate"];

/// A page with its inherited attributes resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Index in document order
    pub index: usize,
    /// Reference to the `/Page` object
    pub reference: ObjectRef,
    /// The page dictionary as stored (without inherited entries)
    pub dict: Dictionary,
    /// Effective media box; US Letter when no ancestor defines one
    pub media_box: Rect,
    /// Effective crop box; the media box when none is defined
    pub crop_box: Rect,
    /// Rotation in degrees, normalized to 0, 90, 180 or 270
    pub rotate: i64,
    /// Effective resource dictionary (empty when none is defined)
    pub resources: Dictionary,
}

impl Page {
    /// Media box width in points.
    pub fn width(&self) -> f64 {
        self.media_box.width()
    }

    /// Media box height in points.
    pub fn height(&self) -> f64 {
        self.media_box.height()
    }

    /// Content stream references, whether `/Contents` is one stream or an array.
    pub fn contents(&self) -> Vec<ObjectRef> {
        match self.dict.get("Contents") {
            Some(Value::Reference(r)) => vec![*r],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_reference).collect(),
            _ => Vec::new(),
        }
    }
}

impl PdfDocument {
    /// Number of pages.
    ///
    /// This is the number of `/Page` leaves actually reachable from the
    /// root; a root `/Count` that disagrees is reported to the error sink.
    pub fn page_count(&mut self) -> Result<usize> {
        self.guard("count pages", |doc| doc.page_refs().map(|refs| refs.len()))
    }

    /// Page at `index` (0-based).
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] when `index >= page_count()`.
    pub fn get_page(&mut self, index: usize) -> Result<Page> {
        self.guard("get page", |doc| {
            let refs = doc.page_refs()?;
            let reference = *refs.get(index).ok_or(Error::IndexOutOfRange {
                index,
                count: refs.len(),
            })?;
            doc.build_page(index, reference)
        })
    }

    /// Nearest value of `key` on the page or its ancestors, resolved.
    pub fn page_attribute(&mut self, page: ObjectRef, key: &str) -> Result<Option<Value>> {
        self.guard("read page attribute", |doc| doc.inherited(page, key))
    }

    /// References of all pages in document order.
    pub(crate) fn page_refs(&mut self) -> Result<Vec<ObjectRef>> {
        if let Some(pages) = &self.pages {
            return Ok(pages.clone());
        }
        let pages = self.collect_pages()?;
        self.pages = Some(pages.clone());
        Ok(pages)
    }

    fn collect_pages(&mut self) -> Result<Vec<ObjectRef>> {
        let catalog = self.catalog_dict()?;
        let root = catalog
            .get_reference("Pages")
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;
        let max_depth = self.options().max_recursion_depth;

        let mut pages = Vec::new();
        let mut declared = None;
        let mut visited = HashSet::new();
        let mut stack = vec![(root, 0u32)];

        while let Some((node, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(Error::RecursionLimitExceeded(max_depth));
            }
            if !visited.insert(node) {
                self.tolerate(Error::CircularReference(node))?;
                continue;
            }

            let object = match self.load_object(node) {
                Ok(object) => object,
                Err(e @ Error::ObjectNotFound(..)) if node != root => {
                    self.tolerate(e)?;
                    continue;
                },
                Err(e) => return Err(e),
            };
            let Some(dict) = object.dict() else {
                self.tolerate(Error::InvalidObjectType {
                    expected: "page tree node".to_string(),
                    found: object.value().type_name().to_string(),
                })?;
                continue;
            };

            let is_pages = match dict.type_name() {
                Some("Pages") => true,
                Some("Page") => false,
                // Untyped nodes are classified by shape.
                _ => dict.contains_key("Kids"),
            };
            if node == root {
                declared = dict.get_integer("Count");
            }

            if !is_pages {
                pages.push(node);
                continue;
            }
            let kids = match dict.get("Kids") {
                Some(Value::Array(kids)) => kids.clone(),
                Some(Value::Reference(r)) => match self.resolve_value(&Value::Reference(*r))? {
                    Value::Array(kids) => kids,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            for kid in kids.iter().rev() {
                match kid.as_reference() {
                    Some(kid_ref) => stack.push((kid_ref, depth + 1)),
                    None => self.tolerate(Error::InvalidPdf(format!(
                        "/Kids entry of {} is a {}, not a reference",
                        node,
                        kid.type_name()
                    )))?,
                }
            }
        }

        if declared != Some(pages.len() as i64) {
            self.tolerate(Error::InvalidPdf(format!(
                "page tree /Count is {} but {} pages were found",
                declared.map_or_else(|| "missing".to_string(), |c| c.to_string()),
                pages.len()
            )))?;
        }
        log::debug!("page tree holds {} pages", pages.len());
        Ok(pages)
    }

    /// Walk the `/Parent` chain for `key`.
    pub(crate) fn inherited(&mut self, page: ObjectRef, key: &str) -> Result<Option<Value>> {
        let max_depth = self.options().max_recursion_depth;
        let mut visited = HashSet::new();
        let mut current = Some(page);

        while let Some(node) = current {
            if !visited.insert(node) {
                log::warn!("/Parent chain of {} loops at {}", page, node);
                break;
            }
            if visited.len() as u32 > max_depth {
                return Err(Error::RecursionLimitExceeded(max_depth));
            }
            let object = self.load_object(node)?;
            let Some(dict) = object.dict() else {
                break;
            };
            if let Some(value) = dict.get(key) {
                return self.resolve_value(value).map(Some);
            }
            current = dict.get_reference("Parent");
        }
        Ok(None)
    }

    fn build_page(&mut self, index: usize, reference: ObjectRef) -> Result<Page> {
        let object = self.load_object(reference)?;
        let dict = object.dict().cloned().unwrap_or_default();

        let media_box = self
            .inherited(reference, "MediaBox")?
            .and_then(|v| Rect::from_value(&v))
            .unwrap_or(Rect::LETTER);
        let crop_box = self
            .inherited(reference, "CropBox")?
            .and_then(|v| Rect::from_value(&v))
            .unwrap_or(media_box);
        let rotate = self
            .inherited(reference, "Rotate")?
            .and_then(|v| v.as_integer())
            .unwrap_or(0);
        let resources = match self.inherited(reference, "Resources")? {
            Some(Value::Dictionary(resources)) => resources,
            _ => Dictionary::new(),
        };

        Ok(Page {
            index,
            reference,
            dict,
            media_box,
            crop_box,
            rotate: rotate.rem_euclid(360) / 90 * 90,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{FileState, PdfDocument};
    use crate::error::ErrorKind;
    use crate::object::{ObjectRef, Rect, Value};

    fn build_pdf(objects: &[&str]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        out
    }

    fn nested_tree() -> Vec<u8> {
        build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 3 /MediaBox [0 0 595 842] /Rotate 90 >>",
            "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 6 0 R] /Count 2 /Resources << /Font << >> >> >>",
            "<< /Type /Page /Parent 3 0 R >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 300] /CropBox [10 10 190 290] >>",
            "<< /Type /Page /Parent 3 0 R /Rotate -90 >>",
        ])
    }

    #[test]
    fn test_page_order_and_count() {
        let mut doc = PdfDocument::from_bytes(nested_tree()).unwrap();
        assert_eq!(doc.page_count().unwrap(), 3);
        let refs: Vec<u32> = (0..3).map(|i| doc.get_page(i).unwrap().reference.id).collect();
        assert_eq!(refs, [4, 6, 5]);
    }

    #[test]
    fn test_inherited_media_box() {
        let mut doc = PdfDocument::from_bytes(nested_tree()).unwrap();
        let first = doc.get_page(0).unwrap();
        assert_eq!(first.media_box, Rect::new(0.0, 0.0, 595.0, 842.0));
        assert_eq!(first.crop_box, first.media_box);
        assert_eq!(first.rotate, 90);
        assert!(first.resources.contains_key("Font"));

        let own = doc.get_page(2).unwrap();
        assert_eq!((own.width(), own.height()), (200.0, 300.0));
        assert_eq!(own.crop_box, Rect::new(10.0, 10.0, 190.0, 290.0));
        assert!(own.resources.is_empty());

        assert_eq!(doc.get_page(1).unwrap().rotate, 270);
    }

    #[test]
    fn test_page_attribute() {
        let mut doc = PdfDocument::from_bytes(nested_tree()).unwrap();
        let rotate = doc.page_attribute(ObjectRef::new(4, 0), "Rotate").unwrap();
        assert_eq!(rotate, Some(Value::Integer(90)));
        assert_eq!(doc.page_attribute(ObjectRef::new(4, 0), "Thumb").unwrap(), None);
    }

    #[test]
    fn test_default_letter_media_box() {
        let data = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ]);
        let mut doc = PdfDocument::from_bytes(data).unwrap();
        assert_eq!(doc.get_page(0).unwrap().media_box, Rect::LETTER);
    }

    #[test]
    fn test_out_of_range_page() {
        let mut doc = PdfDocument::from_bytes(nested_tree()).unwrap();
        let err = doc.get_page(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(doc.state(), FileState::OpenRead);
    }

    #[test]
    fn test_kids_cycle_tolerated() {
        let data = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 2 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ]);
        let mut doc = PdfDocument::from_bytes(data).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);
    }

    #[test]
    fn test_count_mismatch_tolerated() {
        let data = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 5 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ]);
        let mut doc = PdfDocument::from_bytes(data).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);
    }
}
