//! PDF writing module for generating PDF files.
//!
//! ## Architecture
//!
//! ```text
//! create_object / create_page / copy_page / create_image_from_jpeg
//!     ↓
//! [ObjectTable] (write-side objects held in memory)
//!     ↓
//! [StreamWriter] (payload → FilterChain → /Length, /Filter)
//!     ↓
//! [PdfWriter::finalize] (page tree, catalog, /Info, body)
//!     ↓
//! [ObjectSerializer] (canonical object bytes)
//!     ↓
//! [PdfWriter::flush] (xref, trailer)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pdfio::object::Dictionary;
//! use pdfio::writer::{add_image_resource, PdfWriter, PdfWriterConfig};
//!
//! let mut pdf = PdfWriter::create_with("out.pdf", PdfWriterConfig::default().with_title("Photos"))?;
//! let image = pdf.create_image_from_jpeg_file("photo.jpg", true)?;
//!
//! let mut page = Dictionary::new();
//! add_image_resource(&mut page, "IM1", image.reference);
//! let (w, h) = image.fit_to_box(400.0, 600.0);
//!
//! let mut content = pdf.create_page(page)?;
//! content.draw_image("IM1", (612.0 - w) / 2.0, (792.0 - h) / 2.0, w, h)?;
//! content.close()?;
//! pdf.close()?;
//! # Ok::<(), pdfio::error::Error>(())
//! ```

mod content_stream;
mod image_handler;
mod object_serializer;
mod page_copy;
mod pdf_writer;
mod stream_writer;
mod xref_writer;

pub use content_stream::{format_number, ContentStreamOp};
pub use image_handler::{add_image_resource, read_jpeg_info, ColorSpace, ImageXObject, JpegInfo};
pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{PdfWriter, PdfWriterConfig, SUPPORTED_VERSIONS};
pub use stream_writer::{FilterChain, FlateEncoder, IdentityEncoder, StreamEncoder, StreamWriter};
pub use xref_writer::{trailer_section, xref_section};
