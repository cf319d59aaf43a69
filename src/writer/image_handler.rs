//! Image import for PDF generation.
//!
//! Images are embedded as image XObjects (ISO 32000-1, section 8.9). JPEG data
//! is passed through unchanged under `/DCTDecode`; only the frame header is
//! read, to learn the dimensions, bit depth and color space.
//!
//! # Color Spaces
//!
//! - DeviceGray (1 component)
//! - DeviceRGB (3 components)
//! - DeviceCMYK (4 components)

use super::pdf_writer::PdfWriter;
use crate::error::{Error, Result};
use crate::object::{Dictionary, ObjectRef, Value};
use crate::source::ByteSink;
use byteorder::{BigEndian, ByteOrder};
use std::path::Path;

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// Get the number of color components.
    pub fn components(&self) -> u8 {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
        }
    }

    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }

    fn from_components(components: u8) -> Option<Self> {
        match components {
            1 => Some(ColorSpace::DeviceGray),
            3 => Some(ColorSpace::DeviceRGB),
            4 => Some(ColorSpace::DeviceCMYK),
            _ => None,
        }
    }
}

/// Frame header values of a JPEG image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Sample precision
    pub bits_per_component: u8,
    /// Color space implied by the component count
    pub color_space: ColorSpace,
}

/// Read the start-of-frame header of a JPEG image.
///
/// Segments are walked from the SOI marker until the first SOF marker.
/// Reaching the scan data first, or running out of bytes, is an error.
pub fn read_jpeg_info(data: &[u8]) -> Result<JpegInfo> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::Image("not a JPEG file (missing SOI marker)".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            // Fill bytes
            0xFF => pos -= 1,
            // Standalone markers carry no length
            0x00 | 0x01 | 0xD0..=0xD8 => {},
            0xD9 => return Err(Error::Image("JPEG ends before any frame header".to_string())),
            0xDA => return Err(Error::Image("JPEG scan data precedes the frame header".to_string())),
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let header = data
                    .get(pos..pos + 8)
                    .ok_or_else(|| Error::Image("truncated JPEG frame header".to_string()))?;
                let bits_per_component = header[2];
                let height = u32::from(BigEndian::read_u16(&header[3..5]));
                let width = u32::from(BigEndian::read_u16(&header[5..7]));
                let components = header[7];
                let color_space = ColorSpace::from_components(components).ok_or_else(|| {
                    Error::Image(format!("unsupported JPEG component count {}", components))
                })?;
                if width == 0 || height == 0 {
                    return Err(Error::Image(format!("JPEG frame is {}x{}", width, height)));
                }
                return Ok(JpegInfo {
                    width,
                    height,
                    bits_per_component,
                    color_space,
                });
            },
            _ => {
                let length = data
                    .get(pos..pos + 2)
                    .map(BigEndian::read_u16)
                    .ok_or_else(|| Error::Image("truncated JPEG segment".to_string()))?;
                pos += usize::from(length);
            },
        }
    }

    Err(Error::Image("could not find JPEG dimensions".to_string()))
}

/// An image XObject added to a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageXObject {
    /// The image stream object
    pub reference: ObjectRef,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Color space
    pub color_space: ColorSpace,
    /// Bits per component (usually 8)
    pub bits_per_component: u8,
}

impl ImageXObject {
    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Calculate dimensions to fit within a bounding box while maintaining aspect ratio.
    pub fn fit_to_box(&self, max_width: f64, max_height: f64) -> (f64, f64) {
        let aspect = self.aspect_ratio();
        let box_aspect = max_width / max_height;

        if aspect > box_aspect {
            // Image is wider than box, constrain by width
            (max_width, max_width / aspect)
        } else {
            // Image is taller than box, constrain by height
            (max_height * aspect, max_height)
        }
    }
}

impl<W: ByteSink> PdfWriter<W> {
    /// Add a JPEG image as an image XObject.
    ///
    /// The data is stored as is under `/DCTDecode`.
    pub fn create_image_from_jpeg(&mut self, data: impl Into<Vec<u8>>, interpolate: bool) -> Result<ImageXObject> {
        let data = data.into();
        self.guard("create image", |w| w.insert_jpeg(data, interpolate))
    }

    /// Read a JPEG file and add it as an image XObject.
    pub fn create_image_from_jpeg_file(&mut self, path: impl AsRef<Path>, interpolate: bool) -> Result<ImageXObject> {
        let path = path.as_ref();
        self.guard("create image", |w| {
            let data = std::fs::read(path)?;
            log::debug!("importing {} ({} bytes)", path.display(), data.len());
            w.insert_jpeg(data, interpolate)
        })
    }

    fn insert_jpeg(&mut self, data: Vec<u8>, interpolate: bool) -> Result<ImageXObject> {
        self.require_building("create image")?;
        let info = read_jpeg_info(&data)?;

        let mut dict = Dictionary::new()
            .with("Type", Value::name("XObject"))
            .with("Subtype", Value::name("Image"))
            .with("Width", info.width)
            .with("Height", info.height)
            .with("ColorSpace", Value::name(info.color_space.pdf_name()))
            .with("BitsPerComponent", u32::from(info.bits_per_component))
            .with("Filter", Value::name("DCTDecode"));
        if interpolate {
            dict.insert("Interpolate", true);
        }
        let reference = self.insert_stream(dict, data)?;

        Ok(ImageXObject {
            reference,
            width: info.width,
            height: info.height,
            color_space: info.color_space,
            bits_per_component: info.bits_per_component,
        })
    }
}

/// Register `image` under `/Resources /XObject /{name}` of a page dictionary.
pub fn add_image_resource(page: &mut Dictionary, name: &str, image: ObjectRef) {
    if !matches!(page.get("Resources"), Some(Value::Dictionary(_))) {
        if page.contains_key("Resources") {
            log::warn!("replacing indirect /Resources while adding image {}", name);
        }
        page.insert("Resources", Dictionary::new());
    }
    if let Some(Value::Dictionary(resources)) = page.get_mut("Resources") {
        if !matches!(resources.get("XObject"), Some(Value::Dictionary(_))) {
            resources.insert("XObject", Dictionary::new());
        }
        if let Some(Value::Dictionary(xobjects)) = resources.get_mut("XObject") {
            xobjects.insert(name, image);
        }
    }
}
